//! Guard predicates gating state entry and transition firing.
//!
//! Guards are pure predicates over the entity. A state carries a
//! conjunctive guard chain (all must accept before the state may be
//! entered); a transition carries an optional guard and an optional
//! secondary condition, evaluated guard first.

use crate::core::Entity;
use crate::eval::{CompiledExpr, EvaluationError, RuntimeContext};
use rhai::Engine;
use std::sync::Arc;

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Predicate over the entity.
///
/// Backed either by a host closure or by a lazily compiled expression
/// (which shares the compile-once semantics of
/// [`CompiledAction`](crate::eval::CompiledAction)).
///
/// # Example
///
/// ```rust
/// use chartflow::core::{Chart, Guard};
/// use chartflow::eval::RuntimeContext;
/// use serde_json::json;
///
/// let guard: Guard<serde_json::Value> =
///     Guard::new(|e: &serde_json::Value| e["balance"].as_i64().unwrap_or(0) > 0);
///
/// let mut chart: Chart<serde_json::Value> = Chart::new();
/// let id = chart.state("account").id();
///
/// let funded = json!({ "balance": 10 });
/// let ctx = RuntimeContext::new(chart.node(id), &funded);
/// assert!(guard.check(&ctx).unwrap());
///
/// let empty = json!({ "balance": 0 });
/// let ctx = RuntimeContext::new(chart.node(id), &empty);
/// assert!(!guard.check(&ctx).unwrap());
/// ```
pub struct Guard<E: Entity> {
    kind: GuardKind<E>,
}

enum GuardKind<E: Entity> {
    Predicate(Predicate<E>),
    Expression(CompiledExpr),
}

impl<E: Entity> Guard<E> {
    /// Create a guard from a pure predicate closure.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            kind: GuardKind::Predicate(Arc::new(predicate)),
        }
    }

    /// Create a guard from expression source text.
    ///
    /// The expression must evaluate to a boolean; anything else is an
    /// evaluation error, not a rejection.
    pub fn expression(engine: Arc<Engine>, source: impl Into<String>) -> Self {
        Self {
            kind: GuardKind::Expression(CompiledExpr::new(engine, source)),
        }
    }

    pub(crate) fn from_expr(expr: CompiledExpr) -> Self {
        Self {
            kind: GuardKind::Expression(expr),
        }
    }

    /// Evaluate the guard against the context's entity.
    pub fn check(&self, ctx: &RuntimeContext<'_, E>) -> Result<bool, EvaluationError> {
        match &self.kind {
            GuardKind::Predicate(predicate) => Ok(predicate(ctx.entity)),
            GuardKind::Expression(expr) => expr.evaluate_bool(ctx),
        }
    }
}
