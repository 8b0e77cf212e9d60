//! Lazily compiled expression evaluators backed by an embedded script engine.
//!
//! Expression source text is compiled on first evaluation and the compiled
//! unit is cached for the evaluator's lifetime. Exactly one compilation
//! occurs even under concurrent first callers; a compilation failure is
//! cached the same way and re-signalled on every later call.
//!
//! Expressions see three well-known globals:
//!
//! - `state`: the name of the relevant state
//! - `transition`: the in-flight command, or unit when no transition applies
//! - `entity`: the external entity, serialized into script scope

use crate::core::Entity;
use crate::diag::{emit, DiagnosticKind, DiagnosticRecord, DiagnosticSink, NullSink};
use crate::eval::{ActionEvaluator, EvaluationError, RuntimeContext};
use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{Dynamic, Engine, Scope, AST};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// A cached compilation failure.
///
/// Once an expression fails to compile the evaluator is permanently broken;
/// the same failure is reported on every subsequent evaluation until the
/// owner discards and replaces the evaluator.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("failed to compile `{expression}`: {message}")]
pub struct CompileFailure {
    pub expression: String,
    pub message: String,
}

/// Build a script engine with the crate's default configuration.
pub fn default_engine() -> Arc<Engine> {
    Arc::new(Engine::new())
}

/// Expression source plus its lazily compiled, cached executable unit.
///
/// Shared by [`CompiledAction`] and expression-backed guards.
pub struct CompiledExpr {
    source: String,
    engine: Arc<Engine>,
    unit: OnceLock<Result<AST, CompileFailure>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl CompiledExpr {
    pub fn new(engine: Arc<Engine>, source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            engine,
            unit: OnceLock::new(),
            sink: Arc::new(NullSink),
        }
    }

    /// Attach a sink observing `CompileAttempt` records.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate the expression against the context, compiling on first use.
    pub fn evaluate<E: Entity>(
        &self,
        ctx: &RuntimeContext<'_, E>,
    ) -> Result<Value, EvaluationError> {
        let unit = self.unit.get_or_init(|| {
            emit(
                self.sink.as_ref(),
                DiagnosticRecord::new(DiagnosticKind::CompileAttempt, ctx.state.name())
                    .with_detail(self.source.clone()),
            );
            self.engine
                .compile(&self.source)
                .map_err(|err| CompileFailure {
                    expression: self.source.clone(),
                    message: err.to_string(),
                })
        });
        let ast = unit.as_ref().map_err(Clone::clone)?;

        let mut scope = Scope::new();
        scope.push_constant("state", ctx.state.name().to_string());
        scope.push_constant(
            "transition",
            match ctx.transition.and_then(|t| t.command()) {
                Some(command) => Dynamic::from(command.to_string()),
                None => Dynamic::UNIT,
            },
        );
        let entity =
            to_dynamic(ctx.entity).map_err(|err| EvaluationError::EntityValidation {
                message: err.to_string(),
            })?;
        scope.push_constant("entity", entity);

        let out = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, ast)
            .map_err(|err| EvaluationError::Action {
                message: err.to_string(),
            })?;

        if out.is_unit() {
            Ok(Value::Null)
        } else {
            from_dynamic::<Value>(&out).map_err(|err| EvaluationError::Action {
                message: err.to_string(),
            })
        }
    }

    /// Evaluate the expression expecting a boolean, as guards do.
    pub fn evaluate_bool<E: Entity>(
        &self,
        ctx: &RuntimeContext<'_, E>,
    ) -> Result<bool, EvaluationError> {
        match self.evaluate(ctx)? {
            Value::Bool(b) => Ok(b),
            other => Err(EvaluationError::NonBooleanGuard {
                value: other.to_string(),
            }),
        }
    }
}

/// Action evaluator backed by a lazily compiled expression.
///
/// # Example
///
/// ```rust
/// use chartflow::core::Chart;
/// use chartflow::eval::{default_engine, ActionEvaluator, CompiledAction, RuntimeContext};
/// use serde_json::json;
///
/// let action = CompiledAction::new(default_engine(), "entity.total * 2");
///
/// let mut chart: Chart<serde_json::Value> = Chart::new();
/// let id = chart.state("pricing").id();
/// let entity = json!({ "total": 21 });
/// let ctx = RuntimeContext::new(chart.node(id), &entity);
///
/// assert_eq!(action.evaluate(&ctx).unwrap(), json!(42));
/// ```
pub struct CompiledAction {
    expr: CompiledExpr,
}

impl CompiledAction {
    pub fn new(engine: Arc<Engine>, source: impl Into<String>) -> Self {
        Self {
            expr: CompiledExpr::new(engine, source),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.expr = self.expr.with_sink(sink);
        self
    }

    pub fn source(&self) -> &str {
        self.expr.source()
    }
}

impl<E: Entity> ActionEvaluator<E> for CompiledAction {
    fn evaluate(&self, ctx: &RuntimeContext<'_, E>) -> Result<Value, EvaluationError> {
        self.expr.evaluate(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Chart;
    use crate::diag::MemorySink;
    use serde_json::json;

    fn context_chart() -> Chart<serde_json::Value> {
        let mut chart = Chart::new();
        chart.state("testing");
        chart
    }

    #[test]
    fn expression_sees_entity_global() {
        let chart = context_chart();
        let entity = json!({ "count": 3 });
        let ctx = RuntimeContext::new(chart.node_by_name("testing").unwrap(), &entity);

        let expr = CompiledExpr::new(default_engine(), "entity.count + 1");
        assert_eq!(expr.evaluate(&ctx).unwrap(), json!(4));
    }

    #[test]
    fn expression_sees_state_global() {
        let chart = context_chart();
        let entity = json!({});
        let ctx = RuntimeContext::new(chart.node_by_name("testing").unwrap(), &entity);

        let expr = CompiledExpr::new(default_engine(), r#"state == "testing""#);
        assert_eq!(expr.evaluate(&ctx).unwrap(), json!(true));
    }

    #[test]
    fn compilation_happens_once_across_threads() {
        let chart = context_chart();
        let sink = Arc::new(MemorySink::new());
        let expr = Arc::new(
            CompiledExpr::new(default_engine(), "1 + 1")
                .with_sink(Arc::clone(&sink) as Arc<dyn DiagnosticSink>),
        );

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let expr = Arc::clone(&expr);
                let chart = &chart;
                scope.spawn(move || {
                    let entity = json!({});
                    let ctx =
                        RuntimeContext::new(chart.node_by_name("testing").unwrap(), &entity);
                    assert_eq!(expr.evaluate(&ctx).unwrap(), json!(2));
                });
            }
        });

        assert_eq!(sink.count_of(DiagnosticKind::CompileAttempt), 1);
    }

    #[test]
    fn compile_failure_is_permanent() {
        let chart = context_chart();
        let entity = json!({});
        let ctx = RuntimeContext::new(chart.node_by_name("testing").unwrap(), &entity);

        let expr = CompiledExpr::new(default_engine(), "1 +");

        let first = expr.evaluate(&ctx).unwrap_err();
        let second = expr.evaluate(&ctx).unwrap_err();
        assert!(matches!(first, EvaluationError::Compilation(_)));
        assert!(matches!(second, EvaluationError::Compilation(_)));
    }

    #[test]
    fn compile_failure_reports_expression_and_message() {
        let chart = context_chart();
        let entity = json!({});
        let ctx = RuntimeContext::new(chart.node_by_name("testing").unwrap(), &entity);

        let expr = CompiledExpr::new(default_engine(), "1 +");
        let err = expr.evaluate(&ctx).unwrap_err();
        let EvaluationError::Compilation(failure) = err else {
            panic!("expected a compilation failure");
        };
        assert_eq!(failure.expression, "1 +");
        assert!(failure.to_string().contains("failed to compile `1 +`"));
    }

    #[test]
    fn failed_compile_is_attempted_only_once() {
        let chart = context_chart();
        let entity = json!({});
        let ctx = RuntimeContext::new(chart.node_by_name("testing").unwrap(), &entity);

        let sink = Arc::new(MemorySink::new());
        let expr = CompiledExpr::new(default_engine(), "] nonsense [")
            .with_sink(Arc::clone(&sink) as Arc<dyn DiagnosticSink>);

        let _ = expr.evaluate(&ctx);
        let _ = expr.evaluate(&ctx);
        assert_eq!(sink.count_of(DiagnosticKind::CompileAttempt), 1);
    }

    #[test]
    fn runtime_failure_maps_to_action_error() {
        let chart = context_chart();
        let entity = json!({});
        let ctx = RuntimeContext::new(chart.node_by_name("testing").unwrap(), &entity);

        let expr = CompiledExpr::new(default_engine(), "entity.missing.deeper");
        let err = expr.evaluate(&ctx).unwrap_err();
        assert!(matches!(err, EvaluationError::Action { .. }));
    }

    #[test]
    fn unserializable_entity_maps_to_validation_error() {
        #[derive(Debug)]
        struct Opaque;

        impl serde::Serialize for Opaque {
            fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
                Err(<S::Error as serde::ser::Error>::custom("opaque entity"))
            }
        }

        impl Entity for Opaque {}

        let mut chart: Chart<Opaque> = Chart::new();
        chart.state("testing");
        let entity = Opaque;
        let ctx = RuntimeContext::new(chart.node_by_name("testing").unwrap(), &entity);

        let expr = CompiledExpr::new(default_engine(), "1 + 1");
        let err = expr.evaluate(&ctx).unwrap_err();
        assert!(matches!(err, EvaluationError::EntityValidation { .. }));
    }

    #[test]
    fn non_boolean_guard_is_rejected() {
        let chart = context_chart();
        let entity = json!({});
        let ctx = RuntimeContext::new(chart.node_by_name("testing").unwrap(), &entity);

        let expr = CompiledExpr::new(default_engine(), "42");
        let err = expr.evaluate_bool(&ctx).unwrap_err();
        assert!(matches!(err, EvaluationError::NonBooleanGuard { .. }));
    }

    #[test]
    fn compiled_action_reports_source() {
        let action = CompiledAction::new(default_engine(), "entity.total");
        assert_eq!(action.source(), "entity.total");
    }
}
