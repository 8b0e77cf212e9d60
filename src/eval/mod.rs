//! Pluggable action evaluation.
//!
//! The graph model decides *when* something runs; this module decides *how*.
//! Every state hook and transition action is an [`ActionEvaluator`], with
//! three standard strategies:
//!
//! - [`EmptyAction`]: a no-op, used as the default so no hook is ever absent
//! - [`DirectAction`]: wraps a caller-supplied closure
//! - [`CompiledAction`]: compiles expression source text lazily, exactly once
//!
//! Evaluators expose both a blocking entry point (`evaluate`) and a
//! suspending one (`evaluate_suspending`). Hosts that run any asynchronous
//! action anywhere in the graph should use the suspending dispatch path
//! uniformly; mixing the two risks deadlock (see [`SuspendingAction`]).

pub mod compiled;

pub use compiled::{default_engine, CompileFailure, CompiledAction, CompiledExpr};

use crate::core::{Entity, StateNode, TransitionNode};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while evaluating guards, conditions, or actions.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The evaluator's source text failed to compile. The failure is cached:
    /// every later call on the same evaluator reports it again.
    #[error(transparent)]
    Compilation(#[from] CompileFailure),

    /// User code raised during evaluation.
    #[error("action failed: {message}")]
    Action { message: String },

    /// The entity could not be bound to the evaluator's globals.
    #[error("entity cannot be bound to evaluator globals: {message}")]
    EntityValidation { message: String },

    /// A guard expression produced something other than a boolean.
    #[error("guard expression produced a non-boolean value: {value}")]
    NonBooleanGuard { value: String },
}

/// Borrowed evaluation context: the relevant state and transition plus the
/// external entity. Passed by reference into every guard and action; never
/// stored beyond the call.
pub struct RuntimeContext<'a, E: Entity> {
    pub state: &'a StateNode<E>,
    pub transition: Option<&'a TransitionNode<E>>,
    pub entity: &'a E,
}

impl<'a, E: Entity> RuntimeContext<'a, E> {
    pub fn new(state: &'a StateNode<E>, entity: &'a E) -> Self {
        Self {
            state,
            transition: None,
            entity,
        }
    }

    pub fn with_transition(mut self, transition: &'a TransitionNode<E>) -> Self {
        self.transition = Some(transition);
        self
    }
}

/// Strategy executing a handler or action against `(state, entity)`.
///
/// `evaluate` may return a value; hooks ignore it, hosts calling evaluators
/// directly may not. The suspending form defaults to wrapping the blocking
/// form in an already-completed future.
pub trait ActionEvaluator<E: Entity>: Send + Sync {
    /// Run the action, blocking until it completes.
    fn evaluate(&self, ctx: &RuntimeContext<'_, E>) -> Result<Value, EvaluationError>;

    /// Run the action, suspending at await points if the underlying
    /// implementation is asynchronous.
    fn evaluate_suspending<'a>(
        &'a self,
        ctx: &'a RuntimeContext<'a, E>,
    ) -> BoxFuture<'a, Result<Value, EvaluationError>> {
        futures::future::ready(self.evaluate(ctx)).boxed()
    }
}

/// No-op evaluator. The default action everywhere, so callers never hold an
/// absent evaluator.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyAction;

impl<E: Entity> ActionEvaluator<E> for EmptyAction {
    fn evaluate(&self, _ctx: &RuntimeContext<'_, E>) -> Result<Value, EvaluationError> {
        Ok(Value::Null)
    }
}

type DirectCallback<E> =
    Arc<dyn for<'a> Fn(&RuntimeContext<'a, E>) -> Result<Value, EvaluationError> + Send + Sync>;

/// Evaluator wrapping a caller-supplied synchronous closure.
///
/// # Example
///
/// ```rust
/// use chartflow::core::Chart;
/// use chartflow::eval::{ActionEvaluator, DirectAction, RuntimeContext};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let hits = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&hits);
/// let action = DirectAction::new(move |_ctx: &RuntimeContext<'_, ()>| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// let mut chart: Chart<()> = Chart::new();
/// let id = chart.state("only").id();
/// let ctx = RuntimeContext::new(chart.node(id), &());
/// action.evaluate(&ctx).unwrap();
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
pub struct DirectAction<E: Entity> {
    callback: DirectCallback<E>,
}

impl<E: Entity> DirectAction<E> {
    /// Wrap an infallible callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: for<'a> Fn(&RuntimeContext<'a, E>) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(move |ctx| {
                callback(ctx);
                Ok(Value::Null)
            }),
        }
    }

    /// Wrap a callback that may fail or return a value.
    pub fn fallible<F>(callback: F) -> Self
    where
        F: for<'a> Fn(&RuntimeContext<'a, E>) -> Result<Value, EvaluationError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl<E: Entity> Clone for DirectAction<E> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<E: Entity> ActionEvaluator<E> for DirectAction<E> {
    fn evaluate(&self, ctx: &RuntimeContext<'_, E>) -> Result<Value, EvaluationError> {
        (self.callback)(ctx)
    }
}

type SuspendingCallback<E> = Arc<
    dyn for<'a> Fn(&'a RuntimeContext<'a, E>) -> BoxFuture<'a, Result<Value, EvaluationError>>
        + Send
        + Sync,
>;

/// Evaluator wrapping an asynchronous closure.
///
/// The blocking `evaluate` drives the future to completion with
/// `futures::executor::block_on`. Calling it from inside an async runtime
/// can deadlock that runtime's worker; once any action in a graph is
/// asynchronous, dispatch through
/// [`Dispatcher::dispatch_suspending`](crate::dispatch::Dispatcher::dispatch_suspending)
/// uniformly instead.
pub struct SuspendingAction<E: Entity> {
    callback: SuspendingCallback<E>,
}

impl<E: Entity> SuspendingAction<E> {
    pub fn new<F>(callback: F) -> Self
    where
        F: for<'a> Fn(&'a RuntimeContext<'a, E>) -> BoxFuture<'a, Result<Value, EvaluationError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl<E: Entity> Clone for SuspendingAction<E> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<E: Entity> ActionEvaluator<E> for SuspendingAction<E> {
    fn evaluate(&self, ctx: &RuntimeContext<'_, E>) -> Result<Value, EvaluationError> {
        futures::executor::block_on((self.callback)(ctx))
    }

    fn evaluate_suspending<'a>(
        &'a self,
        ctx: &'a RuntimeContext<'a, E>,
    ) -> BoxFuture<'a, Result<Value, EvaluationError>> {
        (self.callback)(ctx)
    }
}
