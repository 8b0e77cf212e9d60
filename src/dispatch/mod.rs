//! The dispatcher: hierarchical command dispatch over a chart.
//!
//! A dispatcher is attached to a chart plus an initial state and owns the
//! active-state pointer for every chart level, including the active
//! sub-state of any nested chart along the current path. Dispatch is
//! single-writer: `&mut self` serializes callers, and one command fully
//! completes (including nested sub-chart dispatch) before the next starts.
//!
//! Two entry points mirror the two evaluation forms: [`Dispatcher::dispatch`]
//! blocks, [`Dispatcher::dispatch_suspending`] suspends inside evaluator
//! calls. Once any action in the graph is asynchronous, use the suspending
//! path uniformly; driving an async action through the blocking path from
//! inside an async runtime risks deadlock.

use crate::builder::ConfigError;
use crate::core::{Chart, Entity, StateId, StateNode, TransitionNode};
use crate::diag::{emit, DiagnosticKind, DiagnosticRecord, DiagnosticSink, NullSink};
use crate::eval::{ActionEvaluator, EvaluationError, RuntimeContext};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Discriminated result of one dispatch call.
///
/// Only [`DispatchOutcome::Transitioned`] changes an active state. The
/// rejection variants are informational, not errors: the caller decides
/// how to react, and the engine never retries on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A transition fired; the reporting chart level moved from `from`
    /// to `to`.
    Transitioned { from: String, to: String },

    /// No outgoing transition of the active state matched the command.
    NoTransitionFound,

    /// A matching transition's guard or condition rejected the entity.
    /// The active state is unchanged.
    GuardRejected { from: String, to: String },

    /// The target state's entry guard rejected the entity. The active
    /// state is unchanged, but the source state's exit handlers have
    /// already run; this non-atomicity is inherent to the algorithm.
    EntryGuardRejected { from: String, to: String },
}

impl DispatchOutcome {
    pub fn is_transitioned(&self) -> bool {
        matches!(self, Self::Transitioned { .. })
    }
}

/// Which handler list was executing when an evaluation failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerPhase {
    Enter,
    Exit,
    PassThrough,
    TransitionAction,
}

impl fmt::Display for HandlerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Self::Enter => "on-enter",
            Self::Exit => "on-exit",
            Self::PassThrough => "pass-through",
            Self::TransitionAction => "transition action",
        };
        f.write_str(phase)
    }
}

/// Errors surfaced to the dispatch caller.
///
/// A failing handler aborts the remaining handlers in its list; whether
/// the active state moved depends on how far the algorithm got, which the
/// phase records.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("handler failed during {phase} of state '{state}': {source}")]
    ActionEvaluation {
        phase: HandlerPhase,
        state: String,
        #[source]
        source: EvaluationError,
    },

    #[error("guard evaluation failed in state '{state}': {source}")]
    GuardEvaluation {
        state: String,
        #[source]
        source: EvaluationError,
    },
}

/// Active-state pointer for one chart level, extended recursively for the
/// active nested chart, if any.
#[derive(Debug)]
struct Cursor {
    active: StateId,
    child: Option<Box<Cursor>>,
}

/// Build a cursor for `state`, descending declared nested initials without
/// running any handlers. Used when a dispatcher is first attached.
fn descend<E: Entity>(chart: &Chart<E>, state: StateId) -> Cursor {
    let child = chart
        .node(state)
        .nested()
        .and_then(|sub| sub.initial_id().map(|init| Box::new(descend(sub, init))));
    Cursor {
        active: state,
        child,
    }
}

/// Runtime component executing the hierarchical dispatch algorithm.
///
/// # Example
///
/// ```rust
/// use chartflow::chart;
/// use chartflow::core::Chart;
/// use chartflow::dispatch::Dispatcher;
///
/// let chart: Chart<()> = chart! {
///     initial: "one",
///     "one": { "go2" => "two" },
///     "two": { "go3" => "three" },
/// };
///
/// let mut dispatcher = Dispatcher::from_declared(&chart).unwrap();
/// dispatcher.dispatch("go2", &()).unwrap();
/// assert_eq!(dispatcher.active_state(), "two");
/// ```
pub struct Dispatcher<'c, E: Entity> {
    chart: &'c Chart<E>,
    cursor: Cursor,
    sink: Arc<dyn DiagnosticSink>,
    id: Uuid,
}

impl<'c, E: Entity> Dispatcher<'c, E> {
    /// Attach to a chart with an explicit initial state.
    pub fn new(chart: &'c Chart<E>, initial: &str) -> Result<Self, ConfigError> {
        let state = chart.lookup(initial).ok_or_else(|| ConfigError::UnknownState {
            name: initial.to_string(),
        })?;
        Ok(Self {
            chart,
            cursor: descend(chart, state),
            sink: Arc::new(NullSink),
            id: Uuid::new_v4(),
        })
    }

    /// Attach to a chart using its declared initial state.
    pub fn from_declared(chart: &'c Chart<E>) -> Result<Self, ConfigError> {
        let state = chart.initial_id().ok_or(ConfigError::MissingInitialState)?;
        Ok(Self {
            chart,
            cursor: descend(chart, state),
            sink: Arc::new(NullSink),
            id: Uuid::new_v4(),
        })
    }

    /// Inject the diagnostic sink records are emitted to.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Name of the outer active state.
    pub fn active_state(&self) -> &str {
        self.chart.node(self.cursor.active).name()
    }

    /// Active states from the outer chart inward through nested charts.
    pub fn active_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut chart = self.chart;
        let mut cursor = &self.cursor;
        loop {
            let node = chart.node(cursor.active);
            path.push(node.name());
            match (&cursor.child, node.nested()) {
                (Some(child), Some(sub)) => {
                    cursor = child;
                    chart = sub;
                }
                _ => break,
            }
        }
        path
    }

    /// True when no transition leaves the active state at any level.
    pub fn is_terminal(&self) -> bool {
        fn level<E: Entity>(chart: &Chart<E>, cursor: &Cursor) -> bool {
            let here = chart.outgoing[cursor.active.0].is_empty();
            let below = match (&cursor.child, chart.node(cursor.active).nested()) {
                (Some(child), Some(sub)) => level(sub, child),
                _ => true,
            };
            here && below
        }
        level(self.chart, &self.cursor)
    }

    /// Dispatch a command, blocking until evaluation completes.
    ///
    /// Do not call this from inside an async runtime if any action in the
    /// graph is asynchronous; use [`Self::dispatch_suspending`] instead.
    pub fn dispatch(
        &mut self,
        command: &str,
        entity: &E,
    ) -> Result<DispatchOutcome, DispatchError> {
        futures::executor::block_on(self.dispatch_suspending(command, entity))
    }

    /// Dispatch a command, suspending inside evaluator calls as needed.
    pub async fn dispatch_suspending(
        &mut self,
        command: &str,
        entity: &E,
    ) -> Result<DispatchOutcome, DispatchError> {
        dispatch_level(
            self.chart,
            &mut self.cursor,
            command,
            entity,
            &self.sink,
            self.id,
        )
        .await
    }
}

impl<E: Entity> fmt::Debug for Dispatcher<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("id", &self.id)
            .field("active", &self.active_path())
            .finish()
    }
}

fn record<E: Entity>(
    kind: DiagnosticKind,
    state: &str,
    command: Option<&str>,
    entity: &E,
    dispatcher: Uuid,
) -> DiagnosticRecord {
    let mut record = DiagnosticRecord::new(kind, state).with_dispatcher(dispatcher);
    if let Some(command) = command {
        record = record.with_command(command);
    }
    if let Some(identity) = entity.identity() {
        record = record.with_entity(identity);
    }
    record
}

/// Run one handler list in registration order. A failing handler aborts
/// the rest of the list and surfaces as `ActionEvaluationError`.
async fn run_list<E: Entity>(
    handlers: &[Arc<dyn ActionEvaluator<E>>],
    state: &StateNode<E>,
    transition: Option<&TransitionNode<E>>,
    entity: &E,
    phase: HandlerPhase,
    command: Option<&str>,
    sink: &Arc<dyn DiagnosticSink>,
    dispatcher: Uuid,
) -> Result<(), DispatchError> {
    for handler in handlers {
        emit(
            sink.as_ref(),
            record(
                DiagnosticKind::EvaluateAttempt,
                state.name(),
                command,
                entity,
                dispatcher,
            ),
        );
        let ctx = RuntimeContext {
            state,
            transition,
            entity,
        };
        if let Err(err) = handler.evaluate_suspending(&ctx).await {
            emit(
                sink.as_ref(),
                record(
                    DiagnosticKind::ActionEvaluationError,
                    state.name(),
                    command,
                    entity,
                    dispatcher,
                )
                .with_detail(err.to_string()),
            );
            return Err(DispatchError::ActionEvaluation {
                phase,
                state: state.name().to_string(),
                source: err,
            });
        }
    }
    Ok(())
}

/// Enter `state`: run its on-enter handlers, then recursively activate its
/// nested chart at the declared initial state.
fn activate<'a, E: Entity>(
    chart: &'a Chart<E>,
    state: StateId,
    entity: &'a E,
    sink: &'a Arc<dyn DiagnosticSink>,
    dispatcher: Uuid,
) -> BoxFuture<'a, Result<Cursor, DispatchError>> {
    async move {
        let node = chart.node(state);
        run_list(
            &node.enter,
            node,
            None,
            entity,
            HandlerPhase::Enter,
            None,
            sink,
            dispatcher,
        )
        .await?;

        let child = match node.nested() {
            Some(sub) => match sub.initial_id() {
                Some(init) => {
                    Some(Box::new(activate(sub, init, entity, sink, dispatcher).await?))
                }
                None => None,
            },
            None => None,
        };

        Ok(Cursor {
            active: state,
            child,
        })
    }
    .boxed()
}

/// One level of the hierarchical dispatch algorithm.
fn dispatch_level<'a, E: Entity>(
    chart: &'a Chart<E>,
    cursor: &'a mut Cursor,
    command: &'a str,
    entity: &'a E,
    sink: &'a Arc<dyn DiagnosticSink>,
    dispatcher: Uuid,
) -> BoxFuture<'a, Result<DispatchOutcome, DispatchError>> {
    async move {
        // Nested chart gets the first attempt. A fired sub-transition
        // consumes the command and leaves this level untouched; so does a
        // sub-level entry-guard rejection, whose exit handlers and
        // transition action already ran.
        let mut sub_outcome = None;
        let active = cursor.active;
        if let Some(child) = cursor.child.as_deref_mut() {
            if let Some(sub) = chart.node(active).nested() {
                match dispatch_level(sub, child, command, entity, sink, dispatcher).await? {
                    outcome @ (DispatchOutcome::Transitioned { .. }
                    | DispatchOutcome::EntryGuardRejected { .. }) => return Ok(outcome),
                    outcome => sub_outcome = Some(outcome),
                }
            }
        }

        let source = chart.node(cursor.active);

        let Some(transition_id) = chart.find_command(cursor.active, command) else {
            emit(
                sink.as_ref(),
                record(
                    DiagnosticKind::NoTransitionFound,
                    source.name(),
                    Some(command),
                    entity,
                    dispatcher,
                ),
            );
            run_list(
                &source.pass_through,
                source,
                None,
                entity,
                HandlerPhase::PassThrough,
                Some(command),
                sink,
                dispatcher,
            )
            .await?;
            // A sub-level guard rejection is more informative than an
            // outer no-match.
            return Ok(match sub_outcome {
                Some(outcome @ DispatchOutcome::GuardRejected { .. }) => outcome,
                _ => DispatchOutcome::NoTransitionFound,
            });
        };

        let transition = chart.transition_node(transition_id);
        let target = chart.node(transition.target());

        let permitted =
            transition
                .permits(source, entity)
                .map_err(|err| DispatchError::GuardEvaluation {
                    state: source.name().to_string(),
                    source: err,
                })?;
        if !permitted {
            emit(
                sink.as_ref(),
                record(
                    DiagnosticKind::NoTransitionFound,
                    source.name(),
                    Some(command),
                    entity,
                    dispatcher,
                )
                .with_detail(format!("guard rejected transition to '{}'", target.name())),
            );
            run_list(
                &source.pass_through,
                source,
                None,
                entity,
                HandlerPhase::PassThrough,
                Some(command),
                sink,
                dispatcher,
            )
            .await?;
            return Ok(DispatchOutcome::GuardRejected {
                from: source.name().to_string(),
                to: target.name().to_string(),
            });
        }

        run_list(
            &source.exit,
            source,
            Some(transition),
            entity,
            HandlerPhase::Exit,
            Some(command),
            sink,
            dispatcher,
        )
        .await?;

        run_list(
            std::slice::from_ref(&transition.action),
            source,
            Some(transition),
            entity,
            HandlerPhase::TransitionAction,
            Some(command),
            sink,
            dispatcher,
        )
        .await?;

        let enterable = target
            .enterable(Some(transition), entity)
            .map_err(|err| DispatchError::GuardEvaluation {
                state: target.name().to_string(),
                source: err,
            })?;
        if !enterable {
            // Exit handlers already ran; the active state stays put.
            emit(
                sink.as_ref(),
                record(
                    DiagnosticKind::EntryGuardRejected,
                    target.name(),
                    Some(command),
                    entity,
                    dispatcher,
                ),
            );
            return Ok(DispatchOutcome::EntryGuardRejected {
                from: source.name().to_string(),
                to: target.name().to_string(),
            });
        }

        let from = source.name().to_string();
        let target_id = transition.target();
        let entered = activate(chart, target_id, entity, sink, dispatcher).await?;
        cursor.active = entered.active;
        cursor.child = entered.child;

        Ok(DispatchOutcome::Transitioned {
            from,
            to: chart.node(target_id).name().to_string(),
        })
    }
    .boxed()
}
