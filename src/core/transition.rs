//! Transition nodes: command-keyed directed edges between states.

use crate::core::chart::{StateId, TransitionId};
use crate::core::{Entity, Guard, StateNode};
use crate::eval::{ActionEvaluator, EmptyAction, EvaluationError, RuntimeContext};
use std::fmt;
use std::sync::Arc;

/// A directed edge between two states in the same chart.
///
/// At most one transition exists per ordered (source, target) pair; the
/// chart's find-or-create construction enforces this. The command is the
/// dispatch key; the guard and the secondary condition both have to accept
/// before the transition fires, guard first.
pub struct TransitionNode<E: Entity> {
    pub(crate) id: TransitionId,
    pub(crate) source: StateId,
    pub(crate) target: StateId,
    pub(crate) command: Option<String>,
    pub(crate) guard: Option<Guard<E>>,
    pub(crate) condition: Option<Guard<E>>,
    pub(crate) action: Arc<dyn ActionEvaluator<E>>,
}

impl<E: Entity> TransitionNode<E> {
    pub(crate) fn new(id: TransitionId, source: StateId, target: StateId) -> Self {
        Self {
            id,
            source,
            target,
            command: None,
            guard: None,
            condition: None,
            action: Arc::new(EmptyAction),
        }
    }

    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn source(&self) -> StateId {
        self.source
    }

    pub fn target(&self) -> StateId {
        self.target
    }

    /// The dispatch key, if one has been bound.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn has_guard(&self) -> bool {
        self.guard.is_some()
    }

    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }

    /// Evaluate guard then condition against the entity; both must accept.
    pub fn permits(
        &self,
        source: &StateNode<E>,
        entity: &E,
    ) -> Result<bool, EvaluationError> {
        let ctx = RuntimeContext {
            state: source,
            transition: Some(self),
            entity,
        };
        if let Some(guard) = &self.guard {
            if !guard.check(&ctx)? {
                return Ok(false);
            }
        }
        if let Some(condition) = &self.condition {
            if !condition.check(&ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<E: Entity> fmt::Debug for TransitionNode<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionNode")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("command", &self.command)
            .field("guard", &self.guard.is_some())
            .field("condition", &self.condition.is_some())
            .finish()
    }
}
