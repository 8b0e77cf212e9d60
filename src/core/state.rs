//! State nodes: named graph vertices with hooks, guards, and nested charts.

use crate::core::chart::{Chart, StateId};
use crate::core::{Entity, Guard, TransitionNode};
use crate::eval::{ActionEvaluator, EvaluationError, RuntimeContext};
use std::fmt;
use std::sync::Arc;

/// A named node in a chart.
///
/// Owns ordered on-enter, on-exit, and pass-through evaluator lists, a
/// conjunctive entry-guard chain, and at most one nested sub-chart. Nodes
/// are created through [`Chart::state`] (find-or-create) and configured
/// through [`StateHandle`](crate::builder::StateHandle); at dispatch time
/// they are read-only.
pub struct StateNode<E: Entity> {
    pub(crate) id: StateId,
    pub(crate) name: String,
    pub(crate) display: Option<String>,
    pub(crate) permission: Option<String>,
    pub(crate) guards: Vec<Guard<E>>,
    pub(crate) enter: Vec<Arc<dyn ActionEvaluator<E>>>,
    pub(crate) exit: Vec<Arc<dyn ActionEvaluator<E>>>,
    pub(crate) pass_through: Vec<Arc<dyn ActionEvaluator<E>>>,
    pub(crate) nested: Option<Box<Chart<E>>>,
}

impl<E: Entity> StateNode<E> {
    pub(crate) fn new(id: StateId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            display: None,
            permission: None,
            guards: Vec::new(),
            enter: Vec::new(),
            exit: Vec::new(),
            pass_through: Vec::new(),
            nested: None,
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    /// The unique lookup key within the owning chart.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display value; falls back to the name.
    pub fn display(&self) -> &str {
        self.display.as_deref().unwrap_or(&self.name)
    }

    /// Host-defined permission tag carried from schema settings.
    pub fn permission(&self) -> Option<&str> {
        self.permission.as_deref()
    }

    /// The nested sub-chart, if one has been created.
    pub fn nested(&self) -> Option<&Chart<E>> {
        self.nested.as_deref()
    }

    pub fn has_nested(&self) -> bool {
        self.nested.is_some()
    }

    pub fn guard_count(&self) -> usize {
        self.guards.len()
    }

    /// True when every registered entry guard accepts the entity.
    ///
    /// An empty guard chain always accepts.
    pub fn enterable(
        &self,
        transition: Option<&TransitionNode<E>>,
        entity: &E,
    ) -> Result<bool, EvaluationError> {
        let ctx = RuntimeContext {
            state: self,
            transition,
            entity,
        };
        for guard in &self.guards {
            if !guard.check(&ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<E: Entity> fmt::Debug for StateNode<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("guards", &self.guards.len())
            .field("enter", &self.enter.len())
            .field("exit", &self.exit.len())
            .field("pass_through", &self.pass_through.len())
            .field("nested", &self.nested.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_falls_back_to_name() {
        let mut chart: Chart<()> = Chart::new();
        let id = chart.state("draft").id();
        assert_eq!(chart.node(id).display(), "draft");
    }

    #[test]
    fn empty_guard_chain_always_accepts() {
        let mut chart: Chart<()> = Chart::new();
        let id = chart.state("open").id();
        assert!(chart.node(id).enterable(None, &()).unwrap());
    }

    #[test]
    fn guard_chain_is_conjunctive() {
        let mut chart: Chart<serde_json::Value> = Chart::new();
        chart
            .state("vip")
            .guard(|e: &serde_json::Value| e["age"].as_i64().unwrap_or(0) >= 18)
            .guard(|e: &serde_json::Value| e["member"] == serde_json::json!(true));
        let node = chart.node_by_name("vip").unwrap();

        let both = serde_json::json!({ "age": 30, "member": true });
        assert!(node.enterable(None, &both).unwrap());

        let one = serde_json::json!({ "age": 30, "member": false });
        assert!(!node.enterable(None, &one).unwrap());
    }

    #[test]
    fn always_false_guard_makes_state_unenterable() {
        let mut chart: Chart<()> = Chart::new();
        chart
            .state("never")
            .guard(|_: &()| true)
            .guard(|_: &()| false);
        let node = chart.node_by_name("never").unwrap();
        assert!(!node.enterable(None, &()).unwrap());
    }
}
