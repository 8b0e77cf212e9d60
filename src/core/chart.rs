//! The chart: an arena of states and transitions with find-or-create
//! construction semantics.
//!
//! States live in an arena and are addressed by [`StateId`]; the chart
//! keeps a name index for lookup and iterates states in insertion order,
//! which keeps tests deterministic. Transitions are unique per ordered
//! (source, target) pair.

use crate::builder::{StateHandle, TransitionHandle};
use crate::core::{Entity, StateNode, TransitionNode};
use std::collections::HashMap;
use std::fmt;

/// Stable index of a state within its owning chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub(crate) usize);

/// Stable index of a transition within its owning chart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(pub(crate) usize);

/// A graph of states and transitions, optionally nested inside a
/// containing state.
///
/// Construction is additive and idempotent: requesting a known state or
/// transition returns the existing one. Topology is fixed once the chart
/// is handed to a [`Dispatcher`](crate::dispatch::Dispatcher), which only
/// ever reads it.
///
/// # Example
///
/// ```rust
/// use chartflow::core::Chart;
///
/// let mut chart: Chart<()> = Chart::new();
/// chart.initial("idle");
/// chart.transition("idle", "running").command("start");
/// chart.transition("running", "done").command("finish");
///
/// assert_eq!(chart.state_count(), 3);
/// assert_eq!(chart.transition_count(), 2);
/// ```
pub struct Chart<E: Entity> {
    pub(crate) name: Option<String>,
    pub(crate) initial: Option<StateId>,
    pub(crate) states: Vec<StateNode<E>>,
    pub(crate) by_name: HashMap<String, StateId>,
    pub(crate) transitions: Vec<TransitionNode<E>>,
    pub(crate) by_pair: HashMap<(StateId, StateId), TransitionId>,
    pub(crate) outgoing: Vec<Vec<TransitionId>>,
}

impl<E: Entity> Chart<E> {
    pub fn new() -> Self {
        Self {
            name: None,
            initial: None,
            states: Vec::new(),
            by_name: HashMap::new(),
            transitions: Vec::new(),
            by_pair: HashMap::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        let mut chart = Self::new();
        chart.name = Some(name.into());
        chart
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Find or create the state with this identifier. Never fails.
    pub fn state(&mut self, name: &str) -> StateHandle<'_, E> {
        let id = self.intern_state(name);
        StateHandle::new(self, id)
    }

    /// Find or create the transition for this ordered state pair, resolving
    /// or creating both endpoints first. An existing transition's
    /// configuration is returned unchanged.
    pub fn transition(&mut self, source: &str, target: &str) -> TransitionHandle<'_, E> {
        let source = self.intern_state(source);
        let target = self.intern_state(target);
        let id = self.intern_transition(source, target);
        TransitionHandle::new(self, id)
    }

    /// Declare the initial state, creating it if unknown.
    pub fn initial(&mut self, name: &str) -> &mut Self {
        let id = self.intern_state(name);
        self.initial = Some(id);
        self
    }

    pub fn initial_id(&self) -> Option<StateId> {
        self.initial
    }

    /// Resolve a state id by name without creating anything.
    pub fn lookup(&self, name: &str) -> Option<StateId> {
        self.by_name.get(name).copied()
    }

    /// The state node for an id issued by this chart.
    ///
    /// # Panics
    ///
    /// Panics if the id came from a different chart.
    pub fn node(&self, id: StateId) -> &StateNode<E> {
        &self.states[id.0]
    }

    pub fn node_by_name(&self, name: &str) -> Option<&StateNode<E>> {
        self.lookup(name).map(|id| self.node(id))
    }

    /// The transition node for an id issued by this chart.
    ///
    /// # Panics
    ///
    /// Panics if the id came from a different chart.
    pub fn transition_node(&self, id: TransitionId) -> &TransitionNode<E> {
        &self.transitions[id.0]
    }

    /// First transition out of `source` whose command matches, in creation
    /// order. The command is the dispatch key, so charts are expected to
    /// bind a command at most once per source state.
    pub fn find_command(&self, source: StateId, command: &str) -> Option<TransitionId> {
        self.outgoing[source.0]
            .iter()
            .copied()
            .find(|id| self.transitions[id.0].command.as_deref() == Some(command))
    }

    /// States in insertion order.
    pub fn states(&self) -> impl Iterator<Item = &StateNode<E>> {
        self.states.iter()
    }

    /// Transitions in creation order.
    pub fn transitions(&self) -> impl Iterator<Item = &TransitionNode<E>> {
        self.transitions.iter()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub(crate) fn node_mut(&mut self, id: StateId) -> &mut StateNode<E> {
        &mut self.states[id.0]
    }

    pub(crate) fn transition_node_mut(&mut self, id: TransitionId) -> &mut TransitionNode<E> {
        &mut self.transitions[id.0]
    }

    pub(crate) fn intern_state(&mut self, name: &str) -> StateId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = StateId(self.states.len());
        self.states.push(StateNode::new(id, name));
        self.outgoing.push(Vec::new());
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub(crate) fn intern_transition(&mut self, source: StateId, target: StateId) -> TransitionId {
        if let Some(id) = self.by_pair.get(&(source, target)) {
            return *id;
        }
        let id = TransitionId(self.transitions.len());
        self.transitions.push(TransitionNode::new(id, source, target));
        self.by_pair.insert((source, target), id);
        self.outgoing[source.0].push(id);
        id
    }
}

impl<E: Entity> Default for Chart<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> fmt::Debug for Chart<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chart")
            .field("name", &self.name)
            .field("initial", &self.initial)
            .field("states", &self.states.len())
            .field("transitions", &self.transitions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_construction_is_idempotent() {
        let mut chart: Chart<()> = Chart::new();
        let first = chart.state("alpha").id();
        let second = chart.state("alpha").id();

        assert_eq!(first, second);
        assert_eq!(chart.state_count(), 1);
    }

    #[test]
    fn transition_construction_is_idempotent() {
        let mut chart: Chart<()> = Chart::new();
        let first = chart.transition("a", "b").command("go").id();
        let second = chart.transition("a", "b").id();

        assert_eq!(first, second);
        assert_eq!(chart.transition_count(), 1);
        // The existing configuration is returned unchanged.
        assert_eq!(chart.transition_node(first).command(), Some("go"));
    }

    #[test]
    fn opposite_directions_are_distinct_transitions() {
        let mut chart: Chart<()> = Chart::new();
        let forward = chart.transition("a", "b").id();
        let backward = chart.transition("b", "a").id();

        assert_ne!(forward, backward);
        assert_eq!(chart.transition_count(), 2);
    }

    #[test]
    fn transition_creates_both_endpoints() {
        let mut chart: Chart<()> = Chart::new();
        chart.transition("a", "b");

        assert_eq!(chart.state_count(), 2);
        assert!(chart.lookup("a").is_some());
        assert!(chart.lookup("b").is_some());
    }

    #[test]
    fn states_iterate_in_insertion_order() {
        let mut chart: Chart<()> = Chart::new();
        chart.state("first");
        chart.state("second");
        chart.state("third");
        chart.state("second");

        let names: Vec<&str> = chart.states().map(StateNode::name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn find_command_matches_outgoing_key() {
        let mut chart: Chart<()> = Chart::new();
        chart.transition("a", "b").command("go");
        chart.transition("a", "c").command("stop");

        let a = chart.lookup("a").unwrap();
        let b = chart.lookup("b").unwrap();
        let c = chart.lookup("c").unwrap();

        let go = chart.find_command(a, "go").unwrap();
        assert_eq!(chart.transition_node(go).target(), b);

        let stop = chart.find_command(a, "stop").unwrap();
        assert_eq!(chart.transition_node(stop).target(), c);

        assert!(chart.find_command(a, "unknown").is_none());
        assert!(chart.find_command(b, "go").is_none());
    }

    #[test]
    fn initial_creates_the_state() {
        let mut chart: Chart<()> = Chart::new();
        chart.initial("start");
        assert_eq!(chart.initial_id(), chart.lookup("start"));
    }

    #[test]
    fn named_chart_reports_its_name() {
        let chart: Chart<()> = Chart::named("payments");
        assert_eq!(chart.name(), Some("payments"));
    }
}
