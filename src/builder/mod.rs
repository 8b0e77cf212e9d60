//! Fluent construction handles over the chart arena.
//!
//! [`Chart::state`] and [`Chart::transition`] return lightweight handles
//! that borrow the chart mutably. Every configuration method returns a
//! handle again, so multi-state, multi-transition definitions read as a
//! single expression chain while all nodes stay in the arena.

pub mod error;
pub mod macros;

pub use error::ConfigError;

use crate::core::{Chart, Entity, Guard, StateId, TransitionId};
use crate::eval::{ActionEvaluator, DirectAction, RuntimeContext};
use std::sync::Arc;

/// Chainable configuration handle for one state.
///
/// # Example
///
/// ```rust
/// use chartflow::core::Chart;
/// use chartflow::eval::RuntimeContext;
///
/// let mut chart: Chart<()> = Chart::new();
/// chart
///     .state("review")
///     .guard(|_: &()| true)
///     .on_enter_fn(|_ctx: &RuntimeContext<'_, ()>| {})
///     .transition("published")
///     .command("approve");
///
/// assert_eq!(chart.state_count(), 2);
/// ```
pub struct StateHandle<'c, E: Entity> {
    chart: &'c mut Chart<E>,
    id: StateId,
}

impl<'c, E: Entity> StateHandle<'c, E> {
    pub(crate) fn new(chart: &'c mut Chart<E>, id: StateId) -> Self {
        Self { chart, id }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.chart.node(self.id).name()
    }

    /// Append an on-enter evaluator. Handlers fire in registration order.
    pub fn on_enter<A>(self, action: A) -> Self
    where
        A: ActionEvaluator<E> + 'static,
    {
        self.on_enter_shared(Arc::new(action))
    }

    pub fn on_enter_fn<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&RuntimeContext<'a, E>) + Send + Sync + 'static,
    {
        self.on_enter(DirectAction::new(f))
    }

    pub fn on_enter_shared(self, action: Arc<dyn ActionEvaluator<E>>) -> Self {
        self.chart.node_mut(self.id).enter.push(action);
        self
    }

    /// Append an on-exit evaluator.
    pub fn on_exit<A>(self, action: A) -> Self
    where
        A: ActionEvaluator<E> + 'static,
    {
        self.on_exit_shared(Arc::new(action))
    }

    pub fn on_exit_fn<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&RuntimeContext<'a, E>) + Send + Sync + 'static,
    {
        self.on_exit(DirectAction::new(f))
    }

    pub fn on_exit_shared(self, action: Arc<dyn ActionEvaluator<E>>) -> Self {
        self.chart.node_mut(self.id).exit.push(action);
        self
    }

    /// Append a pass-through evaluator, fired when a command is not
    /// consumed while this state is active.
    pub fn on_pass_through<A>(self, action: A) -> Self
    where
        A: ActionEvaluator<E> + 'static,
    {
        self.on_pass_through_shared(Arc::new(action))
    }

    pub fn on_pass_through_fn<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&RuntimeContext<'a, E>) + Send + Sync + 'static,
    {
        self.on_pass_through(DirectAction::new(f))
    }

    pub fn on_pass_through_shared(self, action: Arc<dyn ActionEvaluator<E>>) -> Self {
        self.chart.node_mut(self.id).pass_through.push(action);
        self
    }

    /// Append to the conjunctive entry-guard chain: the state may be
    /// entered only if every registered guard accepts.
    pub fn guard<F>(self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.guard_with(Guard::new(predicate))
    }

    pub fn guard_with(self, guard: Guard<E>) -> Self {
        self.chart.node_mut(self.id).guards.push(guard);
        self
    }

    /// Set the display value (defaults to the state name).
    pub fn display(self, value: impl Into<String>) -> Self {
        self.chart.node_mut(self.id).display = Some(value.into());
        self
    }

    /// Tag the state with a host-defined permission.
    pub fn permission(self, value: impl Into<String>) -> Self {
        self.chart.node_mut(self.id).permission = Some(value.into());
        self
    }

    /// The state's nested sub-chart, created on first access and stable
    /// for the state's lifetime.
    pub fn chart(self) -> &'c mut Chart<E> {
        let chart = self.chart;
        let node = &mut chart.states[self.id.0];
        &mut **node.nested.get_or_insert_with(|| Box::new(Chart::new()))
    }

    /// Find or create a transition from this state, delegating to the
    /// containing chart.
    pub fn transition(self, target: &str) -> TransitionHandle<'c, E> {
        let chart = self.chart;
        let target = chart.intern_state(target);
        let id = chart.intern_transition(self.id, target);
        TransitionHandle::new(chart, id)
    }
}

/// Chainable configuration handle for one transition.
///
/// `state` and `transition` jump back into the containing chart so several
/// transitions can be defined from a single expression chain.
pub struct TransitionHandle<'c, E: Entity> {
    chart: &'c mut Chart<E>,
    id: TransitionId,
}

impl<'c, E: Entity> TransitionHandle<'c, E> {
    pub(crate) fn new(chart: &'c mut Chart<E>, id: TransitionId) -> Self {
        Self { chart, id }
    }

    pub fn id(&self) -> TransitionId {
        self.id
    }

    pub fn source(&self) -> StateId {
        self.chart.transition_node(self.id).source()
    }

    pub fn target(&self) -> StateId {
        self.chart.transition_node(self.id).target()
    }

    /// Bind the command that dispatches this transition.
    pub fn command(self, value: impl Into<String>) -> Self {
        self.chart.transition_node_mut(self.id).command = Some(value.into());
        self
    }

    /// Replace the guard predicate.
    pub fn guard<F>(self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.guard_with(Guard::new(predicate))
    }

    pub fn guard_with(self, guard: Guard<E>) -> Self {
        self.chart.transition_node_mut(self.id).guard = Some(guard);
        self
    }

    /// Replace the secondary condition, evaluated after the guard.
    pub fn condition<F>(self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.condition_with(Guard::new(predicate))
    }

    pub fn condition_with(self, guard: Guard<E>) -> Self {
        self.chart.transition_node_mut(self.id).condition = Some(guard);
        self
    }

    /// Replace the action executed when the transition fires.
    pub fn action<A>(self, action: A) -> Self
    where
        A: ActionEvaluator<E> + 'static,
    {
        self.action_shared(Arc::new(action))
    }

    pub fn action_fn<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&RuntimeContext<'a, E>) + Send + Sync + 'static,
    {
        self.action(DirectAction::new(f))
    }

    pub fn action_shared(self, action: Arc<dyn ActionEvaluator<E>>) -> Self {
        self.chart.transition_node_mut(self.id).action = action;
        self
    }

    /// Jump to a state handle in the containing chart.
    pub fn state(self, name: &str) -> StateHandle<'c, E> {
        let chart = self.chart;
        let id = chart.intern_state(name);
        StateHandle::new(chart, id)
    }

    /// Find or create another transition from the same source state.
    pub fn transition(self, target: &str) -> TransitionHandle<'c, E> {
        let chart = self.chart;
        let source = chart.transition_node(self.id).source();
        let target = chart.intern_state(target);
        let id = chart.intern_transition(source, target);
        TransitionHandle::new(chart, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fluent_chain_defines_multiple_transitions() {
        let mut chart: Chart<()> = Chart::new();
        chart
            .state("idle")
            .transition("running")
            .command("start")
            .transition("cancelled")
            .command("cancel")
            .state("running")
            .transition("done")
            .command("finish");

        assert_eq!(chart.state_count(), 4);
        assert_eq!(chart.transition_count(), 3);

        let idle = chart.lookup("idle").unwrap();
        assert!(chart.find_command(idle, "start").is_some());
        assert!(chart.find_command(idle, "cancel").is_some());
    }

    #[test]
    fn handlers_accumulate_in_registration_order() {
        let mut chart: Chart<()> = Chart::new();
        chart
            .state("s")
            .on_enter_fn(|_| {})
            .on_enter_fn(|_| {})
            .on_exit_fn(|_| {});

        let node = chart.node_by_name("s").unwrap();
        assert_eq!(node.enter.len(), 2);
        assert_eq!(node.exit.len(), 1);
        assert_eq!(node.pass_through.len(), 0);
    }

    #[test]
    fn nested_chart_is_created_once_and_reused() {
        let mut chart: Chart<()> = Chart::new();
        chart.state("outer").chart().initial("inner-start");
        let inner_first = chart.node_by_name("outer").unwrap().nested().unwrap() as *const _;

        chart.state("outer").chart().state("inner-other");
        let nested = chart.node_by_name("outer").unwrap().nested().unwrap();
        assert_eq!(nested as *const _, inner_first);
        assert_eq!(nested.state_count(), 2);
    }

    #[test]
    fn transition_action_replaces_default() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let mut chart: Chart<()> = Chart::new();
        chart
            .transition("a", "b")
            .command("go")
            .action_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

        let a = chart.lookup("a").unwrap();
        let id = chart.find_command(a, "go").unwrap();
        let node = chart.transition_node(id);
        let ctx = RuntimeContext::new(chart.node(a), &()).with_transition(node);
        node.action.evaluate(&ctx).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn state_and_display_metadata_are_stored() {
        let mut chart: Chart<()> = Chart::new();
        chart
            .state("archived")
            .display("Archived order")
            .permission("orders:read");

        let node = chart.node_by_name("archived").unwrap();
        assert_eq!(node.display(), "Archived order");
        assert_eq!(node.permission(), Some("orders:read"));
    }
}
