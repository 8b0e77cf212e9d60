//! Property-based tests for chart construction and dispatch.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use chartflow::core::Chart;
use chartflow::dispatch::{DispatchOutcome, Dispatcher};
use proptest::prelude::*;
use std::collections::HashSet;

prop_compose! {
    fn state_name()(index in 0..12usize) -> String {
        format!("state-{index}")
    }
}

prop_compose! {
    fn command_name()(index in 0..8usize) -> String {
        format!("cmd-{index}")
    }
}

proptest! {
    #[test]
    fn repeated_state_mentions_never_duplicate(
        names in prop::collection::vec(state_name(), 1..40)
    ) {
        let mut chart: Chart<()> = Chart::new();
        for name in &names {
            chart.state(name);
        }

        let distinct: HashSet<&str> = names.iter().map(String::as_str).collect();
        prop_assert_eq!(chart.state_count(), distinct.len());

        for name in &names {
            prop_assert!(chart.lookup(name).is_some());
        }
    }

    #[test]
    fn repeated_transition_mentions_never_duplicate(
        pairs in prop::collection::vec((state_name(), state_name()), 1..40)
    ) {
        let mut chart: Chart<()> = Chart::new();
        for (source, target) in &pairs {
            chart.transition(source, target);
        }

        let distinct: HashSet<(&str, &str)> = pairs
            .iter()
            .map(|(s, t)| (s.as_str(), t.as_str()))
            .collect();
        prop_assert_eq!(chart.transition_count(), distinct.len());
    }

    #[test]
    fn states_iterate_in_first_mention_order(
        names in prop::collection::vec(state_name(), 1..40)
    ) {
        let mut chart: Chart<()> = Chart::new();
        for name in &names {
            chart.state(name);
        }

        let mut first_mentions = Vec::new();
        let mut seen = HashSet::new();
        for name in &names {
            if seen.insert(name.as_str()) {
                first_mentions.push(name.as_str());
            }
        }

        let iterated: Vec<&str> = chart.states().map(|node| node.name()).collect();
        prop_assert_eq!(iterated, first_mentions);
    }

    #[test]
    fn entry_guards_are_conjunctive(accepts in prop::collection::vec(any::<bool>(), 0..6)) {
        let mut chart: Chart<()> = Chart::new();
        {
            let mut handle = chart.state("gated");
            for accept in &accepts {
                let accept = *accept;
                handle = handle.guard(move |_: &()| accept);
            }
            let _ = handle;
        }

        let node = chart.node_by_name("gated").unwrap();
        let expected = accepts.iter().all(|accept| *accept);
        prop_assert_eq!(node.enterable(None, &()).unwrap(), expected);
    }

    #[test]
    fn dispatch_walks_a_linear_chain(hops in 1..8usize) {
        let mut chart: Chart<()> = Chart::new();
        for hop in 0..hops {
            chart
                .transition(&format!("step-{hop}"), &format!("step-{}", hop + 1))
                .command(&format!("advance-{hop}"));
        }
        chart.initial("step-0");

        let mut dispatcher = Dispatcher::from_declared(&chart).unwrap();
        for hop in 0..hops {
            let outcome = dispatcher.dispatch(&format!("advance-{hop}"), &()).unwrap();
            prop_assert!(outcome.is_transitioned());
        }

        let expected = format!("step-{hops}");
        prop_assert_eq!(dispatcher.active_state(), expected.as_str());
        prop_assert!(dispatcher.is_terminal());
    }

    #[test]
    fn unknown_commands_leave_the_cursor_alone(
        command in command_name(),
        bound in command_name(),
    ) {
        prop_assume!(command != bound);

        let mut chart: Chart<()> = Chart::new();
        chart.transition("a", "b").command(&bound);
        chart.initial("a");

        let mut dispatcher = Dispatcher::from_declared(&chart).unwrap();
        let outcome = dispatcher.dispatch(&command, &()).unwrap();

        prop_assert!(matches!(outcome, DispatchOutcome::NoTransitionFound));
        prop_assert_eq!(dispatcher.active_state(), "a");
    }

    #[test]
    fn rejecting_condition_never_moves_the_cursor(total in -50i64..50) {
        let mut chart: Chart<i64> = Chart::new();
        chart
            .transition("new", "paid")
            .command("pay")
            .condition(|amount: &i64| *amount > 0);
        chart.initial("new");

        let mut dispatcher = Dispatcher::from_declared(&chart).unwrap();
        let outcome = dispatcher.dispatch("pay", &total).unwrap();

        if total > 0 {
            prop_assert!(outcome.is_transitioned());
            prop_assert_eq!(dispatcher.active_state(), "paid");
        } else {
            let rejected = matches!(outcome, DispatchOutcome::GuardRejected { .. });
            prop_assert!(rejected);
            prop_assert_eq!(dispatcher.active_state(), "new");
        }
    }
}
