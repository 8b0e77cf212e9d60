//! Schema-Driven Chart
//!
//! This example demonstrates materializing a chart from JSON settings.
//!
//! Key concepts:
//! - camelCase settings deserialized with serde
//! - Script expressions compiled lazily as conditions and actions
//! - `@name` action strings resolving to registered native callbacks
//! - Sub-chart references assembled across settings documents
//!
//! Run with: cargo run --example schema_driven

use chartflow::dispatch::Dispatcher;
use chartflow::eval::{DirectAction, RuntimeContext};
use chartflow::schema::{Materializer, StatechartSettings};
use serde_json::json;
use std::sync::Arc;

fn main() {
    println!("=== Schema-Driven Chart ===\n");

    let documents: Vec<StatechartSettings> = serde_json::from_value(json!([
        {
            "name": "ticket",
            "initialState": "open",
            "states": [
                {
                    "name": "open",
                    "value": "Open ticket",
                    "transitions": [
                        {
                            "event": "assign",
                            "target": "inProgress",
                            "condition": "entity.assignee != \"\"",
                            "action": "@announce"
                        }
                    ]
                },
                {
                    "name": "inProgress",
                    "subChartReference": "triage",
                    "transitions": [
                        { "event": "resolve", "target": "closed" }
                    ]
                },
                { "name": "closed" }
            ]
        },
        {
            "name": "triage",
            "initialState": "investigating",
            "states": [
                {
                    "name": "investigating",
                    "transitions": [
                        { "event": "escalate", "target": "escalated" }
                    ]
                },
                { "name": "escalated" }
            ]
        }
    ]))
    .unwrap();

    let materializer: Materializer<serde_json::Value> = Materializer::new().register_action(
        "announce",
        Arc::new(DirectAction::new(|ctx: &RuntimeContext<'_, serde_json::Value>| {
            println!(
                "  [Callback] ticket {:?} assigned to {}",
                ctx.entity["id"], ctx.entity["assignee"]
            )
        })),
    );

    let chart = materializer.materialize_all(&documents, "ticket").unwrap();
    println!(
        "  [Chart] {:?}: {} states, {} transitions\n",
        chart.name(),
        chart.state_count(),
        chart.transition_count()
    );

    let ticket = json!({ "id": "tck-3", "assignee": "sam" });
    let mut dispatcher = Dispatcher::from_declared(&chart).unwrap();

    println!("--- assign runs the compiled condition and the callback ---");
    dispatcher.dispatch("assign", &ticket).unwrap();
    println!("  [Path] {:?}\n", dispatcher.active_path());

    println!("--- escalate is handled inside the triage sub-chart ---");
    dispatcher.dispatch("escalate", &ticket).unwrap();
    println!("  [Path] {:?}\n", dispatcher.active_path());

    println!("--- resolve bubbles to the outer chart ---");
    dispatcher.dispatch("resolve", &ticket).unwrap();
    println!("  [Path] {:?}", dispatcher.active_path());
    println!("  [Terminal] {}", dispatcher.is_terminal());
}
