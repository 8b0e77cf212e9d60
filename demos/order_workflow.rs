//! Order Workflow
//!
//! This example demonstrates a flat order chart built with the fluent API.
//!
//! Key concepts:
//! - Find-or-create construction: states appear on first mention
//! - Conditions gating transitions on entity data
//! - Native callbacks as transition actions and enter handlers
//! - A memory sink observing every evaluation and rejection
//!
//! Run with: cargo run --example order_workflow

use chartflow::core::Chart;
use chartflow::diag::{DiagnosticSink, MemorySink};
use chartflow::dispatch::Dispatcher;
use serde_json::json;
use std::sync::Arc;

fn main() {
    println!("=== Order Workflow ===\n");

    let mut chart: Chart<serde_json::Value> = Chart::new();
    chart
        .state("new")
        .on_enter_fn(|ctx| println!("  [Enter] {}", ctx.state.name()))
        .transition("paid")
        .command("pay")
        .condition(|order: &serde_json::Value| order["total"].as_i64().unwrap_or(0) > 0)
        .action_fn(|ctx| {
            println!(
                "  [Action] charging {} for order {:?}",
                ctx.entity["total"], ctx.entity["id"]
            )
        })
        .state("paid")
        .on_enter_fn(|ctx| println!("  [Enter] {}", ctx.state.name()))
        .transition("shipped")
        .command("ship")
        .transition("refunded")
        .command("refund")
        .state("shipped")
        .on_enter_fn(|ctx| println!("  [Enter] {}", ctx.state.name()));
    chart.initial("new");

    let sink = Arc::new(MemorySink::new());
    let mut dispatcher = Dispatcher::from_declared(&chart)
        .unwrap()
        .with_sink(Arc::clone(&sink) as Arc<dyn DiagnosticSink>);

    let empty_order = json!({ "id": "ord-0", "total": 0 });
    let order = json!({ "id": "ord-7", "total": 120 });

    println!("--- Paying an empty order is rejected ---");
    let outcome = dispatcher.dispatch("pay", &empty_order).unwrap();
    println!("  [Outcome] {outcome:?}");
    println!("  [Active] {}\n", dispatcher.active_state());

    println!("--- Paying a real order moves the cursor ---");
    let outcome = dispatcher.dispatch("pay", &order).unwrap();
    println!("  [Outcome] {outcome:?}");
    println!("  [Active] {}\n", dispatcher.active_state());

    println!("--- Shipping finishes the workflow ---");
    dispatcher.dispatch("ship", &order).unwrap();
    println!("  [Active] {}", dispatcher.active_state());
    println!("  [Terminal] {}\n", dispatcher.is_terminal());

    println!("--- Diagnostics collected along the way ---");
    for record in sink.records() {
        println!(
            "  [{:?}] state={} command={:?} entity={:?}",
            record.kind, record.state, record.command, record.entity
        );
    }
}
