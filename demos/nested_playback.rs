//! Nested Playback
//!
//! This example demonstrates hierarchical dispatch through a sub-chart.
//!
//! Key concepts:
//! - A state owning a nested chart with its own initial state
//! - Commands offered to the innermost active level first
//! - Unconsumed commands bubbling out to the parent chart
//! - Pass-through handlers observing commands nobody consumed
//! - Re-entering a container resets its sub-chart to its initial state
//!
//! Run with: cargo run --example nested_playback

use chartflow::core::Chart;
use chartflow::dispatch::Dispatcher;

fn main() {
    println!("=== Nested Playback ===\n");

    let mut chart: Chart<()> = Chart::new();
    chart
        .state("stopped")
        .transition("playing")
        .command("play");
    chart
        .state("playing")
        .on_enter_fn(|_| println!("  [Enter] playing"))
        .on_pass_through_fn(|ctx| {
            println!("  [PassThrough] {} saw an unconsumed command", ctx.state.name())
        })
        .transition("stopped")
        .command("stop");

    {
        let speed = chart.state("playing").chart();
        speed.initial("x1");
        speed.transition("x1", "x2").command("faster");
        speed.transition("x2", "x1").command("slower");
        speed
            .state("x2")
            .on_enter_fn(|_| println!("  [Enter] x2 (double speed)"));
    }
    chart.initial("stopped");

    let mut dispatcher = Dispatcher::from_declared(&chart).unwrap();
    println!("  [Path] {:?}\n", dispatcher.active_path());

    println!("--- play enters the container and its sub-chart ---");
    dispatcher.dispatch("play", &()).unwrap();
    println!("  [Path] {:?}\n", dispatcher.active_path());

    println!("--- faster is consumed by the inner level ---");
    dispatcher.dispatch("faster", &()).unwrap();
    println!("  [Path] {:?}\n", dispatcher.active_path());

    println!("--- rewind matches nowhere, pass-through fires ---");
    let outcome = dispatcher.dispatch("rewind", &()).unwrap();
    println!("  [Outcome] {outcome:?}\n");

    println!("--- stop bubbles out to the parent level ---");
    dispatcher.dispatch("stop", &()).unwrap();
    println!("  [Path] {:?}\n", dispatcher.active_path());

    println!("--- re-entering resets the sub-chart to x1 ---");
    dispatcher.dispatch("play", &()).unwrap();
    println!("  [Path] {:?}", dispatcher.active_path());
}
