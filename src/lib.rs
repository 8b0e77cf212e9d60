//! Chartflow: a hierarchical statechart engine
//!
//! Chartflow models workflows as charts of named states connected by
//! command-labelled transitions. Charts are built fluently (states and
//! transitions are found or created on first mention), or materialized
//! from declarative settings. A [`Dispatcher`](dispatch::Dispatcher)
//! walks one chart on behalf of an external entity, running guards,
//! transition actions, and state handlers as commands arrive, and
//! descending into nested sub-charts before trying its own level.
//!
//! # Core Concepts
//!
//! - **Chart**: an arena of states and transitions with a declared
//!   initial state ([`core::Chart`])
//! - **Guards**: predicates or compiled expressions gating transitions
//!   and state entry ([`core::Guard`])
//! - **Evaluators**: pluggable action strategies, from no-ops through
//!   native callbacks to lazily compiled script expressions
//!   ([`eval::ActionEvaluator`])
//! - **Dispatch**: blocking or suspending command delivery with a
//!   recursive active-state cursor ([`dispatch::Dispatcher`])
//! - **Schema**: serde-backed settings that materialize whole chart
//!   hierarchies from configuration ([`schema::Materializer`])
//! - **Diagnostics**: an injected sink observing compile attempts,
//!   evaluations, and rejections ([`diag::DiagnosticSink`])
//!
//! # Example
//!
//! ```rust
//! use chartflow::core::Chart;
//! use chartflow::dispatch::Dispatcher;
//! use serde_json::json;
//!
//! let mut chart: Chart<serde_json::Value> = Chart::new();
//! chart
//!     .state("draft")
//!     .transition("review")
//!     .command("submit")
//!     .condition(|order: &serde_json::Value| order["total"].as_i64().unwrap_or(0) > 0)
//!     .state("review")
//!     .transition("published")
//!     .command("approve");
//! chart.initial("draft");
//!
//! let order = json!({ "id": "ord-7", "total": 120 });
//! let mut dispatcher = Dispatcher::from_declared(&chart).unwrap();
//!
//! dispatcher.dispatch("submit", &order).unwrap();
//! assert_eq!(dispatcher.active_state(), "review");
//!
//! dispatcher.dispatch("approve", &order).unwrap();
//! assert_eq!(dispatcher.active_state(), "published");
//! assert!(dispatcher.is_terminal());
//! ```

pub mod builder;
pub mod core;
pub mod diag;
pub mod dispatch;
pub mod eval;
pub mod schema;

// Re-export commonly used types
pub use builder::{ConfigError, StateHandle, TransitionHandle};
pub use core::{Chart, Entity, Guard, StateId, StateNode, TransitionId, TransitionNode};
pub use diag::{DiagnosticKind, DiagnosticRecord, DiagnosticSink, MemorySink, NullSink};
pub use dispatch::{DispatchError, DispatchOutcome, Dispatcher};
pub use eval::{
    default_engine, ActionEvaluator, CompiledAction, CompiledExpr, DirectAction, EmptyAction,
    EvaluationError, RuntimeContext,
};
pub use schema::{Materializer, StatechartSettings};
