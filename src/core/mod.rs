//! Core graph model: charts, states, transitions, guards, and the entity
//! they are all evaluated against.
//!
//! Construction is find-or-create and idempotent; topology is immutable
//! once a chart is handed to a dispatcher. All dispatch-time logic here is
//! read-only over the graph.

mod chart;
mod entity;
mod guard;
mod state;
mod transition;

pub use chart::{Chart, StateId, TransitionId};
pub use entity::Entity;
pub use guard::Guard;
pub use state::StateNode;
pub use transition::TransitionNode;
