//! Build-time configuration errors.
//!
//! All of these are fatal: they surface immediately from construction or
//! schema materialization and never occur during dispatch.

use thiserror::Error;

/// Errors raised while building a chart or attaching a dispatcher.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("chart declares no initial state")]
    MissingInitialState,

    #[error("unknown state '{name}'")]
    UnknownState { name: String },

    #[error("duplicate state '{name}' in settings")]
    DuplicateState { name: String },

    #[error("sub-chart reference '{name}' does not match any statechart settings")]
    UnknownSubChart { name: String },

    #[error("sub-chart references form a cycle through '{name}'")]
    CircularSubChart { name: String },

    #[error("no action registered under '{name}'")]
    MissingCallback { name: String },
}
