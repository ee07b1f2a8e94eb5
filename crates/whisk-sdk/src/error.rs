//! Error types for actions

use std::backtrace::{Backtrace, BacktraceStatus};

use thiserror::Error;

/// Errors an action can return from a method call
///
/// The proxy reports the `Display` text of the error to the caller. When a
/// backtrace was captured at construction (see [`ActionError::failed`]) and
/// the proxy runs with stack traces enabled, the trace is appended.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("{message}")]
    Failed {
        message: String,
        trace: Option<String>,
    },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Instance is not a {0}")]
    InstanceMismatch(&'static str),
}

impl ActionError {
    /// Create a generic failure, capturing a backtrace if `RUST_BACKTRACE` is set
    pub fn failed(message: impl Into<String>) -> Self {
        let backtrace = Backtrace::capture();
        let trace = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };

        ActionError::Failed {
            message: message.into(),
            trace,
        }
    }

    /// Backtrace captured when the error was created, if any
    pub fn trace(&self) -> Option<&str> {
        match self {
            ActionError::Failed { trace, .. } => trace.as_deref(),
            _ => None,
        }
    }
}
