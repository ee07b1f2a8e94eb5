//! Error types for the action proxy
//!
//! Every failure the control protocol can report is a [`ProxyError`]. All of
//! them except [`ProxyError::UnknownPath`] are answered with status 502 and a
//! `{"error": "<message>"}` body.

use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Failures while resolving `Module::Type::Function` in a loaded module
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unable to load module (\"{file}\"): {cause}")]
    Module { file: String, cause: String },

    #[error("Unable to locate requested type (\"{0}\").")]
    TypeNotFound(String),

    #[error("Unable to locate requested method (\"{0}\").")]
    MethodNotFound(String),

    #[error("Unable to locate appropriate constructor for (\"{0}\").")]
    ConstructorNotFound(String),
}

/// Errors returned by the init/run control protocol
#[derive(Error, Debug)]
pub enum ProxyError {
    // State errors
    #[error("Cannot initialize the action more than once.")]
    AlreadyInitialized,

    #[error("Cannot invoke an uninitialized action.")]
    Uninitialized,

    // Protocol errors
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Missing main/no code to execute.")]
    MissingMainOrCode,

    #[error("code must be binary (zip file).")]
    NotBinary,

    #[error("main required format is \"Module::Type::Function\".")]
    MainFormat,

    #[error("Unable to decode package: {0}")]
    InvalidCode(String),

    // Load errors
    #[error("Unable to decompress package.")]
    Decompress,

    #[error("Unable to locate requested module (\"{0}\").")]
    ModuleNotFound(String),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Unable to prepare action directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Initialization aborted: {0}")]
    InitAborted(String),

    // Runtime errors
    #[error("The action returned null")]
    NullResult,

    #[error("{message}")]
    ActionFailed {
        message: String,
        trace: Option<String>,
    },

    // Routing
    #[error("Unknown path: {0}")]
    UnknownPath(String),
}

impl ProxyError {
    /// Convert the error to an HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::UnknownPath(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message reported to the caller; traces are appended only when enabled
    pub fn message(&self, include_trace: bool) -> String {
        match self {
            ProxyError::ActionFailed {
                message,
                trace: Some(trace),
            } if include_trace => format!("{}, {}", message, trace),
            _ => self.to_string(),
        }
    }

    /// Build the `{"error": ...}` response
    pub fn to_response(&self, include_trace: bool) -> Response {
        let body = serde_json::json!({ "error": self.message(include_trace) });
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<BytesRejection> for ProxyError {
    fn from(rejection: BytesRejection) -> Self {
        ProxyError::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.to_response(false)
    }
}
