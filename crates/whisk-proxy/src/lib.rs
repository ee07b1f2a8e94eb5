//! Whisk action proxy
//!
//! A sidecar that speaks the two-phase action protocol over HTTP:
//! - `POST /init` unpacks a zip package, loads the module named by `main`
//!   and resolves `Module::Type::Function` once per process
//! - `POST /run` builds a fresh instance of the type and calls the method
//!   with the request's `value`, once per activation
//!
//! Actions are written against the `whisk-sdk` crate.

pub mod config;
pub mod error;
pub mod router;
pub mod runtime;

pub use config::ProxyConfig;
pub use error::{LoadError, ProxyError};
pub use router::create_router;
pub use runtime::{ActionRuntime, RuntimeState};
