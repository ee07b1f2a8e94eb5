//! Runtime module - the init/run handshake and action execution
//!
//! This module provides:
//! - One-shot initialization (package unpacking, module loading, entry-point resolution)
//! - Per-request invocation with failure isolation
//! - Environment propagation under the protocol's naming conventions
//! - Activation log markers

pub mod bundle;
pub mod env;
pub mod init;
pub mod invoke;
pub mod loader;
pub mod marker;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use serde_json::Value;

pub use bundle::BundleUnpacker;
pub use env::EnvironmentPropagator;
pub use init::{Initializer, RuntimeState};
pub use invoke::Invoker;
pub use loader::{CodeLoader, DylibLoader, MainSymbol, ResolvedEntryPoint, StaticLoader};
pub use marker::{
    ActivationLogMarker, CountingSink, LogSink, StdStreams, StreamSink, ACTIVATION_SENTINEL,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;

/// The action held by this process: one initializer, many invocations
pub struct ActionRuntime {
    initializer: Initializer,
    invoker: Invoker,
    log_sink: Arc<dyn LogSink>,
    stack_traces: bool,
}

impl ActionRuntime {
    /// Create a runtime that loads packages with `loader`
    pub fn new(config: &ProxyConfig, loader: Arc<dyn CodeLoader>) -> Self {
        let propagator = EnvironmentPropagator::new(config.export_process_env);

        Self {
            initializer: Initializer::new(
                loader,
                BundleUnpacker::new(&config.work_dir),
                propagator.clone(),
            ),
            invoker: Invoker::new(propagator),
            log_sink: Arc::new(StdStreams::stdio()),
            stack_traces: config.stack_traces,
        }
    }

    /// Send activation markers somewhere other than stdout/stderr
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = sink;
        self
    }

    pub fn state(&self) -> RuntimeState {
        self.initializer.state()
    }

    /// Whether failure messages carry stack traces
    pub fn stack_traces(&self) -> bool {
        self.stack_traces
    }

    /// Handle an init request. Failed attempts end with an activation marker.
    pub async fn init(&self, body: &[u8]) -> Result<(), ProxyError> {
        let marker = ActivationLogMarker::new(Arc::clone(&self.log_sink));

        match self.initializer.initialize(body).await {
            Ok(_) => {
                marker.disarm();
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Initialization failed");
                Err(e)
            }
        }
    }

    /// Fail a request whose body never reached init or run, still ending it with a marker
    pub fn reject(&self, err: ProxyError) -> ProxyError {
        let _marker = ActivationLogMarker::new(Arc::clone(&self.log_sink));
        tracing::error!(error = %err, "Request rejected");
        err
    }

    /// Handle a run request. Every attempt ends with an activation marker.
    pub async fn run(&self, body: &[u8]) -> Result<Value, ProxyError> {
        let _marker = ActivationLogMarker::new(Arc::clone(&self.log_sink));

        let entry = self.initializer.entry().ok_or(ProxyError::Uninitialized)?;
        let result = self.invoker.invoke(entry, body).await;

        if let Err(e) = &result {
            tracing::error!(error = %e, "Activation failed");
        }
        result
    }
}
