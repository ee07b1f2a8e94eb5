//! Activation dispatch
//!
//! Runs the resolved entry point once per `/run` request:
//! 1. Parse the envelope (an empty body means a null payload)
//! 2. Export every field except `value` as `__OW_<NAME>`
//! 3. Build a fresh instance and call the method with the shaped payload
//! 4. Map null results, action errors and panics to [`ProxyError`]
//!
//! Invocations are not serialized against each other here; the host sends
//! at most one at a time.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value};
use whisk_sdk::{ActionArgs, ActionError, EnvironmentBindings, MethodCall, Payload};

use super::env::EnvironmentPropagator;
use super::loader::ResolvedEntryPoint;
use crate::error::ProxyError;

/// Executes activations against a resolved entry point
#[derive(Debug, Clone, Default)]
pub struct Invoker {
    propagator: EnvironmentPropagator,
}

impl Invoker {
    pub fn new(propagator: EnvironmentPropagator) -> Self {
        Self { propagator }
    }

    /// Run one activation and return its non-null result
    pub async fn invoke(&self, entry: Arc<ResolvedEntryPoint>, body: &[u8]) -> Result<Value, ProxyError> {
        let (value, activation_env) = match parse_envelope(body)? {
            Some(mut envelope) => {
                let env = self.propagator.activation_bindings(&envelope);
                (envelope.remove("value").unwrap_or(Value::Null), env)
            }
            None => (Value::Null, EnvironmentBindings::new()),
        };

        tracing::debug!(
            main = %entry.symbol(),
            activation_id = ?activation_env.activation("activationId"),
            awaitable = entry.is_awaitable(),
            "Invoking action"
        );

        let args = ActionArgs::new(
            Payload::shaped(value, entry.param()),
            entry.base_env().merged(&activation_env),
        );

        match call(entry, args).await? {
            Some(result) if !result.is_null() => Ok(result),
            _ => Err(ProxyError::NullResult),
        }
    }
}

/// Parse a run body; `None` for an empty body
fn parse_envelope(body: &[u8]) -> Result<Option<Map<String, Value>>, ProxyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    match serde_json::from_slice(body) {
        Ok(Value::Object(envelope)) => Ok(Some(envelope)),
        Ok(_) => Err(ProxyError::InvalidBody("expected a JSON object".to_string())),
        Err(e) => Err(ProxyError::InvalidBody(e.to_string())),
    }
}

/// Construct a fresh instance and call the method, containing panics
async fn call(entry: Arc<ResolvedEntryPoint>, args: ActionArgs) -> Result<Option<Value>, ProxyError> {
    let constructor = entry.constructor();

    let outcome = match entry.method() {
        MethodCall::Blocking(method) => {
            // The closure holds the entry so the library stays mapped
            let held = Arc::clone(&entry);
            tokio::task::spawn_blocking(move || {
                let _entry = held;
                method(constructor(), args)
            })
            .await
            .map_err(|e| {
                if e.is_panic() {
                    panic_failure(e.into_panic())
                } else {
                    ProxyError::ActionFailed {
                        message: "The action was cancelled".to_string(),
                        trace: None,
                    }
                }
            })?
        }
        MethodCall::Awaitable(method) => AssertUnwindSafe(async move { method(constructor(), args).await })
            .catch_unwind()
            .await
            .map_err(panic_failure)?,
    };

    outcome.map_err(action_failure)
}

fn action_failure(err: ActionError) -> ProxyError {
    ProxyError::ActionFailed {
        message: err.to_string(),
        trace: err.trace().map(str::to_string),
    }
}

fn panic_failure(payload: Box<dyn Any + Send>) -> ProxyError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };

    ProxyError::ActionFailed {
        message: format!("The action panicked: {}", message),
        trace: None,
    }
}
