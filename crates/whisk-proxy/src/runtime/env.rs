//! Environment propagation
//!
//! Turns envelope fields into [`EnvironmentBindings`] under the two naming
//! conventions of the protocol:
//! - init-time `env` entries keep their names verbatim
//! - invocation metadata fields become `__OW_<UPPERCASE(name)>`
//!
//! The bindings are handed to the action with every call. When process
//! export is enabled the same variables are also set on the process, so
//! code that reads `std::env` sees them too.

use serde_json::{Map, Value};
use whisk_sdk::{activation_var_name, EnvironmentBindings};

/// Envelope field that carries the payload rather than metadata
const VALUE_FIELD: &str = "value";

/// Builds environment bindings and mirrors them into the process
#[derive(Debug, Clone)]
pub struct EnvironmentPropagator {
    export_process_env: bool,
}

impl EnvironmentPropagator {
    pub fn new(export_process_env: bool) -> Self {
        Self { export_process_env }
    }

    /// Apply init-time `env` entries under their own names.
    ///
    /// An empty or null value unsets the variable.
    pub fn apply_init_env(&self, env: &Map<String, Value>) -> EnvironmentBindings {
        let mut bindings = EnvironmentBindings::new();

        for (name, value) in env {
            let value = string_repr(value);
            if value.is_empty() {
                if self.export_process_env && is_valid_name(name) {
                    std::env::remove_var(name);
                }
                continue;
            }
            self.bind(&mut bindings, name.clone(), value);
        }

        tracing::debug!(count = bindings.len(), "Applied init environment");
        bindings
    }

    /// Export every top-level field except `value` as `__OW_<NAME>`
    pub fn activation_bindings(&self, envelope: &Map<String, Value>) -> EnvironmentBindings {
        let mut bindings = EnvironmentBindings::new();

        for (field, value) in envelope {
            if field.eq_ignore_ascii_case(VALUE_FIELD) {
                continue;
            }
            self.bind(&mut bindings, activation_var_name(field), string_repr(value));
        }

        bindings
    }

    fn bind(&self, bindings: &mut EnvironmentBindings, name: String, value: String) {
        if !is_valid_name(&name) || value.contains('\0') {
            tracing::warn!(name = %name, "Unable to set environment variable, skipping");
            return;
        }

        if self.export_process_env {
            std::env::set_var(&name, &value);
        }
        bindings.insert(name, value);
    }
}

impl Default for EnvironmentPropagator {
    fn default() -> Self {
        Self::new(true)
    }
}

/// String form of a JSON field: strings raw, null empty, anything else as JSON text
pub fn string_repr(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('=') && !name.contains('\0')
}
