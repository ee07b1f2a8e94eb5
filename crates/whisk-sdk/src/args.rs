//! Arguments handed to an action method on every invocation

use std::collections::btree_map::{self, BTreeMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ActionError;
use crate::module::ParamShape;

/// Prefix the proxy puts in front of per-activation metadata names
pub const ACTIVATION_ENV_PREFIX: &str = "__OW_";

/// Environment visible to one activation
///
/// Holds the init-time `env` entries (verbatim names) merged with the
/// activation's metadata fields (`__OW_`-prefixed, upper-cased names). The
/// proxy builds a new value for every call, so nothing set for one
/// activation is visible to the next unless it came from init.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentBindings {
    vars: BTreeMap<String, String>,
}

impl EnvironmentBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, returning the previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }

    /// Look up a variable by its exact name.
    ///
    /// # Example
    /// ```ignore
    /// let id = args.env.get("__OW_ACTIVATION_ID");
    /// ```
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Look up an activation metadata field by its envelope name.
    ///
    /// `activation("activation_id")` reads `__OW_ACTIVATION_ID`.
    pub fn activation(&self, field: &str) -> Option<&str> {
        self.get(&activation_var_name(field))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.vars.iter()
    }

    /// Overlay `other` on top of `self`; names in `other` win
    pub fn merged(&self, other: &EnvironmentBindings) -> EnvironmentBindings {
        let mut vars = self.vars.clone();
        vars.extend(other.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        EnvironmentBindings { vars }
    }
}

impl<'a> IntoIterator for &'a EnvironmentBindings {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentBindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Environment variable name for an activation metadata field
pub fn activation_var_name(field: &str) -> String {
    format!("{}{}", ACTIVATION_ENV_PREFIX, field.to_uppercase())
}

/// The `value` of an invocation envelope, in the form the method declared
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    Object(Map<String, Value>),
    Array(Vec<Value>),
    #[default]
    Null,
}

impl Payload {
    /// Narrow a raw `value` to what a method with `shape` accepts.
    ///
    /// A value of the wrong form (or a scalar) becomes `Payload::Null`.
    pub fn shaped(value: Value, shape: ParamShape) -> Payload {
        match (value, shape) {
            (Value::Object(map), ParamShape::Object | ParamShape::Any) => Payload::Object(map),
            (Value::Array(items), ParamShape::Array | ParamShape::Any) => Payload::Array(items),
            _ => Payload::Null,
        }
    }

    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            Payload::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Payload::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Null)
    }

    pub fn into_value(self) -> Value {
        match self {
            Payload::Object(map) => Value::Object(map),
            Payload::Array(items) => Value::Array(items),
            Payload::Null => Value::Null,
        }
    }
}

/// Everything a method receives for one activation
#[derive(Debug, Clone, Default)]
pub struct ActionArgs {
    pub value: Payload,
    pub env: EnvironmentBindings,
}

impl ActionArgs {
    pub fn new(value: Payload, env: EnvironmentBindings) -> Self {
        Self { value, env }
    }

    /// Deserialize the payload into a typed struct.
    ///
    /// # Example
    /// ```ignore
    /// #[derive(Deserialize)]
    /// struct Greet { name: String }
    ///
    /// let greet: Greet = args.json()?;
    /// ```
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ActionError> {
        serde_json::from_value(self.value.clone().into_value())
            .map_err(|e| ActionError::InvalidArguments(e.to_string()))
    }

    /// Get a top-level field of an object payload
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.value.as_object().and_then(|map| map.get(key))
    }

    /// Get a required string field of an object payload
    pub fn require_str(&self, key: &str) -> Result<&str, ActionError> {
        self.param(key)
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::InvalidArguments(format!("Missing required string parameter: {}", key)))
    }
}
