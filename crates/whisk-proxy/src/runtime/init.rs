//! One-shot initialization
//!
//! `/init` moves the runtime from [`RuntimeState::Uninitialized`] to
//! [`RuntimeState::Ready`] exactly once per process. Callers queue on an
//! async mutex; the first one admitted does the work, every later one sees
//! `Ready` and is refused. A failed attempt puts the state back to
//! `Uninitialized` and leaves nothing behind except the extraction directory.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use serde::{de, Deserialize, Deserializer};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::bundle::{self, BundleUnpacker};
use super::env::EnvironmentPropagator;
use super::loader::{CodeLoader, MainSymbol, ResolvedEntryPoint};
use crate::error::ProxyError;

/// Lifecycle of the action held by this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RuntimeState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
}

impl RuntimeState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RuntimeState::Initializing,
            2 => RuntimeState::Ready,
            _ => RuntimeState::Uninitialized,
        }
    }
}

/// Body of an init request
#[derive(Debug, Deserialize)]
pub struct InitEnvelope {
    pub value: Option<InitValue>,
}

/// The `value` of an init request
#[derive(Debug, Deserialize)]
pub struct InitValue {
    /// Action name, informational only
    pub name: Option<String>,
    /// `Module::Type::Function`
    pub main: Option<String>,
    /// Base64-encoded zip package
    pub code: Option<String>,
    /// Accepts `true`/`false` as JSON booleans or strings
    #[serde(default, deserialize_with = "lenient_bool")]
    pub binary: Option<bool>,
    /// Variables exported verbatim before the module is loaded
    pub env: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(flag)) => Ok(Some(flag)),
        Some(Flag::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(de::Error::custom(format!("invalid boolean: {:?}", text))),
        },
    }
}

/// Drives the Uninitialized → Ready transition
pub struct Initializer {
    gate: Mutex<()>,
    state: AtomicU8,
    entry: OnceLock<Arc<ResolvedEntryPoint>>,
    preparer: Arc<Preparer>,
}

/// The blocking part of init: unpack, chdir, env, load
struct Preparer {
    loader: Arc<dyn CodeLoader>,
    unpacker: BundleUnpacker,
    propagator: EnvironmentPropagator,
}

impl Initializer {
    pub fn new(
        loader: Arc<dyn CodeLoader>,
        unpacker: BundleUnpacker,
        propagator: EnvironmentPropagator,
    ) -> Self {
        Self {
            gate: Mutex::new(()),
            state: AtomicU8::new(RuntimeState::Uninitialized as u8),
            entry: OnceLock::new(),
            preparer: Arc::new(Preparer {
                loader,
                unpacker,
                propagator,
            }),
        }
    }

    pub fn state(&self) -> RuntimeState {
        RuntimeState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// The resolved entry point, once the runtime is ready
    pub fn entry(&self) -> Option<Arc<ResolvedEntryPoint>> {
        if self.state() != RuntimeState::Ready {
            return None;
        }
        self.entry.get().cloned()
    }

    /// Run one init request
    pub async fn initialize(&self, body: &[u8]) -> Result<Arc<ResolvedEntryPoint>, ProxyError> {
        let _gate = self.gate.lock().await;

        let transition = Transition::begin(&self.state)?;

        // Extraction and dlopen block; keep them off the async workers
        let preparer = Arc::clone(&self.preparer);
        let body = body.to_vec();
        let entry = tokio::task::spawn_blocking(move || preparer.prepare(&body))
            .await
            .map_err(|e| ProxyError::InitAborted(e.to_string()))??;
        let entry = Arc::new(entry);

        if self.entry.set(Arc::clone(&entry)).is_err() {
            return Err(ProxyError::AlreadyInitialized);
        }
        transition.commit();

        tracing::info!(
            main = %entry.symbol(),
            awaitable = entry.is_awaitable(),
            dir = ?entry.bundle_dir(),
            "Action initialized"
        );
        Ok(entry)
    }
}

impl Preparer {
    fn prepare(&self, body: &[u8]) -> Result<ResolvedEntryPoint, ProxyError> {
        let envelope: InitEnvelope =
            serde_json::from_slice(body).map_err(|e| ProxyError::InvalidBody(e.to_string()))?;
        let value = envelope.value.ok_or(ProxyError::MissingMainOrCode)?;

        let (main, binary, code) = match (value.main, value.binary, value.code) {
            (Some(main), Some(binary), Some(code)) => (main, binary, code),
            _ => return Err(ProxyError::MissingMainOrCode),
        };

        if !binary {
            return Err(ProxyError::NotBinary);
        }

        let symbol: MainSymbol = main.parse()?;
        tracing::debug!(main = %symbol, name = ?value.name, "Initializing action");

        let dir = self.unpacker.unpack(&code)?;
        std::env::set_current_dir(&dir)?;

        let file_name = self.loader.module_file_name(&symbol.module);
        let module_path =
            bundle::locate_module(&dir, &file_name).ok_or(ProxyError::ModuleNotFound(file_name))?;

        let base_env = match &value.env {
            Some(env) => self.propagator.apply_init_env(env),
            None => Default::default(),
        };

        let loaded = self.loader.load(&module_path, &symbol)?;
        Ok(ResolvedEntryPoint::new(symbol, loaded, base_env, dir))
    }
}

/// Holds the state at `Initializing`; reverts to `Uninitialized` unless committed
struct Transition<'a> {
    state: &'a AtomicU8,
    committed: bool,
}

impl<'a> Transition<'a> {
    fn begin(state: &'a AtomicU8) -> Result<Self, ProxyError> {
        state
            .compare_exchange(
                RuntimeState::Uninitialized as u8,
                RuntimeState::Initializing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| ProxyError::AlreadyInitialized)?;

        Ok(Self {
            state,
            committed: false,
        })
    }

    fn commit(mut self) {
        self.state.store(RuntimeState::Ready as u8, Ordering::SeqCst);
        self.committed = true;
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.state.store(RuntimeState::Uninitialized as u8, Ordering::SeqCst);
        }
    }
}
