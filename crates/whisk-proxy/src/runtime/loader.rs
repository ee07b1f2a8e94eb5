//! Code loading and entry-point resolution
//!
//! A [`CodeLoader`] turns a module file from an extracted package plus the
//! `Module::Type::Function` triple from `main` into a [`LoadedAction`]: the
//! no-argument constructor and the method to call. Each missing piece is a
//! distinct [`LoadError`].
//!
//! Two loaders are provided:
//! - [`DylibLoader`] opens the module as a dynamic library and reads the
//!   descriptor it exports (see `whisk_sdk::export_module!`)
//! - [`StaticLoader`] serves descriptors compiled into the proxy itself,
//!   for embedding and tests

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use libloading::{Library, Symbol};
use whisk_sdk::{
    ActionMethod, ActionModule, Constructor, EnvironmentBindings, MethodCall, ModuleExportFn,
    ParamShape, MODULE_EXPORT_SYMBOL,
};

use crate::error::{LoadError, ProxyError};

/// The parsed `main` field: `Module::Type::Function`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainSymbol {
    pub module: String,
    pub type_name: String,
    pub function: String,
}

impl FromStr for MainSymbol {
    type Err = ProxyError;

    fn from_str(main: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = main.split("::").collect();
        match parts.as_slice() {
            [module, type_name, function]
                if !module.is_empty() && !type_name.is_empty() && !function.is_empty() =>
            {
                Ok(Self {
                    module: module.to_string(),
                    type_name: type_name.to_string(),
                    function: function.to_string(),
                })
            }
            _ => Err(ProxyError::MainFormat),
        }
    }
}

impl fmt::Display for MainSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.module, self.type_name, self.function)
    }
}

/// Result of resolving a symbol in a loaded module
#[derive(Debug)]
pub struct LoadedAction {
    pub constructor: Constructor,
    pub method: ActionMethod,

    /// Keeps a dynamic library mapped while its functions are in use
    library: Option<Library>,
}

impl LoadedAction {
    /// Resolve type, method and constructor, in that order
    pub fn resolve(module: &ActionModule, symbol: &MainSymbol) -> Result<Self, LoadError> {
        let action_type = module
            .find_type(&symbol.type_name)
            .ok_or_else(|| LoadError::TypeNotFound(symbol.type_name.clone()))?;

        let method = *action_type
            .find_method(&symbol.function)
            .ok_or_else(|| LoadError::MethodNotFound(symbol.function.clone()))?;

        let constructor = action_type
            .constructor
            .ok_or_else(|| LoadError::ConstructorNotFound(symbol.type_name.clone()))?;

        Ok(Self {
            constructor,
            method,
            library: None,
        })
    }
}

/// Capability to load a module file and resolve an entry point in it
pub trait CodeLoader: Send + Sync {
    /// File name the module is expected under in the package
    fn module_file_name(&self, module: &str) -> String {
        library_file_name(module)
    }

    /// Load the module at `path` and resolve `symbol` in it
    fn load(&self, path: &Path, symbol: &MainSymbol) -> Result<LoadedAction, LoadError>;
}

/// Loads modules as dynamic libraries
#[derive(Debug, Default)]
pub struct DylibLoader;

impl DylibLoader {
    pub fn new() -> Self {
        Self
    }
}

impl CodeLoader for DylibLoader {
    fn load(&self, path: &Path, symbol: &MainSymbol) -> Result<LoadedAction, LoadError> {
        let file = path.display().to_string();

        // Safety: loading runs the library's initializers. The package is the
        // action the host asked this container to run.
        let library = unsafe { Library::new(path) }.map_err(|e| LoadError::Module {
            file: file.clone(),
            cause: e.to_string(),
        })?;

        let export_fn: ModuleExportFn = unsafe {
            let export: Symbol<ModuleExportFn> =
                library.get(MODULE_EXPORT_SYMBOL).map_err(|e| LoadError::Module {
                    file: file.clone(),
                    cause: format!("missing module export: {}", e),
                })?;
            *export
        };

        // Safety: the descriptor is a static in the library, which stays
        // loaded for as long as the returned LoadedAction lives.
        let module = unsafe { export_fn() };
        tracing::debug!(module = %module.name, types = module.types.len(), "Loaded module descriptor");

        let mut loaded = LoadedAction::resolve(module, symbol)?;
        loaded.library = Some(library);
        Ok(loaded)
    }
}

/// Serves module descriptors linked into the current process
#[derive(Debug, Default)]
pub struct StaticLoader {
    modules: HashMap<String, &'static ActionModule>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under the name used in `main`
    pub fn with_module(mut self, name: impl Into<String>, module: &'static ActionModule) -> Self {
        self.modules.insert(name.into(), module);
        self
    }
}

impl CodeLoader for StaticLoader {
    fn load(&self, path: &Path, symbol: &MainSymbol) -> Result<LoadedAction, LoadError> {
        let module = self.modules.get(&symbol.module).ok_or_else(|| LoadError::Module {
            file: path.display().to_string(),
            cause: "no module registered under this name".to_string(),
        })?;
        LoadedAction::resolve(module, symbol)
    }
}

/// The entry point resolved by a successful init
///
/// Immutable once built; every invocation reuses it.
#[derive(Debug)]
pub struct ResolvedEntryPoint {
    symbol: MainSymbol,
    constructor: Constructor,
    method: MethodCall,
    param: ParamShape,
    awaitable: bool,
    base_env: EnvironmentBindings,
    bundle_dir: PathBuf,
    _library: Option<Arc<Library>>,
}

impl ResolvedEntryPoint {
    pub fn new(
        symbol: MainSymbol,
        loaded: LoadedAction,
        base_env: EnvironmentBindings,
        bundle_dir: PathBuf,
    ) -> Self {
        Self {
            symbol,
            constructor: loaded.constructor,
            method: loaded.method.call,
            param: loaded.method.param,
            awaitable: loaded.method.call.is_awaitable(),
            base_env,
            bundle_dir,
            _library: loaded.library.map(Arc::new),
        }
    }

    pub fn symbol(&self) -> &MainSymbol {
        &self.symbol
    }

    pub fn constructor(&self) -> Constructor {
        self.constructor
    }

    pub fn method(&self) -> MethodCall {
        self.method
    }

    pub fn param(&self) -> ParamShape {
        self.param
    }

    /// Whether the method's result is a future; decided once at init
    pub fn is_awaitable(&self) -> bool {
        self.awaitable
    }

    /// Init-time environment every activation starts from
    pub fn base_env(&self) -> &EnvironmentBindings {
        &self.base_env
    }

    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }
}

/// Format the module library filename for the current platform
#[cfg(target_os = "windows")]
pub fn library_file_name(module: &str) -> String {
    format!("{}.dll", module.replace('-', "_"))
}

#[cfg(target_os = "linux")]
pub fn library_file_name(module: &str) -> String {
    format!("lib{}.so", module.replace('-', "_"))
}

#[cfg(target_os = "macos")]
pub fn library_file_name(module: &str) -> String {
    format!("lib{}.dylib", module.replace('-', "_"))
}

#[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
pub fn library_file_name(module: &str) -> String {
    format!("lib{}.so", module.replace('-', "_"))
}
