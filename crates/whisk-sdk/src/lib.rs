//! Whisk SDK - types and macros for writing actions loaded by the whisk action proxy
//!
//! An action is a `cdylib` that exports an [`ActionModule`] descriptor. The
//! proxy resolves `main` (`Module::Type::Function`) against the descriptor,
//! builds a fresh instance of the type for every activation and calls the
//! method with the activation's [`ActionArgs`].

pub mod args;
pub mod error;
pub mod module;

pub mod prelude {
    //! Common imports for actions
    pub use crate::args::{ActionArgs, EnvironmentBindings, Payload};
    pub use crate::error::ActionError;
    pub use crate::module::{
        construct, ActionMethod, ActionModule, ActionResult, ActionType, MethodCall, ParamShape,
    };
    pub use crate::{awaitable_method, blocking_method, export_module};
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{json, Value as JsonValue};
}

// Re-export key types at crate root
pub use args::{activation_var_name, ActionArgs, EnvironmentBindings, Payload, ACTIVATION_ENV_PREFIX};
pub use error::ActionError;
pub use module::{
    construct, downcast, ActionMethod, ActionModule, ActionResult, ActionType, AwaitableFn,
    BlockingFn, BoxFuture, Constructor, Instance, MethodCall, ModuleExportFn, ParamShape,
    MODULE_EXPORT_SYMBOL,
};
