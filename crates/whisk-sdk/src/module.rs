//! Module descriptors and export macros
//!
//! An action library describes what it contains with a static
//! [`ActionModule`] and exports it with [`export_module!`]. The proxy loads
//! the library, looks up the exported descriptor and resolves the
//! `Module::Type::Function` triple from `main` against it.
//!
//! # Example
//!
//! ```ignore
//! use whisk_sdk::prelude::*;
//!
//! #[derive(Default)]
//! pub struct Echo;
//!
//! impl Echo {
//!     fn main(&mut self, args: ActionArgs) -> ActionResult {
//!         Ok(Some(args.value.into_value()))
//!     }
//! }
//!
//! static MODULE: ActionModule = ActionModule {
//!     name: "echo_action",
//!     types: &[ActionType {
//!         name: "Echo",
//!         constructor: Some(construct::<Echo>),
//!         methods: &[blocking_method!("Main", Object, Echo, main)],
//!     }],
//! };
//!
//! export_module!(MODULE);
//! ```

use std::any::Any;
use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use crate::args::ActionArgs;
use crate::error::ActionError;

/// Name of the symbol every action library exports
pub const MODULE_EXPORT_SYMBOL: &[u8] = b"whisk_action_module\0";

/// Signature of the exported descriptor accessor
pub type ModuleExportFn = unsafe extern "Rust" fn() -> &'static ActionModule;

/// Type alias for boxed future returned by awaitable methods
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A freshly constructed action object
pub type Instance = Box<dyn Any + Send>;

/// What a method produces. `Ok(None)` means the action returned null.
pub type ActionResult = Result<Option<Value>, ActionError>;

/// No-argument constructor for an action type
pub type Constructor = fn() -> Instance;

pub type BlockingFn = fn(Instance, ActionArgs) -> ActionResult;
pub type AwaitableFn = fn(Instance, ActionArgs) -> BoxFuture<'static, ActionResult>;

/// The form of `value` a method declares it accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamShape {
    Object,
    Array,
    Any,
}

/// How a method is called; the variant is its return shape
#[derive(Debug, Clone, Copy)]
pub enum MethodCall {
    /// Returns its result directly
    Blocking(BlockingFn),
    /// Returns a future that must be awaited for the result
    Awaitable(AwaitableFn),
}

impl MethodCall {
    pub fn is_awaitable(&self) -> bool {
        matches!(self, MethodCall::Awaitable(_))
    }
}

/// A method on an action type
#[derive(Debug, Clone, Copy)]
pub struct ActionMethod {
    pub name: &'static str,
    pub param: ParamShape,
    pub call: MethodCall,
}

/// An action type and its methods
#[derive(Debug)]
pub struct ActionType {
    pub name: &'static str,
    /// `None` when the type cannot be built without arguments
    pub constructor: Option<Constructor>,
    pub methods: &'static [ActionMethod],
}

impl ActionType {
    pub fn find_method(&self, name: &str) -> Option<&ActionMethod> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Everything an action library exports
#[derive(Debug)]
pub struct ActionModule {
    pub name: &'static str,
    pub types: &'static [ActionType],
}

impl ActionModule {
    pub fn find_type(&self, name: &str) -> Option<&ActionType> {
        self.types.iter().find(|t| t.name == name)
    }
}

/// Constructor for any `Default` type, usable in static descriptors
pub fn construct<T: Default + Send + 'static>() -> Instance {
    Box::new(T::default())
}

/// Recover the concrete action object from an [`Instance`]
pub fn downcast<T: 'static>(instance: Instance) -> Result<Box<T>, ActionError> {
    instance
        .downcast::<T>()
        .map_err(|_| ActionError::InstanceMismatch(std::any::type_name::<T>()))
}

/// Export a static [`ActionModule`] from a `cdylib` action library
#[macro_export]
macro_rules! export_module {
    ($module:path) => {
        #[no_mangle]
        pub extern "Rust" fn whisk_action_module() -> &'static $crate::ActionModule {
            &$module
        }
    };
}

/// Describe a method that returns its result directly.
///
/// `$method` is called as `fn(&mut self, ActionArgs) -> ActionResult`.
#[macro_export]
macro_rules! blocking_method {
    ($name:literal, $param:ident, $ty:ty, $method:ident) => {
        $crate::ActionMethod {
            name: $name,
            param: $crate::ParamShape::$param,
            call: $crate::MethodCall::Blocking({
                fn call(instance: $crate::Instance, args: $crate::ActionArgs) -> $crate::ActionResult {
                    #[allow(unused_mut)]
                    let mut this = $crate::downcast::<$ty>(instance)?;
                    this.$method(args)
                }
                call
            }),
        }
    };
}

/// Describe a method whose result must be awaited.
///
/// `$method` is called as `async fn(&mut self, ActionArgs) -> ActionResult`.
#[macro_export]
macro_rules! awaitable_method {
    ($name:literal, $param:ident, $ty:ty, $method:ident) => {
        $crate::ActionMethod {
            name: $name,
            param: $crate::ParamShape::$param,
            call: $crate::MethodCall::Awaitable({
                fn call(
                    instance: $crate::Instance,
                    args: $crate::ActionArgs,
                ) -> $crate::BoxFuture<'static, $crate::ActionResult> {
                    ::std::boxed::Box::pin(async move {
                        let result: $crate::ActionResult = match $crate::downcast::<$ty>(instance) {
                            #[allow(unused_mut)]
                            Ok(mut this) => this.$method(args).await,
                            Err(err) => Err(err),
                        };
                        result
                    })
                }
                call
            }),
        }
    };
}
