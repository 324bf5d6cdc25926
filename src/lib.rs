#![no_std]

extern crate alloc;

pub(crate) mod any;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod errors;
pub(crate) mod expr;
pub(crate) mod finalizer;
pub(crate) mod recipe;
pub(crate) mod registry;
pub(crate) mod registry_macros;
pub(crate) mod validation;
pub(crate) mod value;
pub(crate) mod value_macros;

#[doc(hidden)]
pub mod macros_utils;

#[cfg(feature = "async")]
pub mod async_impl;

#[cfg(feature = "async")]
pub(crate) mod utils;

pub use any::TypeInfo;
pub use config::Config;
pub use container::{with_container, Container};
pub use errors::{
    ConfigErrorKind, ConfigValidationError, ExprErrorKind, FinalizationErrorKind, InjectErrorKind, InstantiateErrorKind,
    RegistryErrorKind, ResolveErrorKind, ScopeTeardownError, TypeMismatch,
};
pub use expr::{ExpressionEvaluator, RestrictedEvaluator};
pub use finalizer::Cleanup;
pub use recipe::{ParamSpec, Recipe, RecipeKind, ResolvedArgs, ScopedResource};
pub use registry::{Registry, RegistryBuilder};
pub use validation::{StructuralValidator, TypeSpec, Validator};
pub use value::{Instance, Value};
