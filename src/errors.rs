mod config;
mod expr;
mod finalize;
mod instantiate;
mod registry;
mod resolve;
mod validation;

pub use config::ConfigErrorKind;
pub use expr::ExprErrorKind;
pub use finalize::{FinalizationErrorKind, ScopeTeardownError};
pub use instantiate::InstantiateErrorKind;
pub use registry::RegistryErrorKind;
pub use resolve::{InjectErrorKind, ResolveErrorKind};
pub use validation::{ConfigValidationError, TypeMismatch};
