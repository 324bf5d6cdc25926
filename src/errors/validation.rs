use alloc::string::String;

use crate::validation::TypeSpec;

/// A value that does not satisfy the type expected for it.
#[derive(thiserror::Error, Debug)]
#[error("Expected {expected}, got {actual}")]
pub struct TypeMismatch {
    pub expected: TypeSpec,
    pub actual: String,
}

/// A [`TypeMismatch`] located at a component parameter, or at the component
/// itself when an explicit expected type was given to `get`.
#[derive(thiserror::Error, Debug)]
pub struct ConfigValidationError {
    pub component: String,
    pub parameter: Option<String>,
    #[source]
    pub mismatch: TypeMismatch,
}

impl core::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.parameter {
            Some(parameter) => write!(f, "Invalid value for {}.{}: {}", self.component, parameter, self.mismatch),
            None => write!(f, "Invalid {:?} type: {}", self.component, self.mismatch),
        }
    }
}
