use alloc::string::String;

/// Errors produced inside a recipe's creation step.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Missing argument {name:?}")]
    MissingArgument { name: String },
    #[error("Argument {name:?} should be {expected}, got {actual}")]
    WrongArgumentType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
