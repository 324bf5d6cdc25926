use alloc::string::String;

#[derive(thiserror::Error, Debug)]
pub enum RegistryErrorKind {
    #[error("Recipe {name:?} has an invalid shape: {reason}")]
    InvalidRecipeShape { name: String, reason: String },
    #[error("Recipe {name:?} is already registered")]
    DuplicateName { name: String },
}
