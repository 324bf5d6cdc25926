use alloc::string::String;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ExprErrorKind {
    #[error("Parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },
    #[error("Expression refers to unknown name {name:?}")]
    UnknownRef { name: String },
    #[error("Type error: {message}")]
    Type { message: String },
    #[error("Division by zero")]
    DivisionByZero,
}
