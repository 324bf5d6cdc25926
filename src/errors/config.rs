use alloc::string::String;

use super::expr::ExprErrorKind;

/// Structural problems in the configuration tree, caught when the tree is
/// parsed or when a container starts.
#[derive(thiserror::Error, Debug)]
pub enum ConfigErrorKind {
    #[error("Container config should be a map, got {actual}")]
    TopLevelNotMap { actual: &'static str },
    #[error("Component {component:?} config should be a map, got {actual}")]
    ComponentNotMap { component: String, actual: &'static str },
    #[error("Component {component:?}: \"-impl\" should be a string")]
    ImplNotString { component: String },
    #[error("\"-ref\" should be the only key of its map")]
    RefNotAlone,
    #[error("\"-ref\" should be a string")]
    RefNotString,
    #[error("\"-expr\" should be the only key of its map")]
    ExprNotAlone,
    #[error("\"-expr\" should be a string")]
    ExprNotString,
    #[error("Expression {text:?} is malformed")]
    ExprSyntax {
        text: String,
        #[source]
        source: ExprErrorKind,
    },
    #[error("Component {component:?} refers to unknown impl {impl_name:?}")]
    UnknownImpl { component: String, impl_name: String },
    #[error("Impl {impl_name:?} has no parameter {parameter:?}")]
    UnknownParam { impl_name: String, parameter: String },
}
