use alloc::{string::String, vec::Vec};

use super::{
    config::ConfigErrorKind, expr::ExprErrorKind, instantiate::InstantiateErrorKind, validation::ConfigValidationError,
};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Neither component nor impl named {name:?} exists (chain: {})", .chain.join(" -> "))]
    UnknownComponent { name: String, chain: Vec<String> },
    #[error("Component {:?} is depending on itself: {}", .chain.last().map_or("", String::as_str), .chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },
    #[error("Parameter {parameter:?} of component {component:?} is not configured (chain: {})", .chain.join(" -> "))]
    MissingDependency {
        component: String,
        parameter: String,
        chain: Vec<String>,
    },
    #[error("Malformed config node: {0}")]
    MalformedConfigNode(#[from] ConfigErrorKind),
    #[error(transparent)]
    Validation(#[from] ConfigValidationError),
    #[error("Expression {text:?} failed")]
    Expression {
        text: String,
        #[source]
        source: ExprErrorKind,
    },
    #[error("Creation of component {component:?} failed")]
    Instantiate {
        component: String,
        #[source]
        source: InstantiateErrorKind,
    },
    #[error("Container is closed")]
    ContainerClosed,
}

#[derive(thiserror::Error, Debug)]
pub enum InjectErrorKind {
    #[error("Component {name:?} is already cached")]
    AlreadyCached { name: String },
    #[error("Container is closed")]
    ContainerClosed,
}
