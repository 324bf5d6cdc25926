pub(crate) mod container;
pub(crate) mod finalizer;
pub(crate) mod recipe;
pub(crate) mod registry;

pub use container::{with_async_container, Container};
pub use finalizer::AsyncCleanup;
pub use recipe::{AsyncRecipe, AsyncScopedResource};
pub use registry::{Registry, RegistryBuilder};
