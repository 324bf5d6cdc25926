use alloc::{boxed::Box, string::String, sync::Arc, vec::Vec};
use core::{
    fmt::{self, Debug, Formatter},
    future::{ready, Future},
};

use super::finalizer::{AsyncCleanup, AsyncFinalizeFn};
use crate::{
    errors::InstantiateErrorKind,
    recipe::{ParamSpec, Recipe, RecipeKind, ResolvedArgs},
    utils::future::BoxFuture,
    value::Value,
};

/// An acquire/release resource whose acquire and release steps are
/// suspension points. Methods return boxed futures so the trait stays
/// object-safe.
pub trait AsyncScopedResource: Send + 'static {
    /// # Errors
    /// Aborts the component's construction.
    fn enter(&mut self) -> BoxFuture<'_, Result<Value, InstantiateErrorKind>>;

    /// # Errors
    /// Collected into the aggregate finalization error at teardown.
    fn exit<'a>(&'a mut self, error: Option<&'a anyhow::Error>) -> BoxFuture<'a, Result<(), anyhow::Error>>;
}

pub(crate) struct AsyncAcquired {
    pub(crate) value: Value,
    pub(crate) finalizer: Option<AsyncFinalizeFn>,
}

pub(crate) type BoxedAsyncCreator =
    Arc<dyn Fn(ResolvedArgs) -> BoxFuture<'static, Result<AsyncAcquired, InstantiateErrorKind>> + Send + Sync>;

/// Async counterpart of [`Recipe`]; creators and finalizers are futures.
/// Every sync recipe converts losslessly via [`From`].
#[derive(Clone)]
pub struct AsyncRecipe {
    pub(crate) name: String,
    pub(crate) kind: RecipeKind,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) creator: BoxedAsyncCreator,
}

impl AsyncRecipe {
    #[must_use]
    pub fn value(name: impl Into<String>, value: Value) -> Self {
        Self::from(Recipe::value(name, value))
    }

    #[must_use]
    pub fn function<F, Fut>(name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(ResolvedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, InstantiateErrorKind>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind: RecipeKind::AsyncFunction,
            params,
            creator: Arc::new(move |args| {
                let value = creator(args);
                Box::pin(async move {
                    Ok(AsyncAcquired {
                        value: value.await?,
                        finalizer: None,
                    })
                })
            }),
        }
    }

    /// The cleanup future is built alongside the component and awaited once
    /// at teardown.
    #[must_use]
    pub fn generator<F, Fut>(name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(ResolvedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(Value, AsyncCleanup), InstantiateErrorKind>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind: RecipeKind::AsyncGenerator,
            params,
            creator: Arc::new(move |args| {
                let acquired = creator(args);
                Box::pin(async move {
                    let (value, cleanup) = acquired.await?;
                    let finalizer: AsyncFinalizeFn = Box::new(move |_error| Box::pin(async move { cleanup.await }));
                    Ok(AsyncAcquired {
                        value,
                        finalizer: Some(finalizer),
                    })
                })
            }),
        }
    }

    #[must_use]
    pub fn scoped<F, Fut, R>(name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(ResolvedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, InstantiateErrorKind>> + Send + 'static,
        R: AsyncScopedResource,
    {
        Self {
            name: name.into(),
            kind: RecipeKind::AsyncScoped,
            params,
            creator: Arc::new(move |args| {
                let resource = creator(args);
                Box::pin(async move {
                    let mut resource = resource.await?;
                    let value = resource.enter().await?;
                    let finalizer: AsyncFinalizeFn = Box::new(move |error| {
                        Box::pin(async move {
                            let mut resource = resource;
                            resource.exit(error).await
                        })
                    });
                    Ok(AsyncAcquired {
                        value,
                        finalizer: Some(finalizer),
                    })
                })
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> RecipeKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }
}

impl From<Recipe> for AsyncRecipe {
    fn from(recipe: Recipe) -> Self {
        let sync_creator = Arc::clone(&recipe.creator);
        Self {
            name: recipe.name,
            kind: recipe.kind,
            params: recipe.params,
            creator: Arc::new(move |args| {
                let result = sync_creator(args);
                Box::pin(ready(result.map(|acquired| AsyncAcquired {
                    value: acquired.value,
                    finalizer: acquired.finalizer.map(|action| {
                        let wrapped: AsyncFinalizeFn = Box::new(move |error| {
                            let result = action(error);
                            Box::pin(async move { result })
                        });
                        wrapped
                    }),
                })))
            }),
        }
    }
}

impl Debug for AsyncRecipe {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRecipe")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
