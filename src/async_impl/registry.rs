use alloc::{collections::BTreeMap, string::String, sync::Arc, vec::Vec};
use core::future::Future;
use tracing::debug;

use super::{
    finalizer::AsyncCleanup,
    recipe::{AsyncRecipe, AsyncScopedResource},
};
use crate::{
    errors::{InstantiateErrorKind, RegistryErrorKind},
    recipe::{ParamSpec, Recipe, ResolvedArgs},
    value::Value,
};

/// Async counterpart of [`crate::Registry`]. Accepts async recipes and, by
/// wrapping, every sync recipe.
#[derive(Clone, Debug, Default)]
pub struct Registry {
    recipes: BTreeMap<String, Arc<AsyncRecipe>>,
}

impl Registry {
    #[inline]
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    #[inline]
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Arc<AsyncRecipe>> {
        self.recipes.get(name)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.recipes.contains_key(name)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

}

impl crate::config::ShapeIndex for Registry {
    fn has_impl(&self, name: &str) -> bool {
        self.contains(name)
    }

    fn has_param(&self, impl_name: &str, param: &str) -> bool {
        self.lookup(impl_name)
            .is_some_and(|recipe| recipe.params().iter().any(|spec| spec.name == param))
    }
}

/// Mirrors [`crate::RegistryBuilder`] for async recipes; `sync_recipe` wraps
/// any sync one.
#[derive(Default)]
pub struct RegistryBuilder {
    recipes: Vec<AsyncRecipe>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn recipe(mut self, recipe: impl Into<AsyncRecipe>) -> Self {
        self.recipes.push(recipe.into());
        self
    }

    #[must_use]
    pub fn recipes(mut self, recipes: impl IntoIterator<Item = AsyncRecipe>) -> Self {
        self.recipes.extend(recipes);
        self
    }

    #[must_use]
    pub fn sync_recipe(self, recipe: Recipe) -> Self {
        self.recipe(recipe)
    }

    #[must_use]
    pub fn value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.recipe(AsyncRecipe::value(name, value.into()))
    }

    #[must_use]
    pub fn function<F, Fut>(self, name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(ResolvedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, InstantiateErrorKind>> + Send + 'static,
    {
        self.recipe(AsyncRecipe::function(name, params, creator))
    }

    #[must_use]
    pub fn generator<F, Fut>(self, name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(ResolvedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(Value, AsyncCleanup), InstantiateErrorKind>> + Send + 'static,
    {
        self.recipe(AsyncRecipe::generator(name, params, creator))
    }

    #[must_use]
    pub fn scoped<F, Fut, R>(self, name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(ResolvedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, InstantiateErrorKind>> + Send + 'static,
        R: AsyncScopedResource,
    {
        self.recipe(AsyncRecipe::scoped(name, params, creator))
    }

    /// # Errors
    /// Same shape checks as [`crate::RegistryBuilder::build`].
    pub fn build(self) -> Result<Registry, RegistryErrorKind> {
        let mut recipes = BTreeMap::new();

        for recipe in self.recipes {
            check_shape(&recipe)?;

            let name = String::from(recipe.name());
            if recipes.insert(name.clone(), Arc::new(recipe)).is_some() {
                return Err(RegistryErrorKind::DuplicateName { name });
            }
        }

        debug!(count = recipes.len(), "async registry sealed");
        Ok(Registry { recipes })
    }
}

fn check_shape(recipe: &AsyncRecipe) -> Result<(), RegistryErrorKind> {
    if recipe.name().is_empty() {
        return Err(RegistryErrorKind::InvalidRecipeShape {
            name: String::new(),
            reason: String::from("recipe name must not be empty"),
        });
    }

    let params = recipe.params();
    for (index, spec) in params.iter().enumerate() {
        if params[..index].iter().any(|earlier| earlier.name == spec.name) {
            let mut reason = String::from("duplicate parameter name `");
            reason.push_str(&spec.name);
            reason.push('`');
            return Err(RegistryErrorKind::InvalidRecipeShape {
                name: String::from(recipe.name()),
                reason,
            });
        }
    }
    Ok(())
}
