use alloc::{collections::BTreeMap, string::String, sync::Arc, vec::Vec};
use tracing::debug;

use crate::{
    errors::RegistryErrorKind,
    finalizer::Cleanup,
    recipe::{ParamSpec, Recipe, ResolvedArgs, ScopedResource},
    value::Value,
};

/// The immutable catalog of recipes, keyed by name.
///
/// Built once through [`RegistryBuilder`] and shared between containers; a
/// registry never changes after [`RegistryBuilder::build`].
#[derive(Clone, Debug, Default)]
pub struct Registry {
    recipes: BTreeMap<String, Arc<Recipe>>,
}

impl Registry {
    #[inline]
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    #[inline]
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Arc<Recipe>> {
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

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.recipes.keys().map(String::as_str)
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

/// Accumulates recipes and checks their shape before sealing a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    recipes: Vec<Recipe>,
}

impl RegistryBuilder {
    /// Adds an already-built recipe.
    #[must_use]
    pub fn recipe(mut self, recipe: Recipe) -> Self {
        self.recipes.push(recipe);
        self
    }

    /// Adds a batch of recipes, as collected by a module's setup code.
    #[must_use]
    pub fn recipes(mut self, recipes: impl IntoIterator<Item = Recipe>) -> Self {
        self.recipes.extend(recipes);
        self
    }

    #[must_use]
    pub fn value(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.recipe(Recipe::value(name, value.into()))
    }

    #[must_use]
    pub fn function<F>(self, name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> Result<Value, crate::errors::InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.recipe(Recipe::function(name, params, creator))
    }

    #[must_use]
    pub fn class<F>(self, name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> Result<Value, crate::errors::InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.recipe(Recipe::class(name, params, creator))
    }

    #[must_use]
    pub fn generator<F>(self, name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> Result<(Value, Cleanup), crate::errors::InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.recipe(Recipe::generator(name, params, creator))
    }

    #[must_use]
    pub fn scoped<F, R>(self, name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> Result<R, crate::errors::InstantiateErrorKind> + Send + Sync + 'static,
        R: ScopedResource + 'static,
    {
        self.recipe(Recipe::scoped(name, params, creator))
    }

    /// Seals the registry.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::DuplicateName`] if two recipes share a
    /// name, [`RegistryErrorKind::InvalidRecipeShape`] for an empty recipe
    /// name or duplicate parameter names within one recipe.
    pub fn build(self) -> Result<Registry, RegistryErrorKind> {
        let mut recipes = BTreeMap::new();

        for recipe in self.recipes {
            check_shape(&recipe)?;

            let name = String::from(recipe.name());
            if recipes.insert(name.clone(), Arc::new(recipe)).is_some() {
                return Err(RegistryErrorKind::DuplicateName { name });
            }
        }

        debug!(count = recipes.len(), "registry sealed");
        Ok(Registry { recipes })
    }
}

fn check_shape(recipe: &Recipe) -> Result<(), RegistryErrorKind> {
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
                name: recipe.name().into(),
                reason,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::Registry;
    use crate::{
        errors::RegistryErrorKind,
        recipe::{ParamSpec, Recipe, RecipeKind},
        validation::TypeSpec,
        value::Value,
    };
    use alloc::vec::Vec;

    #[test]
    fn test_build_and_lookup() {
        let registry = Registry::builder()
            .value("answer", 42)
            .function("double", Vec::from([ParamSpec::required("x", TypeSpec::Int)]), |args| {
                Ok(Value::Int(args.require_int("x")? * 2))
            })
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("answer"));
        assert_eq!(registry.lookup("double").unwrap().kind(), RecipeKind::Function);
        assert!(registry.lookup("missing").is_none());
        assert_eq!(registry.names().collect::<Vec<_>>(), Vec::from(["answer", "double"]));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let err = Registry::builder()
            .value("answer", 1)
            .value("answer", 2)
            .build()
            .unwrap_err();

        assert!(matches!(err, RegistryErrorKind::DuplicateName { name } if name == "answer"));
    }

    #[test]
    fn test_invalid_shapes_rejected() {
        let err = Registry::builder().value("", 1).build().unwrap_err();
        assert!(matches!(err, RegistryErrorKind::InvalidRecipeShape { .. }));

        let err = Registry::builder()
            .recipe(Recipe::function(
                "twice",
                Vec::from([
                    ParamSpec::required("x", TypeSpec::Int),
                    ParamSpec::optional("x", TypeSpec::Int),
                ]),
                |args| Ok(args.require("x")?.clone()),
            ))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryErrorKind::InvalidRecipeShape { name, .. } if name == "twice",
        ));
    }
}
