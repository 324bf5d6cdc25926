use alloc::{boxed::Box, string::String, sync::Arc, vec::Vec};
use core::{
    any::Any,
    fmt::{self, Debug, Formatter},
};

use crate::{
    errors::InstantiateErrorKind,
    finalizer::{Cleanup, FinalizeFn},
    validation::TypeSpec,
    value::Value,
};

/// How a recipe produces its component and whether it leaves a finalizer
/// behind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecipeKind {
    /// A stored value, cloned out on every construction.
    Value,
    /// A plain factory function.
    Function,
    /// A constructor returning an instance. Same invocation as `Function`;
    /// kept distinct so registries document intent.
    Class,
    /// A factory that yields the component together with a cleanup step,
    /// run once at teardown.
    Generator,
    /// An acquire/release resource; release receives the triggering error
    /// on failure-path teardown.
    Scoped,
    /// Async counterparts, only produced by the async registry.
    #[cfg(feature = "async")]
    AsyncFunction,
    #[cfg(feature = "async")]
    AsyncGenerator,
    #[cfg(feature = "async")]
    AsyncScoped,
}

/// One declared parameter of a recipe.
///
/// The shape is declared explicitly at registration and never re-derived at
/// resolution time. A parameter with a default may be omitted by the engine;
/// the creator then applies the default itself.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: String,
    pub type_spec: TypeSpec,
    pub has_default: bool,
}

impl ParamSpec {
    #[must_use]
    pub fn required(name: impl Into<String>, type_spec: TypeSpec) -> Self {
        Self {
            name: name.into(),
            type_spec,
            has_default: false,
        }
    }

    #[must_use]
    pub fn optional(name: impl Into<String>, type_spec: TypeSpec) -> Self {
        Self {
            name: name.into(),
            type_spec,
            has_default: true,
        }
    }
}

/// Resolved parameter values, in declaration order. Parameters whose default
/// applies are absent.
#[derive(Debug, Default)]
pub struct ResolvedArgs {
    values: Vec<(String, Value)>,
}

impl ResolvedArgs {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: String, value: Value) {
        self.values.push((name, value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// # Errors
    /// Returns [`InstantiateErrorKind::MissingArgument`] if absent.
    pub fn require(&self, name: &str) -> Result<&Value, InstantiateErrorKind> {
        self.get(name).ok_or_else(|| InstantiateErrorKind::MissingArgument { name: name.into() })
    }

    /// # Errors
    /// Returns [`InstantiateErrorKind`] if absent or not an int.
    pub fn require_int(&self, name: &str) -> Result<i64, InstantiateErrorKind> {
        let value = self.require(name)?;
        value.as_int().ok_or_else(|| wrong_type(name, "int", value))
    }

    /// # Errors
    /// Returns [`InstantiateErrorKind`] if absent or not numeric.
    pub fn require_float(&self, name: &str) -> Result<f64, InstantiateErrorKind> {
        let value = self.require(name)?;
        value.as_float().ok_or_else(|| wrong_type(name, "float", value))
    }

    /// # Errors
    /// Returns [`InstantiateErrorKind`] if absent or not a bool.
    pub fn require_bool(&self, name: &str) -> Result<bool, InstantiateErrorKind> {
        let value = self.require(name)?;
        value.as_bool().ok_or_else(|| wrong_type(name, "bool", value))
    }

    /// # Errors
    /// Returns [`InstantiateErrorKind`] if absent or not a string.
    pub fn require_str(&self, name: &str) -> Result<&str, InstantiateErrorKind> {
        let value = self.require(name)?;
        value.as_str().ok_or_else(|| wrong_type(name, "str", value))
    }

    /// # Errors
    /// Returns [`InstantiateErrorKind`] if absent or not an instance of `T`.
    pub fn require_instance<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, InstantiateErrorKind> {
        let value = self.require(name)?;
        value.downcast().ok_or_else(|| wrong_type(name, "instance", value))
    }
}

fn wrong_type(name: &str, expected: &'static str, actual: &Value) -> InstantiateErrorKind {
    InstantiateErrorKind::WrongArgumentType {
        name: name.into(),
        expected,
        actual: actual.type_label(),
    }
}

/// What a creation step produced: the component value and, for generator and
/// scoped kinds, its finalizer.
pub(crate) struct Acquired {
    pub(crate) value: Value,
    pub(crate) finalizer: Option<FinalizeFn>,
}

impl Debug for Acquired {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquired")
            .field("value", &self.value)
            .field("finalizer", &self.finalizer.as_ref().map(|_| "..."))
            .finish()
    }
}

pub(crate) type BoxedCreator = Arc<dyn Fn(ResolvedArgs) -> Result<Acquired, InstantiateErrorKind> + Send + Sync>;

/// An acquire/release resource managed by the container.
///
/// `enter` runs during construction and yields the component; `exit` becomes
/// the finalizer and is handed the error that triggered teardown, if any.
pub trait ScopedResource: Send {
    /// # Errors
    /// Aborts the component's construction.
    fn enter(&mut self) -> Result<Value, InstantiateErrorKind>;

    /// # Errors
    /// Collected into the aggregate finalization error at teardown.
    fn exit(&mut self, error: Option<&anyhow::Error>) -> Result<(), anyhow::Error>;
}

/// A registered description of how to produce a component: kind, creator and
/// declared parameter shape. Immutable once registered.
#[derive(Clone)]
pub struct Recipe {
    pub(crate) name: String,
    pub(crate) kind: RecipeKind,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) creator: BoxedCreator,
}

impl Recipe {
    /// A recipe holding a fixed value. Declares no parameters.
    #[must_use]
    pub fn value(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            kind: RecipeKind::Value,
            params: Vec::new(),
            creator: Arc::new(move |_args| {
                Ok(Acquired {
                    value: value.clone(),
                    finalizer: None,
                })
            }),
        }
    }

    /// A plain factory function.
    #[must_use]
    pub fn function<F>(name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> Result<Value, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: RecipeKind::Function,
            params,
            creator: Arc::new(move |args| {
                Ok(Acquired {
                    value: creator(&args)?,
                    finalizer: None,
                })
            }),
        }
    }

    /// A constructor; conventionally returns [`Value::instance`]. An instance
    /// needing teardown belongs in [`Recipe::scoped`] instead.
    #[must_use]
    pub fn class<F>(name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> Result<Value, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self {
            kind: RecipeKind::Class,
            ..Self::function(name, params, creator)
        }
    }

    /// A factory yielding the component plus a cleanup step. The cleanup is
    /// the "resume to completion" half and runs exactly once at teardown.
    #[must_use]
    pub fn generator<F>(name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> Result<(Value, Cleanup), InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: RecipeKind::Generator,
            params,
            creator: Arc::new(move |args| {
                let (value, cleanup) = creator(&args)?;
                Ok(Acquired {
                    value,
                    finalizer: Some(Box::new(move |_error| cleanup())),
                })
            }),
        }
    }

    /// An acquire/release resource factory; see [`ScopedResource`].
    #[must_use]
    pub fn scoped<F, R>(name: impl Into<String>, params: Vec<ParamSpec>, creator: F) -> Self
    where
        F: Fn(&ResolvedArgs) -> Result<R, InstantiateErrorKind> + Send + Sync + 'static,
        R: ScopedResource + 'static,
    {
        Self {
            name: name.into(),
            kind: RecipeKind::Scoped,
            params,
            creator: Arc::new(move |args| {
                let mut resource = creator(&args)?;
                let value = resource.enter()?;
                Ok(Acquired {
                    value,
                    finalizer: Some(Box::new(move |error| {
                        let mut resource = resource;
                        resource.exit(error)
                    })),
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

impl Debug for Recipe {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{ParamSpec, Recipe, RecipeKind, ResolvedArgs};
    use crate::{errors::InstantiateErrorKind, validation::TypeSpec, value::Value};
    use alloc::{string::String, vec::Vec};

    #[test]
    fn test_value_recipe_clones_out() {
        let recipe = Recipe::value("answer", Value::Int(42));
        assert_eq!(recipe.kind(), RecipeKind::Value);
        assert!(recipe.params().is_empty());

        let acquired = (recipe.creator)(ResolvedArgs::new()).unwrap();
        assert_eq!(acquired.value, Value::Int(42));
        assert!(acquired.finalizer.is_none());
    }

    #[test]
    fn test_function_recipe() {
        let recipe = Recipe::function("double", Vec::from([ParamSpec::required("x", TypeSpec::Int)]), |args| {
            Ok(Value::Int(args.require_int("x")? * 2))
        });

        let mut args = ResolvedArgs::new();
        args.push(String::from("x"), Value::Int(21));
        assert_eq!((recipe.creator)(args).unwrap().value, Value::Int(42));

        let err = (recipe.creator)(ResolvedArgs::new()).unwrap_err();
        assert!(matches!(err, InstantiateErrorKind::MissingArgument { .. }));
    }

    #[test]
    fn test_args_accessors() {
        let mut args = ResolvedArgs::new();
        args.push(String::from("n"), Value::Int(1));
        args.push(String::from("s"), Value::from("x"));

        assert_eq!(args.len(), 2);
        assert_eq!(args.require_int("n").unwrap(), 1);
        assert_eq!(args.require_float("n").unwrap(), 1.0);
        assert_eq!(args.require_str("s").unwrap(), "x");
        assert!(matches!(
            args.require_int("s"),
            Err(InstantiateErrorKind::WrongArgumentType { .. }),
        ));
        assert!(args.get("missing").is_none());
    }
}
