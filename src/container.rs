use alloc::{
    collections::BTreeMap,
    string::{String, ToString as _},
    sync::Arc,
    vec::Vec,
};
use parking_lot::Mutex;
use tracing::{debug, error, info_span};

use crate::{
    config::{ComponentConfig, Config, ImplConfig, ParamValue},
    errors::{
        ConfigErrorKind, ConfigValidationError, FinalizationErrorKind, InjectErrorKind, ResolveErrorKind,
        ScopeTeardownError,
    },
    expr::{ExpressionEvaluator, RestrictedEvaluator},
    finalizer::FinalizerStack,
    recipe::{ParamSpec, Recipe, ResolvedArgs},
    registry::Registry,
    validation::{StructuralValidator, TypeSpec, Validator},
    value::Value,
};

struct State {
    cache: BTreeMap<String, Value>,
    finalizers: FinalizerStack,
    next_seq: u64,
    closed: bool,
}

struct ContainerInner {
    registry: Registry,
    config: Config,
    validator: Arc<dyn Validator>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    state: Mutex<State>,
}

/// A lazy component session over a sealed [`Registry`] and a [`Config`].
///
/// Components are built on first request, cached by name for the container's
/// lifetime, and torn down in reverse construction order at [`Container::close`].
/// Cloning is cheap and shares the same session.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// Opens a session with the default [`StructuralValidator`] and
    /// [`RestrictedEvaluator`].
    ///
    /// # Errors
    /// Returns [`ConfigErrorKind`] if the config names an unknown impl or
    /// alias target, configures a parameter outside a recipe's declared
    /// shape, or holds an unparsable expression. Nothing is resolved yet.
    pub fn new(registry: Registry, config: Config) -> Result<Self, ConfigErrorKind> {
        Self::with_capabilities(registry, config, Arc::new(StructuralValidator), Arc::new(RestrictedEvaluator))
    }

    /// Opens a session with externally supplied validation and expression
    /// capabilities.
    ///
    /// # Errors
    /// Same start-time checks as [`Container::new`], run against the given
    /// evaluator.
    pub fn with_capabilities(
        registry: Registry,
        config: Config,
        validator: Arc<dyn Validator>,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Result<Self, ConfigErrorKind> {
        config.check(&registry, evaluator.as_ref())?;

        debug!(recipes = registry.len(), components = config.components.len(), "container opened");
        Ok(Self {
            inner: Arc::new(ContainerInner {
                registry,
                config,
                validator,
                evaluator,
                state: Mutex::new(State {
                    cache: BTreeMap::new(),
                    finalizers: FinalizerStack::default(),
                    next_seq: 0,
                    closed: false,
                }),
            }),
        })
    }

    /// Resolves a component, building it and its dependencies on first
    /// request.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind`]; a failed request caches nothing, but
    /// dependencies completed along the way stay cached with their
    /// finalizers registered.
    pub fn get(&self, name: &str) -> Result<Value, ResolveErrorKind> {
        let span = info_span!("get", component = name);
        let _guard = span.enter();

        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(ResolveErrorKind::ContainerClosed);
        }

        let mut chain = Vec::new();
        self.inner.resolve(&mut state, name, &mut chain).inspect_err(|err| {
            error!("{}", err);
        })
    }

    /// Resolves a component and checks the result against `expected`. Cache
    /// hits are re-checked too: the expectation belongs to the call, not to
    /// the component.
    ///
    /// # Errors
    /// [`ResolveErrorKind::Validation`] on mismatch, otherwise as [`Container::get`].
    pub fn get_expected(&self, name: &str, expected: &TypeSpec) -> Result<Value, ResolveErrorKind> {
        let value = self.get(name)?;
        self.inner
            .validator
            .check(&value, expected)
            .map_err(|mismatch| ConfigValidationError {
                component: name.to_string(),
                parameter: None,
                mismatch,
            })?;
        Ok(value)
    }

    /// Pre-seeds a component, bypassing its recipe. No finalizer is
    /// registered for injected values.
    ///
    /// # Errors
    /// Returns [`InjectErrorKind::AlreadyCached`] if the name is already
    /// resolved or injected, [`InjectErrorKind::ContainerClosed`] after
    /// [`Container::close`].
    pub fn inject(&self, name: impl Into<String>, value: Value) -> Result<(), InjectErrorKind> {
        let name = name.into();
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(InjectErrorKind::ContainerClosed);
        }
        if state.cache.contains_key(&name) {
            return Err(InjectErrorKind::AlreadyCached { name });
        }
        debug!(component = %name, "component injected");
        state.cache.insert(name, value);
        Ok(())
    }

    /// Dry-run resolution: walks the full dependency graph of `name` and
    /// reports the errors [`Container::get`] would report, without invoking
    /// any creator, caching anything, or registering finalizers. Values are
    /// not produced, so per-parameter validation is skipped.
    ///
    /// # Errors
    /// See [`Container::get`].
    pub fn ensure_constructible(&self, name: &str) -> Result<(), ResolveErrorKind> {
        let state = self.inner.state.lock();
        if state.closed {
            return Err(ResolveErrorKind::ContainerClosed);
        }

        let mut chain = Vec::new();
        self.inner.check_component(&state, name, &mut chain)
    }

    /// Resolves parameters for an ad-hoc factory shape by the auto-wiring
    /// rules; `target` names the factory in diagnostics.
    ///
    /// # Errors
    /// See [`Container::get`].
    pub fn resolve_args(&self, target: &str, params: &[ParamSpec]) -> Result<ResolvedArgs, ResolveErrorKind> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(ResolveErrorKind::ContainerClosed);
        }

        let mut args = ResolvedArgs::new();
        for spec in params {
            let mut chain = Vec::new();
            if self.inner.is_resolvable(&spec.name) {
                let value = self.inner.resolve(&mut state, &spec.name, &mut chain)?;
                self.inner.validate(target, spec, &value)?;
                args.push(spec.name.clone(), value);
            } else if !spec.has_default {
                return Err(ResolveErrorKind::MissingDependency {
                    component: target.to_string(),
                    parameter: spec.name.clone(),
                    chain,
                });
            }
        }
        Ok(args)
    }

    /// Runs every registered finalizer, newest first, and marks the session
    /// closed. Idempotent; later [`Container::get`] calls fail with
    /// [`ResolveErrorKind::ContainerClosed`].
    ///
    /// # Errors
    /// Returns [`FinalizationErrorKind`] aggregating any finalizer failures.
    pub fn close(&self) -> Result<(), FinalizationErrorKind> {
        self.close_with_cause(None)
    }

    /// Closes, handing `cause` to every scoped-resource exit step.
    ///
    /// # Errors
    /// See [`Container::close`].
    pub fn close_with_cause(&self, cause: Option<&anyhow::Error>) -> Result<(), FinalizationErrorKind> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Ok(());
        }
        state.closed = true;

        debug!(finalizers = state.finalizers.len(), "container closing");
        let result = state.finalizers.drain(cause);
        state.cache.clear();
        result
    }
}

impl ContainerInner {
    fn resolve(&self, state: &mut State, name: &str, chain: &mut Vec<String>) -> Result<Value, ResolveErrorKind> {
        if let Some(value) = state.cache.get(name) {
            debug!(component = name, "found in cache");
            return Ok(value.clone());
        }

        if chain.iter().any(|step| step == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(ResolveErrorKind::CyclicDependency { chain: cycle });
        }

        chain.push(name.to_string());
        let result = self.construct(state, name, chain);
        chain.pop();
        result
    }

    fn construct(&self, state: &mut State, name: &str, chain: &mut Vec<String>) -> Result<Value, ResolveErrorKind> {
        let component = match self.config.component(name) {
            Some(ComponentConfig::Alias(target)) => {
                let target = target.clone();
                let value = self.resolve(state, &target, chain)?;
                state.cache.insert(name.to_string(), value.clone());
                return Ok(value);
            }
            Some(ComponentConfig::Impl(component)) => Some(component),
            None => None,
        };

        let impl_name = component.map_or(name, |component| component.impl_name.as_str());
        let Some(recipe) = self.registry.lookup(impl_name) else {
            let mut chain = chain.clone();
            chain.pop();
            return Err(ResolveErrorKind::UnknownComponent {
                name: name.to_string(),
                chain,
            });
        };
        let recipe = Arc::clone(recipe);

        let args = self.gather_args(state, name, component, &recipe, chain)?;

        let acquired = (recipe.creator)(args).map_err(|source| ResolveErrorKind::Instantiate {
            component: name.to_string(),
            source,
        })?;

        if let Some(finalizer) = acquired.finalizer {
            let seq = state.next_seq;
            state.next_seq += 1;
            debug!(component = name, seq, "finalizer registered");
            state.finalizers.push(name.to_string(), seq, finalizer);
        }

        debug!(component = name, "cached");
        state.cache.insert(name.to_string(), acquired.value.clone());
        Ok(acquired.value)
    }

    fn gather_args(
        &self,
        state: &mut State,
        name: &str,
        component: Option<&ImplConfig>,
        recipe: &Recipe,
        chain: &mut Vec<String>,
    ) -> Result<ResolvedArgs, ResolveErrorKind> {
        let mut args = ResolvedArgs::new();
        for spec in recipe.params() {
            let configured = component.and_then(|component| component.params.get(&spec.name));
            let value = match configured {
                Some(param) => self.resolve_param(state, param, chain)?,
                // auto-wiring by parameter name wins over a declared default
                None if self.is_resolvable(&spec.name) => self.resolve(state, &spec.name, chain)?,
                None if spec.has_default => continue,
                None => {
                    return Err(ResolveErrorKind::MissingDependency {
                        component: name.to_string(),
                        parameter: spec.name.clone(),
                        chain: chain.clone(),
                    })
                }
            };

            self.validate(name, spec, &value)?;
            args.push(spec.name.clone(), value);
        }
        Ok(args)
    }

    fn resolve_param(
        &self,
        state: &mut State,
        param: &ParamValue,
        chain: &mut Vec<String>,
    ) -> Result<Value, ResolveErrorKind> {
        match param {
            ParamValue::Scalar(value) => Ok(value.clone()),
            ParamValue::Ref(target) => self.resolve(state, target, chain),
            ParamValue::Expr(text) => {
                let dependencies = self
                    .evaluator
                    .dependencies(text)
                    .map_err(|source| ConfigErrorKind::ExprSyntax {
                        text: text.clone(),
                        source,
                    })?;

                let mut refs = BTreeMap::new();
                for dependency in dependencies {
                    let value = self.resolve(state, &dependency, chain)?;
                    refs.insert(dependency, value);
                }

                self.evaluator
                    .evaluate(text, &refs)
                    .map_err(|source| ResolveErrorKind::Expression {
                        text: text.clone(),
                        source,
                    })
            }
            ParamValue::List(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(self.resolve_param(state, item, chain)?);
                }
                Ok(Value::List(resolved))
            }
            ParamValue::Map(entries) => {
                let mut resolved = BTreeMap::new();
                for (key, entry) in entries {
                    resolved.insert(key.clone(), self.resolve_param(state, entry, chain)?);
                }
                Ok(Value::Map(resolved))
            }
        }
    }

    fn validate(&self, component: &str, spec: &ParamSpec, value: &Value) -> Result<(), ResolveErrorKind> {
        self.validator
            .check(value, &spec.type_spec)
            .map_err(|mismatch| ConfigValidationError {
                component: component.to_string(),
                parameter: Some(spec.name.clone()),
                mismatch,
            })?;
        Ok(())
    }

    fn is_resolvable(&self, name: &str) -> bool {
        self.config.component(name).is_some() || self.registry.contains(name)
    }

    fn check_component(&self, state: &State, name: &str, chain: &mut Vec<String>) -> Result<(), ResolveErrorKind> {
        if state.cache.contains_key(name) {
            return Ok(());
        }

        if chain.iter().any(|step| step == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(ResolveErrorKind::CyclicDependency { chain: cycle });
        }

        chain.push(name.to_string());
        let result = self.check_construct(state, name, chain);
        chain.pop();
        result
    }

    fn check_construct(&self, state: &State, name: &str, chain: &mut Vec<String>) -> Result<(), ResolveErrorKind> {
        let component = match self.config.component(name) {
            Some(ComponentConfig::Alias(target)) => return self.check_component(state, &target.clone(), chain),
            Some(ComponentConfig::Impl(component)) => Some(component),
            None => None,
        };

        let impl_name = component.map_or(name, |component| component.impl_name.as_str());
        let Some(recipe) = self.registry.lookup(impl_name) else {
            let mut chain = chain.clone();
            chain.pop();
            return Err(ResolveErrorKind::UnknownComponent {
                name: name.to_string(),
                chain,
            });
        };

        for spec in recipe.params() {
            match component.and_then(|component| component.params.get(&spec.name)) {
                Some(param) => self.check_param(state, param, chain)?,
                None if self.is_resolvable(&spec.name) => self.check_component(state, &spec.name, chain)?,
                None if spec.has_default => {}
                None => {
                    return Err(ResolveErrorKind::MissingDependency {
                        component: name.to_string(),
                        parameter: spec.name.clone(),
                        chain: chain.clone(),
                    })
                }
            }
        }
        Ok(())
    }

    fn check_param(&self, state: &State, param: &ParamValue, chain: &mut Vec<String>) -> Result<(), ResolveErrorKind> {
        match param {
            ParamValue::Scalar(_) => Ok(()),
            ParamValue::Ref(target) => self.check_component(state, target, chain),
            ParamValue::Expr(text) => {
                let dependencies = self
                    .evaluator
                    .dependencies(text)
                    .map_err(|source| ConfigErrorKind::ExprSyntax {
                        text: text.clone(),
                        source,
                    })?;
                for dependency in dependencies {
                    self.check_component(state, &dependency, chain)?;
                }
                Ok(())
            }
            ParamValue::List(items) => items.iter().try_for_each(|item| self.check_param(state, item, chain)),
            ParamValue::Map(entries) => entries
                .values()
                .try_for_each(|entry| self.check_param(state, entry, chain)),
        }
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.closed {
            return;
        }
        state.closed = true;

        debug!(finalizers = state.finalizers.len(), "container dropped while open, closing");
        if let Err(err) = state.finalizers.drain(None) {
            error!("{}", err);
        }
    }
}

/// Opens a container over `registry` and `config`, runs `body`, and always
/// closes. A failing body is the primary error; a finalization failure during
/// its teardown is attached as the source via [`ScopeTeardownError`].
///
/// # Errors
/// The body's error, a start-time [`ConfigErrorKind`], or a clean-path
/// [`FinalizationErrorKind`].
pub fn with_container<T>(
    registry: Registry,
    config: Config,
    body: impl FnOnce(&Container) -> Result<T, anyhow::Error>,
) -> Result<T, anyhow::Error> {
    let container = Container::new(registry, config)?;

    match body(&container) {
        Ok(value) => {
            container.close()?;
            Ok(value)
        }
        Err(err) => match container.close_with_cause(Some(&err)) {
            Ok(()) => Err(err),
            Err(teardown) => Err(anyhow::Error::new(ScopeTeardownError { body: err, teardown })),
        },
    }
}
