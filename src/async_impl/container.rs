use alloc::{
    boxed::Box,
    collections::BTreeMap,
    string::{String, ToString as _},
    sync::Arc,
    vec::Vec,
};
use core::future::Future;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info_span, Instrument as _};

use super::{finalizer::FinalizerStack, registry::Registry};
use crate::{
    config::{ComponentConfig, Config, ParamValue},
    errors::{
        ConfigErrorKind, ConfigValidationError, FinalizationErrorKind, InjectErrorKind, ResolveErrorKind,
        ScopeTeardownError,
    },
    expr::{ExpressionEvaluator, RestrictedEvaluator},
    recipe::{ParamSpec, ResolvedArgs},
    utils::future::BoxFuture,
    validation::{StructuralValidator, TypeSpec, Validator},
    value::Value,
};

struct State {
    cache: BTreeMap<String, Value>,
    finalizers: FinalizerStack,
    // components currently being constructed by some task; waiters subscribe
    in_flight: BTreeMap<String, watch::Receiver<()>>,
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

/// Async mirror of [`crate::Container`]: same resolution algorithm, with
/// creators and finalizers as suspension points. Concurrent `get` calls for
/// one name construct it at most once; late callers await the first
/// construction and share its cached result.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// # Errors
    /// Same start-time config checks as [`crate::Container::new`].
    pub fn new(registry: Registry, config: Config) -> Result<Self, ConfigErrorKind> {
        Self::with_capabilities(registry, config, Arc::new(StructuralValidator), Arc::new(RestrictedEvaluator))
    }

    /// # Errors
    /// Same start-time config checks as [`crate::Container::new`].
    pub fn with_capabilities(
        registry: Registry,
        config: Config,
        validator: Arc<dyn Validator>,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Result<Self, ConfigErrorKind> {
        config.check(&registry, evaluator.as_ref())?;

        debug!(recipes = registry.len(), components = config.components.len(), "async container opened");
        Ok(Self {
            inner: Arc::new(ContainerInner {
                registry,
                config,
                validator,
                evaluator,
                state: Mutex::new(State {
                    cache: BTreeMap::new(),
                    finalizers: FinalizerStack::default(),
                    in_flight: BTreeMap::new(),
                    next_seq: 0,
                    closed: false,
                }),
            }),
        })
    }

    /// Resolves a component; see [`crate::Container::get`].
    ///
    /// # Errors
    /// See [`crate::Container::get`].
    pub async fn get(&self, name: &str) -> Result<Value, ResolveErrorKind> {
        let mut chain = Vec::new();
        self.inner
            .resolve(name, &mut chain)
            .instrument(info_span!("get", component = name))
            .await
            .inspect_err(|err| {
                error!("{}", err);
            })
    }

    /// # Errors
    /// See [`crate::Container::get_expected`].
    pub async fn get_expected(&self, name: &str, expected: &TypeSpec) -> Result<Value, ResolveErrorKind> {
        let value = self.get(name).await?;
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

    /// # Errors
    /// See [`crate::Container::inject`].
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

    /// Dry-run resolution; never awaits a creator, so it stays synchronous.
    ///
    /// # Errors
    /// See [`crate::Container::ensure_constructible`].
    pub fn ensure_constructible(&self, name: &str) -> Result<(), ResolveErrorKind> {
        let state = self.inner.state.lock();
        if state.closed {
            return Err(ResolveErrorKind::ContainerClosed);
        }

        let mut chain = Vec::new();
        self.inner.check_component(&state, name, &mut chain)
    }

    /// # Errors
    /// See [`crate::Container::resolve_args`].
    pub async fn resolve_args(&self, target: &str, params: &[ParamSpec]) -> Result<ResolvedArgs, ResolveErrorKind> {
        let mut args = ResolvedArgs::new();
        for spec in params {
            let mut chain = Vec::new();
            if self.inner.is_resolvable(&spec.name) {
                let value = self.inner.resolve(&spec.name, &mut chain).await?;
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

    /// # Errors
    /// See [`crate::Container::close`].
    pub async fn close(&self) -> Result<(), FinalizationErrorKind> {
        self.close_with_cause(None).await
    }

    /// # Errors
    /// See [`crate::Container::close`].
    pub async fn close_with_cause(&self, cause: Option<&anyhow::Error>) -> Result<(), FinalizationErrorKind> {
        let stack = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.cache.clear();
            state.finalizers.take()
        };

        debug!(finalizers = stack.len(), "async container closing");
        stack.drain(cause).await
    }
}

struct InFlightGuard<'a> {
    state: &'a Mutex<State>,
    name: &'a str,
    // dropped after the map entry is removed, waking every waiter
    _tx: watch::Sender<()>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state.lock().in_flight.remove(self.name);
    }
}

impl ContainerInner {
    fn resolve<'a>(&'a self, name: &'a str, chain: &'a mut Vec<String>) -> BoxFuture<'a, Result<Value, ResolveErrorKind>> {
        Box::pin(async move {
            loop {
                // the lock guard must leave scope before any await so the
                // future stays `Send`
                let waiter_or_tx = {
                    let mut state = self.state.lock();
                    if state.closed {
                        return Err(ResolveErrorKind::ContainerClosed);
                    }
                    if let Some(value) = state.cache.get(name) {
                        debug!(component = name, "found in cache");
                        return Ok(value.clone());
                    }
                    if chain.iter().any(|step| step == name) {
                        let mut cycle = chain.clone();
                        cycle.push(name.to_string());
                        return Err(ResolveErrorKind::CyclicDependency { chain: cycle });
                    }

                    match state.in_flight.get(name).cloned() {
                        Some(waiter) => Ok(waiter),
                        None => {
                            let (tx, rx) = watch::channel(());
                            state.in_flight.insert(name.to_string(), rx);
                            Err(tx)
                        }
                    }
                };

                let tx = match waiter_or_tx {
                    Ok(mut waiter) => {
                        debug!(component = name, "awaiting in-flight construction");
                        // the channel closing (sender dropped) is the settle signal
                        let _ = waiter.changed().await;
                        continue;
                    }
                    Err(tx) => tx,
                };

                let _guard = InFlightGuard {
                    state: &self.state,
                    name,
                    _tx: tx,
                };
                chain.push(name.to_string());
                let result = self.construct(name, chain).await;
                chain.pop();
                return result;
            }
        })
    }

    async fn construct(&self, name: &str, chain: &mut Vec<String>) -> Result<Value, ResolveErrorKind> {
        let component = match self.config.component(name) {
            Some(ComponentConfig::Alias(target)) => {
                let value = self.resolve(target, chain).await?;
                self.state.lock().cache.insert(name.to_string(), value.clone());
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

        let mut args = ResolvedArgs::new();
        for spec in recipe.params() {
            let configured = component.and_then(|component| component.params.get(&spec.name));
            let value = match configured {
                Some(param) => self.resolve_param(param, chain).await?,
                // auto-wiring by parameter name wins over a declared default
                None if self.is_resolvable(&spec.name) => self.resolve(&spec.name, chain).await?,
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

        let acquired = (recipe.creator)(args)
            .await
            .map_err(|source| ResolveErrorKind::Instantiate {
                component: name.to_string(),
                source,
            })?;

        let late_finalizer = {
            let mut state = self.state.lock();
            if state.closed {
                acquired.finalizer
            } else {
                if let Some(finalizer) = acquired.finalizer {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    debug!(component = name, seq, "finalizer registered");
                    state.finalizers.push(name.to_string(), seq, finalizer);
                }
                debug!(component = name, "cached");
                state.cache.insert(name.to_string(), acquired.value.clone());
                return Ok(acquired.value);
            }
        };

        // the container closed mid-construction; unwind the fresh component
        if let Some(finalizer) = late_finalizer {
            if let Err(err) = finalizer(None).await {
                error!("{}", err);
            }
        }
        Err(ResolveErrorKind::ContainerClosed)
    }

    fn resolve_param<'a>(
        &'a self,
        param: &'a ParamValue,
        chain: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<Value, ResolveErrorKind>> {
        Box::pin(async move {
            match param {
                ParamValue::Scalar(value) => Ok(value.clone()),
                ParamValue::Ref(target) => self.resolve(target, chain).await,
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
                        let value = self.resolve(&dependency, chain).await?;
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
                        resolved.push(self.resolve_param(item, chain).await?);
                    }
                    Ok(Value::List(resolved))
                }
                ParamValue::Map(entries) => {
                    let mut resolved = BTreeMap::new();
                    for (key, entry) in entries {
                        resolved.insert(key.clone(), self.resolve_param(entry, chain).await?);
                    }
                    Ok(Value::Map(resolved))
                }
            }
        })
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
        if !state.closed && state.finalizers.len() > 0 {
            // async finalizers cannot run in a sync Drop
            error!(
                finalizers = state.finalizers.len(),
                "async container dropped without close, finalizers were not run"
            );
        }
    }
}

/// Async counterpart of [`crate::with_container`].
///
/// # Errors
/// The body's error (carrying any teardown failure as its
/// [`ScopeTeardownError`] source), a start-time [`ConfigErrorKind`], or a
/// clean-path [`FinalizationErrorKind`].
pub async fn with_async_container<T, F, Fut>(registry: Registry, config: Config, body: F) -> Result<T, anyhow::Error>
where
    F: FnOnce(Container) -> Fut,
    Fut: Future<Output = Result<T, anyhow::Error>>,
{
    let container = Container::new(registry, config)?;

    match body(container.clone()).await {
        Ok(value) => {
            container.close().await?;
            Ok(value)
        }
        Err(err) => match container.close_with_cause(Some(&err)).await {
            Ok(()) => Err(err),
            Err(teardown) => Err(anyhow::Error::new(ScopeTeardownError { body: err, teardown })),
        },
    }
}
