use alloc::{
    collections::BTreeMap,
    string::{String, ToString as _},
    vec::Vec,
};

use crate::{errors::ConfigErrorKind, expr::ExpressionEvaluator, value::Value};

/// What the start-time check needs to know about a registry: which impls
/// exist and which parameters they declare. Implemented by both the sync and
/// the async registry.
pub(crate) trait ShapeIndex {
    fn has_impl(&self, name: &str) -> bool;
    fn has_param(&self, impl_name: &str, param: &str) -> bool;
}

pub(crate) const IMPL_KEY: &str = "-impl";
pub(crate) const REF_KEY: &str = "-ref";
pub(crate) const EXPR_KEY: &str = "-expr";

/// Parsed container configuration: one entry per component to wire.
///
/// The tree is format-agnostic; build a [`Value`] from whatever document
/// format you load and hand it to [`Config::from_value`]. Config is read-only
/// input for a container's whole lifetime.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub(crate) components: BTreeMap<String, ComponentConfig>,
}

#[derive(Clone, Debug)]
pub(crate) enum ComponentConfig {
    /// `{ "-ref": "other" }` at component level: the name is an alias and
    /// resolves to the target component.
    Alias(String),
    Impl(ImplConfig),
}

#[derive(Clone, Debug)]
pub(crate) struct ImplConfig {
    pub(crate) impl_name: String,
    pub(crate) params: BTreeMap<String, ParamValue>,
}

/// A configured parameter value before resolution. `-ref` and `-expr` markers
/// are recognized at any nesting depth.
#[derive(Clone, Debug)]
pub(crate) enum ParamValue {
    Scalar(Value),
    Ref(String),
    Expr(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl Config {
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a raw configuration tree.
    ///
    /// # Errors
    /// Returns [`ConfigErrorKind`] if the tree or any `-ref`/`-expr` marker
    /// is structurally malformed.
    pub fn from_value(value: &Value) -> Result<Self, ConfigErrorKind> {
        let Some(map) = value.as_map() else {
            return Err(ConfigErrorKind::TopLevelNotMap {
                actual: value.type_label(),
            });
        };

        let mut components = BTreeMap::new();
        for (name, node) in map {
            components.insert(name.clone(), load_component(name, node)?);
        }
        Ok(Self { components })
    }

    #[inline]
    #[must_use]
    pub(crate) fn component(&self, name: &str) -> Option<&ComponentConfig> {
        self.components.get(name)
    }

    /// Start-time check: every configured impl and alias target exists, every
    /// configured parameter is in the recipe's declared shape, every
    /// expression parses.
    pub(crate) fn check(&self, shapes: &impl ShapeIndex, evaluator: &dyn ExpressionEvaluator) -> Result<(), ConfigErrorKind> {
        for (name, component) in &self.components {
            let component = match component {
                ComponentConfig::Alias(target) => {
                    if !self.components.contains_key(target) && !shapes.has_impl(target) {
                        return Err(ConfigErrorKind::UnknownImpl {
                            component: name.clone(),
                            impl_name: target.clone(),
                        });
                    }
                    continue;
                }
                ComponentConfig::Impl(component) => component,
            };

            if !shapes.has_impl(&component.impl_name) {
                return Err(ConfigErrorKind::UnknownImpl {
                    component: name.clone(),
                    impl_name: component.impl_name.clone(),
                });
            }

            for (param_name, param) in &component.params {
                if !shapes.has_param(&component.impl_name, param_name) {
                    return Err(ConfigErrorKind::UnknownParam {
                        impl_name: component.impl_name.clone(),
                        parameter: param_name.clone(),
                    });
                }
                check_expressions(param, evaluator)?;
            }
        }
        Ok(())
    }
}

fn check_expressions(param: &ParamValue, evaluator: &dyn ExpressionEvaluator) -> Result<(), ConfigErrorKind> {
    match param {
        ParamValue::Scalar(_) | ParamValue::Ref(_) => Ok(()),
        ParamValue::Expr(text) => match evaluator.dependencies(text) {
            Ok(_) => Ok(()),
            Err(source) => Err(ConfigErrorKind::ExprSyntax {
                text: text.clone(),
                source,
            }),
        },
        ParamValue::List(items) => items.iter().try_for_each(|item| check_expressions(item, evaluator)),
        ParamValue::Map(entries) => entries.values().try_for_each(|entry| check_expressions(entry, evaluator)),
    }
}

fn load_component(name: &str, node: &Value) -> Result<ComponentConfig, ConfigErrorKind> {
    let Some(map) = node.as_map() else {
        return Err(ConfigErrorKind::ComponentNotMap {
            component: name.to_string(),
            actual: node.type_label(),
        });
    };

    if let Some(target) = map.get(REF_KEY) {
        if map.len() != 1 {
            return Err(ConfigErrorKind::RefNotAlone);
        }
        let Some(target) = target.as_str() else {
            return Err(ConfigErrorKind::RefNotString);
        };
        return Ok(ComponentConfig::Alias(target.to_string()));
    }

    let impl_name = match map.get(IMPL_KEY) {
        None => name.to_string(),
        Some(Value::Str(impl_name)) => impl_name.clone(),
        Some(_) => {
            return Err(ConfigErrorKind::ImplNotString {
                component: name.to_string(),
            })
        }
    };

    let mut params = BTreeMap::new();
    for (param_name, param_value) in map {
        if param_name == IMPL_KEY {
            continue;
        }
        params.insert(param_name.clone(), load_param(param_value)?);
    }

    Ok(ComponentConfig::Impl(ImplConfig { impl_name, params }))
}

fn load_param(value: &Value) -> Result<ParamValue, ConfigErrorKind> {
    let map = match value {
        Value::List(items) => {
            let mut loaded = Vec::with_capacity(items.len());
            for item in items {
                loaded.push(load_param(item)?);
            }
            return Ok(ParamValue::List(loaded));
        }
        Value::Map(map) => map,
        other => return Ok(ParamValue::Scalar(other.clone())),
    };

    if let Some(target) = map.get(REF_KEY) {
        if map.len() != 1 {
            return Err(ConfigErrorKind::RefNotAlone);
        }
        let Some(target) = target.as_str() else {
            return Err(ConfigErrorKind::RefNotString);
        };
        return Ok(ParamValue::Ref(target.to_string()));
    }

    if let Some(text) = map.get(EXPR_KEY) {
        if map.len() != 1 {
            return Err(ConfigErrorKind::ExprNotAlone);
        }
        let Some(text) = text.as_str() else {
            return Err(ConfigErrorKind::ExprNotString);
        };
        return Ok(ParamValue::Expr(text.to_string()));
    }

    let mut loaded = BTreeMap::new();
    for (key, nested) in map {
        loaded.insert(key.clone(), load_param(nested)?);
    }
    Ok(ParamValue::Map(loaded))
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{ComponentConfig, Config, ParamValue};
    use crate::{
        errors::ConfigErrorKind, expr::RestrictedEvaluator, recipe::ParamSpec, registry::Registry,
        validation::TypeSpec, value::Value,
    };
    use alloc::vec::Vec;

    #[test]
    fn test_parse_markers_at_depth() {
        let config = Config::from_value(&crate::value!({
            "pool": {
                "-impl": "postgres_pool",
                "size": 8,
                "replicas": [{ "-ref": "primary" }, { "-expr": "refs.base + 1" }],
                "options": { "timeouts": { "-ref": "timeouts" } },
            },
        }))
        .unwrap();

        let ComponentConfig::Impl(component) = config.component("pool").unwrap() else {
            panic!("expected an impl entry");
        };
        assert_eq!(component.impl_name, "postgres_pool");
        assert!(matches!(component.params["size"], ParamValue::Scalar(Value::Int(8))));

        let ParamValue::List(replicas) = &component.params["replicas"] else {
            panic!("expected a list");
        };
        assert!(matches!(&replicas[0], ParamValue::Ref(name) if name == "primary"));
        assert!(matches!(&replicas[1], ParamValue::Expr(text) if text == "refs.base + 1"));

        let ParamValue::Map(options) = &component.params["options"] else {
            panic!("expected a map");
        };
        assert!(matches!(&options["timeouts"], ParamValue::Ref(name) if name == "timeouts"));
    }

    #[test]
    fn test_impl_defaults_to_component_name() {
        let config = Config::from_value(&crate::value!({ "db": {} })).unwrap();
        let ComponentConfig::Impl(component) = config.component("db").unwrap() else {
            panic!("expected an impl entry");
        };
        assert_eq!(component.impl_name, "db");
    }

    #[test]
    fn test_component_level_alias() {
        let config = Config::from_value(&crate::value!({ "primary": { "-ref": "replica" } })).unwrap();
        assert!(matches!(
            config.component("primary").unwrap(),
            ComponentConfig::Alias(target) if target == "replica",
        ));
    }

    #[test]
    fn test_malformed_nodes() {
        assert!(matches!(
            Config::from_value(&crate::value!([1])),
            Err(ConfigErrorKind::TopLevelNotMap { .. }),
        ));
        assert!(matches!(
            Config::from_value(&crate::value!({ "a": 1 })),
            Err(ConfigErrorKind::ComponentNotMap { .. }),
        ));
        assert!(matches!(
            Config::from_value(&crate::value!({ "a": { "-impl": 1 } })),
            Err(ConfigErrorKind::ImplNotString { .. }),
        ));
        assert!(matches!(
            Config::from_value(&crate::value!({ "a": { "p": { "-ref": "b", "extra": 1 } } })),
            Err(ConfigErrorKind::RefNotAlone),
        ));
        assert!(matches!(
            Config::from_value(&crate::value!({ "a": { "p": { "-ref": 1 } } })),
            Err(ConfigErrorKind::RefNotString),
        ));
        assert!(matches!(
            Config::from_value(&crate::value!({ "a": { "p": { "-expr": true } } })),
            Err(ConfigErrorKind::ExprNotString),
        ));
    }

    #[test]
    fn test_check_against_registry() {
        let registry = Registry::builder()
            .function("double", Vec::from([ParamSpec::required("x", TypeSpec::Int)]), |args| {
                Ok(Value::Int(args.require_int("x")? * 2))
            })
            .build()
            .unwrap();

        let ok = Config::from_value(&crate::value!({ "d": { "-impl": "double", "x": 1 } })).unwrap();
        assert!(ok.check(&registry, &RestrictedEvaluator).is_ok());

        let unknown_impl = Config::from_value(&crate::value!({ "d": { "-impl": "triple" } })).unwrap();
        assert!(matches!(
            unknown_impl.check(&registry, &RestrictedEvaluator),
            Err(ConfigErrorKind::UnknownImpl { .. }),
        ));

        let unknown_param = Config::from_value(&crate::value!({ "d": { "-impl": "double", "y": 1 } })).unwrap();
        assert!(matches!(
            unknown_param.check(&registry, &RestrictedEvaluator),
            Err(ConfigErrorKind::UnknownParam { .. }),
        ));

        let bad_expr = Config::from_value(&crate::value!({ "d": { "-impl": "double", "x": { "-expr": "1 +" } } })).unwrap();
        assert!(matches!(
            bad_expr.check(&registry, &RestrictedEvaluator),
            Err(ConfigErrorKind::ExprSyntax { .. }),
        ));

        let dangling_alias = Config::from_value(&crate::value!({ "d": { "-ref": "nowhere" } })).unwrap();
        assert!(matches!(
            dangling_alias.check(&registry, &RestrictedEvaluator),
            Err(ConfigErrorKind::UnknownImpl { .. }),
        ));
    }
}
