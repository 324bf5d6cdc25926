/// Builds a [`Registry`](crate::Registry) from a list of recipe entries.
///
/// Each entry names a [`RegistryBuilder`](crate::RegistryBuilder) method and
/// its arguments; a bracketed parameter list becomes the `Vec<ParamSpec>`.
/// Expands to the builder chain, so `build`'s shape checks still apply.
///
/// ```
/// use wirebox::{registry, ParamSpec, TypeSpec, Value};
///
/// let registry = registry! {
///     value("base", 4),
///     function("double", [ParamSpec::required("base", TypeSpec::Int)], |args| {
///         Ok(Value::Int(args.require_int("base")? * 2))
///     }),
/// }
/// .unwrap();
/// assert_eq!(registry.len(), 2);
/// ```
#[macro_export]
macro_rules! registry {
    ( $( $kind:ident $args:tt ),* $(,)? ) => {{
        let builder = $crate::Registry::builder();
        $( let builder = $crate::registry_entry!(@entry builder, $kind $args); )*
        builder.build()
    }};
}

#[macro_export]
#[doc(hidden)]
macro_rules! registry_entry {
    (@entry $builder:expr, $kind:ident ( $name:expr, [], $creator:expr $(,)? )) => {
        $builder.$kind($name, $crate::macros_utils::Vec::new(), $creator)
    };
    (@entry $builder:expr, $kind:ident ( $name:expr, [ $( $param:expr ),+ $(,)? ], $creator:expr $(,)? )) => {
        $builder.$kind($name, $crate::macros_utils::Vec::from([ $( $param ),+ ]), $creator)
    };
    (@entry $builder:expr, $kind:ident ( $( $arg:expr ),* $(,)? )) => {
        $builder.$kind( $( $arg ),* )
    };
}

#[cfg(test)]
mod tests {
    extern crate std;

    use crate::{
        errors::RegistryErrorKind,
        recipe::{ParamSpec, Recipe, RecipeKind},
        validation::TypeSpec,
        value::Value,
    };

    #[test]
    fn test_entries_expand_to_builder_calls() {
        let registry = registry! {
            value("base", 4),
            function("double", [ParamSpec::required("base", TypeSpec::Int)], |args| {
                Ok(Value::Int(args.require_int("base")? * 2))
            }),
            class("conn", [], |_args| Ok(Value::instance(()))),
        }
        .unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.lookup("double").unwrap().kind(), RecipeKind::Function);
        assert_eq!(registry.lookup("conn").unwrap().kind(), RecipeKind::Class);
    }

    #[test]
    fn test_prebuilt_and_batch_entries() {
        let registry = registry! {
            recipe(Recipe::value("answer", Value::Int(42))),
            recipes([Recipe::value("a", Value::Int(1)), Recipe::value("b", Value::Int(2))]),
        }
        .unwrap();

        assert_eq!(registry.len(), 3);
        assert!(registry.contains("answer"));
    }

    #[test]
    fn test_empty_registry() {
        let registry = registry! {}.unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_shape_checks_still_apply() {
        let err = registry! {
            value("answer", 1),
            value("answer", 2),
        }
        .unwrap_err();

        assert!(matches!(err, RegistryErrorKind::DuplicateName { name } if name == "answer"));
    }
}
