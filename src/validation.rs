use alloc::string::{String, ToString as _};
use core::fmt::{self, Display, Formatter};

use crate::{any::TypeInfo, errors::TypeMismatch, value::Value};

/// Expected shape of a parameter value or of a resolved component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeSpec {
    Any,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    Instance(TypeInfo),
}

impl TypeSpec {
    #[inline]
    #[must_use]
    pub fn instance_of<T: ?Sized + 'static>() -> Self {
        Self::Instance(TypeInfo::of::<T>())
    }
}

impl Display for TypeSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("str"),
            Self::List => f.write_str("list"),
            Self::Map => f.write_str("map"),
            Self::Instance(info) => write!(f, "instance of {info}"),
        }
    }
}

/// Checks a resolved value against its declared type.
///
/// The engine hands every resolved parameter (and, for explicit expected-type
/// requests, the resolved component) to this capability; swap in your own
/// implementation for richer schemas.
pub trait Validator: Send + Sync {
    /// # Errors
    /// Returns [`TypeMismatch`] if `value` does not satisfy `expected`.
    fn check(&self, value: &Value, expected: &TypeSpec) -> Result<(), TypeMismatch>;
}

/// Structural tag check: `Float` accepts `Int`, `Instance` matches by type id,
/// `Any` accepts everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralValidator;

impl Validator for StructuralValidator {
    fn check(&self, value: &Value, expected: &TypeSpec) -> Result<(), TypeMismatch> {
        let ok = match expected {
            TypeSpec::Any => true,
            TypeSpec::Bool => matches!(value, Value::Bool(_)),
            TypeSpec::Int => matches!(value, Value::Int(_)),
            TypeSpec::Float => matches!(value, Value::Float(_) | Value::Int(_)),
            TypeSpec::Str => matches!(value, Value::Str(_)),
            TypeSpec::List => matches!(value, Value::List(_)),
            TypeSpec::Map => matches!(value, Value::Map(_)),
            TypeSpec::Instance(info) => match value {
                Value::Instance(instance) => instance.type_info() == *info,
                _ => false,
            },
        };

        if ok {
            Ok(())
        } else {
            Err(TypeMismatch {
                expected: *expected,
                actual: actual_label(value),
            })
        }
    }
}

fn actual_label(value: &Value) -> String {
    match value {
        Value::Instance(instance) => {
            let mut label = String::from("instance of ");
            label.push_str(instance.type_info().short_name());
            label
        }
        other => other.type_label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{StructuralValidator, TypeSpec, Validator as _};
    use crate::value::Value;

    struct Conn;

    #[test]
    fn test_tags() {
        let validator = StructuralValidator;

        assert!(validator.check(&Value::Int(1), &TypeSpec::Int).is_ok());
        assert!(validator.check(&Value::Int(1), &TypeSpec::Float).is_ok());
        assert!(validator.check(&Value::Float(1.0), &TypeSpec::Int).is_err());
        assert!(validator.check(&Value::from("s"), &TypeSpec::Str).is_ok());
        assert!(validator.check(&Value::Null, &TypeSpec::Any).is_ok());
    }

    #[test]
    fn test_instance_by_type_id() {
        let validator = StructuralValidator;
        let value = Value::instance(Conn);

        assert!(validator.check(&value, &TypeSpec::instance_of::<Conn>()).is_ok());
        assert!(validator.check(&value, &TypeSpec::instance_of::<i64>()).is_err());
        assert!(validator.check(&Value::Int(1), &TypeSpec::instance_of::<Conn>()).is_err());
    }

    #[test]
    fn test_mismatch_labels() {
        let err = StructuralValidator.check(&Value::instance(Conn), &TypeSpec::Str).unwrap_err();

        assert_eq!(err.expected, TypeSpec::Str);
        assert!(err.actual.contains("Conn"));
    }
}
