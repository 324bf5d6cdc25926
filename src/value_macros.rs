/// Builds a [`Value`](crate::Value) tree from a literal description.
///
/// ```
/// use wirebox::{value, Value};
///
/// let config = value!({
///     "pool": {
///         "-impl": "postgres_pool",
///         "size": 8,
///         "dsn": { "-ref": "dsn" },
///     },
///     "retries": [1, 2, 3],
/// });
/// assert!(matches!(config, Value::Map(_)));
/// ```
#[macro_export]
macro_rules! value {
    (null) => {
        $crate::Value::Null
    };
    ([ $( $items:tt )* ]) => {
        $crate::value_internal!(@list [] $( $items )*)
    };
    ({ $( $entries:tt )* }) => {{
        #[allow(unused_mut)]
        let mut map = $crate::macros_utils::BTreeMap::new();
        $crate::value_internal!(@map map $( $entries )*);
        $crate::Value::Map(map)
    }};
    ($other:expr) => {
        $crate::Value::from($other)
    };
}

// Composite items are munched one by one so a leading `-` on a number
// literal is accepted (`-2` is two tokens and a plain `$item:tt` misses it).
#[macro_export]
#[doc(hidden)]
macro_rules! value_internal {
    (@list []) => {
        $crate::Value::List($crate::macros_utils::Vec::new())
    };
    (@list [ $( $done:expr ),+ ]) => {
        $crate::Value::List($crate::macros_utils::Vec::from([ $( $done ),+ ]))
    };
    (@list [ $( $done:expr ),* ] - $num:literal $(, $( $rest:tt )*)?) => {
        $crate::value_internal!(@list [ $( $done, )* $crate::Value::from(-$num) ] $($( $rest )*)?)
    };
    (@list [ $( $done:expr ),* ] $item:tt $(, $( $rest:tt )*)?) => {
        $crate::value_internal!(@list [ $( $done, )* $crate::value!($item) ] $($( $rest )*)?)
    };
    (@map $map:ident) => {};
    (@map $map:ident $key:literal : - $num:literal $(, $( $rest:tt )*)?) => {
        $map.insert($crate::macros_utils::String::from($key), $crate::Value::from(-$num));
        $crate::value_internal!(@map $map $($( $rest )*)?);
    };
    (@map $map:ident $key:literal : $val:tt $(, $( $rest:tt )*)?) => {
        $map.insert($crate::macros_utils::String::from($key), $crate::value!($val));
        $crate::value_internal!(@map $map $($( $rest )*)?);
    };
}

#[cfg(test)]
mod tests {
    extern crate std;

    use crate::Value;

    #[test]
    fn test_scalars() {
        assert_eq!(value!(null), Value::Null);
        assert_eq!(value!(true), Value::Bool(true));
        assert_eq!(value!(-2), Value::Int(-2));
        assert_eq!(value!(1.5), Value::Float(1.5));
        assert_eq!(value!("s"), Value::from("s"));
    }

    #[test]
    fn test_nested() {
        let value = value!({
            "a": [1, { "-ref": "b" }],
            "b": { "c": null },
        });

        let map = value.as_map().unwrap();
        let list = map["a"].as_list().unwrap();
        assert_eq!(list[0], Value::Int(1));
        assert_eq!(list[1].as_map().unwrap()["-ref"], Value::from("b"));
        assert_eq!(map["b"].as_map().unwrap()["c"], Value::Null);
    }

    #[test]
    fn test_negative_literals_in_composites() {
        let value = value!({
            "n": -2,
            "xs": [-1, 2, -3.5],
        });

        let map = value.as_map().unwrap();
        assert_eq!(map["n"], Value::Int(-2));
        let list = map["xs"].as_list().unwrap();
        assert_eq!(list[0], Value::Int(-1));
        assert_eq!(list[1], Value::Int(2));
        assert_eq!(list[2], Value::Float(-3.5));
    }
}
