#![forbid(unsafe_code)]

//! Dynamically typed payloads and checked conversion out of them.
//!
//! Key-value observation and delegate interception carry untyped values.
//! Streams that promise a concrete type convert through [`FromValue`]; a
//! failed conversion is an ordinary `Err`, never a panic, and the adapter
//! decides whether that drops the event or ends the stream.

use crate::error::{BridgeError, Result};

/// An untyped value as stored by a key-value object or passed to a delegate
/// method.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// Short name of the variant, used in coercion errors.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert into `T`, see [`FromValue`].
    pub fn coerce<T: FromValue>(self) -> Result<T> {
        T::from_value(self)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Checked conversion out of a [`Value`].
///
/// Integers widen to `f64`; nothing else converts across variants. `Null`
/// only converts into `Option<T>` (as `None`) or `Value`.
pub trait FromValue: Sized {
    /// Name used in [`BridgeError::ValueCoercion`].
    const TYPE_NAME: &'static str;

    fn from_value(value: Value) -> Result<Self>;
}

fn mismatch<T: FromValue>(found: &Value) -> BridgeError {
    BridgeError::coercion(T::TYPE_NAME, found.type_name())
}

impl FromValue for Value {
    const TYPE_NAME: &'static str = "value";

    fn from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for i64 {
    const TYPE_NAME: &'static str = "i64";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for i32 {
    const TYPE_NAME: &'static str = "i32";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => {
                i32::try_from(i).map_err(|_| BridgeError::coercion(Self::TYPE_NAME, i.to_string()))
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for usize {
    const TYPE_NAME: &'static str = "usize";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => {
                usize::try_from(i)
                    .map_err(|_| BridgeError::coercion(Self::TYPE_NAME, i.to_string()))
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const TYPE_NAME: &'static str = T::TYPE_NAME;

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    const TYPE_NAME: &'static str = "list";

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_variants_convert() {
        assert_eq!(Value::Bool(true).coerce::<bool>(), Ok(true));
        assert_eq!(Value::Int(7).coerce::<i64>(), Ok(7));
        assert_eq!(Value::from("hi").coerce::<String>(), Ok("hi".to_string()));
    }

    #[test]
    fn int_widens_to_float() {
        assert_eq!(Value::Int(3).coerce::<f64>(), Ok(3.0));
    }

    #[test]
    fn float_does_not_narrow_to_int() {
        let err = Value::Float(3.0).coerce::<i64>().unwrap_err();
        assert_eq!(err, BridgeError::coercion("i64", "float"));
    }

    #[test]
    fn out_of_range_int_is_a_coercion_error() {
        let err = Value::Int(i64::MAX).coerce::<i32>().unwrap_err();
        assert!(err.is_coercion());
        assert!(Value::Int(-1).coerce::<usize>().is_err());
    }

    #[test]
    fn null_only_fits_option() {
        assert_eq!(Value::Null.coerce::<Option<i64>>(), Ok(None));
        assert_eq!(Value::Int(1).coerce::<Option<i64>>(), Ok(Some(1)));
        assert!(Value::Null.coerce::<i64>().is_err());
    }

    #[test]
    fn lists_convert_elementwise() {
        let v = Value::from(vec![1i64, 2, 3]);
        assert_eq!(v.coerce::<Vec<i64>>(), Ok(vec![1, 2, 3]));

        let mixed = Value::List(vec![Value::Int(1), Value::from("x")]);
        assert!(mixed.coerce::<Vec<i64>>().is_err());
    }

    #[test]
    fn option_into_value() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(2i64)), Value::Int(2));
    }
}
