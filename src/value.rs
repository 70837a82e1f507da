//! Minimal value representation for bindings and attributes.
//!
//! The host runtime owns the real value model (vectors, closures, promises).
//! This crate only needs something it can store, compare and print, plus a way
//! to refer to environments from inside a binding (`.GlobalEnv` lives in base).

use std::fmt;

use crate::environment::EnvId;

/// A value stored in a binding or an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Logical(bool),
    Integer(i64),
    Double(f64),
    Str(String),
    List(Vec<Value>),
    /// Reference to an environment in the same registry
    Env(EnvId),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// The string payload, if this is a `Str`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_env(&self) -> Option<EnvId> {
        match self {
            Value::Env(id) => Some(*id),
            _ => None,
        }
    }

    /// Convert a TOML value read from a package library file.
    ///
    /// Tables and datetimes have no counterpart here and become `None`;
    /// arrays convert element-wise.
    pub fn from_toml(value: &toml::Value) -> Option<Self> {
        match value {
            toml::Value::String(s) => Some(Value::Str(s.clone())),
            toml::Value::Integer(i) => Some(Value::Integer(*i)),
            toml::Value::Float(f) => Some(Value::Double(*f)),
            toml::Value::Boolean(b) => Some(Value::Logical(*b)),
            toml::Value::Array(items) => items
                .iter()
                .map(Value::from_toml)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            toml::Value::Table(_) | toml::Value::Datetime(_) => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Logical(b)
    }
}

impl From<EnvId> for Value {
    fn from(id: EnvId) -> Self {
        Value::Env(id)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Logical(true) => write!(f, "TRUE"),
            Value::Logical(false) => write!(f, "FALSE"),
            Value::Integer(i) => write!(f, "{}L", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "list(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Value::Env(id) => write!(f, "<environment: {:#x}>", id.address()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml_scalars() {
        assert_eq!(
            Value::from_toml(&toml::Value::String("x".into())),
            Some(Value::str("x"))
        );
        assert_eq!(
            Value::from_toml(&toml::Value::Integer(3)),
            Some(Value::Integer(3))
        );
        assert_eq!(
            Value::from_toml(&toml::Value::Boolean(true)),
            Some(Value::Logical(true))
        );
    }

    #[test]
    fn test_from_toml_array_and_table() {
        let arr = toml::Value::Array(vec![toml::Value::Integer(1), toml::Value::Float(2.5)]);
        assert_eq!(
            Value::from_toml(&arr),
            Some(Value::List(vec![Value::Integer(1), Value::Double(2.5)]))
        );

        let table = toml::Value::Table(toml::map::Map::new());
        assert_eq!(Value::from_toml(&table), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Logical(true).to_string(), "TRUE");
        assert_eq!(Value::Integer(7).to_string(), "7L");
        assert_eq!(Value::str("hi").to_string(), "\"hi\"");
        assert_eq!(
            Value::List(vec![Value::Null, Value::Double(1.5)]).to_string(),
            "list(NULL, 1.5)"
        );
    }
}
