use std::fmt;

use super::Value;

pub type Row = Vec<Value>;

/// Declared parameter type, independent of any particular driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DbType {
    #[default]
    Object,
    Boolean,
    Int32,
    Int64,
    Double,
    String,
    Binary,
}

impl DbType {
    /// Picks the natural type for a value; `Null` stays untyped.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => Self::Object,
            Value::Integer(_) => Self::Int64,
            Value::Float(_) => Self::Double,
            Value::Text(_) => Self::String,
            Value::Boolean(_) => Self::Boolean,
            Value::Blob(_) => Self::Binary,
        }
    }

    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Object, _) => true,
            (Self::Int32 | Self::Int64, Value::Integer(_)) => true,
            (Self::Double, Value::Float(_) | Value::Integer(_)) => true,
            (Self::String, Value::Text(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Binary, Value::Blob(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "Object",
            Self::Boolean => "Boolean",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Double => "Double",
            Self::String => "String",
            Self::Binary => "Binary",
        };
        f.write_str(name)
    }
}
