use std::fmt;

use crate::core::{DbType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl ParameterDirection {
    /// Whether the value travels from the caller to the driver.
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input | Self::InputOutput)
    }
}

impl fmt::Display for ParameterDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Input => "Input",
            Self::Output => "Output",
            Self::InputOutput => "InputOutput",
            Self::ReturnValue => "ReturnValue",
        };
        f.write_str(name)
    }
}

/// A named command parameter.
///
/// Drivers resolve `name` against the placeholders in the command text; an
/// empty name binds positionally.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
    pub db_type: DbType,
    pub size: Option<usize>,
    pub direction: ParameterDirection,
}

impl Parameter {
    /// Creates an input parameter whose type is inferred from the value.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            name: name.into(),
            db_type: DbType::infer(&value),
            value,
            size: None,
            direction: ParameterDirection::Input,
        }
    }

    /// Creates an input parameter with an explicit type.
    pub fn typed(name: impl Into<String>, value: impl Into<Value>, db_type: DbType) -> Self {
        Self {
            db_type,
            ..Self::new(name, value)
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Checks the value against the declared type
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.db_type.is_compatible(&self.value) {
            return Err(format!(
                "parameter '{}' is declared {} but holds a {} value",
                self.name,
                self.db_type,
                self.value.type_name()
            ));
        }
        Ok(())
    }
}

/// Renders `(DbType,size,Direction)name=value`; size is omitted when unset.
impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},", self.db_type)?;
        if let Some(size) = self.size {
            write!(f, "{},", size)?;
        }
        write!(f, "{}){}={}", self.direction, self.name, self.value)
    }
}
