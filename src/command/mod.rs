// ============================================================================
// Command Descriptors
// ============================================================================
//
// A `Command` is the immutable description of one unit of work handed to the
// execution engine: text, kind, ordered parameters and an optional timeout
// override. Driver-level commands are built from it per execution.
//
// ============================================================================

pub mod failure;
pub mod parameter;

pub use failure::CommandFailure;
pub use parameter::{Parameter, ParameterDirection};

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommandKind {
    #[default]
    Text,
    StoredProcedure,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "Text"),
            Self::StoredProcedure => write!(f, "StoredProcedure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    text: String,
    kind: CommandKind,
    parameters: Vec<Parameter>,
    timeout: Option<Duration>,
}

impl Command {
    pub fn new(text: impl Into<String>, kind: CommandKind, parameters: Vec<Parameter>) -> Self {
        Self {
            text: text.into(),
            kind,
            parameters,
            timeout: None,
        }
    }

    /// A plain SQL text command without parameters.
    pub fn sql(text: impl Into<String>) -> Self {
        Self::new(text, CommandKind::Text, Vec::new())
    }

    /// A stored procedure call by name.
    pub fn procedure(name: impl Into<String>) -> Self {
        Self::new(name, CommandKind::StoredProcedure, Vec::new())
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    /// Overrides the database's command timeout for this command only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn command_text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::sql(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self::sql(text)
    }
}

impl From<&Command> for Command {
    fn from(command: &Command) -> Self {
        command.clone()
    }
}

impl From<(&str, Vec<Parameter>)> for Command {
    fn from((text, parameters): (&str, Vec<Parameter>)) -> Self {
        Self::new(text, CommandKind::Text, parameters)
    }
}

impl From<(&str, CommandKind)> for Command {
    fn from((text, kind): (&str, CommandKind)) -> Self {
        Self::new(text, kind, Vec::new())
    }
}

impl From<(&str, CommandKind, Vec<Parameter>)> for Command {
    fn from((text, kind, parameters): (&str, CommandKind, Vec<Parameter>)) -> Self {
        Self::new(text, kind, parameters)
    }
}
