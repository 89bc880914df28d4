use thiserror::Error;

use crate::command::CommandFailure;

#[derive(Error, Debug)]
pub enum DbError {
    /// A logical connection name did not resolve, or a provider is unknown.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The underlying driver refused an open, begin, commit, rollback or execute.
    #[error("Driver error: {0}")]
    Driver(String),

    /// API misuse, e.g. committing a dependent transaction.
    #[error("Programming error: {0}")]
    Programming(String),

    #[error(transparent)]
    Command(#[from] Box<CommandFailure>),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Returns the command diagnostics when this error came out of the execution engine.
    pub fn command_failure(&self) -> Option<&CommandFailure> {
        match self {
            Self::Command(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_programming(&self) -> bool {
        matches!(self, Self::Programming(_))
    }
}

impl From<CommandFailure> for DbError {
    fn from(failure: CommandFailure) -> Self {
        Self::Command(Box::new(failure))
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}
