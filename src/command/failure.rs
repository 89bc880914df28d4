use thiserror::Error;

use super::{Command, CommandKind, Parameter};
use crate::core::DbError;

/// A driver failure together with the command that triggered it.
///
/// The rendered diagnostics look like:
///
/// ```text
/// (Text)INSERT INTO users VALUES (@id, @name)
/// (Int64,Input)@id=1
/// (String,32,Input)@name=alice
/// ```
#[derive(Error, Debug)]
#[error("sql error: {source}\n{diagnostics}")]
pub struct CommandFailure {
    source: DbError,
    command: Command,
    diagnostics: String,
}

impl CommandFailure {
    pub fn new(source: DbError, command: Command) -> Self {
        let diagnostics = render(&command);
        Self {
            source,
            command,
            diagnostics,
        }
    }

    /// Wraps driver-level errors with the command; configuration, programming
    /// and lock errors pass through untouched.
    pub(crate) fn wrap(source: DbError, command: &Command) -> DbError {
        match source {
            DbError::Driver(_) | DbError::IoError(_) => Self::new(source, command.clone()).into(),
            other => other,
        }
    }

    /// The original driver error.
    pub fn original(&self) -> &DbError {
        &self.source
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    pub fn command_text(&self) -> &str {
        self.command.command_text()
    }

    pub fn command_kind(&self) -> CommandKind {
        self.command.kind()
    }

    pub fn parameters(&self) -> &[Parameter] {
        self.command.parameters()
    }

    pub fn diagnostics(&self) -> &str {
        &self.diagnostics
    }
}

fn render(command: &Command) -> String {
    let mut out = format!("({}){}", command.kind(), command.command_text());
    for parameter in command.parameters() {
        out.push('\n');
        out.push_str(&parameter.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DbType;

    #[test]
    fn test_diagnostics_layout() {
        let command = Command::sql("INSERT INTO users VALUES (@id, @name)")
            .with_parameter(Parameter::new("@id", 1i64))
            .with_parameter(Parameter::typed("@name", "alice", DbType::String).with_size(32));

        let failure = CommandFailure::new(DbError::Driver("UNIQUE constraint failed".into()), command);

        assert_eq!(
            failure.diagnostics(),
            "(Text)INSERT INTO users VALUES (@id, @name)\n(Int64,Input)@id=1\n(String,32,Input)@name=alice"
        );
        let message = failure.to_string();
        assert!(message.starts_with("sql error: Driver error: UNIQUE constraint failed\n"));
        assert!(message.ends_with("@name=alice"));
    }

    #[test]
    fn test_source_is_original_error() {
        use std::error::Error as _;

        let failure = CommandFailure::new(DbError::Driver("boom".into()), Command::sql("SELECT 1"));
        let source = failure.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("Driver error: boom"));
    }

    #[test]
    fn test_wrap_passes_programming_errors_through() {
        let command = Command::sql("SELECT 1");
        let wrapped = CommandFailure::wrap(DbError::Programming("misuse".into()), &command);
        assert!(wrapped.is_programming());

        let wrapped = CommandFailure::wrap(DbError::Driver("io".into()), &command);
        assert_eq!(wrapped.command_failure().map(|f| f.command_text()), Some("SELECT 1"));
    }
}
