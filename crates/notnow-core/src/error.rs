use thiserror::Error;

use crate::context::CommandContext;

/// Per-command failure. Never aborts a parse or a batch; it is carried by the
/// `ParsedCommand` or `CommandResult` it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("command '{command}' is not allowed in this context ({context})")]
    ContextNotAllowed {
        command: String,
        context: CommandContext,
    },
    #[error("command '{command}' is missing required field '{field}'")]
    MissingRequiredField { command: String, field: String },
    #[error("command '{command}' has an invalid value for '{field}': {reason}")]
    InvalidFieldValue {
        command: String,
        field: String,
        reason: String,
    },
    #[error("command not found: {0}")]
    CommandNotFound(String),
    #[error("handler not found for command '{0}'")]
    HandlerNotFound(String),
    #[error("command '{command}' failed: {message}")]
    HandlerExecutionFailure { command: String, message: String },
}

impl CommandError {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::UnknownCommand(_) => "unknown_command",
            CommandError::ContextNotAllowed { .. } => "context_not_allowed",
            CommandError::MissingRequiredField { .. } => "missing_required_field",
            CommandError::InvalidFieldValue { .. } => "invalid_field_value",
            CommandError::CommandNotFound(_) => "command_not_found",
            CommandError::HandlerNotFound(_) => "handler_not_found",
            CommandError::HandlerExecutionFailure { .. } => "handler_execution_failure",
        }
    }
}
