//! Command handlers: one strategy per command name behind a single trait.

pub mod session;
pub mod subtask;
pub mod workflow;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::parser::ParsedCommand;
use crate::values::{ArgValue, ValueType};

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(
        &self,
        ctx: &ExecutionContext,
        args: &CommandArgs,
    ) -> anyhow::Result<CommandResult>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub command: String,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            command: String::new(),
            success: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            command: String::new(),
            success: false,
            message: error.clone(),
            data: None,
            error: Some(error),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn for_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

/// Untyped argument bag handed to handlers. Accessors fall back to the
/// supplied default when a key is missing or cannot be converted.
#[derive(Debug, Clone, Default)]
pub struct CommandArgs {
    command: String,
    values: BTreeMap<String, ArgValue>,
    raw_text: String,
}

impl CommandArgs {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn from_parsed(parsed: &ParsedCommand) -> Self {
        let mut values = parsed.arguments.clone();
        for (key, value) in &parsed.options {
            values.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Self {
            command: parsed.command_name().to_string(),
            values,
            raw_text: parsed.raw_text.clone(),
        }
    }

    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self {
        self.raw_text = raw_text.into();
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Argument text as written, without the marker and command name.
    pub fn arg_text(&self) -> &str {
        let mut rest = self.raw_text.trim_start();
        for _ in 0..2 {
            rest = match rest.find(char::is_whitespace) {
                Some(idx) => rest[idx..].trim_start(),
                None => "",
            };
        }
        rest.trim_end()
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn typed(&self, key: &str, value_type: ValueType) -> Option<ArgValue> {
        self.values.get(key).and_then(|value| value.convert(value_type))
    }

    pub fn opt_string(&self, key: &str) -> Option<String> {
        match self.typed(key, ValueType::String) {
            Some(ArgValue::String(value)) => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            _ => None,
        }
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        self.opt_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn integer(&self, key: &str, default: i64) -> i64 {
        match self.typed(key, ValueType::Integer) {
            Some(ArgValue::Integer(value)) => value,
            _ => default,
        }
    }

    pub fn boolean(&self, key: &str, default: bool) -> bool {
        match self.typed(key, ValueType::Boolean) {
            Some(ArgValue::Boolean(value)) => value,
            _ => default,
        }
    }

    pub fn date(&self, key: &str, default: DateTime<Utc>) -> DateTime<Utc> {
        match self.typed(key, ValueType::Date) {
            Some(ArgValue::Date(value)) => value,
            _ => default,
        }
    }

    pub fn duration(&self, key: &str, default: Duration) -> Duration {
        match self.typed(key, ValueType::Duration) {
            Some(ArgValue::Duration(value)) => value,
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_fall_back_on_missing_or_unconvertible_values() {
        let args = CommandArgs::new("time")
            .with("duration", "90m")
            .with("count", "many")
            .with("flag", "1")
            .with("blank", "   ");
        assert_eq!(args.duration("duration", Duration::zero()), Duration::minutes(90));
        assert_eq!(args.integer("count", 7), 7);
        assert!(args.boolean("flag", false));
        assert_eq!(args.opt_string("blank"), None);
        assert_eq!(args.string("missing", "fallback"), "fallback");
        assert_eq!(args.command(), "time");
    }

    #[test]
    fn arg_text_drops_marker_and_name() {
        let args = CommandArgs::new("tags").with_raw_text("/notnow tags  api, web ");
        assert_eq!(args.arg_text(), "api, web");
        assert_eq!(CommandArgs::new("stop").with_raw_text("/notnow stop").arg_text(), "");
    }

    #[test]
    fn failed_result_carries_error_text() {
        let result = CommandResult::failed("no active session").for_command("stop");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no active session"));
        assert_eq!(result.command, "stop");
    }
}
