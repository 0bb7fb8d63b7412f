//! Declarative description of a command's parameters, options and validators.

use std::fmt;
use std::sync::Arc;

use crate::values::{ArgValue, ValueType};

/// Returns `Err(reason)` when a bound value is not acceptable.
pub type Validator = Arc<dyn Fn(&ArgValue) -> Result<(), String> + Send + Sync>;

/// A positional parameter. Parameters bind in declaration order.
#[derive(Clone)]
pub struct Parameter {
    pub name: String,
    pub value_type: ValueType,
    pub required: bool,
    pub default: Option<ArgValue>,
    pub validator: Option<Validator>,
    pub description: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            required: false,
            default: None,
            validator: None,
            description: String::new(),
        }
    }

    pub fn required(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            required: true,
            ..Self::new(name, value_type)
        }
    }

    pub fn default_value(mut self, value: impl Into<ArgValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&ArgValue) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// A flag-bound option (`--long` / `-s`).
#[derive(Debug, Clone)]
pub struct CommandOption {
    pub long_name: String,
    pub short_name: Option<char>,
    pub value_type: ValueType,
    pub required: bool,
    pub default: Option<ArgValue>,
    pub description: String,
}

impl CommandOption {
    pub fn new(long_name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            long_name: long_name.into(),
            short_name: None,
            value_type,
            required: false,
            default: None,
            description: String::new(),
        }
    }

    pub fn short(mut self, short_name: char) -> Self {
        self.short_name = Some(short_name);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<ArgValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandSchema {
    pub parameters: Vec<Parameter>,
    pub options: Vec<CommandOption>,
}

impl CommandSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn find_long(&self, name: &str) -> Option<&CommandOption> {
        self.options
            .iter()
            .find(|option| option.long_name.eq_ignore_ascii_case(name))
    }

    pub fn find_short(&self, short: char) -> Option<&CommandOption> {
        self.options
            .iter()
            .find(|option| option.short_name == Some(short))
    }

    /// One-line usage string, e.g. `status <value> [--note <string>]`.
    pub fn usage(&self, command: &str) -> String {
        let mut parts = vec![command.to_string()];
        for parameter in &self.parameters {
            if parameter.required {
                parts.push(format!("<{}>", parameter.name));
            } else {
                parts.push(format!("[{}]", parameter.name));
            }
        }
        for option in &self.options {
            let flag = match option.short_name {
                Some(short) => format!("-{}|--{}", short, option.long_name),
                None => format!("--{}", option.long_name),
            };
            let rendered = if option.value_type == ValueType::Boolean {
                flag
            } else {
                format!("{} <{}>", flag, option.value_type)
            };
            if option.required {
                parts.push(rendered);
            } else {
                parts.push(format!("[{}]", rendered));
            }
        }
        parts.join(" ")
    }
}

/// Validator accepting only the listed values (case-insensitive).
pub fn one_of(allowed: &'static [&'static str]) -> impl Fn(&ArgValue) -> Result<(), String> {
    move |value| {
        let text = value.to_string();
        if allowed
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(text.trim()))
        {
            Ok(())
        } else {
            Err(format!(
                "'{}' is not one of: {}",
                text,
                allowed.join(", ")
            ))
        }
    }
}

/// Validator rejecting blank strings.
pub fn non_empty(value: &ArgValue) -> Result<(), String> {
    if value.to_string().trim().is_empty() {
        Err("value must not be empty".to_string())
    } else {
        Ok(())
    }
}

/// Validator rejecting zero or negative durations.
pub fn positive_duration(value: &ArgValue) -> Result<(), String> {
    match value {
        ArgValue::Duration(duration) if duration.num_seconds() > 0 => Ok(()),
        ArgValue::Duration(_) => {
            Err("duration must be positive (e.g. 1h30m, 45m)".to_string())
        }
        other => Err(format!("expected a duration, got {}", other.value_type())),
    }
}
