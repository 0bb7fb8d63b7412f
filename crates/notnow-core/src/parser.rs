use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::context::CommandContext;
use crate::error::CommandError;
use crate::grammar::{tokenize, CommandGrammar, Occurrence, Token};
use crate::registry::{CommandRegistration, CommandRegistry};
use crate::schema::CommandSchema;
use crate::snapshot;
use crate::values::{coerce, ArgValue, ValueType};

/// One command occurrence after lookup, binding and validation.
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub name: String,
    pub registration: Option<Arc<CommandRegistration>>,
    pub arguments: BTreeMap<String, ArgValue>,
    pub options: BTreeMap<String, ArgValue>,
    pub error: Option<CommandError>,
    pub raw_text: String,
    pub position: usize,
}

impl ParsedCommand {
    fn new(occurrence: &Occurrence<'_>) -> Self {
        Self {
            name: occurrence.name.to_string(),
            registration: None,
            arguments: BTreeMap::new(),
            options: BTreeMap::new(),
            error: None,
            raw_text: occurrence.raw.to_string(),
            position: occurrence.position,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// The registered primary name when resolved, otherwise the text as written.
    pub fn command_name(&self) -> &str {
        self.registration
            .as_ref()
            .map(|registration| registration.name.as_str())
            .unwrap_or(&self.name)
    }

    pub fn argument(&self, name: &str) -> Option<&ArgValue> {
        self.arguments.get(name)
    }

    pub fn option(&self, name: &str) -> Option<&ArgValue> {
        self.options.get(name)
    }

    /// Keeps the first recorded error.
    fn fail(&mut self, error: CommandError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

pub struct CommandParser {
    registry: Arc<CommandRegistry>,
    grammar: CommandGrammar,
}

impl CommandParser {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            registry,
            grammar: CommandGrammar::default(),
        }
    }

    pub fn with_marker(registry: Arc<CommandRegistry>, marker: &str) -> Self {
        Self {
            registry,
            grammar: CommandGrammar::new(marker),
        }
    }

    pub fn grammar(&self) -> &CommandGrammar {
        &self.grammar
    }

    /// True when `parse` would find at least one occurrence; snapshot blocks
    /// are skipped here too.
    pub fn contains_command(&self, text: &str) -> bool {
        self.grammar.contains_command(&snapshot::strip(text))
    }

    pub fn parse(&self, text: &str, context: CommandContext) -> Vec<ParsedCommand> {
        self.parse_at(text, context, Utc::now())
    }

    /// Like `parse`, with an explicit clock for the date fallback. Embedded
    /// state snapshots are skipped; positions refer to the text without them.
    pub fn parse_at(
        &self,
        text: &str,
        context: CommandContext,
        now: DateTime<Utc>,
    ) -> Vec<ParsedCommand> {
        let text = snapshot::strip(text);
        let parsed: Vec<ParsedCommand> = self
            .grammar
            .scan(&text)
            .iter()
            .map(|occurrence| self.parse_occurrence(occurrence, context, now))
            .collect();
        debug!(
            commands = parsed.len(),
            invalid = parsed.iter().filter(|command| !command.is_valid()).count(),
            %context,
            "parsed command text"
        );
        parsed
    }

    fn parse_occurrence(
        &self,
        occurrence: &Occurrence<'_>,
        context: CommandContext,
        now: DateTime<Utc>,
    ) -> ParsedCommand {
        let mut command = ParsedCommand::new(occurrence);

        let Some(registration) = self.registry.get_command(occurrence.name) else {
            command.fail(CommandError::UnknownCommand(occurrence.name.to_string()));
            return command;
        };
        command.registration = Some(registration.clone());

        if !registration.allowed_context.contains(context) {
            command.fail(CommandError::ContextNotAllowed {
                command: registration.name.clone(),
                context,
            });
            return command;
        }

        let tokens = tokenize(occurrence.args);
        bind_tokens(&mut command, &registration.schema, &tokens, now);
        validate(&mut command, &registration);
        apply_defaults(&mut command, &registration.schema);
        check_required(&mut command, &registration);
        command
    }
}

fn bind_tokens(
    command: &mut ParsedCommand,
    schema: &CommandSchema,
    tokens: &[Token],
    now: DateTime<Utc>,
) {
    let mut next_positional = 0;
    let mut idx = 0;
    while idx < tokens.len() {
        let token = &tokens[idx];
        idx += 1;

        if token.is_option_like() {
            let (declared, written) = match token.text.strip_prefix("--") {
                Some(long) => (schema.find_long(long), long.to_string()),
                None => {
                    let short = token.text.chars().nth(1).unwrap_or('-');
                    (schema.find_short(short), short.to_string())
                }
            };
            let key = declared
                .map(|option| option.long_name.clone())
                .unwrap_or(written);
            let value_type = declared.map(|option| option.value_type);

            if value_type == Some(ValueType::Boolean) {
                command.options.insert(key, ArgValue::Boolean(true));
                continue;
            }
            match tokens.get(idx) {
                Some(next) if !next.is_option_like() => {
                    idx += 1;
                    let value_type = value_type.unwrap_or(ValueType::String);
                    let value = coerce_logged(&command.name, &key, &next.text, value_type, now);
                    command.options.insert(key, value);
                }
                _ if declared.is_none() => {
                    command.options.insert(key, ArgValue::Boolean(true));
                }
                _ => {
                    debug!(command = %command.name, option = %key, "option given without a value");
                }
            }
            continue;
        }

        match schema.parameters.get(next_positional) {
            Some(parameter) => {
                let value = coerce_logged(
                    &command.name,
                    &parameter.name,
                    &token.text,
                    parameter.value_type,
                    now,
                );
                command.arguments.insert(parameter.name.clone(), value);
                next_positional += 1;
            }
            None => {
                debug!(command = %command.name, token = %token.text, "extra positional token skipped");
            }
        }
    }
}

fn coerce_logged(
    command: &str,
    field: &str,
    raw: &str,
    value_type: ValueType,
    now: DateTime<Utc>,
) -> ArgValue {
    let coerced = coerce(raw, value_type, now);
    if coerced.lossy {
        warn!(
            command = %command,
            field = %field,
            raw = %raw,
            value_type = %value_type,
            fallback = %coerced.value,
            "argument could not be parsed; using fallback value"
        );
    }
    coerced.value
}

fn validate(command: &mut ParsedCommand, registration: &CommandRegistration) {
    for parameter in &registration.schema.parameters {
        let Some(validator) = parameter.validator.as_ref() else {
            continue;
        };
        let Some(value) = command.arguments.get(&parameter.name) else {
            continue;
        };
        if let Err(reason) = validator(value) {
            command.fail(CommandError::InvalidFieldValue {
                command: registration.name.clone(),
                field: parameter.name.clone(),
                reason,
            });
        }
    }
}

fn apply_defaults(command: &mut ParsedCommand, schema: &CommandSchema) {
    for parameter in &schema.parameters {
        if let Some(default) = parameter.default.as_ref() {
            command
                .arguments
                .entry(parameter.name.clone())
                .or_insert_with(|| default.clone());
        }
    }
    for option in &schema.options {
        if let Some(default) = option.default.as_ref() {
            command
                .options
                .entry(option.long_name.clone())
                .or_insert_with(|| default.clone());
        }
    }
}

fn check_required(command: &mut ParsedCommand, registration: &CommandRegistration) {
    let missing_parameter = registration
        .schema
        .parameters
        .iter()
        .find(|parameter| parameter.required && !command.arguments.contains_key(&parameter.name))
        .map(|parameter| parameter.name.clone());
    let missing_option = registration
        .schema
        .options
        .iter()
        .find(|option| option.required && !command.options.contains_key(&option.long_name))
        .map(|option| format!("--{}", option.long_name));

    if let Some(field) = missing_parameter.or(missing_option) {
        command.fail(CommandError::MissingRequiredField {
            command: registration.name.clone(),
            field,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CommandRegistration;
    use crate::schema::{one_of, CommandOption, Parameter};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap()
    }

    fn parser() -> CommandParser {
        let mut registry = CommandRegistry::new();
        registry.register_command(
            CommandRegistration::new("status").schema(
                CommandSchema::new().parameter(
                    Parameter::required("value", ValueType::String)
                        .validator(one_of(&["todo", "in_progress", "done"])),
                ),
            ),
        );
        registry.register_command(
            CommandRegistration::new("time")
                .allowed_in(CommandContext::COMMENT)
                .schema(
                    CommandSchema::new()
                        .parameter(Parameter::required("duration", ValueType::Duration))
                        .option(CommandOption::new("description", ValueType::String).short('d'))
                        .option(CommandOption::new("billable", ValueType::Boolean)),
                ),
        );
        registry.register_command(
            CommandRegistration::new("init").allowed_in(CommandContext::ISSUE_BODY),
        );
        registry.register_command(
            CommandRegistration::new("due").schema(
                CommandSchema::new()
                    .parameter(Parameter::required("date", ValueType::Date))
                    .option(CommandOption::new("reminders", ValueType::Integer).default_value(1i64)),
            ),
        );
        registry.register_command(
            CommandRegistration::new("review").schema(
                CommandSchema::new()
                    .parameter(Parameter::new("who", ValueType::String).default_value("team"))
                    .option(CommandOption::new("ticket", ValueType::String).required()),
            ),
        );
        CommandParser::new(Arc::new(registry))
    }

    #[test]
    fn one_result_per_occurrence_in_order() {
        let parsed = parser().parse_at(
            "/notnow status done /notnow bogus x\n/notnow time 1h\ntrailing /notnow init",
            CommandContext::COMMENT,
            now(),
        );
        let names: Vec<&str> = parsed.iter().map(|command| command.name.as_str()).collect();
        assert_eq!(names, vec!["status", "bogus", "time", "init"]);
        assert!(parsed[0].is_valid());
        assert!(parsed[1].error.as_ref().unwrap().to_string().contains("unknown command"));
        assert!(parsed[2].is_valid());
        assert!(parsed[3].error.as_ref().unwrap().to_string().contains("not allowed"));
    }

    #[test]
    fn context_gating_skips_binding() {
        let parsed = parser().parse_at("/notnow time 2h", CommandContext::ISSUE_BODY, now());
        assert!(!parsed[0].is_valid());
        assert!(parsed[0].arguments.is_empty());
        assert!(matches!(
            parsed[0].error,
            Some(CommandError::ContextNotAllowed { .. })
        ));
    }

    #[test]
    fn binds_positionals_and_options() {
        let parsed = parser().parse_at(
            r#"/notnow time 1h30m -d "pairing session" --billable extra"#,
            CommandContext::COMMENT,
            now(),
        );
        let command = &parsed[0];
        assert!(command.is_valid(), "{:?}", command.error);
        assert_eq!(
            command.argument("duration"),
            Some(&ArgValue::Duration(Duration::minutes(90)))
        );
        assert_eq!(
            command.option("description"),
            Some(&ArgValue::from("pairing session"))
        );
        assert_eq!(command.option("billable"), Some(&ArgValue::Boolean(true)));
    }

    #[test]
    fn validator_failure_marks_invalid() {
        let parsed = parser().parse_at("/notnow status sideways", CommandContext::COMMENT, now());
        let err = parsed[0].error.as_ref().expect("invalid");
        assert!(matches!(err, CommandError::InvalidFieldValue { field, .. } if field == "value"));
        assert_eq!(parsed[0].argument("value"), Some(&ArgValue::from("sideways")));
    }

    #[test]
    fn missing_required_names_the_field() {
        let parsed = parser().parse_at("/notnow status", CommandContext::COMMENT, now());
        assert_eq!(
            parsed[0].error,
            Some(CommandError::MissingRequiredField {
                command: "status".to_string(),
                field: "value".to_string(),
            })
        );

        let parsed = parser().parse_at("/notnow review", CommandContext::COMMENT, now());
        assert_eq!(parsed[0].argument("who"), Some(&ArgValue::from("team")));
        assert!(
            matches!(&parsed[0].error, Some(CommandError::MissingRequiredField { field, .. }) if field == "--ticket")
        );
    }

    #[test]
    fn defaults_fill_unset_options_and_bad_dates_fall_back_to_now() {
        let parsed = parser().parse_at("/notnow due whenever", CommandContext::COMMENT, now());
        assert!(parsed[0].is_valid());
        assert_eq!(parsed[0].argument("date"), Some(&ArgValue::Date(now())));
        assert_eq!(parsed[0].option("reminders"), Some(&ArgValue::Integer(1)));
    }

    #[test]
    fn undeclared_options_are_kept_as_strings() {
        let parsed = parser().parse_at(
            "/notnow status done --note shipped --loud",
            CommandContext::COMMENT,
            now(),
        );
        assert!(parsed[0].is_valid());
        assert_eq!(parsed[0].option("note"), Some(&ArgValue::from("shipped")));
        assert_eq!(parsed[0].option("loud"), Some(&ArgValue::Boolean(true)));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let parsed = parser().parse_at("/notnow STATUS todo", CommandContext::COMMENT, now());
        assert!(parsed[0].is_valid());
        assert_eq!(parsed[0].command_name(), "status");
    }

    #[test]
    fn embedded_snapshot_is_not_parsed() {
        let text = "/notnow status done\n<!-- notnow-state:begin -->\n<!--\n{\"lastCommand\":\"/notnow init\"}\n-->\n<!-- notnow-state:end -->";
        let parsed = parser().parse_at(text, CommandContext::COMMENT, now());
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].command_name(), "status");
    }

    #[test]
    fn contains_command_is_a_cheap_precheck() {
        let parser = parser();
        assert!(parser.contains_command("hello\n/notnow status done"));
        assert!(!parser.contains_command("plain comment"));
    }

    #[test]
    fn contains_command_ignores_snapshot_blocks() {
        let text = "Notes\n\n<!-- notnow-state:begin -->\n<!--\n{\"lastCommand\":\"/notnow init\"}\n-->\n<!-- notnow-state:end -->";
        let parser = parser();
        assert!(!parser.contains_command(text));
        assert!(parser.parse_at(text, CommandContext::ISSUE_BODY, now()).is_empty());
    }
}
