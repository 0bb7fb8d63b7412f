//! The built-in `workflow` command module.

use std::sync::Arc;

use chrono::Duration;

use crate::config::NotnowConfig;
use crate::context::CommandContext;
use crate::handlers::session::{StartHandler, StopHandler, TimeHandler};
use crate::handlers::subtask::SubtaskHandler;
use crate::handlers::workflow::{
    CompleteHandler, FieldHandler, InitHandler, ReopenHandler, ShowHandler, TagsHandler,
};
use crate::handlers::CommandHandler;
use crate::registry::{CommandModule, CommandRegistration, HandlerRef};
use crate::schema::{non_empty, one_of, positive_duration, CommandOption, CommandSchema, Parameter};
use crate::values::ValueType;

pub const KNOWN_STATUSES: &[&str] = &["todo", "in_progress", "review", "blocked", "done"];
pub const PRIORITY_LEVELS: &[&str] = &["low", "medium", "high", "critical"];

pub struct WorkflowModule {
    default_user: Option<String>,
    snapshot_max_age: Duration,
}

impl WorkflowModule {
    pub fn new(config: &NotnowConfig) -> Self {
        Self {
            default_user: config.default_user.clone(),
            snapshot_max_age: config.snapshot_max_age(),
        }
    }
}

impl Default for WorkflowModule {
    fn default() -> Self {
        Self::new(&NotnowConfig::default())
    }
}

fn handler(key: &str) -> HandlerRef {
    HandlerRef::new(format!("workflow.{key}"))
}

fn description_option() -> CommandOption {
    CommandOption::new("description", ValueType::String)
        .short('d')
        .describe("what the time was spent on")
}

impl CommandModule for WorkflowModule {
    fn name(&self) -> &str {
        "workflow"
    }

    fn commands(&self) -> Vec<CommandRegistration> {
        vec![
            CommandRegistration::new("init")
                .allowed_in(CommandContext::ISSUE_BODY)
                .handler(handler("init"))
                .schema(CommandSchema::new().option(CommandOption::new("title", ValueType::String)))
                .describe("Start tracking this issue"),
            CommandRegistration::new("status")
                .handler(handler("field"))
                .schema(CommandSchema::new().parameter(
                    Parameter::required("value", ValueType::String).validator(one_of(KNOWN_STATUSES)),
                ))
                .describe("Set the workflow status"),
            CommandRegistration::new("priority")
                .handler(handler("field"))
                .schema(CommandSchema::new().parameter(
                    Parameter::required("level", ValueType::String)
                        .validator(one_of(PRIORITY_LEVELS)),
                ))
                .describe("Set the priority"),
            CommandRegistration::new("type")
                .handler(handler("field"))
                .schema(CommandSchema::new().parameter(
                    Parameter::required("kind", ValueType::String).validator(non_empty),
                ))
                .describe("Set the issue type"),
            CommandRegistration::new("assign")
                .alias("assignee")
                .handler(handler("field"))
                .schema(CommandSchema::new().parameter(
                    Parameter::required("user", ValueType::String).validator(non_empty),
                ))
                .describe("Assign the issue"),
            CommandRegistration::new("estimate")
                .handler(handler("field"))
                .schema(CommandSchema::new().parameter(
                    Parameter::required("duration", ValueType::Duration)
                        .validator(positive_duration),
                ))
                .describe("Estimate the effort, e.g. 2h30m"),
            CommandRegistration::new("due")
                .handler(handler("field"))
                .schema(
                    CommandSchema::new().parameter(Parameter::required("date", ValueType::Date)),
                )
                .describe("Set the due date"),
            CommandRegistration::new("tags")
                .alias("tag")
                .handler(handler("tags"))
                .schema(CommandSchema::new().parameter(
                    Parameter::required("list", ValueType::String).validator(non_empty),
                ))
                .describe("Add comma separated tags"),
            CommandRegistration::new("subtask")
                .handler(handler("subtask"))
                .schema(
                    CommandSchema::new()
                        .parameter(Parameter::required("action", ValueType::String))
                        .parameter(Parameter::new("target", ValueType::String))
                        .option(CommandOption::new("id", ValueType::String).short('i'))
                        .option(CommandOption::new("estimate", ValueType::Duration).short('e'))
                        .option(CommandOption::new("assignee", ValueType::String).short('a')),
                )
                .describe("Add, complete, remove or list subtasks"),
            CommandRegistration::new("start")
                .allowed_in(CommandContext::COMMENT)
                .handler(handler("start"))
                .schema(CommandSchema::new().option(description_option()))
                .describe("Start a work session"),
            CommandRegistration::new("stop")
                .allowed_in(CommandContext::COMMENT)
                .handler(handler("stop"))
                .describe("Stop the active work session"),
            CommandRegistration::new("time")
                .allowed_in(CommandContext::COMMENT)
                .handler(handler("time"))
                .schema(
                    CommandSchema::new()
                        .parameter(
                            Parameter::required("duration", ValueType::Duration)
                                .validator(positive_duration),
                        )
                        .option(description_option()),
                )
                .describe("Log time already spent"),
            CommandRegistration::new("complete")
                .handler(handler("complete"))
                .describe("Mark the issue done and close it"),
            CommandRegistration::new("reopen")
                .handler(handler("reopen"))
                .describe("Reopen the issue"),
            CommandRegistration::new("show")
                .alias("state")
                .handler(handler("show"))
                .describe("Post a summary of the current state"),
        ]
    }

    fn handlers(&self) -> Vec<(HandlerRef, Arc<dyn CommandHandler>)> {
        vec![
            entry("init", InitHandler::new(self.default_user.clone())),
            entry("field", FieldHandler),
            entry("tags", TagsHandler),
            entry("subtask", SubtaskHandler),
            entry("start", StartHandler),
            entry("stop", StopHandler),
            entry("time", TimeHandler),
            entry("complete", CompleteHandler),
            entry("reopen", ReopenHandler),
            entry("show", ShowHandler::new(self.snapshot_max_age)),
        ]
    }
}

fn entry(
    key: &str,
    handler_impl: impl CommandHandler + 'static,
) -> (HandlerRef, Arc<dyn CommandHandler>) {
    (handler(key), Arc::new(handler_impl))
}
