use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::context::ExecutionContext;
use crate::error::CommandError;
use crate::handlers::{CommandArgs, CommandResult};
use crate::parser::{CommandParser, ParsedCommand};
use crate::registry::CommandRegistry;

/// Ordered outcome of one batch; one result per parsed command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    pub results: Vec<CommandResult>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.results.iter().all(|result| result.success)
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|result| result.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn summary(&self) -> String {
        if self.success() {
            format!("all {} succeeded", self.results.len())
        } else {
            format!("{} succeeded, {} failed", self.succeeded(), self.failed())
        }
    }
}

pub struct CommandExecutor {
    registry: Arc<CommandRegistry>,
    parser: CommandParser,
}

impl CommandExecutor {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self {
            parser: CommandParser::new(registry.clone()),
            registry,
        }
    }

    pub fn with_marker(registry: Arc<CommandRegistry>, marker: &str) -> Self {
        Self {
            parser: CommandParser::with_marker(registry.clone(), marker),
            registry,
        }
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    pub async fn execute(&self, text: &str, ctx: &ExecutionContext) -> ExecutionResult {
        let parsed = self.parser.parse_at(text, ctx.context, ctx.now);
        self.execute_commands(&parsed, ctx).await
    }

    /// Runs each command in order, awaiting one before starting the next.
    /// A failure is recorded and the batch moves on. Handlers replay with the
    /// executor's marker, whatever marker `ctx` carried.
    pub async fn execute_commands(
        &self,
        parsed: &[ParsedCommand],
        ctx: &ExecutionContext,
    ) -> ExecutionResult {
        let ctx = ctx.clone().with_marker(self.parser.grammar().marker());
        let mut results = Vec::with_capacity(parsed.len());
        for command in parsed {
            let result = self.execute_one(command, &ctx).await;
            if result.success {
                info!(command = %result.command, issue = ?ctx.issue_number, "command executed");
            } else {
                warn!(
                    command = %result.command,
                    issue = ?ctx.issue_number,
                    error = result.error.as_deref().unwrap_or(""),
                    "command failed"
                );
            }
            results.push(result);
        }
        ExecutionResult { results }
    }

    async fn execute_one(&self, command: &ParsedCommand, ctx: &ExecutionContext) -> CommandResult {
        let name = command.command_name().to_string();
        if let Some(error) = command.error.as_ref() {
            return failure(&name, error);
        }
        let Some(registration) = command.registration.as_ref() else {
            return failure(&name, &CommandError::CommandNotFound(name.clone()));
        };
        let Some(handler) = self.registry.resolve_handler(&registration.handler) else {
            return failure(&name, &CommandError::HandlerNotFound(name.clone()));
        };

        let args = CommandArgs::from_parsed(command);
        match handler.execute(ctx, &args).await {
            Ok(result) => result.for_command(name),
            Err(err) => failure(
                &name,
                &CommandError::HandlerExecutionFailure {
                    command: name.clone(),
                    message: format!("{err:#}"),
                },
            ),
        }
    }
}

fn failure(command: &str, error: &CommandError) -> CommandResult {
    CommandResult::failed(error.to_string())
        .for_command(command)
        .with_data(serde_json::json!({ "kind": error.kind() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryIssueBackend;
    use crate::context::CommandContext;
    use crate::handlers::CommandHandler;
    use crate::registry::{CommandRegistration, HandlerRef};
    use async_trait::async_trait;

    struct Ack;

    #[async_trait]
    impl CommandHandler for Ack {
        async fn execute(
            &self,
            _ctx: &ExecutionContext,
            args: &CommandArgs,
        ) -> anyhow::Result<CommandResult> {
            Ok(CommandResult::ok(format!("ack {}", args.arg_text())))
        }
    }

    struct Boom;

    #[async_trait]
    impl CommandHandler for Boom {
        async fn execute(
            &self,
            _ctx: &ExecutionContext,
            _args: &CommandArgs,
        ) -> anyhow::Result<CommandResult> {
            anyhow::bail!("backend unavailable")
        }
    }

    fn executor() -> CommandExecutor {
        let mut registry = CommandRegistry::new();
        registry.register_command(CommandRegistration::new("ping"));
        registry.register_command(CommandRegistration::new("boom"));
        registry.register_command(
            CommandRegistration::new("orphan").handler(HandlerRef::new("nobody")),
        );
        let ack: Arc<dyn CommandHandler> = Arc::new(Ack);
        let boom: Arc<dyn CommandHandler> = Arc::new(Boom);
        registry.register_handler(HandlerRef::new("ping"), ack);
        registry.register_handler(HandlerRef::new("boom"), boom);
        CommandExecutor::new(Arc::new(registry))
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(CommandContext::COMMENT, Arc::new(MemoryIssueBackend::new()))
    }

    #[tokio::test]
    async fn unknown_command_fails_without_stopping_batch() {
        let result = executor()
            .execute("/notnow ping one\n/notnow nope\n/notnow ping two", &ctx())
            .await;
        assert_eq!(result.results.len(), 3);
        assert!(result.results[0].success);
        assert!(!result.results[1].success);
        assert_eq!(result.results[1].error.as_deref(), Some("unknown command: nope"));
        assert_eq!(result.results[2].message, "ack two");
        assert!(!result.success());
        assert_eq!(result.summary(), "2 succeeded, 1 failed");
    }

    #[tokio::test]
    async fn handler_errors_and_missing_handlers_become_failures() {
        let result = executor().execute("/notnow boom\n/notnow orphan", &ctx()).await;
        assert_eq!(
            result.results[0].error.as_deref(),
            Some("command 'boom' failed: backend unavailable")
        );
        assert_eq!(
            result.results[1].error.as_deref(),
            Some("handler not found for command 'orphan'")
        );
    }

    #[tokio::test]
    async fn unresolved_registration_is_command_not_found() {
        let parsed = executor().parser().parse("/notnow ping", CommandContext::COMMENT);
        let mut detached = parsed[0].clone();
        detached.registration = None;
        let result = executor().execute_commands(&[detached], &ctx()).await;
        assert_eq!(result.results[0].error.as_deref(), Some("command not found: ping"));
    }

    #[tokio::test]
    async fn all_success_summary() {
        let result = executor().execute("/notnow ping", &ctx()).await;
        assert!(result.success());
        assert_eq!(result.summary(), "all 1 succeeded");
    }
}
