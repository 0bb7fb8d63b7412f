//! Work session commands. State is read as replayed before the command text
//! is stored on the issue.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Duration;
use serde_json::json;

use crate::context::ExecutionContext;
use crate::duration::format_human;
use crate::handlers::{CommandArgs, CommandHandler, CommandResult};

pub struct StartHandler;

#[async_trait]
impl CommandHandler for StartHandler {
    async fn execute(&self, ctx: &ExecutionContext, args: &CommandArgs) -> Result<CommandResult> {
        let issue = ctx.require_issue()?;
        let state = ctx.state_store().load(issue).await?;
        let description = args.opt_string("description");

        let Some(previous) = state.active_session else {
            return Ok(CommandResult::ok("started work session")
                .with_data(json!({ "description": description })));
        };
        let elapsed = (ctx.now - previous.started_at).max(Duration::zero());
        Ok(CommandResult::ok(format!(
            "started work session; closed the previous one after {}",
            format_human(elapsed)
        ))
        .with_data(json!({
            "description": description,
            "autoClosed": previous.id,
            "autoClosedDuration": elapsed.num_seconds(),
        })))
    }
}

pub struct StopHandler;

#[async_trait]
impl CommandHandler for StopHandler {
    async fn execute(&self, ctx: &ExecutionContext, _args: &CommandArgs) -> Result<CommandResult> {
        let issue = ctx.require_issue()?;
        let state = ctx.state_store().load(issue).await?;
        let Some(active) = state.active_session else {
            bail!("no active work session on issue #{issue}");
        };
        let elapsed = (ctx.now - active.started_at).max(Duration::zero());
        Ok(CommandResult::ok(format!(
            "stopped work session after {}",
            format_human(elapsed)
        ))
        .with_data(json!({ "session": active.id, "duration": elapsed.num_seconds() })))
    }
}

pub struct TimeHandler;

#[async_trait]
impl CommandHandler for TimeHandler {
    async fn execute(&self, _ctx: &ExecutionContext, args: &CommandArgs) -> Result<CommandResult> {
        let spent = args.duration("duration", Duration::zero());
        if spent <= Duration::zero() {
            bail!("duration must be positive");
        }
        let description = args.opt_string("description");
        let message = match description.as_deref() {
            Some(description) => format!("logged {}: {description}", format_human(spent)),
            None => format!("logged {}", format_human(spent)),
        };
        Ok(CommandResult::ok(message).with_data(json!({
            "duration": spent.num_seconds(),
            "description": description,
        })))
    }
}
