//! Handlers for issue fields, lifecycle and the state summary.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Duration;
use serde_json::json;

use crate::context::ExecutionContext;
use crate::duration::format_hhmm;
use crate::handlers::{CommandArgs, CommandHandler, CommandResult};
use crate::render::render_state;

pub struct InitHandler {
    default_user: Option<String>,
}

impl InitHandler {
    pub fn new(default_user: Option<String>) -> Self {
        Self { default_user }
    }
}

#[async_trait]
impl CommandHandler for InitHandler {
    async fn execute(&self, ctx: &ExecutionContext, args: &CommandArgs) -> Result<CommandResult> {
        let issue = ctx.require_issue()?;
        let store = ctx.state_store();
        let already = store
            .embedded(issue)
            .await?
            .map(|envelope| envelope.data.is_initialized)
            .unwrap_or(false);
        if already {
            bail!("issue #{issue} is already initialized");
        }

        let by = ctx.user.as_deref().or(self.default_user.as_deref());
        let envelope = store
            .refresh(issue, by, Some(args.raw_text()), ctx.now)
            .await?;
        let title = args.opt_string("title");
        let message = match title.as_deref() {
            Some(title) => format!("initialized issue #{issue}: {title}"),
            None => format!("initialized issue #{issue}"),
        };
        Ok(CommandResult::ok(message).with_data(json!({
            "issue": issue,
            "title": title,
            "stateVersion": envelope.state_version,
        })))
    }
}

/// Single-valued fields: status, priority, type, assign, estimate, due.
pub struct FieldHandler;

#[async_trait]
impl CommandHandler for FieldHandler {
    async fn execute(&self, ctx: &ExecutionContext, args: &CommandArgs) -> Result<CommandResult> {
        let (field, value) = match args.command() {
            "status" => ("status", args.string("value", "").to_lowercase()),
            "priority" => ("priority", args.string("level", "").to_lowercase()),
            "type" => ("type", args.string("kind", "").to_lowercase()),
            "assign" => (
                "assignee",
                args.string("user", "").trim_start_matches('@').to_string(),
            ),
            "estimate" => (
                "estimate",
                format_hhmm(args.duration("duration", Duration::zero())),
            ),
            "due" => (
                "due",
                args.date("date", ctx.now).format("%Y-%m-%d").to_string(),
            ),
            other => bail!("'{other}' is not a field command"),
        };
        if value.is_empty() {
            bail!("{field} must not be empty");
        }
        let mut data = serde_json::Map::new();
        data.insert(field.to_string(), json!(value));
        Ok(CommandResult::ok(format!("{field} set to {value}")).with_data(data.into()))
    }
}

pub struct TagsHandler;

#[async_trait]
impl CommandHandler for TagsHandler {
    async fn execute(&self, _ctx: &ExecutionContext, args: &CommandArgs) -> Result<CommandResult> {
        let raw = if args.arg_text().is_empty() {
            args.string("list", "")
        } else {
            args.arg_text().to_string()
        };
        let mut tags: Vec<String> = Vec::new();
        for tag in raw.split(',').map(str::trim).filter(|tag| !tag.is_empty()) {
            if !tags.iter().any(|existing| existing == tag) {
                tags.push(tag.to_string());
            }
        }
        if tags.is_empty() {
            bail!("no tags given");
        }
        Ok(CommandResult::ok(format!("tags added: {}", tags.join(", ")))
            .with_data(json!({ "tags": tags })))
    }
}

pub struct CompleteHandler;

#[async_trait]
impl CommandHandler for CompleteHandler {
    async fn execute(&self, ctx: &ExecutionContext, _args: &CommandArgs) -> Result<CommandResult> {
        let issue = ctx.require_issue()?;
        ctx.backend
            .close_issue(issue)
            .await
            .with_context(|| format!("failed to close issue #{issue}"))?;
        Ok(CommandResult::ok(format!("issue #{issue} completed"))
            .with_data(json!({ "issue": issue, "status": "done" })))
    }
}

pub struct ReopenHandler;

#[async_trait]
impl CommandHandler for ReopenHandler {
    async fn execute(&self, ctx: &ExecutionContext, _args: &CommandArgs) -> Result<CommandResult> {
        let issue = ctx.require_issue()?;
        ctx.backend
            .reopen_issue(issue)
            .await
            .with_context(|| format!("failed to reopen issue #{issue}"))?;
        Ok(CommandResult::ok(format!("issue #{issue} reopened"))
            .with_data(json!({ "issue": issue, "status": "todo" })))
    }
}

/// Posts the rendered state, preferring a fresh embedded snapshot over a replay.
pub struct ShowHandler {
    max_age: Duration,
}

impl ShowHandler {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }
}

#[async_trait]
impl CommandHandler for ShowHandler {
    async fn execute(&self, ctx: &ExecutionContext, _args: &CommandArgs) -> Result<CommandResult> {
        let issue = ctx.require_issue()?;
        let store = ctx.state_store();
        let state = match store.cached(issue, self.max_age, ctx.now).await? {
            Some(envelope) => envelope.data,
            None => store.load(issue).await?,
        };
        let comment = ctx
            .backend
            .post_comment(issue, &render_state(&state))
            .await
            .with_context(|| format!("failed to post summary on issue #{issue}"))?;
        Ok(CommandResult::ok(format!("posted state summary for issue #{issue}"))
            .with_data(json!({ "commentId": comment.id, "state": state })))
    }
}
