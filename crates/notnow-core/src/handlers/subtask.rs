use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::context::ExecutionContext;
use crate::handlers::{CommandArgs, CommandHandler, CommandResult};
use crate::render::render_subtasks;
use crate::replay::subtask::{parse_subtask_args, SubtaskOp};

/// Shares the argument sub-grammar with replay so both read a command the same way.
pub struct SubtaskHandler;

#[async_trait]
impl CommandHandler for SubtaskHandler {
    async fn execute(&self, ctx: &ExecutionContext, args: &CommandArgs) -> Result<CommandResult> {
        let issue = ctx.require_issue()?;
        let text = if args.arg_text().is_empty() {
            args.string("action", "")
        } else {
            args.arg_text().to_string()
        };
        let state = ctx.state_store().load(issue).await?;

        match parse_subtask_args(&text) {
            SubtaskOp::Complete(id) => {
                let Some(subtask) = state.subtask(&id) else {
                    bail!("unknown subtask '{id}' on issue #{issue}");
                };
                Ok(CommandResult::ok(format!("completed subtask {id}: {}", subtask.title))
                    .with_data(json!({ "id": id })))
            }
            SubtaskOp::Remove(id) => {
                if state.subtask(&id).is_none() {
                    bail!("unknown subtask '{id}' on issue #{issue}");
                }
                Ok(CommandResult::ok(format!("removed subtask {id}")).with_data(json!({ "id": id })))
            }
            SubtaskOp::List => Ok(CommandResult::ok(render_subtasks(&state))
                .with_data(json!({ "subtasks": state.subtasks }))),
            SubtaskOp::Upsert(spec) => {
                let replaced = spec
                    .id
                    .as_deref()
                    .map(|id| state.subtask(id).is_some())
                    .unwrap_or(false);
                let id = spec
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("st{}", state.subtasks.len() + 1));
                let verb = if replaced { "replaced" } else { "added" };
                Ok(CommandResult::ok(format!("{verb} subtask {id}: {}", spec.title))
                    .with_data(json!({
                        "id": id,
                        "title": spec.title,
                        "estimate": spec.estimate,
                        "assignee": spec.assignee,
                    })))
            }
            SubtaskOp::Ignore => bail!(
                "expected a title, or one of complete <id>, remove <id>, list"
            ),
        }
    }
}
