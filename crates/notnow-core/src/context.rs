use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backend::IssueBackend;
use crate::state_store::IssueStateStore;

/// Flag set naming where a command may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandContext(u8);

impl CommandContext {
    pub const ISSUE_BODY: CommandContext = CommandContext(0b01);
    pub const COMMENT: CommandContext = CommandContext(0b10);
    pub const BOTH: CommandContext = CommandContext(0b11);

    /// True when every flag in `other` is also set in `self`.
    pub fn contains(self, other: CommandContext) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn as_str(self) -> &'static str {
        match self.0 {
            0b01 => "issue body",
            0b10 => "comment",
            0b11 => "issue body or comment",
            _ => "none",
        }
    }
}

impl BitOr for CommandContext {
    type Output = CommandContext;

    fn bitor(self, rhs: CommandContext) -> CommandContext {
        CommandContext(self.0 | rhs.0)
    }
}

impl fmt::Display for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a handler may consult while executing one batch.
#[derive(Clone)]
pub struct ExecutionContext {
    pub context: CommandContext,
    pub issue_number: Option<u64>,
    pub user: Option<String>,
    pub now: DateTime<Utc>,
    pub backend: Arc<dyn IssueBackend>,
    pub marker: String,
}

impl ExecutionContext {
    pub fn new(context: CommandContext, backend: Arc<dyn IssueBackend>) -> Self {
        Self {
            context,
            issue_number: None,
            user: None,
            now: Utc::now(),
            backend,
            marker: crate::grammar::DEFAULT_MARKER.to_string(),
        }
    }

    pub fn with_issue(mut self, issue_number: u64) -> Self {
        self.issue_number = Some(issue_number);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn require_issue(&self) -> anyhow::Result<u64> {
        self.issue_number
            .ok_or_else(|| anyhow::anyhow!("no issue selected for this command"))
    }

    pub fn state_store(&self) -> IssueStateStore {
        IssueStateStore::new(self.backend.clone()).with_marker(self.marker.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_is_bitwise() {
        assert!(CommandContext::BOTH.contains(CommandContext::COMMENT));
        assert!(CommandContext::BOTH.contains(CommandContext::ISSUE_BODY));
        assert!(CommandContext::COMMENT.contains(CommandContext::COMMENT));
        assert!(!CommandContext::ISSUE_BODY.contains(CommandContext::COMMENT));
        assert!(!CommandContext::COMMENT.contains(CommandContext::BOTH));
        assert_eq!(
            CommandContext::ISSUE_BODY | CommandContext::COMMENT,
            CommandContext::BOTH
        );
    }
}
