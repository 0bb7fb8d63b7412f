use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::backend::IssueBackend;
use crate::grammar::DEFAULT_MARKER;
use crate::replay::ReplayEngine;
use crate::snapshot::{self, StateSnapshotEnvelope};
use crate::state::IssueState;

/// Reads issue state by replaying backend data. The embedded snapshot is only
/// ever a cache of that replay.
#[derive(Clone)]
pub struct IssueStateStore {
    backend: Arc<dyn IssueBackend>,
    engine: ReplayEngine,
}

impl IssueStateStore {
    pub fn new(backend: Arc<dyn IssueBackend>) -> Self {
        Self {
            backend,
            engine: ReplayEngine::new(DEFAULT_MARKER),
        }
    }

    pub fn with_marker(mut self, marker: impl AsRef<str>) -> Self {
        self.engine = ReplayEngine::new(marker.as_ref());
        self
    }

    async fn load_with_body(&self, number: u64) -> Result<(IssueState, String)> {
        let issue = self
            .backend
            .fetch_issue(number)
            .await
            .with_context(|| format!("failed to fetch issue #{number}"))?;
        let comments = self
            .backend
            .fetch_comments(number)
            .await
            .with_context(|| format!("failed to fetch comments for issue #{number}"))?;
        let sources: Vec<_> = comments.iter().map(|comment| comment.source()).collect();
        let state = self.engine.replay(&issue.source(), &sources);
        Ok((state, issue.body))
    }

    pub async fn load(&self, number: u64) -> Result<IssueState> {
        Ok(self.load_with_body(number).await?.0)
    }

    /// Whatever snapshot the issue body carries, fresh or not.
    pub async fn embedded(&self, number: u64) -> Result<Option<StateSnapshotEnvelope>> {
        let issue = self
            .backend
            .fetch_issue(number)
            .await
            .with_context(|| format!("failed to fetch issue #{number}"))?;
        Ok(snapshot::extract(&issue.body))
    }

    /// The embedded snapshot, if it is fresh and still matches a replay.
    ///
    /// This validates the cache rather than short-circuiting it: the issue is
    /// always replayed, and a snapshot that disagrees is reported as a miss.
    pub async fn cached(
        &self,
        number: u64,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<StateSnapshotEnvelope>> {
        let (state, body) = self.load_with_body(number).await?;
        let envelope = snapshot::extract(&body);
        if snapshot::is_stale(envelope.as_ref(), max_age, now) {
            debug!(issue = number, "state snapshot missing or stale");
            return Ok(None);
        }
        Ok(envelope.filter(|envelope| {
            let matches = envelope.data == state;
            if !matches {
                debug!(issue = number, "state snapshot diverged from replay");
            }
            matches
        }))
    }

    /// Replays the issue and rewrites its embedded snapshot.
    pub async fn refresh(
        &self,
        number: u64,
        by: Option<&str>,
        command: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StateSnapshotEnvelope> {
        let (state, body) = self.load_with_body(number).await?;
        let previous = snapshot::extract(&body);
        let envelope = snapshot::next_envelope(previous.as_ref(), state, by, command, now);
        let updated = snapshot::embed(&body, &envelope)?;
        self.backend
            .update_issue_body(number, &updated)
            .await
            .with_context(|| format!("failed to update body of issue #{number}"))?;
        info!(
            issue = number,
            state_version = envelope.state_version,
            "refreshed state snapshot"
        );
        Ok(envelope)
    }
}
