use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Done,
}

impl SubtaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubtaskStatus::Pending => "pending",
            SubtaskStatus::Done => "done",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub status: SubtaskStatus,
    #[serde(default)]
    pub estimate: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Subtask {
    pub fn is_done(&self) -> bool {
        self.status == SubtaskStatus::Done
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(with = "crate::duration::seconds")]
    pub duration: Duration,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
}

impl WorkSession {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Closes the session at `at`; the duration never goes negative.
    pub fn close(&mut self, at: DateTime<Utc>) {
        self.ended_at = Some(at);
        self.duration = (at - self.started_at).max(Duration::zero());
    }
}

/// Materialized issue state, rebuilt by `replay` on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueState {
    pub issue_number: u64,
    pub title: String,
    #[serde(default)]
    pub is_initialized: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, rename = "type")]
    pub issue_type: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub estimate: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(default)]
    pub sessions: Vec<WorkSession>,
    #[serde(default)]
    pub active_session: Option<WorkSession>,
    #[serde(with = "crate::duration::seconds")]
    pub total_time_spent: Duration,
    pub last_updated: DateTime<Utc>,
}

impl IssueState {
    pub fn new(issue_number: u64, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            issue_number,
            title: title.into(),
            is_initialized: false,
            status: None,
            priority: None,
            issue_type: None,
            assignee: None,
            estimate: None,
            due_date: None,
            tags: BTreeSet::new(),
            subtasks: Vec::new(),
            sessions: Vec::new(),
            active_session: None,
            total_time_spent: Duration::zero(),
            last_updated: created_at,
        }
    }

    pub fn subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|subtask| subtask.id == id)
    }

    pub fn completed_subtasks(&self) -> usize {
        self.subtasks.iter().filter(|subtask| subtask.is_done()).count()
    }

    /// Sum of closed session durations; the active session does not count.
    /// Saturates instead of overflowing.
    pub fn recompute_total_time(&mut self) {
        self.total_time_spent = self.sessions.iter().fold(Duration::zero(), |total, session| {
            total.checked_add(&session.duration).unwrap_or(Duration::MAX)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn close_computes_duration() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let mut session = WorkSession {
            id: "s1".to_string(),
            started_at: start,
            ended_at: None,
            duration: Duration::zero(),
            description: None,
            user: None,
        };
        assert!(session.is_active());
        session.close(start + Duration::minutes(25));
        assert!(!session.is_active());
        assert_eq!(session.duration, Duration::minutes(25));
    }

    #[test]
    fn total_time_saturates() {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let mut state = IssueState::new(7, "Huge", created);
        for (idx, duration) in [Duration::MAX, Duration::hours(1)].into_iter().enumerate() {
            state.sessions.push(WorkSession {
                id: format!("s{idx}"),
                started_at: created,
                ended_at: Some(created),
                duration,
                description: None,
                user: None,
            });
        }
        state.recompute_total_time();
        assert_eq!(state.total_time_spent, Duration::MAX);
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let created = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let mut state = IssueState::new(7, "Ship it", created);
        state.issue_type = Some("bug".to_string());
        state.total_time_spent = Duration::minutes(3);
        let value = serde_json::to_value(&state).expect("json");
        assert_eq!(value["issueNumber"], 7);
        assert_eq!(value["type"], "bug");
        assert_eq!(value["totalTimeSpent"], 180);
        let back: IssueState = serde_json::from_value(value).expect("parse");
        assert_eq!(back, state);
    }
}
