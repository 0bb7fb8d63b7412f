//! Rebuilds the current `IssueState` by folding every command found in the
//! issue body and its comments, in chronological order.

pub mod subtask;

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use ulid::Ulid;

use crate::duration::{format_hhmm, parse_duration, parse_duration_or_zero};
use crate::grammar::CommandGrammar;
use crate::snapshot;
use crate::state::{IssueState, SubtaskStatus, WorkSession};
use crate::values::parse_date;

/// The issue as authored: its body is the first replay source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSource {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSource {
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub author: Option<String>,
}

struct Source<'a> {
    body: &'a str,
    at: DateTime<Utc>,
    author: Option<&'a str>,
}

fn description_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:^|\s)(?:-d|--description)\s+(?:"([^"]*)"|(.+))"#).expect("regex")
    })
}

#[derive(Debug, Clone, Default)]
pub struct ReplayEngine {
    grammar: CommandGrammar,
}

impl ReplayEngine {
    pub fn new(marker: &str) -> Self {
        Self {
            grammar: CommandGrammar::new(marker),
        }
    }

    pub fn replay(&self, issue: &IssueSource, comments: &[CommentSource]) -> IssueState {
        let mut ordered: Vec<&CommentSource> = comments.iter().collect();
        ordered.sort_by_key(|comment| comment.created_at);

        let sources = std::iter::once(Source {
            body: &issue.body,
            at: issue.created_at,
            author: issue.author.as_deref(),
        })
        .chain(ordered.into_iter().map(|comment| Source {
            body: &comment.body,
            at: comment.created_at,
            author: comment.author.as_deref(),
        }));

        let mut state = IssueState::new(issue.number, issue.title.clone(), issue.created_at);
        let mut applied = 0usize;
        let mut ignored = 0usize;
        for source in sources {
            let body = snapshot::strip(source.body);
            for occurrence in self.grammar.scan(&body) {
                let name = occurrence.name.to_lowercase();
                if apply_command(&mut state, &name, occurrence.args, source.at, source.author) {
                    state.last_updated = source.at;
                    applied += 1;
                } else {
                    trace!(command = %name, "replay ignored unrecognized command");
                    ignored += 1;
                }
            }
        }
        state.recompute_total_time();
        debug!(
            issue = issue.number,
            comments = comments.len(),
            applied,
            ignored,
            "replayed issue state"
        );
        state
    }
}

/// Replays with the default marker.
pub fn replay(issue: &IssueSource, comments: &[CommentSource]) -> IssueState {
    ReplayEngine::default().replay(issue, comments)
}

/// Applies one occurrence; returns false for names the fold does not know.
fn apply_command(
    state: &mut IssueState,
    name: &str,
    args: &str,
    now: DateTime<Utc>,
    author: Option<&str>,
) -> bool {
    match name {
        "init" => state.is_initialized = true,
        "status" => set_lowercase(&mut state.status, args),
        "priority" => set_lowercase(&mut state.priority, args),
        "type" => set_lowercase(&mut state.issue_type, args),
        "assign" | "assignee" => {
            if let Some(user) = non_empty(args.trim().trim_start_matches('@')) {
                state.assignee = Some(user);
            }
        }
        "estimate" => {
            if let Some(raw) = non_empty(args) {
                let formatted = parse_duration(&raw).map(format_hhmm).unwrap_or(raw);
                state.estimate = Some(formatted);
            }
        }
        "due" => {
            if let Some(date) = parse_date(args) {
                state.due_date = Some(date);
            }
        }
        "tags" | "tag" => {
            for tag in args.split(',').map(str::trim).filter(|tag| !tag.is_empty()) {
                state.tags.insert(tag.to_string());
            }
        }
        "subtask" => subtask::apply_subtask(state, args, now),
        "start" => {
            if let Some(mut active) = state.active_session.take() {
                active.close(now);
                state.sessions.push(active);
            }
            let ordinal = state.sessions.len() + 1;
            state.active_session = Some(WorkSession {
                id: session_id(now, ordinal),
                started_at: now,
                ended_at: None,
                duration: Duration::zero(),
                description: description(args),
                user: author.map(str::to_string),
            });
        }
        "stop" => {
            if let Some(mut active) = state.active_session.take() {
                active.close(now);
                state.sessions.push(active);
            }
        }
        "time" => {
            let ordinal = state.sessions.len() + usize::from(state.active_session.is_some()) + 1;
            let requested = parse_duration_or_zero(strip_description(args));
            // Reaching past the representable date range becomes a zero-length entry.
            let (started_at, spent) = match now.checked_sub_signed(requested) {
                Some(started_at) => (started_at, requested),
                None => {
                    debug!(seconds = requested.num_seconds(), "time entry out of range; logged as zero");
                    (now, Duration::zero())
                }
            };
            state.sessions.push(WorkSession {
                id: session_id(started_at, ordinal),
                started_at,
                ended_at: Some(now),
                duration: spent,
                description: description(args),
                user: author.map(str::to_string),
            });
        }
        "complete" => {
            state.status = Some("done".to_string());
            for subtask in &mut state.subtasks {
                subtask.status = SubtaskStatus::Done;
                subtask.completed_at = Some(now);
            }
        }
        "reopen" => state.status = Some("todo".to_string()),
        _ => return false,
    }
    true
}

fn set_lowercase(field: &mut Option<String>, args: &str) {
    if let Some(value) = non_empty(args) {
        *field = Some(value.to_lowercase());
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn description(args: &str) -> Option<String> {
    let caps = description_re().captures(args)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| non_empty(m.as_str()))
}

fn strip_description(args: &str) -> &str {
    match description_re().find(args) {
        Some(m) => &args[..m.start()],
        None => args,
    }
}

/// Derived from the timestamp and ordinal so replays stay deterministic.
fn session_id(at: DateTime<Utc>, ordinal: usize) -> String {
    let millis = u64::try_from(at.timestamp_millis()).unwrap_or(0);
    Ulid::from_parts(millis, ordinal as u128)
        .to_string()
        .to_lowercase()
}
