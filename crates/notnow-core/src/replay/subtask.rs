//! Argument sub-grammar of the `subtask` command during replay.
//!
//! ```text
//! subtask [add] "Title" [--id <id>] [--estimate <dur>] [--assignee <user>]
//! subtask [add] Title words --id st2
//! subtask complete <id>
//! subtask remove <id>
//! subtask list
//! ```

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::duration::{format_hhmm, parse_duration};
use crate::state::{IssueState, Subtask, SubtaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtaskSpec {
    pub title: String,
    pub id: Option<String>,
    pub estimate: Option<String>,
    pub assignee: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtaskOp {
    Upsert(SubtaskSpec),
    Complete(String),
    Remove(String),
    List,
    Ignore,
}

fn quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("regex"))
}

/// Start of the first option flag: `--name`, or one of the short forms `-i`, `-e`, `-a`.
fn option_start_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s(?:--\w|-[iea](?:\s|$))").expect("regex"))
}

fn option_re(long: &str, short: char) -> Regex {
    Regex::new(&format!(r"(?i)(?:^|\s)(?:--{long}|-{short})\s+(\S+)")).expect("regex")
}

pub fn parse_subtask_args(args: &str) -> SubtaskOp {
    let mut text = args.trim();
    if let Some((head, rest)) = split_word(text) {
        if head.eq_ignore_ascii_case("add") {
            text = rest;
        }
    }

    if let Some((head, rest)) = split_word(text) {
        let target = rest.split_whitespace().next().unwrap_or("");
        if head.eq_ignore_ascii_case("complete") {
            return if target.is_empty() {
                SubtaskOp::Ignore
            } else {
                SubtaskOp::Complete(target.to_string())
            };
        }
        if head.eq_ignore_ascii_case("remove") {
            return if target.is_empty() {
                SubtaskOp::Ignore
            } else {
                SubtaskOp::Remove(target.to_string())
            };
        }
        if head.eq_ignore_ascii_case("list") && rest.trim().is_empty() {
            return SubtaskOp::List;
        }
    }

    let (title, remaining) = extract_title(text);
    let Some(title) = title else {
        return SubtaskOp::Ignore;
    };

    let capture = |long: &str, short: char| {
        option_re(long, short)
            .captures(&remaining)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    };

    SubtaskOp::Upsert(SubtaskSpec {
        title,
        id: capture("id", 'i'),
        estimate: capture("estimate", 'e'),
        assignee: capture("assignee", 'a').map(|user| user.trim_start_matches('@').to_string()),
    })
}

/// Title preference: a quoted segment, then leading text up to the first
/// option flag, then the whole remainder unless it starts with `--`.
fn extract_title(text: &str) -> (Option<String>, String) {
    if let Some(m) = quoted_re().captures(text).and_then(|caps| caps.get(1)) {
        let title = m.as_str().trim().to_string();
        let mut remaining = String::with_capacity(text.len());
        remaining.push_str(&text[..m.start().saturating_sub(1)]);
        remaining.push(' ');
        remaining.push_str(&text[(m.end() + 1).min(text.len())..]);
        if !title.is_empty() {
            return (Some(title), remaining);
        }
        return (None, remaining);
    }

    let split_at = option_start_re()
        .find(text)
        .map(|m| m.start())
        .unwrap_or(text.len());
    let leading = text[..split_at].trim();
    if !leading.is_empty() && !leading.starts_with('-') {
        return (Some(leading.to_string()), text[split_at..].to_string());
    }
    if !text.is_empty() && !text.starts_with("--") {
        return (Some(text.to_string()), text.to_string());
    }
    (None, text.to_string())
}

fn split_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    match text.find(char::is_whitespace) {
        Some(idx) => Some((&text[..idx], text[idx..].trim_start())),
        None => Some((text, "")),
    }
}

pub fn apply_subtask(state: &mut IssueState, args: &str, now: DateTime<Utc>) {
    match parse_subtask_args(args) {
        SubtaskOp::Complete(id) => {
            if let Some(subtask) = state.subtasks.iter_mut().find(|subtask| subtask.id == id) {
                subtask.status = SubtaskStatus::Done;
                subtask.completed_at = Some(now);
            }
        }
        SubtaskOp::Remove(id) => state.subtasks.retain(|subtask| subtask.id != id),
        SubtaskOp::List | SubtaskOp::Ignore => {}
        SubtaskOp::Upsert(spec) => {
            let id = spec
                .id
                .unwrap_or_else(|| format!("st{}", state.subtasks.len() + 1));
            state.subtasks.retain(|subtask| subtask.id != id);
            state.subtasks.push(Subtask {
                id,
                title: spec.title,
                status: SubtaskStatus::Pending,
                estimate: spec
                    .estimate
                    .map(|raw| parse_duration(&raw).map(format_hhmm).unwrap_or(raw)),
                assignee: spec.assignee,
                completed_at: None,
            });
        }
    }
}
