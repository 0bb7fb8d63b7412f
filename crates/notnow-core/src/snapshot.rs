//! Versioned state snapshot embedded in an issue body as an HTML comment.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::state::IssueState;

pub const SCHEMA_VERSION: &str = "1.0";
pub const BEGIN_MARKER: &str = "<!-- notnow-state:begin -->";
pub const END_MARKER: &str = "<!-- notnow-state:end -->";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed state snapshot: {0}")]
    Malformed(String),
    #[error("failed to serialize state snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshotEnvelope {
    pub schema_version: String,
    pub state_version: u64,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub last_updated_by: Option<String>,
    #[serde(default)]
    pub last_command: Option<String>,
    pub data: IssueState,
}

/// Byte range of the block, from the begin marker through the end marker.
fn locate(text: &str) -> Option<(usize, usize)> {
    let start = text.find(BEGIN_MARKER)?;
    let after_begin = start + BEGIN_MARKER.len();
    let end = after_begin + text[after_begin..].find(END_MARKER)?;
    Some((start, end + END_MARKER.len()))
}

pub fn try_extract(text: &str) -> Result<Option<StateSnapshotEnvelope>, SnapshotError> {
    let Some((start, end)) = locate(text) else {
        return Ok(None);
    };
    let inner = text[start + BEGIN_MARKER.len()..end - END_MARKER.len()].trim();
    let json = inner
        .strip_prefix("<!--")
        .and_then(|rest| rest.strip_suffix("-->"))
        .ok_or_else(|| SnapshotError::Malformed("missing comment wrapper".to_string()))?
        .trim();
    serde_json::from_str(json)
        .map(Some)
        .map_err(|err| SnapshotError::Malformed(err.to_string()))
}

/// Absent and malformed blocks both read as "no snapshot".
pub fn extract(text: &str) -> Option<StateSnapshotEnvelope> {
    match try_extract(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = %err, "ignoring state snapshot");
            None
        }
    }
}

const SEPARATOR: &str = "\n\n";

/// Removes every snapshot block together with the separator `embed` put in
/// front of it. Text outside the markers is otherwise kept byte for byte.
pub fn strip(text: &str) -> String {
    let mut out = text.to_string();
    while let Some((start, end)) = locate(&out) {
        let head = &out[..start];
        let tail = &out[end..];
        let (head, tail) = match head.strip_suffix(SEPARATOR) {
            Some(head) => (head, tail),
            None if head.is_empty() => (head, tail.strip_prefix('\n').unwrap_or(tail)),
            None => (head, tail),
        };
        out = format!("{head}{tail}");
    }
    out
}

/// Writes `envelope` into `original`, replacing any block already there.
pub fn embed(original: &str, envelope: &StateSnapshotEnvelope) -> Result<String, SnapshotError> {
    let json = serde_json::to_string(envelope)?.replace("-->", "--\\u003e");
    let block = format!("{BEGIN_MARKER}\n<!--\n{json}\n-->\n{END_MARKER}");
    let body = strip(original);
    if body.is_empty() {
        return Ok(block);
    }
    Ok(format!("{body}{SEPARATOR}{block}"))
}

pub fn is_stale(envelope: Option<&StateSnapshotEnvelope>, max_age: Duration, now: DateTime<Utc>) -> bool {
    match envelope {
        None => true,
        Some(envelope) => now - envelope.last_updated > max_age,
    }
}

pub fn next_envelope(
    previous: Option<&StateSnapshotEnvelope>,
    state: IssueState,
    by: Option<&str>,
    command: Option<&str>,
    now: DateTime<Utc>,
) -> StateSnapshotEnvelope {
    StateSnapshotEnvelope {
        schema_version: SCHEMA_VERSION.to_string(),
        state_version: previous.map(|prev| prev.state_version + 1).unwrap_or(1),
        last_updated: now,
        last_updated_by: by.map(str::to_string),
        last_command: command.map(str::to_string),
        data: state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 10, minute, 0).unwrap()
    }

    fn envelope(command: &str) -> StateSnapshotEnvelope {
        let mut state = IssueState::new(3, "Snapshot me", at(0));
        state.status = Some("todo".to_string());
        next_envelope(None, state, Some("dana"), Some(command), at(5))
    }

    #[test]
    fn embed_then_extract_keeps_surrounding_text() {
        let original = "Fix the login form.\n\n/notnow status todo";
        let embedded = embed(original, &envelope("/notnow status todo")).expect("embed");
        assert!(embedded.starts_with(original));
        assert_eq!(strip(&embedded), original);
        assert_eq!(extract(&embedded), Some(envelope("/notnow status todo")));
    }

    #[test]
    fn whitespace_outside_the_block_survives() {
        let original = "Notes  \n\n\n- item\n\n";
        let embedded = embed(original, &envelope("x")).expect("embed");
        assert_eq!(strip(&embedded), original);
        let again = embed(&embedded, &envelope("y")).expect("embed");
        assert_eq!(strip(&again), original);

        let trailing = format!("{embedded}\n\nAdded later\n");
        assert_eq!(strip(&trailing), format!("{original}\n\nAdded later\n"));
        let leading = format!("{}\nAfter", embed("", &envelope("z")).expect("embed"));
        assert_eq!(strip(&leading), "After");
    }

    #[test]
    fn embed_replaces_existing_block() {
        let first = embed("Body", &envelope("first")).expect("embed");
        let mut second_env = envelope("second");
        second_env.state_version = 2;
        let second = embed(&first, &second_env).expect("embed");
        assert_eq!(second.matches(BEGIN_MARKER).count(), 1);
        assert_eq!(extract(&second).map(|env| env.state_version), Some(2));
    }

    #[test]
    fn comment_terminator_inside_json_is_escaped() {
        let embedded = embed("", &envelope("--> sneaky")).expect("embed");
        let inner_json = embedded.lines().nth(2).expect("json line");
        assert!(!inner_json.contains("-->"));
        let back = extract(&embedded).expect("extract");
        assert_eq!(back.last_command.as_deref(), Some("--> sneaky"));
    }

    #[test]
    fn malformed_block_reads_as_missing() {
        let text = format!("{BEGIN_MARKER}\n<!--\n{{not json\n-->\n{END_MARKER}");
        assert!(matches!(try_extract(&text), Err(SnapshotError::Malformed(_))));
        assert_eq!(extract(&text), None);
        assert_eq!(extract("no block here"), None);
    }

    #[test]
    fn staleness() {
        let env = envelope("x");
        assert!(is_stale(None, Duration::minutes(60), at(5)));
        assert!(!is_stale(Some(&env), Duration::minutes(60), at(50)));
        assert!(is_stale(Some(&env), Duration::minutes(1), at(10)));
    }

    #[test]
    fn next_envelope_increments_version() {
        let first = envelope("x");
        let second = next_envelope(Some(&first), first.data.clone(), None, None, at(9));
        assert_eq!(first.state_version, 1);
        assert_eq!(second.state_version, 2);
        assert_eq!(second.schema_version, SCHEMA_VERSION);
    }
}
