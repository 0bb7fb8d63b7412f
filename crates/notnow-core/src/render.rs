//! Markdown summaries posted back to the issue by `show` and `subtask list`.

use crate::duration::format_human;
use crate::state::IssueState;

pub fn render_subtasks(state: &IssueState) -> String {
    if state.subtasks.is_empty() {
        return "No subtasks.".to_string();
    }
    let mut lines = vec![format!(
        "**Subtasks** ({}/{} done)",
        state.completed_subtasks(),
        state.subtasks.len()
    )];
    for subtask in &state.subtasks {
        let mark = if subtask.is_done() { "x" } else { " " };
        let mut line = format!("- [{mark}] `{}` {}", subtask.id, subtask.title);
        if let Some(estimate) = subtask.estimate.as_deref() {
            line.push_str(&format!(" ({estimate})"));
        }
        if let Some(assignee) = subtask.assignee.as_deref() {
            line.push_str(&format!(" @{assignee}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn render_state(state: &IssueState) -> String {
    let mut out = vec![format!("### #{} {}", state.issue_number, state.title)];

    let field = |label: &str, value: Option<&str>| format!("- **{label}:** {}", value.unwrap_or("-"));
    out.push(field("Status", state.status.as_deref()));
    out.push(field("Priority", state.priority.as_deref()));
    out.push(field("Type", state.issue_type.as_deref()));
    out.push(field(
        "Assignee",
        state.assignee.as_deref().map(|user| format!("@{user}")).as_deref(),
    ));
    out.push(field("Estimate", state.estimate.as_deref()));
    let due = state.due_date.map(|date| date.format("%Y-%m-%d").to_string());
    out.push(field("Due", due.as_deref()));
    if !state.tags.is_empty() {
        let tags: Vec<&str> = state.tags.iter().map(String::as_str).collect();
        out.push(format!("- **Tags:** {}", tags.join(", ")));
    }
    out.push(format!(
        "- **Time spent:** {}",
        format_human(state.total_time_spent)
    ));
    if let Some(active) = state.active_session.as_ref() {
        out.push(format!(
            "- **Active session:** since {}",
            active.started_at.format("%Y-%m-%d %H:%M UTC")
        ));
    }

    if !state.subtasks.is_empty() {
        out.push(String::new());
        out.push(render_subtasks(state));
    }

    if !state.sessions.is_empty() {
        out.push(String::new());
        out.push("**Sessions**".to_string());
        for session in &state.sessions {
            let mut line = format!(
                "- {} {}",
                session.started_at.format("%Y-%m-%d %H:%M"),
                format_human(session.duration)
            );
            if let Some(description) = session.description.as_deref() {
                line.push_str(&format!(": {description}"));
            }
            out.push(line);
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Subtask, SubtaskStatus, WorkSession};
    use chrono::{Duration, TimeZone, Utc};

    fn sample() -> IssueState {
        let created = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let mut state = IssueState::new(21, "Billing export", created);
        state.status = Some("in_progress".to_string());
        state.assignee = Some("dana".to_string());
        state.tags.insert("api".to_string());
        state.subtasks.push(Subtask {
            id: "st1".to_string(),
            title: "Schema".to_string(),
            status: SubtaskStatus::Done,
            estimate: Some("01:00".to_string()),
            assignee: None,
            completed_at: Some(created),
        });
        state.subtasks.push(Subtask {
            id: "st2".to_string(),
            title: "CSV writer".to_string(),
            status: SubtaskStatus::Pending,
            estimate: None,
            assignee: Some("lee".to_string()),
            completed_at: None,
        });
        state.sessions.push(WorkSession {
            id: "s".to_string(),
            started_at: created,
            ended_at: Some(created + Duration::minutes(90)),
            duration: Duration::minutes(90),
            description: Some("pairing".to_string()),
            user: None,
        });
        state.recompute_total_time();
        state
    }

    #[test]
    fn subtask_checklist() {
        let text = render_subtasks(&sample());
        assert_eq!(
            text,
            "**Subtasks** (1/2 done)\n- [x] `st1` Schema (01:00)\n- [ ] `st2` CSV writer @lee"
        );
    }

    #[test]
    fn state_summary_lists_fields_and_sessions() {
        let text = render_state(&sample());
        assert!(text.starts_with("### #21 Billing export\n- **Status:** in_progress"));
        assert!(text.contains("- **Assignee:** @dana"));
        assert!(text.contains("- **Priority:** -"));
        assert!(text.contains("- **Time spent:** 1h 30m"));
        assert!(text.contains("- 2026-05-01 09:00 1h 30m: pairing"));
    }

    #[test]
    fn empty_subtasks() {
        let state = IssueState::new(1, "t", Utc::now());
        assert_eq!(render_subtasks(&state), "No subtasks.");
    }
}
