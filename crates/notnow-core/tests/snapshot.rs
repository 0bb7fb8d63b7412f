use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

use notnow_core::backend::{Issue, IssueBackend, MemoryIssueBackend};
use notnow_core::snapshot::{self, BEGIN_MARKER, END_MARKER};
use notnow_core::state_store::IssueStateStore;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 11, 2, hour, 0, 0).unwrap()
}

fn seeded(body: &str) -> Arc<MemoryIssueBackend> {
    let backend = Arc::new(MemoryIssueBackend::new());
    backend
        .insert_issue(Issue {
            number: 9,
            title: "Cache".to_string(),
            body: body.to_string(),
            created_at: at(8),
            author: None,
            open: true,
        })
        .expect("seed");
    backend
}

#[tokio::test]
async fn malformed_block_is_a_cache_miss_and_is_replaced_on_refresh() {
    let body = format!(
        "Context paragraph.\n/notnow status review\n\n{BEGIN_MARKER}\n<!--\n{{broken\n-->\n{END_MARKER}"
    );
    let backend = seeded(&body);
    let store = IssueStateStore::new(backend.clone());

    assert_eq!(
        store.cached(9, Duration::minutes(60), at(9)).await.expect("cached"),
        None
    );
    let state = store.load(9).await.expect("load");
    assert_eq!(state.status.as_deref(), Some("review"));

    let envelope = store
        .refresh(9, Some("bot"), Some("/notnow show"), at(9))
        .await
        .expect("refresh");
    assert_eq!(envelope.state_version, 1);
    assert_eq!(envelope.last_updated_by.as_deref(), Some("bot"));

    let updated = backend.fetch_issue(9).await.expect("issue").body;
    assert_eq!(
        snapshot::strip(&updated),
        "Context paragraph.\n/notnow status review"
    );
    assert_eq!(snapshot::extract(&updated), Some(envelope.clone()));
    assert_eq!(
        store.cached(9, Duration::minutes(60), at(9)).await.expect("cached"),
        Some(envelope)
    );
}

#[tokio::test]
async fn commands_in_a_snapshot_never_replay() {
    let backend = seeded("/notnow priority low");
    let store = IssueStateStore::new(backend.clone());
    let envelope = store
        .refresh(9, None, Some("/notnow priority critical"), at(9))
        .await
        .expect("refresh");
    assert_eq!(envelope.last_command.as_deref(), Some("/notnow priority critical"));

    let state = store.load(9).await.expect("load");
    assert_eq!(state.priority.as_deref(), Some("low"));
}
