//! Sync engine behaviour against a scripted Contentful client and an
//! in-memory cursor store.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use contentful_search::contentful::{SyncClient, SyncMode, SyncPage, SyncQuery};
use contentful_search::cursor::{CursorStore, MemoryCursorStore};
use contentful_search::models::{DeletedEntry, Entry};
use contentful_search::sync::{SyncEngine, SyncError, SyncOutcome};
use serde_json::json;

// ─── Scripted client ────────────────────────────────────────────────

/// Replays queued responses and records every query it receives.
#[derive(Default)]
struct ScriptedClient {
    responses: Mutex<VecDeque<Result<SyncPage>>>,
    queries: Mutex<Vec<SyncQuery>>,
}

impl ScriptedClient {
    fn new() -> Self {
        Self::default()
    }

    fn respond(self, page: SyncPage) -> Self {
        self.responses.lock().unwrap().push_back(Ok(page));
        self
    }

    fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(anyhow!(message.to_string())));
        self
    }

    fn queries(&self) -> Vec<SyncQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncClient for ScriptedClient {
    async fn sync(&self, query: &SyncQuery) -> Result<SyncPage> {
        self.queries.lock().unwrap().push(query.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted response left")))
    }
}

/// A store whose reads always fail.
struct UnreadableStore;

#[async_trait]
impl CursorStore for UnreadableStore {
    async fn load(&self) -> Result<Option<String>> {
        bail!("permission denied")
    }
    async fn save(&self, _cursor: &str) -> Result<()> {
        Ok(())
    }
    async fn clear(&self) -> Result<()> {
        Ok(())
    }
    fn describe(&self) -> String {
        "unreadable".to_string()
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

fn entry(id: &str, title: &str) -> Entry {
    serde_json::from_value(json!({
        "sys": {
            "id": id,
            "type": "Entry",
            "contentType": { "sys": { "id": "post", "type": "Link", "linkType": "ContentType" } }
        },
        "fields": { "title": { "en-US": title } }
    }))
    .unwrap()
}

fn deleted(id: &str) -> DeletedEntry {
    serde_json::from_value(json!({ "sys": { "id": id, "type": "DeletedEntry" } })).unwrap()
}

fn page(token: &str, entries: Vec<Entry>, deleted_entries: Vec<DeletedEntry>) -> SyncPage {
    SyncPage {
        next_sync_token: token.to_string(),
        entries,
        deleted_entries,
    }
}

fn engine(client: ScriptedClient, store: MemoryCursorStore) -> SyncEngine<ScriptedClient, MemoryCursorStore> {
    SyncEngine::new(client, store, "post")
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_initial_sync_is_scoped_to_content_type() {
    let client = ScriptedClient::new().respond(page("t1", vec![entry("a", "A")], vec![]));
    let mut engine = engine(client, MemoryCursorStore::new());

    let outcome = engine.sync().await.unwrap();
    let SyncOutcome::Changed(delta) = outcome else {
        panic!("expected a change");
    };
    assert!(delta.initial);
    assert!(delta.cursor_persisted);
    assert_eq!(delta.entries.len(), 1);
    assert_eq!(delta.next_sync_token, "t1");

    let queries = engine.client().queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(
        queries[0].mode,
        SyncMode::Initial {
            content_type: "post".to_string()
        }
    );
    assert!(!queries[0].resolve_links);

    assert_eq!(engine.store().current().as_deref(), Some("t1"));
    assert_eq!(engine.cursor(), Some("t1"));
}

#[tokio::test]
async fn test_delta_sync_uses_stored_cursor() {
    let client = ScriptedClient::new().respond(page("t2", vec![], vec![deleted("gone")]));
    let mut engine = engine(client, MemoryCursorStore::with_cursor("t1"));

    let SyncOutcome::Changed(delta) = engine.sync().await.unwrap() else {
        panic!("expected a change");
    };
    assert!(!delta.initial);
    assert_eq!(delta.deleted_entries.len(), 1);
    assert_eq!(delta.deleted_entries[0].id(), "gone");

    let queries = engine.client().queries();
    assert_eq!(
        queries[0].mode,
        SyncMode::Delta {
            next_sync_token: "t1".to_string()
        }
    );
    assert!(!queries[0].resolve_links);
    assert_eq!(engine.store().current().as_deref(), Some("t2"));
}

#[tokio::test]
async fn test_unchanged_token_is_no_change_without_write() {
    let client = ScriptedClient::new()
        .respond(page("t1", vec![entry("a", "A")], vec![]))
        .respond(page("t1", vec![], vec![]));
    let mut engine = engine(client, MemoryCursorStore::new());

    assert!(matches!(engine.sync().await.unwrap(), SyncOutcome::Changed(_)));
    assert_eq!(engine.store().writes(), 1);

    assert_eq!(engine.sync().await.unwrap(), SyncOutcome::NoChange);
    assert_eq!(engine.store().writes(), 1);
    assert_eq!(engine.store().current().as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_failure_leaves_cursor_untouched() {
    let client = ScriptedClient::new()
        .fail("connection reset")
        .respond(page("t2", vec![entry("a", "A")], vec![]));
    let mut engine = engine(client, MemoryCursorStore::with_cursor("t1"));

    let err = engine.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::SyncFailed(_)));
    assert!(err.to_string().contains("connection reset"));
    assert_eq!(engine.store().current().as_deref(), Some("t1"));
    assert_eq!(engine.store().writes(), 0);
    assert_eq!(engine.cursor(), Some("t1"));

    // Retry issues the same delta request.
    assert!(matches!(engine.sync().await.unwrap(), SyncOutcome::Changed(_)));
    let queries = engine.client().queries();
    assert_eq!(queries[0], queries[1]);
    assert_eq!(engine.store().current().as_deref(), Some("t2"));
}

#[tokio::test]
async fn test_empty_next_token_is_a_failure() {
    let client = ScriptedClient::new().respond(page("", vec![entry("a", "A")], vec![]));
    let mut engine = engine(client, MemoryCursorStore::new());

    assert!(matches!(
        engine.sync().await,
        Err(SyncError::SyncFailed(_))
    ));
    assert_eq!(engine.store().current(), None);
}

#[tokio::test]
async fn test_persistence_failure_still_delivers_delta() {
    let store = MemoryCursorStore::new();
    store.set_fail_writes(true);
    let client = ScriptedClient::new()
        .respond(page("t1", vec![entry("a", "A")], vec![]))
        .respond(page("t2", vec![], vec![]));
    let mut engine = engine(client, store);

    let SyncOutcome::Changed(delta) = engine.sync().await.unwrap() else {
        panic!("expected a change");
    };
    assert!(!delta.cursor_persisted);
    assert_eq!(delta.entries.len(), 1);
    assert_eq!(engine.store().current(), None);

    // Within the process the engine continues from the new token.
    engine.sync().await.unwrap();
    let queries = engine.client().queries();
    assert_eq!(
        queries[1].mode,
        SyncMode::Delta {
            next_sync_token: "t1".to_string()
        }
    );
}

#[tokio::test]
async fn test_unreadable_cursor() {
    let client = ScriptedClient::new().respond(page("t1", vec![], vec![]));
    let mut engine = SyncEngine::new(client, UnreadableStore, "post");

    assert!(matches!(
        engine.sync().await,
        Err(SyncError::CursorUnavailable(_))
    ));
    assert!(engine.client().queries().is_empty());
}

#[tokio::test]
async fn test_get_entries() {
    let client = ScriptedClient::new()
        .respond(page("t1", vec![entry("a", "A"), entry("b", "B")], vec![]))
        .respond(page("t1", vec![], vec![]))
        .fail("boom");
    let mut engine = engine(client, MemoryCursorStore::new());

    let entries = engine.get_entries().await.unwrap();
    let ids: Vec<&str> = entries.iter().map(|e| e.id()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    assert!(engine.get_entries().await.unwrap().is_empty());

    assert!(engine.get_entries().await.is_err());
}

#[tokio::test]
async fn test_reset_forces_initial_sync() {
    let client = ScriptedClient::new().respond(page("t9", vec![], vec![]));
    let mut engine = engine(client, MemoryCursorStore::with_cursor("t1"));

    engine.reset().await.unwrap();
    assert_eq!(engine.store().current(), None);

    engine.sync().await.unwrap();
    assert!(engine.client().queries()[0].is_initial());
}
