//! Sync engine: drives the cursor store and the delta-sync client.
//!
//! # Lifecycle
//!
//! 1. The stored cursor is read once, on the first [`SyncEngine::sync`]
//!    call, and cached in the engine afterwards.
//! 2. Without a cursor, an **initial** sync scoped to the configured
//!    content type is issued; otherwise a **delta** sync from the cursor.
//! 3. If the returned token equals the stored one nothing changed:
//!    [`SyncOutcome::NoChange`], and the store is not touched.
//! 4. Otherwise the new token is persisted *before* the delta is returned.
//!    A crash after persisting is safe to retry; a crash before it replays
//!    the same (idempotent) window.
//!
//! A transport failure leaves both the cached and stored cursor untouched.
//! A failed cursor write is logged and reported through
//! [`SyncDelta::cursor_persisted`]; the delta is still delivered.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::contentful::{SyncClient, SyncQuery};
use crate::cursor::CursorStore;
use crate::models::{DeletedEntry, Entry};

/// Errors raised by the sync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Transport or protocol failure during the sync call. The cursor was
    /// not advanced, so the same request can be retried.
    #[error("sync failed: {0:#}")]
    SyncFailed(anyhow::Error),

    /// The stored cursor could not be read.
    #[error("could not read sync cursor: {0:#}")]
    CursorUnavailable(anyhow::Error),
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// What changed upstream since the previous sync.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncDelta {
    pub entries: Vec<Entry>,
    pub deleted_entries: Vec<DeletedEntry>,
    pub next_sync_token: String,
    /// Whether this was the first (initial) sync.
    pub initial: bool,
    /// `false` when the new cursor could not be written; the next process
    /// run will replay this window.
    pub cursor_persisted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Changed(SyncDelta),
    NoChange,
}

/// Owns the sync cursor for one content mirror.
pub struct SyncEngine<C, S> {
    client: C,
    store: S,
    content_type: String,
    cursor: Option<String>,
    loaded: bool,
}

impl<C: SyncClient, S: CursorStore> SyncEngine<C, S> {
    pub fn new(client: C, store: S, content_type: impl Into<String>) -> Self {
        Self {
            client,
            store,
            content_type: content_type.into(),
            cursor: None,
            loaded: false,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The cursor as last seen by this engine (not re-read from the store).
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// The stored cursor, read from the store on first use.
    pub async fn stored_cursor(&mut self) -> SyncResult<Option<String>> {
        if !self.loaded {
            self.cursor = self
                .store
                .load()
                .await
                .map_err(SyncError::CursorUnavailable)?;
            self.loaded = true;
        }
        Ok(self.cursor.clone())
    }

    /// Fetch the current delta and advance the cursor.
    pub async fn sync(&mut self) -> SyncResult<SyncOutcome> {
        let stored = self.stored_cursor().await?;

        let query = match &stored {
            Some(token) => {
                debug!("Sync token found, syncing from stored cursor");
                SyncQuery::delta(token.clone())
            }
            None => SyncQuery::initial(self.content_type.clone()),
        };

        let page = self
            .client
            .sync(&query)
            .await
            .map_err(SyncError::SyncFailed)?;

        if page.next_sync_token.is_empty() {
            return Err(SyncError::SyncFailed(anyhow::anyhow!(
                "sync response carried no next sync token"
            )));
        }

        if stored.as_deref() == Some(page.next_sync_token.as_str()) {
            info!("No updates since last sync");
            return Ok(SyncOutcome::NoChange);
        }

        let cursor_persisted = match self.store.save(&page.next_sync_token).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    error = %format!("{:#}", e),
                    location = %self.store.describe(),
                    "Could not persist sync cursor; the next run will replay this window"
                );
                false
            }
        };
        self.cursor = Some(page.next_sync_token.clone());

        info!(
            entries = page.entries.len(),
            deleted = page.deleted_entries.len(),
            initial = query.is_initial(),
            "Sync updates found"
        );

        Ok(SyncOutcome::Changed(SyncDelta {
            entries: page.entries,
            deleted_entries: page.deleted_entries,
            next_sync_token: page.next_sync_token,
            initial: query.is_initial(),
            cursor_persisted,
        }))
    }

    /// Run [`sync`](Self::sync) and return only the new or updated entries.
    ///
    /// `NoChange` yields an empty list; errors propagate.
    pub async fn get_entries(&mut self) -> SyncResult<Vec<Entry>> {
        match self.sync().await? {
            SyncOutcome::Changed(delta) => Ok(delta.entries),
            SyncOutcome::NoChange => Ok(Vec::new()),
        }
    }

    /// Forget the cursor, both cached and stored. The next sync is initial.
    pub async fn reset(&mut self) -> anyhow::Result<()> {
        self.store.clear().await?;
        self.cursor = None;
        self.loaded = true;
        Ok(())
    }
}
