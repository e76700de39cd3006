//! Sync cursor persistence.
//!
//! The cursor is an opaque token handed out by the delta-sync API. It is
//! stored as the whole content of a single file (default `./.contentful`);
//! a missing or empty file means no sync has happened yet.
//!
//! Writes go to a sibling temporary file which is flushed and renamed over
//! the target, so a crash mid-write leaves the previous cursor intact.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Storage for the sync cursor.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Read the stored cursor. `None` when no sync has completed yet.
    async fn load(&self) -> Result<Option<String>>;

    /// Durably replace the stored cursor.
    async fn save(&self, cursor: &str) -> Result<()>;

    /// Forget the stored cursor so the next sync starts from scratch.
    async fn clear(&self) -> Result<()>;

    /// Human-readable location, for status output.
    fn describe(&self) -> String;
}

/// Cursor kept in a file.
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let cursor = content.trim();
                Ok((!cursor.is_empty()).then(|| cursor.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to read sync cursor: {}", self.path.display())
            }),
        }
    }

    async fn save(&self, cursor: &str) -> Result<()> {
        if cursor.is_empty() {
            bail!("Refusing to store an empty sync cursor");
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(cursor.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to write sync cursor: {}", self.path.display()))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to remove sync cursor: {}", self.path.display())
            }),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory cursor store for tests.
///
/// Counts successful writes and can be told to fail them.
#[derive(Default)]
pub struct MemoryCursorStore {
    cursor: Mutex<Option<String>>,
    writes: Mutex<usize>,
    fail_writes: Mutex<bool>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(cursor: &str) -> Self {
        let store = Self::default();
        *store.cursor.lock().unwrap() = Some(cursor.to_string());
        store
    }

    pub fn current(&self) -> Option<String> {
        self.cursor.lock().unwrap().clone()
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.current())
    }

    async fn save(&self, cursor: &str) -> Result<()> {
        if *self.fail_writes.lock().unwrap() {
            bail!("cursor store is read-only");
        }
        *self.cursor.lock().unwrap() = Some(cursor.to_string());
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.cursor.lock().unwrap() = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
