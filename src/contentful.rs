//! Contentful Content Delivery API client.
//!
//! Implements the two collaborator interfaces the sync pipeline needs:
//!
//! - [`SyncClient`]: the delta-sync endpoint (`/sync`), with pagination.
//! - [`ContentSource`]: content type schemas and the space's locales.
//!
//! # Sync protocol
//!
//! An initial sync is scoped to entries of one content type:
//!
//! ```text
//! GET /spaces/{space}/environments/{env}/sync?initial=true&type=Entry&content_type=post
//! ```
//!
//! Every response carries either a `nextPageUrl` (more items in this sync
//! window) or a `nextSyncUrl` (window complete). Both embed a `sync_token`
//! query parameter; the one in `nextSyncUrl` is the cursor for the next
//! delta sync:
//!
//! ```text
//! GET /spaces/{space}/environments/{env}/sync?sync_token=...
//! ```
//!
//! Delta requests cannot be filtered by content type.
//!
//! The endpoint returns links unresolved; this client never resolves them,
//! so a query asking for transport-side resolution is rejected.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ContentfulConfig;
use crate::models::{ContentTypeSchema, DeletedEntry, Entry, Locale};

/// Which sync window to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// First sync: everything of one content type.
    Initial { content_type: String },
    /// Changes since the window identified by `next_sync_token`.
    Delta { next_sync_token: String },
}

/// A request to the delta-sync endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncQuery {
    pub mode: SyncMode,
    /// Ask the transport to inline linked entries. The sync engine always
    /// sends `false`: resolution happens in [`crate::resolve`].
    pub resolve_links: bool,
}

impl SyncQuery {
    pub fn initial(content_type: impl Into<String>) -> Self {
        Self {
            mode: SyncMode::Initial {
                content_type: content_type.into(),
            },
            resolve_links: false,
        }
    }

    pub fn delta(next_sync_token: impl Into<String>) -> Self {
        Self {
            mode: SyncMode::Delta {
                next_sync_token: next_sync_token.into(),
            },
            resolve_links: false,
        }
    }

    pub fn is_initial(&self) -> bool {
        matches!(self.mode, SyncMode::Initial { .. })
    }
}

/// The complete result of one sync window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPage {
    pub next_sync_token: String,
    pub entries: Vec<Entry>,
    pub deleted_entries: Vec<DeletedEntry>,
}

/// The delta-sync call.
#[async_trait]
pub trait SyncClient: Send + Sync {
    async fn sync(&self, query: &SyncQuery) -> Result<SyncPage>;
}

/// Content type schemas and locales of the space.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn content_types(&self) -> Result<Vec<ContentTypeSchema>>;
    async fn locales(&self) -> Result<Vec<Locale>>;
}

/// HTTP client for one space/environment.
pub struct ContentfulClient {
    http: reqwest::Client,
    base_url: String,
    space: String,
    environment: String,
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncResponse {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    next_page_url: Option<String>,
    #[serde(default)]
    next_sync_url: Option<String>,
}

#[derive(Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

impl ContentfulClient {
    /// Build a client from config.
    ///
    /// # Errors
    ///
    /// Fails when `space` or `access_token` is empty.
    pub fn new(config: &ContentfulConfig) -> Result<Self> {
        if config.space.is_empty() || config.access_token.is_empty() {
            bail!("'space' and 'access_token' are required");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url(&config.host),
            space: config.space.clone(),
            environment: config.environment.clone(),
            access_token: config.access_token.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/spaces/{}/environments/{}/{}",
            self.base_url, self.space, self.environment, path
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.endpoint(path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| anyhow!("Contentful request to {} failed: {}", url, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!(
                "Contentful {} failed (HTTP {}): {}",
                path,
                status,
                body.chars().take(500).collect::<String>()
            );
        }

        resp.json::<T>()
            .await
            .with_context(|| format!("Invalid Contentful response from {}", path))
    }
}

#[async_trait]
impl SyncClient for ContentfulClient {
    async fn sync(&self, query: &SyncQuery) -> Result<SyncPage> {
        if query.resolve_links {
            bail!("The sync endpoint does not resolve links");
        }

        let mut page = SyncPage::default();
        let mut response: SyncResponse = match &query.mode {
            SyncMode::Initial { content_type } => {
                info!(content_type = %content_type, "Starting initial sync");
                self.get_json(
                    "sync",
                    &[
                        ("initial", "true"),
                        ("type", "Entry"),
                        ("content_type", content_type.as_str()),
                    ],
                )
                .await?
            }
            SyncMode::Delta { next_sync_token } => {
                debug!("Syncing from stored cursor");
                self.get_json("sync", &[("sync_token", next_sync_token.as_str())])
                    .await?
            }
        };

        loop {
            collect_items(&mut page, std::mem::take(&mut response.items))?;

            if let Some(next_sync) = &response.next_sync_url {
                page.next_sync_token = sync_token_from_url(next_sync)?;
                break;
            }

            let Some(next_page) = &response.next_page_url else {
                bail!("Sync response has neither nextPageUrl nor nextSyncUrl");
            };
            let token = sync_token_from_url(next_page)?;
            debug!(items = page.entries.len(), "Fetching next sync page");
            response = self.get_json("sync", &[("sync_token", token.as_str())]).await?;
        }

        info!(
            entries = page.entries.len(),
            deleted = page.deleted_entries.len(),
            "Sync window fetched"
        );
        Ok(page)
    }
}

#[async_trait]
impl ContentSource for ContentfulClient {
    async fn content_types(&self) -> Result<Vec<ContentTypeSchema>> {
        let collection: Collection<ContentTypeSchema> =
            self.get_json("content_types", &[("limit", "1000")]).await?;
        Ok(collection.items)
    }

    async fn locales(&self) -> Result<Vec<Locale>> {
        let collection: Collection<Locale> = self.get_json("locales", &[]).await?;
        Ok(collection.items)
    }
}

/// Sort raw sync items into entries and deletions. Assets and other item
/// kinds are ignored.
fn collect_items(page: &mut SyncPage, items: Vec<Value>) -> Result<()> {
    for item in items {
        let kind = item
            .get("sys")
            .and_then(|sys| sys.get("type"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match kind.as_str() {
            "Entry" => page.entries.push(
                serde_json::from_value(item).context("Malformed entry in sync response")?,
            ),
            "DeletedEntry" => page.deleted_entries.push(
                serde_json::from_value(item)
                    .context("Malformed deleted entry in sync response")?,
            ),
            other => debug!(kind = %other, "Ignoring sync item"),
        }
    }
    Ok(())
}

fn sync_token_from_url(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url).with_context(|| format!("Invalid sync URL: {}", url))?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "sync_token")
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| anyhow!("Sync URL has no sync_token: {}", url))
}

/// `cdn.contentful.com` → `https://cdn.contentful.com`; explicit schemes
/// (local proxies, test servers) are kept.
fn base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sync_token_from_url() {
        let token = sync_token_from_url(
            "https://cdn.contentful.com/spaces/abc/environments/master/sync?sync_token=w5ZGw6JFwqZm",
        )
        .unwrap();
        assert_eq!(token, "w5ZGw6JFwqZm");
        assert!(sync_token_from_url("https://cdn.contentful.com/sync").is_err());
    }

    #[test]
    fn test_base_url() {
        assert_eq!(base_url("cdn.contentful.com"), "https://cdn.contentful.com");
        assert_eq!(base_url("http://127.0.0.1:8080/"), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_collect_items_sorts_kinds() {
        let mut page = SyncPage::default();
        collect_items(
            &mut page,
            vec![
                json!({ "sys": { "id": "e1", "type": "Entry" }, "fields": {} }),
                json!({ "sys": { "id": "d1", "type": "DeletedEntry" } }),
                json!({ "sys": { "id": "a1", "type": "Asset" }, "fields": {} }),
            ],
        )
        .unwrap();
        assert_eq!(page.entries.len(), 1);
        assert_eq!(page.entries[0].id(), "e1");
        assert_eq!(page.deleted_entries.len(), 1);
        assert_eq!(page.deleted_entries[0].id(), "d1");
    }

    #[test]
    fn test_queries_never_ask_for_resolution() {
        assert!(!SyncQuery::initial("post").resolve_links);
        assert!(!SyncQuery::delta("tok").resolve_links);
        assert!(SyncQuery::initial("post").is_initial());
    }
}
