//! TOML configuration parsing and validation.
//!
//! ```toml
//! [contentful]
//! space = "abc123"
//! access_token = "..."          # or CONTENTFUL_ACCESS_TOKEN
//! content_type = "post"
//! # host = "preview.contentful.com"
//! # environment = "staging"
//!
//! [elasticsearch]
//! host = "http://localhost:9200"
//! index_prefix = "contentful"
//! # user = "elastic"
//! # password = "..."            # or ELASTICSEARCH_PASSWORD
//!
//! # [elasticsearch.amazon]
//! # region = "eu-west-1"        # credentials from AWS_* env vars
//!
//! [sync]
//! cursor_path = ".contentful"
//! # locales = ["en-US", "de-DE"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub contentful: ContentfulConfig,
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentfulConfig {
    pub space: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_contentful_host")]
    pub host: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Content type the initial sync is scoped to, and the only type indexed.
    pub content_type: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_contentful_host() -> String {
    "cdn.contentful.com".to_string()
}
fn default_environment() -> String {
    "master".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    #[serde(default = "default_es_host")]
    pub host: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub amazon: Option<AmazonConfig>,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            host: default_es_host(),
            user: None,
            password: None,
            index_prefix: default_index_prefix(),
            timeout_secs: default_timeout_secs(),
            amazon: None,
        }
    }
}

fn default_es_host() -> String {
    "http://localhost:9200".to_string()
}
fn default_index_prefix() -> String {
    "contentful".to_string()
}

/// Amazon Elasticsearch Service: requests are signed with SigV4.
#[derive(Debug, Deserialize, Clone)]
pub struct AmazonConfig {
    pub region: String,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Where the sync cursor is kept, relative to the working directory.
    #[serde(default = "default_cursor_path")]
    pub cursor_path: PathBuf,
    /// Locales to emit. When unset, the space's locale list is used.
    #[serde(default)]
    pub locales: Option<Vec<String>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cursor_path: default_cursor_path(),
            locales: None,
        }
    }
}

fn default_cursor_path() -> PathBuf {
    PathBuf::from(".contentful")
}

impl ElasticsearchConfig {
    /// Index receiving documents for `locale`: `{prefix}-{locale}`, lower-cased.
    pub fn index_name(&self, locale: &str) -> String {
        format!("{}-{}", self.index_prefix, locale).to_lowercase()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration from TOML text, filling secrets from
/// the environment when the file leaves them out.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.contentful.access_token.is_empty() {
        if let Ok(token) = std::env::var("CONTENTFUL_ACCESS_TOKEN") {
            config.contentful.access_token = token;
        }
    }
    if config.elasticsearch.password.is_none() {
        config.elasticsearch.password = std::env::var("ELASTICSEARCH_PASSWORD").ok();
    }

    if config.contentful.space.is_empty() {
        bail!("contentful.space is required");
    }
    if config.contentful.access_token.is_empty() {
        bail!("contentful.access_token is required (or set CONTENTFUL_ACCESS_TOKEN)");
    }
    if config.contentful.content_type.is_empty() {
        bail!("contentful.content_type must not be empty");
    }
    if config.contentful.timeout_secs == 0 || config.elasticsearch.timeout_secs == 0 {
        bail!("timeout_secs must be > 0");
    }
    if config.elasticsearch.index_prefix.is_empty() {
        bail!("elasticsearch.index_prefix must not be empty");
    }
    if config.sync.cursor_path.as_os_str().is_empty() {
        bail!("sync.cursor_path must not be empty");
    }
    if let Some(locales) = &config.sync.locales {
        if locales.is_empty() {
            bail!("sync.locales must list at least one locale when set");
        }
    }

    Ok(config)
}
