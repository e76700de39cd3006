//! Elasticsearch client: bulk writes and index lifecycle.
//!
//! Supports plain HTTP, basic auth (when a password is configured, user
//! defaulting to `elastic`), and Amazon Elasticsearch Service, where every
//! request is signed with SigV4 for service `es` (see [`crate::aws_sigv4`]).

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::aws_sigv4::{sign_request, AwsCredentials, SigningRequest};
use crate::config::ElasticsearchConfig;
use crate::payload::BulkPayload;

/// Outcome of one bulk request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSummary {
    /// Operations sent.
    pub operations: usize,
    /// Items the engine reported an error for.
    pub failed: usize,
}

/// Consumer of bulk payloads.
#[async_trait]
pub trait BulkWriter: Send + Sync {
    async fn bulk(&self, payload: &BulkPayload) -> Result<BulkSummary>;
}

enum Auth {
    None,
    Basic { user: String, password: String },
    Amazon { creds: AwsCredentials, region: String },
}

pub struct ElasticsearchClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Auth,
}

impl ElasticsearchClient {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let base_url = Url::parse(&config.host)
            .with_context(|| format!("Invalid elasticsearch.host: {}", config.host))?;

        let auth = if let Some(amazon) = &config.amazon {
            Auth::Amazon {
                creds: AwsCredentials::resolve(amazon)?,
                region: amazon.region.clone(),
            }
        } else if let Some(password) = &config.password {
            Auth::Basic {
                user: config.user.clone().unwrap_or_else(|| "elastic".to_string()),
                password: password.clone(),
            }
        } else {
            Auth::None
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<(Vec<u8>, &'static str)>,
    ) -> Result<reqwest::Response> {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("Invalid Elasticsearch path: {}", path))?;

        let mut req = self.http.request(method.clone(), url.clone());

        match &self.auth {
            Auth::None => {}
            Auth::Basic { user, password } => {
                req = req.basic_auth(user, Some(password));
            }
            Auth::Amazon { creds, region } => {
                let host = match url.port() {
                    Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
                    None => url.host_str().unwrap_or_default().to_string(),
                };
                let query: Vec<(String, String)> = url
                    .query_pairs()
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                let empty = Vec::new();
                let payload = body.as_ref().map(|(bytes, _)| bytes).unwrap_or(&empty);
                let headers = sign_request(
                    &SigningRequest {
                        method: method.as_str(),
                        host: &host,
                        path: url.path(),
                        query: &query,
                        body: payload,
                    },
                    creds,
                    region,
                    "es",
                    chrono::Utc::now(),
                );
                for (name, value) in headers {
                    req = req.header(name, value);
                }
            }
        }

        if let Some((bytes, content_type)) = body {
            req = req.header("Content-Type", content_type).body(bytes);
        }

        req.send()
            .await
            .map_err(|e| anyhow!("Elasticsearch {} {} failed: {}", method, path, e))
    }

    /// Remove every document from `index`.
    pub async fn clear_index(&self, index: &str) -> Result<u64> {
        let body = serde_json::to_vec(&json!({ "query": { "match_all": {} } }))?;
        let resp = self
            .send(
                Method::POST,
                &format!("/{}/_delete_by_query", index),
                Some((body, "application/json")),
            )
            .await?;
        let value = expect_json(resp, "delete_by_query").await?;
        let deleted = value.get("deleted").and_then(Value::as_u64).unwrap_or(0);
        info!(index = %index, deleted, "Cleared index");
        Ok(deleted)
    }

    /// Delete `index` if it exists, then create it with `settings`
    /// (mappings/settings JSON, or an empty body).
    pub async fn recreate_index(&self, index: &str, settings: Option<&Value>) -> Result<()> {
        let resp = self
            .send(Method::DELETE, &format!("/{}", index), None)
            .await?;
        match resp.status() {
            s if s.is_success() => debug!(index = %index, "Deleted index"),
            StatusCode::NOT_FOUND => debug!(index = %index, "Index did not exist"),
            _ => {
                expect_json(resp, "delete index").await?;
            }
        }

        let body = serde_json::to_vec(settings.unwrap_or(&json!({})))?;
        let resp = self
            .send(
                Method::PUT,
                &format!("/{}", index),
                Some((body, "application/json")),
            )
            .await?;
        expect_json(resp, "create index").await?;
        info!(index = %index, "Created index");
        Ok(())
    }
}

#[async_trait]
impl BulkWriter for ElasticsearchClient {
    async fn bulk(&self, payload: &BulkPayload) -> Result<BulkSummary> {
        let operations = payload.operations();
        if payload.is_empty() {
            return Ok(BulkSummary::default());
        }

        let body = payload.to_ndjson()?.into_bytes();
        let resp = self
            .send(
                Method::POST,
                &format!("/{}/_bulk", payload.index),
                Some((body, "application/x-ndjson")),
            )
            .await?;
        let value = expect_json(resp, "bulk").await?;

        let failed = count_failed_items(&value);
        if failed > 0 {
            warn!(index = %payload.index, failed, "Bulk request reported item errors");
        }
        Ok(BulkSummary { operations, failed })
    }
}

async fn expect_json(resp: reqwest::Response, what: &str) -> Result<Value> {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        bail!(
            "Elasticsearch {} failed (HTTP {}): {}",
            what,
            status,
            text.chars().take(500).collect::<String>()
        );
    }
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text).with_context(|| format!("Invalid Elasticsearch {} response", what))
}

/// Items in a bulk response that carry an `error` object. A delete of a
/// missing document (`not_found`) is not an error.
fn count_failed_items(response: &Value) -> usize {
    response
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_object()?.values().next())
                .filter(|result| result.get("error").is_some())
                .count()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_failed_items() {
        let response = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "1", "status": 201 } },
                { "index": { "_id": "2", "status": 400, "error": { "type": "mapper_parsing_exception" } } },
                { "delete": { "_id": "3", "status": 404, "result": "not_found" } }
            ]
        });
        assert_eq!(count_failed_items(&response), 1);
        assert_eq!(count_failed_items(&json!({})), 0);
    }

    #[test]
    fn test_basic_auth_defaults_user() {
        let config = ElasticsearchConfig {
            password: Some("secret".to_string()),
            ..Default::default()
        };
        let client = ElasticsearchClient::new(&config).unwrap();
        match client.auth {
            Auth::Basic { user, .. } => assert_eq!(user, "elastic"),
            _ => panic!("expected basic auth"),
        }
    }

    #[test]
    fn test_invalid_host_rejected() {
        let config = ElasticsearchConfig {
            host: "not a url".to_string(),
            ..Default::default()
        };
        assert!(ElasticsearchClient::new(&config).is_err());
    }
}
