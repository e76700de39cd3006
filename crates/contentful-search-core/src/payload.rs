//! Bulk payload builder for the search index.
//!
//! A payload pairs an operation header with a document body:
//!
//! ```text
//! { "index": { "_type": "post", "_id": "1" } }
//! { "title": "X" }
//! { "delete": { "_id": "2" } }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{DeletedEntry, FlatDocument};

/// A bulk write against one index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkPayload {
    pub index: String,
    pub body: Vec<BulkLine>,
}

/// One line of a bulk body: an action header or a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BulkLine {
    Action(BulkAction),
    Document(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Index(IndexTarget),
    Delete(DeleteTarget),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexTarget {
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteTarget {
    #[serde(rename = "_id")]
    pub id: String,
}

impl BulkPayload {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            body: Vec::new(),
        }
    }

    /// Number of operations (headers) in the body.
    pub fn operations(&self) -> usize {
        self.body
            .iter()
            .filter(|line| matches!(line, BulkLine::Action(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Append a delete operation for `id`.
    pub fn push_delete(&mut self, id: impl Into<String>) {
        self.body
            .push(BulkLine::Action(BulkAction::Delete(DeleteTarget { id: id.into() })));
    }

    /// Render the body as newline-delimited JSON, one line per element,
    /// terminated by a final newline.
    pub fn to_ndjson(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for line in &self.body {
            out.push_str(&serde_json::to_string(line)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Build the bulk payload indexing every document that has content for
/// `locale`. Documents without that locale are skipped; order is kept.
pub fn generate_payload(documents: &[FlatDocument], locale: &str, index: &str) -> BulkPayload {
    let mut payload = BulkPayload::new(index);
    for doc in documents {
        let Some(fields) = doc.locale(locale) else {
            continue;
        };
        payload.body.push(BulkLine::Action(BulkAction::Index(IndexTarget {
            doc_type: doc.content_type.clone(),
            id: doc.id.clone(),
        })));
        payload.body.push(BulkLine::Document(fields.clone()));
    }
    payload
}

/// Build the bulk payload removing deleted entries from `index`.
pub fn generate_delete_payload(deleted: &[DeletedEntry], index: &str) -> BulkPayload {
    let mut payload = BulkPayload::new(index);
    for entry in deleted {
        payload.push_delete(entry.id());
    }
    payload
}
