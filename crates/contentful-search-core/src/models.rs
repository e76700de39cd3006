//! Core data models used throughout contentful-search.
//!
//! These types mirror the JSON shapes returned by the Contentful delivery
//! API (entries, links, content type schemas, locales) plus the shapes this
//! crate produces on the way to the search index (resolved entries and flat
//! per-locale documents).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw field storage of an [`Entry`]: field name → locale code → value.
pub type LocalizedFields = BTreeMap<String, BTreeMap<String, Value>>;

/// One locale's fields of a [`ResolvedEntry`]: field name → resolved value.
pub type LocaleBucket = BTreeMap<String, ResolvedValue>;

/// A CMS content record as delivered by the sync API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub sys: EntrySys,
    #[serde(default)]
    pub fields: LocalizedFields,
}

impl Entry {
    pub fn id(&self) -> &str {
        &self.sys.id
    }

    /// The id of this entry's content type, if the sys block carries one.
    pub fn content_type_id(&self) -> Option<&str> {
        self.sys.content_type.as_ref().map(|ct| ct.sys.id.as_str())
    }
}

/// System metadata of an entry.
///
/// Only the fields this crate reads are typed; everything else (revision,
/// timestamps, space and environment links) is kept verbatim in `extra` so
/// resolved entries carry the original metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySys {
    pub id: String,
    #[serde(rename = "type", default = "default_entry_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<LinkRef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_entry_kind() -> String {
    "Entry".to_string()
}

/// A `{ "sys": { "type": "Link", ... } }` reference as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    pub sys: LinkSys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSys {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub link_type: String,
}

/// A placeholder value pointing at another record by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub target_id: String,
    pub link_kind: String,
}

impl Link {
    /// Recognise a link in a raw field value.
    ///
    /// Returns `None` for anything that is not an object whose `sys.type`
    /// is `"Link"`.
    pub fn from_value(value: &Value) -> Option<Link> {
        let sys = value.get("sys")?;
        if sys.get("type")?.as_str()? != "Link" {
            return None;
        }
        Some(Link {
            target_id: sys.get("id")?.as_str()?.to_string(),
            link_kind: sys
                .get("linkType")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Only entry links are resolved; assets and other kinds pass through.
    pub fn is_entry(&self) -> bool {
        self.link_kind == "Entry"
    }
}

/// An entry removed upstream since the previous sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletedEntry {
    pub sys: EntrySys,
}

impl DeletedEntry {
    pub fn id(&self) -> &str {
        &self.sys.id
    }
}

/// An entry whose fields were regrouped to locale → field → value and
/// whose links were replaced by the entries they point to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntry {
    pub sys: EntrySys,
    pub fields: BTreeMap<String, LocaleBucket>,
}

impl ResolvedEntry {
    pub fn id(&self) -> &str {
        &self.sys.id
    }

    pub fn content_type_id(&self) -> Option<&str> {
        self.sys.content_type.as_ref().map(|ct| ct.sys.id.as_str())
    }
}

/// A fully resolved field value. Never contains a link to an entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResolvedValue {
    Entry(ResolvedEntry),
    List(Vec<ResolvedValue>),
    Scalar(Value),
    /// Stand-in for a reference that could not be resolved. Serializes as `{}`.
    Missing(Unresolved),
}

/// Serializes as an empty JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Unresolved {}

impl ResolvedValue {
    pub fn missing() -> Self {
        ResolvedValue::Missing(Unresolved {})
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ResolvedValue::List(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, ResolvedValue::Missing(_))
    }

    /// Convert into a plain JSON value, the shape indexed documents carry.
    pub fn into_json(self) -> Value {
        match self {
            ResolvedValue::Scalar(v) => v,
            ResolvedValue::List(items) => {
                Value::Array(items.into_iter().map(ResolvedValue::into_json).collect())
            }
            ResolvedValue::Missing(_) => Value::Object(Map::new()),
            ResolvedValue::Entry(entry) => serde_json::to_value(entry).unwrap_or_default(),
        }
    }
}

/// Raw content type schema as returned by the content types endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTypeSchema {
    pub sys: SchemaSys,
    #[serde(default)]
    pub display_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSys {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// A locale to emit documents for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub code: String,
}

impl Locale {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

/// A document ready for indexing: one field map per locale.
///
/// Serializes flat, e.g. `{"id": "1", "type": "post", "en-US": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatDocument {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(flatten)]
    pub locales: BTreeMap<String, Map<String, Value>>,
}

impl FlatDocument {
    pub fn new(id: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_type: content_type.into(),
            locales: BTreeMap::new(),
        }
    }

    /// Builder used in tests and by callers assembling documents by hand.
    pub fn with_locale(mut self, code: impl Into<String>, fields: Map<String, Value>) -> Self {
        self.locales.insert(code.into(), fields);
        self
    }

    /// Whether any locale bucket is populated.
    pub fn has_content(&self) -> bool {
        !self.locales.is_empty()
    }

    pub fn locale(&self, code: &str) -> Option<&Map<String, Value>> {
        self.locales.get(code)
    }
}
