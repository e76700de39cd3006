//! Document transformer: resolved entries → flat per-locale documents.
//!
//! Two stages run per entry:
//!
//! 1. **Reduce** ([`reduce_entries`]): drop `sys`, keep `id` and content
//!    type, and copy every non-array field value into its locale bucket.
//! 2. **Format** ([`format_entries`]): for each configured locale, rename
//!    the content type's title field to `title`, convert long-text fields
//!    from markdown to plain text, keep short-text fields verbatim, and omit
//!    every other field kind.
//!
//! Documents left without any locale bucket are dropped.
//!
//! Content type schemas are reduced separately by [`reduce_content_types`].

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::markdown::markdown_to_plain_text;
use crate::models::{ContentTypeSchema, FlatDocument, Locale, ResolvedEntry};

/// Field kinds as declared in a content type schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// `Text`: markdown source, indexed as plain text.
    LongText,
    /// `Symbol`: indexed verbatim.
    ShortText,
    /// Any other declared type (links, arrays, numbers, dates, ...). Not indexed.
    Other(String),
}

impl FieldKind {
    pub fn from_schema_type(kind: &str) -> Self {
        match kind {
            "Text" => FieldKind::LongText,
            "Symbol" => FieldKind::ShortText,
            other => FieldKind::Other(other.to_string()),
        }
    }

    /// Map a field value to its indexed form, or `None` to omit it.
    pub fn transform(&self, value: Value) -> Option<Value> {
        match self {
            FieldKind::LongText => match value {
                Value::String(source) => Some(Value::String(markdown_to_plain_text(&source))),
                _ => None,
            },
            FieldKind::ShortText => Some(value),
            FieldKind::Other(_) => None,
        }
    }
}

/// The parts of a content type schema the transformer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTypeDescriptor {
    pub name: String,
    /// Field whose value becomes the document `title`.
    pub title_field_name: Option<String>,
    pub fields: BTreeMap<String, FieldKind>,
}

/// Content type id → descriptor.
pub type ContentTypes = BTreeMap<String, ContentTypeDescriptor>;

/// Reduce raw schemas to descriptors keyed by content type id.
///
/// An empty `filter` keeps every schema; otherwise only the schema whose id
/// equals `filter` is kept. The title field is `title` when the type has a
/// field literally named `title`, and the schema's display field otherwise.
pub fn reduce_content_types(schemas: &[ContentTypeSchema], filter: &str) -> ContentTypes {
    schemas
        .iter()
        .filter(|schema| filter.is_empty() || schema.sys.id == filter)
        .map(|schema| {
            let fields: BTreeMap<String, FieldKind> = schema
                .fields
                .iter()
                .map(|field| (field.id.clone(), FieldKind::from_schema_type(&field.kind)))
                .collect();
            let title_field_name = if fields.contains_key("title") {
                Some("title".to_string())
            } else {
                schema.display_field.clone()
            };
            let descriptor = ContentTypeDescriptor {
                name: schema.sys.id.clone(),
                title_field_name,
                fields,
            };
            (schema.sys.id.clone(), descriptor)
        })
        .collect()
}

/// An entry stripped to id, content type, and per-locale scalar fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedEntry {
    pub id: String,
    pub content_type: String,
    pub locales: BTreeMap<String, Map<String, Value>>,
}

/// Strip resolved entries down to what the index needs.
///
/// Array-valued fields are dropped. Entries without a content type are
/// skipped.
pub fn reduce_entries(entries: &[ResolvedEntry]) -> Vec<ReducedEntry> {
    entries.iter().filter_map(reduce_entry).collect()
}

fn reduce_entry(entry: &ResolvedEntry) -> Option<ReducedEntry> {
    let Some(content_type) = entry.content_type_id() else {
        warn!(entry_id = %entry.id(), "Entry has no content type, skipping");
        return None;
    };

    let locales = entry
        .fields
        .iter()
        .map(|(locale, bucket)| {
            let fields: Map<String, Value> = bucket
                .iter()
                .filter(|(_, value)| !value.is_list())
                .map(|(name, value)| (name.clone(), value.clone().into_json()))
                .collect();
            (locale.clone(), fields)
        })
        .collect();

    Some(ReducedEntry {
        id: entry.id().to_string(),
        content_type: content_type.to_string(),
        locales,
    })
}

/// Build flat documents from reduced entries for the given locales.
///
/// Entries whose content type has no descriptor are skipped (delta syncs
/// are not scoped to a content type, so other types can show up).
pub fn format_entries(
    entries: Vec<ReducedEntry>,
    content_types: &ContentTypes,
    locales: &[Locale],
) -> Vec<FlatDocument> {
    entries
        .into_iter()
        .filter_map(|entry| {
            let Some(descriptor) = content_types.get(&entry.content_type) else {
                debug!(
                    entry_id = %entry.id,
                    content_type = %entry.content_type,
                    "No content type descriptor, skipping"
                );
                return None;
            };
            Some(format_entry(entry, descriptor, locales))
        })
        .filter(FlatDocument::has_content)
        .collect()
}

fn format_entry(
    mut entry: ReducedEntry,
    descriptor: &ContentTypeDescriptor,
    locales: &[Locale],
) -> FlatDocument {
    let mut doc = FlatDocument::new(entry.id, entry.content_type);

    for locale in locales {
        let Some(fields) = entry.locales.remove(&locale.code) else {
            continue;
        };

        let mut bucket = Map::new();
        for (name, value) in fields {
            if descriptor.title_field_name.as_deref() == Some(name.as_str()) {
                bucket.insert("title".to_string(), value);
                continue;
            }
            let transformed = descriptor
                .fields
                .get(&name)
                .and_then(|kind| kind.transform(value));
            if let Some(v) = transformed {
                bucket.insert(name, v);
            }
        }

        if !bucket.is_empty() {
            doc.locales.insert(locale.code.clone(), bucket);
        }
    }

    doc
}

/// Reduce and format in one call.
pub fn reformat_entries(
    entries: &[ResolvedEntry],
    content_types: &ContentTypes,
    locales: &[Locale],
) -> Vec<FlatDocument> {
    format_entries(reduce_entries(entries), content_types, locales)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;
    use crate::resolve::resolve;
    use serde_json::json;

    fn schemas(value: Value) -> Vec<ContentTypeSchema> {
        serde_json::from_value(value).unwrap()
    }

    fn resolved(value: Value) -> Vec<ResolvedEntry> {
        let entries: Vec<Entry> = serde_json::from_value(value).unwrap();
        resolve(&entries).unwrap()
    }

    fn post_entry(id: &str, fields: Value) -> Value {
        json!({
            "sys": {
                "id": id,
                "type": "Entry",
                "contentType": { "sys": { "type": "Link", "linkType": "ContentType", "id": "post" } }
            },
            "fields": fields
        })
    }

    fn post_types() -> ContentTypes {
        reduce_content_types(
            &schemas(json!([{
                "sys": { "id": "post" },
                "displayField": "headline",
                "fields": [
                    { "id": "headline", "type": "Symbol" },
                    { "id": "body", "type": "Text" },
                    { "id": "slug", "type": "Symbol" },
                    { "id": "views", "type": "Integer" },
                    { "id": "tags", "type": "Array" }
                ]
            }])),
            "",
        )
    }

    #[test]
    fn test_reduce_content_types_uses_display_field() {
        let types = post_types();
        let post = &types["post"];
        assert_eq!(post.name, "post");
        assert_eq!(post.title_field_name.as_deref(), Some("headline"));
        assert_eq!(post.fields["body"], FieldKind::LongText);
        assert_eq!(post.fields["slug"], FieldKind::ShortText);
        assert_eq!(post.fields["views"], FieldKind::Other("Integer".to_string()));
    }

    #[test]
    fn test_reduce_content_types_prefers_title_field() {
        let types = reduce_content_types(
            &schemas(json!([{
                "sys": { "id": "page" },
                "displayField": "name",
                "fields": [
                    { "id": "name", "type": "Symbol" },
                    { "id": "title", "type": "Symbol" }
                ]
            }])),
            "",
        );
        assert_eq!(types["page"].title_field_name.as_deref(), Some("title"));
    }

    #[test]
    fn test_reduce_content_types_filter() {
        let input = schemas(json!([
            { "sys": { "id": "post" }, "displayField": null, "fields": [] },
            { "sys": { "id": "page" }, "displayField": null, "fields": [] }
        ]));
        let filtered = reduce_content_types(&input, "page");
        assert_eq!(filtered.keys().collect::<Vec<_>>(), vec!["page"]);
        assert_eq!(reduce_content_types(&input, "").len(), 2);
        assert!(reduce_content_types(&input, "nope").is_empty());
    }

    #[test]
    fn test_reduce_drops_array_fields() {
        let entries = resolved(json!([post_entry("1", json!({
            "headline": { "en": "X" },
            "tags": { "en": ["a", "b"] }
        }))]));
        let reduced = reduce_entries(&entries);
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].id, "1");
        assert_eq!(reduced[0].content_type, "post");
        let en = &reduced[0].locales["en"];
        assert_eq!(en.get("headline"), Some(&json!("X")));
        assert!(en.get("tags").is_none());
    }

    #[test]
    fn test_title_field_renamed() {
        let entries = resolved(json!([post_entry("1", json!({ "headline": { "en": "X" } }))]));
        let docs = reformat_entries(&entries, &post_types(), &[Locale::new("en")]);
        assert_eq!(docs.len(), 1);
        let en = docs[0].locale("en").unwrap();
        assert_eq!(en.get("title"), Some(&json!("X")));
        assert!(en.get("headline").is_none());
    }

    #[test]
    fn test_field_kinds_dispatch() {
        let entries = resolved(json!([post_entry("1", json!({
            "headline": { "en": "Hello" },
            "body": { "en": "Some **bold** text." },
            "slug": { "en": "hello-*world*" },
            "views": { "en": 42 },
            "unknown": { "en": "not in schema" }
        }))]));
        let docs = reformat_entries(&entries, &post_types(), &[Locale::new("en")]);
        let en = docs[0].locale("en").unwrap();
        assert_eq!(en.get("body"), Some(&json!("Some bold text.")));
        assert_eq!(en.get("slug"), Some(&json!("hello-*world*")));
        assert!(en.get("views").is_none());
        assert!(en.get("unknown").is_none());
    }

    #[test]
    fn test_only_configured_locales_emitted() {
        let entries = resolved(json!([post_entry("1", json!({
            "headline": { "en": "Hi", "fr": "Salut", "de": "Hallo" }
        }))]));
        let docs = reformat_entries(
            &entries,
            &post_types(),
            &[Locale::new("en"), Locale::new("fr")],
        );
        assert_eq!(docs[0].locales.len(), 2);
        assert!(docs[0].locale("de").is_none());
        assert_eq!(docs[0].locale("fr").unwrap().get("title"), Some(&json!("Salut")));
    }

    #[test]
    fn test_empty_document_elided() {
        let entries = resolved(json!([
            post_entry("empty", json!({})),
            post_entry("other-locale", json!({ "headline": { "de": "Hallo" } })),
            post_entry("unindexed-only", json!({ "views": { "en": 7 } })),
            post_entry("kept", json!({ "headline": { "en": "Hi" } }))
        ]));
        let docs = reformat_entries(&entries, &post_types(), &[Locale::new("en")]);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["kept"]);
    }

    #[test]
    fn test_unknown_content_type_skipped() {
        let entries = resolved(json!([{
            "sys": {
                "id": "x",
                "type": "Entry",
                "contentType": { "sys": { "type": "Link", "linkType": "ContentType", "id": "author" } }
            },
            "fields": { "name": { "en": "Ada" } }
        }]));
        assert!(reformat_entries(&entries, &post_types(), &[Locale::new("en")]).is_empty());
    }

    #[test]
    fn test_long_text_non_string_omitted() {
        assert_eq!(FieldKind::LongText.transform(json!(3)), None);
        assert_eq!(
            FieldKind::LongText.transform(json!("# Hi")),
            Some(json!("Hi"))
        );
    }
}
