//! Reference resolution: turn a flat link graph of entries into fully
//! inlined, locale-grouped documents.
//!
//! # Algorithm
//!
//! 1. Index the input entries by id ([`EntryIndex`]).
//! 2. For every entry, regroup `field → locale → value` into
//!    `locale → field → value`, resolving each leaf value:
//!    - arrays resolve element by element, order preserved;
//!    - inline entries are regrouped recursively;
//!    - links to entries are replaced by the resolved target;
//!    - anything else is returned unchanged.
//! 3. A link whose target is not in the index (deleted, unpublished, or
//!    outside the sync window) resolves to `{}`. So does a link back to an
//!    entry already on the current resolution path, which bounds recursion
//!    on circular references.
//!
//! [`ReferenceResolver`] wraps [`resolve`] with a single-slot memo keyed by
//! a SHA-256 digest of the serialized input, so repeated calls with the
//! same entry list return the same `Arc` without recomputation.
//!
//! # Example
//!
//! ```rust
//! use contentful_search_core::models::Entry;
//! use contentful_search_core::resolve::resolve;
//! use serde_json::json;
//!
//! let entries: Vec<Entry> = serde_json::from_value(json!([{
//!     "sys": { "id": "a", "type": "Entry" },
//!     "fields": { "title": { "en": "Hi", "fr": "Salut" } }
//! }])).unwrap();
//!
//! let resolved = resolve(&entries).unwrap();
//! let fields = serde_json::to_value(&resolved[0].fields).unwrap();
//! assert_eq!(fields, json!({ "en": { "title": "Hi" }, "fr": { "title": "Salut" } }));
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::models::{Entry, LocaleBucket, Link, ResolvedEntry, ResolvedValue};

/// Lookup table from entry id to entry.
pub struct EntryIndex<'a> {
    by_id: HashMap<&'a str, &'a Entry>,
}

impl<'a> EntryIndex<'a> {
    /// Index a list of entries.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidInput`] if an entry has an empty id or if two
    /// entries share an id.
    pub fn build(entries: &'a [Entry]) -> CoreResult<Self> {
        let mut by_id = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if entry.id().is_empty() {
                return Err(CoreError::InvalidInput(format!(
                    "entry at position {} has an empty id",
                    position
                )));
            }
            if by_id.insert(entry.id(), entry).is_some() {
                return Err(CoreError::InvalidInput(format!(
                    "duplicate entry id '{}'",
                    entry.id()
                )));
            }
        }
        Ok(Self { by_id })
    }

    pub fn get(&self, id: &str) -> Option<&'a Entry> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Resolve every entry in `entries` against the others.
///
/// Output order matches input order.
pub fn resolve(entries: &[Entry]) -> CoreResult<Vec<ResolvedEntry>> {
    let index = EntryIndex::build(entries)?;
    Ok(entries
        .iter()
        .map(|entry| Resolution::new(&index).entry(entry))
        .collect())
}

/// One top-level resolution pass. `path` holds the ids of the entries
/// currently being expanded.
struct Resolution<'i, 'a> {
    index: &'i EntryIndex<'a>,
    path: HashSet<String>,
}

impl<'i, 'a> Resolution<'i, 'a> {
    fn new(index: &'i EntryIndex<'a>) -> Self {
        Self {
            index,
            path: HashSet::new(),
        }
    }

    fn entry(&mut self, entry: &Entry) -> ResolvedEntry {
        self.path.insert(entry.id().to_string());
        let resolved = ResolvedEntry {
            sys: entry.sys.clone(),
            fields: self.group_fields_by_locale(entry),
        };
        self.path.remove(entry.id());
        resolved
    }

    /// `{title: {en: .., fr: ..}}` → `{en: {title: ..}, fr: {title: ..}}`
    fn group_fields_by_locale(&mut self, entry: &Entry) -> BTreeMap<String, LocaleBucket> {
        let mut grouped: BTreeMap<String, LocaleBucket> = BTreeMap::new();
        for (field_name, localized) in &entry.fields {
            for (locale, value) in localized {
                let resolved = self.value(value);
                grouped
                    .entry(locale.clone())
                    .or_default()
                    .insert(field_name.clone(), resolved);
            }
        }
        grouped
    }

    fn value(&mut self, value: &Value) -> ResolvedValue {
        if let Value::Array(items) = value {
            return ResolvedValue::List(items.iter().map(|item| self.value(item)).collect());
        }

        if let Some(link) = Link::from_value(value) {
            if link.is_entry() {
                return self.link(&link);
            }
            return ResolvedValue::Scalar(value.clone());
        }

        if is_entry_link(value) {
            debug!("Entry link without a target id");
            return ResolvedValue::missing();
        }

        if is_inline_entry(value) {
            return match Entry::deserialize(value) {
                Ok(inline) => self.nested(&inline),
                Err(e) => {
                    debug!(error = %e, "Could not resolve inline entry");
                    ResolvedValue::missing()
                }
            };
        }

        ResolvedValue::Scalar(value.clone())
    }

    fn link(&mut self, link: &Link) -> ResolvedValue {
        match self.index.get(&link.target_id) {
            Some(target) => self.nested(target),
            None => {
                debug!(target_id = %link.target_id, "Link target not found");
                ResolvedValue::missing()
            }
        }
    }

    fn nested(&mut self, entry: &Entry) -> ResolvedValue {
        if self.path.contains(entry.id()) {
            debug!(entry_id = %entry.id(), "Circular reference");
            return ResolvedValue::missing();
        }
        ResolvedValue::Entry(self.entry(entry))
    }
}

/// `sys.type == "Link"` with `sys.linkType == "Entry"`, whether or not the
/// link is well formed.
fn is_entry_link(value: &Value) -> bool {
    let Some(sys) = value.get("sys") else {
        return false;
    };
    sys.get("type").and_then(Value::as_str) == Some("Link")
        && sys.get("linkType").and_then(Value::as_str) == Some("Entry")
}

fn is_inline_entry(value: &Value) -> bool {
    value
        .get("sys")
        .and_then(|sys| sys.get("type"))
        .and_then(Value::as_str)
        == Some("Entry")
}

/// Stable digest of an entry list, used as the memo key.
///
/// Field maps are ordered (`BTreeMap`), so equal inputs always serialize to
/// the same bytes.
pub fn fingerprint(entries: &[Entry]) -> CoreResult<String> {
    let bytes = serde_json::to_vec(entries)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

struct Memo {
    key: String,
    resolved: Arc<Vec<ResolvedEntry>>,
}

/// Memoizing front end for [`resolve`].
///
/// Holds exactly one slot: the digest of the most recently resolved input
/// and its output. A call with a different input replaces the slot.
#[derive(Default)]
pub struct ReferenceResolver {
    memo: Option<Memo>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `entries`, reusing the previous result when the input is
    /// identical to the previous call's.
    ///
    /// The memo is left untouched when resolution fails.
    pub fn resolve_references(&mut self, entries: &[Entry]) -> CoreResult<Arc<Vec<ResolvedEntry>>> {
        let key = fingerprint(entries)?;
        if let Some(memo) = &self.memo {
            if memo.key == key {
                debug!("Resolved entries found in cache");
                return Ok(Arc::clone(&memo.resolved));
            }
        }

        debug!(entries = entries.len(), "Resolving entries");
        let resolved = Arc::new(resolve(entries)?);
        self.memo = Some(Memo {
            key,
            resolved: Arc::clone(&resolved),
        });
        Ok(resolved)
    }

    /// Whether a memoized result is currently held.
    pub fn is_cached(&self) -> bool {
        self.memo.is_some()
    }

    /// Drop the memoized result.
    pub fn clear(&mut self) {
        self.memo = None;
    }
}
