//! # Contentful Search
//!
//! Mirrors a Contentful space into Elasticsearch.
//!
//! Each run asks Contentful's delta-sync API for what changed since the
//! stored cursor, inlines linked entries, flattens every entry into one
//! document per locale, and writes the result to a `{prefix}-{locale}`
//! index with the bulk API. Deleted entries become bulk `delete`s.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌─────────────┐   ┌───────────────┐
//! │ Contentful │──▶│ SyncEngine  │──▶│  Resolve +  │──▶│ Elasticsearch │
//! │  /sync     │   │ (cursor)    │   │  Transform  │   │    _bulk      │
//! └────────────┘   └─────────────┘   └─────────────┘   └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cfsearch sync                  # initial sync, then deltas
//! cfsearch status                # show the stored cursor
//! cfsearch sync --full           # forget the cursor and start over
//! cfsearch recreate-index en-US --settings mappings.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`contentful`] | Delta-sync and content-model client |
//! | [`cursor`] | Sync cursor persistence |
//! | [`sync`] | Cursor-driven sync engine |
//! | [`resolve`] | Reference resolution (re-exported from the core crate) |
//! | [`transform`] | Entry flattening (re-exported from the core crate) |
//! | [`payload`] | Bulk payload generation (re-exported from the core crate) |
//! | [`elasticsearch`] | Bulk writer and index management |
//! | [`aws_sigv4`] | Request signing for Amazon Elasticsearch Service |
//! | [`ingest`] | Pipeline orchestration and CLI commands |
//! | [`progress`] | Progress reporting on stderr |

pub mod aws_sigv4;
pub mod config;
pub mod contentful;
pub mod cursor;
pub mod elasticsearch;
pub mod ingest;
pub mod progress;
pub mod sync;

pub use contentful_search_core::{markdown, models, payload, resolve, transform};
