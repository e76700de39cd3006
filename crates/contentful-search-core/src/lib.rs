//! # contentful-search core
//!
//! Pure, I/O-free logic for contentful-search: CMS entry models, reference
//! resolution with a single-slot memo, markdown → plain text conversion,
//! the flat per-locale document transformer, and the bulk payload builder.
//!
//! This crate contains no tokio, reqwest, or filesystem I/O. Everything in
//! here is synchronous computation over in-memory values, so it can be
//! driven by any runtime (or none).
//!
//! ```text
//! Vec<Entry> ──▶ ReferenceResolver ──▶ Vec<ResolvedEntry>
//!                                            │
//!                                   reformat_entries()
//!                                            ▼
//!                BulkPayload ◀── generate_payload() ◀── Vec<FlatDocument>
//! ```

pub mod error;
pub mod markdown;
pub mod models;
pub mod payload;
pub mod resolve;
pub mod transform;

pub use error::{CoreError, CoreResult};
