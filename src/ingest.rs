//! Sync pipeline orchestration.
//!
//! Coordinates the full flow: delta sync → reference resolution →
//! document transformation → one bulk payload per locale → bulk write.
//!
//! Content types and locales are fetched before the sync call, so a failure
//! there leaves the cursor where it was. The cursor then advances inside
//! [`SyncEngine::sync`], before anything is written to the index. A failed
//! write therefore needs `--full` (or `cfsearch reset`) to be replayed.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::config::Config;
use crate::contentful::{ContentSource, ContentfulClient, SyncClient};
use crate::cursor::{CursorStore, FileCursorStore};
use crate::elasticsearch::{BulkWriter, ElasticsearchClient};
use crate::models::Locale;
use crate::payload::{generate_delete_payload, generate_payload};
use crate::progress::{ProgressMode, SyncProgressEvent, SyncProgressReporter};
use crate::resolve::ReferenceResolver;
use crate::sync::{SyncEngine, SyncOutcome};
use crate::transform::{reduce_content_types, reformat_entries};

/// Options for one `cfsearch sync` run.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Forget the stored cursor first and run an initial sync.
    pub full: bool,
    /// Build payloads but do not write them.
    pub dry_run: bool,
    pub progress: ProgressMode,
}

/// Per-index outcome of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub index: String,
    pub indexed: usize,
    pub deleted: usize,
    pub failed: usize,
}

/// Summary of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub changed: bool,
    pub initial: bool,
    pub entries: usize,
    pub deleted: usize,
    pub documents: usize,
    pub indexes: Vec<IndexReport>,
    pub cursor_persisted: bool,
    pub dry_run: bool,
}

/// Run one sync against the configured Contentful space and Elasticsearch.
pub async fn run_sync(config: &Config, options: SyncOptions) -> Result<()> {
    let client = ContentfulClient::new(&config.contentful)?;
    let store = FileCursorStore::new(&config.sync.cursor_path);
    let mut engine = SyncEngine::new(client, store, config.contentful.content_type.clone());
    let mut resolver = ReferenceResolver::new();

    let writer = if options.dry_run {
        None
    } else {
        Some(ElasticsearchClient::new(&config.elasticsearch)?)
    };

    if options.full {
        engine.reset().await?;
    }

    let reporter = options.progress.reporter();
    let report = sync_once(
        config,
        &mut engine,
        &mut resolver,
        writer.as_ref().map(|w| w as &dyn BulkWriter),
        reporter.as_ref(),
    )
    .await?;

    print_report(&report);
    Ok(())
}

/// One pass of the pipeline over an existing engine and resolver.
///
/// `writer = None` is a dry run: payloads are built and counted but not
/// sent.
pub async fn sync_once<C, S>(
    config: &Config,
    engine: &mut SyncEngine<C, S>,
    resolver: &mut ReferenceResolver,
    writer: Option<&dyn BulkWriter>,
    reporter: &dyn SyncProgressReporter,
) -> Result<SyncReport>
where
    C: SyncClient + ContentSource,
    S: CursorStore,
{
    let mut report = SyncReport {
        dry_run: writer.is_none(),
        ..Default::default()
    };

    // Fetched before the cursor can advance.
    let schemas = engine.client().content_types().await?;
    let content_types = reduce_content_types(&schemas, &config.contentful.content_type);
    let locales = match &config.sync.locales {
        Some(codes) => codes.iter().map(Locale::new).collect(),
        None => engine.client().locales().await?,
    };

    let initial = engine.stored_cursor().await?.is_none();
    reporter.report(SyncProgressEvent::Fetching { initial });

    let delta = match engine.sync().await? {
        SyncOutcome::NoChange => return Ok(report),
        SyncOutcome::Changed(delta) => delta,
    };
    report.changed = true;
    report.initial = delta.initial;
    report.entries = delta.entries.len();
    report.deleted = delta.deleted_entries.len();
    report.cursor_persisted = delta.cursor_persisted;

    reporter.report(SyncProgressEvent::Resolving {
        entries: delta.entries.len() as u64,
    });
    let resolved = resolver.resolve_references(&delta.entries)?;

    let documents = reformat_entries(&resolved, &content_types, &locales);
    report.documents = documents.len();

    let total = locales.len() as u64;
    for (n, locale) in locales.iter().enumerate() {
        let index = config.elasticsearch.index_name(&locale.code);
        let mut payload = generate_payload(&documents, &locale.code, &index);
        let indexed = payload.operations();
        payload
            .body
            .extend(generate_delete_payload(&delta.deleted_entries, &index).body);

        reporter.report(SyncProgressEvent::Writing {
            index: index.clone(),
            n: n as u64 + 1,
            total,
        });

        let failed = match writer {
            Some(writer) => writer.bulk(&payload).await?.failed,
            None => 0,
        };

        report.indexes.push(IndexReport {
            index,
            indexed,
            deleted: delta.deleted_entries.len(),
            failed,
        });
    }

    Ok(report)
}

fn print_report(report: &SyncReport) {
    let mode = match (report.dry_run, report.initial) {
        (true, _) => " (dry-run)",
        (false, true) => " (initial)",
        (false, false) => "",
    };
    println!("sync contentful{}", mode);

    if !report.changed {
        println!("  no changes since last sync");
        println!("ok");
        return;
    }

    println!("  entries: {}", report.entries);
    println!("  deleted entries: {}", report.deleted);
    println!("  documents: {}", report.documents);
    for index in &report.indexes {
        println!(
            "  index {}: {} indexed, {} deleted, {} failed",
            index.index, index.indexed, index.deleted, index.failed
        );
    }
    if report.cursor_persisted {
        println!("  cursor: saved");
    } else {
        println!("  cursor: NOT SAVED (next run replays this window)");
    }
    println!("ok");
}

/// Print where the cursor lives and whether a sync has happened.
pub async fn run_status(config: &Config) -> Result<()> {
    let store = FileCursorStore::new(&config.sync.cursor_path);
    let cursor = store.load().await?;

    println!("{:<16} {}", "space", config.contentful.space);
    println!("{:<16} {}", "environment", config.contentful.environment);
    println!("{:<16} {}", "content type", config.contentful.content_type);
    println!("{:<16} {}", "cursor file", store.describe());
    match cursor {
        Some(token) => {
            let preview: String = token.chars().take(12).collect();
            println!("{:<16} {}…", "cursor", preview);
        }
        None => println!("{:<16} none (next sync is initial)", "cursor"),
    }
    Ok(())
}

/// Delete the stored cursor.
pub async fn run_reset(config: &Config) -> Result<()> {
    let store = FileCursorStore::new(&config.sync.cursor_path);
    store.clear().await?;
    println!("cursor cleared: {}", store.describe());
    Ok(())
}

/// Remove every document from the index of `locale`.
pub async fn run_clear_index(config: &Config, locale: &str) -> Result<()> {
    let client = ElasticsearchClient::new(&config.elasticsearch)?;
    let index = config.elasticsearch.index_name(locale);
    let deleted = client.clear_index(&index).await?;
    println!("cleared {}: {} documents deleted", index, deleted);
    Ok(())
}

/// Drop and recreate the index of `locale`, optionally with a settings and
/// mappings JSON file.
pub async fn run_recreate_index(
    config: &Config,
    locale: &str,
    settings: Option<&Path>,
) -> Result<()> {
    let settings: Option<Value> = match settings {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read index settings: {}", path.display()))?;
            Some(
                serde_json::from_str(&text)
                    .with_context(|| format!("Invalid index settings JSON: {}", path.display()))?,
            )
        }
        None => None,
    };

    let client = ElasticsearchClient::new(&config.elasticsearch)?;
    let index = config.elasticsearch.index_name(locale);
    client.recreate_index(&index, settings.as_ref()).await?;
    println!("recreated {}", index);
    Ok(())
}
