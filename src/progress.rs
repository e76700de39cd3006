//! Sync progress reporting.
//!
//! Reports what `cfsearch sync` is doing (fetching the sync window,
//! resolving references, writing each locale index) on **stderr**, so
//! stdout stays parseable for scripts.

use std::io::Write;

/// A single progress event for sync.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncProgressEvent {
    /// Waiting on the delta-sync endpoint.
    Fetching { initial: bool },
    /// Resolving references across the fetched entries.
    Resolving { entries: u64 },
    /// Writing one locale index: `n` of `total` indexes done.
    Writing { index: String, n: u64, total: u64 },
}

/// Reports sync progress. Implementations write to stderr (human or JSON).
pub trait SyncProgressReporter: Send + Sync {
    fn report(&self, event: SyncProgressEvent);
}

/// Human-friendly progress on stderr: "sync  writing  contentful-en-us  1 / 3 indexes".
pub struct StderrProgress;

impl SyncProgressReporter for StderrProgress {
    fn report(&self, event: SyncProgressEvent) {
        let line = match &event {
            SyncProgressEvent::Fetching { initial: true } => {
                "sync  fetching initial window...\n".to_string()
            }
            SyncProgressEvent::Fetching { initial: false } => {
                "sync  fetching changes...\n".to_string()
            }
            SyncProgressEvent::Resolving { entries } => {
                format!("sync  resolving  {} entries\n", format_number(*entries))
            }
            SyncProgressEvent::Writing { index, n, total } => {
                format!("sync  writing  {}  {} / {} indexes\n", index, n, total)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SyncProgressReporter for JsonProgress {
    fn report(&self, event: SyncProgressEvent) {
        let obj = match &event {
            SyncProgressEvent::Fetching { initial } => serde_json::json!({
                "event": "progress",
                "phase": "fetching",
                "initial": initial
            }),
            SyncProgressEvent::Resolving { entries } => serde_json::json!({
                "event": "progress",
                "phase": "resolving",
                "entries": entries
            }),
            SyncProgressEvent::Writing { index, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "writing",
                "index": index,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SyncProgressReporter for NoProgress {
    fn report(&self, _event: SyncProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn SyncProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
