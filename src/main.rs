//! # Contentful Search CLI (`cfsearch`)
//!
//! ## Usage
//!
//! ```bash
//! cfsearch --config ./config/cfsearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `cfsearch sync` | Pull changes from Contentful and write them to Elasticsearch |
//! | `cfsearch status` | Show the configured space and the stored sync cursor |
//! | `cfsearch reset` | Forget the sync cursor |
//! | `cfsearch clear-index <locale>` | Delete every document from one locale index |
//! | `cfsearch recreate-index <locale>` | Drop and recreate one locale index |
//! | `cfsearch completions <shell>` | Print shell completions |
//!
//! Logging goes to stderr through `tracing`; set `RUST_LOG=debug` for more.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use contentful_search::config;
use contentful_search::ingest::{self, SyncOptions};
use contentful_search::progress::ProgressMode;

/// Mirror a Contentful space into Elasticsearch.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/cfsearch.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "cfsearch",
    about = "Mirror a Contentful space into Elasticsearch",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/cfsearch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull changes from Contentful and write them to Elasticsearch.
    ///
    /// The first run (or a run after `reset`) is an initial sync of the
    /// configured content type; later runs only fetch what changed.
    Sync {
        /// Forget the stored cursor and run an initial sync.
        #[arg(long)]
        full: bool,

        /// Build the bulk payloads without sending them.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to `human` on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Show the configured space and the stored sync cursor.
    Status,

    /// Forget the sync cursor. The next sync is an initial one.
    Reset,

    /// Delete every document from the index of one locale.
    ClearIndex {
        /// Locale code, e.g. `en-US`.
        locale: String,
    },

    /// Drop and recreate the index of one locale.
    RecreateIndex {
        /// Locale code, e.g. `en-US`.
        locale: String,

        /// JSON file with index settings and mappings.
        #[arg(long)]
        settings: Option<PathBuf>,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "cfsearch",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync {
            full,
            dry_run,
            progress,
        } => {
            let options = SyncOptions {
                full,
                dry_run,
                progress: progress.unwrap_or_else(ProgressMode::default_for_tty),
            };
            ingest::run_sync(&cfg, options).await?;
        }
        Commands::Status => {
            ingest::run_status(&cfg).await?;
        }
        Commands::Reset => {
            ingest::run_reset(&cfg).await?;
        }
        Commands::ClearIndex { locale } => {
            ingest::run_clear_index(&cfg, &locale).await?;
        }
        Commands::RecreateIndex { locale, settings } => {
            ingest::run_recreate_index(&cfg, &locale, settings.as_deref()).await?;
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}
