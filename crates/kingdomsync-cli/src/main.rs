//! Kingdoms Sync CLI
//!
//! Thin application shell around kingdomsync-core: opens a session, runs the
//! initial load, drives the periodic tick and prints what changes.
//!
//! ## Usage
//!
//! ```bash
//! # List every resource and its endpoint
//! kingdomsync keys
//!
//! # Show which resources each resolve timer invalidates
//! kingdomsync deps
//!
//! # Fetch two resources from the live API
//! KINGDOMSYNC_TOKEN=... kingdomsync fetch kingdom structures --base-url https://game.example
//!
//! # Fetch everything from a directory of <key>.json fixtures
//! kingdomsync fetch --all --fixtures ./fixtures
//!
//! # Poll every 10 seconds until Ctrl-C, keeping a JSONL log
//! kingdomsync --log-dir ./logs watch --fixtures ./fixtures
//!
//! # Per-resource fetch outcomes from the logs
//! kingdomsync log-summary --log-dir ./logs
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use kingdomsync_core::logging::{read_all_entries, FetchSummary, JsonlLayer};
use kingdomsync_core::{
    AuthSession, HttpSession, MemorySession, Poller, ResolveEvent, ResourceKey, Selection,
    SyncConfig, SyncEvent, Synchronizer,
};

/// Kingdoms Sync - resource synchronizer for the kingdoms game client
#[derive(Parser)]
#[command(name = "kingdomsync")]
#[command(version)]
#[command(about = "Kingdoms Sync - keep a local mirror of the game's server resources")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory for JSONL session logs
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Label for this session's log file
    #[arg(long, global = true, default_value = "default")]
    session: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every resource and its endpoint
    Keys,

    /// Show the resolve dependency table
    Deps,

    /// Refresh resources once and print their values as JSON
    Fetch {
        /// Resources to fetch, in fetch order
        keys: Vec<String>,

        /// Fetch every resource
        #[arg(long, conflicts_with = "keys")]
        all: bool,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Load everything, then poll and print changes
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        /// Delay between polls in milliseconds
        #[arg(long, default_value_t = 10_000)]
        interval_ms: u64,

        /// Stop after this many polls (0 = until Ctrl-C)
        #[arg(long, default_value_t = 0)]
        ticks: u64,
    },

    /// Per-resource fetch counts from the JSONL logs in --log-dir
    LogSummary,
}

/// Where resources come from
#[derive(Args)]
struct SourceArgs {
    /// Game API base URL
    #[arg(long, env = "KINGDOMSYNC_BASE_URL")]
    base_url: Option<String>,

    /// Bearer token from the game's login flow
    #[arg(long, env = "KINGDOMSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Serve resources from <DIR>/<key>.json instead of the network
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Per-request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl SourceArgs {
    fn config(&self) -> SyncConfig {
        match self.timeout_ms {
            Some(ms) => SyncConfig::new().with_request_timeout(Duration::from_millis(ms)),
            None => SyncConfig::new(),
        }
    }

    fn open(&self, config: &SyncConfig) -> Result<Arc<dyn AuthSession>> {
        if let Some(dir) = &self.fixtures {
            let session = MemorySession::from_fixture_dir(dir)
                .with_context(|| format!("loading fixtures from {}", dir.display()))?;
            return Ok(Arc::new(session));
        }
        match (&self.base_url, &self.token) {
            (Some(base_url), Some(token)) => {
                let session = HttpSession::with_config(base_url.as_str(), token.as_str(), config)
                    .context("building HTTP session")?;
                Ok(Arc::new(session))
            }
            _ => bail!("either --fixtures or both --base-url and --token are required"),
        }
    }
}

fn setup_logging(verbosity: u8, log_dir: Option<&Path>, session: &str) -> Result<()> {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        );

    // The JSONL log always records fetch outcomes, whatever the console shows.
    let jsonl = match log_dir {
        Some(dir) => Some(
            JsonlLayer::new(dir, session)
                .with_context(|| format!("opening log directory {}", dir.display()))?
                .with_filter(EnvFilter::new("kingdomsync_core=debug,kingdomsync=debug")),
        ),
        None => None,
    };

    tracing_subscriber::registry().with(console).with(jsonl).init();
    Ok(())
}

fn parse_selection(names: &[String], all: bool) -> Result<Selection> {
    if all {
        return Ok(Selection::All);
    }
    if names.is_empty() {
        bail!("name at least one resource or pass --all (see `kingdomsync keys`)");
    }
    let keys = names
        .iter()
        .map(|name| name.parse::<ResourceKey>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Selection::from(keys))
}

async fn fetch(names: Vec<String>, all: bool, source: SourceArgs) -> Result<()> {
    let selection = parse_selection(&names, all)?;
    let config = source.config();
    let sync = Synchronizer::with_config(source.open(&config)?, config);
    let targets = selection.resolve();

    let mut events = sync.subscribe();
    sync.refresh(selection, Vec::new()).await;

    let mut failed = 0usize;
    while let Ok(event) = events.try_recv() {
        if let SyncEvent::FetchFailed { key, message } = event {
            eprintln!("warning: {key}: {message}");
            failed += 1;
        }
    }

    let snapshot = sync.snapshot();
    let values: Map<String, Value> = targets
        .iter()
        .map(|key| {
            let value = snapshot.value(*key).cloned().unwrap_or(Value::Null);
            (key.as_str().to_string(), value)
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&Value::Object(values))?);

    if failed > 0 && failed == targets.len() {
        bail!("every fetch failed");
    }
    Ok(())
}

fn print_event(event: &SyncEvent) {
    match event {
        SyncEvent::Loading { .. } => {}
        SyncEvent::Updated { key } => println!("updated   {key}"),
        SyncEvent::FetchFailed { key, message } => println!("failed    {key}: {message}"),
        SyncEvent::SideEffectFailed { index, message } => {
            println!("effect    #{index} failed: {message}")
        }
        SyncEvent::ResolveFired { events, keys } => {
            let events: Vec<_> = events.iter().map(|e| e.as_str()).collect();
            let keys: Vec<_> = keys.iter().map(|k| k.as_str()).collect();
            println!("resolved  {} -> {}", events.join(", "), keys.join(", "));
        }
        SyncEvent::InitialLoadComplete => println!("initial load complete"),
        SyncEvent::SessionEnded { reason } => println!("session ended: {reason}"),
    }
}

async fn watch(source: SourceArgs, interval_ms: u64, ticks: u64) -> Result<()> {
    let config = source
        .config()
        .with_poll_interval(Duration::from_millis(interval_ms));
    let sync = Synchronizer::with_config(source.open(&config)?, config);

    let mut events = sync.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event printer fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    sync.initial_load().await;
    if !sync.is_initial_load_complete() {
        sync.teardown();
        bail!("initial load did not complete; is the session logged in?");
    }

    let mut poller = Poller::new(sync.clone());
    if ticks > 0 {
        poller = poller.max_ticks(ticks);
    }
    let handle = poller.spawn();

    let stop = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted");
            stop.cancel();
        }
    });

    let done = handle.join().await;
    sync.teardown();
    let loading = sync.snapshot().loading_keys().len();
    drop(sync);
    let _ = printer.await;

    println!("{done} polls, {loading} resources still loading");
    Ok(())
}

fn log_summary(log_dir: Option<&Path>) -> Result<()> {
    let dir = log_dir.context("log-summary needs --log-dir")?;
    let entries =
        read_all_entries(dir).with_context(|| format!("reading logs in {}", dir.display()))?;
    let summary = FetchSummary::from_entries(&entries);
    if summary.is_empty() {
        println!("No fetches recorded.");
    } else {
        print!("{summary}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let jsonl_dir = match cli.command {
        Commands::LogSummary => None,
        _ => cli.log_dir.as_deref(),
    };
    setup_logging(cli.verbose, jsonl_dir, &cli.session)?;

    match cli.command {
        Commands::Keys => {
            for key in ResourceKey::ALL {
                println!("{:<16} {}", key.as_str(), key.endpoint());
            }
        }

        Commands::Deps => {
            for event in ResolveEvent::ALL {
                let keys: Vec<_> = event.dependents().iter().map(|k| k.as_str()).collect();
                println!("{:<12} -> {}", event.as_str(), keys.join(", "));
            }
        }

        Commands::Fetch { keys, all, source } => fetch(keys, all, source).await?,

        Commands::Watch {
            source,
            interval_ms,
            ticks,
        } => watch(source, interval_ms, ticks).await?,

        Commands::LogSummary => log_summary(cli.log_dir.as_deref())?,
    }

    Ok(())
}
