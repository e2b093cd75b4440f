//! JSONL session logs
//!
//! Every client session (one login, one CLI run) appends its `tracing`
//! events to its own JSONL file, so several clients pointed at the same
//! directory never interleave partial lines.
//!
//! ## Layout
//!
//! ```text
//! logs/
//! └── raw/                              # one file per session label per day
//!     ├── 2026-10-19_default.jsonl
//!     └── 2026-10-19_alt-account.jsonl
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use kingdomsync_core::logging::JsonlLayer;
//! use tracing_subscriber::prelude::*;
//!
//! let jsonl = JsonlLayer::new("./logs", "default")?;
//! tracing_subscriber::registry()
//!     .with(jsonl)
//!     .with(tracing_subscriber::fmt::layer())
//!     .init();
//!
//! // later
//! let summary = FetchSummary::from_entries(&read_all_entries("./logs")?);
//! ```
//!
//! ## Querying logs with jq
//!
//! ```bash
//! # Every failed fetch
//! jq 'select(.level == "warn" and .fields.key != null)' logs/raw/*.jsonl
//!
//! # Resolve timers that fired
//! jq 'select(.msg == "Resolve timers fired")' logs/raw/*.jsonl
//! ```

pub mod entry;
pub mod layer;
pub mod summary;
pub mod writer;

pub use entry::JsonLogEntry;
pub use layer::JsonlLayer;
pub use summary::{FetchCounts, FetchSummary};
pub use writer::{read_all_entries, SessionLogWriter};
