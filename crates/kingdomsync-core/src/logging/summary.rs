//! Per-resource fetch outcomes recovered from session logs
//!
//! The synchronizer logs every landed fetch with a `key` field: successes as
//! [`UPDATED_MSG`] and failures as [`FAILED_MSG`]. Counting those lines gives
//! a quick view of which endpoints are flaky.

use std::collections::BTreeMap;
use std::fmt;

use super::entry::JsonLogEntry;
use crate::resource::ResourceKey;

/// Message logged when a fetch landed and replaced the stored value
pub const UPDATED_MSG: &str = "Resource updated";

/// Message logged when a fetch failed and the previous value was kept
pub const FAILED_MSG: &str = "Fetch failed; keeping previous value";

/// Success and failure counts for one resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCounts {
    pub ok: u64,
    pub failed: u64,
}

/// Fetch counts per resource, in key order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    counts: BTreeMap<ResourceKey, FetchCounts>,
}

impl FetchSummary {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a JsonLogEntry>) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            summary.record(entry);
        }
        summary
    }

    /// Count `entry` if it is a fetch outcome for a known resource.
    pub fn record(&mut self, entry: &JsonLogEntry) {
        let Some(key) = entry.field_str("key").and_then(|k| k.parse::<ResourceKey>().ok()) else {
            return;
        };
        if entry.msg == UPDATED_MSG {
            self.counts.entry(key).or_default().ok += 1;
        } else if entry.msg == FAILED_MSG {
            self.counts.entry(key).or_default().failed += 1;
        }
    }

    pub fn get(&self, key: ResourceKey) -> FetchCounts {
        self.counts.get(&key).copied().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKey, FetchCounts)> + '_ {
        self.counts.iter().map(|(key, counts)| (*key, *counts))
    }
}

impl fmt::Display for FetchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<16} {:>8} {:>8}", "resource", "ok", "failed")?;
        for (key, counts) in self.iter() {
            writeln!(f, "{:<16} {:>8} {:>8}", key.as_str(), counts.ok, counts.failed)?;
        }
        Ok(())
    }
}
