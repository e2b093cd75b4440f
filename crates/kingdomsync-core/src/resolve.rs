//! Server-side resolve timers and the resources they invalidate
//!
//! The `kingdom` resource carries a `next_resolve` object: for each category
//! of server timer (settlements landing, generals returning, missiles
//! arriving, ...) the server reports the value of that timer. When a value
//! changes between two polls, something finished server-side and the
//! resources that category touches are re-fetched.
//!
//! ```text
//! kingdom.next_resolve = { "settles": T1, "mobis": T0, ... }
//!                                 │
//!            compare with last seen ResolveTimestamps
//!                                 │
//!                 settles changed ─┴─► refresh [settle, structures]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::SyncError;
use crate::resource::ResourceKey;

/// Category of server-side timer reported in `kingdom.next_resolve`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveEvent {
    Generals,
    Settles,
    Mobis,
    Missiles,
    Engineers,
    Structures,
    Revealed,
    Shared,
    SpyAttempt,
}

impl ResolveEvent {
    /// Every resolve category
    pub const ALL: [ResolveEvent; 9] = [
        ResolveEvent::Generals,
        ResolveEvent::Settles,
        ResolveEvent::Mobis,
        ResolveEvent::Missiles,
        ResolveEvent::Engineers,
        ResolveEvent::Structures,
        ResolveEvent::Revealed,
        ResolveEvent::Shared,
        ResolveEvent::SpyAttempt,
    ];

    /// Name used by the server in `next_resolve`
    pub const fn as_str(self) -> &'static str {
        match self {
            ResolveEvent::Generals => "generals",
            ResolveEvent::Settles => "settles",
            ResolveEvent::Mobis => "mobis",
            ResolveEvent::Missiles => "missiles",
            ResolveEvent::Engineers => "engineers",
            ResolveEvent::Structures => "structures",
            ResolveEvent::Revealed => "revealed",
            ResolveEvent::Shared => "shared",
            ResolveEvent::SpyAttempt => "spy_attempt",
        }
    }

    /// Resources that may have changed when this timer fires
    pub const fn dependents(self) -> &'static [ResourceKey] {
        match self {
            ResolveEvent::Generals => &[
                ResourceKey::Generals,
                ResourceKey::Mobis,
                ResourceKey::AttackHistory,
                ResourceKey::News,
            ],
            ResolveEvent::Settles => &[ResourceKey::Settle, ResourceKey::Structures],
            ResolveEvent::Mobis => &[ResourceKey::Mobis],
            ResolveEvent::Missiles => &[ResourceKey::Missiles],
            ResolveEvent::Engineers => &[ResourceKey::Engineers, ResourceKey::Projects],
            ResolveEvent::Structures => &[ResourceKey::Structures],
            ResolveEvent::Revealed => &[ResourceKey::Revealed, ResourceKey::GalaxyInfo],
            ResolveEvent::Shared => &[ResourceKey::Shared],
            ResolveEvent::SpyAttempt => &[ResourceKey::SpyHistory, ResourceKey::News],
        }
    }
}

impl fmt::Display for ResolveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolveEvent {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResolveEvent::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| SyncError::UnknownResolveEvent(s.to_string()))
    }
}

/// Union of the dependents of every event, in `ResourceKey` order
pub fn dependents_of<I>(events: I) -> BTreeSet<ResourceKey>
where
    I: IntoIterator<Item = ResolveEvent>,
{
    events
        .into_iter()
        .flat_map(|event| event.dependents().iter().copied())
        .collect()
}

/// Last observed value of each resolve timer
///
/// Values are kept as raw JSON: the server may report timestamps as strings
/// or numbers (or `null` when nothing is pending), and only equality matters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveTimestamps {
    values: BTreeMap<ResolveEvent, Value>,
}

impl ResolveTimestamps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract timestamps from a `kingdom` payload's `next_resolve` field.
    ///
    /// A missing or non-object field yields an empty set; unknown categories
    /// are skipped.
    pub fn from_kingdom(kingdom: &Value) -> Self {
        let mut values = BTreeMap::new();
        if let Some(map) = kingdom.get("next_resolve").and_then(Value::as_object) {
            for (name, value) in map {
                match name.parse::<ResolveEvent>() {
                    Ok(event) => {
                        values.insert(event, value.clone());
                    }
                    Err(_) => debug!(name = %name, "Ignoring unknown resolve category"),
                }
            }
        }
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn get(&self, event: ResolveEvent) -> Option<&Value> {
        self.values.get(&event)
    }

    pub fn insert(&mut self, event: ResolveEvent, value: Value) {
        self.values.insert(event, value);
    }

    /// Events whose value differs between `self` (previous) and `next`.
    ///
    /// A category present on one side only counts as changed.
    pub fn changed_events(&self, next: &ResolveTimestamps) -> Vec<ResolveEvent> {
        ResolveEvent::ALL
            .iter()
            .copied()
            .filter(|event| self.values.get(event) != next.values.get(event))
            .collect()
    }

    /// Compare against a fresh observation.
    ///
    /// An empty previous set is a baseline: nothing is reported as changed.
    pub fn diff(&self, next: &ResolveTimestamps) -> ResolveDiff {
        if self.is_empty() {
            return ResolveDiff::default();
        }
        let changed = self.changed_events(next);
        let keys = dependents_of(changed.iter().copied());
        ResolveDiff { changed, keys }
    }
}

/// Outcome of comparing two resolve observations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveDiff {
    /// Categories whose timer value changed
    pub changed: Vec<ResolveEvent>,
    /// Union of the resources those categories invalidate
    pub keys: BTreeSet<ResourceKey>,
}

impl ResolveDiff {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settles_dependents() {
        assert_eq!(
            ResolveEvent::Settles.dependents(),
            &[ResourceKey::Settle, ResourceKey::Structures]
        );
    }

    #[test]
    fn test_every_event_has_dependents() {
        for event in ResolveEvent::ALL {
            assert!(!event.dependents().is_empty(), "{event} has no dependents");
        }
    }

    #[test]
    fn test_parse_spy_attempt() {
        assert_eq!(
            "spy_attempt".parse::<ResolveEvent>().unwrap(),
            ResolveEvent::SpyAttempt
        );
        assert!("spyattempt".parse::<ResolveEvent>().is_err());
    }

    #[test]
    fn test_from_kingdom_skips_unknown_categories() {
        let kingdom = json!({
            "name": "Aurora",
            "next_resolve": {
                "settles": "2026-10-19T10:00:00Z",
                "mobis": 1700000000,
                "dragons": "soon"
            }
        });
        let ts = ResolveTimestamps::from_kingdom(&kingdom);
        assert_eq!(ts.len(), 2);
        assert_eq!(
            ts.get(ResolveEvent::Settles),
            Some(&json!("2026-10-19T10:00:00Z"))
        );
        assert_eq!(ts.get(ResolveEvent::Mobis), Some(&json!(1700000000)));
    }

    #[test]
    fn test_from_kingdom_without_next_resolve() {
        assert!(ResolveTimestamps::from_kingdom(&json!({})).is_empty());
        assert!(ResolveTimestamps::from_kingdom(&json!({"next_resolve": 5})).is_empty());
    }

    #[test]
    fn test_diff_from_empty_is_baseline() {
        let prev = ResolveTimestamps::new();
        let next = ResolveTimestamps::from_kingdom(&json!({
            "next_resolve": {"settles": 1, "mobis": 1}
        }));
        assert!(prev.diff(&next).is_empty());
    }

    #[test]
    fn test_diff_reports_only_changed_categories() {
        let prev = ResolveTimestamps::from_kingdom(&json!({
            "next_resolve": {"settles": "t0", "mobis": "t0"}
        }));
        let next = ResolveTimestamps::from_kingdom(&json!({
            "next_resolve": {"settles": "t1", "mobis": "t0"}
        }));
        let diff = prev.diff(&next);
        assert_eq!(diff.changed, vec![ResolveEvent::Settles]);
        assert_eq!(
            diff.keys.into_iter().collect::<Vec<_>>(),
            vec![ResourceKey::Settle, ResourceKey::Structures]
        );
    }

    #[test]
    fn test_disappearing_category_counts_as_change() {
        let prev = ResolveTimestamps::from_kingdom(&json!({
            "next_resolve": {"missiles": 10, "shared": 3}
        }));
        let next = ResolveTimestamps::from_kingdom(&json!({
            "next_resolve": {"shared": 3}
        }));
        assert_eq!(prev.changed_events(&next), vec![ResolveEvent::Missiles]);
    }

    #[test]
    fn test_dependents_union_dedupes() {
        let keys = dependents_of([ResolveEvent::Generals, ResolveEvent::SpyAttempt]);
        let news = keys.iter().filter(|k| **k == ResourceKey::News).count();
        assert_eq!(news, 1);
        assert!(keys.contains(&ResourceKey::SpyHistory));
        assert!(keys.contains(&ResourceKey::Mobis));
    }
}
