//! Property-based tests for selections and the resolve dependency table
//!
//! Uses proptest to check invariants that must hold for any input.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use serde_json::{json, Value};

use kingdomsync_core::{dependents_of, ResolveEvent, ResolveTimestamps, ResourceKey, Selection};

// ============================================================================
// Strategy Generators
// ============================================================================

fn key_strategy() -> impl Strategy<Value = ResourceKey> {
    prop::sample::select(ResourceKey::ALL.to_vec())
}

fn event_strategy() -> impl Strategy<Value = ResolveEvent> {
    prop::sample::select(ResolveEvent::ALL.to_vec())
}

/// A `next_resolve` observation: some categories with small timer values
fn timers_strategy() -> impl Strategy<Value = BTreeMap<ResolveEvent, u8>> {
    prop::collection::btree_map(event_strategy(), 0u8..4, 0..=ResolveEvent::ALL.len())
}

fn kingdom_payload(timers: &BTreeMap<ResolveEvent, u8>) -> Value {
    let next_resolve: serde_json::Map<String, Value> = timers
        .iter()
        .map(|(event, value)| (event.as_str().to_string(), json!(value)))
        .collect();
    json!({ "next_resolve": next_resolve })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Resolving a selection keeps first occurrences in order and drops repeats
    #[test]
    fn selection_dedupes_in_order(keys in prop::collection::vec(key_strategy(), 0..60)) {
        let resolved = Selection::from(keys.clone()).resolve();

        let unique: BTreeSet<_> = keys.iter().copied().collect();
        prop_assert_eq!(resolved.len(), unique.len());

        let mut expected = Vec::new();
        for key in keys {
            if !expected.contains(&key) {
                expected.push(key);
            }
        }
        prop_assert_eq!(resolved, expected);
    }

    /// The dependency union is exactly the union of each event's entry
    #[test]
    fn dependents_union(events in prop::collection::vec(event_strategy(), 0..12)) {
        let union = dependents_of(events.iter().copied());
        for event in &events {
            for key in event.dependents() {
                prop_assert!(union.contains(key));
            }
        }
        for key in &union {
            prop_assert!(events.iter().any(|e| e.dependents().contains(key)));
        }
    }

    /// The tick refreshes only what the changed categories map to
    #[test]
    fn diff_matches_changed_categories(
        previous in timers_strategy().prop_filter("baseline", |t| !t.is_empty()),
        next in timers_strategy(),
    ) {
        let prev_ts = ResolveTimestamps::from_kingdom(&kingdom_payload(&previous));
        let next_ts = ResolveTimestamps::from_kingdom(&kingdom_payload(&next));
        let diff = prev_ts.diff(&next_ts);

        let changed: Vec<ResolveEvent> = ResolveEvent::ALL
            .iter()
            .copied()
            .filter(|e| previous.get(e) != next.get(e))
            .collect();
        prop_assert_eq!(&diff.changed, &changed);
        prop_assert_eq!(diff.keys, dependents_of(changed));
    }

    /// An empty previous observation never triggers a refresh
    #[test]
    fn first_observation_is_baseline(next in timers_strategy()) {
        let next_ts = ResolveTimestamps::from_kingdom(&kingdom_payload(&next));
        prop_assert!(ResolveTimestamps::new().diff(&next_ts).is_empty());
    }

    /// Key names parse back case-insensitively
    #[test]
    fn key_names_parse(key in key_strategy(), upper in any::<bool>()) {
        let name = if upper { key.as_str().to_uppercase() } else { key.as_str().to_string() };
        prop_assert_eq!(name.parse::<ResourceKey>().unwrap(), key);
    }
}
