//! Session-scoped resource store
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  ResourceStore                                                  │
//! │  ├── slots: HashMap<ResourceKey, Slot>                          │
//! │  │   ├── value: Arc<Value>      (placeholder until first load)  │
//! │  │   ├── in_flight: u32         (fetches currently pending)     │
//! │  │   └── completed: bool        (at least one fetch landed)     │
//! │  ├── generation: u64            (bumped on teardown)            │
//! │  └── closed: bool               (no writes after teardown)      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write carries the generation the caller observed when it started.
//! Once the store is closed (logout) the generation moves on and late
//! completions from in-flight refreshes are dropped instead of landing in a
//! session that no longer exists.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::resource::ResourceKey;

#[derive(Debug, Clone)]
struct Slot {
    value: Arc<Value>,
    in_flight: u32,
    completed: bool,
}

impl Slot {
    fn new(key: ResourceKey) -> Self {
        Self {
            value: Arc::new(key.placeholder()),
            in_flight: 0,
            completed: false,
        }
    }

    fn is_loading(&self) -> bool {
        self.in_flight > 0 || !self.completed
    }
}

#[derive(Debug)]
struct StoreState {
    slots: HashMap<ResourceKey, Slot>,
    generation: u64,
    closed: bool,
}

/// Local mirror of every server resource plus its loading flag
#[derive(Debug)]
pub struct ResourceStore {
    state: RwLock<StoreState>,
}

impl ResourceStore {
    /// Create a store with every key at its placeholder and loading.
    pub fn new() -> Self {
        let slots = ResourceKey::ALL
            .iter()
            .map(|key| (*key, Slot::new(*key)))
            .collect();
        Self {
            state: RwLock::new(StoreState {
                slots,
                generation: 0,
                closed: false,
            }),
        }
    }

    /// Current generation; writes tagged with an older one are ignored.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Whether the store still accepts writes
    pub fn is_open(&self) -> bool {
        !self.state.read().closed
    }

    /// Whether a write tagged with `generation` would still be accepted
    pub fn accepts(&self, generation: u64) -> bool {
        let state = self.state.read();
        !state.closed && state.generation == generation
    }

    /// Last stored value for `key`
    pub fn value(&self, key: ResourceKey) -> Arc<Value> {
        let state = self.state.read();
        state
            .slots
            .get(&key)
            .map(|slot| slot.value.clone())
            .unwrap_or_else(|| Arc::new(key.placeholder()))
    }

    /// Whether `key` has a fetch pending or has never loaded
    pub fn is_loading(&self, key: ResourceKey) -> bool {
        let state = self.state.read();
        state.slots.get(&key).map(Slot::is_loading).unwrap_or(true)
    }

    /// Mark every key in `keys` as loading.
    ///
    /// Returns `false` (and changes nothing) if the generation is stale.
    pub fn begin(&self, generation: u64, keys: &[ResourceKey]) -> bool {
        let mut state = self.state.write();
        if state.closed || state.generation != generation {
            return false;
        }
        for key in keys {
            if let Some(slot) = state.slots.get_mut(key) {
                slot.in_flight += 1;
            }
        }
        true
    }

    /// Land the result of one fetch.
    ///
    /// `Some(value)` replaces the stored value; `None` keeps the previous one.
    /// Either way one pending fetch for `key` is retired. Returns `false` if
    /// the generation is stale and nothing was written.
    pub fn complete(&self, generation: u64, key: ResourceKey, value: Option<Value>) -> bool {
        let mut state = self.state.write();
        if state.closed || state.generation != generation {
            return false;
        }
        if let Some(slot) = state.slots.get_mut(&key) {
            if let Some(value) = value {
                slot.value = Arc::new(value);
            }
            slot.in_flight = slot.in_flight.saturating_sub(1);
            slot.completed = true;
        }
        true
    }

    /// Tear the store down: bump the generation and refuse further writes.
    ///
    /// Readers keep seeing the last values. Returns the new generation, or
    /// `None` if the store was already closed.
    pub fn close(&self) -> Option<u64> {
        let mut state = self.state.write();
        if state.closed {
            return None;
        }
        state.generation += 1;
        state.closed = true;
        Some(state.generation)
    }

    /// Consistent copy of every value and flag at one instant
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        let mut values = BTreeMap::new();
        let mut loading = BTreeMap::new();
        for (key, slot) in &state.slots {
            values.insert(*key, slot.value.clone());
            loading.insert(*key, slot.is_loading());
        }
        StoreSnapshot {
            generation: state.generation,
            values,
            loading,
        }
    }
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the store handed to consumers
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    /// Store generation the snapshot was taken at
    pub generation: u64,
    values: BTreeMap<ResourceKey, Arc<Value>>,
    loading: BTreeMap<ResourceKey, bool>,
}

impl StoreSnapshot {
    pub fn value(&self, key: ResourceKey) -> Option<&Value> {
        self.values.get(&key).map(|v| v.as_ref())
    }

    pub fn is_loading(&self, key: ResourceKey) -> bool {
        self.loading.get(&key).copied().unwrap_or(true)
    }

    /// Keys still loading, in key order
    pub fn loading_keys(&self) -> Vec<ResourceKey> {
        self.loading
            .iter()
            .filter(|(_, loading)| **loading)
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn values(&self) -> impl Iterator<Item = (ResourceKey, &Value)> {
        self.values.iter().map(|(key, value)| (*key, value.as_ref()))
    }

    /// Every value as one JSON object keyed by wire name
    pub fn to_json(&self) -> Value {
        let map = self
            .values
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value.as_ref().clone()))
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_store_is_all_loading_placeholders() {
        let store = ResourceStore::new();
        let snap = store.snapshot();
        for key in ResourceKey::ALL {
            assert!(snap.is_loading(key));
            assert_eq!(snap.value(key), Some(&key.placeholder()));
        }
        assert_eq!(snap.loading_keys().len(), ResourceKey::ALL.len());
    }

    #[test]
    fn test_complete_replaces_value_and_clears_flag() {
        let store = ResourceStore::new();
        let gen = store.generation();
        assert!(store.begin(gen, &[ResourceKey::Kingdom]));
        assert!(store.complete(gen, ResourceKey::Kingdom, Some(json!({"land": 100}))));

        assert!(!store.is_loading(ResourceKey::Kingdom));
        assert_eq!(*store.value(ResourceKey::Kingdom), json!({"land": 100}));
    }

    #[test]
    fn test_failed_completion_keeps_previous_value() {
        let store = ResourceStore::new();
        let gen = store.generation();
        store.begin(gen, &[ResourceKey::News]);
        store.complete(gen, ResourceKey::News, Some(json!(["first"])));

        store.begin(gen, &[ResourceKey::News]);
        assert!(store.is_loading(ResourceKey::News));
        store.complete(gen, ResourceKey::News, None);

        assert!(!store.is_loading(ResourceKey::News));
        assert_eq!(*store.value(ResourceKey::News), json!(["first"]));
    }

    #[test]
    fn test_overlapping_fetches_keep_flag_until_last_lands() {
        let store = ResourceStore::new();
        let gen = store.generation();
        store.begin(gen, &[ResourceKey::Settle]);
        store.begin(gen, &[ResourceKey::Settle]);

        store.complete(gen, ResourceKey::Settle, Some(json!({"a": 1})));
        assert!(store.is_loading(ResourceKey::Settle));

        store.complete(gen, ResourceKey::Settle, Some(json!({"a": 2})));
        assert!(!store.is_loading(ResourceKey::Settle));
        assert_eq!(*store.value(ResourceKey::Settle), json!({"a": 2}));
    }

    #[test]
    fn test_close_rejects_stale_writes() {
        let store = ResourceStore::new();
        let gen = store.generation();
        store.begin(gen, &[ResourceKey::Kingdom]);

        let next = store.close().unwrap();
        assert_eq!(next, gen + 1);
        assert!(store.close().is_none());
        assert!(!store.is_open());
        assert!(!store.accepts(gen));
        assert!(!store.accepts(next));

        assert!(!store.complete(gen, ResourceKey::Kingdom, Some(json!({"late": true}))));
        assert_eq!(*store.value(ResourceKey::Kingdom), json!({}));
        assert!(!store.begin(next, &[ResourceKey::Kingdom]));
    }

    #[test]
    fn test_snapshot_to_json_uses_wire_names() {
        let store = ResourceStore::new();
        let gen = store.generation();
        store.begin(gen, &[ResourceKey::GalaxyPolitics]);
        store.complete(gen, ResourceKey::GalaxyPolitics, Some(json!({"votes": 3})));

        let json = store.snapshot().to_json();
        assert_eq!(json["galaxypolitics"], json!({"votes": 3}));
        assert_eq!(json["news"], json!([]));
    }

    #[test]
    fn test_snapshot_values_cover_every_key() {
        let store = ResourceStore::new();
        let gen = store.generation();
        store.begin(gen, &[ResourceKey::Kingdom]);
        store.complete(gen, ResourceKey::Kingdom, Some(json!({"land": 250})));

        let snap = store.snapshot();
        let values: BTreeMap<ResourceKey, &Value> = snap.values().collect();
        assert_eq!(values.len(), ResourceKey::ALL.len());
        assert_eq!(values[&ResourceKey::Kingdom], &json!({"land": 250}));
        assert_eq!(values[&ResourceKey::News], &ResourceKey::News.placeholder());
    }
}
