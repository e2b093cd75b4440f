//! Notifications emitted by the synchronizer
//!
//! Pages that want to re-render as soon as a single resource lands subscribe
//! to these instead of polling snapshots.

use crate::resolve::ResolveEvent;
use crate::resource::ResourceKey;

/// Events emitted during synchronization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A refresh marked these keys as loading
    Loading {
        /// Keys in fetch order
        keys: Vec<ResourceKey>,
    },
    /// A fetch landed and the stored value was replaced
    Updated {
        /// The resource that changed
        key: ResourceKey,
    },
    /// A fetch failed; the previous value was kept
    FetchFailed {
        /// The resource whose fetch failed
        key: ResourceKey,
        /// Error message
        message: String,
    },
    /// A side effect passed to `refresh` failed
    SideEffectFailed {
        /// Position of the side effect in the list
        index: usize,
        /// Error message
        message: String,
    },
    /// Server resolve timers changed and dependent resources are refreshing
    ResolveFired {
        /// Categories whose timer changed
        events: Vec<ResolveEvent>,
        /// Resources being refreshed as a result
        keys: Vec<ResourceKey>,
    },
    /// Every resource was loaded once; periodic ticks are now live
    InitialLoadComplete,
    /// The session ended and the store no longer accepts writes
    SessionEnded {
        /// Why the session ended
        reason: String,
    },
}

impl SyncEvent {
    /// Get the resource key associated with this event, if any
    pub fn key(&self) -> Option<ResourceKey> {
        match self {
            SyncEvent::Updated { key } => Some(*key),
            SyncEvent::FetchFailed { key, .. } => Some(*key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_event_key() {
        let event = SyncEvent::Updated {
            key: ResourceKey::Missiles,
        };
        assert_eq!(event.key(), Some(ResourceKey::Missiles));

        let event = SyncEvent::FetchFailed {
            key: ResourceKey::News,
            message: "connection reset".to_string(),
        };
        assert_eq!(event.key(), Some(ResourceKey::News));

        assert_eq!(SyncEvent::InitialLoadComplete.key(), None);
    }
}
