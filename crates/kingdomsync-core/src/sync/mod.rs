//! Resource synchronization layer
//!
//! Keeps a local mirror of the game server's resources fresh.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Synchronizer (one per login session)                           │
//! │  ├── ResourceStore (values + loading flags)                     │
//! │  ├── AuthSession (bearer GET/POST, logout)                      │
//! │  ├── ResolveTimestamps (last seen kingdom.next_resolve)         │
//! │  └── broadcast::Sender<SyncEvent> (page notifications)          │
//! │                                                                 │
//! │  RefreshPipeline (per refresh)                                  │
//! │  └── fetches one key at a time, in selection order              │
//! │                                                                 │
//! │  Poller (fixed-delay timer)                                     │
//! │  └── calls Synchronizer::periodic_tick every interval           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let sync = Synchronizer::new(session);
//! sync.initial_load().await;
//!
//! let poller = Poller::new(sync.clone()).spawn();
//!
//! let mut events = sync.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if let Some(key) = event.key() {
//!         render(key, &sync.value(key));
//!     }
//! }
//!
//! sync.teardown();
//! poller.stop().await;
//! ```

pub mod events;
pub mod pipeline;
pub mod poller;
pub mod synchronizer;

pub use events::SyncEvent;
pub use pipeline::{RefreshPipeline, Step};
pub use poller::{Poller, PollerHandle};
pub use synchronizer::{side_effect, SideEffect, Synchronizer};
