//! Kingdoms Sync Core Library
//!
//! Client-side resource synchronizer for a browser strategy game.
//!
//! ## Overview
//!
//! The game server exposes one JSON endpoint per resource (kingdom,
//! structures, news, ...). This crate keeps a local mirror of all of them,
//! tracks a loading flag per resource, and refreshes only what the server's
//! resolve timers say has changed.
//!
//! ## Core Principles
//!
//! - **One writer**: only the `Synchronizer` writes into the store
//! - **Ordered refreshes**: side effects first, then fetches in key order
//! - **Targeted polling**: a cheap `kingdom` poll decides what else to fetch
//! - **Session-scoped**: logout tears the store down; late results are dropped
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use kingdomsync_core::{HttpSession, Poller, ResourceKey, Synchronizer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Arc::new(HttpSession::new("https://game.example", "token")?);
//!     let sync = Synchronizer::new(session);
//!
//!     sync.initial_load().await;
//!     println!("{}", sync.value(ResourceKey::Kingdom));
//!
//!     let poller = Poller::new(sync.clone()).spawn();
//!     tokio::signal::ctrl_c().await?;
//!     sync.teardown();
//!     poller.stop().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod resolve;
pub mod resource;
pub mod session;
pub mod store;
pub mod sync;

// Re-exports
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use resolve::{dependents_of, ResolveDiff, ResolveEvent, ResolveTimestamps};
pub use resource::{ResourceKey, Selection};
pub use session::{AuthSession, HttpSession, MemorySession, SessionState};
pub use store::{ResourceStore, StoreSnapshot};
pub use sync::{side_effect, Poller, PollerHandle, SideEffect, SyncEvent, Synchronizer};
