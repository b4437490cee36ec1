//! # OffKit Worker
//!
//! Offline cache manager for a single origin's static assets.
//!
//! The manager reacts to three lifecycle signals from its host — install,
//! activate, fetch-intercept — and performs cache population, stale-generation
//! garbage collection, and cache-first request interception.
//!
//! ## Architecture
//!
//! ```text
//! OfflineCacheManager
//!     ├── PrecacheManifest (generation, origin, asset paths)
//!     ├── NetworkBackend (HTTP or in-memory)
//!     ├── CacheStorage (generation-named stores)
//!     ├── ClientRegistry (controlled pages)
//!     └── KeepAlive (waitUntil-style extension accounting)
//! ```
//!
//! ## Lifecycle
//!
//! - `on_install`: precache every manifest asset into the current generation's
//!   store, all-or-nothing, then become eligible for immediate takeover.
//! - `on_activate`: delete every store from prior generations and claim all
//!   registered clients.
//! - `on_fetch`: serve GET requests cache-first; opportunistically store
//!   same-origin responses on a miss; pass everything else through.

pub mod clients;
pub mod keepalive;
pub mod manager;
pub mod manifest;
pub mod state;

pub use clients::{Client, ClientId, ClientRegistry};
pub use keepalive::{ExtendGuard, KeepAlive};
pub use manager::{FetchDecision, FetchStatsSnapshot, OfflineCacheManager};
pub use manifest::PrecacheManifest;
pub use state::WorkerState;
