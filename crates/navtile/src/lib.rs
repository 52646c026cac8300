//! Dynamic Navigation Tile Cache
//!
//! This crate keeps a lazily built, tile-based navigation surface around the
//! places a game is actually querying. Tiles are created on demand, rebuilt
//! one at a time in order of staleness, stitched to their neighbours with
//! short links, and evicted once nothing has asked about them for a while.

// Allow unused code in tests - test code often has intentionally unused variables
#![cfg_attr(test, allow(unused))]
//!
//! # Features
//!
//! - **Single-Flight Rebuilds**: At most one bake is outstanding; the stalest poked tile goes next
//! - **Edge Stitching**: Multi-level ground and water contacts linked across tile edges
//! - **Bounded Teardown**: Link and data removal spread over ticks, links before data
//! - **Path Cleanup**: String-pulling plus corner rounding against blocking geometry
//! - **Backend Agnostic**: Physics, baking and path queries are traits supplied by the caller
//!
//! # Example
//!
//! ```rust,ignore
//! use navtile::{AgentProfileRegistry, AgentType, NavTileCache, NavTileConfig, PathResult};
//! use glam::Vec3;
//!
//! let mut cache = NavTileCache::new(
//!     NavTileConfig::default(),
//!     AgentProfileRegistry::with_defaults(),
//!     my_backend,
//! )?;
//!
//! let mut now = 0.0;
//! loop {
//!     cache.tick(now);
//!     match cache.find_path(Vec3::ZERO, Vec3::new(40.0, 0.0, 12.0), AgentType::Humanoid)? {
//!         PathResult::NotReady => now += 0.1,
//!         PathResult::Complete(points) | PathResult::Partial(points) => break,
//!     }
//! }
//! ```

pub mod agent;
pub mod backend;
pub mod config;
pub mod evictor;
pub mod funnel;
pub mod nav_tile_cache;
pub mod query;
pub mod scheduler;
pub mod stitcher;
pub mod tile;
pub mod tile_store;

#[cfg(test)]
mod nav_tile_cache_tests;
#[cfg(test)]
mod test_helpers;

pub use agent::{AgentProfile, AgentProfileRegistry, AgentType, AreaMask};
pub use config::NavTileConfig;
pub use nav_tile_cache::{NavTileCache, NavTileCacheStatistics, TickReport};
pub use query::{PathRequest, PathResult, SnappedPoint};
pub use scheduler::SchedulerEvent;
pub use tile::{NavTile, TileEdge, TileKey, TileState};

// Re-export backend interfaces
pub use backend::{
    BuildHandle, BuildParams, BuildPoll, BuildRequest, CorridorStatus, LayerMask, LinkHandle,
    LinkRequest, NavBackend, NavDataHandle, NavQuery, NavSample, RawCorridor, RaycastHit,
    SpatialQuery, SurfaceBaker, TerrainOracle,
};

pub use navtile_common::{Error, Result};
