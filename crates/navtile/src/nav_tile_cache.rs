//! Navigation tile cache
//!
//! `NavTileCache` is the composition root: it owns the tile store, the build
//! scheduler, the link stitcher, the evictor with its removal queues, and the
//! backend they all drive. Callers advance it with [`NavTileCache::tick`] and
//! query it through the methods in the `query` module.

use crate::agent::{AgentProfileRegistry, AgentType};
use crate::backend::NavBackend;
use crate::config::NavTileConfig;
use crate::evictor::{DrainReport, Evictor, RemovalQueues};
use crate::scheduler::{BuildScheduler, SchedulerEvent};
use crate::stitcher::LinkStitcher;
use crate::tile::{TileKey, TileState};
use crate::tile_store::TileStore;
use glam::Vec3;
use navtile_common::Result;

/// What one call to [`NavTileCache::tick`] did, in execution order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub evicted: Option<TileKey>,
    pub scheduler: SchedulerEvent,
    pub drained: DrainReport,
}

pub struct NavTileCache<B: NavBackend> {
    pub(crate) config: NavTileConfig,
    pub(crate) registry: AgentProfileRegistry,
    pub(crate) store: TileStore,
    scheduler: BuildScheduler,
    stitcher: LinkStitcher,
    evictor: Evictor,
    queues: RemovalQueues,
    pub(crate) backend: B,
    /// Time passed to the latest tick
    pub(crate) now: f64,
}

impl<B: NavBackend> NavTileCache<B> {
    /// Create a cache over `backend`. The configuration and every registered
    /// profile are validated up front.
    pub fn new(config: NavTileConfig, registry: AgentProfileRegistry, backend: B) -> Result<Self> {
        config.validate()?;
        for agent in registry.agent_types() {
            registry.get(agent)?.validate()?;
        }

        log::info!(
            "Navigation tile cache ready: tile size {}, update interval {}s, timeout {}s, {} agent profiles",
            config.tile_size,
            config.update_interval,
            config.tile_timeout,
            registry.len()
        );

        Ok(Self {
            store: TileStore::new(config.tile_size),
            scheduler: BuildScheduler::new(config.update_interval),
            stitcher: LinkStitcher::new(&config),
            evictor: Evictor::new(config.tile_timeout),
            queues: RemovalQueues::new(),
            config,
            registry,
            backend,
            now: 0.0,
        })
    }

    /// Advances the cache to `now`.
    ///
    /// Eviction runs first so a tile removed this tick can't be picked for a
    /// rebuild in the same tick; the removal queues drain last.
    pub fn tick(&mut self, now: f64) -> TickReport {
        self.now = now;

        let evicted = self.evictor.tick(now, &mut self.store, &mut self.queues);
        let scheduler = self.scheduler.tick(
            now,
            &mut self.store,
            &self.registry,
            &self.config,
            &mut self.backend,
            &self.stitcher,
            &mut self.queues,
        );
        let drained = self.queues.drain(&mut self.backend, &self.config);

        TickReport {
            evicted,
            scheduler,
            drained,
        }
    }

    /// Keeps the tile under `position` and its neighbours alive and eligible
    /// for rebuilds
    pub fn poke(&mut self, position: Vec3, agent: AgentType) -> Result<TileKey> {
        self.registry.get(agent)?;
        let key = self.store.tile_coord_for(position, agent);
        self.store.poke(key, self.now);
        Ok(key)
    }

    pub fn tile_coord_for(&self, position: Vec3, agent: AgentType) -> TileKey {
        self.store.tile_coord_for(position, agent)
    }

    pub fn tile_state(&self, key: &TileKey) -> Option<TileState> {
        self.store.get(key).map(|tile| tile.state)
    }

    /// Get statistics about the cache
    pub fn statistics(&self) -> NavTileCacheStatistics {
        let mut stats = NavTileCacheStatistics {
            total_tiles: self.store.len(),
            unbuilt_tiles: 0,
            building_tiles: 0,
            built_tiles: 0,
            stitch_links: 0,
            queued_link_removals: self.queues.link_len(),
            queued_data_removals: self.queues.data_len(),
            in_flight: self.scheduler.in_flight(),
            builds_installed: self.scheduler.builds_installed(),
            builds_discarded: self.scheduler.builds_discarded(),
            tiles_evicted: self.evictor.evicted_total(),
        };

        for tile in self.store.iter() {
            match tile.state {
                TileState::Unbuilt => stats.unbuilt_tiles += 1,
                TileState::Building => stats.building_tiles += 1,
                TileState::Built => stats.built_tiles += 1,
            }
            stats.stitch_links += tile.link_count();
        }
        stats
    }

    pub fn config(&self) -> &NavTileConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentProfileRegistry {
        &self.registry
    }

    pub fn store(&self) -> &TileStore {
        &self.store
    }

    pub fn queues(&self) -> &RemovalQueues {
        &self.queues
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Time of the latest tick
    pub fn now(&self) -> f64 {
        self.now
    }
}

/// Statistics about the navigation tile cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavTileCacheStatistics {
    pub total_tiles: usize,
    pub unbuilt_tiles: usize,
    pub building_tiles: usize,
    pub built_tiles: usize,
    /// Live links across all tile edges
    pub stitch_links: usize,
    pub queued_link_removals: usize,
    pub queued_data_removals: usize,
    /// Tile whose bake is outstanding
    pub in_flight: Option<TileKey>,
    pub builds_installed: u64,
    pub builds_discarded: u64,
    pub tiles_evicted: u64,
}
