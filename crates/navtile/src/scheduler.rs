//! Single-flight rebuild scheduling
//!
//! At most one bake is outstanding at any time. While it runs the scheduler
//! only polls it; once it lands the result is installed into the owning tile
//! and the tile's edges are restitched. With nothing in flight the stalest
//! poked tile is selected and handed to the surface baker.

use crate::agent::AgentProfileRegistry;
use crate::backend::{BuildHandle, BuildParams, BuildPoll, BuildRequest, NavBackend};
use crate::config::NavTileConfig;
use crate::evictor::RemovalQueues;
use crate::stitcher::{LinkStitcher, StitchReport};
use crate::tile::{TileKey, TileState};
use crate::tile_store::TileStore;
use web_time::Instant;

/// What one scheduler tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulerEvent {
    /// Nothing in flight and no tile qualified
    Idle,
    /// A bake was started for this tile
    Dispatched(TileKey),
    /// The outstanding bake has not finished yet
    Waiting(TileKey),
    /// The bake finished and was installed
    Installed(TileKey, StitchReport),
    /// The bake finished but its tile was evicted in the meantime
    Discarded(TileKey),
}

#[derive(Debug)]
struct InFlightBuild {
    key: TileKey,
    generation: u64,
    handle: BuildHandle,
    started: Instant,
}

#[derive(Debug)]
pub struct BuildScheduler {
    update_interval: f64,
    in_flight: Option<InFlightBuild>,
    builds_installed: u64,
    builds_discarded: u64,
}

impl BuildScheduler {
    pub fn new(update_interval: f64) -> Self {
        Self {
            update_interval,
            in_flight: None,
            builds_installed: 0,
            builds_discarded: 0,
        }
    }

    /// Tile whose bake is outstanding, if any
    pub fn in_flight(&self) -> Option<TileKey> {
        self.in_flight.as_ref().map(|b| b.key)
    }

    pub fn builds_installed(&self) -> u64 {
        self.builds_installed
    }

    pub fn builds_discarded(&self) -> u64 {
        self.builds_discarded
    }

    /// Picks the tile with the largest `poke_time - build_time`.
    ///
    /// A tile qualifies once more than the update interval has passed since
    /// its last build and it has been poked after that build. A poke in the
    /// same tick as the install does not count. Tiles without data always
    /// count as poked. Ties keep the first tile found.
    pub fn select_stale(
        &self,
        now: f64,
        store: &TileStore,
        registry: &AgentProfileRegistry,
    ) -> Option<TileKey> {
        let mut best: Option<(TileKey, f64)> = None;

        for tile in store.iter() {
            if tile.state == TileState::Building {
                continue;
            }
            if now - tile.build_time <= self.update_interval {
                continue;
            }
            if tile.is_built() && tile.poke_time <= tile.build_time {
                continue;
            }
            if registry.get(tile.key.agent).is_err() {
                continue;
            }

            let staleness = tile.staleness();
            if best.map_or(true, |(_, s)| staleness > s) {
                best = Some((tile.key, staleness));
            }
        }

        best.map(|(key, _)| key)
    }

    /// Advances the scheduler by one step.
    #[allow(clippy::too_many_arguments)]
    pub fn tick<B: NavBackend>(
        &mut self,
        now: f64,
        store: &mut TileStore,
        registry: &AgentProfileRegistry,
        config: &NavTileConfig,
        backend: &mut B,
        stitcher: &LinkStitcher,
        queues: &mut RemovalQueues,
    ) -> SchedulerEvent {
        match self.in_flight.take() {
            Some(build) => self.poll(build, now, store, registry, backend, stitcher, queues),
            None => match self.select_stale(now, store, registry) {
                Some(key) => self.dispatch(key, store, registry, config, backend),
                None => SchedulerEvent::Idle,
            },
        }
    }

    fn dispatch<B: NavBackend>(
        &mut self,
        key: TileKey,
        store: &mut TileStore,
        registry: &AgentProfileRegistry,
        config: &NavTileConfig,
        backend: &mut B,
    ) -> SchedulerEvent {
        let (Some(tile), Ok(profile)) = (store.get_mut(&key), registry.get(key.agent)) else {
            return SchedulerEvent::Idle;
        };

        let request = BuildRequest {
            key,
            bounds: key.bake_bounds(config.tile_size, config.bake_floor, config.bake_ceiling),
            params: BuildParams::from_profile(key.agent, profile),
            source_layers: config.bake_source_layers,
        };
        let handle = backend.start_build(&request);
        tile.state = TileState::Building;

        log::debug!(
            "Dispatched bake {:?} for tile {} (staleness {:.2}s)",
            handle,
            key,
            tile.staleness()
        );

        self.in_flight = Some(InFlightBuild {
            key,
            generation: tile.generation,
            handle,
            started: Instant::now(),
        });
        SchedulerEvent::Dispatched(key)
    }

    #[allow(clippy::too_many_arguments)]
    fn poll<B: NavBackend>(
        &mut self,
        build: InFlightBuild,
        now: f64,
        store: &mut TileStore,
        registry: &AgentProfileRegistry,
        backend: &mut B,
        stitcher: &LinkStitcher,
        queues: &mut RemovalQueues,
    ) -> SchedulerEvent {
        let data = match backend.poll_build(build.handle) {
            BuildPoll::Pending => {
                let key = build.key;
                self.in_flight = Some(build);
                return SchedulerEvent::Waiting(key);
            }
            BuildPoll::Ready(data) => data,
        };

        let tile = store
            .get_mut(&build.key)
            .filter(|tile| tile.generation == build.generation);
        let Some(tile) = tile else {
            // The tile was evicted while baking; drop the result instead of
            // resurrecting the entry.
            queues.queue_data(data);
            self.builds_discarded += 1;
            log::debug!(
                "Discarded bake {:?} for evicted tile {}",
                build.handle,
                build.key
            );
            return SchedulerEvent::Discarded(build.key);
        };

        if let Some(previous) = tile.data.replace(data) {
            queues.queue_data(previous);
        }
        tile.build_time = now;
        tile.state = TileState::Built;
        tile.build_count += 1;
        self.builds_installed += 1;

        log::debug!(
            "Installed tile {} (build #{}) in {:?}",
            build.key,
            tile.build_count,
            build.started.elapsed()
        );

        let report = match registry.get(build.key.agent) {
            Ok(profile) => stitcher.restitch(tile, profile, backend, queues),
            Err(_) => StitchReport::default(),
        };
        SchedulerEvent::Installed(build.key, report)
    }
}
