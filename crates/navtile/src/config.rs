use navtile_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Startup configuration of the navigation tile cache.
///
/// Times are in seconds of the caller's clock, distances in world units.
/// Nothing here is mutated once the cache has been constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavTileConfig {
    /// Edge length of a square tile on the XZ plane
    pub tile_size: f32,
    /// Minimum time between rebuilds of a poked tile
    pub update_interval: f64,
    /// Idle time after which an unpoked tile is evicted
    pub tile_timeout: f64,
    /// Spacing of stitch samples along a tile edge
    pub stitch_sample_step: f32,
    /// Lowest point of the bake volume
    pub bake_floor: f32,
    /// Highest point of the bake volume; stitch probes start here
    pub bake_ceiling: f32,
    /// Physics layers fed to the surface baker
    pub bake_source_layers: u32,
    /// Layers counted as ground by stitch probes
    pub ground_layers: u32,
    /// Layers counted as a water surface by stitch probes
    pub water_layers: u32,
    /// Layers that block straight-line visibility during path cleanup
    pub obstacle_layers: u32,
    /// Traversal cost multiplier applied to stitch links
    pub link_cost: f32,
    /// Distance each link anchor sits from the shared edge
    pub link_edge_offset: f32,
    /// Escalating radii tried by an extended snap
    pub snap_radii: Vec<f32>,
    /// Radius of the diagnostic last-resort snap probes
    pub diagnostic_snap_radius: f32,
    /// How far below the terrain a path corner may sit before the path is invalid
    pub underground_margin: f32,
    /// Minimum number of links removed per drain call
    pub link_drain_floor: usize,
    /// The link drain batch is `max(floor, queue_len / divisor)`
    pub link_drain_divisor: usize,
    /// Data handles removed per drain call once the link queue is empty
    pub data_drain_batch: usize,
}

impl NavTileConfig {
    pub fn new(tile_size: f32, update_interval: f64, tile_timeout: f64) -> Self {
        NavTileConfig {
            tile_size,
            update_interval,
            tile_timeout,
            stitch_sample_step: 2.0,
            bake_floor: -256.0,
            bake_ceiling: 512.0,
            bake_source_layers: u32::MAX,
            ground_layers: 1 << 0,
            water_layers: 1 << 4,
            obstacle_layers: (1 << 0) | (1 << 1),
            link_cost: 4.0,
            link_edge_offset: 0.25,
            snap_radii: vec![1.0, 1.5, 3.0, 6.0, 12.0],
            diagnostic_snap_radius: 250.0,
            underground_margin: 1.0,
            link_drain_floor: 25,
            link_drain_divisor: 40,
            data_drain_batch: 1,
        }
    }

    pub fn with_stitch_sample_step(mut self, stitch_sample_step: f32) -> Self {
        self.stitch_sample_step = stitch_sample_step;
        self
    }

    pub fn with_bake_range(mut self, bake_floor: f32, bake_ceiling: f32) -> Self {
        self.bake_floor = bake_floor;
        self.bake_ceiling = bake_ceiling;
        self
    }

    pub fn with_layers(mut self, ground: u32, water: u32, obstacles: u32) -> Self {
        self.ground_layers = ground;
        self.water_layers = water;
        self.obstacle_layers = obstacles;
        self
    }

    pub fn with_link_cost(mut self, link_cost: f32) -> Self {
        self.link_cost = link_cost;
        self
    }

    pub fn with_snap_radii(mut self, snap_radii: Vec<f32>) -> Self {
        self.snap_radii = snap_radii;
        self
    }

    pub fn with_underground_margin(mut self, underground_margin: f32) -> Self {
        self.underground_margin = underground_margin;
        self
    }

    pub fn with_link_drain(mut self, floor: usize, divisor: usize) -> Self {
        self.link_drain_floor = floor;
        self.link_drain_divisor = divisor;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: NavTileConfig = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("cache config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Number of links removed by one drain call for a queue of `queue_len`
    pub fn link_drain_batch(&self, queue_len: usize) -> usize {
        self.link_drain_floor
            .max(queue_len / self.link_drain_divisor.max(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size <= 0.0 {
            return Err(Error::InvalidConfig(
                "Tile size must be positive".to_string(),
            ));
        }
        if self.update_interval < 0.0 {
            return Err(Error::InvalidConfig(
                "Update interval cannot be negative".to_string(),
            ));
        }
        if self.tile_timeout <= 0.0 {
            return Err(Error::InvalidConfig(
                "Tile timeout must be positive".to_string(),
            ));
        }
        if self.stitch_sample_step <= 0.0 || self.stitch_sample_step > self.tile_size {
            return Err(Error::InvalidConfig(
                "Stitch sample step must be in (0, tile_size]".to_string(),
            ));
        }
        if self.bake_floor >= self.bake_ceiling {
            return Err(Error::InvalidConfig(
                "Bake range invalid: floor must be below ceiling".to_string(),
            ));
        }
        if self.snap_radii.is_empty() || self.snap_radii.iter().any(|r| *r <= 0.0) {
            return Err(Error::InvalidConfig(
                "Snap radii must be a non-empty list of positive values".to_string(),
            ));
        }
        if self.link_drain_floor == 0 || self.data_drain_batch == 0 {
            return Err(Error::InvalidConfig(
                "Drain batches must remove at least one entry".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for NavTileConfig {
    fn default() -> Self {
        Self::new(32.0, 5.0, 30.0)
    }
}
