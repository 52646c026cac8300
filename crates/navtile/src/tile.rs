//! Navigation tiles
//!
//! A tile covers one square cell of the XZ grid for one agent type. It owns the
//! handle of its baked navigation data and the links stitched across its +X
//! and +Y edges.

use crate::agent::AgentType;
use crate::backend::{LinkHandle, NavDataHandle};
use glam::Vec3;
use navtile_common::Aabb;
use std::fmt;

/// Grid cell plus agent type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileKey {
    pub x: i32,
    pub y: i32,
    pub agent: AgentType,
}

impl TileKey {
    pub fn new(x: i32, y: i32, agent: AgentType) -> Self {
        Self { x, y, agent }
    }

    /// Key of the tile containing `pos` (floor division of X and Z)
    pub fn for_position(pos: Vec3, tile_size: f32, agent: AgentType) -> Self {
        Self {
            x: (pos.x / tile_size).floor() as i32,
            y: (pos.z / tile_size).floor() as i32,
            agent,
        }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.agent)
    }

    /// This key and its eight grid neighbours, row by row
    pub fn neighborhood(&self) -> impl Iterator<Item = TileKey> + '_ {
        (-1..=1).flat_map(move |dy| (-1..=1).map(move |dx| self.offset(dx, dy)))
    }

    /// World-space minimum corner of the tile on the XZ plane
    pub fn origin(&self, tile_size: f32) -> Vec3 {
        Vec3::new(self.x as f32 * tile_size, 0.0, self.y as f32 * tile_size)
    }

    pub fn center(&self, tile_size: f32) -> Vec3 {
        self.origin(tile_size) + Vec3::new(tile_size * 0.5, 0.0, tile_size * 0.5)
    }

    /// Tile footprint extruded over the full bake height range
    pub fn bake_bounds(&self, tile_size: f32, floor: f32, ceiling: f32) -> Aabb {
        let origin = self.origin(tile_size);
        Aabb::new(
            Vec3::new(origin.x, floor, origin.z),
            Vec3::new(origin.x + tile_size, ceiling, origin.z + tile_size),
        )
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.agent)
    }
}

/// Lifecycle state of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// No data has ever been installed
    Unbuilt,
    /// Selected by the scheduler, bake outstanding
    Building,
    /// Data installed
    Built,
}

/// The two edges a tile owns; the -X and -Y edges belong to its neighbours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileEdge {
    /// Shared with the tile at x + 1
    PositiveX,
    /// Shared with the tile at y + 1
    PositiveY,
}

impl TileEdge {
    pub const ALL: [TileEdge; 2] = [TileEdge::PositiveX, TileEdge::PositiveY];

    fn index(self) -> usize {
        match self {
            TileEdge::PositiveX => 0,
            TileEdge::PositiveY => 1,
        }
    }

    /// Unit normal pointing from the tile into the neighbour
    pub fn normal(self) -> Vec3 {
        match self {
            TileEdge::PositiveX => Vec3::X,
            TileEdge::PositiveY => Vec3::Z,
        }
    }

    /// Start point of the edge and the unit direction it runs along
    pub fn segment(self, key: &TileKey, tile_size: f32) -> (Vec3, Vec3) {
        let origin = key.origin(tile_size);
        match self {
            TileEdge::PositiveX => (origin + Vec3::new(tile_size, 0.0, 0.0), Vec3::Z),
            TileEdge::PositiveY => (origin + Vec3::new(0.0, 0.0, tile_size), Vec3::X),
        }
    }
}

/// A link bridging a shared edge at one stitch point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StitchLink {
    /// Stitch point on the edge
    pub anchor: Vec3,
    pub handle: LinkHandle,
    pub bidirectional: bool,
}

/// One cached navigation tile
#[derive(Debug, Clone)]
pub struct NavTile {
    pub key: TileKey,
    /// Distinguishes this tile from earlier tiles evicted under the same key
    pub generation: u64,
    pub center: Vec3,
    pub state: TileState,
    pub data: Option<NavDataHandle>,
    edges: [Vec<StitchLink>; 2],
    /// Last time anything asked about this tile
    pub poke_time: f64,
    /// Last successful install; creation time until the first build lands
    pub build_time: f64,
    pub build_count: u32,
}

impl NavTile {
    pub fn new(key: TileKey, generation: u64, tile_size: f32, now: f64) -> Self {
        Self {
            key,
            generation,
            center: key.center(tile_size),
            state: TileState::Unbuilt,
            data: None,
            edges: [Vec::new(), Vec::new()],
            poke_time: now,
            build_time: now,
            build_count: 0,
        }
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.data.is_some()
    }

    /// How long the tile has been asked about since its last build
    #[inline]
    pub fn staleness(&self) -> f64 {
        self.poke_time - self.build_time
    }

    pub fn links(&self, edge: TileEdge) -> &[StitchLink] {
        &self.edges[edge.index()]
    }

    /// Stitch points currently linked on an edge, in sample order
    pub fn stitch_points(&self, edge: TileEdge) -> Vec<Vec3> {
        self.edges[edge.index()].iter().map(|l| l.anchor).collect()
    }

    pub fn link_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum()
    }

    pub(crate) fn replace_links(&mut self, edge: TileEdge, links: Vec<StitchLink>) -> Vec<StitchLink> {
        std::mem::replace(&mut self.edges[edge.index()], links)
    }

    /// Removes every link from both edges
    pub(crate) fn take_all_links(&mut self) -> Vec<StitchLink> {
        let mut links = std::mem::take(&mut self.edges[0]);
        links.append(&mut self.edges[1]);
        links
    }
}
