//! Interfaces to the collaborators the cache drives but does not implement
//!
//! The surface baker turns world geometry into opaque navigation data and owns
//! the link primitive. The spatial query backend answers raycasts against the
//! physics world. The navigation query backend samples and paths over whatever
//! data is currently installed, and the terrain oracle reports ground height.

use crate::agent::{AgentProfile, AgentType, AreaMask};
use crate::tile::TileKey;
use glam::Vec3;
use navtile_common::{Aabb, Result};

/// Physics layer bit set
pub type LayerMask = u32;

/// Handle to a bake job started by the surface baker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuildHandle(pub u64);

/// Handle to installed navigation data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NavDataHandle(pub u64);

/// Handle to a link created in the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkHandle(pub u64);

/// Agent parameters handed to the baker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildParams {
    pub agent_id: u32,
    pub height: f32,
    pub radius: f32,
    pub max_climb: f32,
    pub max_slope: f32,
}

impl BuildParams {
    pub fn from_profile(agent: AgentType, profile: &AgentProfile) -> Self {
        Self {
            agent_id: agent.id(),
            height: profile.height,
            radius: profile.radius,
            max_climb: profile.max_climb,
            max_slope: profile.max_slope,
        }
    }
}

/// Everything the baker needs to build one tile
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    pub key: TileKey,
    pub bounds: Aabb,
    pub params: BuildParams,
    pub source_layers: LayerMask,
}

/// Result of polling an outstanding bake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPoll {
    Pending,
    /// The bake finished and its data has been installed under this handle
    Ready(NavDataHandle),
}

/// A connector between two surface points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkRequest {
    pub start: Vec3,
    pub end: Vec3,
    pub cost: f32,
    pub agent_id: u32,
    pub bidirectional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// Nearest navigable point reported by the navigation backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavSample {
    pub position: Vec3,
    pub distance: f32,
    pub area: AreaMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorridorStatus {
    Complete,
    Partial,
    Invalid,
}

/// Unsmoothed corner list produced by the navigation backend
#[derive(Debug, Clone, PartialEq)]
pub struct RawCorridor {
    pub status: CorridorStatus,
    pub corners: Vec<Vec3>,
}

impl RawCorridor {
    pub fn invalid() -> Self {
        Self {
            status: CorridorStatus::Invalid,
            corners: Vec::new(),
        }
    }
}

pub trait SpatialQuery {
    /// Casts a ray straight down from `origin`
    fn raycast_down(&self, origin: Vec3, max_distance: f32, layers: LayerMask) -> Option<RaycastHit>;

    /// Sweeps a sphere along `direction`
    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Option<RaycastHit>;

    /// Returns true if the straight line between `a` and `b` is blocked
    fn visibility_blocked(&self, a: Vec3, b: Vec3, layers: LayerMask) -> bool;
}

pub trait SurfaceBaker {
    fn start_build(&mut self, request: &BuildRequest) -> BuildHandle;

    /// Polls a bake. Once it reports `Ready` the handle must not be polled again.
    fn poll_build(&mut self, handle: BuildHandle) -> BuildPoll;

    fn add_link(&mut self, link: &LinkRequest) -> LinkHandle;

    fn remove_link(&mut self, handle: LinkHandle) -> Result<()>;

    fn remove_data(&mut self, handle: NavDataHandle) -> Result<()>;
}

pub trait NavQuery {
    fn sample_position(
        &self,
        point: Vec3,
        radius: f32,
        areas: AreaMask,
        agent_id: u32,
    ) -> Option<NavSample>;

    fn calculate_path(&self, from: Vec3, to: Vec3, areas: AreaMask, agent_id: u32) -> RawCorridor;
}

pub trait TerrainOracle {
    fn ground_height_at(&self, point: Vec3) -> Option<f32>;
}

/// Everything the cache needs from the outside world
pub trait NavBackend: SpatialQuery + SurfaceBaker + NavQuery + TerrainOracle {}

impl<T> NavBackend for T where T: SpatialQuery + SurfaceBaker + NavQuery + TerrainOracle {}
