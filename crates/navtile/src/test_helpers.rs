//! Scripted backend used by the unit tests
//!
//! `StubWorld` implements every backend trait over a tiny scene: an optional
//! infinite ground plane, box floors on the ground layer, box walls on the
//! obstacle layer and an optional infinite water plane. Bakes, links and
//! snaps are recorded so tests can assert on call order.

use crate::agent::AreaMask;
use crate::backend::{
    BuildHandle, BuildPoll, BuildRequest, CorridorStatus, LayerMask, LinkHandle, LinkRequest,
    NavDataHandle, NavQuery, NavSample, RawCorridor, RaycastHit, SpatialQuery, SurfaceBaker,
    TerrainOracle,
};
use glam::Vec3;
use navtile_common::{Aabb, Error, Result};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

pub const GROUND_LAYER: LayerMask = 1 << 0;
pub const WALL_LAYER: LayerMask = 1 << 1;
pub const WATER_LAYER: LayerMask = 1 << 4;

pub struct StubWorld {
    /// Height of the infinite ground plane, `None` for a bottomless world
    pub ground_height: Option<f32>,
    pub water_level: Option<f32>,
    /// Boxes on the ground layer; downward rays hit their top face
    pub floors: Vec<Aabb>,
    /// Boxes on the obstacle layer
    pub walls: Vec<Aabb>,

    /// Number of `Pending` polls before a bake reports ready
    pub bake_polls: u32,
    /// Never finish any bake
    pub hold_bakes: bool,
    pub started: Vec<BuildRequest>,
    pending: HashMap<BuildHandle, u32>,
    next_handle: u64,

    pub added_links: Vec<LinkRequest>,
    pub live_links: HashSet<LinkHandle>,
    pub removed_links: Vec<LinkHandle>,
    pub removed_data: Vec<NavDataHandle>,
    pub fail_removals: bool,

    /// Samples with a smaller radius than this miss
    pub snap_min_radius: Option<f32>,
    /// Area of every navigable surface in the world
    pub surface_area: AreaMask,
    /// Radius and area mask of every `sample_position` call
    pub sample_log: RefCell<Vec<(f32, AreaMask)>>,

    /// Corridor returned by `calculate_path`; a straight complete path if unset
    pub corridor: Option<RawCorridor>,
    pub path_log: RefCell<Vec<(Vec3, Vec3)>>,

    /// Overrides the ground plane for `ground_height_at`
    pub terrain_height: Option<f32>,
}

impl StubWorld {
    /// Open ground at y = 0 and nothing else
    pub fn flat() -> Self {
        Self {
            ground_height: Some(0.0),
            water_level: None,
            floors: Vec::new(),
            walls: Vec::new(),
            bake_polls: 0,
            hold_bakes: false,
            started: Vec::new(),
            pending: HashMap::new(),
            next_handle: 1,
            added_links: Vec::new(),
            live_links: HashSet::new(),
            removed_links: Vec::new(),
            removed_data: Vec::new(),
            fail_removals: false,
            snap_min_radius: None,
            surface_area: AreaMask::WALKABLE,
            sample_log: RefCell::new(Vec::new()),
            corridor: None,
            path_log: RefCell::new(Vec::new()),
            terrain_height: None,
        }
    }

    pub fn outstanding_bakes(&self) -> usize {
        self.pending.len()
    }

    pub fn sampled_radii(&self) -> Vec<f32> {
        self.sample_log.borrow().iter().map(|(r, _)| *r).collect()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle += 1;
        id
    }

    fn boxes(&self, layers: LayerMask) -> impl Iterator<Item = &Aabb> {
        let floors = (layers & GROUND_LAYER != 0).then_some(self.floors.iter());
        let walls = (layers & WALL_LAYER != 0).then_some(self.walls.iter());
        floors.into_iter().flatten().chain(walls.into_iter().flatten())
    }
}

fn down_hit(origin: Vec3, surface: f32) -> RaycastHit {
    RaycastHit {
        point: Vec3::new(origin.x, surface, origin.z),
        normal: Vec3::Y,
        distance: origin.y - surface,
    }
}

impl SpatialQuery for StubWorld {
    fn raycast_down(&self, origin: Vec3, max_distance: f32, layers: LayerMask) -> Option<RaycastHit> {
        let mut surfaces = Vec::new();
        if layers & GROUND_LAYER != 0 {
            surfaces.extend(self.ground_height);
            surfaces.extend(
                self.floors
                    .iter()
                    .filter(|f| f.contains_xz(origin))
                    .map(|f| f.max.y),
            );
        }
        if layers & WATER_LAYER != 0 {
            surfaces.extend(self.water_level);
        }

        surfaces
            .into_iter()
            .filter(|h| *h <= origin.y && origin.y - *h <= max_distance)
            .max_by(|a, b| a.total_cmp(b))
            .map(|h| down_hit(origin, h))
    }

    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        layers: LayerMask,
    ) -> Option<RaycastHit> {
        let end = origin + direction * max_distance;
        self.boxes(layers)
            .filter_map(|b| {
                let grown = Aabb::new(b.min - Vec3::splat(radius), b.max + Vec3::splat(radius));
                grown.intersect_segment(origin, end)
            })
            .min_by(|a, b| a.total_cmp(b))
            .map(|t| RaycastHit {
                point: origin + direction * (t * max_distance),
                normal: -direction,
                distance: t * max_distance,
            })
    }

    fn visibility_blocked(&self, a: Vec3, b: Vec3, layers: LayerMask) -> bool {
        self.boxes(layers)
            .any(|bounds| bounds.intersect_segment(a, b).is_some())
    }
}

impl SurfaceBaker for StubWorld {
    fn start_build(&mut self, request: &BuildRequest) -> BuildHandle {
        let handle = BuildHandle(self.next_id());
        self.pending.insert(handle, self.bake_polls);
        self.started.push(request.clone());
        handle
    }

    fn poll_build(&mut self, handle: BuildHandle) -> BuildPoll {
        if self.hold_bakes {
            return BuildPoll::Pending;
        }
        match self.pending.get_mut(&handle) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                BuildPoll::Pending
            }
            Some(_) => {
                self.pending.remove(&handle);
                BuildPoll::Ready(NavDataHandle(self.next_id()))
            }
            None => panic!("polled unknown or finished bake {handle:?}"),
        }
    }

    fn add_link(&mut self, link: &LinkRequest) -> LinkHandle {
        let handle = LinkHandle(self.next_id());
        self.added_links.push(*link);
        self.live_links.insert(handle);
        handle
    }

    fn remove_link(&mut self, handle: LinkHandle) -> Result<()> {
        if self.fail_removals {
            return Err(Error::Backend("link removal refused".to_string()));
        }
        self.live_links.remove(&handle);
        self.removed_links.push(handle);
        Ok(())
    }

    fn remove_data(&mut self, handle: NavDataHandle) -> Result<()> {
        if self.fail_removals {
            return Err(Error::Backend("data removal refused".to_string()));
        }
        self.removed_data.push(handle);
        Ok(())
    }
}

impl NavQuery for StubWorld {
    fn sample_position(
        &self,
        point: Vec3,
        radius: f32,
        areas: AreaMask,
        _agent_id: u32,
    ) -> Option<NavSample> {
        self.sample_log.borrow_mut().push((radius, areas));

        if self.snap_min_radius.is_some_and(|min| radius < min) {
            return None;
        }
        if !areas.intersects(self.surface_area) {
            return None;
        }
        let ground = self.ground_height?;
        Some(NavSample {
            position: Vec3::new(point.x, ground, point.z),
            distance: (point.y - ground).abs(),
            area: self.surface_area,
        })
    }

    fn calculate_path(&self, from: Vec3, to: Vec3, _areas: AreaMask, _agent_id: u32) -> RawCorridor {
        self.path_log.borrow_mut().push((from, to));
        self.corridor.clone().unwrap_or(RawCorridor {
            status: CorridorStatus::Complete,
            corners: vec![from, to],
        })
    }
}

impl TerrainOracle for StubWorld {
    fn ground_height_at(&self, _point: Vec3) -> Option<f32> {
        self.terrain_height.or(self.ground_height)
    }
}
