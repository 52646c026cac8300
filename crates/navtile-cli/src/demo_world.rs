//! In-process world the CLI runs the cache against
//!
//! Geometry is a handful of boxes: a ground slab, a raised plateau, a wall
//! with a gap and a pond. Bakes run as tokio tasks that sleep for a fixed
//! delay and then signal completion over a oneshot channel.

use glam::Vec3;
use navtile::{
    AreaMask, BuildHandle, BuildPoll, BuildRequest, CorridorStatus, LayerMask, LinkHandle,
    LinkRequest, NavDataHandle, NavQuery, NavSample, RawCorridor, RaycastHit, SpatialQuery,
    SurfaceBaker, TerrainOracle,
};
use navtile_common::{distance_xz, Aabb, Error, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

pub const GROUND_LAYER: LayerMask = 1 << 0;
pub const WALL_LAYER: LayerMask = 1 << 1;
pub const WATER_LAYER: LayerMask = 1 << 4;

/// Clearance kept between detour corners and the wall they go around
const DETOUR_MARGIN: f32 = 1.0;

struct Pond {
    bounds: Aabb,
    level: f32,
}

struct PendingBake {
    data: NavDataHandle,
    bounds: Aabb,
    done: oneshot::Receiver<()>,
}

pub struct DemoWorld {
    floors: Vec<Aabb>,
    walls: Vec<Aabb>,
    pond: Pond,
    runtime: Handle,
    bake_delay: Duration,
    pending: HashMap<BuildHandle, PendingBake>,
    /// Footprints of the installed navigation data
    installed: HashMap<NavDataHandle, Aabb>,
    links: HashMap<LinkHandle, LinkRequest>,
    next_id: u64,
}

impl DemoWorld {
    pub fn new(runtime: Handle, bake_delay: Duration) -> Self {
        Self {
            floors: vec![
                Aabb::new(Vec3::new(-512.0, -2.0, -512.0), Vec3::new(512.0, 0.0, 512.0)),
                // Plateau
                Aabb::new(Vec3::new(40.0, 0.0, 40.0), Vec3::new(72.0, 3.0, 72.0)),
                // Pond bed
                Aabb::new(Vec3::new(-60.0, -4.0, 10.0), Vec3::new(-20.0, -3.0, 50.0)),
            ],
            walls: vec![
                Aabb::new(Vec3::new(20.0, 0.0, -40.0), Vec3::new(22.0, 6.0, 8.0)),
                Aabb::new(Vec3::new(20.0, 0.0, 14.0), Vec3::new(22.0, 6.0, 60.0)),
            ],
            pond: Pond {
                bounds: Aabb::new(Vec3::new(-60.0, -4.0, 10.0), Vec3::new(-20.0, 0.0, 50.0)),
                level: -0.5,
            },
            runtime,
            bake_delay,
            pending: HashMap::new(),
            installed: HashMap::new(),
            links: HashMap::new(),
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn installed_count(&self) -> usize {
        self.installed.len()
    }

    fn is_baked(&self, point: Vec3) -> bool {
        self.installed.values().any(|b| b.contains_xz(point))
    }

    fn in_pond(&self, point: Vec3) -> bool {
        self.pond.bounds.contains_xz(point)
    }

    fn boxes(&self, layers: LayerMask) -> impl Iterator<Item = &Aabb> {
        let floors = (layers & GROUND_LAYER != 0).then_some(self.floors.iter());
        let walls = (layers & WALL_LAYER != 0).then_some(self.walls.iter());
        floors.into_iter().flatten().chain(walls.into_iter().flatten())
    }

    fn walls_blocking(&self, a: Vec3, b: Vec3) -> Option<&Aabb> {
        self.walls
            .iter()
            .filter_map(|w| w.intersect_segment(a, b).map(|t| (w, t)))
            .min_by(|x, y| x.1.total_cmp(&y.1))
            .map(|(w, _)| w)
    }

    /// Corners of a wall footprint pushed out by the detour margin
    fn detour_corners(wall: &Aabb, y: f32) -> [Vec3; 4] {
        let (min, max) = (wall.min - DETOUR_MARGIN, wall.max + DETOUR_MARGIN);
        [
            Vec3::new(min.x, y, min.z),
            Vec3::new(max.x, y, min.z),
            Vec3::new(max.x, y, max.z),
            Vec3::new(min.x, y, max.z),
        ]
    }

    fn clear(&self, a: Vec3, b: Vec3) -> bool {
        self.walls_blocking(a, b).is_none()
    }
}

impl SpatialQuery for DemoWorld {
    fn raycast_down(&self, origin: Vec3, max_distance: f32, layers: LayerMask) -> Option<RaycastHit> {
        let mut surfaces: Vec<f32> = self
            .boxes(layers)
            .filter(|b| b.contains_xz(origin))
            .map(|b| b.max.y)
            .collect();
        if layers & WATER_LAYER != 0 && self.in_pond(origin) {
            surfaces.push(self.pond.level);
        }

        surfaces
            .into_iter()
            .filter(|h| *h <= origin.y && origin.y - *h <= max_distance)
            .max_by(|a, b| a.total_cmp(b))
            .map(|h| RaycastHit {
                point: Vec3::new(origin.x, h, origin.z),
                normal: Vec3::Y,
                distance: origin.y - h,
            })
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
                Aabb::new(b.min - Vec3::splat(radius), b.max + Vec3::splat(radius))
                    .intersect_segment(origin, end)
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

impl SurfaceBaker for DemoWorld {
    fn start_build(&mut self, request: &BuildRequest) -> BuildHandle {
        let handle = BuildHandle(self.next_id());
        let data = NavDataHandle(self.next_id());
        let (tx, rx) = oneshot::channel();

        let delay = self.bake_delay;
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(());
        });

        self.pending.insert(
            handle,
            PendingBake {
                data,
                bounds: request.bounds,
                done: rx,
            },
        );
        handle
    }

    fn poll_build(&mut self, handle: BuildHandle) -> BuildPoll {
        let Some(bake) = self.pending.get_mut(&handle) else {
            log::warn!("Polled unknown bake {:?}", handle);
            return BuildPoll::Pending;
        };
        match bake.done.try_recv() {
            Ok(()) => {}
            Err(TryRecvError::Empty) => return BuildPoll::Pending,
            Err(TryRecvError::Closed) => {
                log::warn!("Bake task {:?} went away without finishing", handle);
                return BuildPoll::Pending;
            }
        }

        match self.pending.remove(&handle) {
            Some(bake) => {
                self.installed.insert(bake.data, bake.bounds);
                BuildPoll::Ready(bake.data)
            }
            None => BuildPoll::Pending,
        }
    }

    fn add_link(&mut self, link: &LinkRequest) -> LinkHandle {
        let handle = LinkHandle(self.next_id());
        self.links.insert(handle, *link);
        handle
    }

    fn remove_link(&mut self, handle: LinkHandle) -> Result<()> {
        self.links
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| Error::Backend(format!("unknown link {handle:?}")))
    }

    fn remove_data(&mut self, handle: NavDataHandle) -> Result<()> {
        self.installed
            .remove(&handle)
            .map(|_| ())
            .ok_or_else(|| Error::Backend(format!("unknown nav data {handle:?}")))
    }
}

impl NavQuery for DemoWorld {
    fn sample_position(
        &self,
        point: Vec3,
        radius: f32,
        areas: AreaMask,
        _agent_id: u32,
    ) -> Option<NavSample> {
        if !self.is_baked(point) {
            return None;
        }

        let (surface, area) = if self.in_pond(point) {
            (self.pond.level, AreaMask::WATER)
        } else {
            let hit = self.raycast_down(point + Vec3::Y * radius, radius * 2.0, GROUND_LAYER)?;
            (hit.point.y, AreaMask::WALKABLE)
        };
        if !areas.intersects(area) {
            return None;
        }

        let position = Vec3::new(point.x, surface, point.z);
        let distance = position.distance(point);
        (distance <= radius).then_some(NavSample {
            position,
            distance,
            area,
        })
    }

    fn calculate_path(&self, from: Vec3, to: Vec3, _areas: AreaMask, _agent_id: u32) -> RawCorridor {
        if !self.is_baked(from) {
            return RawCorridor::invalid();
        }
        if !self.is_baked(to) {
            return RawCorridor {
                status: CorridorStatus::Partial,
                corners: vec![from],
            };
        }

        let Some(wall) = self.walls_blocking(from, to) else {
            return RawCorridor {
                status: CorridorStatus::Complete,
                corners: vec![from, to],
            };
        };

        let y = (from.y + to.y) * 0.5;
        let corners = Self::detour_corners(wall, y);
        let single = corners
            .iter()
            .filter(|c| self.clear(from, **c) && self.clear(**c, to))
            .min_by(|a, b| {
                let la = distance_xz(&from, a) + distance_xz(a, &to);
                let lb = distance_xz(&from, b) + distance_xz(b, &to);
                la.total_cmp(&lb)
            });
        if let Some(corner) = single {
            return RawCorridor {
                status: CorridorStatus::Complete,
                corners: vec![from, *corner, to],
            };
        }

        for i in 0..corners.len() {
            for step in [1, corners.len() - 1] {
                let (a, b) = (corners[i], corners[(i + step) % corners.len()]);
                if self.clear(from, a) && self.clear(a, b) && self.clear(b, to) {
                    return RawCorridor {
                        status: CorridorStatus::Complete,
                        corners: vec![from, a, b, to],
                    };
                }
            }
        }

        RawCorridor {
            status: CorridorStatus::Partial,
            corners: vec![from],
        }
    }
}

impl TerrainOracle for DemoWorld {
    fn ground_height_at(&self, point: Vec3) -> Option<f32> {
        self.raycast_down(Vec3::new(point.x, 1024.0, point.z), 2048.0, GROUND_LAYER)
            .map(|hit| hit.point.y)
    }
}
