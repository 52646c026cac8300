//! Snapping and path queries
//!
//! Every query pokes the tiles it touches, so a miss on an unbuilt tile
//! schedules the work that makes the same query succeed a few ticks later.

use crate::agent::{AgentProfile, AgentType, AreaMask};
use crate::backend::{CorridorStatus, NavBackend, NavSample};
use crate::funnel;
use crate::nav_tile_cache::NavTileCache;
use glam::Vec3;
use navtile_common::{Error, Result};

/// A query point moved onto the navigation surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnappedPoint {
    pub position: Vec3,
    /// Distance between the query point and `position`
    pub distance: f32,
    /// Search radius that produced the hit
    pub radius: f32,
    pub area: AreaMask,
}

impl SnappedPoint {
    fn from_sample(sample: NavSample, radius: f32) -> Self {
        Self {
            position: sample.position,
            distance: sample.distance,
            radius,
            area: sample.area,
        }
    }
}

/// Outcome of a path query that did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum PathResult {
    /// The corridor reaches the destination
    Complete(Vec<Vec3>),
    /// The corridor stops short of the destination
    Partial(Vec<Vec3>),
    /// An endpoint tile has no navigation data yet; retry on a later tick
    NotReady,
}

impl PathResult {
    pub fn points(&self) -> Option<&[Vec3]> {
        match self {
            PathResult::Complete(points) | PathResult::Partial(points) => Some(points),
            PathResult::NotReady => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        !matches!(self, PathResult::NotReady)
    }
}

/// Parameters of a path query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathRequest {
    pub from: Vec3,
    pub to: Vec3,
    pub agent: AgentType,
    /// Reject corridors that stop short of the destination
    pub require_full_path: bool,
    /// The caller already follows a path toward this destination. The
    /// destination snap then uses only the smallest radius.
    pub has_prior_path: bool,
}

impl PathRequest {
    pub fn new(from: Vec3, to: Vec3, agent: AgentType) -> Self {
        Self {
            from,
            to,
            agent,
            require_full_path: false,
            has_prior_path: false,
        }
    }

    pub fn with_require_full_path(mut self, require_full_path: bool) -> Self {
        self.require_full_path = require_full_path;
        self
    }

    pub fn with_prior_path(mut self, has_prior_path: bool) -> Self {
        self.has_prior_path = has_prior_path;
        self
    }
}

impl<B: NavBackend> NavTileCache<B> {
    /// Moves `point` onto the navigation surface for `agent`.
    ///
    /// Returns `Ok(None)` while the owning tile has no navigation data yet;
    /// the poke schedules it. A point below the terrain is lifted to ground
    /// level first. Without
    /// `extended_search` only the smallest snap radius is tried; with it the
    /// whole radius ladder is walked in order, followed by two wide probes
    /// that log a warning. The first uses the agent's own areas and its hit
    /// is returned. The second ignores the area mask and only reports whether
    /// anything navigable exists nearby.
    pub fn snap(
        &mut self,
        point: Vec3,
        agent: AgentType,
        extended_search: bool,
    ) -> Result<Option<SnappedPoint>> {
        let areas = self.registry.get(agent)?.area_mask;
        let key = self.store.tile_coord_for(point, agent);
        self.store.poke(key, self.now);
        if !self.store.get(&key).is_some_and(|tile| tile.is_built()) {
            log::trace!("Snap for {} at {:?} waits on tile {}", agent, point, key);
            return Ok(None);
        }

        let mut probe = point;
        if let Some(ground) = self.backend.ground_height_at(point) {
            if probe.y < ground {
                probe.y = ground;
            }
        }

        let radii = if extended_search {
            &self.config.snap_radii[..]
        } else {
            &self.config.snap_radii[..1]
        };
        for &radius in radii {
            if let Some(sample) = self.backend.sample_position(probe, radius, areas, agent.id()) {
                return Ok(Some(SnappedPoint::from_sample(sample, radius)));
            }
        }

        if !extended_search {
            return Err(Error::SnapFailed);
        }

        let radius = self.config.diagnostic_snap_radius;
        if let Some(sample) = self.backend.sample_position(probe, radius, areas, agent.id()) {
            log::warn!(
                "Snap for {} at {:?} only succeeded at radius {} ({:.1} away); check the tile height range",
                agent,
                point,
                radius,
                sample.distance
            );
            return Ok(Some(SnappedPoint::from_sample(sample, radius)));
        }

        match self
            .backend
            .sample_position(probe, radius, AreaMask::ALL, agent.id())
        {
            Some(sample) => log::warn!(
                "Snap for {} at {:?} found only area {:?} outside the agent's mask {:?}",
                agent,
                point,
                sample.area,
                areas
            ),
            None => log::warn!(
                "Snap for {} at {:?} found no navigation surface within {}",
                agent,
                point,
                radius
            ),
        }
        Err(Error::SnapFailed)
    }

    /// Shorthand for [`NavTileCache::find_path_with`] without options
    pub fn find_path(&mut self, from: Vec3, to: Vec3, agent: AgentType) -> Result<PathResult> {
        self.find_path_with(PathRequest::new(from, to, agent))
    }

    /// Computes a cleaned path between two points.
    ///
    /// Returns `NotReady` while either endpoint tile is unbuilt. A partial
    /// corridor whose first or last corner lies under the terrain is
    /// `PathInvalid`; other partial corridors fail only when the request
    /// requires a full path.
    pub fn find_path_with(&mut self, request: PathRequest) -> Result<PathResult> {
        let agent = request.agent;
        let profile = self.registry.get(agent)?.clone();

        let from_key = self.store.tile_coord_for(request.from, agent);
        let to_key = self.store.tile_coord_for(request.to, agent);
        self.store.poke(from_key, self.now);
        self.store.poke(to_key, self.now);

        let ready = [from_key, to_key]
            .iter()
            .all(|key| self.store.get(key).is_some_and(|tile| tile.is_built()));
        if !ready {
            log::trace!("Path {} -> {} not ready", from_key, to_key);
            return Ok(PathResult::NotReady);
        }

        let Some(start) = self.snap(request.from, agent, true)? else {
            return Ok(PathResult::NotReady);
        };
        let Some(end) = self.snap(request.to, agent, !request.has_prior_path)? else {
            return Ok(PathResult::NotReady);
        };

        let corridor = self.backend.calculate_path(
            start.position,
            end.position,
            profile.area_mask,
            agent.id(),
        );
        if corridor.status == CorridorStatus::Invalid || corridor.corners.is_empty() {
            return Err(Error::PathInvalid);
        }

        if corridor.status == CorridorStatus::Partial {
            if self.ends_underground(&corridor.corners) {
                log::debug!("Partial path {} -> {} ends under the terrain", from_key, to_key);
                return Err(Error::PathInvalid);
            }
            if request.require_full_path {
                return Err(Error::PathPartialRejected);
            }
        }

        let points = self.clean_path(&corridor.corners, &profile);
        Ok(match corridor.status {
            CorridorStatus::Partial => PathResult::Partial(points),
            _ => PathResult::Complete(points),
        })
    }

    /// Only the first and last corners are checked
    fn ends_underground(&self, corners: &[Vec3]) -> bool {
        let margin = self.config.underground_margin;
        [corners.first(), corners.last()]
            .into_iter()
            .flatten()
            .any(|corner| {
                self.backend
                    .ground_height_at(*corner)
                    .is_some_and(|ground| corner.y < ground - margin)
            })
    }

    /// String-pulls a raw corridor and rounds its corners against the
    /// obstacle layers
    pub fn clean_path(&self, corners: &[Vec3], profile: &AgentProfile) -> Vec<Vec3> {
        funnel::clean_path(corners, profile, &self.backend, self.config.obstacle_layers)
    }
}
