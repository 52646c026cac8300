//! Links across shared tile edges
//!
//! Each tile owns its +X and +Y edges. Stitch points are sampled at a fixed
//! step along an edge by probing straight down for ground (and water, for
//! swimmers). A short bidirectional link is placed across the edge at every
//! stitch point. Links are only rebuilt when the sampled point list changes.

use crate::agent::{AgentProfile, AgentType};
use crate::backend::{LayerMask, LinkRequest, SpatialQuery, SurfaceBaker};
use crate::config::NavTileConfig;
use crate::evictor::RemovalQueues;
use crate::tile::{NavTile, StitchLink, TileEdge, TileKey};
use glam::Vec3;

/// Maximum number of stacked ground contacts probed per column
const MAX_LAYERS_PER_COLUMN: usize = 8;

/// Link churn caused by one restitch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StitchReport {
    pub edges_changed: usize,
    pub links_created: usize,
    pub links_queued: usize,
}

#[derive(Debug, Clone)]
pub struct LinkStitcher {
    tile_size: f32,
    sample_step: f32,
    probe_top: f32,
    probe_bottom: f32,
    ground_layers: LayerMask,
    water_layers: LayerMask,
    link_cost: f32,
    edge_offset: f32,
}

impl LinkStitcher {
    pub fn new(config: &NavTileConfig) -> Self {
        Self {
            tile_size: config.tile_size,
            sample_step: config.stitch_sample_step,
            probe_top: config.bake_ceiling,
            probe_bottom: config.bake_floor,
            ground_layers: config.ground_layers,
            water_layers: config.water_layers,
            link_cost: config.link_cost,
            edge_offset: config.link_edge_offset,
        }
    }

    /// Offsets along an edge at which columns are probed
    fn sample_offsets(&self) -> impl Iterator<Item = f32> + '_ {
        let count = (self.tile_size / self.sample_step).floor() as usize;
        (0..count)
            .map(|i| (i as f32 + 0.5) * self.sample_step)
            .filter(|t| *t < self.tile_size)
    }

    /// Stitch points for one edge, in sample order and top-down per column
    pub fn sample_edge<S: SpatialQuery + ?Sized>(
        &self,
        key: &TileKey,
        edge: TileEdge,
        profile: &AgentProfile,
        spatial: &S,
    ) -> Vec<Vec3> {
        let (start, dir) = edge.segment(key, self.tile_size);
        let mut points = Vec::new();

        for t in self.sample_offsets() {
            let column = start + dir * t;
            for height in self.probe_column(column.x, column.z, profile, spatial) {
                points.push(Vec3::new(column.x, height, column.z));
            }
        }

        points
    }

    /// Usable heights in one vertical column, highest first.
    ///
    /// Heights within one agent height of a higher kept height are dropped.
    fn probe_column<S: SpatialQuery + ?Sized>(
        &self,
        x: f32,
        z: f32,
        profile: &AgentProfile,
        spatial: &S,
    ) -> Vec<f32> {
        let mut heights = Vec::new();

        if profile.can_walk {
            let mut top = self.probe_top;
            for _ in 0..MAX_LAYERS_PER_COLUMN {
                if top <= self.probe_bottom {
                    break;
                }
                let origin = Vec3::new(x, top, z);
                let Some(hit) = spatial.raycast_down(origin, top - self.probe_bottom, self.ground_layers)
                else {
                    break;
                };
                if self.has_headroom(hit.point, profile, spatial) {
                    heights.push(hit.point.y);
                }
                top = hit.point.y - profile.height;
            }
        }

        let water = if profile.can_swim || profile.avoid_water {
            spatial
                .raycast_down(
                    Vec3::new(x, self.probe_top, z),
                    self.probe_top - self.probe_bottom,
                    self.water_layers,
                )
                .map(|hit| hit.point.y)
        } else {
            None
        };

        if let Some(surface) = water {
            if profile.avoid_water {
                heights.retain(|h| *h >= surface);
            }
            if profile.can_swim {
                heights.push(surface - profile.swim_depth_offset);
            }
        }

        heights.sort_by(|a, b| b.total_cmp(a));
        let mut kept: Vec<f32> = Vec::with_capacity(heights.len());
        for h in heights {
            if kept.last().map_or(true, |last| last - h > profile.height) {
                kept.push(h);
            }
        }
        kept
    }

    /// Check there is room for the agent's capsule above a ground contact
    fn has_headroom<S: SpatialQuery + ?Sized>(
        &self,
        ground: Vec3,
        profile: &AgentProfile,
        spatial: &S,
    ) -> bool {
        let clearance = profile.height - 2.0 * profile.radius;
        if clearance <= 0.0 {
            return true;
        }
        let origin = ground + Vec3::Y * (profile.radius + 0.01);
        spatial
            .sphere_cast(origin, profile.radius, Vec3::Y, clearance, self.ground_layers)
            .is_none()
    }

    /// Recomputes the links on both owned edges of a freshly built tile.
    ///
    /// An edge whose sampled points match the stored ones is left alone.
    /// Otherwise every existing link on that edge is queued for removal before
    /// new links are created.
    pub fn restitch<B>(
        &self,
        tile: &mut NavTile,
        profile: &AgentProfile,
        backend: &mut B,
        queues: &mut RemovalQueues,
    ) -> StitchReport
    where
        B: SpatialQuery + SurfaceBaker + ?Sized,
    {
        let mut report = StitchReport::default();

        for edge in TileEdge::ALL {
            let points = self.sample_edge(&tile.key, edge, profile, &*backend);
            if points == tile.stitch_points(edge) {
                continue;
            }

            let stale = tile.replace_links(edge, Vec::new());
            report.links_queued += stale.len();
            queues.queue_links(stale);

            let links: Vec<StitchLink> = points
                .iter()
                .map(|&anchor| self.create_link(anchor, edge, tile.key.agent, backend))
                .collect();
            report.links_created += links.len();
            report.edges_changed += 1;
            tile.replace_links(edge, links);
        }

        if report.edges_changed > 0 {
            log::debug!(
                "Restitched tile {}: {} edges changed, {} links created, {} queued for removal",
                tile.key,
                report.edges_changed,
                report.links_created,
                report.links_queued
            );
        }
        report
    }

    fn create_link<B: SurfaceBaker + ?Sized>(
        &self,
        anchor: Vec3,
        edge: TileEdge,
        agent: AgentType,
        baker: &mut B,
    ) -> StitchLink {
        let offset = edge.normal() * self.edge_offset;
        let request = LinkRequest {
            start: anchor - offset,
            end: anchor + offset,
            cost: self.link_cost,
            agent_id: agent.id(),
            bidirectional: true,
        };
        StitchLink {
            anchor,
            handle: baker.add_link(&request),
            bidirectional: request.bidirectional,
        }
    }
}
