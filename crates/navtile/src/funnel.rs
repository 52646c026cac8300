//! Corridor cleanup
//!
//! Raw corridors from the navigation backend hug every polygon corner. Cleanup
//! first string-pulls the corridor, keeping from each anchor the furthest
//! corner still in straight-line view. Each interior corner of the result then
//! gets up to two cut points, a third of the way back along the incoming
//! segment and a third of the way along the outgoing one. A cut point is kept
//! only if it is visible from both of its neighbours and hidden from every
//! earlier corner, so cleaning a cleaned path returns it unchanged.

use crate::agent::AgentProfile;
use crate::backend::{LayerMask, SpatialQuery};
use glam::Vec3;
use navtile_common::cut_toward;

const CUT_FRACTION: f32 = 1.0 / 3.0;

/// Straight-line visibility between path points at agent mid-height
pub struct VisibilityTest<'a, S: SpatialQuery + ?Sized> {
    spatial: &'a S,
    layers: LayerMask,
    lift: Vec3,
}

impl<'a, S: SpatialQuery + ?Sized> VisibilityTest<'a, S> {
    pub fn new(spatial: &'a S, layers: LayerMask, profile: &AgentProfile) -> Self {
        Self {
            spatial,
            layers,
            lift: Vec3::Y * (profile.height * 0.5),
        }
    }

    #[inline]
    pub fn visible(&self, a: Vec3, b: Vec3) -> bool {
        !self
            .spatial
            .visibility_blocked(a + self.lift, b + self.lift, self.layers)
    }
}

/// Greedy string-pulling pass.
///
/// From the current anchor the furthest corner in straight-line view becomes
/// the next anchor, even past corners that are blocked. When nothing beyond
/// the next corner is visible that corner is taken so the pass makes progress
/// through blocked corridors.
pub fn string_pull<S: SpatialQuery + ?Sized>(
    corners: &[Vec3],
    visibility: &VisibilityTest<'_, S>,
) -> Vec<Vec3> {
    if corners.len() <= 2 {
        return corners.to_vec();
    }

    let mut reduced = vec![corners[0]];
    let mut anchor = 0;
    while anchor < corners.len() - 1 {
        let furthest = (anchor + 2..corners.len())
            .rev()
            .find(|&candidate| visibility.visible(corners[anchor], corners[candidate]))
            .unwrap_or(anchor + 1);
        reduced.push(corners[furthest]);
        anchor = furthest;
    }

    reduced
}

/// Adds cut points around each interior corner of a reduced path.
///
/// Cut points only go on segments whose ends see each other. A cut on segment
/// `i` must not be visible from any corner before `reduced[i]`, otherwise
/// string-pulling the output would skip the corner in between.
pub fn round_corners<S: SpatialQuery + ?Sized>(
    reduced: &[Vec3],
    visibility: &VisibilityTest<'_, S>,
) -> Vec<Vec3> {
    if reduced.len() <= 2 {
        return reduced.to_vec();
    }

    let segment_clear: Vec<bool> = reduced
        .windows(2)
        .map(|w| visibility.visible(w[0], w[1]))
        .collect();
    let hidden_from_earlier = |cut: Vec3, segment: usize| {
        reduced[..segment]
            .iter()
            .all(|earlier| !visibility.visible(*earlier, cut))
    };

    let mut out = Vec::with_capacity(reduced.len() * 3);
    out.push(reduced[0]);

    for (i, window) in reduced.windows(3).enumerate() {
        let (prev, corner, next) = (window[0], window[1], window[2]);

        let incoming = cut_toward(&corner, &prev, CUT_FRACTION);
        if segment_clear[i]
            && visibility.visible(prev, incoming)
            && visibility.visible(incoming, corner)
            && hidden_from_earlier(incoming, i)
        {
            out.push(incoming);
        }

        out.push(corner);

        let outgoing = cut_toward(&corner, &next, CUT_FRACTION);
        if segment_clear[i + 1]
            && visibility.visible(corner, outgoing)
            && visibility.visible(outgoing, next)
            && hidden_from_earlier(outgoing, i + 1)
        {
            out.push(outgoing);
        }
    }

    if let Some(last) = reduced.last() {
        out.push(*last);
    }
    out
}

/// String-pulls a raw corridor and rounds its corners
pub fn clean_path<S: SpatialQuery + ?Sized>(
    corners: &[Vec3],
    profile: &AgentProfile,
    spatial: &S,
    obstacle_layers: LayerMask,
) -> Vec<Vec3> {
    let visibility = VisibilityTest::new(spatial, obstacle_layers, profile);
    let reduced = string_pull(corners, &visibility);
    round_corners(&reduced, &visibility)
}
