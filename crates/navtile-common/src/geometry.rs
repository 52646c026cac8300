//! Axis-aligned bounds used for bake volumes and blocking geometry
//!
//! All helpers assume a Y-up coordinate system. The XZ plane is the ground
//! plane that tiles are laid out on.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from two corners, sorting each axis
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Check if a point lies inside the box footprint on the XZ plane.
    #[inline]
    pub fn contains_xz(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }

    /// Intersect the segment `a -> b` with the box (slab test).
    ///
    /// Returns the parametric distance `t` in `[0, 1]` of the entry point,
    /// or `None` if the segment misses the box entirely.
    pub fn intersect_segment(&self, a: Vec3, b: Vec3) -> Option<f32> {
        let dir = b - a;
        let mut tmin = 0.0f32;
        let mut tmax = 1.0f32;

        for axis in 0..3 {
            let origin = a[axis];
            let d = dir[axis];
            let lo = self.min[axis];
            let hi = self.max[axis];

            if d.abs() < f32::EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t1 = (lo - origin) * inv;
            let mut t2 = (hi - origin) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            tmin = tmin.max(t1);
            tmax = tmax.min(t2);
            if tmin > tmax {
                return None;
            }
        }

        Some(tmin)
    }
}
