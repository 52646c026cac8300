//! Vector utilities

use glam::Vec3;

/// Calculates the distance between two points on the XZ plane
#[inline]
pub fn distance_xz(a: &Vec3, b: &Vec3) -> f32 {
    let dx = b.x - a.x;
    let dz = b.z - a.z;
    (dx * dx + dz * dz).sqrt()
}

/// Moves `from` a fraction `t` of the way towards `to` on the XZ plane and
/// sets the height to the mean of both endpoints.
#[inline]
pub fn cut_toward(from: &Vec3, to: &Vec3, t: f32) -> Vec3 {
    Vec3::new(
        from.x + (to.x - from.x) * t,
        (from.y + to.y) * 0.5,
        from.z + (to.z - from.z) * t,
    )
}
