//! Spherical geometry primitives shared by the filter backends.
//!
//! Everything here operates in the cube-map convention used throughout the
//! crate: `theta` is the horizontal angle measured around `+Y`, `phi` the
//! vertical angle from `+Y`, and face coordinates are center-addressed in
//! `[-1 + 1/F, 1 - 1/F]` for face size `F`.

use glam::Vec3;

/// Convert spherical angles to a unit direction.
///
/// `theta` is horizontal, `phi` vertical.
#[inline]
#[must_use]
pub fn sc_to_vec(theta: f32, phi: f32) -> Vec3 {
    Vec3::new(
        theta.sin() * phi.sin(),
        phi.cos(),
        theta.cos() * phi.sin(),
    )
}

/// Convert a unit direction to spherical `(theta, phi)` angles.
#[inline]
#[must_use]
pub fn vec_to_sc(v: Vec3) -> (f32, f32) {
    (v.x.atan2(v.z), v.y.acos())
}

/// Area of the spherical projection of the rectangle `[0,x] x [0,y]` on the
/// `z = 1` plane (Mathar / Driscoll closed form).
#[inline]
#[must_use]
pub fn area_element(x: f32, y: f32) -> f32 {
    (x * y).atan2((x * x + y * y + 1.0).sqrt())
}

/// Solid angle subtended by the texel centered at `(u, v)` with half-extent
/// `inv_face_size`.
#[must_use]
pub fn texel_solid_angle(u: f32, v: f32, inv_face_size: f32) -> f32 {
    let x0 = u - inv_face_size;
    let x1 = u + inv_face_size;
    let y0 = v - inv_face_size;
    let y1 = v + inv_face_size;

    area_element(x1, y1) - area_element(x0, y1) - area_element(x1, y0)
        + area_element(x0, y0)
}

/// Edge-fixup factor for a face of the given size.
///
/// Based on the NVTT cube-surface warp: `F^2 / (F - 1)^3`. A one-texel face
/// has nothing to warp and gets the identity factor.
#[must_use]
pub fn warp_fixup_factor(face_size: f32) -> f32 {
    if face_size == 1.0 {
        return 1.0;
    }
    let fsmo = face_size - 1.0;
    (face_size * face_size) / (fsmo * fsmo * fsmo)
}

/// Apply the cubic edge warp to a single face coordinate.
#[inline]
#[must_use]
pub fn warp(coord: f32, warp_factor: f32) -> f32 {
    warp_factor * coord * coord * coord + coord
}

/// Map a texel index to its center-addressed face coordinate in `[-1, 1]`.
#[inline]
#[must_use]
pub fn texel_center(index: u32, face_size: u32) -> f32 {
    2.0 * ((index as f32 + 0.5) / face_size as f32) - 1.0
}
