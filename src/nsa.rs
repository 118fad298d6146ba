//! Pass-scoped normal/solid-angle index.
//!
//! The index precomputes, for every destination texel, the edge-warped unit
//! normal at the texel center together with the texel's solid angle. The SH
//! projection walks it linearly, which keeps the hot loop free of per-texel
//! trigonometry.

use glam::Vec3;

use crate::cubemap::{self, CubeFace};
use crate::error::FilterError;
use crate::geom;

/// One destination texel: warped unit normal plus solid angle.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TexelNormal {
    /// Unit normal at the texel center, after edge-warp fixup.
    pub normal: [f32; 3],
    /// Solid angle of the texel, from the pre-warp footprint.
    pub solid_angle: f32,
}

impl TexelNormal {
    /// The stored normal as a vector.
    #[inline]
    #[must_use]
    pub fn normal_vec(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}

/// The per-destination-texel table, face-major and row-major.
#[derive(Debug)]
pub struct NormalSolidAngleIndex {
    face_size: u32,
    entries: Vec<TexelNormal>,
}

impl NormalSolidAngleIndex {
    /// Build the table for a cube map of the given face size.
    ///
    /// # Errors
    ///
    /// `OutOfMemory` when the `6 * F^2` entry table cannot be allocated.
    pub fn build(face_size: u32) -> Result<Self, FilterError> {
        let count = 6 * face_size as usize * face_size as usize;
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(count)
            .map_err(|_| FilterError::OutOfMemory)?;

        let warp = geom::warp_fixup_factor(face_size as f32);
        let texel_size = 1.0 / face_size as f32;
        for face in CubeFace::ALL {
            for y in 0..face_size {
                let v = geom::texel_center(y, face_size);
                for x in 0..face_size {
                    let u = geom::texel_center(x, face_size);
                    let normal =
                        cubemap::face_uv_to_dir_warped(face, u, v, warp);
                    entries.push(TexelNormal {
                        normal: normal.to_array(),
                        solid_angle: geom::texel_solid_angle(
                            u, v, texel_size,
                        ),
                    });
                }
            }
        }
        Ok(Self { face_size, entries })
    }

    /// Face size the table was built for.
    #[must_use]
    pub fn face_size(&self) -> u32 {
        self.face_size
    }

    /// All entries, face-major and row-major.
    #[must_use]
    pub fn entries(&self) -> &[TexelNormal] {
        &self.entries
    }

    /// Number of entries (`6 * F^2`).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty (only for a zero face size).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for texel `(x, y)` of `face`.
    #[must_use]
    pub fn entry(&self, x: u32, y: u32, face: CubeFace) -> &TexelNormal {
        let fs = self.face_size as usize;
        &self.entries
            [(face.index() * fs + y as usize) * fs + x as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn table_has_six_faces_of_entries() {
        let nsa = NormalSolidAngleIndex::build(4).unwrap();
        assert_eq!(nsa.len(), 6 * 16);
        assert!(!nsa.is_empty());
        assert_eq!(nsa.face_size(), 4);
    }

    #[test]
    fn solid_angles_sum_to_full_sphere() {
        for face_size in [2u32, 8, 32] {
            let nsa = NormalSolidAngleIndex::build(face_size).unwrap();
            let sum: f64 = nsa
                .entries()
                .iter()
                .map(|e| f64::from(e.solid_angle))
                .sum();
            assert!(
                (sum - 4.0 * PI).abs() < 1e-3,
                "face_size {face_size}: sum {sum}"
            );
        }
    }

    #[test]
    fn normals_are_unit_length() {
        let nsa = NormalSolidAngleIndex::build(8).unwrap();
        for entry in nsa.entries() {
            let len = entry.normal_vec().length();
            assert!((len - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn center_entries_point_along_face_axes() {
        // Even face sizes have no exact center texel; the four middle
        // texels must all lean toward the face axis.
        let nsa = NormalSolidAngleIndex::build(16).unwrap();
        let n = nsa.entry(8, 8, CubeFace::PosZ).normal_vec();
        assert!(n.z > 0.99, "normal {n:?} should be near +Z");
        let n = nsa.entry(7, 8, CubeFace::NegY).normal_vec();
        assert!(n.y < -0.99, "normal {n:?} should be near -Y");
    }

    #[test]
    fn entry_lookup_matches_linear_order() {
        let nsa = NormalSolidAngleIndex::build(4).unwrap();
        let face = CubeFace::NegX;
        let linear = &nsa.entries()[(face.index() * 4 + 2) * 4 + 3];
        let looked_up = nsa.entry(3, 2, face);
        assert_eq!(linear.normal, looked_up.normal);
    }
}
