//! Direct angular convolution backend.
//!
//! For every destination texel the source map is swept over a regular
//! `33x33` angular grid centered on the texel normal's spherical angles,
//! weighted by `|n . d|`. Slow and simple; the SH backend exists because
//! this one is `O(F^2 * 1089)` samples.

use std::f32::consts::PI;

use crate::cubemap::{self, CubeFace};
use crate::envmap::{Envmap, EnvmapMut};
use crate::error::FilterError;
use crate::geom;

use super::{tick, ProgressFn};

const SWEEP_STEP: f32 = PI / 32.0;
const SWEEP_HALF: i32 = 16;

pub(super) fn run(
    src: &Envmap<'_>,
    dst: &mut EnvmapMut<'_>,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> Result<(), FilterError> {
    let face_size = src.face_size();
    let warp = geom::warp_fixup_factor(face_size as f32);
    let total = 6 * face_size as usize * face_size as usize;
    let mut completed = 0usize;

    for face in CubeFace::ALL {
        let rows = convolve_face(src, face, face_size, warp)?;
        for (y, row) in rows.iter().enumerate() {
            for (x, rgb) in row.iter().enumerate() {
                dst.set_pixel(x as u32, y as u32, face, *rgb)?;
                completed += 1;
                tick(&mut progress, dst.bytes(), completed, total);
            }
        }
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn convolve_face(
    src: &Envmap<'_>,
    face: CubeFace,
    face_size: u32,
    warp: f32,
) -> Result<Vec<Vec<[f32; 3]>>, FilterError> {
    use rayon::prelude::*;

    (0..face_size)
        .into_par_iter()
        .map(|y| convolve_row(src, face, face_size, warp, y))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn convolve_face(
    src: &Envmap<'_>,
    face: CubeFace,
    face_size: u32,
    warp: f32,
) -> Result<Vec<Vec<[f32; 3]>>, FilterError> {
    (0..face_size)
        .map(|y| convolve_row(src, face, face_size, warp, y))
        .collect()
}

fn convolve_row(
    src: &Envmap<'_>,
    face: CubeFace,
    face_size: u32,
    warp: f32,
    y: u32,
) -> Result<Vec<[f32; 3]>, FilterError> {
    let v = geom::texel_center(y, face_size);
    (0..face_size)
        .map(|x| {
            let u = geom::texel_center(x, face_size);
            convolve_texel(src, face, u, v, warp)
        })
        .collect()
}

/// Integrate one destination texel over the angular sweep.
fn convolve_texel(
    src: &Envmap<'_>,
    face: CubeFace,
    u: f32,
    v: f32,
    warp: f32,
) -> Result<[f32; 3], FilterError> {
    let normal = cubemap::face_uv_to_dir_warped(face, u, v, warp);
    let (theta, phi) = geom::vec_to_sc(normal);

    let mut tot = [0.0f32; 3];
    let mut weight = 0.0f32;
    for ki in -SWEEP_HALF..=SWEEP_HALF {
        let k = ki as f32 * SWEEP_STEP;
        for li in -SWEEP_HALF..=SWEEP_HALF {
            let l = li as f32 * SWEEP_STEP;
            let dir = geom::sc_to_vec(theta + k, phi + l);
            let c = normal.dot(dir).abs();
            let color = src.sample(dir)?;
            tot[0] += c * color[0];
            tot[1] += c * color[1];
            tot[2] += c * color[2];
            weight += c;
        }
    }
    Ok([tot[0] / weight, tot[1] / weight, tot[2] / weight])
}
