//! Spherical-harmonic filter backend: project the source onto 25
//! coefficients once, then reconstruct every destination texel
//! analytically.

use std::time::Instant;

use crate::cubemap::CubeFace;
use crate::envmap::{Envmap, EnvmapMut};
use crate::error::FilterError;
use crate::nsa::NormalSolidAngleIndex;
use crate::sh::ShCoeffs;

use super::{tick, ProgressFn};

pub(super) fn run(
    src: &Envmap<'_>,
    dst: &mut EnvmapMut<'_>,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> Result<(), FilterError> {
    let face_size = src.face_size();
    let nsa = NormalSolidAngleIndex::build(face_size)?;

    let started = Instant::now();
    let coeffs = ShCoeffs::project(src, &nsa)?;
    log::info!(
        "SH coefficient projection took {:.2?}",
        started.elapsed()
    );

    let total = nsa.len();
    let mut completed = 0usize;
    for face in CubeFace::ALL {
        for y in 0..face_size {
            for x in 0..face_size {
                let normal = nsa.entry(x, y, face).normal_vec();
                dst.set_pixel(x, y, face, coeffs.irradiance(normal))?;
                completed += 1;
                tick(&mut progress, dst.bytes(), completed, total);
            }
        }
    }
    Ok(())
}
