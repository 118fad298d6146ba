//! Real spherical-harmonic basis (bands 0-4), forward projection and
//! Lambertian diffuse reconstruction.
//!
//! Basis polynomials follow Sloan's closed forms. Projection integrates the
//! source radiance against the basis using the precomputed per-texel solid
//! angles; reconstruction applies the Ramamoorthi-Hanrahan band weights
//! `{1, 2/3, 1/4, 0, -1/24}`.

use glam::Vec3;

use crate::cubemap::CubeFace;
use crate::envmap::Envmap;
use crate::error::FilterError;
use crate::nsa::{NormalSolidAngleIndex, TexelNormal};

/// Number of basis functions for bands 0 through 4.
pub const SH_COEFF_COUNT: usize = 25;

const PI4: f64 = 4.0 * std::f64::consts::PI;
const PI16: f64 = 16.0 * std::f64::consts::PI;
const PI64: f64 = 64.0 * std::f64::consts::PI;
const SQRT_PI: f64 = 1.772_453_850_905_516_027_3;

/// Evaluate the 25 basis functions for a unit direction.
#[must_use]
pub fn eval_basis(dir: Vec3) -> [f64; SH_COEFF_COUNT] {
    let x = f64::from(dir.x);
    let y = f64::from(dir.y);
    let z = f64::from(dir.z);

    let x2 = x * x;
    let y2 = y * y;
    let z2 = z * z;

    let z3 = z2 * z;

    let x4 = x2 * x2;
    let y4 = y2 * y2;
    let z4 = z2 * z2;

    let mut basis = [0.0; SH_COEFF_COUNT];

    basis[0] = 1.0 / (2.0 * SQRT_PI);

    basis[1] = -(3.0 / PI4).sqrt() * y;
    basis[2] = (3.0 / PI4).sqrt() * z;
    basis[3] = -(3.0 / PI4).sqrt() * x;

    basis[4] = (15.0 / PI4).sqrt() * y * x;
    basis[5] = -(15.0 / PI4).sqrt() * y * z;
    basis[6] = (5.0 / PI16).sqrt() * (3.0 * z2 - 1.0);
    basis[7] = -(15.0 / PI4).sqrt() * x * z;
    basis[8] = (15.0 / PI16).sqrt() * (x2 - y2);

    basis[9] = -(70.0 / PI64).sqrt() * y * (3.0 * x2 - y2);
    basis[10] = (105.0 / PI4).sqrt() * y * x * z;
    basis[11] = -(21.0 / PI16).sqrt() * y * (-1.0 + 5.0 * z2);
    basis[12] = (7.0 / PI16).sqrt() * (5.0 * z3 - 3.0 * z);
    basis[13] = -(42.0 / PI64).sqrt() * x * (-1.0 + 5.0 * z2);
    basis[14] = (105.0 / PI16).sqrt() * (x2 - y2) * z;
    basis[15] = -(70.0 / PI64).sqrt() * x * (x2 - 3.0 * y2);

    basis[16] = 3.0 * (35.0 / PI16).sqrt() * x * y * (x2 - y2);
    basis[17] = -3.0 * (70.0 / PI64).sqrt() * y * z * (3.0 * x2 - y2);
    basis[18] = 3.0 * (5.0 / PI16).sqrt() * y * x * (-1.0 + 7.0 * z2);
    basis[19] = -3.0 * (10.0 / PI64).sqrt() * y * z * (-3.0 + 7.0 * z2);
    basis[20] = (105.0 * z4 - 90.0 * z2 + 9.0) / (16.0 * SQRT_PI);
    basis[21] = -3.0 * (10.0 / PI64).sqrt() * x * z * (-3.0 + 7.0 * z2);
    basis[22] = 3.0 * (5.0 / PI64).sqrt() * (x2 - y2) * (-1.0 + 7.0 * z2);
    basis[23] = -3.0 * (70.0 / PI64).sqrt() * x * z * (x2 - 3.0 * y2);
    basis[24] =
        3.0 * (35.0 / (4.0 * PI64)).sqrt() * (x4 - 6.0 * y2 * x2 + y4);

    basis
}

/// Running projection sums: 25 RGB coefficients plus the total solid angle.
#[derive(Debug, Clone, Copy)]
struct Accum {
    rgb: [[f64; 3]; SH_COEFF_COUNT],
    weight: f64,
}

impl Accum {
    fn zero() -> Self {
        Self {
            rgb: [[0.0; 3]; SH_COEFF_COUNT],
            weight: 0.0,
        }
    }

    fn add(&mut self, pixel: [f32; 3], basis: &[f64; SH_COEFF_COUNT], weight: f64) {
        let r = f64::from(pixel[0]);
        let g = f64::from(pixel[1]);
        let b = f64::from(pixel[2]);
        for (coeff, basis) in self.rgb.iter_mut().zip(basis) {
            coeff[0] += r * basis * weight;
            coeff[1] += g * basis * weight;
            coeff[2] += b * basis * weight;
        }
        self.weight += weight;
    }

    #[cfg(feature = "parallel")]
    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.rgb.iter_mut().zip(other.rgb.iter()) {
            a[0] += b[0];
            a[1] += b[1];
            a[2] += b[2];
        }
        self.weight += other.weight;
        self
    }
}

/// Fold one NSA entry (and its source texel) into the accumulator.
fn accumulate_entry(
    env: &Envmap<'_>,
    face_size: usize,
    index: usize,
    entry: &TexelNormal,
    acc: &mut Accum,
) -> Result<(), FilterError> {
    let per_face = face_size * face_size;
    let face = CubeFace::ALL[index / per_face];
    let rem = index % per_face;
    let y = (rem / face_size) as u32;
    let x = (rem % face_size) as u32;

    let pixel = env.texel(x, y, face)?;
    let basis = eval_basis(entry.normal_vec());
    acc.add(pixel, &basis, f64::from(entry.solid_angle));
    Ok(())
}

#[cfg(not(feature = "parallel"))]
fn accumulate_entries(
    env: &Envmap<'_>,
    nsa: &NormalSolidAngleIndex,
) -> Result<Accum, FilterError> {
    let face_size = nsa.face_size() as usize;
    let mut acc = Accum::zero();
    for (index, entry) in nsa.entries().iter().enumerate() {
        accumulate_entry(env, face_size, index, entry, &mut acc)?;
    }
    Ok(acc)
}

#[cfg(feature = "parallel")]
fn accumulate_entries(
    env: &Envmap<'_>,
    nsa: &NormalSolidAngleIndex,
) -> Result<Accum, FilterError> {
    use rayon::prelude::*;

    let face_size = nsa.face_size() as usize;
    nsa.entries()
        .par_iter()
        .enumerate()
        .try_fold(Accum::zero, |mut acc, (index, entry)| {
            accumulate_entry(env, face_size, index, entry, &mut acc)?;
            Ok::<_, FilterError>(acc)
        })
        .try_reduce(Accum::zero, |a, b| Ok(a.merge(b)))
}

/// The 25 projected RGB coefficients of an environment map.
#[derive(Debug, Clone, Copy)]
pub struct ShCoeffs {
    rgb: [[f64; 3]; SH_COEFF_COUNT],
}

impl ShCoeffs {
    /// Project an environment map onto the basis.
    ///
    /// Source pixels are normalized to `[0, 1]`. The result is rescaled by
    /// `4 pi / total solid angle`, which corrects the small discretization
    /// error of the quadrature.
    ///
    /// # Errors
    ///
    /// `InvalidDimensions` when the map and index disagree on face size;
    /// `NotImplemented` when the map's layout has no texel addressing.
    pub fn project(
        env: &Envmap<'_>,
        nsa: &NormalSolidAngleIndex,
    ) -> Result<Self, FilterError> {
        if nsa.is_empty() || env.face_size() != nsa.face_size() {
            return Err(FilterError::InvalidDimensions {
                width: env.width(),
                height: env.height(),
                channels: env.channels(),
            });
        }

        let acc = accumulate_entries(env, nsa)?;
        let norm = PI4 / acc.weight;
        let mut rgb = acc.rgb;
        for coeff in &mut rgb {
            coeff[0] *= norm;
            coeff[1] *= norm;
            coeff[2] *= norm;
        }
        Ok(Self { rgb })
    }

    /// One RGB coefficient triple.
    #[must_use]
    pub fn coeff(&self, index: usize) -> [f64; 3] {
        self.rgb[index]
    }

    /// Reconstruct the diffuse irradiance arriving around a normal.
    ///
    /// Applies the Lambertian convolution factors per band; band 3
    /// vanishes. The result is unclamped; callers writing bytes clamp.
    #[must_use]
    pub fn irradiance(&self, normal: Vec3) -> [f32; 3] {
        // (start, end, band weight); band 3 is zero and skipped.
        const BANDS: [(usize, usize, f64); 4] = [
            (0, 1, 1.0),
            (1, 4, 2.0 / 3.0),
            (4, 9, 1.0 / 4.0),
            (16, 25, -1.0 / 24.0),
        ];

        let basis = eval_basis(normal);
        let mut rgb = [0.0f64; 3];
        for &(start, end, weight) in &BANDS {
            for i in start..end {
                rgb[0] += self.rgb[i][0] * basis[i] * weight;
                rgb[1] += self.rgb[i][1] * basis[i] * weight;
                rgb[2] += self.rgb[i][2] * basis[i] * weight;
            }
        }
        [rgb[0] as f32, rgb[1] as f32, rgb[2] as f32]
    }
}
