//! Irradiance filter drivers.
//!
//! Three backends share one contract: take a horizontal-cross source image,
//! write the per-texel diffuse irradiance into an identically shaped
//! destination, and report progress along the way. `filter_direct` sweeps
//! the hemisphere numerically per texel, `filter_sh` projects onto 25
//! spherical-harmonic coefficients and reconstructs analytically, and the
//! GPU driver hands a per-face kernel to an external executor.

mod direct;
mod gpu;
mod sh_pass;

use crate::envmap::{Envmap, EnvmapMut, Layout};
use crate::error::FilterError;
use crate::gpu::KernelExecutor;

/// Snapshot of a running pass handed to progress callbacks.
///
/// `output` borrows the destination bytes for the duration of the call
/// only; callbacks must copy what they need and return.
#[derive(Debug)]
pub struct ProgressUpdate<'a> {
    /// Current destination image bytes, partially filled.
    pub output: &'a [u8],
    /// Work items finished so far (texels, or faces for the GPU driver).
    pub completed: usize,
    /// Total work items in this pass.
    pub total: usize,
}

/// Progress callback type accepted by all drivers.
///
/// Called on whatever thread runs the filter. The drivers treat callbacks
/// as fire-and-forget and never observe a result.
pub type ProgressFn<'a> = dyn FnMut(ProgressUpdate<'_>) + 'a;

/// Invoke the optional progress callback.
fn tick(
    progress: &mut Option<&mut ProgressFn<'_>>,
    output: &[u8],
    completed: usize,
    total: usize,
) {
    if let Some(cb) = progress.as_mut() {
        cb(ProgressUpdate {
            output,
            completed,
            total,
        });
    }
}

/// Validate the shared driver contract.
///
/// Both buffers must be `width * height * channels` bytes with 3 or 4
/// channels, the dimensions must detect as a horizontal cross, and the
/// face size must be at least 2.
pub(crate) fn validate_pass(
    src: &[u8],
    dst: &[u8],
    width: u32,
    height: u32,
    channels: u8,
) -> Result<(), FilterError> {
    let dims_err = FilterError::InvalidDimensions {
        width,
        height,
        channels,
    };
    if width == 0 || height == 0 || !(channels == 3 || channels == 4) {
        return Err(dims_err);
    }
    let expected = width as usize * height as usize * channels as usize;
    if src.len() != expected || dst.len() != expected {
        return Err(dims_err);
    }
    let layout = Layout::detect(width, height);
    if layout != Layout::HCross {
        return Err(FilterError::UnsupportedLayout(layout));
    }
    if width / 4 < 2 {
        return Err(dims_err);
    }
    Ok(())
}

/// Filter by direct angular convolution.
///
/// `progress` is invoked once per destination texel.
///
/// # Errors
///
/// `InvalidDimensions` or `UnsupportedLayout` when the arguments break the
/// driver contract described in [`validate_pass`].
pub fn filter_direct(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    channels: u8,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<(), FilterError> {
    validate_pass(src, dst, width, height, channels)?;
    let src_env = Envmap::new(src, width, height, channels)?;
    let mut dst_env = EnvmapMut::new(dst, width, height, channels)?;
    direct::run(&src_env, &mut dst_env, progress)
}

/// Filter through spherical-harmonic projection and reconstruction.
///
/// `progress` is invoked once per destination texel.
///
/// # Errors
///
/// Driver-contract errors as for [`filter_direct`], plus `OutOfMemory`
/// when the normal/solid-angle index cannot be allocated.
pub fn filter_sh(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    channels: u8,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<(), FilterError> {
    validate_pass(src, dst, width, height, channels)?;
    let src_env = Envmap::new(src, width, height, channels)?;
    let mut dst_env = EnvmapMut::new(dst, width, height, channels)?;
    sh_pass::run(&src_env, &mut dst_env, progress)
}

/// Filter by offloading the per-face kernel to the given executor.
///
/// `progress` is invoked once per face (six times). The first executor
/// failure aborts the pass.
///
/// # Errors
///
/// Driver-contract errors as for [`filter_direct`], plus `Gpu` wrapping
/// any executor failure.
pub fn filter_gpu_with(
    executor: &mut dyn KernelExecutor,
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    channels: u8,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<(), FilterError> {
    validate_pass(src, dst, width, height, channels)?;
    let src_env = Envmap::new(src, width, height, channels)?;
    let mut dst_env = EnvmapMut::new(dst, width, height, channels)?;
    gpu::run(executor, &src_env, &mut dst_env, progress)
}

/// Filter on the first enumerated GPU device.
///
/// Equivalent to [`filter_gpu_with`] over a freshly constructed
/// [`crate::gpu::WgpuExecutor`].
///
/// # Errors
///
/// As for [`filter_gpu_with`]; additionally `Gpu(NoDevice)` when adapter
/// enumeration finds nothing.
#[cfg(feature = "gpu")]
pub fn filter_gpu(
    src: &[u8],
    dst: &mut [u8],
    width: u32,
    height: u32,
    channels: u8,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<(), FilterError> {
    let mut executor = crate::gpu::WgpuExecutor::new()?;
    filter_gpu_with(
        &mut executor,
        src,
        dst,
        width,
        height,
        channels,
        progress,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cubemap::CubeFace;
    use crate::gpu::{GpuError, KernelJob};
    use glam::Vec3;

    fn hcross_dims(face_size: u32) -> (u32, u32) {
        (4 * face_size, 3 * face_size)
    }

    fn constant_image(face_size: u32, value: u8, channels: u8) -> Vec<u8> {
        let (w, h) = hcross_dims(face_size);
        vec![value; (w * h * u32::from(channels)) as usize]
    }

    /// Fill one face of an hcross buffer with a constant color.
    fn fill_face(
        buf: &mut [u8],
        face_size: u32,
        channels: u8,
        face: CubeFace,
        rgb: [f32; 3],
    ) {
        let (w, h) = hcross_dims(face_size);
        let mut env = EnvmapMut::new(buf, w, h, channels).unwrap();
        for y in 0..face_size {
            for x in 0..face_size {
                env.set_pixel(x, y, face, rgb).unwrap();
            }
        }
    }

    /// Read one face texel back as bytes.
    fn texel_bytes(
        buf: &[u8],
        face_size: u32,
        channels: u8,
        x: u32,
        y: u32,
        face: CubeFace,
    ) -> [u8; 3] {
        let (w, h) = hcross_dims(face_size);
        let env = Envmap::new(buf, w, h, channels).unwrap();
        let texel = env.texel(x, y, face).unwrap();
        [
            (texel[0] * 255.0).round() as u8,
            (texel[1] * 255.0).round() as u8,
            (texel[2] * 255.0).round() as u8,
        ]
    }

    /// Mean of all channels over one face.
    fn face_mean(
        buf: &[u8],
        face_size: u32,
        channels: u8,
        face: CubeFace,
    ) -> f64 {
        let (w, h) = hcross_dims(face_size);
        let env = Envmap::new(buf, w, h, channels).unwrap();
        let mut sum = 0.0f64;
        for y in 0..face_size {
            for x in 0..face_size {
                let texel = env.texel(x, y, face).unwrap();
                sum += f64::from(texel[0] + texel[1] + texel[2]) / 3.0;
            }
        }
        sum * 255.0 / f64::from(face_size * face_size)
    }

    #[test]
    fn one_texel_faces_are_rejected() {
        let src = vec![0u8; 4 * 3 * 3];
        let mut dst = vec![0u8; 4 * 3 * 3];
        assert!(matches!(
            filter_sh(&src, &mut dst, 4, 3, 3, None),
            Err(FilterError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn non_hcross_layouts_are_rejected() {
        let src = vec![0u8; 600 * 800 * 3];
        let mut dst = vec![0u8; 600 * 800 * 3];
        assert!(matches!(
            filter_direct(&src, &mut dst, 600, 800, 3, None),
            Err(FilterError::UnsupportedLayout(Layout::VCross))
        ));

        let src = vec![0u8; 1024 * 512 * 3];
        let mut dst = vec![0u8; 1024 * 512 * 3];
        assert!(matches!(
            filter_sh(&src, &mut dst, 1024, 512, 3, None),
            Err(FilterError::UnsupportedLayout(Layout::LatLong))
        ));
    }

    #[test]
    fn mismatched_buffers_are_rejected() {
        let src = constant_image(4, 0, 3);
        let mut dst = vec![0u8; src.len() - 1];
        assert!(matches!(
            filter_direct(&src, &mut dst, 16, 12, 3, None),
            Err(FilterError::InvalidDimensions { .. })
        ));

        let src = constant_image(4, 0, 3);
        let mut dst = constant_image(4, 0, 3);
        assert!(matches!(
            filter_direct(&src, &mut dst, 16, 12, 5, None),
            Err(FilterError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn direct_filter_reproduces_constant_input_exactly() {
        for channels in [3u8, 4] {
            let face_size = 2u32;
            let (w, h) = hcross_dims(face_size);
            let src = constant_image(face_size, 128, channels);
            let mut dst = constant_image(face_size, 0, channels);
            filter_direct(&src, &mut dst, w, h, channels, None).unwrap();
            for face in CubeFace::ALL {
                for y in 0..face_size {
                    for x in 0..face_size {
                        assert_eq!(
                            texel_bytes(
                                &dst, face_size, channels, x, y, face
                            ),
                            [128, 128, 128],
                            "face {face:?} texel ({x}, {y})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn sh_filter_reproduces_constant_input_exactly() {
        // Byte-exactness needs the warp-induced bias of the band-4 terms
        // below half a byte after the -1/24 reconstruction weight; plenty
        // of headroom at this face size.
        let face_size = 64u32;
        let (w, h) = hcross_dims(face_size);
        let src = constant_image(face_size, 128, 3);
        let mut dst = constant_image(face_size, 0, 3);
        filter_sh(&src, &mut dst, w, h, 3, None).unwrap();
        for face in CubeFace::ALL {
            for y in 0..face_size {
                for x in 0..face_size {
                    assert_eq!(
                        texel_bytes(&dst, face_size, 3, x, y, face),
                        [128, 128, 128],
                        "face {face:?} texel ({x}, {y})"
                    );
                }
            }
        }
    }

    #[test]
    fn progress_runs_once_per_texel_on_cpu_backends() {
        let face_size = 2u32;
        let (w, h) = hcross_dims(face_size);
        let src = constant_image(face_size, 200, 3);
        let expected = 6 * (face_size * face_size) as usize;

        for use_sh in [false, true] {
            let mut dst = constant_image(face_size, 0, 3);
            let mut count = 0usize;
            let mut last = 0usize;
            let mut cb = |p: ProgressUpdate<'_>| {
                count += 1;
                assert_eq!(p.total, expected);
                assert_eq!(p.completed, last + 1);
                assert_eq!(p.output.len(), (w * h * 3) as usize);
                last = p.completed;
            };
            if use_sh {
                filter_sh(&src, &mut dst, w, h, 3, Some(&mut cb)).unwrap();
            } else {
                filter_direct(&src, &mut dst, w, h, 3, Some(&mut cb))
                    .unwrap();
            }
            assert_eq!(count, expected, "sh = {use_sh}");
        }
    }

    #[test]
    fn bright_face_dominates_its_own_hemisphere() {
        // +Z white, everything else black: the +Z output center stays
        // bright, the -Z output center stays dark, on both backends.
        let face_size = 4u32;
        let (w, h) = hcross_dims(face_size);
        let mut src = constant_image(face_size, 0, 3);
        fill_face(&mut src, face_size, 3, CubeFace::PosZ, [1.0; 3]);

        for use_sh in [false, true] {
            let mut dst = constant_image(face_size, 0, 3);
            if use_sh {
                filter_sh(&src, &mut dst, w, h, 3, None).unwrap();
            } else {
                filter_direct(&src, &mut dst, w, h, 3, None).unwrap();
            }
            let bright = texel_bytes(&dst, face_size, 3, 1, 1, CubeFace::PosZ);
            let dark = texel_bytes(&dst, face_size, 3, 1, 1, CubeFace::NegZ);
            for channel in bright {
                assert!(
                    channel > 100,
                    "sh = {use_sh}: +Z center {channel} too dark"
                );
            }
            for channel in dark {
                assert!(
                    channel < 30,
                    "sh = {use_sh}: -Z center {channel} too bright"
                );
            }
        }
    }

    #[test]
    fn backends_agree_on_face_indexed_grays() {
        // Faces colored 40 + 40 * face blend into their neighbours under
        // any cosine-lobe filter; both backends must land on compatible
        // per-face means inside the input's range, and keep the overall
        // energy.
        let face_size = 16u32;
        let (w, h) = hcross_dims(face_size);
        let mut src = constant_image(face_size, 0, 3);
        for face in CubeFace::ALL {
            let gray = (40 + 40 * face.index()) as f32 / 255.0;
            fill_face(&mut src, face_size, 3, face, [gray; 3]);
        }

        let mut direct_out = constant_image(face_size, 0, 3);
        filter_direct(&src, &mut direct_out, w, h, 3, None).unwrap();
        let mut sh_out = constant_image(face_size, 0, 3);
        filter_sh(&src, &mut sh_out, w, h, 3, None).unwrap();

        let mut direct_total = 0.0f64;
        let mut input_total = 0.0f64;
        for face in CubeFace::ALL {
            let input = face_mean(&src, face_size, 3, face);
            let direct = face_mean(&direct_out, face_size, 3, face);
            let sh = face_mean(&sh_out, face_size, 3, face);
            assert!(
                (direct - sh).abs() < 25.0,
                "{face:?}: direct {direct} vs sh {sh}"
            );
            assert!(
                (40.0..=240.0).contains(&direct),
                "{face:?}: direct mean {direct} outside input range"
            );
            assert!(
                (40.0..=240.0).contains(&sh),
                "{face:?}: sh mean {sh} outside input range"
            );
            direct_total += direct;
            input_total += input;
        }
        assert!(
            (direct_total / 6.0 - input_total / 6.0).abs() < 25.0,
            "overall energy drifted: {direct_total} vs {input_total}"
        );
    }

    #[test]
    fn single_bright_texel_decays_with_angle() {
        // One red texel at the +X face center: reconstructed red must peak
        // toward +X and fall off monotonically as the normal swings away.
        let face_size = 8u32;
        let (w, h) = hcross_dims(face_size);
        let mut src = constant_image(face_size, 0, 3);
        {
            let mut env = EnvmapMut::new(&mut src, w, h, 3).unwrap();
            env.set_pixel(3, 3, CubeFace::PosX, [1.0, 0.0, 0.0]).unwrap();
        }

        let mut dst = constant_image(face_size, 0, 3);
        filter_sh(&src, &mut dst, w, h, 3, None).unwrap();

        let env = Envmap::new(&dst, w, h, 3).unwrap();
        let center = env.sample(Vec3::X).unwrap();
        assert!(
            center[0] > center[1] && center[0] > center[2],
            "center {center:?} should be red-dominant"
        );

        // Sweep 16 directions from +X toward +Z and watch red fall off.
        let mut previous = f32::INFINITY;
        for step in 0..16 {
            let angle = step as f32 * (std::f32::consts::FRAC_PI_2 * 0.9)
                / 15.0;
            let dir = Vec3::new(angle.cos(), 0.0, angle.sin());
            let red = env.sample(dir).unwrap()[0];
            assert!(
                red <= previous,
                "red increased at step {step}: {red} > {previous}"
            );
            previous = red;
        }
        let far = env
            .sample(Vec3::new(0.15, 0.0, 1.0).normalize())
            .unwrap()[0];
        assert!(
            far < center[0],
            "red should decay away from the source texel"
        );
    }

    /// Executor stub: paints each face a face-indexed gray and records the
    /// order faces were dispatched in.
    struct FakeExecutor {
        faces: Vec<usize>,
        fail_on: Option<usize>,
    }

    impl KernelExecutor for FakeExecutor {
        fn run_face(
            &mut self,
            job: KernelJob<'_>,
        ) -> Result<(), GpuError> {
            if self.fail_on == Some(self.faces.len()) {
                return Err(GpuError::DeviceOperationFailed(
                    "injected failure".into(),
                ));
            }
            self.faces.push(job.face.index());
            assert_eq!(job.entry, "irradiance_face");
            assert!(!job.source.is_empty());

            let (w, h) = (4 * job.face_size, 3 * job.face_size);
            let mut env =
                EnvmapMut::new(job.dst, w, h, job.channels).unwrap();
            let level = (job.face.index() as f32 + 1.0) / 6.0;
            for y in 0..job.face_size {
                for x in 0..job.face_size {
                    env.set_pixel(x, y, job.face, [level; 3]).unwrap();
                }
            }
            Ok(())
        }
    }

    #[test]
    fn gpu_driver_dispatches_each_face_once() {
        let face_size = 2u32;
        let (w, h) = hcross_dims(face_size);
        let src = constant_image(face_size, 50, 3);
        let mut dst = constant_image(face_size, 0, 3);

        let mut executor = FakeExecutor {
            faces: Vec::new(),
            fail_on: None,
        };
        let mut ticks = 0usize;
        let mut cb = |p: ProgressUpdate<'_>| {
            ticks += 1;
            assert_eq!(p.total, 6);
        };
        filter_gpu_with(
            &mut executor,
            &src,
            &mut dst,
            w,
            h,
            3,
            Some(&mut cb),
        )
        .unwrap();

        assert_eq!(ticks, 6);
        assert_eq!(executor.faces, vec![0, 1, 2, 3, 4, 5]);
        for face in CubeFace::ALL {
            let expected =
                (((face.index() as f32 + 1.0) / 6.0) * 255.0).round() as u8;
            assert_eq!(
                texel_bytes(&dst, face_size, 3, 0, 0, face),
                [expected; 3]
            );
        }
    }

    #[test]
    fn gpu_driver_aborts_on_first_executor_failure() {
        let face_size = 2u32;
        let (w, h) = hcross_dims(face_size);
        let src = constant_image(face_size, 50, 3);
        let mut dst = constant_image(face_size, 0, 3);

        let mut executor = FakeExecutor {
            faces: Vec::new(),
            fail_on: Some(2),
        };
        let mut ticks = 0usize;
        let mut cb = |_: ProgressUpdate<'_>| ticks += 1;
        let result = filter_gpu_with(
            &mut executor,
            &src,
            &mut dst,
            w,
            h,
            3,
            Some(&mut cb),
        );

        assert!(matches!(result, Err(FilterError::Gpu(_))));
        assert_eq!(executor.faces.len(), 2);
        assert_eq!(ticks, 2);
    }
}
