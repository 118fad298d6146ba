//! GPU offload driver: hands the kernel to an executor once per face.

use crate::cubemap::CubeFace;
use crate::envmap::{Envmap, EnvmapMut};
use crate::error::FilterError;
use crate::gpu::{KernelExecutor, KernelJob, IRRADIANCE_KERNEL_WGSL};

use super::{tick, ProgressFn};

/// Entry point of [`IRRADIANCE_KERNEL_WGSL`].
pub(super) const KERNEL_ENTRY: &str = "irradiance_face";

pub(super) fn run(
    executor: &mut dyn KernelExecutor,
    src: &Envmap<'_>,
    dst: &mut EnvmapMut<'_>,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> Result<(), FilterError> {
    let face_size = src.face_size();
    let channels = src.channels();

    for (completed, face) in CubeFace::ALL.into_iter().enumerate() {
        // The first face failure aborts the pass; faces already written
        // stay in `dst` but the driver reports the error, not the output.
        executor.run_face(KernelJob {
            source: IRRADIANCE_KERNEL_WGSL,
            entry: KERNEL_ENTRY,
            src: src.bytes(),
            dst: dst.bytes_mut(),
            face_size,
            face,
            channels,
        })?;
        tick(&mut progress, dst.bytes(), completed + 1, 6);
    }
    Ok(())
}
