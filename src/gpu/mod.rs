//! GPU executor contract for the offloaded filter backend.
//!
//! The filter driver hands an executor the kernel source, the source and
//! destination byte buffers, the scalar arguments and an `F x F` work
//! domain, once per face. Everything about how the kernel actually reaches
//! a device (API, queues, transport) belongs to the executor; the crate
//! ships one implementation on wgpu behind the `gpu` feature.

use std::fmt;

use crate::cubemap::CubeFace;

#[cfg(feature = "gpu")]
mod wgpu_exec;
#[cfg(feature = "gpu")]
pub use wgpu_exec::WgpuExecutor;

/// Errors surfaced by a kernel executor.
#[derive(Debug)]
pub enum GpuError {
    /// Device enumeration found no usable platform/device pair.
    NoDevice,
    /// The kernel program failed to build; carries the build log.
    KernelBuildFailed(String),
    /// A device operation (dispatch, transfer, readback) failed.
    DeviceOperationFailed(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDevice => {
                write!(f, "no usable GPU platform/device pair found")
            }
            Self::KernelBuildFailed(log) => {
                write!(f, "kernel build failed: {log}")
            }
            Self::DeviceOperationFailed(msg) => {
                write!(f, "device operation failed: {msg}")
            }
        }
    }
}

impl std::error::Error for GpuError {}

/// One per-face kernel invocation.
///
/// `src` and `dst` are whole packed images; the kernel writes only the
/// texels of `face`. The work domain is `face_size x face_size`.
#[derive(Debug)]
pub struct KernelJob<'a> {
    /// Kernel program source.
    pub source: &'a str,
    /// Kernel entry point name.
    pub entry: &'a str,
    /// Source image bytes.
    pub src: &'a [u8],
    /// Destination image bytes, updated in place.
    pub dst: &'a mut [u8],
    /// Cube face side length in pixels.
    pub face_size: u32,
    /// The face this invocation covers.
    pub face: CubeFace,
    /// Color channels per pixel in `src`/`dst` (3 or 4).
    pub channels: u8,
}

/// Executes per-face filter kernels on some compute device.
pub trait KernelExecutor {
    /// Run the kernel over one face and write the results back into
    /// `job.dst` before returning.
    ///
    /// # Errors
    ///
    /// Any [`GpuError`]; the driver aborts the pass on the first failure
    /// and propagates no partial output guarantees beyond the faces already
    /// completed.
    fn run_face(&mut self, job: KernelJob<'_>) -> Result<(), GpuError>;
}

/// WGSL source of the per-face irradiance convolution kernel.
///
/// Operates on RGBA8 texels packed one per 32-bit word; executors with
/// 3-channel inputs expand to RGBA before upload. The convolution matches
/// the CPU direct backend: a 33x33 angular sweep around the texel normal
/// weighted by `|n . d|`.
pub const IRRADIANCE_KERNEL_WGSL: &str = r"
struct Params {
    face_size: u32,
    face: u32,
    channels: u32,
    pad: u32,
}

@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;
@group(0) @binding(2) var<uniform> params: Params;

const PI: f32 = 3.14159265358979;
const STEP: f32 = PI / 32.0;

fn face_u_axis(face: u32) -> vec3<f32> {
    switch face {
        case 0u: { return vec3<f32>(0.0, 0.0, -1.0); }
        case 1u: { return vec3<f32>(0.0, 0.0, 1.0); }
        case 2u: { return vec3<f32>(1.0, 0.0, 0.0); }
        case 3u: { return vec3<f32>(1.0, 0.0, 0.0); }
        case 4u: { return vec3<f32>(1.0, 0.0, 0.0); }
        default: { return vec3<f32>(-1.0, 0.0, 0.0); }
    }
}

fn face_v_axis(face: u32) -> vec3<f32> {
    switch face {
        case 2u: { return vec3<f32>(0.0, 0.0, 1.0); }
        case 3u: { return vec3<f32>(0.0, 0.0, -1.0); }
        default: { return vec3<f32>(0.0, -1.0, 0.0); }
    }
}

fn face_axis(face: u32) -> vec3<f32> {
    switch face {
        case 0u: { return vec3<f32>(1.0, 0.0, 0.0); }
        case 1u: { return vec3<f32>(-1.0, 0.0, 0.0); }
        case 2u: { return vec3<f32>(0.0, 1.0, 0.0); }
        case 3u: { return vec3<f32>(0.0, -1.0, 0.0); }
        case 4u: { return vec3<f32>(0.0, 0.0, 1.0); }
        default: { return vec3<f32>(0.0, 0.0, -1.0); }
    }
}

// (column, row) of each face inside the 4x3 horizontal cross.
fn face_cell(face: u32) -> vec2<u32> {
    switch face {
        case 0u: { return vec2<u32>(2u, 1u); }
        case 1u: { return vec2<u32>(0u, 1u); }
        case 2u: { return vec2<u32>(1u, 0u); }
        case 3u: { return vec2<u32>(1u, 2u); }
        case 4u: { return vec2<u32>(1u, 1u); }
        default: { return vec2<u32>(3u, 1u); }
    }
}

fn texel_index(face: u32, x: u32, y: u32, fs: u32) -> u32 {
    let cell = face_cell(face);
    return (cell.y * fs + y) * (4u * fs) + cell.x * fs + x;
}

fn uv_to_dir(face: u32, u: f32, v: f32) -> vec3<f32> {
    return normalize(u * face_u_axis(face) + v * face_v_axis(face) + face_axis(face));
}

fn warp_factor(fs: f32) -> f32 {
    if (fs == 1.0) {
        return 1.0;
    }
    let fsmo = fs - 1.0;
    return (fs * fs) / (fsmo * fsmo * fsmo);
}

fn sc_to_vec(theta: f32, phi: f32) -> vec3<f32> {
    return vec3<f32>(sin(theta) * sin(phi), cos(phi), cos(theta) * sin(phi));
}

fn sample_src(dir: vec3<f32>, fs: u32) -> vec3<f32> {
    let a = abs(dir);
    let m = max(a.x, max(a.y, a.z));
    var face: u32;
    if (m == a.x) {
        face = select(1u, 0u, dir.x >= 0.0);
    } else if (m == a.y) {
        face = select(3u, 2u, dir.y >= 0.0);
    } else {
        face = select(5u, 4u, dir.z >= 0.0);
    }
    let fv = dir / m;
    let u = (dot(face_u_axis(face), fv) + 1.0) * 0.5;
    let v = (dot(face_v_axis(face), fv) + 1.0) * 0.5;
    let edge = f32(fs - 1u);
    let x = u32(u * edge);
    let y = u32(v * edge);
    return unpack4x8unorm(src[texel_index(face, x, y, fs)]).rgb;
}

@compute @workgroup_size(8, 8, 1)
fn irradiance_face(@builtin(global_invocation_id) gid: vec3<u32>) {
    let fs = params.face_size;
    if (gid.x >= fs || gid.y >= fs) {
        return;
    }

    let inv = 1.0 / f32(fs);
    let u = 2.0 * ((f32(gid.x) + 0.5) * inv) - 1.0;
    let v = 2.0 * ((f32(gid.y) + 0.5) * inv) - 1.0;
    let w = warp_factor(f32(fs));
    let n = uv_to_dir(params.face, w * u * u * u + u, w * v * v * v + v);

    let theta = atan2(n.x, n.z);
    let phi = acos(n.y);

    var tot = vec3<f32>(0.0);
    var weight = 0.0;
    for (var ki = -16; ki <= 16; ki = ki + 1) {
        for (var li = -16; li <= 16; li = li + 1) {
            let d = sc_to_vec(theta + f32(ki) * STEP, phi + f32(li) * STEP);
            let c = abs(dot(n, d));
            tot = tot + c * sample_src(d, fs);
            weight = weight + c;
        }
    }

    let dst_index = texel_index(params.face, gid.x, gid.y, fs);
    dst[dst_index] = pack4x8unorm(vec4<f32>(tot / weight, 1.0));
}
";
