//! Environment-map value objects: a borrowed pixel buffer tagged with its
//! packing layout and dimensions.
//!
//! Pixels are 8-bit unsigned per channel. Sampling normalizes to `[0, 1]`
//! floats; writing clamps `[0, 1]` floats back to bytes.

use glam::Vec3;

use crate::cubemap::{self, CubeFace};
use crate::error::FilterError;

/// How the six cube faces (or the sphere) are packed into the 2D image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// 4x3 face grid with the vertical arm on column 1.
    HCross,
    /// 3x4 face grid (recognized, not filterable).
    VCross,
    /// Equirectangular latitude/longitude projection (recognized, not
    /// filterable).
    LatLong,
    /// Six faces stacked vertically, one face per row band.
    VStrip,
    /// Dimensions match no known layout.
    Unknown,
}

/// Per-face `(column, row)` cell inside the 4x3 horizontal-cross grid.
const HCROSS_FACE_GRID: [(usize, usize); 6] = [
    (2, 1), // +X
    (0, 1), // -X
    (1, 0), // +Y
    (1, 2), // -Y
    (1, 1), // +Z
    (3, 1), // -Z
];

impl Layout {
    /// Detect the layout from image dimensions by aspect ratio.
    ///
    /// First match wins, in HCross, VCross, LatLong, VStrip order. The
    /// cross ratios get a looser tolerance than the thin ones.
    #[must_use]
    pub fn detect(width: u32, height: u32) -> Layout {
        const CROSS_EPS: f32 = 1e-3;
        const THIN_EPS: f32 = 1e-4;
        if width == 0 || height == 0 {
            return Layout::Unknown;
        }
        let aspect = width as f32 / height as f32;
        if (aspect - 4.0 / 3.0).abs() < CROSS_EPS {
            Layout::HCross
        } else if (aspect - 3.0 / 4.0).abs() < CROSS_EPS {
            Layout::VCross
        } else if (aspect - 2.0).abs() < THIN_EPS {
            Layout::LatLong
        } else if (aspect - 1.0 / 6.0).abs() < THIN_EPS {
            Layout::VStrip
        } else {
            Layout::Unknown
        }
    }
}

/// Validate dimensions and buffer size shared by both envmap constructors.
fn validate(
    len: usize,
    width: u32,
    height: u32,
    channels: u8,
) -> Result<Layout, FilterError> {
    let dims_err = FilterError::InvalidDimensions {
        width,
        height,
        channels,
    };
    if width == 0 || height == 0 || !(channels == 3 || channels == 4) {
        return Err(dims_err);
    }
    let expected = width as usize * height as usize * channels as usize;
    if len != expected {
        return Err(dims_err);
    }
    Ok(Layout::detect(width, height))
}

/// Face side length for a cube layout; zero for non-cube layouts.
fn face_size_of(layout: Layout, width: u32) -> u32 {
    match layout {
        Layout::HCross => width / 4,
        Layout::VCross => width / 3,
        Layout::VStrip => width,
        Layout::LatLong | Layout::Unknown => 0,
    }
}

/// Byte offset of texel `(x, y)` on `face` inside the packed image.
fn texel_byte_offset(
    layout: Layout,
    face_size: u32,
    channels: u8,
    x: u32,
    y: u32,
    face: CubeFace,
) -> Result<usize, FilterError> {
    let fs = face_size as usize;
    let (x, y) = (x as usize, y as usize);
    match layout {
        Layout::HCross => {
            let (col, row) = HCROSS_FACE_GRID[face.index()];
            let stride = 4 * fs;
            Ok(((row * fs + y) * stride + col * fs + x)
                * channels as usize)
        }
        Layout::VStrip => {
            Ok(((face.index() * fs + y) * fs + x) * channels as usize)
        }
        layout => Err(FilterError::NotImplemented {
            layout,
            op: "texel addressing",
        }),
    }
}

/// A read-only environment map over a borrowed byte buffer.
#[derive(Debug, Clone, Copy)]
pub struct Envmap<'a> {
    layout: Layout,
    width: u32,
    height: u32,
    channels: u8,
    data: &'a [u8],
}

impl<'a> Envmap<'a> {
    /// Wrap a pixel buffer, detecting the layout from its dimensions.
    ///
    /// # Errors
    ///
    /// `InvalidDimensions` when the dimensions are degenerate, the channel
    /// count is not 3 or 4, or the buffer length is not
    /// `width * height * channels`.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        channels: u8,
    ) -> Result<Self, FilterError> {
        let layout = validate(data.len(), width, height, channels)?;
        Ok(Self {
            layout,
            width,
            height,
            channels,
            data,
        })
    }

    /// Detected packing layout.
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Color channels per pixel (3 or 4).
    #[must_use]
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// The raw pixel bytes.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Face side length in pixels; zero for non-cube layouts.
    #[must_use]
    pub fn face_size(&self) -> u32 {
        face_size_of(self.layout, self.width)
    }

    /// Read texel `(x, y)` of `face`, normalized to `[0, 1]`.
    ///
    /// # Errors
    ///
    /// `NotImplemented` for layouts without cube-face addressing.
    pub fn texel(
        &self,
        x: u32,
        y: u32,
        face: CubeFace,
    ) -> Result<[f32; 3], FilterError> {
        let offset = texel_byte_offset(
            self.layout,
            self.face_size(),
            self.channels,
            x,
            y,
            face,
        )?;
        Ok([
            f32::from(self.data[offset]) / 255.0,
            f32::from(self.data[offset + 1]) / 255.0,
            f32::from(self.data[offset + 2]) / 255.0,
        ])
    }

    /// Sample the map in a direction (nearest neighbor), normalized to
    /// `[0, 1]`. The direction does not need to be normalized.
    ///
    /// # Errors
    ///
    /// `NotImplemented` for layouts without cube-face addressing.
    pub fn sample(&self, dir: Vec3) -> Result<[f32; 3], FilterError> {
        let face_size = self.face_size();
        if face_size == 0 {
            return Err(FilterError::NotImplemented {
                layout: self.layout,
                op: "sample",
            });
        }
        let (face, u, v) = cubemap::dir_to_face_uv(dir);
        let edge = (face_size - 1) as f32;
        let x = (u * edge) as u32;
        let y = (v * edge) as u32;
        self.texel(x, y, face)
    }
}

/// A writable environment map over a borrowed byte buffer.
#[derive(Debug)]
pub struct EnvmapMut<'a> {
    layout: Layout,
    width: u32,
    height: u32,
    channels: u8,
    data: &'a mut [u8],
}

impl<'a> EnvmapMut<'a> {
    /// Wrap a mutable pixel buffer, detecting the layout from its
    /// dimensions.
    ///
    /// # Errors
    ///
    /// Same contract as [`Envmap::new`].
    pub fn new(
        data: &'a mut [u8],
        width: u32,
        height: u32,
        channels: u8,
    ) -> Result<Self, FilterError> {
        let layout = validate(data.len(), width, height, channels)?;
        Ok(Self {
            layout,
            width,
            height,
            channels,
            data,
        })
    }

    /// Face side length in pixels; zero for non-cube layouts.
    #[must_use]
    pub fn face_size(&self) -> u32 {
        face_size_of(self.layout, self.width)
    }

    /// The current pixel bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.data
    }

    /// The pixel bytes, mutably (for executors that write whole faces).
    #[must_use]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.data
    }

    /// A read-only view of the same buffer.
    #[must_use]
    pub fn as_envmap(&self) -> Envmap<'_> {
        Envmap {
            layout: self.layout,
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: self.data,
        }
    }

    /// Write texel `(x, y)` of `face` from `[0, 1]` floats.
    ///
    /// Each channel is clamped, scaled to byte range and rounded. Only the
    /// first three channels are written; alpha is left untouched.
    ///
    /// # Errors
    ///
    /// `NotImplemented` for layouts without cube-face addressing.
    pub fn set_pixel(
        &mut self,
        x: u32,
        y: u32,
        face: CubeFace,
        rgb: [f32; 3],
    ) -> Result<(), FilterError> {
        let offset = texel_byte_offset(
            self.layout,
            self.face_size(),
            self.channels,
            x,
            y,
            face,
        )?;
        for (i, value) in rgb.iter().enumerate() {
            self.data[offset + i] =
                (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_canonical_layouts() {
        // Canonical dimensions for every face size >= 2 must round-trip.
        for f in [2u32, 3, 7, 16, 64] {
            assert_eq!(Layout::detect(4 * f, 3 * f), Layout::HCross);
            assert_eq!(Layout::detect(3 * f, 4 * f), Layout::VCross);
            assert_eq!(Layout::detect(2 * f, f), Layout::LatLong);
            assert_eq!(Layout::detect(f, 6 * f), Layout::VStrip);
        }
    }

    #[test]
    fn detects_real_world_dimensions() {
        assert_eq!(Layout::detect(800, 600), Layout::HCross);
        assert_eq!(Layout::detect(600, 800), Layout::VCross);
        assert_eq!(Layout::detect(1024, 512), Layout::LatLong);
        assert_eq!(Layout::detect(100, 600), Layout::VStrip);
        assert_eq!(Layout::detect(700, 500), Layout::Unknown);
    }

    #[test]
    fn rejects_bad_buffers() {
        let buf = vec![0u8; 10];
        assert!(matches!(
            Envmap::new(&buf, 8, 6, 3),
            Err(FilterError::InvalidDimensions { .. })
        ));
        let buf = vec![0u8; 8 * 6 * 5];
        assert!(matches!(
            Envmap::new(&buf, 8, 6, 5),
            Err(FilterError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn hcross_texel_offsets_match_the_grid() {
        // F = 2, 3 channels: the +Y face starts one face to the right on
        // the top row; +Z sits in the middle of the middle row.
        let face_size = 2u32;
        let stride = 4 * face_size as usize * 3;
        let off = texel_byte_offset(
            Layout::HCross,
            face_size,
            3,
            0,
            0,
            CubeFace::PosY,
        )
        .unwrap();
        assert_eq!(off, face_size as usize * 3);
        let off = texel_byte_offset(
            Layout::HCross,
            face_size,
            3,
            1,
            1,
            CubeFace::PosZ,
        )
        .unwrap();
        assert_eq!(off, (2 + 1) * stride + (2 + 1) * 3);
    }

    #[test]
    fn vstrip_texel_offsets_stack_faces() {
        let off = texel_byte_offset(
            Layout::VStrip,
            4,
            3,
            2,
            1,
            CubeFace::NegX,
        )
        .unwrap();
        // Face 1 starts at row 4; texel (2, 1) is one row + two texels in.
        assert_eq!(off, ((4 + 1) * 4 + 2) * 3);
    }

    #[test]
    fn set_pixel_then_sample_round_trips() {
        let f = 4u32;
        let (w, h) = (4 * f, 3 * f);
        let mut buf = vec![0u8; (w * h * 3) as usize];
        let mut out = EnvmapMut::new(&mut buf, w, h, 3).unwrap();
        out.set_pixel(1, 2, CubeFace::NegY, [0.25, 0.5, 1.0]).unwrap();
        let read = out.as_envmap().texel(1, 2, CubeFace::NegY).unwrap();
        assert!((read[0] - 0.25).abs() < 1.0 / 255.0);
        assert!((read[1] - 0.5).abs() < 1.0 / 255.0);
        assert!((read[2] - 1.0).abs() < 1.0 / 255.0);
    }

    #[test]
    fn set_pixel_clamps_and_rounds() {
        let f = 2u32;
        let (w, h) = (4 * f, 3 * f);
        let mut buf = vec![0u8; (w * h * 4) as usize];
        let mut out = EnvmapMut::new(&mut buf, w, h, 4).unwrap();
        out.set_pixel(0, 0, CubeFace::PosX, [-0.5, 2.0, 0.999_999])
            .unwrap();
        let offset = texel_byte_offset(Layout::HCross, f, 4, 0, 0, CubeFace::PosX)
            .unwrap();
        assert_eq!(&out.bytes()[offset..offset + 3], &[0, 255, 255]);
        // Alpha stays untouched.
        assert_eq!(out.bytes()[offset + 3], 0);
    }

    #[test]
    fn sampling_axis_directions_reads_face_centers() {
        let f = 4u32;
        let (w, h) = (4 * f, 3 * f);
        let mut buf = vec![0u8; (w * h * 3) as usize];
        {
            let mut out = EnvmapMut::new(&mut buf, w, h, 3).unwrap();
            // u = v = 0.5 lands on texel (1, 1) with nearest addressing.
            out.set_pixel(1, 1, CubeFace::PosZ, [1.0, 0.0, 0.0]).unwrap();
        }
        let env = Envmap::new(&buf, w, h, 3).unwrap();
        let col = env.sample(Vec3::Z).unwrap();
        assert_eq!(col, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn unimplemented_layouts_are_reported() {
        let buf = vec![0u8; 600 * 800 * 3];
        let env = Envmap::new(&buf, 600, 800, 3).unwrap();
        assert_eq!(env.layout(), Layout::VCross);
        assert!(matches!(
            env.sample(Vec3::X),
            Err(FilterError::NotImplemented { .. })
        ));
    }
}
