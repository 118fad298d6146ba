//! Crate-level error types.

use std::fmt;

use crate::envmap::Layout;
use crate::gpu::GpuError;

/// Errors produced by the irrmap crate.
#[derive(Debug)]
pub enum FilterError {
    /// Dimensions or channel count outside the filter contract.
    InvalidDimensions {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Color channels per pixel.
        channels: u8,
    },
    /// The detected layout cannot be filtered.
    UnsupportedLayout(Layout),
    /// An operation was routed to a layout branch that does not implement
    /// it.
    NotImplemented {
        /// The layout the operation was attempted on.
        layout: Layout,
        /// The operation that has no implementation for it.
        op: &'static str,
    },
    /// A pass-scoped table or coefficient buffer could not be allocated.
    OutOfMemory,
    /// Failed to spawn the filter worker thread.
    ThreadSpawn(std::io::Error),
    /// GPU executor failure.
    Gpu(GpuError),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDimensions {
                width,
                height,
                channels,
            } => write!(
                f,
                "invalid envmap dimensions {width}x{height}x{channels}"
            ),
            Self::UnsupportedLayout(layout) => {
                write!(f, "unsupported envmap layout {layout:?}")
            }
            Self::NotImplemented { layout, op } => {
                write!(f, "{op} not implemented for layout {layout:?}")
            }
            Self::OutOfMemory => {
                write!(f, "filter table allocation failed")
            }
            Self::ThreadSpawn(e) => {
                write!(f, "failed to spawn filter worker: {e}")
            }
            Self::Gpu(e) => write!(f, "GPU error: {e}"),
        }
    }
}

impl std::error::Error for FilterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ThreadSpawn(e) => Some(e),
            Self::Gpu(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GpuError> for FilterError {
    fn from(e: GpuError) -> Self {
        Self::Gpu(e)
    }
}
