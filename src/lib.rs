// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene: graphics math truncates on purpose, the rest is strict
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::suboptimal_flops)]
// Tests unwrap freely
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Diffuse irradiance filtering for 8-bit cube-map environment images.
//!
//! irrmap converts a horizontal-cross cube map into a cube map of the same
//! layout whose every texel stores the diffuse irradiance over the
//! hemisphere around that texel's normal — the precomputed lighting
//! primitive physically based renderers sample by surface normal.
//!
//! # Key entry points
//!
//! - [`filter::filter_sh`] - spherical-harmonic projection backend (fast)
//! - [`filter::filter_direct`] - direct angular convolution backend
//! - [`filter::filter_gpu`] - per-face kernel offload (`gpu` feature)
//! - [`worker::spawn_filter_worker`] - run a pass on a detached worker
//!   with live preview handoff
//! - [`envmap::Envmap`] - layout-tagged view over a pixel buffer
//!
//! # Architecture
//!
//! The filter drivers validate at the boundary and run synchronously; the
//! [`worker`] module wraps them in a detached thread that publishes
//! partial output through a polled dirty flag, plus a one-shot upload
//! signal that paces the GPU backend between faces. Geometry lives in
//! [`geom`] and [`cubemap`], layout arithmetic in [`envmap`], and the
//! spherical-harmonic machinery in [`sh`] over the precomputed
//! normal/solid-angle table from [`nsa`].

pub mod cubemap;
pub mod envmap;
pub mod error;
pub mod filter;
pub mod geom;
pub mod gpu;
pub mod nsa;
pub mod sh;
pub mod worker;

pub use envmap::{Envmap, EnvmapMut, Layout};
pub use error::FilterError;
pub use filter::{filter_direct, filter_sh, ProgressFn, ProgressUpdate};
pub use worker::{spawn_filter_worker, Backend, PreviewContext};
