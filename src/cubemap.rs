//! Cube-map face addressing: the bijection between faces with 2D face
//! coordinates and 3D unit directions.
//!
//! Face layout and UV orientation follow the horizontal-cross convention:
//!
//! ```text
//!              +----------+
//!              | +---->+x |
//!              | |  +y    |
//!              |+z      2 |
//!   +----------+----------+----------+----------+
//!   | +---->+z | +---->+x | +---->-z | +---->-x |
//!   | |  -x    | |  +z    | |  +x    | |  -z    |
//!   |-y      1 |-y      4 |-y      0 |-y      5 |
//!   +----------+----------+----------+----------+
//!              | +---->+x |
//!              | |  -y    |
//!              |-z      3 |
//!              +----------+
//! ```

use glam::Vec3;

use crate::geom;

/// One of the six cube-map faces, in `+X, -X, +Y, -Y, +Z, -Z` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    /// `+X` face.
    PosX = 0,
    /// `-X` face.
    NegX = 1,
    /// `+Y` face.
    PosY = 2,
    /// `-Y` face.
    NegY = 3,
    /// `+Z` face.
    PosZ = 4,
    /// `-Z` face.
    NegZ = 5,
}

impl CubeFace {
    /// All six faces in index order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    /// Numeric face index (`+X = 0` ... `-Z = 5`).
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Face for a numeric index, `None` when out of range.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<CubeFace> {
        match index {
            0 => Some(CubeFace::PosX),
            1 => Some(CubeFace::NegX),
            2 => Some(CubeFace::PosY),
            3 => Some(CubeFace::NegY),
            4 => Some(CubeFace::PosZ),
            5 => Some(CubeFace::NegZ),
            _ => None,
        }
    }
}

/// One edge of a cube-map face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeEdge {
    /// Left edge (`u = 0`).
    Left = 0,
    /// Right edge (`u = 1`).
    Right = 1,
    /// Top edge (`v = 0`).
    Top = 2,
    /// Bottom edge (`v = 1`).
    Bottom = 3,
}

/// Per-face UV basis: the mapping `(u, v, 1) -> world direction`.
#[derive(Debug, Clone, Copy)]
pub struct FaceUvBasis {
    /// Direction of increasing `u` across the face.
    pub u_axis: Vec3,
    /// Direction of increasing `v` down the face.
    pub v_axis: Vec3,
    /// Outward face normal.
    pub face_axis: Vec3,
}

/// UV bases for the six faces, indexed by [`CubeFace::index`].
pub const FACE_UV: [FaceUvBasis; 6] = [
    // +X
    FaceUvBasis {
        u_axis: Vec3::new(0.0, 0.0, -1.0),
        v_axis: Vec3::new(0.0, -1.0, 0.0),
        face_axis: Vec3::new(1.0, 0.0, 0.0),
    },
    // -X
    FaceUvBasis {
        u_axis: Vec3::new(0.0, 0.0, 1.0),
        v_axis: Vec3::new(0.0, -1.0, 0.0),
        face_axis: Vec3::new(-1.0, 0.0, 0.0),
    },
    // +Y
    FaceUvBasis {
        u_axis: Vec3::new(1.0, 0.0, 0.0),
        v_axis: Vec3::new(0.0, 0.0, 1.0),
        face_axis: Vec3::new(0.0, 1.0, 0.0),
    },
    // -Y
    FaceUvBasis {
        u_axis: Vec3::new(1.0, 0.0, 0.0),
        v_axis: Vec3::new(0.0, 0.0, -1.0),
        face_axis: Vec3::new(0.0, -1.0, 0.0),
    },
    // +Z
    FaceUvBasis {
        u_axis: Vec3::new(1.0, 0.0, 0.0),
        v_axis: Vec3::new(0.0, -1.0, 0.0),
        face_axis: Vec3::new(0.0, 0.0, 1.0),
    },
    // -Z
    FaceUvBasis {
        u_axis: Vec3::new(-1.0, 0.0, 0.0),
        v_axis: Vec3::new(0.0, -1.0, 0.0),
        face_axis: Vec3::new(0.0, 0.0, -1.0),
    },
];

/// Neighbour faces of each face in left/right/top/bottom order, paired with
/// the edge of the neighbour that touches it.
///
/// Kept for edge-seam work; the filters themselves do not consume it.
pub const FACE_NEIGHBOURS: [[(CubeFace, CubeEdge); 4]; 6] = [
    // +X
    [
        (CubeFace::PosZ, CubeEdge::Right),
        (CubeFace::NegZ, CubeEdge::Left),
        (CubeFace::PosY, CubeEdge::Right),
        (CubeFace::NegY, CubeEdge::Right),
    ],
    // -X
    [
        (CubeFace::NegZ, CubeEdge::Right),
        (CubeFace::PosZ, CubeEdge::Left),
        (CubeFace::PosY, CubeEdge::Left),
        (CubeFace::NegY, CubeEdge::Left),
    ],
    // +Y
    [
        (CubeFace::NegX, CubeEdge::Top),
        (CubeFace::PosX, CubeEdge::Top),
        (CubeFace::NegZ, CubeEdge::Top),
        (CubeFace::PosZ, CubeEdge::Top),
    ],
    // -Y
    [
        (CubeFace::NegX, CubeEdge::Bottom),
        (CubeFace::PosX, CubeEdge::Bottom),
        (CubeFace::PosZ, CubeEdge::Bottom),
        (CubeFace::NegZ, CubeEdge::Bottom),
    ],
    // +Z
    [
        (CubeFace::NegX, CubeEdge::Right),
        (CubeFace::PosX, CubeEdge::Left),
        (CubeFace::PosY, CubeEdge::Bottom),
        (CubeFace::NegY, CubeEdge::Top),
    ],
    // -Z
    [
        (CubeFace::PosX, CubeEdge::Right),
        (CubeFace::NegX, CubeEdge::Left),
        (CubeFace::PosY, CubeEdge::Top),
        (CubeFace::NegY, CubeEdge::Bottom),
    ],
];

/// Convert a face with center-addressed `(u, v)` in `[-1, 1]` to a unit
/// direction.
#[must_use]
pub fn face_uv_to_dir(face: CubeFace, u: f32, v: f32) -> Vec3 {
    let basis = &FACE_UV[face.index()];
    (u * basis.u_axis + v * basis.v_axis + basis.face_axis).normalize()
}

/// Like [`face_uv_to_dir`] but with the cubic edge warp applied first.
#[must_use]
pub fn face_uv_to_dir_warped(
    face: CubeFace,
    u: f32,
    v: f32,
    warp_factor: f32,
) -> Vec3 {
    face_uv_to_dir(
        face,
        geom::warp(u, warp_factor),
        geom::warp(v, warp_factor),
    )
}

/// Project a direction onto the cube, returning the face it pierces and
/// `(u, v)` in `[0, 1]`.
///
/// The face is the axis with the largest absolute component; ties resolve in
/// X, Y, Z order. The input does not need to be normalized.
#[must_use]
pub fn dir_to_face_uv(dir: Vec3) -> (CubeFace, f32, f32) {
    let a = dir.abs();
    let max = a.max_element();

    let face = if max == a.x {
        if dir.x >= 0.0 {
            CubeFace::PosX
        } else {
            CubeFace::NegX
        }
    } else if max == a.y {
        if dir.y >= 0.0 {
            CubeFace::PosY
        } else {
            CubeFace::NegY
        }
    } else if dir.z >= 0.0 {
        CubeFace::PosZ
    } else {
        CubeFace::NegZ
    };

    // Project the other two components onto the face basis.
    let face_vec = dir / max;
    let basis = &FACE_UV[face.index()];
    let u = (basis.u_axis.dot(face_vec) + 1.0) * 0.5;
    let v = (basis.v_axis.dot(face_vec) + 1.0) * 0.5;
    (face, u, v)
}
