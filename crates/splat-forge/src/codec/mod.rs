//! Gaussian-splat point clouds: PLY input and the compact `.splat` encoding

mod ply;
mod splat;

pub use ply::{read_ply, read_ply_file, PlyFormat, PlyHeader, REQUIRED_PROPERTIES};
pub use splat::{decode, encode, importance, SplatRecord, RECORD_SIZE, SH_C0};

/// One Gaussian as stored in a reconstruction `.ply`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SplatPoint {
    pub position: [f32; 3],
    /// Natural-log scale per axis
    pub log_scale: [f32; 3],
    /// Opacity before the sigmoid
    pub opacity: f32,
    /// Band-0 spherical-harmonic color coefficients
    pub color_dc: [f32; 3],
    /// Rotation quaternion, not necessarily normalized
    pub rotation: [f32; 4],
}

impl SplatPoint {
    /// Build from a decoded row; `columns` indexes `row` in [`REQUIRED_PROPERTIES`] order
    pub(crate) fn from_columns(row: &[f64], columns: &[usize; 14]) -> Self {
        let v = |i: usize| row[columns[i]] as f32;
        Self {
            position: [v(0), v(1), v(2)],
            log_scale: [v(3), v(4), v(5)],
            opacity: v(6),
            color_dc: [v(7), v(8), v(9)],
            rotation: [v(10), v(11), v(12), v(13)],
        }
    }
}
