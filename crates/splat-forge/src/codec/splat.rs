//! Importance-ordered, quantized `.splat` encoding
//!
//! Each point becomes 32 little-endian bytes:
//! position (3 x f32), scale (3 x f32), RGBA (4 x u8), rotation (4 x u8).

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

use super::SplatPoint;

/// Bytes per encoded point
pub const RECORD_SIZE: usize = 32;

/// Band-0 spherical-harmonic constant, 1 / (2 * sqrt(pi))
pub const SH_C0: f64 = 0.28209479177387814;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Byte from a value in [0, 1]
fn unit_to_u8(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Sort key: large, opaque splats first
pub fn importance(point: &SplatPoint) -> f64 {
    let [s0, s1, s2] = point.log_scale.map(f64::from);
    (s0 + s1 + s2).exp() / (1.0 + (-f64::from(point.opacity)).exp())
}

/// Encode points in descending importance.
///
/// The output is exactly `RECORD_SIZE * points.len()` bytes and depends only
/// on the input values.
pub fn encode(points: &[SplatPoint]) -> Vec<u8> {
    let scores: Vec<f64> = points
        .iter()
        .map(|p| {
            let score = importance(p);
            if score.is_nan() { f64::NEG_INFINITY } else { score }
        })
        .collect();

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_unstable_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut buffer = vec![0u8; RECORD_SIZE * points.len()];
    for (record, &index) in buffer.chunks_exact_mut(RECORD_SIZE).zip(&order) {
        write_record(&points[index], record);
    }
    buffer
}

fn write_record(point: &SplatPoint, out: &mut [u8]) {
    LittleEndian::write_f32_into(&point.position, &mut out[0..12]);
    LittleEndian::write_f32_into(&point.log_scale.map(f32::exp), &mut out[12..24]);

    for (byte, c) in out[24..27].iter_mut().zip(point.color_dc) {
        *byte = unit_to_u8(0.5 + SH_C0 * f64::from(c));
    }
    out[27] = unit_to_u8(sigmoid(f64::from(point.opacity)));

    let q = point.rotation.map(f64::from);
    let norm = q.iter().map(|c| c * c).sum::<f64>().sqrt();
    for (byte, c) in out[28..32].iter_mut().zip(q) {
        // A degenerate quaternion maps to the center value
        let unit = if norm > 0.0 && norm.is_finite() { c / norm } else { 0.0 };
        *byte = (unit * 128.0 + 128.0).clamp(0.0, 255.0).round() as u8;
    }
}

/// One decoded 32-byte record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplatRecord {
    pub position: [f32; 3],
    pub scale: [f32; 3],
    pub rgba: [u8; 4],
    pub rotation: [u8; 4],
}

impl SplatRecord {
    /// RGBA channels back in [0, 1]
    pub fn rgba_unit(&self) -> [f32; 4] {
        self.rgba.map(|b| b as f32 / 255.0)
    }

    /// Quaternion components back in roughly [-1, 1]
    pub fn rotation_unit(&self) -> [f32; 4] {
        self.rotation.map(|b| (b as f32 - 128.0) / 128.0)
    }
}

/// Split an encoded buffer back into records
pub fn decode(bytes: &[u8]) -> Result<Vec<SplatRecord>> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(Error::format(format!(
            "splat buffer length {} is not a multiple of {}",
            bytes.len(),
            RECORD_SIZE
        )));
    }

    Ok(bytes
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| {
            let mut position = [0f32; 3];
            let mut scale = [0f32; 3];
            LittleEndian::read_f32_into(&chunk[0..12], &mut position);
            LittleEndian::read_f32_into(&chunk[12..24], &mut scale);
            SplatRecord {
                position,
                scale,
                rgba: [chunk[24], chunk[25], chunk[26], chunk[27]],
                rotation: [chunk[28], chunk[29], chunk[30], chunk[31]],
            }
        })
        .collect())
}
