//! Conversion of native device blocks to interleaved 16-bit PCM, and the
//! block level metric.
//!
//! Everything here runs inside the capture callback: pure arithmetic on
//! caller-provided buffers, no I/O.

use crate::models::audio_models::SampleBlock;

/// Full-scale magnitude used for both conversion and level normalization.
pub const FULL_SCALE: f32 = i16::MAX as f32;

/// Convert one float sample in `[-1.0, 1.0]` to 16-bit PCM. Clamps out-of-range values.
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * FULL_SCALE) as i16
}

/// Convert a native block into interleaved `i16` samples, replacing the
/// contents of `out`.
///
/// Interleaved input keeps its layout (`[L0, R0, L1, R1, ...]` for stereo,
/// mono passes through). Planar input is interleaved frame by frame; a
/// channel shorter than the others is padded with silence.
pub fn convert_block(block: SampleBlock<'_>, out: &mut Vec<i16>) {
    out.clear();
    match block {
        SampleBlock::I16(samples) => out.extend_from_slice(samples),
        SampleBlock::F32(samples) => out.extend(samples.iter().map(|&s| f32_to_i16(s))),
        SampleBlock::PlanarF32(planes) => interleave_planar(planes, out),
    }
}

/// Interleave per-channel float slices into `[c0_0, c1_0, ..., c0_1, c1_1, ...]`.
pub fn interleave_planar(planes: &[&[f32]], out: &mut Vec<i16>) {
    let frame_count = planes.iter().map(|p| p.len()).max().unwrap_or(0);
    out.reserve(frame_count * planes.len());
    for i in 0..frame_count {
        for plane in planes {
            out.push(plane.get(i).map_or(0, |&s| f32_to_i16(s)));
        }
    }
}

/// Mean absolute amplitude of a block, normalized to `[0.0, 1.0]`.
pub fn mean_abs_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: u64 = samples.iter().map(|&s| s.unsigned_abs() as u64).sum();
    let mean = sum as f64 / samples.len() as f64;
    (mean / FULL_SCALE as f64).min(1.0) as f32
}

/// Serialize samples as little-endian PCM bytes.
pub fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut data = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        data.extend_from_slice(&sample.to_le_bytes());
    }
    data
}
