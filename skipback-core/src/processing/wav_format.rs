//! RIFF/WAVE (PCM) header generation and parsing.
//!
//! The recorder only writes the canonical 44-byte layout: one `fmt ` chunk
//! followed directly by the `data` chunk.

use std::fs;
use std::path::Path;

use crate::models::error::RecorderError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

/// Bit depth of every file the recorder writes.
pub const PCM_BIT_DEPTH: u16 = 16;

/// Largest `data` chunk whose RIFF size (`36 + data_size`) still fits in a u32.
pub const MAX_DATA_SIZE: u32 = u32::MAX - 36;

/// The `data` chunk size for `bytes` of PCM, or `None` past [`MAX_DATA_SIZE`].
pub fn data_chunk_size(bytes: u64) -> Option<u32> {
    u32::try_from(bytes).ok().filter(|size| *size <= MAX_DATA_SIZE)
}

/// Generate a 44-byte WAV RIFF header.
///
/// Format: PCM (format code 1), little-endian.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    file size - 8 (36 + data_size)
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  channels
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * channels * bit_depth / 8
/// [32-33]  block_align = channels * bit_depth / 8
/// [34-35]  bit_depth
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
///
/// `data_size` above [`MAX_DATA_SIZE`] saturates the RIFF size; callers
/// check [`data_chunk_size`] first.
pub fn generate_wav_header(sample_rate: u32, bit_depth: u16, channels: u16, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let byte_rate = sample_rate * channels as u32 * bit_depth as u32 / 8;
    let block_align = channels * bit_depth / 8;
    let chunk_size = data_size.saturating_add(36);

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bit_depth.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Fields read back from a canonical WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
    pub data_size: u32,
}

/// Parse a canonical 44-byte PCM header.
pub fn parse_wav_header(bytes: &[u8]) -> Result<WavInfo, String> {
    if bytes.len() < WAV_HEADER_SIZE {
        return Err(format!("header too short: {} bytes", bytes.len()));
    }
    if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err("not a RIFF/WAVE file".into());
    }
    if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
        return Err("unsupported chunk layout".into());
    }
    let format_code = u16::from_le_bytes([bytes[20], bytes[21]]);
    if format_code != 1 {
        return Err(format!("unsupported format code: {}", format_code));
    }

    Ok(WavInfo {
        channels: u16::from_le_bytes([bytes[22], bytes[23]]),
        sample_rate: u32::from_le_bytes([bytes[24], bytes[25], bytes[26], bytes[27]]),
        bit_depth: u16::from_le_bytes([bytes[34], bytes[35]]),
        data_size: u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]),
    })
}

/// Read a 16-bit PCM WAV file written by the recorder.
pub fn read_pcm16_file(path: &Path) -> Result<(WavInfo, Vec<i16>), RecorderError> {
    let bytes = fs::read(path)
        .map_err(|e| RecorderError::Unknown(format!("failed to read {}: {}", path.display(), e)))?;
    let info = parse_wav_header(&bytes).map_err(RecorderError::Unknown)?;
    if info.bit_depth != PCM_BIT_DEPTH {
        return Err(RecorderError::Unknown(format!("unsupported bit depth: {}", info.bit_depth)));
    }

    let end = (WAV_HEADER_SIZE + info.data_size as usize).min(bytes.len());
    let samples = bytes[WAV_HEADER_SIZE..end]
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok((info, samples))
}
