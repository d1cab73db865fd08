use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::StreamFormat;
use super::error::RecorderError;

/// The only container the recorder writes.
pub const WAV_FORMAT_TAG: &str = "wav";

/// Longest pre-roll window the rolling buffer will allocate, in seconds.
pub const MAX_SKIP_BACK_SECS: f64 = 3600.0;

/// Highest capture rate accepted, in Hz.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Recorder configuration, fixed for the lifetime of a controller.
///
/// Every field has a default, so a JSON file only needs to name the values
/// it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfiguration {
    /// Capture sample rate in Hz (default: 44100).
    pub sample_rate: u32,

    /// Interleaved channel count, 1 or 2 (default: 2).
    pub channels: u16,

    /// Frames per hardware block (default: 2048).
    pub block_size: u32,

    /// Length of the pre-roll window kept in the rolling buffer (default: 2s).
    pub skip_back_secs: f64,

    /// Directory where recordings are written. Created on first save.
    pub output_directory: PathBuf,

    /// Output container tag, used as the file extension. Only `wav` is supported.
    pub output_format: String,

    /// Control loop tick in milliseconds (default: 30).
    pub poll_interval_ms: u64,

    /// Write a `.metadata.json` sidecar next to every recording.
    pub write_metadata_sidecar: bool,

    /// Specific input device ID, or None for the system default.
    pub device_id: Option<String>,
}

impl RecorderConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(format!("unsupported sample rate: {}", self.sample_rate));
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        if self.block_size == 0 {
            return Err("block size must be positive".into());
        }
        if !self.skip_back_secs.is_finite() || self.skip_back_secs < 0.0 {
            return Err(format!("invalid skip-back length: {}", self.skip_back_secs));
        }
        if self.skip_back_secs > MAX_SKIP_BACK_SECS {
            return Err(format!(
                "skip-back length {}s exceeds the {}s limit",
                self.skip_back_secs, MAX_SKIP_BACK_SECS
            ));
        }
        if self.skip_back_frames().checked_mul(self.channels as usize).is_none() {
            return Err(format!("skip-back length {}s does not fit in memory", self.skip_back_secs));
        }
        if self.output_format != WAV_FORMAT_TAG {
            return Err(format!("unsupported output format: {}", self.output_format));
        }
        if self.poll_interval_ms == 0 {
            return Err("poll interval must be positive".into());
        }
        Ok(())
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file(path: &Path) -> Result<Self, RecorderError> {
        let json = fs::read_to_string(path).map_err(|e| {
            RecorderError::ConfigurationFailed(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| {
            RecorderError::ConfigurationFailed(format!("failed to parse {}: {}", path.display(), e))
        })?;
        config.validate().map_err(RecorderError::ConfigurationFailed)?;
        Ok(config)
    }

    /// Number of frames retained by the rolling buffer.
    pub fn skip_back_frames(&self) -> usize {
        (self.skip_back_secs * self.sample_rate as f64).round() as usize
    }

    /// Rolling buffer capacity in samples: `skip_back × sample_rate × channels`.
    ///
    /// Always a whole number of frames so eviction never splits a frame.
    pub fn rolling_capacity(&self) -> usize {
        self.skip_back_frames().saturating_mul(self.channels as usize)
    }

    pub fn stream_format(&self) -> StreamFormat {
        StreamFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            block_size: self.block_size,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for RecorderConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            block_size: 2048,
            skip_back_secs: 2.0,
            output_directory: PathBuf::from("./rec"),
            output_format: WAV_FORMAT_TAG.to_string(),
            poll_interval_ms: 30,
            write_metadata_sidecar: false,
            device_id: None,
        }
    }
}
