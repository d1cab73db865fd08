use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Returned by `RecordingSession::begin` when a new session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    pub started_at: DateTime<Local>,
    /// Samples spliced in from the rolling buffer.
    pub pre_roll_samples: usize,
    /// Where the recording would land if it were stopped right now.
    /// The authoritative path is the one in `RecordingResult`.
    pub planned_path: PathBuf,
}

/// Outcome of `RecordingSession::end`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// No session was active; nothing happened.
    NotActive,
    /// The session held no samples, so no file was written.
    Empty,
    /// The recording was written to disk.
    Saved(RecordingResult),
}

impl SessionEnd {
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Saved(result) => Some(&result.file_path),
            _ => None,
        }
    }
}

/// A finished recording on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    pub duration_secs: f64,
    /// Interleaved samples written (frames × channels).
    pub sample_count: usize,
    /// SHA-256 hex digest of the complete file.
    pub checksum: String,
    pub metadata: RecordingMetadata,
}

/// Metadata describing a recording, exportable as a JSON sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub file_path: String,
    pub checksum: String,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_count: usize,
    pub pre_roll_samples: usize,
    pub skip_back_secs: f64,
    pub started_at: String,
    pub ended_at: String,
}

/// Samples extracted from a finished session, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    /// Pre-roll snapshot followed by every live block, in arrival order.
    pub samples: Vec<i16>,
    pub pre_roll_samples: usize,
    /// Live blocks appended after `begin` (the pre-roll is not counted).
    pub live_blocks: usize,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
}

impl CapturedAudio {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self, sample_rate: u32, channels: u16) -> f64 {
        let frames = self.samples.len() / channels.max(1) as usize;
        frames as f64 / sample_rate as f64
    }
}
