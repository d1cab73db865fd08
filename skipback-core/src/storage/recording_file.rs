use std::path::Path;

use crate::models::config::RecorderConfiguration;
use crate::models::error::RecorderError;
use crate::models::recording_result::{CapturedAudio, RecordingMetadata, RecordingResult};
use crate::storage::metadata::write_metadata;
use crate::storage::naming::unique_recording_path;
use crate::storage::wav_writer::WavFileWriter;

/// Persist a finished session as one WAV file in the configured output
/// directory, named after the session's end time.
///
/// Called from the control thread after the samples have been extracted,
/// never while the capture path's locks are held.
pub fn save_recording(config: &RecorderConfiguration, audio: &CapturedAudio) -> Result<RecordingResult, RecorderError> {
    let file_path = unique_recording_path(&config.output_directory, &audio.ended_at, &config.output_format);

    let mut writer = WavFileWriter::new(file_path.clone(), config.sample_rate, config.channels);
    let checksum = match write_wav(&mut writer, &audio.samples) {
        Ok(checksum) => checksum,
        Err(e) => {
            writer.discard();
            return Err(e);
        }
    };

    let duration_secs = audio.duration_secs(config.sample_rate, config.channels);
    let metadata = RecordingMetadata {
        id: uuid::Uuid::new_v4().to_string(),
        file_path: file_path.to_string_lossy().to_string(),
        checksum: checksum.clone(),
        duration_secs,
        sample_rate: config.sample_rate,
        channels: config.channels,
        sample_count: audio.samples.len(),
        pre_roll_samples: audio.pre_roll_samples,
        skip_back_secs: config.skip_back_secs,
        started_at: audio.started_at.to_rfc3339(),
        ended_at: audio.ended_at.to_rfc3339(),
    };

    if config.write_metadata_sidecar {
        write_sidecar(&metadata, &file_path);
    }

    Ok(RecordingResult {
        file_path,
        duration_secs,
        sample_count: audio.samples.len(),
        checksum,
        metadata,
    })
}

fn write_wav(writer: &mut WavFileWriter, samples: &[i16]) -> Result<String, RecorderError> {
    writer.open()?;
    writer.write_samples(samples)?;
    writer.close()
}

// The recording itself is already safe on disk; a missing sidecar is only logged.
fn write_sidecar(metadata: &RecordingMetadata, file_path: &Path) {
    if let Err(e) = write_metadata(metadata, file_path) {
        log::warn!("Failed to write metadata for {}: {}", file_path.display(), e);
    }
}
