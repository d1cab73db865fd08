use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::error::RecorderError;
use crate::processing::{pcm, wav_format};

/// WAV file writer for 16-bit interleaved PCM.
///
/// ## File Format
/// ```text
/// [44-byte WAV header]
/// [raw 16-bit little-endian PCM data...]
/// ```
///
/// The header is written with a zero data size on `open` and rewritten with
/// the final sizes on `close`.
pub struct WavFileWriter {
    file_path: PathBuf,
    sample_rate: u32,
    channels: u16,
    file: Option<BufWriter<File>>,
    created: bool,
    total_bytes_written: u64,
}

impl WavFileWriter {
    pub fn new(file_path: PathBuf, sample_rate: u32, channels: u16) -> Self {
        Self {
            file_path,
            sample_rate,
            channels,
            file: None,
            created: false,
            total_bytes_written: 0,
        }
    }

    /// Create the file (and its directory) and write the placeholder header.
    pub fn open(&mut self) -> Result<(), RecorderError> {
        if self.file.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RecorderError::FileWriteFailure(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&self.file_path)
            .map_err(|e| RecorderError::FileWriteFailure(format!("failed to create file: {}", e)))?;
        self.file = Some(BufWriter::new(file));
        self.created = true;

        let header = wav_format::generate_wav_header(self.sample_rate, wav_format::PCM_BIT_DEPTH, self.channels, 0);
        self.write_raw(&header)
    }

    /// Append interleaved samples.
    pub fn write_samples(&mut self, samples: &[i16]) -> Result<(), RecorderError> {
        if self.file.is_none() {
            return Err(RecorderError::FileWriteFailure("file is not open for writing".into()));
        }
        self.write_raw(&pcm::to_le_bytes(samples))
    }

    /// Finalize the file: rewrite the header with real sizes, flush, and
    /// return the SHA-256 checksum of the finished file.
    pub fn close(&mut self) -> Result<String, RecorderError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| RecorderError::FileWriteFailure("file is not open".into()))?;

        let data_size = self.total_bytes_written - wav_format::WAV_HEADER_SIZE as u64;
        let data_size = wav_format::data_chunk_size(data_size)
            .ok_or_else(|| RecorderError::FileWriteFailure("recording exceeds the 4 GiB WAV limit".into()))?;
        let header = wav_format::generate_wav_header(self.sample_rate, wav_format::PCM_BIT_DEPTH, self.channels, data_size);

        file.seek(SeekFrom::Start(0))
            .map_err(|e| RecorderError::FileWriteFailure(e.to_string()))?;
        file.write_all(&header)
            .map_err(|e| RecorderError::FileWriteFailure(e.to_string()))?;
        file.flush().map_err(|e| RecorderError::FileWriteFailure(e.to_string()))?;
        file.get_ref()
            .sync_all()
            .map_err(|e| RecorderError::FileWriteFailure(format!("failed to sync file: {}", e)))?;
        drop(file);

        sha256_file(&self.file_path)
    }

    /// Close without finalizing and remove whatever this writer created.
    pub fn discard(&mut self) {
        self.file = None;
        if !self.created {
            return;
        }
        self.created = false;
        if let Err(e) = fs::remove_file(&self.file_path) {
            log::warn!("Failed to remove partial recording {}: {}", self.file_path.display(), e);
        }
    }

    /// Total bytes written so far (including WAV header).
    pub fn bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), RecorderError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| RecorderError::FileWriteFailure("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| RecorderError::FileWriteFailure(format!("write failed: {}", e)))?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, RecorderError> {
    let data = fs::read(path)
        .map_err(|e| RecorderError::FileWriteFailure(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
