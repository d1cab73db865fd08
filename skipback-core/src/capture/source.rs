use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{AudioSource, CaptureDiagnostics, DeviceBlock, StreamFormat};
use crate::models::error::RecorderError;
use crate::models::state::CaptureState;
use crate::processing::pcm;
use crate::processing::rolling_buffer::RollingAudioBuffer;
use crate::session::recording::RecordingSession;
use crate::traits::capture_provider::{AudioBlockCallback, CaptureProvider};

/// State shared between the device callback and the control thread.
///
/// [`process_block`](Self::process_block) is the whole real-time path:
/// convert, meter, append to the rolling buffer, append to the session.
pub struct CaptureShared {
    channels: usize,
    rolling: Arc<RollingAudioBuffer>,
    session: Arc<RecordingSession>,
    /// f32 bits of the last block's level.
    level: AtomicU32,
    // Only ever locked by the callback thread; reused so converting a block
    // does not allocate once it has grown to block size.
    scratch: Mutex<Vec<i16>>,
    blocks_delivered: AtomicU64,
    samples_delivered: AtomicU64,
    blocks_recorded: AtomicU64,
    anomalies: AtomicU64,
}

impl CaptureShared {
    pub fn new(format: StreamFormat, rolling: Arc<RollingAudioBuffer>, session: Arc<RecordingSession>) -> Self {
        Self {
            channels: format.channels as usize,
            rolling,
            session,
            level: AtomicU32::new(0f32.to_bits()),
            scratch: Mutex::new(Vec::with_capacity(format.block_samples())),
            blocks_delivered: AtomicU64::new(0),
            samples_delivered: AtomicU64::new(0),
            blocks_recorded: AtomicU64::new(0),
            anomalies: AtomicU64::new(0),
        }
    }

    /// Handle one hardware block. No I/O, no logging.
    pub fn process_block(&self, block: DeviceBlock<'_>) {
        if block.status.is_anomaly() {
            self.anomalies.fetch_add(1, Ordering::Relaxed);
        }

        let mut scratch = self.scratch.lock();
        pcm::convert_block(block.samples, &mut scratch);
        if block.frames > 0 {
            scratch.truncate(block.frames * self.channels);
        }

        let level = pcm::mean_abs_level(&scratch);
        self.level.store(level.to_bits(), Ordering::Relaxed);

        self.rolling.append(&scratch);
        if self.session.append_block(&scratch) {
            self.blocks_recorded.fetch_add(1, Ordering::Relaxed);
        }

        self.blocks_delivered.fetch_add(1, Ordering::Relaxed);
        self.samples_delivered.fetch_add(scratch.len() as u64, Ordering::Relaxed);
    }

    /// Level of the most recent block, in `[0, 1]`.
    pub fn current_level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        CaptureDiagnostics {
            blocks_delivered: self.blocks_delivered.load(Ordering::Relaxed),
            samples_delivered: self.samples_delivered.load(Ordering::Relaxed),
            blocks_recorded: self.blocks_recorded.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
        }
    }

    fn reset_level(&self) {
        self.level.store(0f32.to_bits(), Ordering::Relaxed);
    }
}

/// Owns the input device and feeds its blocks into the rolling buffer and
/// the active recording.
///
/// ```text
/// [CaptureProvider] → process_block ─┬→ [RollingAudioBuffer]        (always)
///                                    └→ [RecordingSession]          (while recording)
/// ```
pub struct CaptureSource<P: CaptureProvider> {
    provider: P,
    format: StreamFormat,
    shared: Arc<CaptureShared>,
    state: CaptureState,
}

impl<P: CaptureProvider> CaptureSource<P> {
    pub fn new(
        provider: P,
        format: StreamFormat,
        rolling: Arc<RollingAudioBuffer>,
        session: Arc<RecordingSession>,
    ) -> Self {
        Self {
            provider,
            format,
            shared: Arc::new(CaptureShared::new(format, rolling, session)),
            state: CaptureState::Stopped,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn shared(&self) -> &Arc<CaptureShared> {
        &self.shared
    }

    pub fn device_info(&self) -> AudioSource {
        self.provider.device_info()
    }

    /// Open the device and start streaming into the rolling buffer.
    ///
    /// On failure the source stays `Stopped` and the error is returned as
    /// `DeviceOpenFailure`; there is no automatic retry.
    pub fn open_and_start(&mut self) -> Result<(), RecorderError> {
        if self.state.is_streaming() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let callback: AudioBlockCallback = Arc::new(move |block: DeviceBlock<'_>| shared.process_block(block));

        self.provider.start(self.format, callback).map_err(|e| match e {
            RecorderError::DeviceOpenFailure(_) => e,
            other => RecorderError::DeviceOpenFailure(other.to_string()),
        })?;

        self.state = CaptureState::Streaming;
        log::info!(
            "Capture started on {} ({} Hz, {} ch, {} frames/block)",
            self.provider.device_info().name,
            self.format.sample_rate,
            self.format.channels,
            self.format.block_size
        );
        Ok(())
    }

    /// Stop delivery and release the device. Idempotent.
    pub fn stop_and_close(&mut self) -> Result<(), RecorderError> {
        if !self.state.is_streaming() {
            return Ok(());
        }
        self.state = CaptureState::Stopped;
        self.shared.reset_level();
        self.provider.stop()?;
        log::info!("Capture stopped");
        Ok(())
    }

    /// Check whether the stream died on its own since the last call.
    ///
    /// A failed stream is closed and the source drops back to `Stopped`; the
    /// returned error is always a device error.
    pub fn poll_stream_failure(&mut self) -> Option<RecorderError> {
        if !self.state.is_streaming() {
            return None;
        }
        let error = self.provider.take_stream_error()?;
        let error = if error.is_device_error() {
            error
        } else {
            RecorderError::DeviceOpenFailure(format!("capture stream ended: {}", error))
        };

        log::error!("Capture stream failed: {}", error);
        if let Err(e) = self.stop_and_close() {
            log::warn!("Failed to release failed stream: {}", e);
        }
        Some(error)
    }

    pub fn current_level(&self) -> f32 {
        self.shared.current_level()
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.shared.diagnostics()
    }
}
