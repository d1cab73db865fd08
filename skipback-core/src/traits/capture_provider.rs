use std::sync::Arc;

use crate::models::audio_models::{AudioSource, DeviceBlock, StreamFormat};
use crate::models::error::RecorderError;

/// Callback invoked once per hardware block.
///
/// Runs on the driver's real-time thread: implementations must not block,
/// perform I/O, or do unbounded work.
pub type AudioBlockCallback = Arc<dyn Fn(DeviceBlock<'_>) + Send + Sync + 'static>;

/// Interface for platform-specific audio input devices.
///
/// Implemented by:
/// - `WasapiInputCapture` (Windows)
pub trait CaptureProvider: Send {
    /// Whether this input device is currently available.
    fn is_available(&self) -> bool;

    /// Open the device with `format` and start delivering blocks via `callback`.
    ///
    /// The callback fires on a dedicated audio thread; keep processing minimal.
    fn start(&mut self, format: StreamFormat, callback: AudioBlockCallback) -> Result<(), RecorderError>;

    /// Take the error that ended delivery after a successful `start`, such
    /// as an unplugged device. Each failure is returned once.
    fn take_stream_error(&mut self) -> Option<RecorderError> {
        None
    }

    /// Stop delivery and release the device. Must be idempotent.
    fn stop(&mut self) -> Result<(), RecorderError>;

    /// Information about the audio device backing this provider.
    fn device_info(&self) -> AudioSource;
}
