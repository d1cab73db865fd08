//! # skipback-core
//!
//! Platform-agnostic core of a skip-back recorder.
//!
//! The input stream runs continuously into a rolling buffer holding the last
//! few seconds of audio. When a recording starts, that window is spliced onto
//! the head of the new recording, so the saved file begins *before* the
//! moment the user pressed record. Platform backends (Windows WASAPI)
//! implement the `CaptureProvider` trait and plug into `RecorderController`.
//!
//! ## Architecture
//!
//! ```text
//! skipback-core (this crate)
//! ├── traits/       ← CaptureProvider, RecorderDelegate
//! ├── models/       ← RecorderError, RecorderConfiguration, SessionState, RecordingResult, etc.
//! ├── processing/   ← RingBuffer, RollingAudioBuffer, PCM conversion + level, WAV format
//! ├── capture/      ← CaptureSource (real-time block path)
//! ├── session/      ← RecordingSession (state machine + accumulator)
//! ├── controller/   ← RecorderController (control thread)
//! └── storage/      ← WavFileWriter, output naming, metadata sidecar
//! ```
//!
//! ## Threads
//!
//! - the driver's audio thread runs `CaptureShared::process_block` and never blocks on I/O;
//! - the `recorder-control` thread applies start/stop requests, writes files and reports levels;
//! - the caller issues requests and receives `RecorderDelegate` notifications.

pub mod capture;
pub mod controller;
pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use capture::source::{CaptureShared, CaptureSource};
pub use controller::recorder::RecorderController;
pub use models::audio_models::{
    AudioSource, AudioTransportType, BlockStatus, CaptureDiagnostics, DeviceBlock, SampleBlock, StreamFormat,
};
pub use models::config::RecorderConfiguration;
pub use models::error::RecorderError;
pub use models::recording_result::{CapturedAudio, RecordingMetadata, RecordingResult, SessionEnd, SessionStart};
pub use models::state::{CaptureState, SessionState};
pub use processing::ring_buffer::RingBuffer;
pub use processing::rolling_buffer::RollingAudioBuffer;
pub use session::recording::RecordingSession;
pub use storage::wav_writer::WavFileWriter;
pub use traits::capture_delegate::{ChannelDelegate, RecorderDelegate, RecorderEvent};
pub use traits::capture_provider::{AudioBlockCallback, CaptureProvider};
