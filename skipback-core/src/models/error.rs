use thiserror::Error;

/// Errors surfaced by the recorder.
///
/// None of these are fatal: each one is reported through the delegate and
/// leaves the capture source and session in a state from which the user can
/// simply try again. An empty recording is not an error and has no variant
/// here (see `SessionEnd::Empty`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecorderError {
    /// The audio device could not be opened or started. Capture stays stopped.
    #[error("device open failed: {0}")]
    DeviceOpenFailure(String),

    /// The driver flagged an overrun/underrun on one or more blocks.
    #[error("device callback anomaly: {0}")]
    DeviceCallbackAnomaly(String),

    /// A finished recording could not be persisted.
    #[error("file write failed: {0}")]
    FileWriteFailure(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("device not available")]
    DeviceNotAvailable,

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl RecorderError {
    /// Whether the error came from the audio device rather than storage.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::DeviceOpenFailure(_) | Self::DeviceCallbackAnomaly(_) | Self::DeviceNotAvailable
        )
    }
}
