use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use crate::models::error::RecorderError;

/// Notifications emitted by the recorder to the surrounding application.
///
/// All methods are called from the control thread, never from the audio
/// callback. Implementations should marshal to a UI thread if needed.
pub trait RecorderDelegate: Send + Sync {
    /// A session started.
    ///
    /// `path` is provisional: files are named from the time the session
    /// stops, so a session longer than a second lands elsewhere in the same
    /// directory. The path passed to `on_recording_stopped` is the real one.
    fn on_recording_started(&self, path: &Path);

    /// A session ended. `None` when nothing was written (empty or failed).
    fn on_recording_stopped(&self, path: Option<&Path>);

    /// Called every control tick with the latest block level in `[0, 1]`.
    fn on_level_changed(&self, level: f32);

    /// Called for every non-fatal error.
    fn on_error(&self, error: &RecorderError);
}

/// A notification as a value, for consumers that prefer a queue.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    /// Provisional path; see [`RecorderDelegate::on_recording_started`].
    RecordingStarted(PathBuf),
    RecordingStopped(Option<PathBuf>),
    LevelChanged(f32),
    ErrorOccurred(RecorderError),
}

/// Delegate that forwards every notification into an `mpsc` channel.
///
/// Sends never block; events are dropped once the receiver is gone.
pub struct ChannelDelegate {
    sender: Sender<RecorderEvent>,
}

impl ChannelDelegate {
    pub fn new() -> (Arc<Self>, Receiver<RecorderEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Arc::new(Self { sender }), receiver)
    }

    fn send(&self, event: RecorderEvent) {
        let _ = self.sender.send(event);
    }
}

impl RecorderDelegate for ChannelDelegate {
    fn on_recording_started(&self, path: &Path) {
        self.send(RecorderEvent::RecordingStarted(path.to_path_buf()));
    }

    fn on_recording_stopped(&self, path: Option<&Path>) {
        self.send(RecorderEvent::RecordingStopped(path.map(Path::to_path_buf)));
    }

    fn on_level_changed(&self, level: f32) {
        self.send(RecorderEvent::LevelChanged(level));
    }

    fn on_error(&self, error: &RecorderError) {
        self.send(RecorderEvent::ErrorOccurred(error.clone()));
    }
}
