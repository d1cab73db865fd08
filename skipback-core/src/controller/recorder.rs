use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::capture::source::{CaptureShared, CaptureSource};
use crate::models::audio_models::CaptureDiagnostics;
use crate::models::config::RecorderConfiguration;
use crate::models::error::RecorderError;
use crate::models::recording_result::SessionEnd;
use crate::models::state::CaptureState;
use crate::processing::rolling_buffer::RollingAudioBuffer;
use crate::session::recording::RecordingSession;
use crate::traits::capture_delegate::RecorderDelegate;
use crate::traits::capture_provider::CaptureProvider;

/// A start/stop intent recorded by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Start,
    Stop,
}

/// Intents in arrival order, drained by the control loop every tick.
///
/// A request equal to the last queued one is dropped, so repeated presses
/// collapse while a quick start-then-stop (or stop-then-start) keeps its order.
#[derive(Debug, Default)]
struct PendingRequests {
    queue: Vec<Request>,
}

impl PendingRequests {
    fn push(&mut self, request: Request) {
        if self.queue.last() != Some(&request) {
            self.queue.push(request);
        }
    }
}

/// State shared between the controller handle and its control thread.
struct ControlShared {
    requests: Mutex<PendingRequests>,
    running: AtomicBool,
    /// f32 bits of the last level reported to the delegate.
    level: AtomicU32,
    capture_state: Mutex<CaptureState>,
    session: Arc<RecordingSession>,
    capture: Arc<CaptureShared>,
}

/// Owns the capture device, rolling buffer and recording session, and drives
/// them from a dedicated control thread.
///
/// Requests are asynchronous: `request_start`/`request_stop` only record
/// intent, and the transition happens on the next control tick
/// (`poll_interval_ms`, 30 ms by default). Each tick also publishes the
/// current level to the delegate.
pub struct RecorderController {
    shared: Arc<ControlShared>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RecorderController {
    /// Validate `config`, build the rolling buffer, session and capture
    /// source, and start the control thread, which opens the device.
    ///
    /// A device that fails to open is reported through the delegate rather
    /// than here: the controller keeps running with capture `Stopped`.
    pub fn spawn<P>(
        config: RecorderConfiguration,
        provider: P,
        delegate: Arc<dyn RecorderDelegate>,
    ) -> Result<Self, RecorderError>
    where
        P: CaptureProvider + 'static,
    {
        config.validate().map_err(RecorderError::ConfigurationFailed)?;

        let interval = config.poll_interval();
        let format = config.stream_format();
        let rolling = Arc::new(RollingAudioBuffer::from_config(&config));
        let session = Arc::new(RecordingSession::new(config, Arc::clone(&rolling)));
        let source = CaptureSource::new(provider, format, rolling, Arc::clone(&session));

        let shared = Arc::new(ControlShared {
            requests: Mutex::new(PendingRequests::default()),
            running: AtomicBool::new(true),
            level: AtomicU32::new(0f32.to_bits()),
            capture_state: Mutex::new(CaptureState::Stopped),
            session,
            capture: Arc::clone(source.shared()),
        });

        let loop_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("recorder-control".into())
            .spawn(move || control_loop(source, loop_shared, delegate, interval))
            .map_err(|e| RecorderError::Unknown(format!("failed to spawn control thread: {}", e)))?;

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Ask the control thread to start recording. Idempotent.
    pub fn request_start(&self) {
        self.shared.requests.lock().push(Request::Start);
    }

    /// Ask the control thread to stop recording and save. Idempotent.
    pub fn request_stop(&self) {
        self.shared.requests.lock().push(Request::Stop);
    }

    /// The most recently reported level, in `[0, 1]`.
    pub fn current_level(&self) -> f32 {
        f32::from_bits(self.shared.level.load(Ordering::Relaxed))
    }

    pub fn is_recording(&self) -> bool {
        self.shared.session.is_recording()
    }

    pub fn capture_state(&self) -> CaptureState {
        *self.shared.capture_state.lock()
    }

    pub fn diagnostics(&self) -> CaptureDiagnostics {
        self.shared.capture.diagnostics()
    }

    /// Stop the control thread. An active recording is finalized first, then
    /// the device is stopped and released. Returns once no audio thread is
    /// left running; later calls do nothing.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shared.running.store(false, Ordering::SeqCst);
        if handle.join().is_err() {
            log::error!("Recorder control thread panicked");
        }
    }
}

impl Drop for RecorderController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn control_loop<P: CaptureProvider>(
    mut source: CaptureSource<P>,
    shared: Arc<ControlShared>,
    delegate: Arc<dyn RecorderDelegate>,
    interval: Duration,
) {
    match source.open_and_start() {
        Ok(()) => *shared.capture_state.lock() = CaptureState::Streaming,
        Err(e) => {
            log::error!("Failed to start capture: {}", e);
            delegate.on_error(&e);
        }
    }

    let mut reported_anomalies = 0u64;

    while shared.running.load(Ordering::SeqCst) {
        let requests = std::mem::take(&mut shared.requests.lock().queue);
        for request in requests {
            match request {
                Request::Start => begin_recording(&shared.session, delegate.as_ref()),
                Request::Stop => end_recording(&shared.session, delegate.as_ref()),
            }
        }

        if let Some(error) = source.poll_stream_failure() {
            *shared.capture_state.lock() = CaptureState::Stopped;
            delegate.on_error(&error);
        }

        let level = source.current_level();
        shared.level.store(level.to_bits(), Ordering::Relaxed);
        delegate.on_level_changed(level);

        let anomalies = source.diagnostics().anomalies;
        if anomalies > reported_anomalies {
            let error = RecorderError::DeviceCallbackAnomaly(format!(
                "{} block(s) flagged overrun/underrun",
                anomalies - reported_anomalies
            ));
            log::warn!("{}", error);
            delegate.on_error(&error);
            reported_anomalies = anomalies;
        }

        thread::sleep(interval);
    }

    if shared.session.is_recording() {
        log::info!("Shutting down during a recording; finalizing it first");
        end_recording(&shared.session, delegate.as_ref());
    }

    if let Err(e) = source.stop_and_close() {
        log::error!("Failed to stop capture: {}", e);
        delegate.on_error(&e);
    }
    *shared.capture_state.lock() = CaptureState::Stopped;
    shared.level.store(0f32.to_bits(), Ordering::Relaxed);
}

fn begin_recording(session: &RecordingSession, delegate: &dyn RecorderDelegate) {
    match session.begin() {
        Some(start) => {
            log::info!(
                "Recording started ({} pre-roll samples) -> {}",
                start.pre_roll_samples,
                start.planned_path.display()
            );
            delegate.on_recording_started(&start.planned_path);
        }
        None => log::debug!("Start requested while already recording; ignored"),
    }
}

fn end_recording(session: &RecordingSession, delegate: &dyn RecorderDelegate) {
    match session.end() {
        Ok(SessionEnd::Saved(result)) => delegate.on_recording_stopped(Some(&result.file_path)),
        Ok(SessionEnd::Empty) => delegate.on_recording_stopped(None),
        Ok(SessionEnd::NotActive) => log::debug!("Stop requested while idle; ignored"),
        Err(e) => {
            delegate.on_error(&e);
            delegate.on_recording_stopped(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::mpsc::Receiver;
    use std::time::Instant;

    use super::*;
    use crate::processing::wav_format::read_pcm16_file;
    use crate::test_support::SyntheticProvider;
    use crate::traits::capture_delegate::{ChannelDelegate, RecorderEvent};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn test_config(output: PathBuf) -> RecorderConfiguration {
        RecorderConfiguration {
            sample_rate: 8000,
            channels: 1,
            block_size: 64,
            skip_back_secs: 0.05,
            output_directory: output,
            poll_interval_ms: 5,
            ..Default::default()
        }
    }

    /// Next event that is not a level update.
    fn next_event(events: &Receiver<RecorderEvent>) -> RecorderEvent {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match events.recv_timeout(remaining) {
                Ok(RecorderEvent::LevelChanged(_)) => continue,
                Ok(event) => return event,
                Err(e) => panic!("no event before timeout: {}", e),
            }
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + TIMEOUT;
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met before timeout");
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn assert_contiguous(samples: &[i16]) {
        for pair in samples.windows(2) {
            let step = pair[1].wrapping_sub(pair[0]);
            // the splice seam may replay already-buffered blocks
            assert!(step == 1 || step <= 0, "gap between {} and {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn start_stop_writes_recording_with_pre_roll() {
        let dir = tempfile::tempdir().unwrap();
        let (delegate, events) = ChannelDelegate::new();
        let mut controller =
            RecorderController::spawn(test_config(dir.path().to_path_buf()), SyntheticProvider::new(), delegate)
                .unwrap();

        wait_until(|| controller.diagnostics().blocks_delivered >= 10);
        assert_eq!(controller.capture_state(), CaptureState::Streaming);

        controller.request_start();
        let RecorderEvent::RecordingStarted(planned) = next_event(&events) else {
            panic!("expected RecordingStarted");
        };
        assert!(planned.starts_with(dir.path()));
        assert!(controller.is_recording());

        let recorded = controller.diagnostics().blocks_recorded;
        wait_until(|| controller.diagnostics().blocks_recorded >= recorded + 5);

        controller.request_stop();
        let RecorderEvent::RecordingStopped(Some(path)) = next_event(&events) else {
            panic!("expected a saved recording");
        };
        assert!(!controller.is_recording());
        assert!(path.exists());
        assert_eq!(path.parent(), planned.parent());

        let (info, samples) = read_pcm16_file(&path).unwrap();
        assert_eq!(info.sample_rate, 8000);
        assert_eq!(info.channels, 1);
        // 0.05s pre-roll at 8kHz mono, plus at least five live blocks
        assert!(samples.len() >= 400 + 5 * 64);
        assert_contiguous(&samples);

        controller.shutdown();
    }

    #[test]
    fn repeated_requests_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (delegate, events) = ChannelDelegate::new();
        let mut controller =
            RecorderController::spawn(test_config(dir.path().to_path_buf()), SyntheticProvider::new(), delegate)
                .unwrap();

        // stop while idle: nothing happens
        controller.request_stop();
        controller.request_start();
        controller.request_start();
        assert!(matches!(next_event(&events), RecorderEvent::RecordingStarted(_)));

        controller.request_start();
        controller.request_stop();
        controller.request_stop();
        assert!(matches!(next_event(&events), RecorderEvent::RecordingStopped(_)));

        controller.shutdown();
        let leftover: Vec<_> = events
            .try_iter()
            .filter(|e| !matches!(e, RecorderEvent::LevelChanged(_)))
            .collect();
        assert!(leftover.is_empty(), "unexpected events: {:?}", leftover);
    }

    #[test]
    fn level_is_published_every_tick() {
        let dir = tempfile::tempdir().unwrap();
        let (delegate, events) = ChannelDelegate::new();
        let controller =
            RecorderController::spawn(test_config(dir.path().to_path_buf()), SyntheticProvider::new(), delegate)
                .unwrap();

        let deadline = Instant::now() + TIMEOUT;
        let level = loop {
            match events.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(RecorderEvent::LevelChanged(level)) if level > 0.0 => break level,
                Ok(_) => continue,
                Err(e) => panic!("no level before timeout: {}", e),
            }
        };
        assert!(level <= 1.0);
        wait_until(|| controller.current_level() > 0.0);
    }

    #[test]
    fn device_failure_is_reported_and_recorder_continues() {
        let dir = tempfile::tempdir().unwrap();
        let (delegate, events) = ChannelDelegate::new();
        let mut controller =
            RecorderController::spawn(test_config(dir.path().to_path_buf()), SyntheticProvider::failing(), delegate)
                .unwrap();

        let RecorderEvent::ErrorOccurred(error) = next_event(&events) else {
            panic!("expected ErrorOccurred");
        };
        assert!(matches!(error, RecorderError::DeviceOpenFailure(_)));
        assert_eq!(controller.capture_state(), CaptureState::Stopped);

        // recording without a stream yields an empty result, not a crash
        controller.request_start();
        assert!(matches!(next_event(&events), RecorderEvent::RecordingStarted(_)));
        controller.request_stop();
        assert_eq!(next_event(&events), RecorderEvent::RecordingStopped(None));

        controller.shutdown();
    }

    #[test]
    fn callback_anomalies_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let (delegate, events) = ChannelDelegate::new();
        let provider = SyntheticProvider::new().flag_overflow_every(3);
        let _controller = RecorderController::spawn(test_config(dir.path().to_path_buf()), provider, delegate).unwrap();

        let RecorderEvent::ErrorOccurred(error) = next_event(&events) else {
            panic!("expected ErrorOccurred");
        };
        assert!(matches!(error, RecorderError::DeviceCallbackAnomaly(_)));
    }

    #[test]
    fn lost_device_is_reported_and_capture_stops() {
        let dir = tempfile::tempdir().unwrap();
        let (delegate, events) = ChannelDelegate::new();
        let provider = SyntheticProvider::new().disconnect_after(5);
        let mut controller =
            RecorderController::spawn(test_config(dir.path().to_path_buf()), provider, delegate).unwrap();

        let RecorderEvent::ErrorOccurred(error) = next_event(&events) else {
            panic!("expected ErrorOccurred");
        };
        assert_eq!(error, RecorderError::DeviceNotAvailable);
        wait_until(|| controller.capture_state() == CaptureState::Stopped);
        assert_eq!(controller.diagnostics().blocks_delivered, 5);

        controller.shutdown();
    }

    #[test]
    fn write_failure_is_reported_and_leaves_idle() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("rec");
        std::fs::write(&blocker, b"in the way").unwrap();
        let (delegate, events) = ChannelDelegate::new();
        let mut controller = RecorderController::spawn(test_config(blocker), SyntheticProvider::new(), delegate).unwrap();

        wait_until(|| controller.diagnostics().blocks_delivered >= 2);
        controller.request_start();
        assert!(matches!(next_event(&events), RecorderEvent::RecordingStarted(_)));
        controller.request_stop();

        let RecorderEvent::ErrorOccurred(error) = next_event(&events) else {
            panic!("expected ErrorOccurred");
        };
        assert!(matches!(error, RecorderError::FileWriteFailure(_)));
        assert_eq!(next_event(&events), RecorderEvent::RecordingStopped(None));
        assert!(!controller.is_recording());

        // the user can try again
        controller.request_start();
        assert!(matches!(next_event(&events), RecorderEvent::RecordingStarted(_)));
        controller.shutdown();
    }

    #[test]
    fn shutdown_finalizes_active_recording_and_releases_device() {
        let dir = tempfile::tempdir().unwrap();
        let (delegate, events) = ChannelDelegate::new();
        let provider = SyntheticProvider::new();
        let probe = provider.probe();
        let mut controller = RecorderController::spawn(test_config(dir.path().to_path_buf()), provider, delegate).unwrap();

        wait_until(|| controller.diagnostics().blocks_delivered >= 10);
        controller.request_start();
        assert!(matches!(next_event(&events), RecorderEvent::RecordingStarted(_)));

        controller.shutdown();

        let RecorderEvent::RecordingStopped(Some(path)) = next_event(&events) else {
            panic!("expected the recording to be flushed on shutdown");
        };
        assert!(path.exists());
        assert!(!probe.thread_alive.load(Ordering::SeqCst));
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
        assert_eq!(controller.capture_state(), CaptureState::Stopped);
        assert_eq!(controller.current_level(), 0.0);

        // second shutdown is a no-op
        controller.shutdown();
        assert_eq!(probe.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pending_requests_collapse_repeats_but_keep_order() {
        let mut pending = PendingRequests::default();
        pending.push(Request::Start);
        pending.push(Request::Start);
        pending.push(Request::Stop);
        pending.push(Request::Stop);
        pending.push(Request::Start);
        assert_eq!(pending.queue, vec![Request::Start, Request::Stop, Request::Start]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (delegate, _events) = ChannelDelegate::new();
        let config = RecorderConfiguration {
            channels: 0,
            ..Default::default()
        };
        let result = RecorderController::spawn(config, SyntheticProvider::new(), delegate);
        assert!(matches!(result, Err(RecorderError::ConfigurationFailed(_))));
    }

    #[test]
    fn oversized_skip_back_is_rejected_before_allocating() {
        let (delegate, _events) = ChannelDelegate::new();
        let config = RecorderConfiguration {
            skip_back_secs: 1e15,
            ..Default::default()
        };
        let result = RecorderController::spawn(config, SyntheticProvider::new(), delegate);
        assert!(matches!(result, Err(RecorderError::ConfigurationFailed(_))));
    }
}
