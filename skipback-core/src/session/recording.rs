use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

use crate::models::config::RecorderConfiguration;
use crate::models::error::RecorderError;
use crate::models::recording_result::{CapturedAudio, SessionEnd, SessionStart};
use crate::models::state::SessionState;
use crate::processing::rolling_buffer::RollingAudioBuffer;
use crate::storage::naming::unique_recording_path;
use crate::storage::recording_file::save_recording;

/// Accumulator state, protected by `parking_lot::Mutex`.
struct Accumulator {
    state: SessionState,
    /// Bumped on every `begin` so a late pre-roll splice can tell whether its
    /// session is still the active one.
    generation: u64,
    blocks: Vec<Vec<i16>>,
    pre_roll_samples: usize,
    live_blocks: usize,
    started_at: Option<DateTime<Local>>,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            generation: 0,
            blocks: Vec::new(),
            pre_roll_samples: 0,
            live_blocks: 0,
            started_at: None,
        }
    }
}

/// Recording state machine and sample accumulator.
///
/// The capture callback calls [`append_block`](Self::append_block) on every
/// block; the control thread calls [`begin`](Self::begin) and
/// [`end`](Self::end). The accumulator lock is only ever held for a push, a
/// swap or a flag flip: concatenation and file writing run after it has
/// been released.
///
/// ## Splice seam
///
/// `begin` flips the state to `Recording` *before* snapshotting the rolling
/// buffer. No block arriving during the transition can be lost, but a block
/// that lands in the rolling buffer between the flip and the snapshot is
/// also appended live, so up to one block may appear twice at the seam.
pub struct RecordingSession {
    config: RecorderConfiguration,
    rolling: Arc<RollingAudioBuffer>,
    accumulator: Mutex<Accumulator>,
    // Mirrors `accumulator.state` so the capture path can skip the lock while idle.
    recording: AtomicBool,
}

impl RecordingSession {
    pub fn new(config: RecorderConfiguration, rolling: Arc<RollingAudioBuffer>) -> Self {
        Self {
            config,
            rolling,
            accumulator: Mutex::new(Accumulator::new()),
            recording: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SessionState {
        self.accumulator.lock().state
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &RecorderConfiguration {
        &self.config
    }

    /// Start a session with the rolling buffer's contents as its first block.
    ///
    /// Returns `None` without touching the running accumulator if a session
    /// is already active.
    pub fn begin(&self) -> Option<SessionStart> {
        let (generation, started_at) = {
            let mut acc = self.accumulator.lock();
            if acc.state.is_recording() {
                return None;
            }
            let started_at = Local::now();
            acc.state = SessionState::Recording;
            acc.generation += 1;
            acc.blocks = Vec::new();
            acc.pre_roll_samples = 0;
            acc.live_blocks = 0;
            acc.started_at = Some(started_at);
            self.recording.store(true, Ordering::SeqCst);
            (acc.generation, started_at)
        };

        let snapshot = self.rolling.snapshot();
        let pre_roll_samples = snapshot.len();

        {
            let mut acc = self.accumulator.lock();
            if acc.state.is_recording() && acc.generation == generation {
                acc.blocks.insert(0, snapshot);
                acc.pre_roll_samples = pre_roll_samples;
            }
        }

        log::debug!("Session {} started with {} pre-roll samples", generation, pre_roll_samples);

        Some(SessionStart {
            started_at,
            pre_roll_samples,
            planned_path: unique_recording_path(
                &self.config.output_directory,
                &started_at,
                &self.config.output_format,
            ),
        })
    }

    /// Append one live block. Returns whether the block was recorded.
    ///
    /// Called from the capture callback; does nothing while idle.
    pub fn append_block(&self, samples: &[i16]) -> bool {
        if !self.is_recording() || samples.is_empty() {
            return false;
        }

        let block = samples.to_vec();
        let mut acc = self.accumulator.lock();
        if !acc.state.is_recording() {
            return false;
        }
        acc.blocks.push(block);
        acc.live_blocks += 1;
        true
    }

    /// Flip back to `Idle` and return everything captured, concatenated in
    /// block order. Returns `None` when no session is active.
    pub fn finish(&self) -> Option<CapturedAudio> {
        let (blocks, pre_roll_samples, live_blocks, started_at) = {
            let mut acc = self.accumulator.lock();
            if !acc.state.is_recording() {
                return None;
            }
            acc.state = SessionState::Idle;
            self.recording.store(false, Ordering::SeqCst);
            (
                std::mem::take(&mut acc.blocks),
                std::mem::take(&mut acc.pre_roll_samples),
                std::mem::take(&mut acc.live_blocks),
                acc.started_at.take(),
            )
        };

        let total: usize = blocks.iter().map(Vec::len).sum();
        let mut samples = Vec::with_capacity(total);
        for block in &blocks {
            samples.extend_from_slice(block);
        }

        let ended_at = Local::now();
        Some(CapturedAudio {
            samples,
            pre_roll_samples,
            live_blocks,
            started_at: started_at.unwrap_or(ended_at),
            ended_at,
        })
    }

    /// End the active session and write it to disk.
    ///
    /// The session is `Idle` when this returns, whatever the outcome: a
    /// failed write is returned as `FileWriteFailure` and is not retried.
    pub fn end(&self) -> Result<SessionEnd, RecorderError> {
        let Some(audio) = self.finish() else {
            return Ok(SessionEnd::NotActive);
        };

        if audio.is_empty() {
            log::warn!("Recording stopped with no captured samples; nothing written");
            return Ok(SessionEnd::Empty);
        }

        match save_recording(&self.config, &audio) {
            Ok(result) => {
                log::info!(
                    "Saved {} ({:.2}s, {} pre-roll samples)",
                    result.file_path.display(),
                    result.duration_secs,
                    audio.pre_roll_samples
                );
                Ok(SessionEnd::Saved(result))
            }
            Err(e) => {
                log::error!("Failed to save recording: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::processing::wav_format::read_pcm16_file;

    fn session_with(capacity_secs: f64, output: &std::path::Path) -> (Arc<RollingAudioBuffer>, RecordingSession) {
        let config = RecorderConfiguration {
            sample_rate: 100,
            channels: 1,
            skip_back_secs: capacity_secs,
            output_directory: output.to_path_buf(),
            ..Default::default()
        };
        let rolling = Arc::new(RollingAudioBuffer::from_config(&config));
        let session = RecordingSession::new(config, Arc::clone(&rolling));
        (rolling, session)
    }

    // What the capture callback does with every block.
    fn deliver(rolling: &RollingAudioBuffer, session: &RecordingSession, block: &[i16]) {
        rolling.append(block);
        session.append_block(block);
    }

    #[test]
    fn starts_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (_, session) = session_with(1.0, dir.path());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_recording());
    }

    #[test]
    fn blocks_are_ignored_while_idle() {
        let dir = tempfile::tempdir().unwrap();
        let (_, session) = session_with(1.0, dir.path());
        assert!(!session.append_block(&[1, 2, 3]));
        assert!(session.finish().is_none());
    }

    #[test]
    fn begin_splices_snapshot_first() {
        let dir = tempfile::tempdir().unwrap();
        let (rolling, session) = session_with(0.05, dir.path()); // 5 samples
        deliver(&rolling, &session, &[1, 2, 3, 4]);
        deliver(&rolling, &session, &[5, 6, 7, 8]);

        let start = session.begin().unwrap();
        assert_eq!(start.pre_roll_samples, 5);
        assert_eq!(start.planned_path.parent(), Some(dir.path()));

        deliver(&rolling, &session, &[9, 10]);
        deliver(&rolling, &session, &[11]);

        let audio = session.finish().unwrap();
        assert_eq!(audio.samples, vec![4, 5, 6, 7, 8, 9, 10, 11]);
        assert_eq!(audio.pre_roll_samples, 5);
        assert_eq!(audio.live_blocks, 2);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn second_begin_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (rolling, session) = session_with(1.0, dir.path());
        deliver(&rolling, &session, &[1, 2]);

        assert!(session.begin().is_some());
        deliver(&rolling, &session, &[3, 4]);
        assert!(session.begin().is_none());
        deliver(&rolling, &session, &[5]);

        let audio = session.finish().unwrap();
        assert_eq!(audio.samples, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn end_while_idle_is_not_active() {
        let dir = tempfile::tempdir().unwrap();
        let (_, session) = session_with(1.0, dir.path());
        assert_eq!(session.end().unwrap(), SessionEnd::NotActive);
    }

    #[test]
    fn immediate_end_with_empty_buffer_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (_, session) = session_with(1.0, dir.path());

        session.begin().unwrap();
        assert_eq!(session.end().unwrap(), SessionEnd::Empty);
        assert!(!session.is_recording());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn immediate_end_keeps_blocks_that_arrived() {
        let dir = tempfile::tempdir().unwrap();
        let (rolling, session) = session_with(1.0, dir.path());

        session.begin().unwrap();
        deliver(&rolling, &session, &[42, 43]);

        let audio = session.finish().unwrap();
        assert_eq!(audio.samples, vec![42, 43]);
        assert_eq!(audio.pre_roll_samples, 0);
    }

    #[test]
    fn end_writes_wav_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let (rolling, session) = session_with(1.0, dir.path());
        deliver(&rolling, &session, &[1, 2, 3]);
        session.begin().unwrap();
        deliver(&rolling, &session, &[4, 5]);

        let SessionEnd::Saved(result) = session.end().unwrap() else {
            panic!("expected a saved recording");
        };
        let (_, samples) = read_pcm16_file(&result.file_path).unwrap();
        assert_eq!(samples, vec![1, 2, 3, 4, 5]);
        assert_eq!(result.sample_count, 5);

        // the next session starts from a fresh accumulator
        session.begin().unwrap();
        let audio = session.finish().unwrap();
        assert_eq!(audio.samples, vec![1, 2, 3, 4, 5]); // pre-roll only
        assert_eq!(audio.live_blocks, 0);
    }

    #[test]
    fn write_failure_still_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("rec");
        std::fs::write(&blocker, b"in the way").unwrap();
        let (rolling, session) = session_with(1.0, &blocker);

        deliver(&rolling, &session, &[1, 2, 3]);
        session.begin().unwrap();
        let err = session.end().unwrap_err();

        assert!(matches!(err, RecorderError::FileWriteFailure(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.begin().is_some());
    }

    #[test]
    fn concurrent_begin_end_never_loses_or_tears_samples() {
        const BLOCK: usize = 16;
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfiguration {
            sample_rate: 1000,
            channels: 1,
            skip_back_secs: 0.256,
            output_directory: dir.path().to_path_buf(),
            ..Default::default()
        };
        let rolling = Arc::new(RollingAudioBuffer::from_config(&config));
        let session = Arc::new(RecordingSession::new(config, Arc::clone(&rolling)));
        let running = Arc::new(AtomicBool::new(true));

        let producer = {
            let rolling = Arc::clone(&rolling);
            let session = Arc::clone(&session);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut next: i16 = 0;
                while running.load(Ordering::SeqCst) {
                    let block: Vec<i16> = (0..BLOCK)
                        .map(|_| {
                            let s = next;
                            next = next.wrapping_add(1);
                            s
                        })
                        .collect();
                    deliver(&rolling, &session, &block);
                    thread::sleep(Duration::from_micros(200));
                }
            })
        };

        for round in 0..200 {
            session.begin();
            thread::sleep(Duration::from_micros(100 * (round % 7)));
            let Some(audio) = session.finish() else {
                continue;
            };
            let samples = &audio.samples;
            for i in 1..samples.len() {
                let step = samples[i].wrapping_sub(samples[i - 1]);
                if i == audio.pre_roll_samples {
                    // seam: contiguous, or replaying whole blocks already in the pre-roll
                    let back = samples[i - 1].wrapping_sub(samples[i]) as i32;
                    let replayed = step == 1
                        || (back >= 0 && back < audio.pre_roll_samples as i32 && (back + 1) % BLOCK as i32 == 0);
                    assert!(replayed, "bad seam at {}: {} -> {}", i, samples[i - 1], samples[i]);
                } else {
                    assert_eq!(step, 1, "gap or reorder at {} in round {}", i, round);
                }
            }
        }

        running.store(false, Ordering::SeqCst);
        producer.join().unwrap();
    }
}
