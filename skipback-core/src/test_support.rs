//! In-memory `CaptureProvider` that plays an incrementing sample counter.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::models::audio_models::{AudioSource, BlockStatus, DeviceBlock, SampleBlock, StreamFormat};
use parking_lot::Mutex;

use crate::models::error::RecorderError;
use crate::traits::capture_provider::{AudioBlockCallback, CaptureProvider};

#[derive(Clone, Default)]
pub struct ProviderProbe {
    /// True while the delivery thread is alive.
    pub thread_alive: Arc<AtomicBool>,
    pub starts: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
}

pub struct SyntheticProvider {
    fail_on_start: bool,
    flag_every: Option<u64>,
    fail_after: Option<u64>,
    stream_error: Arc<Mutex<Option<RecorderError>>>,
    block_interval: Duration,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    probe: ProviderProbe,
}

impl SyntheticProvider {
    pub fn new() -> Self {
        Self {
            fail_on_start: false,
            flag_every: None,
            fail_after: None,
            stream_error: Arc::new(Mutex::new(None)),
            block_interval: Duration::from_millis(2),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            probe: ProviderProbe::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_on_start: true,
            ..Self::new()
        }
    }

    /// Flag every `n`th block as an input overflow.
    pub fn flag_overflow_every(mut self, n: u64) -> Self {
        self.flag_every = Some(n);
        self
    }

    /// Stop delivering after `n` blocks, as if the device had been unplugged.
    pub fn disconnect_after(mut self, n: u64) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn probe(&self) -> ProviderProbe {
        self.probe.clone()
    }
}

impl CaptureProvider for SyntheticProvider {
    fn is_available(&self) -> bool {
        !self.fail_on_start
    }

    fn start(&mut self, format: StreamFormat, callback: AudioBlockCallback) -> Result<(), RecorderError> {
        if self.fail_on_start {
            return Err(RecorderError::DeviceNotAvailable);
        }
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let alive = Arc::clone(&self.probe.thread_alive);
        let flag_every = self.flag_every;
        let fail_after = self.fail_after;
        let stream_error = Arc::clone(&self.stream_error);
        let interval = self.block_interval;
        alive.store(true, Ordering::SeqCst);

        let handle = thread::spawn(move || {
            let mut next: i16 = 0;
            let mut index: u64 = 0;
            let mut block = vec![0i16; format.block_samples()];
            while running.load(Ordering::SeqCst) {
                if fail_after.is_some_and(|n| index >= n) {
                    *stream_error.lock() = Some(RecorderError::DeviceNotAvailable);
                    break;
                }
                for sample in block.iter_mut() {
                    *sample = next;
                    next = next.wrapping_add(1);
                }
                index += 1;
                let status = BlockStatus {
                    input_overflow: flag_every.is_some_and(|n| index % n == 0),
                    input_underflow: false,
                };
                callback(DeviceBlock::new(SampleBlock::I16(&block), format.block_size as usize).with_status(status));
                thread::sleep(interval);
            }
            alive.store(false, Ordering::SeqCst);
        });
        self.handle = Some(handle);
        Ok(())
    }

    fn take_stream_error(&mut self) -> Option<RecorderError> {
        self.stream_error.lock().take()
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            self.probe.stops.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn device_info(&self) -> AudioSource {
        AudioSource {
            id: "synthetic".into(),
            name: "Synthetic Counter".into(),
            is_default: true,
            transport_type: None,
        }
    }
}
