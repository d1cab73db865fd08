use parking_lot::Mutex;

use crate::models::config::RecorderConfiguration;
use crate::processing::ring_buffer::RingBuffer;

/// Thread-safe rolling window of the most recent interleaved samples.
///
/// Written by the capture callback on every block and snapshot-read when a
/// recording begins. The lock is held only for slice copies.
#[derive(Debug)]
pub struct RollingAudioBuffer {
    inner: Mutex<RingBuffer<i16>>,
    capacity: usize,
}

impl RollingAudioBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RingBuffer::new(capacity)),
            capacity,
        }
    }

    /// Size the window as `skip_back × sample_rate × channels` samples.
    pub fn from_config(config: &RecorderConfiguration) -> Self {
        Self::new(config.rolling_capacity())
    }

    /// Append samples in order, evicting the oldest once full.
    pub fn append(&self, samples: &[i16]) {
        self.inner.lock().write(samples);
    }

    /// Copy of the current contents, oldest first. Does not clear.
    pub fn snapshot(&self) -> Vec<i16> {
        self.inner.lock().snapshot()
    }

    pub fn clear(&self) {
        self.inner.lock().reset();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
