/// Fixed-capacity circular buffer of samples.
///
/// Not synchronized; `RollingAudioBuffer` wraps it in a
/// `parking_lot::Mutex` for cross-thread access.
///
/// Overflow behavior: drops oldest samples. Writes and snapshots are at most
/// two slice copies each, so the time spent under a lock is bounded by the
/// capacity.
#[derive(Debug)]
pub struct RingBuffer<T> {
    buffer: Vec<T>,
    write_index: usize,
    read_index: usize,
    available: usize,
    capacity: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![T::default(); capacity],
            write_index: 0,
            read_index: 0,
            available: 0,
            capacity,
        }
    }

    /// Write samples into the ring buffer.
    ///
    /// If the buffer overflows, the oldest samples are dropped.
    /// If `samples` is larger than capacity, only the last `capacity` samples are kept.
    pub fn write(&mut self, samples: &[T]) {
        if samples.is_empty() || self.capacity == 0 {
            return;
        }

        // If more data than capacity, only keep the tail
        let samples = if samples.len() > self.capacity {
            &samples[samples.len() - self.capacity..]
        } else {
            samples
        };

        // Drop oldest if we'd overflow
        let overflow = (self.available + samples.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.read_index = (self.read_index + overflow) % self.capacity;
            self.available -= overflow;
        }

        let first = samples.len().min(self.capacity - self.write_index);
        self.buffer[self.write_index..self.write_index + first].copy_from_slice(&samples[..first]);
        let rest = samples.len() - first;
        if rest > 0 {
            self.buffer[..rest].copy_from_slice(&samples[first..]);
        }

        self.write_index = (self.write_index + samples.len()) % self.capacity;
        self.available += samples.len();
    }

    /// Copy the current contents, oldest first, without consuming them.
    pub fn snapshot(&self) -> Vec<T> {
        let mut result = Vec::with_capacity(self.available);
        if self.available == 0 {
            return result;
        }

        let first = self.available.min(self.capacity - self.read_index);
        result.extend_from_slice(&self.buffer[self.read_index..self.read_index + first]);
        result.extend_from_slice(&self.buffer[..self.available - first]);
        result
    }

    /// Number of samples currently held.
    pub fn count(&self) -> usize {
        self.available
    }

    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    pub fn is_full(&self) -> bool {
        self.available == self.capacity
    }

    /// Reset the buffer to empty state.
    pub fn reset(&mut self) {
        self.write_index = 0;
        self.read_index = 0;
        self.available = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
