//! Fixed-capacity history of the decimated render signal.

/// Ring of the most recent `capacity` decimated render samples.
///
/// Every sample is stored twice, at `write` and `write + capacity`, so that
/// any window of up to `capacity` samples is one contiguous slice of the
/// backing arena. Insertion never allocates.
#[derive(derive_more::Debug, Clone)]
pub struct DownsampledRenderBuffer {
    #[debug(skip)]
    buffer: Vec<f32>,
    capacity: usize,
    /// Position the next sample is written to, in `0..capacity`.
    write: usize,
    /// Samples inserted since construction or the last clear, saturating at
    /// `capacity`.
    num_valid: usize,
}

impl DownsampledRenderBuffer {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            buffer: vec![0.0; 2 * capacity],
            capacity,
            write: 0,
            num_valid: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples of history available for reading.
    pub fn len(&self) -> usize {
        self.num_valid
    }

    pub fn is_empty(&self) -> bool {
        self.num_valid == 0
    }

    /// Appends a decimated render block in chronological order, evicting the
    /// oldest samples once the buffer is full.
    pub fn insert(&mut self, block: &[f32]) {
        debug_assert!(block.len() <= self.capacity);
        for &sample in block {
            self.buffer[self.write] = sample;
            self.buffer[self.write + self.capacity] = sample;
            self.write = if self.write + 1 < self.capacity {
                self.write + 1
            } else {
                0
            };
        }
        self.num_valid = (self.num_valid + block.len()).min(self.capacity);
    }

    /// Returns `length` samples in chronological order, the last of which was
    /// inserted `offset` samples before the newest one.
    ///
    /// `offset + length` must not exceed the capacity. While the history is
    /// still filling up, windows reaching past the oldest inserted sample are
    /// returned as an empty slice.
    pub fn read(&self, offset: usize, length: usize) -> &[f32] {
        debug_assert!(
            offset + length <= self.capacity,
            "read of {length} samples at offset {offset} exceeds capacity {}",
            self.capacity
        );
        if offset + length > self.num_valid {
            return &[];
        }
        // The newest sample lives at `write - 1 + capacity` in the mirrored
        // half, so the window end never underflows.
        let end = self.write + self.capacity - offset;
        &self.buffer[end - length..end]
    }

    /// Forgets all history.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write = 0;
        self.num_valid = 0;
    }
}
