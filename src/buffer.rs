//! Fixed-capacity buffer of encoded bytes waiting to be decoded.

/// Bytes `[0, len)` hold unconsumed data in arrival order; the rest is free
/// space for the next network read.
pub struct ByteBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl ByteBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// The unconsumed bytes.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Free space after the unconsumed bytes. Call [`commit`](Self::commit)
    /// with the number of bytes written into it.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    pub fn commit(&mut self, written: usize) {
        debug_assert!(written <= self.capacity() - self.len);
        self.len = (self.len + written).min(self.capacity());
    }

    /// Copy as much of `source` as fits. Returns 0 once the buffer is full.
    pub fn append(&mut self, source: &[u8]) -> usize {
        let spare = self.spare_mut();
        let n = spare.len().min(source.len());
        spare[..n].copy_from_slice(&source[..n]);
        self.len += n;
        n
    }

    /// Drop `consumed` bytes from the front, shifting the remainder down.
    pub fn compact(&mut self, consumed: usize) {
        debug_assert!(consumed <= self.len, "compact past end of data");
        let consumed = consumed.min(self.len);
        if consumed == 0 {
            return;
        }
        self.data.copy_within(consumed..self.len, 0);
        self.len -= consumed;
    }
}
