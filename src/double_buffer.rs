//! Double Buffer
//!
//! Each radix sort pass reads the current source buffer and writes the
//! full permutation into the destination buffer, then the roles swap.
//! [`DoubleBuffer`] makes that ping-pong explicit: two owned slots and an
//! index tracking which one is semantically valid as input. Exactly one
//! slot is the source at any time, so stale or aliased buffer references
//! cannot occur.

/// Two owned buffer slots with an explicit "current source" index.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    source: usize,
}

impl<T> DoubleBuffer<T> {
    /// Create a double buffer with `source` as the initial input slot.
    pub fn new(source: T, destination: T) -> Self {
        Self {
            slots: [source, destination],
            source: 0,
        }
    }

    /// The slot currently valid as input.
    pub fn source(&self) -> &T {
        &self.slots[self.source]
    }

    /// Borrow the source read-only and the destination writable at the
    /// same time, as a stage reads one while producing the other.
    pub fn split_mut(&mut self) -> (&T, &mut T) {
        let (left, right) = self.slots.split_at_mut(1);
        if self.source == 0 {
            (&left[0], &mut right[0])
        } else {
            (&right[0], &mut left[0])
        }
    }

    /// Swap roles: the destination just written becomes the next source.
    pub fn swap(&mut self) {
        self.source ^= 1;
    }

    /// Consume the buffer pair, returning the current source slot.
    pub fn into_source(self) -> T {
        let [first, second] = self.slots;
        if self.source == 0 {
            first
        } else {
            second
        }
    }
}
