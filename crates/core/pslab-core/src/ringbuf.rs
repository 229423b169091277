//! Circular byte buffer over caller-owned storage.
//!
//! [`RingBuffer`] is the FIFO between an interrupt-side producer (a receive
//! ISR or DMA completion) and the polling-loop consumer. It never allocates:
//! the storage is a `&mut [u8]` the caller owns, typically a `static` array,
//! and ownership of that storage never transfers.
//!
//! # Capacity
//!
//! Unlike a head/tail-only ring, the buffer keeps an explicit `count`, so the
//! full backing slice is usable: a buffer over `[u8; 8]` holds 8 bytes.
//!
//! # Full condition
//!
//! What happens on a push into a full buffer is chosen per buffer with
//! [`FullPolicy`]. Receive buffers normally overwrite the oldest byte so the
//! producer never blocks; transmit buffers normally reject the newest byte so
//! queued output is never corrupted. Both policies count the dropped byte.
//!
//! # Concurrency
//!
//! The buffer itself is a plain `&mut self` structure. Drivers share it
//! between interrupt and polling contexts inside an
//! [`IrqSpinLock`](crate::sync::IrqSpinLock), whose critical section covers
//! the index/count update. Within that section `count` is the last field
//! written by [`push`](RingBuffer::push) and the first field read by
//! [`pop`](RingBuffer::pop).
//!
//! # Examples
//!
//! ```
//! use pslab_core::ringbuf::RingBuffer;
//!
//! let mut storage = [0u8; 4];
//! let mut buf = RingBuffer::new(&mut storage).unwrap();
//!
//! buf.push(1);
//! buf.push(2);
//! assert_eq!(buf.pop(), Some(1));
//! assert_eq!(buf.available_to_read(), 1);
//! ```

use crate::error::Error;

/// Behaviour of [`RingBuffer::push`] when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullPolicy {
    /// Drop the oldest unread byte to make room for the new one.
    #[default]
    OverwriteOldest,
    /// Drop the new byte and keep the buffered data intact.
    RejectNewest,
}

/// A fixed-capacity circular FIFO of bytes.
///
/// Single producer, single consumer. `head` is the next write index, `tail`
/// the next read index and `count` the number of occupied bytes.
#[derive(Debug)]
pub struct RingBuffer<'a> {
    storage: &'a mut [u8],
    head: usize,
    tail: usize,
    count: usize,
    policy: FullPolicy,
    dropped: usize,
}

impl<'a> RingBuffer<'a> {
    /// Binds `storage` with the default [`FullPolicy::OverwriteOldest`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `storage` is empty.
    pub fn new(storage: &'a mut [u8]) -> Result<Self, Error> {
        Self::with_policy(storage, FullPolicy::default())
    }

    /// Binds `storage` with an explicit full-condition policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `storage` is empty.
    pub fn with_policy(storage: &'a mut [u8], policy: FullPolicy) -> Result<Self, Error> {
        if storage.is_empty() {
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            storage,
            head: 0,
            tail: 0,
            count: 0,
            policy,
            dropped: 0,
        })
    }

    /// Returns the number of bytes the buffer can hold.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the full-condition policy.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> FullPolicy {
        self.policy
    }

    /// Returns the number of buffered bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if no bytes are buffered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns `true` if the buffer holds `capacity()` bytes.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count == self.capacity()
    }

    /// Returns the number of bytes a consumer can read right now.
    #[inline]
    #[must_use]
    pub fn available_to_read(&self) -> usize {
        self.count
    }

    /// Returns the number of bytes that fit without dropping anything.
    #[inline]
    #[must_use]
    pub fn available_to_write(&self) -> usize {
        self.capacity() - self.count
    }

    /// Returns the total number of bytes dropped on full pushes.
    #[inline]
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Returns the drop counter and resets it to zero.
    pub fn take_dropped(&mut self) -> usize {
        core::mem::take(&mut self.dropped)
    }

    #[inline]
    fn advance(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.capacity() { 0 } else { next }
    }

    /// Appends one byte.
    ///
    /// Never blocks. Returns `true` when a byte was dropped because the
    /// buffer was full: the oldest one under
    /// [`FullPolicy::OverwriteOldest`], `byte` itself under
    /// [`FullPolicy::RejectNewest`].
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            self.dropped = self.dropped.wrapping_add(1);
            match self.policy {
                FullPolicy::RejectNewest => return true,
                FullPolicy::OverwriteOldest => {
                    self.storage[self.head] = byte;
                    self.head = self.advance(self.head);
                    // Full before and after: count is unchanged.
                    self.tail = self.head;
                    return true;
                }
            }
        }

        self.storage[self.head] = byte;
        self.head = self.advance(self.head);
        // count last: a consumer that sees it sees the byte and the index.
        self.count += 1;
        false
    }

    /// Removes and returns the oldest byte, or `None` if the buffer is empty.
    pub fn pop(&mut self) -> Option<u8> {
        // count first: never trust tail until count says there is data.
        if self.count == 0 {
            return None;
        }
        let byte = self.storage[self.tail];
        self.tail = self.advance(self.tail);
        self.count -= 1;
        Some(byte)
    }

    /// Returns the oldest byte without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        if self.count == 0 {
            None
        } else {
            Some(self.storage[self.tail])
        }
    }

    /// Moves up to `buf.len()` bytes into `buf`, returning how many were read.
    ///
    /// Bytes of `buf` past the returned count are left untouched.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.peek_into(buf);
        self.discard(n);
        n
    }

    /// Copies up to `buf.len()` of the oldest bytes into `buf` without
    /// consuming them.
    pub fn peek_into(&self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.count);
        let first = n.min(self.capacity() - self.tail);
        buf[..first].copy_from_slice(&self.storage[self.tail..self.tail + first]);
        buf[first..n].copy_from_slice(&self.storage[..n - first]);
        n
    }

    /// Drops up to `n` of the oldest bytes, returning how many were dropped.
    ///
    /// Not counted in [`dropped`](Self::dropped): the consumer chose to
    /// discard them.
    pub fn discard(&mut self, n: usize) -> usize {
        let n = n.min(self.count);
        self.tail = (self.tail + n) % self.capacity();
        self.count -= n;
        n
    }

    /// Appends `bytes`, returning how many were accepted.
    ///
    /// Under [`FullPolicy::OverwriteOldest`] every byte is accepted and older
    /// data is overwritten as needed. Under [`FullPolicy::RejectNewest`] the
    /// bytes that do not fit are dropped.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let mut accepted = 0;
        for &byte in bytes {
            let dropped = self.push(byte);
            if !dropped || self.policy == FullPolicy::OverwriteOldest {
                accepted += 1;
            }
        }
        accepted
    }

    /// Discards all buffered bytes. The drop counter is kept.
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}
