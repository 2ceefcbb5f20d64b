//! Size-classed pool of reusable response buffers.
//!
//! Non-streaming upstream bodies are collected into pooled `BytesMut`
//! buffers. Buffers are handed out as [`PooledBuffer`] guards that return
//! themselves to the pool on drop, so every exit path of a handler
//! releases what it acquired.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::BytesMut;

/// Bodies below this size are served from the small list.
pub const SMALL_BUFFER_THRESHOLD: usize = 1024;

/// Default number of idle buffers kept per size class.
pub const DEFAULT_MAX_IDLE: usize = 64;

/// Buffers that grew past this capacity are freed instead of pooled.
pub const DEFAULT_MAX_RETAINED_CAPACITY: usize = 4 * 1024 * 1024;

/// Two bounded free-lists partitioned by [`SMALL_BUFFER_THRESHOLD`].
#[derive(Debug)]
pub struct BufferPool {
    small: Mutex<Vec<BytesMut>>,
    large: Mutex<Vec<BytesMut>>,
    max_idle: usize,
    max_retained_capacity: usize,
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE, DEFAULT_MAX_RETAINED_CAPACITY)
    }
}

impl BufferPool {
    pub const fn new(max_idle: usize, max_retained_capacity: usize) -> Self {
        Self {
            small: Mutex::new(Vec::new()),
            large: Mutex::new(Vec::new()),
            max_idle,
            max_retained_capacity,
        }
    }

    /// Take an empty buffer sized for `expected_size` bytes.
    ///
    /// `None` (unknown content length) is treated as a small body.
    pub fn acquire(self: &Arc<Self>, expected_size: Option<u64>) -> PooledBuffer {
        let expected = expected_size
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);

        let list = if expected < SMALL_BUFFER_THRESHOLD {
            &self.small
        } else {
            &self.large
        };

        let mut buf = lock(list).pop().unwrap_or_default();
        buf.clear();
        // Large-body hints are honoured up front; the cap keeps a lying
        // Content-Length from forcing a huge allocation.
        buf.reserve(expected.min(self.max_retained_capacity));

        PooledBuffer {
            buf,
            pool: Arc::clone(self),
        }
    }

    /// Return a buffer to the list matching its capacity.
    fn release(&self, mut buf: BytesMut) {
        let capacity = buf.capacity();
        if capacity == 0 || capacity > self.max_retained_capacity {
            return;
        }
        buf.clear();

        let list = if capacity < SMALL_BUFFER_THRESHOLD {
            &self.small
        } else {
            &self.large
        };

        let mut idle = lock(list);
        if idle.len() < self.max_idle {
            idle.push(buf);
        }
    }

    /// Number of idle buffers as `(small, large)`.
    pub fn idle_counts(&self) -> (usize, usize) {
        (lock(&self.small).len(), lock(&self.large).len())
    }
}

// A panic while holding the lock cannot leave a Vec<BytesMut> inconsistent.
fn lock(list: &Mutex<Vec<BytesMut>>) -> MutexGuard<'_, Vec<BytesMut>> {
    list.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A buffer on loan from a [`BufferPool`]; released on drop.
#[derive(Debug)]
pub struct PooledBuffer {
    buf: BytesMut,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        // An empty BytesMut does not allocate.
        let buf = std::mem::take(&mut self.buf);
        self.pool.release(buf);
    }
}
