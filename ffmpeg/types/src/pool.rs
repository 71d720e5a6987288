/*!
    Recycled frame memory.

    Decoders hand out frames backed by a pool so that plane memory can be
    reused once the consumer releases the frame. A [`PooledBuffer`] returns
    its allocation to the pool when dropped; the pool keeps count of buffers
    that are still out so leaks are observable.
*/

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
    outstanding: AtomicUsize,
}

/**
    A pool of byte buffers for decoded frames.

    Cloning the pool is cheap; clones share the same storage.
*/
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /**
        Create a pool that keeps at most `max_idle` released buffers around
        for reuse.
    */
    pub fn new(max_idle: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(max_idle)),
                max_idle,
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /**
        Take a zero-filled buffer of exactly `len` bytes.

        Recycled memory is cleared before it is handed out again.
    */
    pub fn get(&self, len: usize) -> PooledBuffer {
        let recycled = {
            let mut free = self.inner.free.lock();
            match free.iter().position(|buf| buf.capacity() >= len) {
                Some(index) => Some(free.swap_remove(index)),
                None => free.pop(),
            }
        };

        let mut data = recycled.unwrap_or_default();
        data.clear();
        data.resize(len, 0);

        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);
        PooledBuffer {
            data,
            pool: Some(Arc::downgrade(&self.inner)),
        }
    }

    /// Buffers handed out and not yet dropped.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Released buffers waiting for reuse.
    pub fn idle(&self) -> usize {
        self.inner.free.lock().len()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("outstanding", &self.outstanding())
            .field("idle", &self.idle())
            .field("max_idle", &self.inner.max_idle)
            .finish()
    }
}

/**
    Frame memory that is either owned outright or borrowed from a
    [`BufferPool`].
*/
pub struct PooledBuffer {
    data: Vec<u8>,
    pool: Option<Weak<PoolInner>>,
}

impl PooledBuffer {
    /// Returns true if dropping this buffer returns it to a pool.
    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }
}

impl From<Vec<u8>> for PooledBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self { data, pool: None }
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let Some(pool) = self.pool.take().and_then(|weak| weak.upgrade()) else {
            return;
        };
        pool.outstanding.fetch_sub(1, Ordering::AcqRel);
        let mut free = pool.free.lock();
        if free.len() < pool.max_idle {
            free.push(std::mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.data.len())
            .field("pooled", &self.is_pooled())
            .finish()
    }
}
