use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct QueueInner<T> {
    items: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

/**
    Bounded blocking queue between two pipeline stages.

    `push` blocks while the queue is full and `pop` blocks while it is
    empty. Once closed, pushes are refused (the item is handed back) and
    pops drain what is left before returning `None`.
*/
pub struct HandoffQueue<T> {
    inner: Mutex<QueueInner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> HandoffQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity),
                capacity,
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /**
        Append an item, waiting for space. Returns the item if the queue
        was closed before it could be added.
    */
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut inner = self.inner.lock();

        while inner.items.len() >= inner.capacity && !inner.closed {
            self.not_full.wait(&mut inner);
        }

        if inner.closed {
            return Err(item);
        }

        inner.items.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /**
        Take the oldest item, waiting until one arrives. Returns `None` once
        the queue is closed and empty.
    */
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();

        while inner.items.is_empty() && !inner.closed {
            self.not_empty.wait(&mut inner);
        }

        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Remove every queued item without waiting.
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.inner.lock();
        let items: Vec<T> = inner.items.drain(..).collect();
        self.not_full.notify_all();
        items
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Closed and nothing left to pop.
    pub fn is_drained(&self) -> bool {
        let inner = self.inner.lock();
        inner.closed && inner.items.is_empty()
    }
}
