//! Bounded most-recent-values buffer shared between a producer and readers.

use std::collections::VecDeque;

use anyhow::{Result, bail};
use parking_lot::Mutex;

/// Mutex-guarded ring buffer. Once full, every `put` evicts the oldest value.
///
/// The very first value ever stored is kept separately so callers can anchor
/// on it (e.g. the home pose) after it has left the ring.
#[derive(Debug)]
pub struct FreshestBuffer<T> {
    capacity: usize,
    inner: Mutex<BufferInner<T>>,
}

#[derive(Debug)]
struct BufferInner<T> {
    queue: VecDeque<T>,
    first: Option<T>,
}

impl<T: Clone> FreshestBuffer<T> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 1 {
            bail!("Buffer capacity cannot be less than 1, got {}", capacity);
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(BufferInner {
                queue: VecDeque::with_capacity(capacity),
                first: None,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn put(&self, value: T) {
        let mut inner = self.inner.lock();
        if inner.first.is_none() {
            inner.first = Some(value.clone());
        }
        if inner.queue.len() == self.capacity {
            inner.queue.pop_front();
        }
        inner.queue.push_back(value);
    }

    /// Value `offset` steps back from the newest one (`0` is the newest).
    pub fn freshest(&self, offset: usize) -> Option<T> {
        let inner = self.inner.lock();
        let len = inner.queue.len();
        if offset >= len {
            return None;
        }
        inner.queue.get(len - 1 - offset).cloned()
    }

    pub fn all_freshest_first(&self) -> Vec<T> {
        self.inner.lock().queue.iter().rev().cloned().collect()
    }

    pub fn all_oldest_first(&self) -> Vec<T> {
        self.inner.lock().queue.iter().cloned().collect()
    }

    /// First value ever stored, even if it has since been evicted.
    pub fn first(&self) -> Option<T> {
        self.inner.lock().first.clone()
    }
}
