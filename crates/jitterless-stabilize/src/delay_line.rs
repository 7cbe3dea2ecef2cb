//! Fixed-capacity FIFO used to delay frames and motion samples.

use std::collections::VecDeque;
use std::ops::{Add, Index, Mul};

/// Sliding window over the most recent `capacity` items.
///
/// Index 0 is the oldest item. Pushing into a full line evicts the oldest.
#[derive(Debug, Clone)]
pub struct DelayLine<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> DelayLine<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "delay line capacity must be non-zero");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    /// Append `item`, returning the evicted oldest item when the line was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Change the capacity, dropping the oldest items that no longer fit.
    ///
    /// Returns the number of items dropped.
    pub fn resize(&mut self, capacity: usize) -> usize {
        assert!(capacity > 0, "delay line capacity must be non-zero");
        let excess = self.items.len().saturating_sub(capacity);
        self.items.drain(..excess);
        self.capacity = capacity;
        excess
    }

    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn oldest_mut(&mut self) -> Option<&mut T> {
        self.items.front_mut()
    }

    pub fn newest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Middle item, at index `len / 2`.
    pub fn centre(&self) -> Option<&T> {
        self.items.get(self.items.len() / 2)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T> DelayLine<T>
where
    T: Clone + Add<Output = T> + Mul<f32, Output = T>,
{
    /// Weighted sum of the items, oldest first, against `kernel`.
    ///
    /// The kernel must be at least as long as the line.
    pub fn convolve(&self, kernel: &[f32]) -> Option<T> {
        assert!(
            kernel.len() >= self.items.len(),
            "kernel of length {} is shorter than the delay line ({})",
            kernel.len(),
            self.items.len()
        );
        let mut weighted = self
            .items
            .iter()
            .zip(kernel)
            .map(|(item, &weight)| item.clone() * weight);
        let first = weighted.next()?;
        Some(weighted.fold(first, |acc, item| acc + item))
    }
}

impl<T> Index<usize> for DelayLine<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}
