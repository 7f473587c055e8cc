//! Fixed-capacity ordered buffer of the most recent signals.

use std::collections::VecDeque;

use crate::domain::Signal;

/// Number of recent signals per list the fusion scorer looks at.
pub const RECENT_SIGNALS: usize = 12;

/// Keeps the last `capacity` signals pushed, oldest first.
#[derive(Debug, Clone)]
pub struct SignalBuffer {
    capacity: usize,
    items: VecDeque<Signal>,
}

impl SignalBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    /// Buffer over the tail of an ordered (oldest first) signal list.
    pub fn from_tail(signals: &[Signal], capacity: usize) -> Self {
        let mut buf = Self::new(capacity);
        let skip = signals.len().saturating_sub(capacity);
        for s in &signals[skip..] {
            buf.push(s.clone());
        }
        buf
    }

    /// Append, evicting the oldest entry when full.
    pub fn push(&mut self, signal: Signal) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(signal);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.items.iter()
    }
}

impl Default for SignalBuffer {
    fn default() -> Self {
        Self::new(RECENT_SIGNALS)
    }
}
