//! Bounded FIFO ring used for the state history and the decision log.

use std::collections::VecDeque;

use tanktwin_types::TankState;

/// In-memory history of tank snapshots, oldest first.
pub type HistoryBuffer = RingBuffer<TankState>;

/// A fixed-capacity queue that evicts the oldest entry when full.
///
/// Entries are never mutated after insertion; readers receive clones.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// Create an empty ring. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, returning the evicted oldest entry if the ring was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the ring holds no entries.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of entries.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recently inserted entry.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Copy up to `limit` of the most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<T> {
        let skip = self.items.len().saturating_sub(limit);
        self.items.iter().skip(skip).cloned().collect()
    }
}

impl HistoryBuffer {
    /// Water levels of up to `limit` most recent snapshots, oldest first.
    pub fn recent_levels(&self, limit: usize) -> Vec<f64> {
        let skip = self.items.len().saturating_sub(limit);
        self.items.iter().skip(skip).map(|s| s.water_level).collect()
    }
}
