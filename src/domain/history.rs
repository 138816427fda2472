use super::cell::OFF;
use super::{CellState, Coord, Generation};
use std::collections::VecDeque;
use std::sync::Arc;

/// HistoryRing keeps the last `capacity` retired generations, newest last.
/// Capacity is fixed for the lifetime of the ring.
#[derive(Clone, Debug)]
pub struct HistoryRing {
    capacity: usize,
    entries: VecDeque<Arc<Generation>>,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a retired generation, evicting the oldest when full
    pub fn push(&mut self, generation: Arc<Generation>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(generation);
    }

    /// Generation `-offset` steps back (`-1` is the most recent entry)
    pub fn generation(&self, offset: i64) -> Option<&Arc<Generation>> {
        if offset >= 0 {
            return None;
        }
        let back = usize::try_from(offset.unsigned_abs()).ok()?;
        let index = self.entries.len().checked_sub(back)?;
        self.entries.get(index)
    }

    /// State of `coord` `-offset` generations ago; `off` whenever that
    /// generation was never retained.
    pub fn get_history(&self, offset: i64, coord: Coord) -> &CellState {
        self.generation(offset)
            .map_or(&OFF, |generation| generation.get(coord))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Retained generations, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Generation>> + '_ {
        self.entries.iter()
    }
}
