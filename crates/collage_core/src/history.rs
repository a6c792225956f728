//! Undo/redo history
//!
//! A fixed-size ring of mementos. `back` is the oldest kept entry, `front`
//! is one past the newest, `current` is the entry the live state was last
//! copied from. Pushing when the ring is full and `current` is the newest
//! entry evicts the oldest one.

use crate::store::LayerStore;

/// History of full layer store snapshots.
pub type LayerHistory = HistoryRing<LayerStore>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Checkpoint {
    None,
    At(usize),
}

#[derive(Debug)]
pub struct HistoryRing<T> {
    slots: Vec<T>,
    capacity: usize,
    current: usize,
    front: usize,
    back: usize,
    full: bool,
    checkpoint: Checkpoint,
}

impl<T> HistoryRing<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history needs at least one slot");
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            // The first push lands on slot 0.
            current: capacity - 1,
            front: 0,
            back: 0,
            full: false,
            checkpoint: Checkpoint::None,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of kept mementos, redo entries included.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else if self.full {
            self.capacity
        } else if self.front > self.back {
            self.front - self.back
        } else {
            self.capacity - self.back + self.front
        }
    }

    /// Store a new memento after `current`, dropping any redo entries.
    pub fn push(&mut self, memento: T) {
        let next = self.wrap_add(self.current);

        if !self.is_empty() && next == self.back {
            if self.checkpoint == Checkpoint::At(self.back) {
                tracing::debug!(slot = self.back, "checkpoint evicted");
                self.checkpoint = Checkpoint::None;
            }
            self.back = self.wrap_add(self.back);
            tracing::debug!(back = self.back, "history full, evicted oldest memento");
        }

        self.current = next;
        self.front = self.wrap_add(self.current);
        self.full = self.front == self.back;

        if self.current == self.slots.len() {
            self.slots.push(memento);
        } else {
            self.slots[self.current] = memento;
        }

        if let Checkpoint::At(slot) = self.checkpoint {
            if slot == self.current || !self.is_kept(slot) {
                tracing::debug!(slot, "checkpoint overwritten");
                self.checkpoint = Checkpoint::None;
            }
        }
    }

    /// Step back one memento. Stays put at the oldest entry.
    pub fn undo(&mut self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        if self.can_undo() {
            self.current = self.wrap_sub(self.current);
        }
        self.slots.get(self.current)
    }

    /// Step forward one memento. Stays put at the newest entry.
    pub fn redo(&mut self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        if self.can_redo() {
            self.current = self.wrap_add(self.current);
        }
        self.slots.get(self.current)
    }

    pub fn current(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots.get(self.current)
    }

    pub fn can_undo(&self) -> bool {
        !self.is_empty() && self.current != self.back
    }

    pub fn can_redo(&self) -> bool {
        !self.at_front()
    }

    /// True when there is nothing to redo.
    pub fn at_front(&self) -> bool {
        self.is_empty() || self.front == self.wrap_add(self.current)
    }

    /// True at the checkpoint if one is set, otherwise at the oldest entry.
    pub fn at_back(&self) -> bool {
        if self.is_empty() {
            return true;
        }
        match self.checkpoint {
            Checkpoint::At(slot) => self.current == slot,
            Checkpoint::None => self.current == self.back,
        }
    }

    /// Mark `current` as the saved state. Discards the redo entries.
    pub fn set_checkpoint(&mut self) {
        if self.is_empty() {
            return;
        }
        self.checkpoint = Checkpoint::At(self.current);
        self.truncate_after_current();
    }

    pub fn remove_checkpoint(&mut self) {
        self.checkpoint = Checkpoint::None;
    }

    pub fn has_checkpoint(&self) -> bool {
        self.checkpoint != Checkpoint::None
    }

    /// Memento at the checkpoint slot.
    pub fn checkpoint(&self) -> Option<&T> {
        match self.checkpoint {
            Checkpoint::At(slot) => self.slots.get(slot),
            Checkpoint::None => None,
        }
    }

    /// Rewind to the checkpoint and clear it. Entries after it are discarded.
    pub fn reset_to_checkpoint(&mut self) -> Option<&T> {
        let Checkpoint::At(slot) = self.checkpoint else {
            return None;
        };
        self.current = slot;
        self.truncate_after_current();
        self.checkpoint = Checkpoint::None;
        self.slots.get(self.current)
    }

    fn truncate_after_current(&mut self) {
        self.front = self.wrap_add(self.current);
        self.full = self.front == self.back;
    }

    /// Whether `slot` lies in `[back, front)`.
    fn is_kept(&self, slot: usize) -> bool {
        (slot + self.capacity - self.back) % self.capacity < self.len()
    }

    #[inline]
    fn wrap_add(&self, index: usize) -> usize {
        (index + 1) % self.capacity
    }

    #[inline]
    fn wrap_sub(&self, index: usize) -> usize {
        (index + self.capacity - 1) % self.capacity
    }
}
