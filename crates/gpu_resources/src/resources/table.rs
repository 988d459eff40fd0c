//! Resource Table
//!
//! Handle-stable storage shared by every resource kind. Slots are addressed by
//! a `u32` index that stays valid for the resource's lifetime; freed indices
//! go onto a stack and are handed out again before the table grows.
//!
//! # Slot lifecycle
//!
//! ```text
//!   allocate()        mark_pending()             release()
//! Free -------> Live -------------> Pending -------------> Free
//!                                  (still readable)   (index pushed on stack)
//! ```
//!
//! `release` is only reached through the deletion queue, after the frame
//! countdown for the slot has run out.

/// Observable state of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Unused, index is on the free stack (or out of range)
    Free,
    /// In use
    Live,
    /// Submitted for deletion; still readable until released
    PendingDeletion,
}

#[derive(Debug)]
enum Slot<T> {
    Free,
    Live(T),
    Pending(T),
}

/// Array of resource records plus a free-index stack
#[derive(Debug)]
pub struct ResourceTable<T> {
    slots: Vec<Slot<T>>,
    free_indices: Vec<u32>,
}

impl<T> Default for ResourceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourceTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty table with room for `capacity` slots
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_indices: Vec::new(),
        }
    }

    /// Store `value`, reusing the most recently freed index if there is one
    pub fn allocate(&mut self, value: T) -> u32 {
        if let Some(index) = self.free_indices.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(matches!(slot, Slot::Free), "free stack held a used slot");
            *slot = Slot::Live(value);
            index
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot::Live(value));
            index
        }
    }

    /// State of the slot at `index`
    pub fn state(&self, index: u32) -> SlotState {
        match self.slots.get(index as usize) {
            Some(Slot::Live(_)) => SlotState::Live,
            Some(Slot::Pending(_)) => SlotState::PendingDeletion,
            Some(Slot::Free) | None => SlotState::Free,
        }
    }

    /// Read a live or pending slot
    pub fn get(&self, index: u32) -> Option<&T> {
        match self.slots.get(index as usize)? {
            Slot::Live(value) | Slot::Pending(value) => Some(value),
            Slot::Free => None,
        }
    }

    /// Mutably access a live or pending slot
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        match self.slots.get_mut(index as usize)? {
            Slot::Live(value) | Slot::Pending(value) => Some(value),
            Slot::Free => None,
        }
    }

    /// Move a live slot to pending deletion
    ///
    /// On failure the slot is untouched and its current state is returned.
    pub fn mark_pending(&mut self, index: u32) -> Result<(), SlotState> {
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return Err(SlotState::Free);
        };
        match std::mem::replace(slot, Slot::Free) {
            Slot::Live(value) => {
                *slot = Slot::Pending(value);
                Ok(())
            }
            Slot::Pending(value) => {
                *slot = Slot::Pending(value);
                Err(SlotState::PendingDeletion)
            }
            Slot::Free => Err(SlotState::Free),
        }
    }

    /// Clear a pending slot and push its index onto the free stack
    ///
    /// Returns the stored value so the caller can destroy its native objects.
    pub fn release(&mut self, index: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        match std::mem::replace(slot, Slot::Free) {
            Slot::Pending(value) => {
                self.free_indices.push(index);
                Some(value)
            }
            other => {
                debug_assert!(false, "released slot {} that was not pending", index);
                *slot = other;
                None
            }
        }
    }

    /// Empty every used slot, returning the values in index order
    pub fn drain(&mut self) -> Vec<(u32, T)> {
        let mut drained = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            match std::mem::replace(slot, Slot::Free) {
                Slot::Live(value) | Slot::Pending(value) => drained.push((index as u32, value)),
                Slot::Free => {}
            }
        }
        self.free_indices = (0..self.slots.len() as u32).rev().collect();
        drained
    }

    /// Iterate over live and pending slots
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Live(value) | Slot::Pending(value) => Some((index as u32, value)),
            Slot::Free => None,
        })
    }

    /// Number of live slots
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| matches!(slot, Slot::Live(_))).count()
    }

    /// Number of slots pending deletion
    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|slot| matches!(slot, Slot::Pending(_))).count()
    }

    /// Number of indices waiting on the free stack
    pub fn free_count(&self) -> usize {
        self.free_indices.len()
    }

    /// Total slots ever created
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot was ever created
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_grows_sequentially() {
        let mut table = ResourceTable::new();
        assert_eq!(table.allocate("a"), 0);
        assert_eq!(table.allocate("b"), 1);
        assert_eq!(table.allocate("c"), 2);
        assert_eq!(table.live_count(), 3);
        assert_eq!(table.get(1), Some(&"b"));
    }

    #[test]
    fn test_pending_slot_still_readable() {
        let mut table = ResourceTable::new();
        let index = table.allocate(42);
        table.mark_pending(index).unwrap();
        assert_eq!(table.state(index), SlotState::PendingDeletion);
        assert_eq!(table.get(index), Some(&42));
    }

    #[test]
    fn test_double_mark_is_rejected() {
        let mut table = ResourceTable::new();
        let index = table.allocate(1);
        table.mark_pending(index).unwrap();
        assert_eq!(table.mark_pending(index), Err(SlotState::PendingDeletion));
        assert_eq!(table.get(index), Some(&1));
        assert_eq!(table.mark_pending(99), Err(SlotState::Free));
    }

    #[test]
    fn test_release_reuses_index_and_clears_slot() {
        let mut table = ResourceTable::new();
        let a = table.allocate(String::from("first"));
        let _b = table.allocate(String::from("second"));
        table.mark_pending(a).unwrap();
        assert_eq!(table.release(a).as_deref(), Some("first"));
        assert_eq!(table.state(a), SlotState::Free);
        assert_eq!(table.get(a), None);
        assert_eq!(table.free_count(), 1);

        let c = table.allocate(String::from("third"));
        assert_eq!(c, a);
        assert_eq!(table.get(c).map(String::as_str), Some("third"));
        assert_eq!(table.free_count(), 0);
    }

    #[test]
    fn test_free_stack_is_lifo() {
        let mut table = ResourceTable::new();
        let indices: Vec<u32> = (0..4).map(|i| table.allocate(i)).collect();
        for &index in &indices[1..3] {
            table.mark_pending(index).unwrap();
            table.release(index);
        }
        assert_eq!(table.allocate(10), 2);
        assert_eq!(table.allocate(11), 1);
        assert_eq!(table.allocate(12), 4);
    }

    #[test]
    fn test_drain_empties_table() {
        let mut table = ResourceTable::new();
        table.allocate('x');
        let y = table.allocate('y');
        table.mark_pending(y).unwrap();
        let drained = table.drain();
        assert_eq!(drained, vec![(0, 'x'), (1, 'y')]);
        assert_eq!(table.live_count() + table.pending_count(), 0);
        assert_eq!(table.allocate('z'), 0);
    }
}
