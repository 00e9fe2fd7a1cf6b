//! Fixed-capacity slot arena with reference counts and pinning.
//!
//! Slots are handed out from a free list first and grown lazily up to the
//! configured capacity. A slot is reclaimed when its count drops to zero while
//! it is not pinned; a pinned slot at zero survives until [`Pool::unpin`].

use super::error::{InterpResult, RuntimeError};
use super::value::Handle;

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    ref_count: u32,
    pinned: bool,
    /// `Some` while the slot is in use
    data: Option<T>,
}

/// Arena of reference-counted slots
#[derive(Debug)]
pub struct Pool<T> {
    name: &'static str,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    capacity: usize,
    live: usize,
}

impl<T> Pool<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Pool {
            name,
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
            live: 0,
        }
    }

    /// Store `data` in a fresh slot with a reference count of one
    pub fn alloc(&mut self, data: T) -> InterpResult<Handle> {
        let index = match self.free.pop() {
            Some(index) => index,
            None if self.slots.len() < self.capacity => {
                self.slots.push(Slot {
                    generation: 0,
                    ref_count: 0,
                    pinned: false,
                    data: None,
                });
                (self.slots.len() - 1) as u32
            }
            None => return Err(RuntimeError::pool_exhausted(self.name, self.capacity)),
        };

        let slot = &mut self.slots[index as usize];
        slot.data = Some(data);
        slot.ref_count = 1;
        slot.pinned = false;
        self.live += 1;
        tracing::trace!(pool = self.name, index, "alloc");
        Ok(Handle {
            index,
            generation: slot.generation,
        })
    }

    fn slot(&self, handle: Handle) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation && s.data.is_some())
    }

    fn slot_mut(&mut self, handle: Handle) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation && s.data.is_some())
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slot(handle).and_then(|s| s.data.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slot_mut(handle).and_then(|s| s.data.as_mut())
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        self.slot(handle).is_some()
    }

    /// Returns false for a stale handle
    pub fn incref(&mut self, handle: Handle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.ref_count += 1;
                true
            }
            None => false,
        }
    }

    /// Drop one reference; returns the slot's data if this freed it
    pub fn decref(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slot_mut(handle)?;
        slot.ref_count = slot.ref_count.saturating_sub(1);
        if slot.ref_count == 0 && !slot.pinned {
            self.free_slot(handle.index)
        } else {
            None
        }
    }

    /// Protect the slot from reclamation while it changes owners
    pub fn pin(&mut self, handle: Handle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) => {
                slot.pinned = true;
                true
            }
            None => false,
        }
    }

    /// Lift the pin; returns the slot's data if nobody adopted it meanwhile
    pub fn unpin(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slot_mut(handle)?;
        slot.pinned = false;
        if slot.ref_count == 0 {
            self.free_slot(handle.index)
        } else {
            None
        }
    }

    /// Free the slot regardless of its count
    pub fn take(&mut self, handle: Handle) -> Option<T> {
        self.slot(handle)?;
        self.free_slot(handle.index)
    }

    fn free_slot(&mut self, index: u32) -> Option<T> {
        let slot = &mut self.slots[index as usize];
        let data = slot.data.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        slot.ref_count = 0;
        slot.pinned = false;
        self.free.push(index);
        self.live -= 1;
        tracing::trace!(pool = self.name, index, "free");
        Some(data)
    }

    pub fn ref_count(&self, handle: Handle) -> Option<u32> {
        self.slot(handle).map(|s| s.ref_count)
    }

    pub fn is_pinned(&self, handle: Handle) -> Option<bool> {
        self.slot(handle).map(|s| s.pinned)
    }

    pub fn is_full(&self) -> bool {
        self.free.is_empty() && self.slots.len() >= self.capacity
    }

    /// Slots currently in use
    pub fn live(&self) -> usize {
        self.live
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Free every slot; generations keep advancing so old handles stay stale
    pub fn reset(&mut self) {
        for index in 0..self.slots.len() as u32 {
            if self.slots[index as usize].data.is_some() {
                self.free_slot(index);
            }
        }
    }
}
