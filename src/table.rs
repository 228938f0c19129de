//! Thread table
//!
//! Fixed-capacity slot arena indexed by thread identity. Identities are
//! allocated smallest-free-first and reused only after the previous occupant
//! is destroyed. Each slot carries a generation counter, bumped on release,
//! so queue entries referring to a reclaimed identity are detectable instead
//! of silently dispatching the slot's new occupant.

use crate::error::{ThreadError, ThreadResult};
use crate::id::ThreadId;
use crate::tcb::Tcb;

struct Slot {
    tcb: Option<Tcb>,
    generation: u32,
}

/// Sole owner of every thread control block
pub(crate) struct ThreadTable {
    slots: Vec<Slot>,
}

impl ThreadTable {
    pub(crate) fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            tcb: None,
            generation: 0,
        });
        Self { slots }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Smallest identity whose slot is free
    pub(crate) fn first_free(&self) -> ThreadResult<ThreadId> {
        self.slots
            .iter()
            .position(|s| s.tcb.is_none())
            .map(|i| ThreadId::new(i as u32))
            .ok_or(ThreadError::CapacityExceeded)
    }

    /// Occupy `tcb.id`'s slot; stamps the slot generation onto the Tcb and
    /// returns it
    pub(crate) fn insert(&mut self, mut tcb: Tcb) -> u32 {
        let idx = tcb.id.as_usize();
        let slot = &mut self.slots[idx];
        debug_assert!(slot.tcb.is_none(), "slot {} already occupied", tcb.id);
        tcb.generation = slot.generation;
        let generation = slot.generation;
        slot.tcb = Some(tcb);
        generation
    }

    /// Clear a slot, bumping its generation, and hand the Tcb back to the
    /// caller, who decides when its resources are safe to release
    pub(crate) fn release(&mut self, id: ThreadId) -> Option<Tcb> {
        let slot = self.slots.get_mut(id.as_usize())?;
        let tcb = slot.tcb.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        Some(tcb)
    }

    pub(crate) fn get(&self, id: ThreadId) -> Option<&Tcb> {
        self.slots.get(id.as_usize())?.tcb.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: ThreadId) -> Option<&mut Tcb> {
        self.slots.get_mut(id.as_usize())?.tcb.as_mut()
    }

    pub(crate) fn contains(&self, id: ThreadId) -> bool {
        self.get(id).is_some()
    }

    /// Current generation of a slot, occupied or not
    pub(crate) fn generation(&self, id: ThreadId) -> Option<u32> {
        self.slots.get(id.as_usize()).map(|s| s.generation)
    }

    /// True when the entry's generation matches the slot's live occupant
    pub(crate) fn is_current(&self, id: ThreadId, generation: u32) -> bool {
        self.get(id).is_some_and(|t| t.generation == generation)
    }

    pub(crate) fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.tcb.is_some()).count()
    }

    /// Identities of all live threads, ascending
    pub(crate) fn live_ids(&self) -> Vec<ThreadId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.tcb.is_some())
            .map(|(i, _)| ThreadId::new(i as u32))
            .collect()
    }
}
