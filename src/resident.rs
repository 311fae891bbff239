// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! The resident set: a per-process, fixed-size table of RAM-resident slots
//! with aging counters and load-order stamps (spec &sect;4.3, data model &sect;3).

use crate::config::MAX_PSYC_PAGES;
use crate::pagetable::PageTable;
use crate::types::VirtPage;

/// One resident slot (`page_access_info` in the spec).
#[derive(Debug, Copy, Clone)]
pub struct ResidentSlot {
    page_address: VirtPage,
    access_counter: u32,
    loaded_at: u64,
    in_use: bool,
}

impl ResidentSlot {
    const fn empty() -> ResidentSlot {
        ResidentSlot { page_address: VirtPage::NONE, access_counter: 0, loaded_at: 0, in_use: false }
    }

    pub fn page_address(&self) -> VirtPage { self.page_address }

    pub fn access_counter(&self) -> u32 { self.access_counter }

    pub fn loaded_at(&self) -> u64 { self.loaded_at }

    pub fn in_use(&self) -> bool { self.in_use }
}

/// A resident-slot index handed back by lookups so callers can mutate a
/// specific slot without re-scanning.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResidentSlotId(usize);

impl ResidentSlotId {
    pub(crate) fn from_index(i: usize) -> ResidentSlotId { ResidentSlotId(i) }
}

pub struct ResidentSet {
    slots: [ResidentSlot; MAX_PSYC_PAGES],
    /// `page_turn`: monotonically increasing stamp source (spec I5). Owned
    /// exclusively by the process this resident set belongs to.
    page_turn: u64,
}

impl ResidentSet {
    pub const CAPACITY: usize = MAX_PSYC_PAGES;

    pub fn new() -> ResidentSet { ResidentSet { slots: [ResidentSlot::empty(); MAX_PSYC_PAGES], page_turn: 0 } }

    /// Return the current stamp, then increment it (spec &sect;4.3). Never called
    /// concurrently for one process: it is write-only by its owner.
    pub fn next_turn(&mut self) -> u64 {
        let t = self.page_turn;
        self.page_turn += 1;
        t
    }

    pub fn len_in_use(&self) -> usize { self.slots.iter().filter(|s| s.in_use).count() }

    pub fn at_capacity(&self) -> bool { self.len_in_use() >= Self::CAPACITY }

    pub fn slots(&self) -> &[ResidentSlot; MAX_PSYC_PAGES] { &self.slots }

    /// The in-use slots paired with their id, in scan order -- the iteration
    /// order every replacement policy relies on for tie-breaking.
    pub fn in_use_entries(&self) -> impl Iterator<Item = (ResidentSlotId, &ResidentSlot)> {
        self.slots.iter().enumerate().filter(|(_, s)| s.in_use).map(|(i, s)| (ResidentSlotId::from_index(i), s))
    }

    pub fn get_free(&self) -> Option<ResidentSlotId> { self.slots.iter().position(|s| !s.in_use).map(ResidentSlotId) }

    pub fn get_for(&self, v: VirtPage) -> Option<ResidentSlotId> {
        self.slots.iter().position(|s| s.in_use && s.page_address == v).map(ResidentSlotId)
    }

    /// Claim a free slot for a newly-loaded page (spec &sect;4.6 step 7).
    pub fn claim(&mut self, id: ResidentSlotId, v: VirtPage, initial_counter: u32) -> u64 {
        let stamp = self.next_turn();
        let slot = &mut self.slots[id.0];
        slot.in_use = true;
        slot.page_address = v;
        slot.access_counter = initial_counter;
        slot.loaded_at = stamp;
        stamp
    }

    /// Evict a slot (spec &sect;4.5 step 5).
    pub fn clear(&mut self, id: ResidentSlotId) {
        self.slots[id.0] = ResidentSlot::empty();
    }

    /// Directly restore a slot's identity, used only by fork duplication
    /// (spec &sect;4.7 step 4), which copies `page_address`/`in_use` but resets
    /// aging state per the policy's own initial values.
    pub fn claim_with_fresh_state(&mut self, id: ResidentSlotId, v: VirtPage, initial_counter: u32) {
        let stamp = self.next_turn();
        let slot = &mut self.slots[id.0];
        slot.in_use = true;
        slot.page_address = v;
        slot.access_counter = initial_counter;
        slot.loaded_at = stamp;
    }

    /// The aging step (spec &sect;4.3), run once per scheduler dispatch for the
    /// process that just ran. Guards against a stale/missing leaf per open
    /// question O4: a page whose leaf can no longer be walked is simply not
    /// credited this round rather than the aging step panicking.
    pub fn age<PT: PageTable>(&mut self, page_table: &mut PT) {
        for slot in self.slots.iter_mut() {
            if !slot.in_use {
                continue;
            }
            slot.access_counter >>= 1;
            if let Some(leaf) = page_table.walk(slot.page_address) {
                if leaf.valid() && leaf.accessed() {
                    slot.access_counter |= 0x8000_0000;
                    page_table.set_flags(slot.page_address, leaf.flags - crate::pagetable::PteFlags::ACCESSED);
                }
            }
        }
    }

    /// Re-stamp a slot to the tail of the FIFO order (SCFIFO second chance).
    pub fn bump_loaded_at(&mut self, id: ResidentSlotId) -> u64 {
        let stamp = self.next_turn();
        self.slots[id.0].loaded_at = stamp;
        stamp
    }

    pub fn slot(&self, id: ResidentSlotId) -> &ResidentSlot { &self.slots[id.0] }
}

impl Default for ResidentSet {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagetable::{LeafEntry, PteFlags};
    use crate::types::PhysFrame;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockPageTable {
        leaves: HashMap<usize, LeafEntry>,
    }

    impl PageTable for MockPageTable {
        fn walk(&self, va: VirtPage) -> Option<LeafEntry> { self.leaves.get(&va.addr()).copied() }

        fn set_flags(&mut self, va: VirtPage, flags: PteFlags) -> bool {
            if let Some(l) = self.leaves.get_mut(&va.addr()) {
                l.flags = flags;
                true
            } else {
                false
            }
        }

        fn map(&mut self, va: VirtPage, pa: PhysFrame, flags: PteFlags) -> bool {
            self.leaves.insert(va.addr(), LeafEntry { flags, frame: pa });
            true
        }

        fn unmap(&mut self, va: VirtPage) { self.leaves.remove(&va.addr()); }
    }

    #[test]
    fn aging_shifts_and_records_hits() {
        let mut rs = ResidentSet::new();
        let mut pt = MockPageTable::default();
        let v = VirtPage::containing(0x1000);
        pt.map(v, PhysFrame::from_addr(0x9000), PteFlags::VALID | PteFlags::ACCESSED);
        let id = rs.get_free().unwrap();
        rs.claim(id, v, 0);

        rs.age(&mut pt);
        assert_eq!(rs.slot(id).access_counter(), 0x8000_0000);
        // the accessed bit must have been cleared after crediting it
        assert!(!pt.walk(v).unwrap().accessed());

        // no further hardware reference: counter just keeps shifting right
        rs.age(&mut pt);
        assert_eq!(rs.slot(id).access_counter(), 0x4000_0000);
    }

    #[test]
    fn aging_referenced_every_window_keeps_top_bit_set() {
        // property P7: a page referenced every window never loses bit 31
        let mut rs = ResidentSet::new();
        let mut pt = MockPageTable::default();
        let v = VirtPage::containing(0x2000);
        pt.map(v, PhysFrame::from_addr(0xa000), PteFlags::VALID);
        let id = rs.get_free().unwrap();
        rs.claim(id, v, 0);

        for _ in 0..32 {
            pt.set_flags(v, pt.walk(v).unwrap().flags | PteFlags::ACCESSED);
            rs.age(&mut pt);
            assert_eq!(rs.slot(id).access_counter() & 0x8000_0000, 0x8000_0000);
        }
    }

    #[test]
    fn stamps_are_monotonic() {
        let mut rs = ResidentSet::new();
        let a = rs.next_turn();
        let b = rs.next_turn();
        let c = rs.next_turn();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn free_and_lookup_scans() {
        let mut rs = ResidentSet::new();
        assert!(rs.get_free().is_some());
        let v = VirtPage::containing(0x4000);
        let id = rs.get_free().unwrap();
        rs.claim(id, v, 0xFFFF_FFFF);
        assert_eq!(rs.get_for(v), Some(id));
        assert_eq!(rs.len_in_use(), 1);
        rs.clear(id);
        assert_eq!(rs.get_for(v), None);
        assert_eq!(rs.len_in_use(), 0);
    }
}
