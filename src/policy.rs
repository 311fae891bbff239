// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Replacement policies: NFUA, LAPA, SCFIFO and NONE (spec &sect;4.4).
//!
//! `SELECTION` is a compile-time parameter in the spec. We model it as a
//! tagged enum implementing a small capability set (`initial_counter`,
//! `select_victim`) rather than a trait-object vtable, since the policy never
//! actually changes at runtime within one kernel build -- see DESIGN.md for
//! the testability trade-off this resolves.

use crate::error::{PagingError, Result};
use crate::pagetable::PageTable;
use crate::resident::{ResidentSet, ResidentSlotId};
use crate::types::VirtPage;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Not-Frequently-Used, Aging.
    Nfua,
    /// Least-Accessed Page Approximation.
    Lapa,
    /// Second-Chance FIFO.
    Scfifo,
    /// Paging disabled: eviction beyond MAX_PSYC_PAGES is a program error.
    None,
}

impl Policy {
    /// The replacement policy pinned by this build's `SELECTION` Cargo feature.
    pub fn from_build_config() -> Policy {
        if cfg!(feature = "policy-nfua") {
            Policy::Nfua
        } else if cfg!(feature = "policy-lapa") {
            Policy::Lapa
        } else if cfg!(feature = "policy-scfifo") {
            Policy::Scfifo
        } else {
            Policy::None
        }
    }

    /// The counter a freshly-loaded page starts with: all-zero for NFUA/SCFIFO,
    /// all-ones for LAPA so that an untouched page isn't mistaken for a cold one.
    pub fn initial_counter(&self) -> u32 {
        match self {
            Policy::Lapa => 0xFFFF_FFFF,
            _ => 0,
        }
    }

    /// Select a victim virtual address from the in-use resident slots.
    /// Only ever called when the resident set is at capacity.
    pub fn select_victim<PT: PageTable>(&self, resident: &mut ResidentSet, page_table: &mut PT) -> Result<VirtPage> {
        match self {
            Policy::Nfua => select_nfua(resident),
            Policy::Lapa => select_lapa(resident),
            Policy::Scfifo => select_scfifo(resident, page_table),
            Policy::None => Err(PagingError::NoVictim),
        }
    }
}

/// NFUA: minimum `access_counter`, ties broken by first-encountered scan order.
fn select_nfua(resident: &ResidentSet) -> Result<VirtPage> {
    let mut best: Option<(ResidentSlotId, u32)> = None;
    for (id, slot) in resident.in_use_entries() {
        match best {
            None => best = Some((id, slot.access_counter())),
            Some((_, bc)) if slot.access_counter() < bc => best = Some((id, slot.access_counter())),
            _ => {}
        }
    }
    best.map(|(id, _)| resident.slot(id).page_address()).ok_or(PagingError::NoVictim)
}

/// LAPA: minimum popcount(access_counter) first, then minimum access_counter,
/// then first-encountered.
fn select_lapa(resident: &ResidentSet) -> Result<VirtPage> {
    let mut best: Option<(ResidentSlotId, u32, u32)> = None; // (id, popcount, counter)
    for (id, slot) in resident.in_use_entries() {
        let pc = slot.access_counter().count_ones();
        match best {
            None => best = Some((id, pc, slot.access_counter())),
            Some((_, bp, bc)) if (pc, slot.access_counter()) < (bp, bc) => best = Some((id, pc, slot.access_counter())),
            _ => {}
        }
    }
    best.map(|(id, _, _)| resident.slot(id).page_address()).ok_or(PagingError::NoVictim)
}

/// SCFIFO: repeatedly take the oldest `loaded_at` slot; if its `A` bit is set,
/// clear `A`, re-stamp it to the tail, and keep going. Terminates because
/// each iteration either returns or strictly grows the chosen slot's stamp,
/// and with a bounded working set every candidate eventually shows `A=0`
/// (spec property P6: at most 2*MAX_PSYC_PAGES iterations).
fn select_scfifo<PT: PageTable>(resident: &mut ResidentSet, page_table: &mut PT) -> Result<VirtPage> {
    let max_iters = 2 * ResidentSet::CAPACITY;
    for _ in 0..max_iters {
        let oldest = resident
            .in_use_entries()
            .min_by_key(|(_, s)| s.loaded_at())
            .map(|(id, _)| id)
            .ok_or(PagingError::NoVictim)?;

        let v = resident.slot(oldest).page_address();
        let leaf = page_table.walk(v);
        let accessed = leaf.map(|l| l.valid() && l.accessed()).unwrap_or(false);
        if accessed {
            let flags = leaf.unwrap().flags - crate::pagetable::PteFlags::ACCESSED;
            page_table.set_flags(v, flags);
            resident.bump_loaded_at(oldest);
            continue;
        }
        return Ok(v);
    }
    Err(PagingError::NoVictim)
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

    fn page(n: usize) -> VirtPage { VirtPage::containing(0x1000 * (n + 1)) }

    #[test]
    fn nfua_picks_minimum_counter_first_encountered_on_tie() {
        let mut rs = ResidentSet::new();
        let mut pt = MockPageTable::default();
        for i in 0..4 {
            let v = page(i);
            pt.map(v, PhysFrame::from_addr(0x10_000 + i * 0x1000), PteFlags::VALID);
            let id = rs.get_free().unwrap();
            rs.claim(id, v, if i == 2 { 3 } else { 5 });
        }
        let victim = Policy::Nfua.select_victim(&mut rs, &mut pt).unwrap();
        assert_eq!(victim, page(2));
    }

    #[test]
    fn lapa_prefers_smaller_popcount_then_smaller_value() {
        // spec S4: two counters with the same popcount=2: 0x3 vs 0x5 -> victim is 0x3
        let mut rs = ResidentSet::new();
        let mut pt = MockPageTable::default();
        let v0 = page(0);
        let v1 = page(1);
        pt.map(v0, PhysFrame::from_addr(0x11000), PteFlags::VALID);
        pt.map(v1, PhysFrame::from_addr(0x12000), PteFlags::VALID);
        let id0 = rs.get_free().unwrap();
        rs.claim(id0, v0, 0x0000_0005);
        let id1 = rs.get_free().unwrap();
        rs.claim(id1, v1, 0x0000_0003);

        let victim = Policy::Lapa.select_victim(&mut rs, &mut pt).unwrap();
        assert_eq!(victim, v1);
    }

    #[test]
    fn lapa_initial_bias_favors_retaining_fresh_pages() {
        // spec P8/S4-adjacent: a freshly loaded LAPA page (0xFFFFFFFF, popcount 32)
        // is never the victim against any page with a strictly smaller popcount.
        let mut rs = ResidentSet::new();
        let mut pt = MockPageTable::default();
        let fresh = page(0);
        let worn = page(1);
        pt.map(fresh, PhysFrame::from_addr(0x13000), PteFlags::VALID);
        pt.map(worn, PhysFrame::from_addr(0x14000), PteFlags::VALID);
        let id0 = rs.get_free().unwrap();
        rs.claim(id0, fresh, Policy::Lapa.initial_counter());
        let id1 = rs.get_free().unwrap();
        rs.claim(id1, worn, 0x0000_0001);

        let victim = Policy::Lapa.select_victim(&mut rs, &mut pt).unwrap();
        assert_eq!(victim, worn);
    }

    #[test]
    fn scfifo_gives_referenced_page_a_second_chance() {
        // spec S2: load pages 0..N, reference page 0 (sets A), age once, then evict.
        // Expected victim: page 1 (oldest with A=0), not page 0.
        let mut rs = ResidentSet::new();
        let mut pt = MockPageTable::default();
        for i in 0..4 {
            let v = page(i);
            pt.map(v, PhysFrame::from_addr(0x20_000 + i * 0x1000), PteFlags::VALID);
            let id = rs.get_free().unwrap();
            rs.claim(id, v, 0);
        }
        // simulate a hardware reference to page 0 before eviction runs
        let v0 = page(0);
        pt.set_flags(v0, pt.walk(v0).unwrap().flags | PteFlags::ACCESSED);

        let victim = Policy::Scfifo.select_victim(&mut rs, &mut pt).unwrap();
        assert_eq!(victim, page(1));
        // page 0 survived but lost its accessed bit and moved to the tail
        assert!(!pt.walk(v0).unwrap().accessed());
    }

    #[test]
    fn scfifo_terminates_within_bound_when_everything_is_accessed() {
        let mut rs = ResidentSet::new();
        let mut pt = MockPageTable::default();
        for i in 0..ResidentSet::CAPACITY {
            let v = page(i);
            pt.map(v, PhysFrame::from_addr(0x30_000 + i * 0x1000), PteFlags::VALID | PteFlags::ACCESSED);
            let id = rs.get_free().unwrap();
            rs.claim(id, v, 0);
        }
        // every slot has A=1: the loop must clear them one at a time and still
        // terminate with *some* victim inside 2*CAPACITY iterations.
        let victim = Policy::Scfifo.select_victim(&mut rs, &mut pt);
        assert!(victim.is_ok());
    }

    #[test]
    fn none_policy_never_selects_a_victim() {
        let mut rs = ResidentSet::new();
        let mut pt = MockPageTable::default();
        let v = page(0);
        pt.map(v, PhysFrame::from_addr(0x40000), PteFlags::VALID);
        let id = rs.get_free().unwrap();
        rs.claim(id, v, 0);
        assert_eq!(Policy::None.select_victim(&mut rs, &mut pt), Err(PagingError::NoVictim));
    }

    #[test]
    fn empty_resident_set_returns_typed_absence_not_a_panic() {
        // open question O3: find_* must not dereference a null pointer on an
        // empty resident set.
        let mut rs = ResidentSet::new();
        let mut pt = MockPageTable::default();
        assert_eq!(Policy::Nfua.select_victim(&mut rs, &mut pt), Err(PagingError::NoVictim));
        assert_eq!(Policy::Lapa.select_victim(&mut rs, &mut pt), Err(PagingError::NoVictim));
        assert_eq!(Policy::Scfifo.select_victim(&mut rs, &mut pt), Err(PagingError::NoVictim));
    }
}
