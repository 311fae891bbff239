// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! The page-table adapter (spec &sect;4.1).
//!
//! The actual page-table walk, TLB shootdown and leaf-entry encoding are
//! external collaborators (out of scope, &sect;1): this module only states
//! the contract the rest of the crate needs from them, plus the bit layout
//! the subsystem owns a piece of (`PAGED_OUT`).

use bitflags::bitflags;

use crate::types::{PhysFrame, VirtPage};

bitflags! {
    /// Leaf page-table-entry flags. `VALID` and `ACCESSED` are hardware bits;
    /// `PAGED_OUT` is a software-reserved bit owned by this subsystem.
    pub struct PteFlags: usize {
        const NONE      = 0b0000_0000;
        const READ      = 0b0000_0001;
        const WRITE     = 0b0000_0010;
        const EXEC      = 0b0000_0100;
        const USER      = 0b0000_1000;
        /// Hardware-set valid bit (`V`).
        const VALID     = 0b0001_0000;
        /// Hardware-set accessed bit (`A`); cleared only by software.
        const ACCESSED  = 0b0010_0000;
        /// Software-reserved paged-out marker (`PG`).
        const PAGED_OUT = 0b0100_0000;
    }
}

/// A snapshot of one leaf entry: its permission/status bits, and the physical
/// frame it maps when `VALID` is set.
#[derive(Debug, Copy, Clone)]
pub struct LeafEntry {
    pub flags: PteFlags,
    pub frame: PhysFrame,
}

impl LeafEntry {
    pub fn valid(&self) -> bool { self.flags.contains(PteFlags::VALID) }

    pub fn accessed(&self) -> bool { self.flags.contains(PteFlags::ACCESSED) }

    pub fn paged_out(&self) -> bool { self.flags.contains(PteFlags::PAGED_OUT) }
}

/// Contract owed by the (out-of-scope) page-table walk primitive.
///
/// `walk` never allocates intermediate tables -- it is a read-only lookup.
/// Changing `PAGED_OUT`/`VALID` through `set_flags`/`map` must be coordinated
/// by the caller with the resident-set/swap-store bookkeeping so that I2
/// holds at every point another CPU could observe the leaf.
pub trait PageTable {
    /// Locate the leaf entry for `va`, or `None` if `va` isn't mapped at all.
    fn walk(&self, va: VirtPage) -> Option<LeafEntry>;

    /// Overwrite the flags of an already-mapped leaf, leaving its frame alone.
    /// Returns `WalkMiss`-shaped failure as `false` if `va` has no mapping.
    fn set_flags(&mut self, va: VirtPage, flags: PteFlags) -> bool;

    /// Install a fresh mapping `va -> pa` with the given flags, as the
    /// `mappages` primitive would. Used by `load_page` once a physical frame
    /// has been filled in from swap.
    fn map(&mut self, va: VirtPage, pa: PhysFrame, flags: PteFlags) -> bool;

    /// Tear down the mapping for `va`, if any. Used when a resident page is
    /// evicted.
    fn unmap(&mut self, va: VirtPage);
}
