// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Small newtypes shared across the paging core.
//!
//! The resident set, the swap store and the page-table adapter all index the
//! same key space -- a process's virtual page number. None of these tables
//! own a pointer to another; they each hold a `VirtPage` as a plain value.
//! See the module-level note in `lib.rs` for why that matters.

use core::num::NonZeroU8;

use crate::config::PGSIZE;

/// A page-aligned virtual address, i.e. a virtual page number expressed in bytes.
///
/// `VirtPage::NONE` (the all-zero value) marks a free resident/swap slot, mirroring
/// the C convention of `page_address == 0` meaning "unused". Page zero is never a
/// valid user mapping in this kernel, so the sentinel is unambiguous.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtPage(usize);

impl VirtPage {
    pub const NONE: VirtPage = VirtPage(0);

    /// Coarsen a raw virtual address down to its containing page. This is the
    /// canonical key used everywhere a `VirtPage` is compared or stored (see
    /// open question O1 in the design notes: callers must not mix aligned and
    /// unaligned keys).
    pub fn containing(addr: usize) -> VirtPage { VirtPage(addr & !(PGSIZE - 1)) }

    /// Build a `VirtPage` from an address already known to be page-aligned.
    pub fn from_aligned(addr: usize) -> VirtPage {
        debug_assert!(addr & (PGSIZE - 1) == 0, "address {:#x} is not page-aligned", addr);
        VirtPage(addr)
    }

    pub fn addr(self) -> usize { self.0 }

    pub fn is_none(self) -> bool { self.0 == 0 }
}

impl Default for VirtPage {
    fn default() -> Self { VirtPage::NONE }
}

/// A physical page frame number, expressed as a byte address, as handed back by
/// the (out-of-scope) frame allocator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PhysFrame(usize);

impl PhysFrame {
    pub fn from_addr(addr: usize) -> PhysFrame { PhysFrame(addr) }

    pub fn addr(self) -> usize { self.0 }
}

/// Process identifier. Modeled as `NonZeroU8` so that `Option<Pid>` is
/// pointer-sized and zero means "no process", the same trick the kernel this
/// is drawn from uses for its own `PID` type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(NonZeroU8);

impl Pid {
    pub fn new(id: u8) -> Option<Pid> { NonZeroU8::new(id).map(Pid) }

    pub fn get(self) -> u8 { self.0.get() }
}
