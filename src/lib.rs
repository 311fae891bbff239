// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Per-process paging and page-replacement core for a small teaching kernel.
//!
//! This crate is the swap subsystem of a 64-bit RISC-style teaching kernel:
//! per-process bookkeeping that couples hardware page-table entries to
//! RAM-resident slots and backing-file slots, three replacement policies
//! (NFUA, LAPA, SCFIFO) that pick a victim when a resident slot is needed and
//! none is free, and the fork-time duplication that gives a child process an
//! identical working set.
//!
//! What this crate does *not* do -- because the kernel it lives in already
//! has one -- is run a scheduler, walk or allocate page tables down at the
//! hardware level, hand out physical frames, or talk to a disk. Those are
//! expressed here as traits ([`pagetable::PageTable`], [`frame::FrameAllocator`],
//! [`frame::PhysMemory`], [`swapstore::SwapBackend`]) that the rest of the
//! kernel implements.
//!
//! See `SPEC_FULL.md` for the full module-by-module contract and
//! `DESIGN.md` for where each part of this crate is grounded.

pub mod config;
pub mod error;
pub mod fork;
pub mod frame;
pub mod pagetable;
pub mod policy;
pub mod process;
pub mod resident;
pub mod swapstore;
pub mod types;

pub use config::{MAX_PSYC_PAGES, MAX_TOTAL_PAGES, PGSIZE};
pub use error::{PagingError, Result};
pub use fork::fork_duplicate;
pub use frame::{FrameAllocator, PhysMemory};
pub use pagetable::{LeafEntry, PageTable, PteFlags};
pub use policy::Policy;
pub use process::PagingProcess;
pub use swapstore::{SwapBackend, SwapSlotId, StoredPage};
pub use types::{PhysFrame, Pid, VirtPage};
