// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Error kinds for the paging core (spec &sect;7).
//!
//! None of these are retried internally. Every fallible operation in this
//! crate restores I1/I2 before returning an error: the on-disk, in-memory and
//! page-table views agree with the state from before the call.

use core::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PagingError {
    /// The swap store is full; eviction cannot proceed.
    NoFreeSwap,
    /// A read or write against the backing file failed.
    SwapIoError,
    /// The frame allocator has no physical memory left to hand out.
    NoFreeFrame,
    /// `load_page` was called but no swap slot holds the requested page.
    NoSwapEntry,
    /// The faulting address isn't mapped at all; not a paging fault.
    WalkMiss,
    /// The resident set is at capacity and no policy produced a victim
    /// (only reachable with a degenerate, empty resident set -- see O3).
    NoVictim,
}

impl fmt::Display for PagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PagingError::NoFreeSwap => "swap store exhausted",
            PagingError::SwapIoError => "backing-file I/O failed",
            PagingError::NoFreeFrame => "frame allocator exhausted",
            PagingError::NoSwapEntry => "no swap slot holds the requested page",
            PagingError::WalkMiss => "virtual address is not mapped",
            PagingError::NoVictim => "no victim candidate in resident set",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for PagingError {}

pub type Result<T> = core::result::Result<T, PagingError>;
