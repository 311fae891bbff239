// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Compile-time configuration constants (spec &sect;6).

/// Page size, in bytes.
pub const PGSIZE: usize = 4096;

/// Resident (RAM) slots per process.
pub const MAX_PSYC_PAGES: usize = 16;

/// Swap slots per process. Must be >= MAX_PSYC_PAGES so that a fully-resident
/// process can still be evicted one page at a time without running out of
/// backing storage.
pub const MAX_TOTAL_PAGES: usize = 16;

const _ASSERT_CAPACITY: () = assert!(MAX_TOTAL_PAGES >= MAX_PSYC_PAGES);
