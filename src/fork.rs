// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Fork-time duplication of resident-set and swap-store state (spec &sect;4.7).
//!
//! The parent's actual address-space copy (resident pages only) and the
//! creation of the child's swap file are external collaborators (the
//! standard copy primitive and `create_swap`, both out of scope, &sect;1). This
//! module only performs the two things this subsystem owns: mirroring the
//! parent's swap-file contents into the freshly-created child swap file, and
//! mirroring which virtual pages are resident, with the child's aging state
//! reset to its policy's standard initial values.

use crate::config::PGSIZE;
use crate::error::Result;
use crate::process::PagingProcess;
use crate::swapstore::SwapBackend;

/// Duplicate `parent`'s paging state into `child`, which must already be a
/// freshly-constructed [`PagingProcess`] (empty resident set, empty swap
/// store over a freshly created swap file).
///
/// The staging buffer (spec &sect;4.7: "a single process-wide scratch page") is
/// just a local stack buffer here: in this crate state is passed explicitly
/// rather than reached for through a hidden global (design note &sect;9), so
/// there's no shared kernel-wide scratch page to serialize access to in the
/// first place -- the caller's own discipline around the fork path (spec
/// &sect;5: the child is not yet RUNNABLE, so its lock may safely be dropped
/// across I/O) is what `PagingProcess::write_swap_slot_at` already relies on.
pub fn fork_duplicate<B: SwapBackend>(parent: &PagingProcess<B>, child: &PagingProcess<B>) -> Result<()> {
    // Step 3: copy each occupied swap slot, index-for-index, through a
    // kernel staging buffer.
    for (id, v) in parent.swap_in_use() {
        let mut staging = [0u8; PGSIZE];
        parent.read_swap_slot(id, &mut staging)?;
        child.write_swap_slot_at(id, v, &staging)?;
    }

    // Step 4: mirror which pages are resident, at the same slot index the
    // parent holds each one in ("the corresponding child slot"); a freshly
    // constructed child's resident set is entirely free, so every index is
    // available. loaded_at/access_counter are reset by the child's own
    // standard initialization, not copied.
    for (id, v) in parent.resident_in_use() {
        child.claim_resident_fresh_at(id, v)?;
    }

    Ok(())
}
