// SPDX-FileCopyrightText: 2020 Sean Cross <sean@xobs.io>
// SPDX-License-Identifier: Apache-2.0

//! Contract owed by the (out-of-scope) physical-frame allocator.

use crate::error::Result;
use crate::types::PhysFrame;

pub trait FrameAllocator {
    /// Hand out one zeroed physical frame, or `NoFreeFrame` if RAM is exhausted.
    fn alloc_frame(&mut self) -> Result<PhysFrame>;

    /// Return a frame to the free pool. Infallible: freeing an already-free
    /// frame is a caller bug the allocator is entitled to assert on, not
    /// something this crate needs to recover from.
    fn free_frame(&mut self, frame: PhysFrame);
}

/// Convenience alias; kept so call sites read like the spec's
/// "return the physical frame to the frame allocator" language.
pub fn release_frame<F: FrameAllocator>(alloc: &mut F, frame: PhysFrame) { alloc.free_frame(frame) }

use crate::config::PGSIZE;

/// Contract owed by the (out-of-scope) direct physical-memory access the
/// kernel's identity-mapped window provides. `store_page`/`load_page` use
/// this to move a page's bytes to and from the swap file; everything else in
/// this crate only ever deals in frame/page identity, never contents.
pub trait PhysMemory {
    fn read_frame(&self, frame: PhysFrame, buf: &mut [u8; PGSIZE]);
    fn write_frame(&mut self, frame: PhysFrame, buf: &[u8; PGSIZE]);
}
