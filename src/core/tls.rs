//! Thread-local current-allocator id.
//!
//! Each thread starts on the heap allocator. Only
//! [`crate::core::scope::AllocatorScope`] mutates this, in strict LIFO
//! order, which is what makes the restore-on-drop protocol sound.

use std::cell::Cell;

use crate::allocators::AllocatorId;

thread_local! {
    static CURRENT_ALLOCATOR: Cell<AllocatorId> = const { Cell::new(AllocatorId::Heap) };
}

/// The allocator that `AllocatorId::Current` resolves to on this thread.
pub fn current_allocator() -> AllocatorId {
    CURRENT_ALLOCATOR.with(Cell::get)
}

pub(crate) fn set_current_allocator(id: AllocatorId) {
    CURRENT_ALLOCATOR.with(|cell| cell.set(id));
}
