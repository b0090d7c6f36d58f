//! The allocator variants owned by the memory manager.
//!
//! Four implementations share one calling convention: the OS-heap wrapper,
//! the permanent bump region, the temporary stack that rewinds on scope
//! close, and the multi-section scratchpad. The manager in
//! [`crate::core::manager`] owns one of each and dispatches by
//! [`AllocatorId`].

pub mod heap;
pub mod scratchpad;
pub mod stack;

pub use heap::OsHeapAllocator;
pub use scratchpad::ScratchpadAllocator;
pub use stack::{BumpAllocator, TempStackAllocator};

/// Names one of the allocator instances owned by the memory manager.
///
/// The scratch ids are contiguous and their order is load-bearing:
/// [`AllocatorId::ScratchAll`] must come last so that section indices can
/// be computed by subtraction. [`AllocatorId::Current`] is a sentinel
/// meaning "the thread-local current allocator".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(usize)]
pub enum AllocatorId {
    /// OS heap, wrapped for tracking. The fallback for every other id.
    Heap = 0,
    /// Bump region that never reclaims.
    Permanent,
    /// Bump region rewound when its scope closes.
    TemporaryStack,
    /// First scratchpad page.
    ScratchPage0,
    /// Second scratchpad page.
    ScratchPage1,
    /// Third scratchpad page.
    ScratchPage2,
    /// Scratchpad working-buffer section.
    ScratchTemp,
    /// The whole scratchpad as one section. Exclusive with the others.
    ScratchAll,
    /// Sentinel: resolve to the thread-local current allocator.
    Current,
}

/// Number of real allocator ids, excluding the `Current` sentinel.
pub const ALLOCATOR_ID_COUNT: usize = AllocatorId::Current as usize;

impl AllocatorId {
    /// All real ids in declaration order.
    pub const ALL: [AllocatorId; ALLOCATOR_ID_COUNT] = [
        AllocatorId::Heap,
        AllocatorId::Permanent,
        AllocatorId::TemporaryStack,
        AllocatorId::ScratchPage0,
        AllocatorId::ScratchPage1,
        AllocatorId::ScratchPage2,
        AllocatorId::ScratchTemp,
        AllocatorId::ScratchAll,
    ];

    /// True for the four scratchpad section ids.
    pub fn is_scratch(self) -> bool {
        (self as usize) >= (AllocatorId::ScratchPage0 as usize)
            && (self as usize) <= (AllocatorId::ScratchAll as usize)
    }

    /// Scratch section index, `None` for non-scratch ids.
    pub fn scratch_section(self) -> Option<usize> {
        if self.is_scratch() {
            Some(self as usize - AllocatorId::ScratchPage0 as usize)
        } else {
            None
        }
    }

    /// Short label for diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            AllocatorId::Heap => "heap",
            AllocatorId::Permanent => "perm",
            AllocatorId::TemporaryStack => "temp",
            AllocatorId::ScratchPage0 => "scratch0",
            AllocatorId::ScratchPage1 => "scratch1",
            AllocatorId::ScratchPage2 => "scratch2",
            AllocatorId::ScratchTemp => "scratch_temp",
            AllocatorId::ScratchAll => "scratch_all",
            AllocatorId::Current => "current",
        }
    }
}

/// Counter snapshot taken when a scope opens, checked when it closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeSnapshot {
    pub allocation_count: usize,
    pub bytes_allocated: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_ids_are_contiguous() {
        assert_eq!(
            AllocatorId::ScratchPage0 as usize + 1,
            AllocatorId::ScratchPage1 as usize
        );
        assert_eq!(
            AllocatorId::ScratchPage1 as usize + 1,
            AllocatorId::ScratchPage2 as usize
        );
        assert_eq!(
            AllocatorId::ScratchPage2 as usize + 1,
            AllocatorId::ScratchTemp as usize
        );
        assert_eq!(
            AllocatorId::ScratchTemp as usize + 1,
            AllocatorId::ScratchAll as usize
        );
    }

    #[test]
    fn test_scratch_sections() {
        assert_eq!(AllocatorId::ScratchPage0.scratch_section(), Some(0));
        assert_eq!(AllocatorId::ScratchTemp.scratch_section(), Some(3));
        assert_eq!(AllocatorId::ScratchAll.scratch_section(), Some(4));
        assert_eq!(AllocatorId::Heap.scratch_section(), None);
        assert!(!AllocatorId::TemporaryStack.is_scratch());
    }

    #[test]
    fn test_all_excludes_sentinel() {
        assert_eq!(AllocatorId::ALL.len(), 8);
        assert!(!AllocatorId::ALL.contains(&AllocatorId::Current));
    }
}
