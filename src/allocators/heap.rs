//! OS-heap wrapper.
//!
//! Every allocation is prefixed with a header placed immediately before the
//! aligned payload, so `free` recovers the backing pointer and layout in
//! constant time regardless of alignment. The sentinel word and free-poison
//! exist only in debug builds; the header itself is always present because
//! `std::alloc::dealloc` requires the original layout.

use std::alloc::{alloc, dealloc, Layout};

use crate::debug::poison::{self, FREED_PATTERN};
use crate::util::layout::{align_up, DEFAULT_ALIGNMENT};

const SENTINEL_ALLOCATED: u32 = 0x00c0_ffee;
const SENTINEL_FREED: u32 = 0xdead_beef;

#[repr(C)]
struct AllocationHeader {
    payload_size: usize,
    total_size: usize,
    actual: *mut u8,
    sentinel: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<AllocationHeader>();

/// Wrapper around the system allocator with allocation tracking.
///
/// This allocator reports `contains == false` for every pointer; it is the
/// manager's fallback once the region allocators have been ruled out.
pub struct OsHeapAllocator {
    allocation_count: usize,
    bytes_allocated: usize,
    high_water: usize,
}

impl OsHeapAllocator {
    pub fn new() -> Self {
        Self {
            allocation_count: 0,
            bytes_allocated: 0,
            high_water: 0,
        }
    }

    /// Allocate `size` bytes aligned to `alignment`. Exhaustion of the
    /// backing heap is fatal; on hardware where address zero is writable a
    /// null return would be a disaster deferred, not avoided.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> *mut u8 {
        let alignment = alignment.max(DEFAULT_ALIGNMENT);
        let total = match size.checked_add(HEADER_SIZE + (alignment - 1)) {
            Some(total) => total,
            None => crate::kl_fatal!("heap request overflow size {size}"),
        };

        let layout = match Layout::from_size_align(total, DEFAULT_ALIGNMENT) {
            Ok(layout) => layout,
            Err(_) => crate::kl_fatal!("heap layout overflow size {size}"),
        };
        // SAFETY: layout has non-zero size.
        let actual = unsafe { alloc(layout) };
        if actual.is_null() {
            crate::kl_fatal!("system allocation failed size {total}");
        }

        let aligned = align_up(actual as usize + HEADER_SIZE, alignment) as *mut u8;
        // SAFETY: aligned - HEADER_SIZE is within the backing allocation
        // and aligned for the header because alignment >= DEFAULT_ALIGNMENT
        // and HEADER_SIZE is a multiple of it.
        unsafe {
            let header = aligned.sub(HEADER_SIZE).cast::<AllocationHeader>();
            header.write(AllocationHeader {
                payload_size: size,
                total_size: total,
                actual,
                sentinel: SENTINEL_ALLOCATED,
            });
        }

        self.allocation_count += 1;
        self.bytes_allocated += size; // header overhead is not charged
        self.high_water = self.high_water.max(self.bytes_allocated);

        aligned
    }

    /// Release a pointer previously returned by [`Self::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from this allocator and not have been freed.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        // SAFETY: the header precedes every payload this allocator returns.
        let header = unsafe { &mut *ptr.sub(HEADER_SIZE).cast::<AllocationHeader>() };
        crate::kl_verify!(
            header.sentinel == SENTINEL_ALLOCATED,
            "bad free: sentinel corrupt at {:?}",
            ptr
        );
        crate::kl_check!(
            self.allocation_count > 0 && self.bytes_allocated >= header.payload_size,
            "bad free: counters underflow"
        );

        self.allocation_count -= 1;
        self.bytes_allocated = self.bytes_allocated.saturating_sub(header.payload_size);

        header.sentinel = SENTINEL_FREED;
        let actual = header.actual;
        let total = header.total_size;
        // SAFETY: the payload is owned until dealloc below.
        unsafe { poison::poison(ptr, FREED_PATTERN, header.payload_size) };

        let layout = Layout::from_size_align(total, DEFAULT_ALIGNMENT)
            .expect("layout was valid at allocation");
        // SAFETY: actual/layout are exactly what alloc() was given.
        unsafe { dealloc(actual, layout) };
    }

    pub fn allocation_count(&self) -> usize {
        self.allocation_count
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn high_water(&self) -> usize {
        self.high_water
    }
}

impl Default for OsHeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_tracks_counters() {
        let mut heap = OsHeapAllocator::new();

        let a = heap.allocate(64, 8);
        let b = heap.allocate(32, 8);
        assert_eq!(heap.allocation_count(), 2);
        assert_eq!(heap.bytes_allocated(), 96);
        assert_eq!(heap.high_water(), 96);

        unsafe {
            heap.free(a);
            heap.free(b);
        }
        assert_eq!(heap.allocation_count(), 0);
        assert_eq!(heap.bytes_allocated(), 0);
        assert_eq!(heap.high_water(), 96);
    }

    #[test]
    fn test_alignment_honored() {
        let mut heap = OsHeapAllocator::new();
        for align in [8usize, 16, 64, 256] {
            let p = heap.allocate(10, align);
            assert_eq!(p as usize % align, 0, "align {align}");
            unsafe { heap.free(p) };
        }
    }

    #[test]
    fn test_payload_is_writable() {
        let mut heap = OsHeapAllocator::new();
        let p = heap.allocate(128, 16);
        unsafe {
            std::ptr::write_bytes(p, 0x5a, 128);
            assert_eq!(*p, 0x5a);
            assert_eq!(*p.add(127), 0x5a);
            heap.free(p);
        }
    }
}
