//! Bump allocators: the permanent region and the rewinding temporary stack.

use std::alloc::{alloc, dealloc, Layout};

use crate::allocators::ScopeSnapshot;
use crate::debug::poison::{self, STACK_RESET_PATTERN};
use crate::util::layout::align_up;

const REGION_ALIGN: usize = 16;

/// Bump allocator over one contiguous region. Nothing is ever physically
/// reclaimed; `free` only maintains the live-allocation count so leaks can
/// be audited.
pub struct BumpAllocator {
    begin: *mut u8,
    end: *mut u8,
    current: *mut u8,
    allocation_count: usize,
    label: &'static str,
}

// The region is only reached through the manager mutex.
unsafe impl Send for BumpAllocator {}

impl BumpAllocator {
    pub fn new(capacity: usize, label: &'static str) -> Self {
        crate::kl_verify!(capacity > 0, "{label} budget must be non-zero");
        let layout = Layout::from_size_align(capacity, REGION_ALIGN)
            .expect("region layout");
        // SAFETY: layout has non-zero size.
        let begin = unsafe { alloc(layout) };
        if begin.is_null() {
            crate::kl_fatal!("system allocation failed size {capacity}");
        }
        // SAFETY: freshly allocated region.
        unsafe { poison::poison(begin, STACK_RESET_PATTERN, capacity) };

        Self {
            begin,
            // SAFETY: one-past-the-end of the allocation.
            end: unsafe { begin.add(capacity) },
            current: begin,
            allocation_count: 0,
            label,
        }
    }

    /// Bump-allocate. Returns null on overflow; the manager handles the
    /// heap fallback.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> *mut u8 {
        let aligned = align_up(self.current as usize, alignment);
        let next = aligned.checked_add(size);
        match next {
            Some(next) if next <= self.end as usize => {
                self.allocation_count += 1;
                self.current = next as *mut u8;
                aligned as *mut u8
            }
            _ => std::ptr::null_mut(),
        }
    }

    /// Diagnostic free: decrements the live count only.
    pub fn free(&mut self, ptr: *mut u8) {
        crate::kl_check!(
            self.allocation_count > 0 && ptr >= self.begin && ptr < self.current,
            "bad free from {}",
            self.label
        );
        let _ = ptr;
        self.allocation_count = self.allocation_count.saturating_sub(1);
    }

    pub fn contains(&self, ptr: *const u8) -> bool {
        ptr >= self.begin && ptr < self.end
    }

    pub fn allocation_count(&self) -> usize {
        self.allocation_count
    }

    pub fn bytes_allocated(&self) -> usize {
        self.current as usize - self.begin as usize
    }

    pub fn capacity(&self) -> usize {
        self.end as usize - self.begin as usize
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn begin_scope(&self, snapshot: &mut ScopeSnapshot) {
        snapshot.allocation_count = self.allocation_count;
        snapshot.bytes_allocated = self.bytes_allocated();
    }

    fn begin_ptr(&self) -> *mut u8 {
        self.begin
    }
}

impl Drop for BumpAllocator {
    fn drop(&mut self) {
        let layout = Layout::from_size_align(self.capacity(), REGION_ALIGN)
            .expect("region layout");
        // SAFETY: begin/layout are exactly what alloc() was given.
        unsafe { dealloc(self.begin, layout) };
    }
}

/// Temporary stack: a [`BumpAllocator`] whose cursor rewinds to the scope's
/// recorded position when the scope closes. Leaks inside a scope are a
/// skippable assertion; the reclaimed span is poisoned in debug builds.
pub struct TempStackAllocator {
    inner: BumpAllocator,
    high_water: usize,
}

impl TempStackAllocator {
    pub fn new(capacity: usize, label: &'static str) -> Self {
        Self {
            inner: BumpAllocator::new(capacity, label),
            high_water: 0,
        }
    }

    pub fn allocate(&mut self, size: usize, alignment: usize) -> *mut u8 {
        self.inner.allocate(size, alignment)
    }

    pub fn free(&mut self, ptr: *mut u8) {
        self.inner.free(ptr);
    }

    pub fn contains(&self, ptr: *const u8) -> bool {
        self.inner.contains(ptr)
    }

    pub fn allocation_count(&self) -> usize {
        self.inner.allocation_count()
    }

    pub fn bytes_allocated(&self) -> usize {
        self.inner.bytes_allocated()
    }

    pub fn high_water(&mut self) -> usize {
        self.high_water = self.high_water.max(self.bytes_allocated());
        self.high_water
    }

    pub fn label(&self) -> &'static str {
        self.inner.label()
    }

    pub fn begin_scope(&self, snapshot: &mut ScopeSnapshot) {
        self.inner.begin_scope(snapshot);
    }

    /// Rewind to the scope's initial state. The live count must have
    /// returned to the scope's initial count or the scope leaked.
    pub fn end_scope(&mut self, snapshot: &ScopeSnapshot) {
        crate::kl_check!(
            self.inner.allocation_count <= snapshot.allocation_count,
            "memory leak in {} scope: {} allocations",
            self.label(),
            self.inner
                .allocation_count
                .saturating_sub(snapshot.allocation_count)
        );

        self.high_water = self.high_water.max(self.bytes_allocated());

        // The live count is deliberately not reset; that would erase the
        // evidence the shutdown leak audit depends on.
        let rewound = self.inner.begin_ptr() as usize + snapshot.bytes_allocated;
        let reclaimed = (self.inner.current as usize).saturating_sub(rewound);
        // SAFETY: [rewound, current) is inside the region.
        unsafe { poison::poison(rewound as *mut u8, STACK_RESET_PATTERN, reclaimed) };
        self.inner.current = rewound as *mut u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bump_allocates_and_overflows() {
        let mut bump = BumpAllocator::new(64, "test");

        let a = bump.allocate(16, 8);
        assert!(!a.is_null());
        let b = bump.allocate(16, 8);
        assert!(!b.is_null());
        assert_ne!(a, b);
        assert_eq!(bump.allocation_count(), 2);
        assert_eq!(bump.bytes_allocated(), 32);

        // Exceeds the remaining 32 bytes.
        assert!(bump.allocate(64, 8).is_null());
    }

    #[test]
    fn test_bump_free_is_diagnostic_only() {
        let mut bump = BumpAllocator::new(64, "test");
        let a = bump.allocate(8, 8);
        let bytes = bump.bytes_allocated();
        bump.free(a);
        assert_eq!(bump.allocation_count(), 0);
        assert_eq!(bump.bytes_allocated(), bytes);
    }

    #[test]
    fn test_bump_alignment() {
        let mut bump = BumpAllocator::new(256, "test");
        bump.allocate(1, 1);
        let p = bump.allocate(4, 64);
        assert_eq!(p as usize % 64, 0);
    }

    #[test]
    fn test_contains() {
        let mut bump = BumpAllocator::new(64, "test");
        let a = bump.allocate(8, 8);
        assert!(bump.contains(a));
        assert!(!bump.contains(std::ptr::null()));
        let outside = [0u8; 4];
        assert!(!bump.contains(outside.as_ptr()));
    }

    #[test]
    fn test_temp_stack_scope_rewind() {
        let mut stack = TempStackAllocator::new(256, "test");
        let before = stack.allocate(16, 8);
        assert!(!before.is_null());

        let mut snapshot = ScopeSnapshot::default();
        stack.begin_scope(&mut snapshot);
        assert_eq!(snapshot.allocation_count, 1);
        assert_eq!(snapshot.bytes_allocated, 16);

        for _ in 0..3 {
            let p = stack.allocate(24, 8);
            assert!(!p.is_null());
            stack.free(p);
        }
        assert_eq!(stack.bytes_allocated(), 16 + 72);

        stack.end_scope(&snapshot);
        assert_eq!(stack.bytes_allocated(), 16);
        assert!(stack.high_water() >= 88);
    }

    #[test]
    fn test_temp_stack_reuses_rewound_memory() {
        let mut stack = TempStackAllocator::new(128, "test");
        let mut snapshot = ScopeSnapshot::default();

        stack.begin_scope(&mut snapshot);
        let first = stack.allocate(32, 8);
        stack.free(first);
        stack.end_scope(&snapshot);

        stack.begin_scope(&mut snapshot);
        let second = stack.allocate(32, 8);
        stack.free(second);
        stack.end_scope(&snapshot);

        assert_eq!(first, second);
    }
}
