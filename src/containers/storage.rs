//! Element storage policies for [`crate::containers::Array`].

use std::mem::MaybeUninit;

use crate::allocators::AllocatorId;
use crate::core::manager;

/// Contiguous element storage. Implementations never move elements once
/// placed; `reserve` beyond the frozen capacity is fatal.
pub trait Storage<T> {
    fn data(&self) -> *const T;
    fn data_mut(&mut self) -> *mut T;
    fn capacity(&self) -> usize;

    /// Make room for at least `capacity` elements. For dynamic storage the
    /// first call performs the one and only allocation; asking for more
    /// afterwards is fatal. For inline storage any request over the
    /// compile-time capacity is fatal.
    fn reserve(&mut self, capacity: usize);
}

/// Inline storage: a `CAPACITY`-element buffer embedded in the container,
/// aligned for `T`.
pub struct InlineStorage<T, const CAPACITY: usize> {
    buffer: [MaybeUninit<T>; CAPACITY],
}

impl<T, const CAPACITY: usize> InlineStorage<T, CAPACITY> {
    pub fn new() -> Self {
        Self {
            // SAFETY: an array of MaybeUninit needs no initialization.
            buffer: unsafe { MaybeUninit::uninit().assume_init() },
        }
    }
}

impl<T, const CAPACITY: usize> Default for InlineStorage<T, CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const CAPACITY: usize> Storage<T> for InlineStorage<T, CAPACITY> {
    fn data(&self) -> *const T {
        self.buffer.as_ptr().cast()
    }

    fn data_mut(&mut self) -> *mut T {
        self.buffer.as_mut_ptr().cast()
    }

    fn capacity(&self) -> usize {
        CAPACITY
    }

    fn reserve(&mut self, capacity: usize) {
        crate::kl_verify!(
            capacity <= CAPACITY,
            "inline capacity exceeded: {capacity} > {CAPACITY}"
        );
    }
}

/// Dynamic storage: one allocation from the current allocator, made by the
/// first non-trivial `reserve` and frozen thereafter.
pub struct DynamicStorage<T> {
    ptr: *mut T,
    capacity: usize,
}

// Same bounds a Vec would have; the raw pointer is an owning handle.
unsafe impl<T: Send> Send for DynamicStorage<T> {}
unsafe impl<T: Sync> Sync for DynamicStorage<T> {}

impl<T> DynamicStorage<T> {
    pub const fn new() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            capacity: 0,
        }
    }
}

impl<T> Default for DynamicStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Storage<T> for DynamicStorage<T> {
    fn data(&self) -> *const T {
        self.ptr
    }

    fn data_mut(&mut self) -> *mut T {
        self.ptr
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn reserve(&mut self, capacity: usize) {
        if capacity <= self.capacity {
            return;
        }
        crate::kl_verify!(
            self.capacity == 0,
            "reallocation disallowed: {capacity} > {}",
            self.capacity
        );

        let bytes = std::mem::size_of::<T>().checked_mul(capacity);
        let bytes = match bytes {
            Some(bytes) => bytes,
            None => crate::kl_fatal!("capacity overflow: {capacity}"),
        };
        self.ptr = manager::allocate(bytes, AllocatorId::Current, std::mem::align_of::<T>())
            .cast::<T>()
            .as_ptr();
        self.capacity = capacity;
    }
}

impl<T> Drop for DynamicStorage<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // SAFETY: the pointer came from reserve() and the container
            // has already dropped every element.
            unsafe { manager::free(self.ptr.cast()) };
        }
    }
}
