//! The memory manager.
//!
//! Owns one instance of each allocator variant and dispatches
//! [`allocate`]/[`free`] and the scope transitions. All state sits behind
//! one mutex; the current-allocator id is thread-local. The manager is
//! constructed lazily on first use, or explicitly via [`init`] to override
//! the region budgets.

use std::ptr::NonNull;
use std::sync::OnceLock;

use crate::allocators::{
    AllocatorId, OsHeapAllocator, ScopeSnapshot, ScratchpadAllocator, TempStackAllocator,
};
use crate::allocators::stack::BumpAllocator;
use crate::core::scope::AllocatorScope;
use crate::core::settings::settings;
use crate::core::tls;
use crate::debug::poison::{self, UNINIT_PATTERN};
use crate::util::layout::{is_pow2, DEFAULT_ALIGNMENT};
use crate::util::size::{kb, mb};

/// Region budgets for the bump and scratchpad allocators.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Permanent region size in bytes.
    pub permanent_bytes: usize,
    /// Temporary stack size in bytes.
    pub temporary_bytes: usize,
    /// Size of each of the three scratch pages in bytes.
    pub scratch_page_bytes: usize,
    /// Size of the scratch working-buffer section in bytes.
    pub scratch_temp_bytes: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            permanent_bytes: kb(16),
            temporary_bytes: mb(1),
            scratch_page_bytes: kb(16),
            scratch_temp_bytes: kb(64),
        }
    }
}

impl MemoryConfig {
    /// Builder: permanent region size.
    pub fn with_permanent_bytes(mut self, bytes: usize) -> Self {
        self.permanent_bytes = bytes;
        self
    }

    /// Builder: temporary stack size.
    pub fn with_temporary_bytes(mut self, bytes: usize) -> Self {
        self.temporary_bytes = bytes;
        self
    }

    /// Builder: scratch page size.
    pub fn with_scratch_page_bytes(mut self, bytes: usize) -> Self {
        self.scratch_page_bytes = bytes;
        self
    }

    /// Builder: scratch working-buffer size.
    pub fn with_scratch_temp_bytes(mut self, bytes: usize) -> Self {
        self.scratch_temp_bytes = bytes;
        self
    }
}

/// Counter snapshot for one allocator id.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocationStats {
    /// Live allocations.
    pub allocation_count: usize,
    /// Bytes currently allocated.
    pub bytes_allocated: usize,
    /// Peak bytes allocated over the process lifetime.
    pub high_water: usize,
}

struct ManagerInner {
    heap: OsHeapAllocator,
    permanent: BumpAllocator,
    temporary: TempStackAllocator,
    scratch: ScratchpadAllocator,
    /// Latched from the settings at construction. When set, every id
    /// resolves to the OS heap and scopes carry no bookkeeping.
    disabled: bool,
}

impl ManagerInner {
    fn new(config: &MemoryConfig) -> Self {
        Self {
            heap: OsHeapAllocator::new(),
            permanent: BumpAllocator::new(config.permanent_bytes, "perm"),
            temporary: TempStackAllocator::new(config.temporary_bytes, "temp"),
            scratch: ScratchpadAllocator::new(
                config.scratch_page_bytes,
                config.scratch_temp_bytes,
                "scratchpad",
            ),
            disabled: settings().memory_manager_disabled(),
        }
    }

    fn allocate(&mut self, size: usize, id: AllocatorId, alignment: usize) -> *mut u8 {
        if self.disabled {
            return self.heap.allocate(size, alignment);
        }

        let ptr = match id {
            AllocatorId::Heap => self.heap.allocate(size, alignment),
            AllocatorId::Permanent => self.permanent.allocate(size, alignment),
            AllocatorId::TemporaryStack => self.temporary.allocate(size, alignment),
            AllocatorId::Current => unreachable!("resolved by the caller"),
            _ => self.scratch.allocate(size, alignment),
        };
        if !ptr.is_null() {
            return ptr;
        }

        crate::kl_warning!("overflowing to heap from {} size {}", id.label(), size);
        self.heap.allocate(size, alignment)
    }

    fn free(&mut self, ptr: *mut u8) {
        if self.disabled {
            // SAFETY: with the manager disabled every allocation came from
            // the wrapped heap.
            unsafe { self.heap.free(ptr) };
            return;
        }

        if self.temporary.contains(ptr) {
            self.temporary.free(ptr);
            return;
        }
        if self.scratch.contains(ptr) {
            self.scratch.free(ptr);
            return;
        }
        if self.permanent.contains(ptr) {
            if !settings().deallocate_permanent() {
                crate::kl_warning!("free from permanent region");
            }
            self.permanent.free(ptr);
            return;
        }
        // SAFETY: not in any region, so it came from the wrapped heap.
        unsafe { self.heap.free(ptr) };
    }

    fn stats(&mut self, id: AllocatorId) -> AllocationStats {
        match id {
            AllocatorId::Heap => AllocationStats {
                allocation_count: self.heap.allocation_count(),
                bytes_allocated: self.heap.bytes_allocated(),
                high_water: self.heap.high_water(),
            },
            AllocatorId::Permanent => AllocationStats {
                allocation_count: self.permanent.allocation_count(),
                bytes_allocated: self.permanent.bytes_allocated(),
                high_water: self.permanent.bytes_allocated(),
            },
            AllocatorId::TemporaryStack => AllocationStats {
                allocation_count: self.temporary.allocation_count(),
                bytes_allocated: self.temporary.bytes_allocated(),
                high_water: self.temporary.high_water(),
            },
            AllocatorId::Current => unreachable!("resolved by the caller"),
            scratch => AllocationStats {
                allocation_count: self.scratch.allocation_count(scratch),
                bytes_allocated: self.scratch.bytes_allocated(scratch),
                high_water: self.scratch.high_water(scratch),
            },
        }
    }
}

/// The one mutex serializing every allocate/free/scope transition. This is
/// the crate's hottest lock, so `parking_lot` can be swapped in by feature
/// for its faster uncontended path. A poisoned lock means a panic fired
/// while the counters were mid-update; the leak audit cannot be trusted
/// after that, so recovery is not offered.
struct ManagerLock(MutexImpl);

#[cfg(feature = "parking_lot")]
type MutexImpl = parking_lot::Mutex<ManagerInner>;
#[cfg(feature = "parking_lot")]
type ManagerGuard = parking_lot::MutexGuard<'static, ManagerInner>;

#[cfg(not(feature = "parking_lot"))]
type MutexImpl = std::sync::Mutex<ManagerInner>;
#[cfg(not(feature = "parking_lot"))]
type ManagerGuard = std::sync::MutexGuard<'static, ManagerInner>;

impl ManagerLock {
    fn new(inner: ManagerInner) -> Self {
        Self(MutexImpl::new(inner))
    }

    #[cfg(feature = "parking_lot")]
    fn lock(&'static self) -> ManagerGuard {
        self.0.lock()
    }

    #[cfg(not(feature = "parking_lot"))]
    fn lock(&'static self) -> ManagerGuard {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => crate::kl_fatal!("memory manager lock poisoned"),
        }
    }
}

static MANAGER: OnceLock<ManagerLock> = OnceLock::new();

fn manager() -> ManagerGuard {
    MANAGER
        .get_or_init(|| ManagerLock::new(ManagerInner::new(&MemoryConfig::default())))
        .lock()
}

/// Construct the manager with explicit budgets. Must run before the first
/// allocation; afterwards it logs a warning and changes nothing. Returns
/// whether the config was applied.
pub fn init(config: MemoryConfig) -> bool {
    let mut applied = false;
    MANAGER.get_or_init(|| {
        applied = true;
        ManagerLock::new(ManagerInner::new(&config))
    });
    if !applied {
        crate::kl_warning!("memory manager already initialized, config ignored");
    }
    applied
}

fn resolve(id: AllocatorId) -> AllocatorId {
    if id == AllocatorId::Current {
        tls::current_allocator()
    } else {
        id
    }
}

/// Allocate `size` bytes from the allocator named by `id`
/// (`AllocatorId::Current` resolves through the thread-local scope stack).
///
/// Zero-size requests are promoted to one byte so every returned pointer is
/// unique. A non-power-of-two alignment is fatal. If the selected region
/// overflows, the request falls back to the OS heap with a warning;
/// exhaustion of the OS heap itself is fatal, so the returned pointer is
/// always valid.
pub fn allocate(size: usize, id: AllocatorId, alignment: usize) -> NonNull<u8> {
    let id = resolve(id);
    let size = size.max(1);
    let alignment = alignment.max(1);
    crate::kl_verify!(is_pow2(alignment), "alignment not a power of two: {alignment}");

    let ptr = manager().allocate(size, id, alignment);
    crate::kl_check!(
        ptr as usize % alignment == 0,
        "misaligned result {:?} from {}",
        ptr,
        id.label()
    );
    // SAFETY: allocation failure is fatal above, and the pointer is not
    // handed out to anyone else until we return it.
    unsafe {
        poison::poison(ptr, UNINIT_PATTERN, size);
        NonNull::new_unchecked(ptr)
    }
}

/// Allocate with the default alignment from the current allocator.
pub fn allocate_current(size: usize) -> NonNull<u8> {
    allocate(size, AllocatorId::Current, DEFAULT_ALIGNMENT)
}

/// Return a pointer to whichever allocator owns it, determined by address
/// range. Null is a no-op. For the bump and scratch regions this is
/// bookkeeping only; the bytes are recovered by scope close (or never, for
/// the permanent region).
///
/// # Safety
///
/// `ptr` must be null or a pointer returned by [`allocate`] that has not
/// already been freed, with no outstanding references into it.
pub unsafe fn free(ptr: *mut u8) {
    if ptr.is_null() {
        return;
    }
    manager().free(ptr);
}

/// Counter snapshot for one allocator.
pub fn stats(id: AllocatorId) -> AllocationStats {
    manager().stats(resolve(id))
}

/// Live allocations for one allocator.
pub fn allocation_count(id: AllocatorId) -> usize {
    stats(id).allocation_count
}

/// Bytes currently allocated for one allocator.
pub fn bytes_allocated(id: AllocatorId) -> usize {
    stats(id).bytes_allocated
}

/// Peak bytes allocated for one allocator.
pub fn high_water(id: AllocatorId) -> usize {
    stats(id).high_water
}

/// Sum of live allocations across every allocator, logging one warning per
/// allocator still holding memory. Non-zero at shutdown means a leak.
pub fn leak_count() -> usize {
    let mut inner = manager();
    let mut total = 0;
    for id in AllocatorId::ALL {
        let stats = inner.stats(id);
        if stats.allocation_count > 0 {
            crate::kl_warning!(
                "memory leak {} count {} size {} high_water {}",
                id.label(),
                stats.allocation_count,
                stats.bytes_allocated,
                stats.high_water
            );
        }
        total += stats.allocation_count;
    }
    total
}

/// Shutdown audit: a non-zero [`leak_count`] is fatal.
pub fn shut_down_check() {
    let leaks = leak_count();
    crate::kl_verify!(leaks == 0, "memory leaks at shutdown: {leaks}");
}

pub(crate) fn begin_scope(scope: &mut AllocatorScope) {
    let id = scope.allocator_id();
    crate::kl_verify!(id != AllocatorId::Current, "scope needs a real allocator id");

    scope.previous_id = tls::current_allocator();
    tls::set_current_allocator(id);

    let mut inner = manager();
    if inner.disabled {
        return;
    }
    let mut snapshot = ScopeSnapshot::default();
    match id {
        AllocatorId::Heap => {
            snapshot.allocation_count = inner.heap.allocation_count();
            snapshot.bytes_allocated = inner.heap.bytes_allocated();
        }
        AllocatorId::Permanent => inner.permanent.begin_scope(&mut snapshot),
        AllocatorId::TemporaryStack => inner.temporary.begin_scope(&mut snapshot),
        AllocatorId::Current => unreachable!(),
        scratch => inner.scratch.begin_scope(&mut snapshot, scratch),
    }
    scope.snapshot = snapshot;
}

pub(crate) fn end_scope(scope: &AllocatorScope) {
    {
        let mut inner = manager();
        if !inner.disabled {
            match scope.allocator_id() {
                AllocatorId::TemporaryStack => inner.temporary.end_scope(&scope.snapshot),
                id if id.is_scratch() => {
                    inner.scratch.end_scope(&scope.snapshot, scope.previous_id())
                }
                _ => {}
            }
        }
    }
    tls::set_current_allocator(scope.previous_id());
}
