//! RAII allocator scopes.

use std::marker::PhantomData;

use crate::allocators::{AllocatorId, ScopeSnapshot};
use crate::core::manager;

/// Makes the named allocator current for the calling thread until dropped.
///
/// Scopes nest and are strictly LIFO per thread. Construction snapshots
/// the allocator's counters; for the temporary stack, drop asserts the
/// scope leaked nothing and rewinds the cursor, and for the scratchpad it
/// closes the section. The guard is `!Send`; a scope must be destroyed on
/// the thread that created it.
///
/// ```no_run
/// use keel::{AllocatorId, AllocatorScope};
///
/// let scope = AllocatorScope::new(AllocatorId::TemporaryStack);
/// let p = keel::memory::allocate_current(256);
/// // ... use p ...
/// unsafe { keel::memory::free(p.as_ptr()) };
/// drop(scope); // cursor rewinds here
/// ```
pub struct AllocatorScope {
    this_id: AllocatorId,
    pub(crate) previous_id: AllocatorId,
    pub(crate) snapshot: ScopeSnapshot,
    _not_send: PhantomData<*const ()>,
}

impl AllocatorScope {
    /// Open a scope on the allocator named by `id`. `AllocatorId::Current`
    /// is not a real allocator and is rejected.
    pub fn new(id: AllocatorId) -> Self {
        let mut scope = Self {
            this_id: id,
            previous_id: id,
            snapshot: ScopeSnapshot::default(),
            _not_send: PhantomData,
        };
        manager::begin_scope(&mut scope);
        scope
    }

    /// The allocator this scope made current.
    pub fn allocator_id(&self) -> AllocatorId {
        self.this_id
    }

    /// The allocator that becomes current again when this scope closes.
    pub fn previous_id(&self) -> AllocatorId {
        self.previous_id
    }

    /// Live allocations on this scope's allocator at open.
    pub fn initial_allocation_count(&self) -> usize {
        self.snapshot.allocation_count
    }

    /// Bytes allocated on this scope's allocator at open.
    pub fn initial_bytes_allocated(&self) -> usize {
        self.snapshot.bytes_allocated
    }

    /// Live allocations on this scope's allocator right now.
    pub fn current_allocation_count(&self) -> usize {
        manager::allocation_count(self.this_id)
    }

    /// Bytes allocated on this scope's allocator right now.
    pub fn current_bytes_allocated(&self) -> usize {
        manager::bytes_allocated(self.this_id)
    }
}

impl Drop for AllocatorScope {
    fn drop(&mut self) {
        manager::end_scope(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tls;
    use crate::core::manager::{allocate_current, bytes_allocated, free};

    #[test]
    fn test_scope_switches_current_id() {
        let _serial = crate::test_support::serial();
        assert_eq!(tls::current_allocator(), AllocatorId::Heap);
        {
            let scope = AllocatorScope::new(AllocatorId::TemporaryStack);
            assert_eq!(tls::current_allocator(), AllocatorId::TemporaryStack);
            assert_eq!(scope.previous_id(), AllocatorId::Heap);
        }
        assert_eq!(tls::current_allocator(), AllocatorId::Heap);
    }

    #[test]
    fn test_nested_scopes_restore_in_order() {
        let _serial = crate::test_support::serial();
        let outer = AllocatorScope::new(AllocatorId::TemporaryStack);
        {
            let inner = AllocatorScope::new(AllocatorId::ScratchPage0);
            assert_eq!(tls::current_allocator(), AllocatorId::ScratchPage0);
            assert_eq!(inner.previous_id(), AllocatorId::TemporaryStack);
        }
        assert_eq!(tls::current_allocator(), AllocatorId::TemporaryStack);
        drop(outer);
        assert_eq!(tls::current_allocator(), AllocatorId::Heap);
    }

    #[test]
    fn test_temporary_scope_rewinds_bytes() {
        let _serial = crate::test_support::serial();
        let before = bytes_allocated(AllocatorId::TemporaryStack);
        {
            let _scope = AllocatorScope::new(AllocatorId::TemporaryStack);
            for _ in 0..3 {
                let p = allocate_current(48);
                unsafe { free(p.as_ptr()) };
            }
            assert!(bytes_allocated(AllocatorId::TemporaryStack) >= before + 144);
        }
        assert_eq!(bytes_allocated(AllocatorId::TemporaryStack), before);
    }

    #[test]
    fn test_scope_counters_visible_while_open() {
        let _serial = crate::test_support::serial();
        let scope = AllocatorScope::new(AllocatorId::TemporaryStack);
        let count0 = scope.current_allocation_count();
        let p = allocate_current(32);
        assert_eq!(scope.current_allocation_count(), count0 + 1);
        assert!(scope.current_bytes_allocated() >= scope.initial_bytes_allocated() + 32);
        unsafe { free(p.as_ptr()) };
    }
}
