//! Memory poisoning patterns.
//!
//! Freshly allocated, reclaimed and freed memory is filled with distinct
//! recognizable bytes so that stale reads show up immediately in a
//! debugger. Active in debug builds and under the `debug` feature.

/// Fresh allocations before first write.
pub const UNINIT_PATTERN: u8 = 0xab;

/// Temporary-stack bytes reclaimed by a closing scope.
pub const STACK_RESET_PATTERN: u8 = 0xcd;

/// Scratchpad sections on construction and close.
pub const SCRATCH_PATTERN: u8 = 0xdd;

/// Heap payloads at free.
pub const FREED_PATTERN: u8 = 0xde;

/// True when poisoning is compiled in.
#[inline]
pub const fn poison_enabled() -> bool {
    cfg!(any(debug_assertions, feature = "debug"))
}

/// Fill `[ptr, ptr + size)` with `pattern` when poisoning is compiled in.
///
/// # Safety
///
/// The region must be valid for writes.
#[inline]
pub unsafe fn poison(ptr: *mut u8, pattern: u8, size: usize) {
    if poison_enabled() {
        // SAFETY: caller guarantees the region is writable.
        unsafe { std::ptr::write_bytes(ptr, pattern, size) };
    }
}

/// True when the first `size` bytes at `ptr` all match `pattern`.
/// Diagnostic helper for use-after-reset detection in tests.
///
/// # Safety
///
/// The region must be valid for reads.
pub unsafe fn is_poisoned(ptr: *const u8, pattern: u8, size: usize) -> bool {
    for i in 0..size {
        // SAFETY: caller guarantees the region is readable.
        if unsafe { *ptr.add(i) } != pattern {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poison_round_trip() {
        let mut buf = [0u8; 32];
        unsafe {
            poison(buf.as_mut_ptr(), FREED_PATTERN, buf.len());
            if poison_enabled() {
                assert!(is_poisoned(buf.as_ptr(), FREED_PATTERN, buf.len()));
            }
        }
    }
}
