//! Process-wide tunables.
//!
//! One statically-initialized singleton of atomics. Reads happen on hot
//! paths from any thread; writes are config-time and rare. The tunables
//! are also reachable from the console (`log_level`, `asserts_to_skip`,
//! `deallocate_permanent`).

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::diagnostics::LogLevel;

/// Process-wide settings singleton. See [`settings`].
pub struct Settings {
    log_level: AtomicI32,
    asserts_to_skip: AtomicI32,
    deallocate_permanent: AtomicBool,
    memory_manager_disabled: AtomicBool,
}

const DEFAULT_LOG_LEVEL: i32 = if cfg!(debug_assertions) {
    LogLevel::Trace as i32
} else {
    LogLevel::Console as i32
};

static SETTINGS: Settings = Settings {
    log_level: AtomicI32::new(DEFAULT_LOG_LEVEL),
    asserts_to_skip: AtomicI32::new(0),
    deallocate_permanent: AtomicBool::new(false),
    memory_manager_disabled: AtomicBool::new(false),
};

/// The settings singleton.
pub fn settings() -> &'static Settings {
    &SETTINGS
}

impl Settings {
    /// Threshold below which log records are discarded.
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_i32(self.log_level.load(Ordering::Relaxed))
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.log_level.store(level as i32, Ordering::Relaxed);
    }

    pub(crate) fn set_log_level_raw(&self, level: i32) {
        self.log_level.store(level, Ordering::Relaxed);
    }

    pub(crate) fn log_level_raw(&self) -> i32 {
        self.log_level.load(Ordering::Relaxed)
    }

    /// Remaining number of skippable assertion failures that will be
    /// tolerated. Used by tests that deliberately trip assertions.
    pub fn asserts_to_skip(&self) -> i32 {
        self.asserts_to_skip.load(Ordering::Relaxed)
    }

    pub fn set_asserts_to_skip(&self, count: i32) {
        self.asserts_to_skip.store(count, Ordering::Relaxed);
    }

    /// Consume one unit of the skip counter. Returns true when the failing
    /// assertion should be ignored.
    pub fn take_skipped_assert(&self) -> bool {
        self.asserts_to_skip
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                if n > 0 {
                    Some(n - 1)
                } else {
                    None
                }
            })
            .is_ok()
    }

    /// Whether freeing a pointer from the permanent region is legal.
    pub fn deallocate_permanent(&self) -> bool {
        self.deallocate_permanent.load(Ordering::Relaxed)
    }

    pub fn set_deallocate_permanent(&self, allow: bool) {
        self.deallocate_permanent.store(allow, Ordering::Relaxed);
    }

    /// Whether the scoped allocators are bypassed entirely. Must be set
    /// before the first allocation; the manager latches it at construction.
    pub fn memory_manager_disabled(&self) -> bool {
        self.memory_manager_disabled.load(Ordering::Relaxed)
    }

    pub fn set_memory_manager_disabled(&self, disabled: bool) {
        self.memory_manager_disabled.store(disabled, Ordering::Relaxed);
    }
}
