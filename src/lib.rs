//! # keel
//!
//! Deterministic scoped memory management, intrusive containers and
//! realtime runtime primitives for systems that cannot lean on a host
//! allocator.
//!
//! ## Features
//!
//! - Four cooperating allocators behind one manager: OS-heap wrapper,
//!   permanent bump region, scope-rewound temporary stack, multi-section
//!   scratchpad
//! - Thread-local allocator selection via RAII scopes
//! - Non-reallocating containers: inline/dynamic arrays (with heap ops)
//!   and an intrusive bucketed hash table
//! - Linear-time radix sort with signed/float key re-encoding
//! - A text console binding commands and variables at link time, with
//!   zero heap traffic during registration
//! - Priority task queue with an optional worker pool
//! - Four-level logging, leak auditing, debug memory poisoning
//!
//! ## Quick start
//!
//! ```no_run
//! use keel::{AllocatorId, AllocatorScope};
//!
//! keel::memory::init(keel::memory::MemoryConfig::default());
//!
//! {
//!     let _scope = AllocatorScope::new(AllocatorId::TemporaryStack);
//!     let scratch = keel::memory::allocate_current(4096);
//!     // ... use scratch ...
//!     unsafe { keel::memory::free(scratch.as_ptr()) };
//! } // the temporary stack rewinds here
//!
//! keel::memory::shut_down_check();
//! ```

pub mod allocators;
pub mod console;
pub mod containers;
pub mod core;
pub mod debug;
#[macro_use]
pub mod diagnostics;
pub mod sort;
pub mod tasks;
pub mod testing;
pub mod util;

// Dependents use the registration macros without naming linkme directly.
pub use linkme;

/// The memory manager's public surface.
pub use crate::core::manager as memory;

pub use crate::allocators::AllocatorId;
pub use crate::console::{exec_file, exec_line};
pub use crate::containers::{Array, DynArray, HashTable, InlineArray, MapNode, SetNode};
pub use crate::core::scope::AllocatorScope;
pub use crate::core::settings::{settings, Settings};
pub use crate::diagnostics::LogLevel;
pub use crate::memory::MemoryConfig;
pub use crate::sort::RadixSort;
pub use crate::tasks::{Task, TaskQueue};
