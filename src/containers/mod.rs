//! Non-reallocating containers backed by the memory manager.
//!
//! Storage is selected at compile time: inline (capacity is a const
//! generic) or dynamic (one contiguous allocation from the current
//! allocator, frozen after the first `reserve`). Nothing here ever
//! reallocates; running out of room is a contract violation, not a resize.

pub mod array;
pub mod hash_table;
pub mod nodes;
pub mod storage;

pub use array::{Array, DynArray, InlineArray};
pub use hash_table::{
    Buckets, Deleter, DoNotDelete, DynamicBuckets, FnDeleter, HashTable, InlineBuckets, Node,
    OwnedDelete, TableKey,
};
pub use nodes::{MapNode, SetNode};
pub use storage::{DynamicStorage, InlineStorage, Storage};
