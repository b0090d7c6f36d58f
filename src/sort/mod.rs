//! Sorting: a generic stable insertion sort and the radix-sort buffer.

pub mod insertion;
pub mod radix;

pub use insertion::insertion_sort_by;
pub use radix::{RadixSort, SortKey, RADIX_SORT_MIN_SIZE};
