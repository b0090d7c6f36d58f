//! Debug-build memory poisoning.

pub mod poison;
