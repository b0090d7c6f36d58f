//! Logging and assertion plumbing.
//!
//! Four log levels, a threshold in [`crate::core::settings::Settings`], a
//! pluggable sink for tests and host integration, and the two assertion
//! flavors the rest of the crate is written against: skippable debug checks
//! and release-mode fatal checks.

pub mod assert;
pub mod emit;
pub mod level;
#[macro_use]
pub mod macros;

pub use assert::{fnv1a_32, Site};
pub use emit::{install_sink, suppress_output, CollectingSink, LogSink};
pub use level::LogLevel;
