//! Embedded test tooling.
//!
//! Hosts with a real test harness should use it; this module serves
//! targets where libtest is unavailable. Cases register through a
//! distributed slice, the runner catches failures and panics, and
//! assertion output is bounded so a broken loop cannot flood a serial
//! console. Also home to the ULP-based float comparison the assertions
//! use.

pub mod harness;
pub mod ulp;

pub use harness::{expect, run_all, TestCase, MAX_FAILURE_LOGS, TEST_CASES};
pub use ulp::{ulp_eq_f32, ulp_eq_f64};
