//! Minimal suite/case registry and runner.
//!
//! For embedded targets: no allocation on the failure path beyond the
//! bounded log lines, no process exit, just a failure count the host can
//! turn into an exit code.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use linkme::distributed_slice;

/// Per-run cap on logged assertion failures; later failures are counted
/// but silent.
pub const MAX_FAILURE_LOGS: usize = 8;

/// One registered case.
pub struct TestCase {
    pub suite: &'static str,
    pub name: &'static str,
    pub run: fn(),
}

/// Every statically registered case.
#[distributed_slice]
pub static TEST_CASES: [TestCase] = [..];

static FAILURES: AtomicUsize = AtomicUsize::new(0);

/// Record an assertion outcome. Failures past [`MAX_FAILURE_LOGS`] in one
/// run are counted without output.
pub fn expect(condition: bool, expression: &str, file: &str, line: u32) {
    if condition {
        return;
    }
    let ordinal = FAILURES.fetch_add(1, Ordering::Relaxed);
    if ordinal < MAX_FAILURE_LOGS {
        crate::kl_console!("FAILED {expression} at {file}({line})");
    }
}

/// Register a function as a test case.
///
/// ```ignore
/// fn checks_math() { expect_true!(2 + 2 == 4); }
/// test_case!(math, checks_math);
/// ```
#[macro_export]
macro_rules! test_case {
    ($suite:ident, $name:ident) => {
        const _: () = {
            #[$crate::linkme::distributed_slice($crate::testing::TEST_CASES)]
            static CASE: $crate::testing::TestCase = $crate::testing::TestCase {
                suite: stringify!($suite),
                name: stringify!($name),
                run: $name,
            };
        };
    };
}

/// Non-fatal assertion for harness cases.
#[macro_export]
macro_rules! expect_true {
    ($cond:expr) => {
        $crate::testing::expect($cond, stringify!($cond), file!(), line!())
    };
}

/// Non-fatal equality assertion for harness cases.
#[macro_export]
macro_rules! expect_eq {
    ($a:expr, $b:expr) => {
        $crate::testing::expect(
            $a == $b,
            concat!(stringify!($a), " == ", stringify!($b)),
            file!(),
            line!(),
        )
    };
}

/// Non-fatal ULP-bounded float equality assertion for harness cases.
#[macro_export]
macro_rules! expect_near {
    ($a:expr, $b:expr, $ulps:expr) => {
        $crate::testing::expect(
            $crate::testing::ulp_eq_f64($a as f64, $b as f64, $ulps),
            concat!(stringify!($a), " ~= ", stringify!($b)),
            file!(),
            line!(),
        )
    };
}

/// Run every registered case whose suite matches `filter` (all of them
/// for `None`). Returns the number of failing cases; a panic inside a
/// case counts as a failure.
pub fn run_all(filter: Option<&str>) -> usize {
    let mut failed_cases = 0;
    let mut total = 0;
    for case in TEST_CASES.static_slice() {
        if let Some(filter) = filter {
            if case.suite != filter {
                continue;
            }
        }
        total += 1;
        crate::kl_console!("RUN {}.{}", case.suite, case.name);

        let before = FAILURES.load(Ordering::Relaxed);
        let panicked = catch_unwind(AssertUnwindSafe(case.run)).is_err();
        let failed = panicked || FAILURES.load(Ordering::Relaxed) != before;

        if failed {
            failed_cases += 1;
            crate::kl_console!("FAILED {}.{}", case.suite, case.name);
        } else {
            crate::kl_console!("OK {}.{}", case.suite, case.name);
        }
    }
    crate::kl_console!("{} of {total} cases passed", total - failed_cases);
    FAILURES.store(0, Ordering::Relaxed);
    failed_cases
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passes() {
        crate::expect_true!(1 < 2);
        crate::expect_eq!(6 * 7, 42);
        crate::expect_near!(0.1 + 0.2, 0.3, 2);
    }
    crate::test_case!(harness_selftest, passes);

    fn fails() {
        crate::expect_true!(false);
    }
    crate::test_case!(harness_selftest_failing, fails);

    #[test]
    fn test_passing_suite() {
        let _serial = crate::test_support::serial();
        crate::diagnostics::suppress_output(true);
        assert_eq!(run_all(Some("harness_selftest")), 0);
        crate::diagnostics::suppress_output(false);
    }

    #[test]
    fn test_failing_case_is_counted() {
        let _serial = crate::test_support::serial();
        crate::diagnostics::suppress_output(true);
        assert_eq!(run_all(Some("harness_selftest_failing")), 1);
        crate::diagnostics::suppress_output(false);
    }

    #[test]
    fn test_filter_excludes_other_suites() {
        crate::diagnostics::suppress_output(true);
        assert_eq!(run_all(Some("no_such_suite")), 0);
        crate::diagnostics::suppress_output(false);
    }
}
