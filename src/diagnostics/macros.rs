//! Logging and assertion macros.
//!
//! `kl_trace!`/`kl_console!`/`kl_warning!` are filtered by the settings
//! threshold. `kl_fatal!` never returns. `kl_check!` is the skippable
//! debug assertion; `kl_verify!` aborts in every build.

/// Compile-time 32-bit hash of the current file path.
#[macro_export]
macro_rules! source_id {
    () => {{
        const HASH: u32 = $crate::diagnostics::fnv1a_32(file!());
        HASH
    }};
}

/// The current source location as a [`crate::diagnostics::Site`].
#[macro_export]
macro_rules! source_site {
    () => {
        $crate::diagnostics::Site {
            file: file!(),
            file_hash: $crate::source_id!(),
            line: line!(),
        }
    };
}

/// Log at `Trace` level.
#[macro_export]
macro_rules! kl_trace {
    ($($arg:tt)*) => {
        $crate::diagnostics::emit::dispatch(
            $crate::diagnostics::LogLevel::Trace,
            $crate::source_site!(),
            format_args!($($arg)*),
        )
    };
}

/// Log at `Console` level. This is console command output; records are
/// written bare, without a site prefix.
#[macro_export]
macro_rules! kl_console {
    ($($arg:tt)*) => {
        $crate::diagnostics::emit::dispatch(
            $crate::diagnostics::LogLevel::Console,
            $crate::source_site!(),
            format_args!($($arg)*),
        )
    };
}

/// Log at `Warning` level.
#[macro_export]
macro_rules! kl_warning {
    ($($arg:tt)*) => {
        $crate::diagnostics::emit::dispatch(
            $crate::diagnostics::LogLevel::Warning,
            $crate::source_site!(),
            format_args!($($arg)*),
        )
    };
}

/// Log at `Fatal` level and terminate the process. Panics in debug builds
/// so tests can observe the failure.
#[macro_export]
macro_rules! kl_fatal {
    ($($arg:tt)*) => {
        $crate::diagnostics::emit::fatal($crate::source_site!(), format_args!($($arg)*))
    };
}

/// Skippable assertion. Active in debug builds and under the `diagnostics`
/// feature; compiled out otherwise. A failure aborts unless the settings
/// `asserts_to_skip` counter is positive, in which case the counter is
/// decremented and a warning is logged instead.
#[macro_export]
macro_rules! kl_check {
    ($cond:expr, $($arg:tt)*) => {{
        #[cfg(any(debug_assertions, feature = "diagnostics"))]
        {
            if !$cond {
                if $crate::diagnostics::assert::check_should_abort($crate::source_site!()) {
                    $crate::kl_fatal!($($arg)*);
                }
            }
        }
        #[cfg(not(any(debug_assertions, feature = "diagnostics")))]
        {
            let _ = || { let _ = &$cond; };
        }
    }};
}

/// Fatal assertion, active in every build.
#[macro_export]
macro_rules! kl_verify {
    ($cond:expr, $($arg:tt)*) => {{
        if !$cond {
            $crate::kl_fatal!($($arg)*);
        }
    }};
}

#[cfg(test)]
mod tests {
    use crate::core::settings::settings;

    #[test]
    fn test_source_id_stable() {
        let a = crate::source_id!();
        let b = crate::source_id!();
        assert_eq!(a, b);
        assert_ne!(a, 0);
    }

    #[test]
    fn test_check_passes_quietly() {
        crate::kl_check!(1 + 1 == 2, "arithmetic broke");
    }

    #[test]
    fn test_check_skip_counter() {
        let _serial = crate::test_support::serial();
        settings().set_asserts_to_skip(1);
        crate::kl_check!(false, "deliberate failure");
        assert_eq!(settings().asserts_to_skip(), 0);
    }

    #[test]
    #[cfg_attr(not(debug_assertions), ignore = "fatal exits outside debug")]
    #[should_panic(expected = "deliberate verify")]
    fn test_verify_aborts() {
        crate::kl_verify!(false, "deliberate verify");
    }
}
