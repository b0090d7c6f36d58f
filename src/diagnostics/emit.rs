//! Log record emission.
//!
//! Records above the settings threshold are formatted once and routed to
//! the installed sink, or stderr when none is installed. The optional `log`
//! feature additionally forwards records to the `log` crate facade.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::settings::settings;
use crate::diagnostics::assert::Site;
use crate::diagnostics::level::LogLevel;

/// Suppresses all output (for tests that exercise warning paths).
static OUTPUT_SUPPRESSED: AtomicBool = AtomicBool::new(false);

static SINK: Mutex<Option<Arc<dyn LogSink>>> = Mutex::new(None);

// Logging must survive a panic elsewhere; a poisoned sink slot is still a
// perfectly good sink slot.
fn sink_slot() -> MutexGuard<'static, Option<Arc<dyn LogSink>>> {
    SINK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Destination for formatted log records.
pub trait LogSink: Send + Sync {
    fn write(&self, level: LogLevel, message: &str);
}

/// Install a sink, replacing any previous one. Passing `None` restores the
/// stderr default. Returns the previously installed sink.
pub fn install_sink(sink: Option<Arc<dyn LogSink>>) -> Option<Arc<dyn LogSink>> {
    let mut slot = sink_slot();
    std::mem::replace(&mut *slot, sink)
}

/// Suppress or restore all diagnostic output.
pub fn suppress_output(suppress: bool) {
    OUTPUT_SUPPRESSED.store(suppress, Ordering::Relaxed);
}

/// Route one record. Callers should prefer the `kl_*` macros.
pub fn dispatch(level: LogLevel, site: Site, args: std::fmt::Arguments<'_>) {
    if level < settings().log_level() {
        return;
    }
    if OUTPUT_SUPPRESSED.load(Ordering::Relaxed) {
        return;
    }

    // Console records are user-facing output and are written bare. The
    // other levels carry a prefix and the originating site.
    let message = if level == LogLevel::Console {
        format!("{args}")
    } else {
        format!("[keel][{}] {}: {}", level.prefix(), site, args)
    };

    #[cfg(feature = "log")]
    forward_to_log(level, &message);

    let sink = sink_slot().clone();
    match sink {
        Some(sink) => sink.write(level, &message),
        None => {
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{message}");
        }
    }
}

#[cfg(feature = "log")]
fn forward_to_log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Trace => log::trace!("{message}"),
        LogLevel::Console => log::info!("{message}"),
        LogLevel::Warning => log::warn!("{message}"),
        LogLevel::Fatal => log::error!("{message}"),
    }
}

/// Terminal path for `kl_fatal!` and `kl_verify!`. Logs then terminates:
/// panic in debug builds so tests can observe the failure, process exit
/// with a failure status in release (the `EXIT_FAILURE` contract).
pub fn fatal(site: Site, args: std::fmt::Arguments<'_>) -> ! {
    let message = format!("[keel][fatal] {site}: {args}");

    #[cfg(feature = "log")]
    log::error!("{message}");

    if !OUTPUT_SUPPRESSED.load(Ordering::Relaxed) {
        let sink = sink_slot().clone();
        match sink {
            Some(sink) => sink.write(LogLevel::Fatal, &message),
            None => {
                let _ = writeln!(std::io::stderr(), "{message}");
            }
        }
    }

    if cfg!(debug_assertions) {
        panic!("{message}");
    }
    std::process::exit(1);
}

/// A sink that collects records for inspection. Intended for tests.
#[derive(Default)]
pub struct CollectingSink {
    records: std::sync::Mutex<Vec<(LogLevel, String)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records captured so far.
    pub fn records(&self) -> Vec<(LogLevel, String)> {
        self.records.lock().unwrap().clone()
    }

    /// Drop captured records.
    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    /// True when any record at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.records
            .lock()
            .unwrap()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }
}

impl LogSink for CollectingSink {
    fn write(&self, level: LogLevel, message: &str) {
        self.records.lock().unwrap().push((level, message.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source_site;

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        sink.write(LogLevel::Warning, "watch out");

        assert_eq!(sink.records().len(), 1);
        assert!(sink.contains(LogLevel::Warning, "watch"));

        sink.clear();
        assert!(sink.records().is_empty());
    }

    #[test]
    fn test_dispatch_reaches_installed_sink() {
        let _serial = crate::test_support::serial();
        let sink = Arc::new(CollectingSink::new());
        let previous = install_sink(Some(sink.clone()));

        dispatch(LogLevel::Warning, source_site!(), format_args!("hello {}", 7));
        assert!(sink.contains(LogLevel::Warning, "hello 7"));

        install_sink(previous);
    }
}
