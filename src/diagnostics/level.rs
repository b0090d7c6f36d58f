//! Log severity levels.

/// Severity of a log record. The process-wide threshold lives in
/// [`crate::core::settings::Settings::log_level`]; records below it are
/// discarded before formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum LogLevel {
    /// Debug chatter. Compiled in everywhere, filtered by default in
    /// release builds.
    Trace = 0,
    /// Console command output and responses.
    Console = 1,
    /// Something is probably wrong but the operation completed.
    Warning = 2,
    /// The process is about to terminate.
    Fatal = 3,
}

impl LogLevel {
    /// Display prefix for this level.
    pub fn prefix(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Console => "console",
            LogLevel::Warning => "warning",
            LogLevel::Fatal => "fatal",
        }
    }

    /// Recover a level from its stored integer form, clamping out-of-range
    /// values.
    pub fn from_i32(value: i32) -> Self {
        match value {
            i32::MIN..=0 => LogLevel::Trace,
            1 => LogLevel::Console,
            2 => LogLevel::Warning,
            _ => LogLevel::Fatal,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}
