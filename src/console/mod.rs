//! Text console: typed command and variable bindings over a line protocol.
//!
//! Commands register at link time through a distributed slice, so
//! registration touches no heap and cannot race program start-up. A lazily
//! built symbol table (the crate's own hash table, keyed by
//! whitespace-terminated FNV-1a names) serves lookup, plus dynamic
//! registration and removal.
//!
//! One command per line. Tokens split on bytes `<= 0x20`; bytes `>= 0x80`
//! are name characters, so UTF-8 symbol names work. A `#` after leading
//! whitespace comments out the rest of the line.
//!
//! ```no_run
//! use keel::console::{exec_line, ConsoleVar, Number};
//! use keel::{console_command, console_variable};
//!
//! static GRAVITY: ConsoleVar<f32> = ConsoleVar::new_f32(-9.8);
//! console_variable!(gravity: f32 => GRAVITY);
//!
//! fn respawn(delay: Number) -> bool {
//!     let _seconds: f32 = delay.to();
//!     true
//! }
//! console_command!(respawn(Number));
//!
//! exec_line("gravity -3.7");
//! exec_line("respawn 2.5");
//! ```

pub mod args;
pub mod builtins;
pub mod command;
pub mod registry;

pub use args::{is_delimiter, Hex, Number};
pub use command::{
    Command, Command0, Command1, Command2, Command3, Command4, ConsoleVar, Line, VarBinding,
};
pub use registry::{deregister, register, shut_down, ConsoleEntry, CONSOLE_COMMANDS};

use crate::console::args::{is_end_of_line, skip_whitespace, symbol_len};
use crate::console::registry::lookup;

/// Execute one console line: a symbol name followed by its arguments.
/// Blank lines and `#` comments succeed with no effect. Unknown symbols,
/// parse errors and command failures log a warning and return false.
pub fn exec_line(line: &str) -> bool {
    let trimmed = skip_whitespace(line);
    if is_end_of_line(trimmed) {
        return true;
    }

    let symbol = &trimmed[..symbol_len(trimmed)];
    let command = match lookup(trimmed) {
        Some(command) => command,
        None => {
            crate::kl_warning!("unknown console symbol: {symbol}");
            return false;
        }
    };

    // The registry lock is not held here; commands may recurse into the
    // console (`exec` does).
    let rest = &trimmed[symbol.len()..];
    if command.execute(rest) {
        true
    } else {
        crate::kl_warning!("command failed: {symbol}");
        false
    }
}

/// Execute every line from a reader. Returns true only if every command
/// succeeded. Blank and comment lines are no-ops, as in [`exec_line`].
pub fn exec_lines<R: std::io::BufRead>(reader: R) -> bool {
    let mut all_ok = true;
    for line in reader.lines() {
        match line {
            Ok(line) => all_ok &= exec_line(&line),
            Err(error) => {
                crate::kl_warning!("read error in console script: {error}");
                return false;
            }
        }
    }
    all_ok
}

/// Open a script by name and execute it with [`exec_lines`].
pub fn exec_file(filename: &str) -> bool {
    let file = match std::fs::File::open(filename) {
        Ok(file) => file,
        Err(error) => {
            crate::kl_warning!("cannot open console script {filename}: {error}");
            return false;
        }
    };
    exec_lines(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_and_comment_lines_succeed() {
        assert!(exec_line(""));
        assert!(exec_line("   "));
        assert!(exec_line("# comment"));
        assert!(exec_line("   # indented comment"));
        assert!(exec_line("\t\t"));
    }

    #[test]
    fn test_unknown_symbol_fails() {
        crate::diagnostics::suppress_output(true);
        assert!(!exec_line("no_such_symbol_anywhere 1 2 3"));
        crate::diagnostics::suppress_output(false);
    }

    #[test]
    fn test_exec_lines_aggregates() {
        let script = b"# header\n\nhelp\n" as &[u8];
        assert!(exec_lines(script));

        crate::diagnostics::suppress_output(true);
        let bad = b"help\nnot_a_symbol\n" as &[u8];
        assert!(!exec_lines(bad));
        crate::diagnostics::suppress_output(false);
    }
}
