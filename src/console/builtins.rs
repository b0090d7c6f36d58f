//! Commands and variables the console registers for every host.
//!
//! Script execution, raw-memory inspection (debug tools; the caller
//! vouches for the addresses it types), symbol listing, and console
//! bindings for the process settings.

use linkme::distributed_slice;

use crate::console::args::{Hex, Number};
use crate::console::command::{Command, Line, SettingBinding};
use crate::console::registry::{for_each_symbol, ConsoleEntry, CONSOLE_COMMANDS};
use crate::console_command;
use crate::core::settings::settings;

/// `exec <filename>` - run a console script.
fn exec(filename: &str) -> bool {
    crate::console::exec_file(filename)
}
console_command!(exec(Line));

/// `peek <hex-address> <byte-count>` - log bytes of raw memory.
fn peek(address: Hex, count: Number) -> bool {
    let addr: usize = address.to();
    let count: usize = count.to();
    let mut line = String::with_capacity(count * 3);
    for i in 0..count {
        // SAFETY: debug tool; the operator names the address range.
        let byte = unsafe { std::ptr::read_volatile((addr + i) as *const u8) };
        if i > 0 {
            line.push(' ');
        }
        line.push_str(&format!("{byte:02x}"));
    }
    crate::kl_console!("{addr:016x}: {line}");
    true
}
console_command!(peek(Hex, Number));

/// `poke <hex-address> <byte-count> <hex-payload>` - write up to 8 bytes
/// of the payload, little-endian, to raw memory.
fn poke(address: Hex, count: Number, payload: Hex) -> bool {
    let addr: usize = address.to();
    let count: usize = count.to();
    if count > 8 {
        crate::kl_warning!("poke writes at most 8 bytes, got {count}");
        return false;
    }
    let bytes = payload.raw().to_le_bytes();
    for (i, byte) in bytes.iter().take(count).enumerate() {
        // SAFETY: debug tool; the operator names the address range.
        unsafe { std::ptr::write_volatile((addr + i) as *mut u8, *byte) };
    }
    true
}
console_command!(poke(Hex, Number, Hex));

/// `hexdump <hex-address> <byte-count>` - classic 16-per-line hex dump.
fn hexdump(address: Hex, count: Number) -> bool {
    let addr: usize = address.to();
    let count: usize = count.to();
    let mut offset = 0;
    while offset < count {
        let row = (count - offset).min(16);
        let mut line = String::with_capacity(3 * 16);
        for i in 0..row {
            // SAFETY: debug tool; the operator names the address range.
            let byte = unsafe { std::ptr::read_volatile((addr + offset + i) as *const u8) };
            if i > 0 {
                line.push(' ');
            }
            line.push_str(&format!("{byte:02x}"));
        }
        crate::kl_console!("{:016x}: {line}", addr + offset);
        offset += row;
    }
    true
}
console_command!(hexdump(Hex, Number));

/// `floatdump <hex-address> <float-count>` - log 32-bit floats.
fn floatdump(address: Hex, count: Number) -> bool {
    let addr: usize = address.to();
    let count: usize = count.to();
    for i in 0..count {
        // SAFETY: debug tool; the operator names the address range.
        // Unaligned read: console addresses carry no alignment promise.
        let value = unsafe { std::ptr::read_unaligned((addr + i * 4) as *const f32) };
        crate::kl_console!("{:016x}: {value}", addr + i * 4);
    }
    true
}
console_command!(floatdump(Hex, Number));

/// `help` - list every registered symbol with its usage.
fn help() -> bool {
    for_each_symbol(|entry| entry.command.usage(entry.name));
    true
}
console_command!(help());

// Settings tunables, reachable the same way any console variable is.

static LOG_LEVEL_BINDING: SettingBinding = SettingBinding::new(
    || settings().log_level_raw() as f64,
    |value| settings().set_log_level_raw(value as i32),
);

#[distributed_slice(CONSOLE_COMMANDS)]
static LOG_LEVEL_ENTRY: ConsoleEntry = ConsoleEntry::new("log_level", &LOG_LEVEL_BINDING);

static ASSERTS_TO_SKIP_BINDING: SettingBinding = SettingBinding::new(
    || settings().asserts_to_skip() as f64,
    |value| settings().set_asserts_to_skip(value as i32),
);

#[distributed_slice(CONSOLE_COMMANDS)]
static ASSERTS_TO_SKIP_ENTRY: ConsoleEntry =
    ConsoleEntry::new("asserts_to_skip", &ASSERTS_TO_SKIP_BINDING);

static DEALLOCATE_PERMANENT_BINDING: SettingBinding = SettingBinding::new(
    || settings().deallocate_permanent() as i32 as f64,
    |value| settings().set_deallocate_permanent(value != 0.0),
);

#[distributed_slice(CONSOLE_COMMANDS)]
static DEALLOCATE_PERMANENT_ENTRY: ConsoleEntry =
    ConsoleEntry::new("deallocate_permanent", &DEALLOCATE_PERMANENT_BINDING);
