//! Typed dispatch from console text to bound functions and variables.
//!
//! One wrapper per arity (0 through 4), generic over the closed parameter
//! set. The wrappers are `const`-constructible so registration can happen
//! entirely in statics, and each parses its arguments in sequence,
//! requiring nothing but whitespace or a comment after the last one.

use crate::console::args::{
    is_end_of_line, parse_hex, parse_line, parse_number, parse_number_or_end, Hex, Number,
    NumberOrEnd,
};

/// A console parameter position. The set is closed: [`Number`], [`Hex`],
/// and [`Line`] (remainder of line as `&str`).
pub trait Arg {
    /// The value handed to the bound function; borrows from the input
    /// line for `Line`.
    type Out<'a>;

    /// Usage label, e.g. `f64`.
    const LABEL: &'static str;

    /// Parse one value off the input, returning it and the rest.
    fn parse(input: &str) -> Option<(Self::Out<'_>, &str)>;
}

impl Arg for Number {
    type Out<'a> = Number;
    const LABEL: &'static str = "f64";

    fn parse(input: &str) -> Option<(Number, &str)> {
        parse_number(input)
    }
}

impl Arg for Hex {
    type Out<'a> = Hex;
    const LABEL: &'static str = "hex";

    fn parse(input: &str) -> Option<(Hex, &str)> {
        parse_hex(input)
    }
}

/// Marker for the remainder-of-line parameter: the bound function receives
/// a `&str` holding everything after leading whitespace, `#` included,
/// possibly empty. Only meaningful as the final parameter.
pub struct Line;

impl Arg for Line {
    type Out<'a> = &'a str;
    const LABEL: &'static str = "str";

    fn parse(input: &str) -> Option<(&str, &str)> {
        Some(parse_line(input))
    }
}

/// A dispatchable console binding: a function or a variable.
pub trait Command: Sync {
    /// Run against the argument text. False for parse errors (after
    /// logging usage) and for command-reported failure.
    fn execute(&self, args: &str) -> bool;

    /// Log a usage line for `name`.
    fn usage(&self, name: &str);
}

/// Niladic command.
pub struct Command0 {
    f: fn() -> bool,
}

impl Command0 {
    pub const fn new(f: fn() -> bool) -> Self {
        Self { f }
    }
}

impl Command for Command0 {
    fn execute(&self, args: &str) -> bool {
        if is_end_of_line(args) {
            (self.f)()
        } else {
            crate::kl_console!("usage: no arguments");
            false
        }
    }

    fn usage(&self, name: &str) {
        crate::kl_console!("{name}");
    }
}

/// One-parameter command.
pub struct Command1<A: Arg> {
    f: for<'a> fn(A::Out<'a>) -> bool,
}

impl<A: Arg> Command1<A> {
    pub const fn new(f: for<'a> fn(A::Out<'a>) -> bool) -> Self {
        Self { f }
    }
}

impl<A: Arg + Sync> Command for Command1<A> {
    fn execute(&self, args: &str) -> bool {
        if let Some((a, rest)) = A::parse(args) {
            if is_end_of_line(rest) {
                return (self.f)(a);
            }
        }
        crate::kl_console!("usage: {}", A::LABEL);
        false
    }

    fn usage(&self, name: &str) {
        crate::kl_console!("{name} {}", A::LABEL);
    }
}

/// Two-parameter command.
pub struct Command2<A: Arg, B: Arg> {
    f: for<'a> fn(A::Out<'a>, B::Out<'a>) -> bool,
}

impl<A: Arg, B: Arg> Command2<A, B> {
    pub const fn new(f: for<'a> fn(A::Out<'a>, B::Out<'a>) -> bool) -> Self {
        Self { f }
    }
}

impl<A: Arg + Sync, B: Arg + Sync> Command for Command2<A, B> {
    fn execute(&self, args: &str) -> bool {
        if let Some((a, rest)) = A::parse(args) {
            if let Some((b, rest)) = B::parse(rest) {
                if is_end_of_line(rest) {
                    return (self.f)(a, b);
                }
            }
        }
        crate::kl_console!("usage: {} {}", A::LABEL, B::LABEL);
        false
    }

    fn usage(&self, name: &str) {
        crate::kl_console!("{name} {} {}", A::LABEL, B::LABEL);
    }
}

/// Three-parameter command.
pub struct Command3<A: Arg, B: Arg, C: Arg> {
    f: for<'a> fn(A::Out<'a>, B::Out<'a>, C::Out<'a>) -> bool,
}

impl<A: Arg, B: Arg, C: Arg> Command3<A, B, C> {
    pub const fn new(f: for<'a> fn(A::Out<'a>, B::Out<'a>, C::Out<'a>) -> bool) -> Self {
        Self { f }
    }
}

impl<A: Arg + Sync, B: Arg + Sync, C: Arg + Sync> Command for Command3<A, B, C> {
    fn execute(&self, args: &str) -> bool {
        if let Some((a, rest)) = A::parse(args) {
            if let Some((b, rest)) = B::parse(rest) {
                if let Some((c, rest)) = C::parse(rest) {
                    if is_end_of_line(rest) {
                        return (self.f)(a, b, c);
                    }
                }
            }
        }
        crate::kl_console!("usage: {} {} {}", A::LABEL, B::LABEL, C::LABEL);
        false
    }

    fn usage(&self, name: &str) {
        crate::kl_console!("{name} {} {} {}", A::LABEL, B::LABEL, C::LABEL);
    }
}

/// Four-parameter command.
pub struct Command4<A: Arg, B: Arg, C: Arg, D: Arg> {
    f: for<'a> fn(A::Out<'a>, B::Out<'a>, C::Out<'a>, D::Out<'a>) -> bool,
}

impl<A: Arg, B: Arg, C: Arg, D: Arg> Command4<A, B, C, D> {
    pub const fn new(
        f: for<'a> fn(A::Out<'a>, B::Out<'a>, C::Out<'a>, D::Out<'a>) -> bool,
    ) -> Self {
        Self { f }
    }
}

impl<A: Arg + Sync, B: Arg + Sync, C: Arg + Sync, D: Arg + Sync> Command for Command4<A, B, C, D> {
    fn execute(&self, args: &str) -> bool {
        if let Some((a, rest)) = A::parse(args) {
            if let Some((b, rest)) = B::parse(rest) {
                if let Some((c, rest)) = C::parse(rest) {
                    if let Some((d, rest)) = D::parse(rest) {
                        if is_end_of_line(rest) {
                            return (self.f)(a, b, c, d);
                        }
                    }
                }
            }
        }
        crate::kl_console!(
            "usage: {} {} {} {}",
            A::LABEL,
            B::LABEL,
            C::LABEL,
            D::LABEL
        );
        false
    }

    fn usage(&self, name: &str) {
        crate::kl_console!("{name} {} {} {} {}", A::LABEL, B::LABEL, C::LABEL, D::LABEL);
    }
}

/// A value a console variable can hold: atomically stored, displayable,
/// and assignable from a [`Number`].
pub trait VarValue: Copy + std::fmt::Display {
    type Atomic: Sync + Send + 'static;

    fn load(storage: &Self::Atomic) -> Self;
    fn store(storage: &Self::Atomic, value: Self);
    fn from_number(value: Number) -> Self;
}

/// An atomic cell exposing a variable to the console. Declare as a static
/// and bind with [`crate::console_variable!`]; read and write from code
/// with [`ConsoleVar::get`]/[`ConsoleVar::set`].
pub struct ConsoleVar<T: VarValue> {
    storage: T::Atomic,
}

impl<T: VarValue> ConsoleVar<T> {
    pub fn get(&self) -> T {
        T::load(&self.storage)
    }

    pub fn set(&self, value: T) {
        T::store(&self.storage, value);
    }
}

macro_rules! var_value_int {
    ($($ctor:ident: $t:ty => $atomic:ty),* $(,)?) => {$(
        impl VarValue for $t {
            type Atomic = $atomic;

            fn load(storage: &Self::Atomic) -> Self {
                storage.load(std::sync::atomic::Ordering::Relaxed)
            }

            fn store(storage: &Self::Atomic, value: Self) {
                storage.store(value, std::sync::atomic::Ordering::Relaxed);
            }

            fn from_number(value: Number) -> Self {
                value.to()
            }
        }

        impl ConsoleVar<$t> {
            pub const fn $ctor(value: $t) -> Self {
                Self { storage: <$atomic>::new(value) }
            }
        }
    )*};
}

var_value_int! {
    new_i8: i8 => std::sync::atomic::AtomicI8,
    new_i16: i16 => std::sync::atomic::AtomicI16,
    new_i32: i32 => std::sync::atomic::AtomicI32,
    new_i64: i64 => std::sync::atomic::AtomicI64,
    new_u8: u8 => std::sync::atomic::AtomicU8,
    new_u16: u16 => std::sync::atomic::AtomicU16,
    new_u32: u32 => std::sync::atomic::AtomicU32,
    new_u64: u64 => std::sync::atomic::AtomicU64,
    new_usize: usize => std::sync::atomic::AtomicUsize,
    new_isize: isize => std::sync::atomic::AtomicIsize,
}

impl VarValue for bool {
    type Atomic = std::sync::atomic::AtomicBool;

    fn load(storage: &Self::Atomic) -> Self {
        storage.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn store(storage: &Self::Atomic, value: Self) {
        storage.store(value, std::sync::atomic::Ordering::Relaxed);
    }

    fn from_number(value: Number) -> Self {
        value.to()
    }
}

impl ConsoleVar<bool> {
    pub const fn new_bool(value: bool) -> Self {
        Self {
            storage: std::sync::atomic::AtomicBool::new(value),
        }
    }
}

impl VarValue for f32 {
    type Atomic = std::sync::atomic::AtomicU32;

    fn load(storage: &Self::Atomic) -> Self {
        f32::from_bits(storage.load(std::sync::atomic::Ordering::Relaxed))
    }

    fn store(storage: &Self::Atomic, value: Self) {
        storage.store(value.to_bits(), std::sync::atomic::Ordering::Relaxed);
    }

    fn from_number(value: Number) -> Self {
        value.to()
    }
}

impl ConsoleVar<f32> {
    pub const fn new_f32(value: f32) -> Self {
        Self {
            storage: std::sync::atomic::AtomicU32::new(value.to_bits()),
        }
    }
}

impl VarValue for f64 {
    type Atomic = std::sync::atomic::AtomicU64;

    fn load(storage: &Self::Atomic) -> Self {
        f64::from_bits(storage.load(std::sync::atomic::Ordering::Relaxed))
    }

    fn store(storage: &Self::Atomic, value: Self) {
        storage.store(value.to_bits(), std::sync::atomic::Ordering::Relaxed);
    }

    fn from_number(value: Number) -> Self {
        value.to()
    }
}

impl ConsoleVar<f64> {
    pub const fn new_f64(value: f64) -> Self {
        Self {
            storage: std::sync::atomic::AtomicU64::new(value.to_bits()),
        }
    }
}

/// Binds a [`ConsoleVar`] into the command table. Zero arguments reports
/// the value; one numeric argument assigns it; anything else is rejected.
pub struct VarBinding<T: VarValue + 'static> {
    var: &'static ConsoleVar<T>,
}

impl<T: VarValue + 'static> VarBinding<T> {
    pub const fn new(var: &'static ConsoleVar<T>) -> Self {
        Self { var }
    }
}

impl<T: VarValue + 'static> Command for VarBinding<T> {
    fn execute(&self, args: &str) -> bool {
        match parse_number_or_end(args) {
            NumberOrEnd::End => {
                crate::kl_console!("{}", self.var.get());
                true
            }
            NumberOrEnd::Value(value) => {
                self.var.set(T::from_number(value));
                true
            }
            NumberOrEnd::Error => false,
        }
    }

    fn usage(&self, name: &str) {
        crate::kl_console!("{name} <optional-value>");
    }
}

/// A settings-backed variable: adapts getter and setter functions, for
/// tunables that live outside a [`ConsoleVar`].
pub struct SettingBinding {
    read: fn() -> f64,
    write: fn(f64),
}

impl SettingBinding {
    pub const fn new(read: fn() -> f64, write: fn(f64)) -> Self {
        Self { read, write }
    }
}

impl Command for SettingBinding {
    fn execute(&self, args: &str) -> bool {
        match parse_number_or_end(args) {
            NumberOrEnd::End => {
                crate::kl_console!("{}", (self.read)());
                true
            }
            NumberOrEnd::Value(value) => {
                (self.write)(value.raw());
                true
            }
            NumberOrEnd::Error => false,
        }
    }

    fn usage(&self, name: &str) {
        crate::kl_console!("{name} <optional-value>");
    }
}

/// Register a free function as a console command, named after the
/// function. Parameter positions are spelled with the closed set of
/// console types: `Number`, `Hex`, `Line` (the `&str` remainder capture,
/// final position only). Zero through four parameters.
///
/// ```ignore
/// fn seed_random(seed: Number) -> bool { /* ... */ true }
/// console_command!(seed_random(Number));
/// ```
#[macro_export]
macro_rules! console_command {
    ($name:ident()) => {
        $crate::console_command_named!($name, $name());
    };
    ($name:ident($a:ty)) => {
        $crate::console_command_named!($name, $name($a));
    };
    ($name:ident($a:ty, $b:ty)) => {
        $crate::console_command_named!($name, $name($a, $b));
    };
    ($name:ident($a:ty, $b:ty, $c:ty)) => {
        $crate::console_command_named!($name, $name($a, $b, $c));
    };
    ($name:ident($a:ty, $b:ty, $c:ty, $d:ty)) => {
        $crate::console_command_named!($name, $name($a, $b, $c, $d));
    };
}

/// Register a function under an explicit symbol name. The same spelling
/// rules as [`crate::console_command!`].
#[macro_export]
macro_rules! console_command_named {
    ($symbol:ident, $f:ident()) => {
        $crate::console_command_named!(@entry $symbol, $crate::console::Command0, $crate::console::Command0::new($f));
    };
    ($symbol:ident, $f:ident($a:ty)) => {
        $crate::console_command_named!(@entry $symbol, $crate::console::Command1<$a>, $crate::console::Command1::<$a>::new($f));
    };
    ($symbol:ident, $f:ident($a:ty, $b:ty)) => {
        $crate::console_command_named!(@entry $symbol, $crate::console::Command2<$a, $b>, $crate::console::Command2::<$a, $b>::new($f));
    };
    ($symbol:ident, $f:ident($a:ty, $b:ty, $c:ty)) => {
        $crate::console_command_named!(@entry $symbol, $crate::console::Command3<$a, $b, $c>, $crate::console::Command3::<$a, $b, $c>::new($f));
    };
    ($symbol:ident, $f:ident($a:ty, $b:ty, $c:ty, $d:ty)) => {
        $crate::console_command_named!(@entry $symbol, $crate::console::Command4<$a, $b, $c, $d>, $crate::console::Command4::<$a, $b, $c, $d>::new($f));
    };
    (@entry $symbol:ident, $ty:ty, $init:expr) => {
        const _: () = {
            static COMMAND: $ty = $init;

            #[$crate::linkme::distributed_slice($crate::console::CONSOLE_COMMANDS)]
            static ENTRY: $crate::console::ConsoleEntry =
                $crate::console::ConsoleEntry::new(stringify!($symbol), &COMMAND);
        };
    };
}

/// Bind a static [`ConsoleVar`] to a console symbol.
///
/// ```ignore
/// static TIME_SCALE: ConsoleVar<f32> = ConsoleVar::new_f32(1.0);
/// console_variable!(time_scale: f32 => TIME_SCALE);
/// ```
#[macro_export]
macro_rules! console_variable {
    ($symbol:ident: $t:ty => $var:path) => {
        const _: () = {
            static BINDING: $crate::console::VarBinding<$t> =
                $crate::console::VarBinding::new(&$var);

            #[$crate::linkme::distributed_slice($crate::console::CONSOLE_COMMANDS)]
            static ENTRY: $crate::console::ConsoleEntry =
                $crate::console::ConsoleEntry::new(stringify!($symbol), &BINDING);
        };
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_args() -> bool {
        true
    }

    fn one_number(n: Number) -> bool {
        n.raw() == 5.0
    }

    fn number_then_line(n: Number, rest: &str) -> bool {
        n.raw() == 1.0 && rest == "the rest # included"
    }

    #[test]
    fn test_command0_rejects_args() {
        crate::diagnostics::suppress_output(true);
        let c = Command0::new(no_args);
        assert!(c.execute(""));
        assert!(c.execute("   # fine"));
        assert!(!c.execute(" extra"));
        crate::diagnostics::suppress_output(false);
    }

    #[test]
    fn test_command1_parses_number() {
        crate::diagnostics::suppress_output(true);
        let c = Command1::<Number>::new(one_number);
        assert!(c.execute(" 5"));
        assert!(c.execute(" 5 # comment"));
        assert!(!c.execute(" 6"));       // command returned false
        assert!(!c.execute(" five"));    // parse error
        assert!(!c.execute(""));         // missing arg
        assert!(!c.execute(" 5 6"));     // trailing junk
        crate::diagnostics::suppress_output(false);
    }

    #[test]
    fn test_line_captures_remainder() {
        let c = Command2::<Number, Line>::new(number_then_line);
        assert!(c.execute(" 1   the rest # included"));
    }

    #[test]
    fn test_var_binding_query_and_assign() {
        crate::diagnostics::suppress_output(true);
        static VAR: ConsoleVar<i32> = ConsoleVar::new_i32(11);
        let binding = VarBinding::new(&VAR);

        assert!(binding.execute(""));      // query
        assert!(binding.execute(" 345"));
        assert_eq!(VAR.get(), 345);
        assert!(!binding.execute(" 1 2")); // too many args
        assert_eq!(VAR.get(), 345);
        crate::diagnostics::suppress_output(false);
    }

    #[test]
    fn test_var_binding_narrows_fraction() {
        crate::diagnostics::suppress_output(true);
        static VAR: ConsoleVar<i32> = ConsoleVar::new_i32(0);
        let binding = VarBinding::new(&VAR);
        assert!(binding.execute(" 3.5"));
        assert_eq!(VAR.get(), 3);
        crate::diagnostics::suppress_output(false);
    }

    #[test]
    fn test_float_var_round_trip() {
        static VAR: ConsoleVar<f32> = ConsoleVar::new_f32(1.5);
        assert_eq!(VAR.get(), 1.5);
        VAR.set(-2.25);
        assert_eq!(VAR.get(), -2.25);
    }
}
