//! Console tokenization and the closed set of parameter types.
//!
//! Exactly three parameter kinds exist: [`Number`] (parsed as f64, then
//! narrowed with clamping when converted to the bound type), [`Hex`]
//! (unprefixed hex into a u64), and remainder-of-line strings. Keeping the
//! set closed is what keeps the per-arity dispatch wrappers from bloating.

/// Token delimiters are every byte `<= 0x20` (whitespace and ASCII
/// control codes). Bytes `>= 0x80` are name characters, which makes UTF-8
/// symbol names work unmodified.
#[inline]
pub fn is_delimiter(byte: u8) -> bool {
    byte <= 0x20
}

/// Strip leading delimiters.
pub(crate) fn skip_whitespace(s: &str) -> &str {
    let start = s
        .bytes()
        .position(|b| !is_delimiter(b))
        .unwrap_or(s.len());
    &s[start..]
}

/// Length of the leading symbol token in bytes.
pub(crate) fn symbol_len(s: &str) -> usize {
    s.bytes().position(is_delimiter).unwrap_or(s.len())
}

/// True when nothing but whitespace or a `#` comment remains.
pub(crate) fn is_end_of_line(s: &str) -> bool {
    let rest = skip_whitespace(s);
    rest.is_empty() || rest.starts_with('#')
}

/// Split the next token off the input. The token is empty at end of line.
pub(crate) fn next_token(s: &str) -> (&str, &str) {
    let s = skip_whitespace(s);
    let len = symbol_len(s);
    (&s[..len], &s[len..])
}

/// A generic console number. Double is the single intermediate type so
/// that one parser and one wrapper serve every numeric parameter, the way
/// JavaScript treats numbers. Convert to the bound type with
/// [`Number::to`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Number(f64);

impl Number {
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// The unconverted double.
    pub fn raw(self) -> f64 {
        self.0
    }

    /// Narrow to the target type. Out-of-range values clamp, with a
    /// skippable assertion; a lossy narrowing (fraction discarded or
    /// precision lost) logs a warning and keeps going.
    pub fn to<T: FromNumber>(self) -> T {
        T::from_number(self.0)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// Conversion out of the console's double intermediate.
pub trait FromNumber {
    fn from_number(value: f64) -> Self;
}

macro_rules! from_number_int {
    ($($t:ty),*) => {$(
        impl FromNumber for $t {
            fn from_number(value: f64) -> Self {
                let clamped = value.clamp(<$t>::MIN as f64, <$t>::MAX as f64);
                crate::kl_check!(clamped == value, "parameter overflow {value}");
                let narrowed = clamped as $t;
                if narrowed as f64 != clamped {
                    crate::kl_warning!("lossy conversion {clamped} -> {narrowed}");
                }
                narrowed
            }
        }
    )*};
}

from_number_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromNumber for f64 {
    fn from_number(value: f64) -> Self {
        value
    }
}

impl FromNumber for f32 {
    fn from_number(value: f64) -> Self {
        let narrowed = value as f32;
        if narrowed as f64 != value && value.is_finite() {
            crate::kl_warning!("lossy conversion {value} -> {narrowed}");
        }
        narrowed
    }
}

impl FromNumber for bool {
    fn from_number(value: f64) -> Self {
        value != 0.0
    }
}

/// A hex console value: unprefixed hex digits into a u64, then a straight
/// bit-cast or truncation to the bound type. The way to pass addresses and
/// hash values through the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hex(u64);

impl Hex {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    /// Truncate or bit-cast to the target type. No range diagnostics.
    pub fn to<T: FromHex>(self) -> T {
        T::from_hex(self.0)
    }
}

/// Conversion out of the console's u64 hex intermediate.
pub trait FromHex {
    fn from_hex(value: u64) -> Self;
}

macro_rules! from_hex_int {
    ($($t:ty),*) => {$(
        impl FromHex for $t {
            fn from_hex(value: u64) -> Self {
                value as $t
            }
        }
    )*};
}

from_hex_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromHex for f32 {
    fn from_hex(value: u64) -> Self {
        f32::from_bits(value as u32)
    }
}

impl FromHex for f64 {
    fn from_hex(value: u64) -> Self {
        f64::from_bits(value)
    }
}

pub(crate) fn parse_number(input: &str) -> Option<(Number, &str)> {
    let (token, rest) = next_token(input);
    if token.is_empty() {
        return None;
    }
    token.parse::<f64>().ok().map(|value| (Number(value), rest))
}

pub(crate) fn parse_hex(input: &str) -> Option<(Hex, &str)> {
    let (token, rest) = next_token(input);
    if token.is_empty() {
        return None;
    }
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u64::from_str_radix(digits, 16)
        .ok()
        .map(|value| (Hex(value), rest))
}

/// The remainder-of-line capture: everything after leading whitespace,
/// verbatim, `#` included. May be empty.
pub(crate) fn parse_line(input: &str) -> (&str, &str) {
    (skip_whitespace(input), "")
}

/// Consume one optional trailing number, the protocol variable bindings
/// speak: nothing left is a query, one number is an assignment, anything
/// else is an error.
pub(crate) enum NumberOrEnd {
    End,
    Value(Number),
    Error,
}

pub(crate) fn parse_number_or_end(input: &str) -> NumberOrEnd {
    if is_end_of_line(input) {
        return NumberOrEnd::End;
    }
    match parse_number(input) {
        Some((value, rest)) if is_end_of_line(rest) => NumberOrEnd::Value(value),
        _ => {
            crate::kl_console!("parse error: {}", skip_whitespace(input));
            NumberOrEnd::Error
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::settings::settings;

    #[test]
    fn test_tokenizer() {
        assert_eq!(skip_whitespace("  \t x y"), "x y");
        assert_eq!(symbol_len("symbol rest"), 6);
        assert_eq!(next_token("  12.5 78"), ("12.5", " 78"));
        assert_eq!(next_token(""), ("", ""));
    }

    #[test]
    fn test_utf8_symbols_are_single_tokens() {
        let line = "gravité -9.8";
        assert_eq!(&line[..symbol_len(line)], "gravité");
    }

    #[test]
    fn test_end_of_line_detection() {
        assert!(is_end_of_line(""));
        assert!(is_end_of_line("   "));
        assert!(is_end_of_line(" # trailing comment"));
        assert!(!is_end_of_line(" 5"));
    }

    #[test]
    fn test_parse_number_formats() {
        assert_eq!(parse_number("345").unwrap().0.raw(), 345.0);
        assert_eq!(parse_number("-2.5 x").unwrap().0.raw(), -2.5);
        assert_eq!(parse_number("1e3").unwrap().0.raw(), 1000.0);
        assert!(parse_number("").is_none());
        assert!(parse_number("twelve").is_none());
    }

    #[test]
    fn test_parse_hex_formats() {
        assert_eq!(parse_hex("ff").unwrap().0.raw(), 255);
        assert_eq!(parse_hex("0xff").unwrap().0.raw(), 255);
        assert_eq!(parse_hex("DEADBEEF").unwrap().0.raw(), 0xdead_beef);
        assert!(parse_hex("xyz").is_none());
    }

    #[test]
    fn test_number_narrowing() {
        let n = Number::new(345.0);
        assert_eq!(n.to::<i32>(), 345);
        assert_eq!(n.to::<i64>(), 345);
        assert_eq!(n.to::<f32>(), 345.0);
    }

    #[test]
    fn test_number_truncates_fractions() {
        crate::diagnostics::suppress_output(true);
        let n = Number::new(3.5);
        assert_eq!(n.to::<i32>(), 3);
        crate::diagnostics::suppress_output(false);
    }

    #[test]
    fn test_number_clamps_overflow() {
        let _serial = crate::test_support::serial();
        settings().set_asserts_to_skip(2);
        crate::diagnostics::suppress_output(true);
        assert_eq!(Number::new(300.0).to::<u8>(), 255);
        assert_eq!(Number::new(-1.0).to::<u8>(), 0);
        crate::diagnostics::suppress_output(false);
    }

    #[test]
    fn test_number_bool() {
        assert!(Number::new(1.0).to::<bool>());
        assert!(Number::new(-0.5).to::<bool>());
        assert!(!Number::new(0.0).to::<bool>());
    }

    #[test]
    fn test_hex_bit_casts() {
        let h = Hex::new(0x4048_f5c3);
        assert_eq!(h.to::<u32>(), 0x4048_f5c3);
        assert!((h.to::<f32>() - 3.14).abs() < 1e-6);
        assert_eq!(Hex::new(0x1_0000_00ffu64).to::<u8>(), 0xff);
    }

    #[test]
    fn test_remainder_capture() {
        let (value, rest) = parse_line("   everything # here   ");
        assert_eq!(value, "everything # here   ");
        assert_eq!(rest, "");
    }
}
