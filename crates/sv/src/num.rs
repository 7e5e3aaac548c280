//! Leading-numeral parsing with C `strtol(…, 10)` / `strtod` grammar.
//!
//! Parsing is locale-independent. Each `parse_*` skips leading C whitespace, reads the
//! longest valid literal, advances the view past it and reports how many bytes it took.
//! When no literal starts the view, nothing is consumed and `None` is returned; there is
//! no destination to leave in an unspecified state.

use crate::{Sv, is_space};

/// A parsed value and the number of bytes consumed from the view (leading whitespace included).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Parsed<T> {
    pub value: T,
    pub consumed: usize,
}

impl Sv<'_> {
    /// Parse a leading base-10 `int`. Out-of-range values saturate.
    ///
    /// ```
    /// use sv::Sv;
    ///
    /// let mut a = Sv::from_text("69text");
    /// let n = a.parse_int().unwrap();
    /// assert_eq!((n.value, n.consumed), (69, 2));
    /// assert_eq!(a, "text");
    /// assert!(a.parse_int().is_none());
    /// assert_eq!(a, "text");
    /// ```
    pub fn parse_int(&mut self) -> Option<Parsed<i32>> {
        self.parse_long().map(|p| Parsed {
            value: p.value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            consumed: p.consumed,
        })
    }

    /// Parse a leading base-10 `long`. Out-of-range values saturate like `strtol`.
    pub fn parse_long(&mut self) -> Option<Parsed<i64>> {
        let (value, consumed) = scan_integer(self.as_bytes())?;
        self.advance(consumed);
        Some(Parsed { value, consumed })
    }

    /// Parse a leading floating-point literal as `f32`.
    pub fn parse_float(&mut self) -> Option<Parsed<f32>> {
        self.parse_double().map(|p| Parsed {
            value: p.value as f32,
            consumed: p.consumed,
        })
    }

    /// Parse a leading floating-point literal as `f64`.
    ///
    /// Accepts decimal (`1.5e3`, `.5`, `7.`), hexadecimal (`0x1.8p1`), `inf`, `infinity`,
    /// `nan` and `nan(chars)`, all case-insensitive where C is.
    pub fn parse_double(&mut self) -> Option<Parsed<f64>> {
        let (value, consumed) = scan_float(self.as_bytes())?;
        self.advance(consumed);
        Some(Parsed { value, consumed })
    }
}

fn skip_space(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|&&b| is_space(b)).count()
}

/// Optional `+`/`-` at `bytes[i]`; returns `(negative, index after sign)`.
fn scan_sign(bytes: &[u8], i: usize) -> (bool, usize) {
    match bytes.get(i) {
        Some(b'-') => (true, i + 1),
        Some(b'+') => (false, i + 1),
        _ => (false, i),
    }
}

fn count_while(bytes: &[u8], pred: impl Fn(u8) -> bool) -> usize {
    bytes.iter().take_while(|&&b| pred(b)).count()
}

fn scan_integer(bytes: &[u8]) -> Option<(i64, usize)> {
    let (negative, start) = scan_sign(bytes, skip_space(bytes));
    let digits = count_while(&bytes[start..], |b| b.is_ascii_digit());
    if digits == 0 {
        return None;
    }

    let magnitude = bytes[start..start + digits]
        .iter()
        .fold(0u64, |acc, &d| acc.saturating_mul(10).saturating_add(u64::from(d - b'0')));
    let signed = if negative {
        -i128::from(magnitude)
    } else {
        i128::from(magnitude)
    };
    let value = signed.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64;
    Some((value, start + digits))
}

fn scan_float(bytes: &[u8]) -> Option<(f64, usize)> {
    let (negative, start) = scan_sign(bytes, skip_space(bytes));
    let body = &bytes[start..];
    let (magnitude, len) = scan_special(body)
        .or_else(|| scan_hex(body))
        .or_else(|| scan_decimal(body))?;
    let value = if negative { -magnitude } else { magnitude };
    Some((value, start + len))
}

fn starts_with_ignore_case(bytes: &[u8], word: &[u8]) -> bool {
    bytes.len() >= word.len() && bytes[..word.len()].eq_ignore_ascii_case(word)
}

fn scan_special(body: &[u8]) -> Option<(f64, usize)> {
    if starts_with_ignore_case(body, b"infinity") {
        return Some((f64::INFINITY, 8));
    }
    if starts_with_ignore_case(body, b"inf") {
        return Some((f64::INFINITY, 3));
    }
    if starts_with_ignore_case(body, b"nan") {
        // Optional n-char-sequence, only taken when the parenthesis closes.
        let mut len = 3;
        if body.get(3) == Some(&b'(') {
            let chars = count_while(&body[4..], |b| b.is_ascii_alphanumeric() || b == b'_');
            if body.get(4 + chars) == Some(&b')') {
                len = 4 + chars + 1;
            }
        }
        return Some((f64::NAN, len));
    }
    None
}

/// Length of an `e`/`p` exponent suffix at `bytes[i]`, or 0 when it has no digits.
fn exponent_len(bytes: &[u8], i: usize, marker: u8) -> (i32, usize) {
    if !bytes
        .get(i)
        .is_some_and(|b| b.eq_ignore_ascii_case(&marker))
    {
        return (0, 0);
    }
    let (negative, digits_at) = scan_sign(bytes, i + 1);
    let digits = count_while(&bytes[digits_at..], |b| b.is_ascii_digit());
    if digits == 0 {
        return (0, 0);
    }
    let magnitude = bytes[digits_at..digits_at + digits]
        .iter()
        .fold(0i32, |acc, &d| acc.saturating_mul(10).saturating_add(i32::from(d - b'0')));
    let exp = if negative { -magnitude } else { magnitude };
    (exp, digits_at + digits - i)
}

/// Hex digits kept in the mantissa; a `u64` holds exactly sixteen.
const HEX_MANTISSA_DIGITS: usize = 16;

fn scan_hex(body: &[u8]) -> Option<(f64, usize)> {
    if !(starts_with_ignore_case(body, b"0x")) {
        return None;
    }
    let mut i = 2;
    let mut mantissa = 0u64;
    let mut kept = 0usize;
    let mut exp = 0i32;
    let mut digits = 0usize;

    while let Some(d) = body.get(i).and_then(|&b| (b as char).to_digit(16)) {
        if kept < HEX_MANTISSA_DIGITS {
            mantissa = mantissa << 4 | u64::from(d);
            if mantissa != 0 {
                kept += 1;
            }
        } else {
            exp = exp.saturating_add(4);
        }
        digits += 1;
        i += 1;
    }
    if body.get(i) == Some(&b'.') {
        i += 1;
        while let Some(d) = body.get(i).and_then(|&b| (b as char).to_digit(16)) {
            if kept < HEX_MANTISSA_DIGITS {
                mantissa = mantissa << 4 | u64::from(d);
                if mantissa != 0 {
                    kept += 1;
                }
                exp = exp.saturating_sub(4);
            }
            digits += 1;
            i += 1;
        }
    }
    if digits == 0 {
        // "0x" with no hex digits: only the leading "0" is a numeral.
        return None;
    }

    let (bin_exp, exp_len) = exponent_len(body, i, b'p');
    let value = scale_pow2(mantissa as f64, exp.saturating_add(bin_exp));
    Some((value, i + exp_len))
}

/// `value * 2^exp` without overflowing the intermediate power.
fn scale_pow2(mut value: f64, mut exp: i32) -> f64 {
    const STEP: i32 = 1000;
    while exp > STEP && value.is_finite() && value != 0.0 {
        value *= 2f64.powi(STEP);
        exp -= STEP;
    }
    while exp < -STEP && value != 0.0 {
        value *= 2f64.powi(-STEP);
        exp += STEP;
    }
    value * 2f64.powi(exp.clamp(-2 * STEP, 2 * STEP))
}

fn scan_decimal(body: &[u8]) -> Option<(f64, usize)> {
    let int_digits = count_while(body, |b| b.is_ascii_digit());
    let mut len = int_digits;
    let mut frac_digits = 0;
    if body.get(len) == Some(&b'.') {
        frac_digits = count_while(&body[len + 1..], |b| b.is_ascii_digit());
        if int_digits + frac_digits > 0 {
            len += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }
    let (_, exp_len) = exponent_len(body, len, b'e');
    len += exp_len;

    let text = std::str::from_utf8(&body[..len]).ok()?;
    let value = text.parse::<f64>().ok()?;
    Some((value, len))
}
