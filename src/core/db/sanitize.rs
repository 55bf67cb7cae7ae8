/// Sanitization Module
///
/// Escaping of untrusted input before it is spliced into statement text.
/// Escaping is a property of the live session (the backend decides what its
/// string literals look like), so everything here works against an `Escape`
/// implementation rather than a fixed routine.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use super::query::Value;

/// Matches text that reads as a numeric literal: optional surrounding
/// whitespace, sign, digits with an optional fraction, optional exponent.
static NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t\n\r\x0B\x0C]*[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?[ \t\n\r\x0B\x0C]*$")
        .expect("numeric literal pattern is valid")
});

/// Returns `true` if `input` is a numeric literal and must not be escaped.
pub fn is_numeric(input: &str) -> bool {
    NUMERIC.is_match(input)
}

/// How a backend escapes the inside of a single-quoted string literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapeStyle {
    /// SQL standard: a quote is written twice (`'` becomes `''`).
    DoubledQuote,
    /// MySQL `real_escape_string`: NUL, newline, carriage return, backslash,
    /// both quotes and Ctrl-Z are prefixed with a backslash.
    Backslash,
}

impl EscapeStyle {
    pub fn escape_literal(self, input: &str) -> String {
        let mut out = String::with_capacity(input.len() + 8);
        match self {
            EscapeStyle::DoubledQuote => {
                for c in input.chars() {
                    if c == '\'' {
                        out.push('\'');
                    }
                    out.push(c);
                }
            }
            EscapeStyle::Backslash => {
                for c in input.chars() {
                    match c {
                        '\0' => out.push_str("\\0"),
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\x1a' => out.push_str("\\Z"),
                        '\\' | '\'' | '"' => {
                            out.push('\\');
                            out.push(c);
                        }
                        _ => out.push(c),
                    }
                }
            }
        }
        out
    }
}

/// Something that can escape text for a string literal.
///
/// Implemented by live sessions; the handle only hands out an escaper once a
/// connection exists.
pub trait Escape {
    fn escape(&self, input: &str) -> String;
}

impl Escape for EscapeStyle {
    fn escape(&self, input: &str) -> String {
        self.escape_literal(input)
    }
}

/// Values that can be sanitized for inclusion in statement text.
///
/// Structured inputs sanitize every key and every value and keep their
/// shape. Numeric text and non-text scalars pass through untouched.
pub trait Sanitize: Sized {
    fn sanitize_with<E: Escape + ?Sized>(self, escaper: &E) -> Self;
}

impl Sanitize for String {
    fn sanitize_with<E: Escape + ?Sized>(self, escaper: &E) -> Self {
        if is_numeric(&self) {
            self
        } else {
            escaper.escape(&self)
        }
    }
}

impl Sanitize for Value {
    fn sanitize_with<E: Escape + ?Sized>(self, escaper: &E) -> Self {
        match self {
            Value::Text(text) => Value::Text(text.sanitize_with(escaper)),
            other => other,
        }
    }
}

impl<K: Sanitize, V: Sanitize> Sanitize for (K, V) {
    fn sanitize_with<E: Escape + ?Sized>(self, escaper: &E) -> Self {
        (self.0.sanitize_with(escaper), self.1.sanitize_with(escaper))
    }
}

impl<T: Sanitize> Sanitize for Vec<T> {
    fn sanitize_with<E: Escape + ?Sized>(self, escaper: &E) -> Self {
        self.into_iter().map(|item| item.sanitize_with(escaper)).collect()
    }
}

impl<K: Sanitize + Ord, V: Sanitize> Sanitize for BTreeMap<K, V> {
    fn sanitize_with<E: Escape + ?Sized>(self, escaper: &E) -> Self {
        self.into_iter()
            .map(|(key, value)| (key.sanitize_with(escaper), value.sanitize_with(escaper)))
            .collect()
    }
}
