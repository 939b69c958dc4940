//! Front end: source text to validated in-memory descriptions.
//!
//! Both parsers record recoverable problems in the diagnostic sink and keep
//! going; they only return `Err(Aborted)` when the top-level header is missing.

pub mod lexer;
pub mod lvl;
pub mod tset;

use std::path::Path;

use crate::diagnostics::{Aborted, DiagnosticSink, ErrorKind, Reporter};

/// C64 palette names accepted wherever a color is expected.
pub const COLOR_NAMES: [(&str, u8); 19] = [
    ("black", 0),
    ("white", 1),
    ("red", 2),
    ("cyan", 3),
    ("purple", 4),
    ("green", 5),
    ("blue", 6),
    ("yellow", 7),
    ("orange", 8),
    ("brown", 9),
    ("lightred", 10),
    ("darkgray", 11),
    ("darkgrey", 11),
    ("gray", 12),
    ("grey", 12),
    ("lightgreen", 13),
    ("lightblue", 14),
    ("lightgray", 15),
    ("lightgrey", 15),
];

/// `$1F`, `0x1F`, `0b101`, `0o17` or decimal. A leading `-` is kept so range
/// checks can report negative values instead of a parse failure.
pub fn parse_num(s: &str) -> Option<i64> {
    let s = s.trim();
    let (neg, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = if let Some(hex) = body.strip_prefix('$') {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else if let Some(oct) = body.strip_prefix("0o").or_else(|| body.strip_prefix("0O")) {
        i64::from_str_radix(oct, 8).ok()?
    } else if !body.is_empty() && body.chars().all(|c| c.is_ascii_digit()) {
        body.parse::<i64>().ok()?
    } else {
        return None;
    };
    Some(if neg { -value } else { value })
}

/// Palette name (case, `_`, `-` and spaces ignored) or a number.
pub fn parse_color(s: &str) -> Option<i64> {
    let key: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .map(|c| c.to_ascii_lowercase())
        .collect();
    COLOR_NAMES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, v)| i64::from(*v))
        .or_else(|| parse_num(s))
}

/// A single letter maps to its position in the alphabet (A=1 .. Z=26),
/// matching the screen codes of the built-in charset.
pub fn parse_char_or_num(s: &str) -> Option<i64> {
    let s = s.trim();
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return Some(i64::from(c.to_ascii_uppercase() as u8 - b'A' + 1));
        }
    }
    parse_num(s)
}

/// Exactly `count` comma-separated values.
pub fn parse_list(
    s: &str,
    count: usize,
    parse: impl Fn(&str) -> Option<i64>,
) -> Result<Vec<i64>, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != count {
        return Err(format!("Expected {count} values, got {}: {s}", parts.len()));
    }
    parts
        .iter()
        .map(|p| parse(p).ok_or_else(|| format!("Invalid value {p:?} in: {s}")))
        .collect()
}

/// `WxH` with both parts plain integers.
pub fn parse_size(s: &str) -> Option<(i64, i64)> {
    let lower = s.to_ascii_lowercase();
    let (w, h) = lower.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

/// Read a source file, recording an I/O diagnostic instead of failing.
pub fn read_source(path: &Path, sink: &mut dyn DiagnosticSink) -> Result<String, Aborted> {
    std::fs::read_to_string(path).map_err(|e| {
        let message = match e.kind() {
            std::io::ErrorKind::NotFound => "Input file not found".to_string(),
            std::io::ErrorKind::PermissionDenied => "Permission denied reading file".to_string(),
            std::io::ErrorKind::InvalidData => format!("File encoding error: {e}"),
            _ => format!("Error reading file: {e}"),
        };
        Reporter::new(sink, path).error(ErrorKind::Io, 1, 1, message);
        Aborted("unreadable input")
    })
}
