//! Canonical printable escaping of arbitrary byte slices, used by the Where Renderer's
//! byte window and by the Submatch Debug Driver's source-position prints.

use std::fmt::Write as _;

/// Escape a single byte using the same rules libmagic-style debuggers use: printable
/// ASCII passes through untouched, a handful of control characters get a short mnemonic,
/// and everything else becomes `\xHH`.
pub fn escape_byte(byte: u8) -> String {
    match byte {
        b'\n' => "\\n".to_string(),
        b'\t' => "\\t".to_string(),
        b'\r' => "\\r".to_string(),
        0 => "\\0".to_string(),
        b'\\' => "\\\\".to_string(),
        0x20..=0x7e => (byte as char).to_string(),
        other => {
            let mut s = String::with_capacity(4);
            let _ = write!(s, "\\x{other:02X}");
            s
        }
    }
}

/// Escape a byte slice, concatenating each byte's rendering in order.
pub fn escape_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len());
    for &b in data {
        out.push_str(&escape_byte(b));
    }
    out
}
