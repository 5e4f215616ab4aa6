//! Path segment encoding for database and table names.
//!
//! Database and table names may contain anything the engine accepts, so they
//! are escaped before being used as a directory or file name. The rules are
//! the engine's own file name escaping, which keeps the backup layout aligned
//! with the engine's `data/` directory:
//!
//! - ASCII letters, digits and `_` are kept as-is,
//! - every other byte of the UTF-8 encoding becomes `%XX` (uppercase hex).
//!
//! The transform is stable and reversible with [`decode`].

use crate::error::{ErrorKind, Result};
use exn::ResultExt;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn is_safe(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Escape a database or table name for use as a single path segment.
///
/// # Examples
///
/// ```
/// use chbackup_metadata::{decode_path, encode_path};
///
/// assert_eq!(encode_path("sales"), "sales");
/// assert_eq!(encode_path("my-db.v2"), "my%2Ddb%2Ev2");
/// assert_eq!(decode_path("my%2Ddb%2Ev2").unwrap(), "my-db.v2");
/// ```
pub fn encode(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for &byte in name.as_bytes() {
        if is_safe(byte) {
            encoded.push(char::from(byte));
        } else {
            encoded.push('%');
            encoded.push(char::from(HEX[usize::from(byte >> 4)]));
            encoded.push(char::from(HEX[usize::from(byte & 0x0F)]));
        }
    }
    encoded
}

/// Reverse [`encode`].
///
/// Lowercase hex digits are accepted. Returns
/// [`InvalidEncoding`](ErrorKind::InvalidEncoding) for truncated or non-hex
/// escapes, and for byte sequences that aren't UTF-8.
pub fn decode(encoded: &str) -> Result<String> {
    let invalid = || ErrorKind::InvalidEncoding(encoded.to_string());
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            decoded.push(bytes[i]);
            i += 1;
            continue;
        }
        let (Some(high), Some(low)) = (bytes.get(i + 1).and_then(hex_value), bytes.get(i + 2).and_then(hex_value))
        else {
            exn::bail!(invalid());
        };
        decoded.push((high << 4) | low);
        i += 3;
    }
    String::from_utf8(decoded).or_raise(invalid)
}

fn hex_value(byte: &u8) -> Option<u8> {
    char::from(*byte).to_digit(16).and_then(|d| u8::try_from(d).ok())
}
