use crate::error::{CacheError, Result};
use std::path::{Path, PathBuf};

/// Name of the per-directory metadata file.
pub const METADATA_FILENAME: &str = ".cache";

/// Extension of per-key entry files.
pub const ENTRY_EXTENSION: &str = "cache";

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Path of the entry file for an encoded key: `<dir>/<escaped>.cache`.
pub fn entry_path(dir: &Path, encoded_key: &str) -> Result<PathBuf> {
    if encoded_key.is_empty() {
        return Err(CacheError::InvalidKey {
            key: String::new(),
            reason: "encoded key is empty".to_string(),
        });
    }
    Ok(dir.join(format!("{}.{ENTRY_EXTENSION}", escape_key(encoded_key))))
}

/// Reversible, filesystem-safe form of a key string.
///
/// Only `[A-Za-z0-9_-]` pass through; every other byte (including `.` and `%`)
/// becomes `%XX`, so distinct keys never collide and no escaped key can name
/// the metadata file or a relative path component.
pub fn escape_key(key: &str) -> String {
    let bytes = key.as_bytes();
    let encoded_bytes = bytes.iter().filter(|&&b| !is_safe(b)).count();
    let mut out = String::with_capacity(key.len() + 2 * encoded_bytes);
    for &b in bytes {
        if is_safe(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

/// Inverse of [`escape_key`]. Returns `None` for malformed escapes or non UTF-8 output.
pub(crate) fn unescape_key(escaped: &str) -> Option<String> {
    let bytes = escaped.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = *bytes.get(i + 1)?;
                let lo = *bytes.get(i + 2)?;
                out.push((from_hex(hi)? << 4) | from_hex(lo)?);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).ok()
}

/// Recover the encoded key from an entry file name, if it is one.
pub fn key_from_file_name(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(ENTRY_EXTENSION)?.strip_suffix('.')?;
    if stem.is_empty() {
        return None;
    }
    unescape_key(stem)
}

fn is_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn from_hex(b: u8) -> Option<u8> {
    Some(match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => 10 + (b - b'a'),
        b'A'..=b'F' => 10 + (b - b'A'),
        _ => return None,
    })
}
