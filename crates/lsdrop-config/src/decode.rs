//! Text decoding for the address config file.
//!
//! The file is historically written as UTF-16LE. Byte order marks are honoured; a
//! BOM-less file containing NUL bytes is treated as UTF-16LE, anything else as UTF-8.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

const BOM_UTF8: &[u8] = &[0xEF, 0xBB, 0xBF];
const BOM_UTF16_LE: &[u8] = &[0xFF, 0xFE];
const BOM_UTF16_BE: &[u8] = &[0xFE, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// Read and decode the entire config file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] when the file cannot be read and
/// [`ConfigError::Decode`] when its bytes are not valid text.
pub fn read_config_file(path: &Path) -> ConfigResult<String> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode_config_text(&bytes, path)
}

/// Decode raw config bytes into text. `path` is only used for error context.
///
/// # Errors
///
/// Returns [`ConfigError::Decode`] for malformed UTF-8 or UTF-16 content.
pub fn decode_config_text(bytes: &[u8], path: &Path) -> ConfigResult<String> {
    let (encoding, body) = detect(bytes);
    debug!(?encoding, len = body.len(), "decoding config text");
    match encoding {
        TextEncoding::Utf8 => String::from_utf8(body.to_vec()).map_err(|_| ConfigError::Decode {
            path: path.to_path_buf(),
            reason: "invalid UTF-8 sequence",
        }),
        TextEncoding::Utf16Le => decode_utf16(body, path, u16::from_le_bytes),
        TextEncoding::Utf16Be => decode_utf16(body, path, u16::from_be_bytes),
    }
}

fn detect(bytes: &[u8]) -> (TextEncoding, &[u8]) {
    if let Some(rest) = bytes.strip_prefix(BOM_UTF8) {
        (TextEncoding::Utf8, rest)
    } else if let Some(rest) = bytes.strip_prefix(BOM_UTF16_LE) {
        (TextEncoding::Utf16Le, rest)
    } else if let Some(rest) = bytes.strip_prefix(BOM_UTF16_BE) {
        (TextEncoding::Utf16Be, rest)
    } else if bytes.contains(&0) {
        (TextEncoding::Utf16Le, bytes)
    } else {
        (TextEncoding::Utf8, bytes)
    }
}

fn decode_utf16(bytes: &[u8], path: &Path, unit: fn([u8; 2]) -> u16) -> ConfigResult<String> {
    if !bytes.len().is_multiple_of(2) {
        return Err(ConfigError::Decode {
            path: path.to_path_buf(),
            reason: "odd byte count for UTF-16 text",
        });
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| ConfigError::Decode {
        path: path.to_path_buf(),
        reason: "invalid UTF-16 sequence",
    })
}
