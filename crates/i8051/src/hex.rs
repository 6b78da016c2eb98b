//! Intel HEX object loading into code memory.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

use crate::memory::Memory;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read object file: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: not an Intel HEX record")]
    Format { line: usize },
    #[error("line {line}: unsupported record type {kind:02X}")]
    RecordType { line: usize, kind: u8 },
    #[error("line {line}: checksum mismatch (expected {expected:02X}, found {found:02X})")]
    Checksum { line: usize, expected: u8, found: u8 },
    #[error("line {line}: malformed record")]
    Malformed { line: usize },
    #[error("missing end-of-file record")]
    MissingEof,
}

impl LoadError {
    /// Numeric code reported on the command line.
    pub fn code(&self) -> i32 {
        match self {
            Self::Io(_) => -1,
            Self::Format { .. } => -2,
            Self::RecordType { .. } => -3,
            Self::Checksum { .. } => -4,
            Self::Malformed { .. } | Self::MissingEof => -5,
        }
    }
}

/// Load an Intel HEX file into code memory. Returns the number of data bytes
/// written.
pub fn load_file(mem: &mut Memory, path: impl AsRef<Path>) -> Result<usize, LoadError> {
    let text = fs::read_to_string(path)?;
    load_str(mem, &text)
}

/// Load Intel HEX text into code memory. Only data (00) and end-of-file (01)
/// records are accepted; anything after the end-of-file record is ignored.
pub fn load_str(mem: &mut Memory, text: &str) -> Result<usize, LoadError> {
    let mut loaded = 0;
    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(record) = line.strip_prefix(':') else {
            return Err(LoadError::Format { line: line_no });
        };
        let bytes = parse_hex_bytes(record).ok_or(LoadError::Malformed { line: line_no })?;
        if bytes.len() < 5 || bytes.len() != bytes[0] as usize + 5 {
            return Err(LoadError::Malformed { line: line_no });
        }

        let (body, checksum) = bytes.split_at(bytes.len() - 1);
        let expected = body
            .iter()
            .fold(0u8, |acc, b| acc.wrapping_add(*b))
            .wrapping_neg();
        if expected != checksum[0] {
            return Err(LoadError::Checksum {
                line: line_no,
                expected,
                found: checksum[0],
            });
        }

        let address = (body[1] as u16) << 8 | body[2] as u16;
        match body[3] {
            0x00 => {
                for (offset, value) in body[4..].iter().enumerate() {
                    mem.set_code(address.wrapping_add(offset as u16), *value);
                }
                loaded += body.len() - 4;
            }
            0x01 => return Ok(loaded),
            kind => return Err(LoadError::RecordType { line: line_no, kind }),
        }
    }
    Err(LoadError::MissingEof)
}

fn parse_hex_bytes(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.is_ascii() {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}
