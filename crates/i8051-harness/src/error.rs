use std::io;
use std::path::PathBuf;

use i8051::hex::LoadError;
use i8051::memory::LayoutError;
use thiserror::Error;

/// Why the UART peripheral stopped the core.
#[derive(Debug, Error)]
pub enum Stop {
    #[error("end of input")]
    EndOfInput,
    #[error("illegal opcode {opcode:02X} at {pc:04X}")]
    IllegalOpcode { pc: u16, opcode: u8 },
    #[error("uart i/o: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("load obj error {}: {}", .0.code(), .0)]
    Load(#[from] LoadError),
    #[error("invalid memory layout: {0}")]
    Layout(#[from] LayoutError),
    #[error("cannot write snapshot {}: {source}", path.display())]
    Snapshot { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_carry_their_code() {
        let err = HarnessError::from(LoadError::MissingEof);
        assert_eq!(err.to_string(), "load obj error -5: missing end-of-file record");
    }
}
