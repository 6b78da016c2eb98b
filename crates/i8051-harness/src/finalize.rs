//! End-of-run cycle report and program memory snapshot.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use i8051::Memory;

use crate::error::HarnessError;

/// Nominal core clock used for the elapsed-time estimate.
pub const CLOCK_HZ: f64 = 28_000_000.0;

/// Bytes of program memory written to the snapshot.
pub const SNAPSHOT_LEN: usize = 0x8000;

pub const DEFAULT_SNAPSHOT: &str = "dump.bin";

/// `Cycles: <n>, <ms> ms`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub cycles: u64,
}

impl Report {
    pub fn millis(&self) -> f64 {
        self.cycles as f64 * 1000.0 / CLOCK_HZ
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cycles: {}, {:.3} ms", self.cycles, self.millis())
    }
}

/// The first [`SNAPSHOT_LEN`] bytes of code memory.
pub fn snapshot(mem: &Memory) -> Vec<u8> {
    (0..SNAPSHOT_LEN as u16).map(|addr| mem.code(addr)).collect()
}

/// Print the cycle report to `diag` and write the code snapshot to `path`.
pub fn finish(cycles: u64, mem: &Memory, path: &Path, diag: &mut impl Write) -> Result<(), HarnessError> {
    writeln!(diag, "{}", Report { cycles })?;
    fs::write(path, snapshot(mem)).map_err(|source| HarnessError::Snapshot {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "snapshot written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_scales_by_clock() {
        assert_eq!(Report { cycles: 1 }.to_string(), "Cycles: 1, 0.000 ms");
        assert_eq!(Report { cycles: 28_000 }.to_string(), "Cycles: 28000, 1.000 ms");
        assert_eq!(Report { cycles: 42_000_000 }.to_string(), "Cycles: 42000000, 1500.000 ms");
    }

    #[test]
    fn writes_first_32k_of_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.bin");
        let mut mem = Memory::default();
        mem.set_code(0, 0xA5);
        mem.set_code(0x7FFF, 0x11);
        mem.set_code(0x8000, 0x22);

        let mut diag = Vec::new();
        finish(3, &mem, &path, &mut diag).unwrap();

        let written = fs::read(&path).unwrap();
        assert_eq!(written.len(), SNAPSHOT_LEN);
        assert_eq!((written[0], written[0x7FFF]), (0xA5, 0x11));
        assert_eq!(String::from_utf8(diag).unwrap(), "Cycles: 3, 0.000 ms\n");
    }

    #[test]
    fn unwritable_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("dump.bin");
        let err = finish(0, &Memory::default(), &path, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, HarnessError::Snapshot { .. }));
    }
}
