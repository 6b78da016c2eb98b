//! The run loop tying core, profile and UART together.

use std::io::{Read, Write};
use std::path::Path;

use i8051::{Cpu, Memory, hex};

use crate::error::{HarnessError, Stop};
use crate::finalize;
use crate::profile::HardwareProfile;
use crate::trace::{self, Trace};
use crate::uart::UartHarness;

/// PC value that ends the run cleanly.
pub const HALT_PC: u16 = 0xFFFF;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// PC reached [`HALT_PC`].
    Halted,
    /// The UART ran out of input.
    EndOfInput,
    IllegalOpcode { pc: u16, opcode: u8 },
}

impl Outcome {
    /// Whether the cycle report and snapshot are produced for this outcome.
    pub fn finalizes(&self) -> bool {
        !matches!(self, Self::Halted)
    }
}

pub struct Driver<R, W> {
    pub cpu: Cpu,
    pub mem: Memory,
    pub uart: UartHarness<R, W>,
    trace: Trace,
}

impl<R: Read, W: Write> Driver<R, W> {
    /// Configure memory for `profile` and reset the core.
    pub fn new(profile: &HardwareProfile, input: R, output: W) -> Result<Self, HarnessError> {
        let mut cpu = Cpu::new();
        let mem = profile.power_on(&mut cpu)?;
        Ok(Self {
            cpu,
            mem,
            uart: UartHarness::new(profile.uart_data, input, output),
            trace: Trace::Off,
        })
    }

    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = trace;
        self
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize, HarnessError> {
        let path = path.as_ref();
        let loaded = hex::load_file(&mut self.mem, path)?;
        tracing::info!(path = %path.display(), loaded, "object loaded");
        Ok(loaded)
    }

    /// Step until PC reaches [`HALT_PC`] or the UART stops the core.
    pub fn run(&mut self) -> Result<Outcome, HarnessError> {
        while self.cpu.pc != HALT_PC {
            if self.trace.active(self.cpu.pc) {
                trace::write_line(self.uart.output_mut(), &self.cpu, &self.mem)?;
            }
            match self.cpu.step(&mut self.mem, &mut self.uart) {
                Ok(()) => {}
                Err(Stop::EndOfInput) => return Ok(Outcome::EndOfInput),
                Err(Stop::IllegalOpcode { pc, opcode }) => {
                    return Ok(Outcome::IllegalOpcode { pc, opcode });
                }
                Err(Stop::Io(e)) => return Err(e.into()),
            }
        }
        Ok(Outcome::Halted)
    }

    /// Report cycles to `diag` and write the snapshot to `path`.
    pub fn finalize(&mut self, path: &Path, diag: &mut impl Write) -> Result<(), HarnessError> {
        self.uart.flush()?;
        finalize::finish(self.cpu.cycles, &self.mem, path, diag)
    }

    pub fn flush(&mut self) -> Result<(), HarnessError> {
        Ok(self.uart.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Target;
    use i8051::hex::load_str;
    use std::io;

    fn driver(target: Target, program: &str, input: &'static [u8]) -> Driver<&'static [u8], Vec<u8>> {
        let mut driver = Driver::new(&target.profile(), input, Vec::new()).unwrap();
        load_str(&mut driver.mem, program).unwrap();
        driver
    }

    #[test]
    fn halts_at_sentinel() {
        // MOV U0DBUF,#41; LJMP FFFF
        let mut d = driver(Target::Cc1110, ":0600000075C14102FFFF83\n:00000001FF\n", b"");
        assert_eq!(d.run().unwrap(), Outcome::Halted);
        assert_eq!(d.cpu.pc, HALT_PC);
        assert_eq!(d.cpu.cycles, 2 + 2);
        assert_eq!(d.uart.output_mut().as_slice(), &[0x41]);
        assert!(!Outcome::Halted.finalizes());
    }

    #[test]
    fn illegal_opcode_stops_after_one_cycle() {
        let mut d = driver(Target::Generic, ":01000000A55A\n:00000001FF\n", b"");
        let outcome = d.run().unwrap();
        assert_eq!(outcome, Outcome::IllegalOpcode { pc: 0, opcode: 0xA5 });
        assert!(outcome.finalizes());
        assert_eq!(d.cpu.cycles, 1);
    }

    #[test]
    fn echo_until_end_of_input() {
        // loop: MOV A,SBUF; MOV SBUF,A; SJMP loop
        let mut d = driver(Target::Generic, ":06000000E599F59980FA74\n:00000001FF\n", b"hi\n");
        assert_eq!(d.run().unwrap(), Outcome::EndOfInput);
        assert_eq!(d.uart.output_mut().as_slice(), b"hi\r");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn output_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = Driver::new(&Target::Generic.profile(), &b"x"[..], BrokenPipe).unwrap();
        load_str(&mut d.mem, ":06000000E599F59980FA74\n:00000001FF\n").unwrap();

        let err = d.run().unwrap_err();
        assert!(
            matches!(&err, HarnessError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe),
            "{err:?}"
        );
        // MOV A,SBUF; MOV SBUF,A stopped mid-instruction.
        assert_eq!(d.cpu.pc, 4);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn trace_lines_precede_uart_output() {
        let mut d = driver(Target::Cc1110, ":0600000075C14102FFFF83\n:00000001FF\n", b"")
            .with_trace(Trace::Always);
        d.run().unwrap();
        let out = String::from_utf8_lossy(d.uart.output_mut()).into_owned();
        let lines = out.split('\n').collect::<Vec<_>>();
        assert!(lines[0].starts_with("0000: 75c141\t\tMOV U0DBUF,#41"), "{out}");
        // The transmitted byte shares stdout with the trace.
        assert!(lines[1].starts_with("A0003: 02ffff\t\tLJMP FFFF"), "{out}");
    }

    #[test]
    fn finalize_writes_report_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.bin");
        let mut d = driver(Target::Generic, ":01000000A55A\n:00000001FF\n", b"");
        d.run().unwrap();
        let mut diag = Vec::new();
        d.finalize(&path, &mut diag).unwrap();
        assert_eq!(String::from_utf8(diag).unwrap(), "Cycles: 1, 0.000 ms\n");
        assert_eq!(std::fs::read(&path).unwrap()[0], 0xA5);
    }
}
