//! Per-instruction execution trace.

use std::fmt::Write as _;
use std::io::{self, Write};

use i8051::sfr::{SFR_ACC, SFR_P2, SFR_PSW};
use i8051::{Cpu, Memory};

/// When trace lines are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Trace {
    #[default]
    Off,
    Always,
    /// Off until PC first reaches the address, then on for the rest of the
    /// run.
    From(u16),
}

impl Trace {
    /// Whether the instruction at `pc` should be traced. Arms a pending
    /// [`Trace::From`] trigger when `pc` matches it.
    pub fn active(&mut self, pc: u16) -> bool {
        match *self {
            Self::Off => false,
            Self::Always => true,
            Self::From(addr) if addr == pc => {
                *self = Self::Always;
                true
            }
            Self::From(_) => false,
        }
    }
}

/// Trace line for the instruction at the current PC, showing machine state
/// before it executes. Reads bypass the peripheral, so tracing never consumes
/// UART input.
pub fn format_line(cpu: &Cpu, mem: &Memory) -> String {
    let insn = cpu.decode_pc(mem);
    let mut bytes = String::with_capacity(6);
    for b in &insn.bytes {
        let _ = write!(bytes, "{b:02x}");
    }
    let pad = "  ".repeat(3usize.saturating_sub(insn.len()));

    let r0 = mem.idata(0);
    let p2 = mem.sfr(SFR_P2);
    let stack_top = (mem.xdata(u16::from_be_bytes([p2, r0])) as u16) << 8 | mem.idata(r0) as u16;

    format!(
        "{:04x}: {bytes}{pad}\t\t{:<25}\t\tDS[r0]={stack_top:04x} tos={:04x} sp={:02x} r0={r0:02x} ACC={:02x} PSW={:08b} P2={p2:04x}",
        cpu.pc,
        insn.mnemonic,
        cpu.dptr(mem),
        cpu.sp(mem),
        mem.sfr(SFR_ACC),
        mem.sfr(SFR_PSW),
    )
}

pub fn write_line(out: &mut impl Write, cpu: &Cpu, mem: &Memory) -> io::Result<()> {
    writeln!(out, "{}", format_line(cpu, mem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use i8051::sfr::SFR_DPL;

    #[test]
    fn trigger_latches_on() {
        let mut trace = Trace::From(0x0100);
        assert!(!trace.active(0x0000));
        assert!(trace.active(0x0100));
        assert!(trace.active(0x0002));
        assert!(!Trace::Off.active(0));
        assert!(Trace::Always.active(0xFFFF));
    }

    #[test]
    fn line_layout() {
        let mut mem = Memory::default();
        for (i, b) in [0x75, 0xC1, 0x41].into_iter().enumerate() {
            mem.set_code(i as u16, b);
        }
        mem.set_sfr(SFR_ACC, 0x12);
        mem.set_sfr(SFR_PSW, 0x81);
        mem.set_sfr(SFR_DPL, 0x34);
        mem.set_sfr(0x81, 0x07);
        let line = format_line(&Cpu::new(), &mem);
        assert_eq!(
            line,
            format!(
                "0000: 75c141\t\t{:<25}\t\tDS[r0]=7500 tos=0034 sp=07 r0=00 ACC=12 PSW=10000001 P2=0000",
                "MOV U0DBUF,#41"
            )
        );
    }

    #[test]
    fn short_instructions_are_padded() {
        let mut mem = Memory::default();
        mem.set_code(0, 0x00);
        let line = format_line(&Cpu::new(), &mem);
        assert!(line.starts_with("0000: 00    \t\tNOP "), "{line}");
    }

    #[test]
    fn stack_top_combines_xdata_and_idata() {
        let mut mem = Memory::default();
        mem.set_idata(0, 0x90);
        mem.set_idata(0x90, 0xCD);
        mem.set_sfr(SFR_P2, 0x02);
        mem.set_xdata(0x0290, 0xAB);
        let line = format_line(&Cpu::new(), &mem);
        assert!(line.contains("DS[r0]=abcd "), "{line}");
        assert!(line.contains("r0=90 "), "{line}");
        assert!(line.ends_with("P2=0002"), "{line}");
    }
}
