use std::convert::Infallible;
use std::fmt;

use crate::memory::Memory;

/// Abnormal conditions the core reports while stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    /// The reserved opcode 0xA5 was fetched.
    IllegalOpcode { pc: u16, opcode: u8 },
    /// A push wrapped SP past 0xFF.
    StackOverflow { pc: u16 },
    /// `ACC` was addressed as a direct byte where the `A` form exists.
    AccToA { pc: u16 },
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalOpcode { pc, opcode } => {
                write!(f, "illegal opcode {opcode:02X} at {pc:04X}")
            }
            Self::StackOverflow { pc } => write!(f, "stack overflow at {pc:04X}"),
            Self::AccToA { pc } => write!(f, "ACC used as direct operand at {pc:04X}"),
        }
    }
}

/// Hooks the core calls synchronously while executing an instruction.
///
/// Every direct read of an SFR goes through [`Peripheral::sfr_read`]. Writes
/// store the value into the SFR bank first and then call
/// [`Peripheral::sfr_write`], so the hook sees the value already in place.
/// Any hook may ask the core to stop by returning `Err(Self::Halt)`; the
/// request propagates out of [`crate::Cpu::step`] unchanged.
pub trait Peripheral {
    /// Reason a hook stopped the simulation.
    type Halt;

    /// Returns the value the core should observe at `addr` (0x80-0xFF).
    fn sfr_read(&mut self, mem: &Memory, addr: u8) -> Result<u8, Self::Halt> {
        Ok(mem.sfr(addr))
    }

    /// Called after `addr` was written.
    fn sfr_write(&mut self, _mem: &mut Memory, _addr: u8) -> Result<(), Self::Halt> {
        Ok(())
    }

    fn exception(&mut self, _mem: &mut Memory, _exception: Exception) -> Result<(), Self::Halt> {
        Ok(())
    }
}

/// Plain SFR storage with no side effects and no way to halt.
#[derive(Debug, Default, Clone, Copy)]
pub struct SfrBank;

impl Peripheral for SfrBank {
    type Halt = Infallible;
}

impl<P: Peripheral + ?Sized> Peripheral for &mut P {
    type Halt = P::Halt;

    fn sfr_read(&mut self, mem: &Memory, addr: u8) -> Result<u8, Self::Halt> {
        (**self).sfr_read(mem, addr)
    }

    fn sfr_write(&mut self, mem: &mut Memory, addr: u8) -> Result<(), Self::Halt> {
        (**self).sfr_write(mem, addr)
    }

    fn exception(&mut self, mem: &mut Memory, exception: Exception) -> Result<(), Self::Halt> {
        (**self).exception(mem, exception)
    }
}
