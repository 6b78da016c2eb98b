//! An MCS-51 (8051) instruction core.
//!
//! Memory is a single owned buffer carved into regions (see [`memory`]), and
//! SFR side effects are delegated to a [`Peripheral`] that may stop the
//! simulation by returning its own halt reason from any hook.

mod cpu;
pub mod decode;
pub mod hex;
pub mod memory;
pub mod peripheral;
pub mod sfr;

pub use cpu::Cpu;
pub use decode::Instruction;
pub use memory::{Memory, MemoryMap, Region};
pub use peripheral::{Exception, Peripheral, SfrBank};
