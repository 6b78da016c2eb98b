//! Console harness for running 8051 firmware against a target memory map.
//!
//! A [`Target`] selects the [`HardwareProfile`]: where internal RAM and the
//! SFR bank live and which SFR is the UART data register. The [`Driver`]
//! steps the core until PC reaches [`driver::HALT_PC`] or the
//! [`UartHarness`] stops it, and the caller decides whether to finalize.

pub mod driver;
pub mod error;
pub mod finalize;
pub mod profile;
pub mod trace;
pub mod uart;

pub use driver::{Driver, Outcome};
pub use error::{HarnessError, Stop};
pub use profile::{HardwareProfile, Target};
pub use trace::Trace;
pub use uart::UartHarness;
