//! Memory topology and UART wiring for each supported target.

use std::fmt;

use clap::ValueEnum;
use i8051::memory::{LayoutError, Memory, MemoryMap, Region};
use i8051::sfr::{SFR_SBUF, SFR_U0DBUF, SFR_U1DBUF};
use i8051::Cpu;

/// Value flash reads back as when erased.
pub const ERASED: u8 = 0xFF;

/// XDATA offset of the CC2541 flash information page copy.
pub const CC2541_INFO_PAGE_ADDR: u16 = 0xDF00;

/// Factory calibration and lock-bit values that CC2541 firmware reads from
/// XDATA 0xDF00. There is no persistent information page, so the emulator
/// seeds it with these bytes.
pub const CC2541_INFO_PAGE: [u8; 256] = [
    0xD3, 0x91, 0xFF, 0x04, 0x45, 0x00, 0x00, 0x0F, 0x00, 0x1E, 0xC4, 0xEC, 0x8C, 0x22, 0x02, 0x22,
    0xF8, 0x47, 0x07, 0x30, 0x04, 0x76, 0x6C, 0x03, 0x40, 0x91, 0x56, 0x10, 0xA9, 0x0A, 0x20, 0x0D,
    0x59, 0x3F, 0x3F, 0x88, 0x11, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC6, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x03, 0x00, 0x7F, 0x80, 0x01, 0x00, 0x94, 0x00, 0x00,
    0x00, 0x78, 0x00, 0x00, 0x00, 0x00, 0x93, 0xE2, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC7, 0x00, 0x00, 0x0C, 0x00, 0x06, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1D, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x03, 0x70, 0x6B, 0x87, 0x08, 0x44, 0x00, 0x00, 0x00, 0x00, 0x2A, 0x00, 0x12, 0x00, 0x0F,
    0x00, 0x00, 0x00, 0x08, 0x33, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x68, 0x90,
    0x00, 0x0A, 0x22, 0x00, 0x02, 0x0C, 0x88, 0x01, 0x00, 0x00, 0x00, 0x08, 0x40, 0x00, 0x40, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x40, 0x40, 0x00, 0x00, 0x00, 0x08, 0x40, 0x00, 0x40, 0x00,
    0x00, 0x00, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
];

/// Hardware target selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    /// Plain 8051: UART on SBUF, independent internal RAM.
    Generic,
    /// TI CC1110: UART0 on U0DBUF, internal RAM mapped at XDATA 0xFF00.
    Cc1110,
    /// TI CC2541 (HM-10): UART1 on U1DBUF, SFRs and internal RAM mapped into
    /// XDATA.
    Cc2541,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Generic => "generic",
            Self::Cc1110 => "cc1110",
            Self::Cc2541 => "cc2541",
        })
    }
}

/// Everything that differs between targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareProfile {
    pub target: Target,
    /// Size of the backing buffer all regions live in.
    pub size: usize,
    /// Initial contents of the backing buffer.
    pub fill: u8,
    pub map: MemoryMap,
    /// SFR address of the UART data register.
    pub uart_data: u8,
    /// Erase code memory after reset. Targets whose code memory doubles as
    /// SFR and data storage are pre-filled instead.
    pub erase_after_reset: bool,
    /// Block copied into XDATA once memory is set up.
    pub info_page: Option<(u16, &'static [u8])>,
}

impl Target {
    pub fn profile(self) -> HardwareProfile {
        match self {
            Self::Generic => HardwareProfile {
                target: self,
                size: MemoryMap::STANDARD_SIZE,
                fill: 0,
                map: MemoryMap::standard(),
                uart_data: SFR_SBUF,
                erase_after_reset: true,
                info_page: None,
            },
            Self::Cc1110 => {
                let xdata = Region::new(0, 0x10000);
                HardwareProfile {
                    target: self,
                    size: 0x10080,
                    fill: 0,
                    map: MemoryMap {
                        code: xdata,
                        xdata,
                        lower: xdata.sub(0xFF00, 0x80),
                        upper: xdata.sub(0xFF80, 0x80),
                        sfr: Region::new(0x10000, 0x80),
                    },
                    uart_data: SFR_U0DBUF,
                    erase_after_reset: true,
                    info_page: None,
                }
            }
            Self::Cc2541 => {
                // 96K buffer: 64K of code at the bottom, XDATA is the 64K
                // window starting at 0x8000 (upper code bank visible at XDATA
                // 0x0000-0x7FFF).
                let xdata = Region::new(0x8000, 0x10000);
                HardwareProfile {
                    target: self,
                    size: 0x18000,
                    fill: ERASED,
                    map: MemoryMap {
                        code: Region::new(0, 0x10000),
                        xdata,
                        lower: xdata.sub(0x1F00, 0x80),
                        upper: xdata.sub(0x1F80, 0x80),
                        sfr: xdata.sub(0x7080, 0x80),
                    },
                    uart_data: SFR_U1DBUF,
                    erase_after_reset: false,
                    info_page: Some((CC2541_INFO_PAGE_ADDR, &CC2541_INFO_PAGE)),
                }
            }
        }
    }
}

impl HardwareProfile {
    /// Allocate the backing buffer and reset the CPU against it, leaving
    /// memory ready for an object load.
    pub fn power_on(&self, cpu: &mut Cpu) -> Result<Memory, LayoutError> {
        let mut mem = Memory::new(self.size, self.fill, self.map)?;
        cpu.reset(&mut mem);
        if self.erase_after_reset {
            mem.fill(self.map.code, ERASED);
        }
        if let Some((addr, block)) = self.info_page {
            for (offset, value) in block.iter().enumerate() {
                mem.set_xdata(addr.wrapping_add(offset as u16), *value);
            }
        }
        tracing::info!(
            target = %self.target,
            size = mem.size(),
            uart = self.uart_data,
            "memory configured"
        );
        Ok(mem)
    }
}
