//! Simulated address spaces.
//!
//! All address spaces live in a single owned buffer. Each logical space is a
//! [`Region`] (offset and length) into that buffer, so targets whose buses
//! alias one another (the CC2541 maps its SFRs and internal RAM into XDATA)
//! are expressed as overlapping regions rather than overlapping pointers.

use thiserror::Error;

use crate::sfr::SFR_BASE;

/// A window into the backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub offset: usize,
    pub len: usize,
}

impl Region {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// One past the last byte of the region within the backing buffer.
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Returns the region starting `offset` bytes into this one.
    pub const fn sub(&self, offset: usize, len: usize) -> Self {
        Self::new(self.offset + offset, len)
    }

    /// Whether `other` lies entirely inside this region.
    pub const fn contains(&self, other: &Region) -> bool {
        other.offset >= self.offset && other.end() <= self.end()
    }

    pub const fn overlaps(&self, other: &Region) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }

    #[inline(always)]
    fn index(&self, addr: usize) -> usize {
        // Lengths are powers of two, so out-of-range addresses wrap the way
        // the address decoder of a small part would.
        self.offset + (addr & (self.len - 1))
    }
}

/// Placement of every address space inside the backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    /// Program memory (`MOVC`, instruction fetch).
    pub code: Region,
    /// External data memory (`MOVX`).
    pub xdata: Region,
    /// Internal RAM 0x00-0x7F (direct and indirect).
    pub lower: Region,
    /// Internal RAM 0x80-0xFF (indirect only).
    pub upper: Region,
    /// Special function registers 0x80-0xFF (direct only).
    pub sfr: Region,
}

impl MemoryMap {
    /// Backing buffer size for [`MemoryMap::standard`].
    pub const STANDARD_SIZE: usize = 0x10180;

    /// 64K of program memory shared with XDATA, followed by independent
    /// lower, upper and SFR banks of 128 bytes each.
    pub const fn standard() -> Self {
        Self {
            code: Region::new(0, 0x10000),
            xdata: Region::new(0, 0x10000),
            lower: Region::new(0x10000, 0x80),
            upper: Region::new(0x10080, 0x80),
            sfr: Region::new(0x10100, 0x80),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("{name} region {offset:#x}..{end:#x} exceeds the {size:#x}-byte buffer")]
    OutOfBounds {
        name: &'static str,
        offset: usize,
        end: usize,
        size: usize,
    },
    #[error("{name} region length {len:#x} is not a power of two")]
    BadLength { name: &'static str, len: usize },
}

pub struct Memory {
    bytes: Box<[u8]>,
    map: MemoryMap,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            bytes: vec![0; MemoryMap::STANDARD_SIZE].into_boxed_slice(),
            map: MemoryMap::standard(),
        }
    }
}

impl Memory {
    /// Allocate `size` bytes filled with `fill` and lay out the address
    /// spaces according to `map`.
    pub fn new(size: usize, fill: u8, map: MemoryMap) -> Result<Self, LayoutError> {
        for (name, region) in [
            ("code", map.code),
            ("xdata", map.xdata),
            ("lower", map.lower),
            ("upper", map.upper),
            ("sfr", map.sfr),
        ] {
            if !region.len.is_power_of_two() {
                return Err(LayoutError::BadLength {
                    name,
                    len: region.len,
                });
            }
            if region.end() > size {
                return Err(LayoutError::OutOfBounds {
                    name,
                    offset: region.offset,
                    end: region.end(),
                    size,
                });
            }
        }
        Ok(Self {
            bytes: vec![fill; size].into_boxed_slice(),
            map,
        })
    }

    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    /// Size of the backing buffer.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn region(&self, region: Region) -> &[u8] {
        &self.bytes[region.offset..region.end()]
    }

    pub fn region_mut(&mut self, region: Region) -> &mut [u8] {
        &mut self.bytes[region.offset..region.end()]
    }

    pub fn fill(&mut self, region: Region, value: u8) {
        self.region_mut(region).fill(value);
    }

    #[inline(always)]
    pub fn code(&self, addr: u16) -> u8 {
        self.bytes[self.map.code.index(addr as usize)]
    }

    pub fn set_code(&mut self, addr: u16, value: u8) {
        let index = self.map.code.index(addr as usize);
        self.bytes[index] = value;
    }

    #[inline(always)]
    pub fn xdata(&self, addr: u16) -> u8 {
        self.bytes[self.map.xdata.index(addr as usize)]
    }

    #[inline(always)]
    pub fn set_xdata(&mut self, addr: u16, value: u8) {
        let index = self.map.xdata.index(addr as usize);
        self.bytes[index] = value;
    }

    /// Indirect internal RAM: 0x00-0x7F hits the lower window, 0x80-0xFF the
    /// upper window.
    #[inline(always)]
    pub fn idata(&self, addr: u8) -> u8 {
        if addr < 0x80 {
            self.bytes[self.map.lower.index(addr as usize)]
        } else {
            self.bytes[self.map.upper.index((addr - 0x80) as usize)]
        }
    }

    #[inline(always)]
    pub fn set_idata(&mut self, addr: u8, value: u8) {
        let index = if addr < 0x80 {
            self.map.lower.index(addr as usize)
        } else {
            self.map.upper.index((addr - 0x80) as usize)
        };
        self.bytes[index] = value;
    }

    /// The stored SFR value, bypassing any peripheral.
    #[inline(always)]
    pub fn sfr(&self, addr: u8) -> u8 {
        self.bytes[self.map.sfr.index(addr.wrapping_sub(SFR_BASE) as usize)]
    }

    #[inline(always)]
    pub fn set_sfr(&mut self, addr: u8, value: u8) {
        let index = self.map.sfr.index(addr.wrapping_sub(SFR_BASE) as usize);
        self.bytes[index] = value;
    }
}
