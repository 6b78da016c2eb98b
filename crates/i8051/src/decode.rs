//! Opcode-indexed instruction table: lengths, machine cycles and
//! disassembly.

use std::fmt;

use crate::memory::Memory;
use crate::sfr;

/// The reserved MCS-51 opcode.
pub const ILLEGAL_OPCODE: u8 = 0xA5;

/// A direct-addressed byte operand.
struct Direct(u8);

impl fmt::Display for Direct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match sfr::name(self.0) {
            Some(name) if self.0 >= 0x80 => f.write_str(name),
            _ => write!(f, "{:02X}H", self.0),
        }
    }
}

/// A bit-addressed operand. Bits 0x00-0x7F live in RAM 0x20-0x2F, bits
/// 0x80-0xFF in the SFRs whose address ends in 0 or 8.
struct Bit(u8);

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bit = self.0 & 0x07;
        if self.0 < 0x80 {
            write!(f, "{:02X}H.{bit}", 0x20 + (self.0 >> 3))
        } else {
            write!(f, "{}.{bit}", Direct(self.0 & 0xF8))
        }
    }
}

/// Instruction length in bytes, including the opcode.
pub const fn length(op: u8) -> u8 {
    match op {
        0x02 | 0x10 | 0x12 | 0x20 | 0x30 | 0x43 | 0x53 | 0x63 | 0x75 | 0x85 | 0x90
        | 0xB4..=0xBF | 0xD5 => 3,
        _ if op & 0x0F == 0x01 => 2,
        0x05 | 0x15 | 0x24 | 0x25 | 0x34 | 0x35 | 0x40 | 0x42 | 0x44 | 0x45 | 0x50 | 0x52
        | 0x54 | 0x55 | 0x60 | 0x62 | 0x64 | 0x65 | 0x70 | 0x72 | 0x74 | 0x76..=0x7F | 0x80
        | 0x82 | 0x86..=0x8F | 0x92 | 0x94 | 0x95 | 0xA0 | 0xA2 | 0xA6..=0xAF | 0xB0 | 0xB2
        | 0xC0 | 0xC2 | 0xC5 | 0xD0 | 0xD2 | 0xD8..=0xDF | 0xE5 | 0xF5 => 2,
        _ => 1,
    }
}

/// Machine cycles taken by the instruction.
pub const fn cycles(op: u8) -> u8 {
    match op {
        0x84 | 0xA4 => 4,
        _ if op & 0x0F == 0x01 => 2,
        0x02 | 0x10 | 0x12 | 0x20 | 0x22 | 0x30 | 0x32 | 0x40 | 0x43 | 0x50 | 0x53 | 0x60
        | 0x63 | 0x70 | 0x72 | 0x73 | 0x75 | 0x80 | 0x82 | 0x83 | 0x85..=0x8F | 0x90 | 0x92
        | 0x93 | 0xA0 | 0xA3 | 0xA6..=0xAF | 0xB0 | 0xB4..=0xBF | 0xC0 | 0xD0 | 0xD5
        | 0xD8..=0xDF | 0xE0 | 0xE2 | 0xE3 | 0xF0 | 0xF2 | 0xF3 => 2,
        _ => 1,
    }
}

/// A decoded instruction.
///
/// `{}` prints the mnemonic; `{:#}` prints address, bytes and mnemonic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub pc: u16,
    pub bytes: Vec<u8>,
    pub mnemonic: String,
}

impl Instruction {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            let bytes = self
                .bytes
                .iter()
                .map(|b| format!("{b:02X}"))
                .collect::<Vec<_>>()
                .join(" ");
            write!(f, "{:04X}: {bytes:<9} {}", self.pc, self.mnemonic)
        } else {
            f.write_str(&self.mnemonic)
        }
    }
}

/// Decode the instruction at `pc` in code memory.
pub fn decode(mem: &Memory, pc: u16) -> Instruction {
    let op = mem.code(pc);
    let len = length(op) as u16;
    let bytes = (0..len)
        .map(|i| mem.code(pc.wrapping_add(i)))
        .collect::<Vec<_>>();
    let b1 = bytes.get(1).copied().unwrap_or_default();
    let b2 = bytes.get(2).copied().unwrap_or_default();
    let next = pc.wrapping_add(len);

    let rel = |offset: u8| format!("{:04X}", next.wrapping_add(offset as i8 as u16));
    let addr11 = (next & 0xF800) | ((op as u16 & 0xE0) << 3) | b1 as u16;
    let addr16 = (b1 as u16) << 8 | b2 as u16;
    let n = op & 0x07;
    let i = op & 0x01;

    // Second operand of the accumulator arithmetic rows (x4..xF).
    let alu_src = || match op & 0x0F {
        0x04 => format!("#{b1:02X}"),
        0x05 => Direct(b1).to_string(),
        0x06 | 0x07 => format!("@R{i}"),
        _ => format!("R{n}"),
    };

    let mnemonic = match op {
        0x00 => "NOP".to_string(),
        _ if op & 0x1F == 0x01 => format!("AJMP {addr11:04X}"),
        _ if op & 0x1F == 0x11 => format!("ACALL {addr11:04X}"),
        0x02 => format!("LJMP {addr16:04X}"),
        0x03 => "RR A".to_string(),
        0x04 => "INC A".to_string(),
        0x05 => format!("INC {}", Direct(b1)),
        0x06 | 0x07 => format!("INC @R{i}"),
        0x08..=0x0F => format!("INC R{n}"),
        0x10 => format!("JBC {},{}", Bit(b1), rel(b2)),
        0x12 => format!("LCALL {addr16:04X}"),
        0x13 => "RRC A".to_string(),
        0x14 => "DEC A".to_string(),
        0x15 => format!("DEC {}", Direct(b1)),
        0x16 | 0x17 => format!("DEC @R{i}"),
        0x18..=0x1F => format!("DEC R{n}"),
        0x20 => format!("JB {},{}", Bit(b1), rel(b2)),
        0x22 => "RET".to_string(),
        0x23 => "RL A".to_string(),
        0x24..=0x2F => format!("ADD A,{}", alu_src()),
        0x30 => format!("JNB {},{}", Bit(b1), rel(b2)),
        0x32 => "RETI".to_string(),
        0x33 => "RLC A".to_string(),
        0x34..=0x3F => format!("ADDC A,{}", alu_src()),
        0x40 => format!("JC {}", rel(b1)),
        0x42 => format!("ORL {},A", Direct(b1)),
        0x43 => format!("ORL {},#{b2:02X}", Direct(b1)),
        0x44..=0x4F => format!("ORL A,{}", alu_src()),
        0x50 => format!("JNC {}", rel(b1)),
        0x52 => format!("ANL {},A", Direct(b1)),
        0x53 => format!("ANL {},#{b2:02X}", Direct(b1)),
        0x54..=0x5F => format!("ANL A,{}", alu_src()),
        0x60 => format!("JZ {}", rel(b1)),
        0x62 => format!("XRL {},A", Direct(b1)),
        0x63 => format!("XRL {},#{b2:02X}", Direct(b1)),
        0x64..=0x6F => format!("XRL A,{}", alu_src()),
        0x70 => format!("JNZ {}", rel(b1)),
        0x72 => format!("ORL C,{}", Bit(b1)),
        0x73 => "JMP @A+DPTR".to_string(),
        0x74 => format!("MOV A,#{b1:02X}"),
        0x75 => format!("MOV {},#{b2:02X}", Direct(b1)),
        0x76 | 0x77 => format!("MOV @R{i},#{b1:02X}"),
        0x78..=0x7F => format!("MOV R{n},#{b1:02X}"),
        0x80 => format!("SJMP {}", rel(b1)),
        0x82 => format!("ANL C,{}", Bit(b1)),
        0x83 => "MOVC A,@A+PC".to_string(),
        0x84 => "DIV AB".to_string(),
        0x85 => format!("MOV {},{}", Direct(b2), Direct(b1)),
        0x86 | 0x87 => format!("MOV {},@R{i}", Direct(b1)),
        0x88..=0x8F => format!("MOV {},R{n}", Direct(b1)),
        0x90 => format!("MOV DPTR,#{addr16:04X}"),
        0x92 => format!("MOV {},C", Bit(b1)),
        0x93 => "MOVC A,@A+DPTR".to_string(),
        0x94..=0x9F => format!("SUBB A,{}", alu_src()),
        0xA0 => format!("ORL C,/{}", Bit(b1)),
        0xA2 => format!("MOV C,{}", Bit(b1)),
        0xA3 => "INC DPTR".to_string(),
        0xA4 => "MUL AB".to_string(),
        ILLEGAL_OPCODE => "???".to_string(),
        0xA6 | 0xA7 => format!("MOV @R{i},{}", Direct(b1)),
        0xA8..=0xAF => format!("MOV R{n},{}", Direct(b1)),
        0xB0 => format!("ANL C,/{}", Bit(b1)),
        0xB2 => format!("CPL {}", Bit(b1)),
        0xB3 => "CPL C".to_string(),
        0xB4 => format!("CJNE A,#{b1:02X},{}", rel(b2)),
        0xB5 => format!("CJNE A,{},{}", Direct(b1), rel(b2)),
        0xB6 | 0xB7 => format!("CJNE @R{i},#{b1:02X},{}", rel(b2)),
        0xB8..=0xBF => format!("CJNE R{n},#{b1:02X},{}", rel(b2)),
        0xC0 => format!("PUSH {}", Direct(b1)),
        0xC2 => format!("CLR {}", Bit(b1)),
        0xC3 => "CLR C".to_string(),
        0xC4 => "SWAP A".to_string(),
        0xC5 => format!("XCH A,{}", Direct(b1)),
        0xC6 | 0xC7 => format!("XCH A,@R{i}"),
        0xC8..=0xCF => format!("XCH A,R{n}"),
        0xD0 => format!("POP {}", Direct(b1)),
        0xD2 => format!("SETB {}", Bit(b1)),
        0xD3 => "SETB C".to_string(),
        0xD4 => "DA A".to_string(),
        0xD5 => format!("DJNZ {},{}", Direct(b1), rel(b2)),
        0xD6 | 0xD7 => format!("XCHD A,@R{i}"),
        0xD8..=0xDF => format!("DJNZ R{n},{}", rel(b1)),
        0xE0 => "MOVX A,@DPTR".to_string(),
        0xE2 | 0xE3 => format!("MOVX A,@R{i}"),
        0xE4 => "CLR A".to_string(),
        0xE5 => format!("MOV A,{}", Direct(b1)),
        0xE6 | 0xE7 => format!("MOV A,@R{i}"),
        0xE8..=0xEF => format!("MOV A,R{n}"),
        0xF0 => "MOVX @DPTR,A".to_string(),
        0xF2 | 0xF3 => format!("MOVX @R{i},A"),
        0xF4 => "CPL A".to_string(),
        0xF5 => format!("MOV {},A", Direct(b1)),
        0xF6 | 0xF7 => format!("MOV @R{i},A"),
        0xF8..=0xFF => format!("MOV R{n},A"),
        // Every opcode with low nibble 1 is AJMP/ACALL, handled above.
        _ => unreachable!("opcode {op:02X} not covered"),
    };

    Instruction {
        pc,
        bytes,
        mnemonic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn code(bytes: &[u8]) -> Memory {
        let mut mem = Memory::default();
        for (i, b) in bytes.iter().enumerate() {
            mem.set_code(0x100 + i as u16, *b);
        }
        mem
    }

    #[test]
    fn decodes_operands() {
        let mem = code(&[0x75, 0xC1, 0x41]);
        let insn = decode(&mem, 0x100);
        assert_eq!(insn.bytes, vec![0x75, 0xC1, 0x41]);
        assert_eq!(insn.to_string(), "MOV U0DBUF,#41");
        assert_eq!(format!("{insn:#}"), "0100: 75 C1 41  MOV U0DBUF,#41");
    }

    #[test]
    fn mov_direct_direct_is_source_first_in_encoding() {
        let mem = code(&[0x85, 0x30, 0xA0]);
        assert_eq!(decode(&mem, 0x100).mnemonic, "MOV P2,30H");
    }

    #[test]
    fn relative_and_absolute_targets() {
        let mem = code(&[0x80, 0xFE, 0xD2, 0xE7, 0x61, 0x23, 0x30, 0x0A, 0x03]);
        assert_eq!(decode(&mem, 0x100).mnemonic, "SJMP 0100");
        assert_eq!(decode(&mem, 0x102).mnemonic, "SETB ACC.7");
        assert_eq!(decode(&mem, 0x104).mnemonic, "AJMP 0323");
        assert_eq!(decode(&mem, 0x106).mnemonic, "JNB 21H.2,010C");
    }

    #[test]
    fn table_is_consistent() {
        assert_eq!((0..=255u8).filter(|op| length(*op) == 3).count(), 24);
        assert_eq!(length(ILLEGAL_OPCODE), 1);
        assert_eq!(cycles(0xA4), 4);
        assert_eq!(cycles(0x00), 1);
        assert_eq!(cycles(0xE0), 2);
    }

    #[rstest]
    #[case::nop(&[0x00], "NOP", 1)]
    #[case::clr(&[0xE4], "CLR A", 1)]
    #[case::mov_imm(&[0x74, 0x41], "MOV A,#41", 1)]
    #[case::mov_acc(&[0xE5, 0xE0], "MOV A,ACC", 1)]
    #[case::dptr(&[0x90, 0x12, 0x34], "MOV DPTR,#1234", 2)]
    #[case::movx(&[0xE0], "MOVX A,@DPTR", 2)]
    #[case::div(&[0x84], "DIV AB", 4)]
    #[case::djnz(&[0xD8, 0xFE], "DJNZ R0,0100", 2)]
    #[case::illegal(&[ILLEGAL_OPCODE], "???", 1)]
    fn table_row(#[case] bytes: &[u8], #[case] mnemonic: &str, #[case] cycle_count: u8) {
        let insn = decode(&code(bytes), 0x100);
        assert_eq!(insn.mnemonic, mnemonic);
        assert_eq!(insn.bytes, bytes);
        assert_eq!(insn.opcode(), bytes[0]);
        assert_eq!(length(insn.opcode()) as usize, insn.len());
        assert_eq!(cycles(insn.opcode()), cycle_count);
    }
}
