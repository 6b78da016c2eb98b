use crate::decode::{self, ILLEGAL_OPCODE, Instruction};
use crate::memory::Memory;
use crate::peripheral::{Exception, Peripheral};
use crate::sfr::*;

/// Program counter and cycle bookkeeping. Every other register (A, B, PSW,
/// SP, DPTR, ports) lives in the SFR bank of the [`Memory`] the CPU is
/// stepped against, and R0-R7 live in lower internal RAM.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cpu {
    pub pc: u16,
    /// Machine cycles executed since reset.
    pub cycles: u64,
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Power-on state: SFR bank cleared, SP=7, ports high, PC and cycle
    /// counter zero. Memory outside the SFR bank is left alone.
    pub fn reset(&mut self, mem: &mut Memory) {
        let sfr = mem.map().sfr;
        mem.fill(sfr, 0);
        mem.set_sfr(SFR_SP, 7);
        for port in [SFR_P0, SFR_P1, SFR_P2, SFR_P3] {
            mem.set_sfr(port, 0xFF);
        }
        self.pc = 0;
        self.cycles = 0;
    }

    /// Fetch, decode and execute one instruction.
    ///
    /// The PC and cycle counter are advanced before the instruction body
    /// runs, so they are up to date when a hook halts the simulation
    /// midway through an instruction.
    pub fn step<P: Peripheral>(&mut self, mem: &mut Memory, periph: &mut P) -> Result<(), P::Halt> {
        let pc = self.pc;
        let op = mem.code(pc);
        let b1 = mem.code(pc.wrapping_add(1));
        let b2 = mem.code(pc.wrapping_add(2));
        self.pc = pc.wrapping_add(decode::length(op) as u16);
        self.cycles += decode::cycles(op) as u64;

        let mut ctx = Context {
            cpu: self,
            mem: &mut *mem,
            periph: &mut *periph,
            pc,
        };
        let result = ctx.execute(op, b1, b2);

        let parity = mem.sfr(SFR_ACC).count_ones() & 1 == 1;
        let psw = mem.sfr(SFR_PSW);
        mem.set_sfr(SFR_PSW, (psw & !(1 << PSW_P)) | ((parity as u8) << PSW_P));
        result
    }

    pub fn decode_pc(&self, mem: &Memory) -> Instruction {
        decode::decode(mem, self.pc)
    }

    pub fn a(&self, mem: &Memory) -> u8 {
        mem.sfr(SFR_ACC)
    }

    pub fn b(&self, mem: &Memory) -> u8 {
        mem.sfr(SFR_B)
    }

    pub fn sp(&self, mem: &Memory) -> u8 {
        mem.sfr(SFR_SP)
    }

    pub fn dptr(&self, mem: &Memory) -> u16 {
        (mem.sfr(SFR_DPH) as u16) << 8 | mem.sfr(SFR_DPL) as u16
    }

    pub fn psw(&self, mem: &Memory, flag: u8) -> bool {
        mem.sfr(SFR_PSW) & (1 << flag) != 0
    }

    /// R0-R7 in the register bank selected by PSW.
    pub fn r(&self, mem: &Memory, x: u8) -> u8 {
        mem.idata((mem.sfr(SFR_PSW) & 0x18) | (x & 0x07))
    }
}

/// Everything one instruction can touch.
struct Context<'a, P: Peripheral> {
    cpu: &'a mut Cpu,
    mem: &'a mut Memory,
    periph: &'a mut P,
    /// Address of the instruction being executed.
    pc: u16,
}

impl<P: Peripheral> Context<'_, P> {
    #[inline(always)]
    fn a(&self) -> u8 {
        self.mem.sfr(SFR_ACC)
    }

    #[inline(always)]
    fn a_set(&mut self, value: u8) {
        self.mem.set_sfr(SFR_ACC, value);
    }

    fn flag(&self, flag: u8) -> bool {
        self.mem.sfr(SFR_PSW) & (1 << flag) != 0
    }

    fn flag_set(&mut self, flag: u8, value: bool) {
        let psw = self.mem.sfr(SFR_PSW);
        let psw = if value {
            psw | 1 << flag
        } else {
            psw & !(1 << flag)
        };
        self.mem.set_sfr(SFR_PSW, psw);
    }

    fn c(&self) -> bool {
        self.flag(PSW_C)
    }

    fn c_set(&mut self, value: bool) {
        self.flag_set(PSW_C, value);
    }

    fn arith_set(&mut self, (value, c, ov, ac): (u8, bool, bool, bool)) {
        self.a_set(value);
        self.c_set(c);
        self.flag_set(PSW_OV, ov);
        self.flag_set(PSW_AC, ac);
    }

    fn dptr(&self) -> u16 {
        (self.mem.sfr(SFR_DPH) as u16) << 8 | self.mem.sfr(SFR_DPL) as u16
    }

    fn dptr_set(&mut self, value: u16) {
        self.mem.set_sfr(SFR_DPH, (value >> 8) as u8);
        self.mem.set_sfr(SFR_DPL, value as u8);
    }

    fn r_addr(&self, x: u8) -> u8 {
        (self.mem.sfr(SFR_PSW) & 0x18) | (x & 0x07)
    }

    fn r(&self, x: u8) -> u8 {
        self.mem.idata(self.r_addr(x))
    }

    fn r_set(&mut self, x: u8, value: u8) {
        let addr = self.r_addr(x);
        self.mem.set_idata(addr, value);
    }

    /// `@Ri` operand.
    fn ind(&self, i: u8) -> u8 {
        self.mem.idata(self.r(i))
    }

    fn ind_set(&mut self, i: u8, value: u8) {
        let addr = self.r(i);
        self.mem.set_idata(addr, value);
    }

    /// `MOVX @Ri` address: P2 supplies the high byte.
    fn xdata_ri(&self, i: u8) -> u16 {
        (self.mem.sfr(SFR_P2) as u16) << 8 | self.r(i) as u16
    }

    fn read(&mut self, addr: u8) -> Result<u8, P::Halt> {
        if addr < 0x80 {
            Ok(self.mem.idata(addr))
        } else {
            self.periph.sfr_read(self.mem, addr)
        }
    }

    fn write(&mut self, addr: u8, value: u8) -> Result<(), P::Halt> {
        if addr < 0x80 {
            self.mem.set_idata(addr, value);
            Ok(())
        } else {
            self.mem.set_sfr(addr, value);
            self.periph.sfr_write(self.mem, addr)
        }
    }

    fn bit_location(bit: u8) -> (u8, u8) {
        let byte = if bit < 0x80 {
            0x20 + (bit >> 3)
        } else {
            bit & 0xF8
        };
        (byte, 1 << (bit & 0x07))
    }

    /// Bit test. SFR bits are read through the peripheral.
    fn bit(&mut self, bit: u8) -> Result<bool, P::Halt> {
        let (byte, mask) = Self::bit_location(bit);
        Ok(self.read(byte)? & mask != 0)
    }

    /// Stored bit value, used by read-modify-write bit instructions.
    fn bit_latch(&self, bit: u8) -> bool {
        let (byte, mask) = Self::bit_location(bit);
        let value = if byte < 0x80 {
            self.mem.idata(byte)
        } else {
            self.mem.sfr(byte)
        };
        value & mask != 0
    }

    fn bit_set(&mut self, bit: u8, value: bool) -> Result<(), P::Halt> {
        let (byte, mask) = Self::bit_location(bit);
        let old = if byte < 0x80 {
            self.mem.idata(byte)
        } else {
            self.mem.sfr(byte)
        };
        self.write(byte, if value { old | mask } else { old & !mask })
    }

    fn push(&mut self, value: u8) -> Result<(), P::Halt> {
        let sp = self.mem.sfr(SFR_SP).wrapping_add(1);
        self.mem.set_sfr(SFR_SP, sp);
        self.mem.set_idata(sp, value);
        if sp == 0 {
            self.raise(Exception::StackOverflow { pc: self.pc })?;
        }
        Ok(())
    }

    fn push16(&mut self, value: u16) -> Result<(), P::Halt> {
        self.push(value as u8)?;
        self.push((value >> 8) as u8)
    }

    fn pop(&mut self) -> u8 {
        let sp = self.mem.sfr(SFR_SP);
        self.mem.set_sfr(SFR_SP, sp.wrapping_sub(1));
        self.mem.idata(sp)
    }

    fn pop16(&mut self) -> u16 {
        let hi = self.pop();
        let lo = self.pop();
        (hi as u16) << 8 | lo as u16
    }

    fn raise(&mut self, exception: Exception) -> Result<(), P::Halt> {
        tracing::trace!("{exception}");
        self.periph.exception(self.mem, exception)
    }

    fn jump_rel(&mut self, rel: u8) {
        self.cpu.pc = self.cpu.pc.wrapping_add(rel as i8 as u16);
    }

    /// Operand of the accumulator arithmetic rows (x4..xF).
    fn alu_operand(&mut self, op: u8, b1: u8) -> Result<u8, P::Halt> {
        Ok(match op & 0x0F {
            0x04 => b1,
            0x05 => self.read(b1)?,
            0x06 | 0x07 => self.ind(op & 0x01),
            _ => self.r(op & 0x07),
        })
    }

    fn execute(&mut self, op: u8, b1: u8, b2: u8) -> Result<(), P::Halt> {
        let next = self.cpu.pc;
        let n = op & 0x07;
        let i = op & 0x01;

        match op {
            0x00 => {}
            _ if op & 0x0F == 0x01 => {
                let target = (next & 0xF800) | ((op as u16 & 0xE0) << 3) | b1 as u16;
                if op & 0x10 != 0 {
                    self.push16(next)?;
                }
                self.cpu.pc = target;
            }
            0x02 => self.cpu.pc = (b1 as u16) << 8 | b2 as u16,
            0x12 => {
                self.push16(next)?;
                self.cpu.pc = (b1 as u16) << 8 | b2 as u16;
            }
            0x22 | 0x32 => self.cpu.pc = self.pop16(),
            0x73 => self.cpu.pc = self.dptr().wrapping_add(self.a() as u16),
            0x80 => self.jump_rel(b1),

            // Conditional jumps
            0x40 | 0x50 => {
                if self.c() == (op == 0x40) {
                    self.jump_rel(b1);
                }
            }
            0x60 | 0x70 => {
                if (self.a() == 0) == (op == 0x60) {
                    self.jump_rel(b1);
                }
            }
            0x20 | 0x30 => {
                if self.bit(b1)? == (op == 0x20) {
                    self.jump_rel(b2);
                }
            }
            0x10 => {
                if self.bit_latch(b1) {
                    self.bit_set(b1, false)?;
                    self.jump_rel(b2);
                }
            }
            0xB4..=0xBF => {
                let (lhs, rhs) = match op {
                    0xB4 => (self.a(), b1),
                    0xB5 => (self.a(), self.read(b1)?),
                    0xB6 | 0xB7 => (self.ind(i), b1),
                    _ => (self.r(n), b1),
                };
                self.c_set(lhs < rhs);
                if lhs != rhs {
                    self.jump_rel(b2);
                }
            }
            0xD5 => {
                let value = self.read(b1)?.wrapping_sub(1);
                self.write(b1, value)?;
                if value != 0 {
                    self.jump_rel(b2);
                }
            }
            0xD8..=0xDF => {
                let value = self.r(n).wrapping_sub(1);
                self.r_set(n, value);
                if value != 0 {
                    self.jump_rel(b1);
                }
            }

            // Increment / decrement
            0x04 => self.a_set(self.a().wrapping_add(1)),
            0x05 => {
                let value = self.read(b1)?.wrapping_add(1);
                self.write(b1, value)?;
            }
            0x06 | 0x07 => self.ind_set(i, self.ind(i).wrapping_add(1)),
            0x08..=0x0F => self.r_set(n, self.r(n).wrapping_add(1)),
            0x14 => self.a_set(self.a().wrapping_sub(1)),
            0x15 => {
                let value = self.read(b1)?.wrapping_sub(1);
                self.write(b1, value)?;
            }
            0x16 | 0x17 => self.ind_set(i, self.ind(i).wrapping_sub(1)),
            0x18..=0x1F => self.r_set(n, self.r(n).wrapping_sub(1)),
            0xA3 => self.dptr_set(self.dptr().wrapping_add(1)),

            // Rotates and accumulator ops
            0x03 => self.a_set(self.a().rotate_right(1)),
            0x23 => self.a_set(self.a().rotate_left(1)),
            0x13 => {
                let (value, c) = rrc(self.a(), self.c());
                self.a_set(value);
                self.c_set(c);
            }
            0x33 => {
                let (value, c) = rlc(self.a(), self.c());
                self.a_set(value);
                self.c_set(c);
            }
            0xC4 => self.a_set(self.a().rotate_left(4)),
            0xE4 => self.a_set(0),
            0xF4 => self.a_set(!self.a()),
            0xD4 => {
                let (value, c) = decimal_adjust(self.a(), self.c(), self.flag(PSW_AC));
                self.a_set(value);
                self.c_set(c);
            }
            0xA4 => {
                let (a, b, ov) = mul(self.a(), self.mem.sfr(SFR_B));
                self.a_set(a);
                self.mem.set_sfr(SFR_B, b);
                self.c_set(false);
                self.flag_set(PSW_OV, ov);
            }
            0x84 => {
                match div(self.a(), self.mem.sfr(SFR_B)) {
                    Some((a, b)) => {
                        self.a_set(a);
                        self.mem.set_sfr(SFR_B, b);
                        self.flag_set(PSW_OV, false);
                    }
                    None => self.flag_set(PSW_OV, true),
                }
                self.c_set(false);
            }

            // Arithmetic
            0x24..=0x2F => {
                let value = self.alu_operand(op, b1)?;
                self.arith_set(add_with_carry(self.a(), value, false));
            }
            0x34..=0x3F => {
                let value = self.alu_operand(op, b1)?;
                self.arith_set(add_with_carry(self.a(), value, self.c()));
            }
            0x94..=0x9F => {
                let value = self.alu_operand(op, b1)?;
                self.arith_set(sub_with_borrow(self.a(), value, self.c()));
            }

            // Logic
            0x44..=0x4F => {
                let value = self.alu_operand(op, b1)?;
                self.a_set(self.a() | value);
            }
            0x54..=0x5F => {
                let value = self.alu_operand(op, b1)?;
                self.a_set(self.a() & value);
            }
            0x64..=0x6F => {
                let value = self.alu_operand(op, b1)?;
                self.a_set(self.a() ^ value);
            }
            0x42 | 0x43 | 0x52 | 0x53 | 0x62 | 0x63 => {
                let rhs = if op & 0x01 == 0 { self.a() } else { b2 };
                let lhs = self.read(b1)?;
                let value = match op & 0xF0 {
                    0x40 => lhs | rhs,
                    0x50 => lhs & rhs,
                    _ => lhs ^ rhs,
                };
                self.write(b1, value)?;
            }

            // Data transfer
            0x74 => self.a_set(b1),
            0x75 => self.write(b1, b2)?,
            0x76 | 0x77 => self.ind_set(i, b1),
            0x78..=0x7F => self.r_set(n, b1),
            0x85 => {
                let value = self.read(b1)?;
                self.write(b2, value)?;
            }
            0x86 | 0x87 => {
                let value = self.ind(i);
                self.write(b1, value)?;
            }
            0x88..=0x8F => {
                let value = self.r(n);
                self.write(b1, value)?;
            }
            0x90 => self.dptr_set((b1 as u16) << 8 | b2 as u16),
            0xA6 | 0xA7 => {
                let value = self.read(b1)?;
                self.ind_set(i, value);
            }
            0xA8..=0xAF => {
                let value = self.read(b1)?;
                self.r_set(n, value);
            }
            0xE5 => {
                if b1 == SFR_ACC {
                    self.raise(Exception::AccToA { pc: self.pc })?;
                }
                let value = self.read(b1)?;
                self.a_set(value);
            }
            0xE6 | 0xE7 => self.a_set(self.ind(i)),
            0xE8..=0xEF => self.a_set(self.r(n)),
            0xF5 => self.write(b1, self.a())?,
            0xF6 | 0xF7 => self.ind_set(i, self.a()),
            0xF8..=0xFF => self.r_set(n, self.a()),
            0xC0 => {
                let value = self.read(b1)?;
                self.push(value)?;
            }
            0xD0 => {
                let value = self.pop();
                self.write(b1, value)?;
            }
            0xC5 => {
                let value = self.read(b1)?;
                self.write(b1, self.a())?;
                self.a_set(value);
            }
            0xC6 | 0xC7 => {
                let value = self.ind(i);
                self.ind_set(i, self.a());
                self.a_set(value);
            }
            0xC8..=0xCF => {
                let value = self.r(n);
                self.r_set(n, self.a());
                self.a_set(value);
            }
            0xD6 | 0xD7 => {
                let value = self.ind(i);
                let a = self.a();
                self.ind_set(i, (value & 0xF0) | (a & 0x0F));
                self.a_set((a & 0xF0) | (value & 0x0F));
            }

            // Code and external memory
            0x83 => self.a_set(self.mem.code(next.wrapping_add(self.a() as u16))),
            0x93 => self.a_set(self.mem.code(self.dptr().wrapping_add(self.a() as u16))),
            0xE0 => self.a_set(self.mem.xdata(self.dptr())),
            0xE2 | 0xE3 => self.a_set(self.mem.xdata(self.xdata_ri(i))),
            0xF0 => self.mem.set_xdata(self.dptr(), self.a()),
            0xF2 | 0xF3 => self.mem.set_xdata(self.xdata_ri(i), self.a()),

            // Boolean
            0xC3 => self.c_set(false),
            0xD3 => self.c_set(true),
            0xB3 => self.c_set(!self.c()),
            0xC2 => self.bit_set(b1, false)?,
            0xD2 => self.bit_set(b1, true)?,
            0xB2 => self.bit_set(b1, !self.bit_latch(b1))?,
            0xA2 => {
                let value = self.bit(b1)?;
                self.c_set(value);
            }
            0x92 => self.bit_set(b1, self.c())?,
            0x82 | 0xB0 => {
                let value = self.bit(b1)? == (op == 0x82);
                self.c_set(self.c() & value);
            }
            0x72 | 0xA0 => {
                let value = self.bit(b1)? == (op == 0x72);
                self.c_set(self.c() | value);
            }

            ILLEGAL_OPCODE => self.raise(Exception::IllegalOpcode {
                pc: self.pc,
                opcode: op,
            })?,

            _ => unreachable!("opcode {op:02X} not covered"),
        }
        Ok(())
    }
}

fn decimal_adjust(a: u8, c: bool, ac: bool) -> (u8, bool) {
    let mut value = a as u16;
    if ac || (value & 0x0F) > 9 {
        value += 0x06;
    }
    if c || (value & 0x1F0) > 0x90 {
        value += 0x60;
    }
    // DA only ever sets carry.
    (value as u8, c || value > 0xFF)
}

#[inline(always)]
fn add_with_carry(a: u8, b: u8, c: bool) -> (u8, bool, bool, bool) {
    let ac = (a & 0x0F) + (b & 0x0F) + c as u8 > 0x0F;
    let sum = a as u16 + b as u16 + c as u16;
    let result = sum as u8;
    let ov = (!(a ^ b) & (a ^ result) & 0x80) != 0;
    (result, sum > 0xFF, ov, ac)
}

#[inline(always)]
fn sub_with_borrow(a: u8, b: u8, c: bool) -> (u8, bool, bool, bool) {
    let result = a.wrapping_sub(b).wrapping_sub(c as u8);
    let borrow = (a as u16) < b as u16 + c as u16;
    let ac = (a & 0x0F) < (b & 0x0F) + c as u8;
    let ov = ((a ^ b) & (a ^ result) & 0x80) != 0;
    (result, borrow, ov, ac)
}

#[inline(always)]
fn mul(a: u8, b: u8) -> (u8, u8, bool) {
    let product = a as u16 * b as u16;
    (product as u8, (product >> 8) as u8, product > 0xFF)
}

/// `None` on divide by zero, which leaves A and B undefined (unchanged here).
#[inline(always)]
fn div(a: u8, b: u8) -> Option<(u8, u8)> {
    (b != 0).then(|| (a / b, a % b))
}

#[inline(always)]
fn rlc(a: u8, c: bool) -> (u8, bool) {
    ((a << 1) | c as u8, a & 0x80 != 0)
}

#[inline(always)]
fn rrc(a: u8, c: bool) -> (u8, bool) {
    ((a >> 1) | ((c as u8) << 7), a & 0x01 != 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::SfrBank;

    #[derive(Default)]
    struct Recorder {
        reads: Vec<u8>,
        writes: Vec<(u8, u8)>,
        exceptions: Vec<Exception>,
    }

    impl Peripheral for Recorder {
        type Halt = Exception;

        fn sfr_read(&mut self, mem: &Memory, addr: u8) -> Result<u8, Exception> {
            self.reads.push(addr);
            Ok(mem.sfr(addr))
        }

        fn sfr_write(&mut self, mem: &mut Memory, addr: u8) -> Result<(), Exception> {
            self.writes.push((addr, mem.sfr(addr)));
            Ok(())
        }

        fn exception(&mut self, _mem: &mut Memory, exception: Exception) -> Result<(), Exception> {
            self.exceptions.push(exception);
            match exception {
                Exception::IllegalOpcode { .. } => Err(exception),
                _ => Ok(()),
            }
        }
    }

    fn load(program: &[u8]) -> (Cpu, Memory) {
        let mut mem = Memory::default();
        let mut cpu = Cpu::new();
        cpu.reset(&mut mem);
        for (i, b) in program.iter().enumerate() {
            mem.set_code(i as u16, *b);
        }
        (cpu, mem)
    }

    fn run(program: &[u8], steps: usize) -> (Cpu, Memory, Recorder) {
        let (mut cpu, mut mem) = load(program);
        let mut periph = Recorder::default();
        for _ in 0..steps {
            cpu.step(&mut mem, &mut periph).unwrap();
        }
        (cpu, mem, periph)
    }

    #[test]
    fn reset_state() {
        let (cpu, mem) = load(&[]);
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.sp(&mem), 7);
        assert_eq!(mem.sfr(SFR_P2), 0xFF);
        assert_eq!(cpu.a(&mem), 0);
    }

    #[test]
    fn add_sets_overflow_and_aux_carry() {
        // MOV A,#7F; ADD A,#01
        let (cpu, mem, _) = run(&[0x74, 0x7F, 0x24, 0x01], 2);
        assert_eq!(cpu.a(&mem), 0x80);
        assert!(cpu.psw(&mem, PSW_OV));
        assert!(cpu.psw(&mem, PSW_AC));
        assert!(!cpu.psw(&mem, PSW_C));
        assert!(cpu.psw(&mem, PSW_P));
        assert_eq!(cpu.cycles, 2);
    }

    #[test]
    fn decimal_adjust_after_bcd_add() {
        // MOV A,#09; ADD A,#08; DA A
        let (cpu, mem, _) = run(&[0x74, 0x09, 0x24, 0x08, 0xD4], 3);
        assert_eq!(cpu.a(&mem), 0x17);
        assert!(!cpu.psw(&mem, PSW_C));

        // MOV A,#99; ADD A,#01; DA A
        let (cpu, mem, _) = run(&[0x74, 0x99, 0x24, 0x01, 0xD4], 3);
        assert_eq!(cpu.a(&mem), 0x00);
        assert!(cpu.psw(&mem, PSW_C));
    }

    #[test]
    fn subb_borrows() {
        // CLR C; CLR A; SUBB A,#01
        let (cpu, mem, _) = run(&[0xC3, 0xE4, 0x94, 0x01], 3);
        assert_eq!(cpu.a(&mem), 0xFF);
        assert!(cpu.psw(&mem, PSW_C));
        assert!(!cpu.psw(&mem, PSW_OV));
    }

    #[test]
    fn plain_bank_ignores_exceptions() {
        // A5; MOV 90H,#5A; MOV A,90H
        let (mut cpu, mut mem) = load(&[ILLEGAL_OPCODE, 0x75, 0x90, 0x5A, 0xE5, 0x90]);
        for _ in 0..3 {
            cpu.step(&mut mem, &mut SfrBank).unwrap();
        }
        assert_eq!(cpu.pc, 6);
        assert_eq!(cpu.cycles, 1 + 2 + 1);
        assert_eq!(cpu.a(&mem), 0x5A);
    }

    #[test]
    fn mul_and_div() {
        // MOV A,#20; MOV B,#10; MUL AB
        let (cpu, mem, _) = run(&[0x74, 0x20, 0x75, 0xF0, 0x10, 0xA4], 3);
        assert_eq!((cpu.a(&mem), cpu.b(&mem)), (0x00, 0x02));
        assert!(cpu.psw(&mem, PSW_OV));
        assert_eq!(cpu.cycles, 1 + 2 + 4);

        // MOV A,#64; MOV B,#07; DIV AB
        let (cpu, mem, _) = run(&[0x74, 0x64, 0x75, 0xF0, 0x07, 0x84], 3);
        assert_eq!((cpu.a(&mem), cpu.b(&mem)), (14, 2));
        assert!(!cpu.psw(&mem, PSW_OV));
    }

    #[test]
    fn call_and_return_use_the_stack() {
        // LCALL 0010 ... 0010: RET
        let mut program = vec![0x12, 0x00, 0x10];
        program.resize(0x10, 0x00);
        program.push(0x22);

        let (cpu, mem, _) = run(&program, 1);
        assert_eq!(cpu.pc, 0x0010);
        assert_eq!(cpu.sp(&mem), 9);
        assert_eq!(mem.idata(8), 0x03);
        assert_eq!(mem.idata(9), 0x00);

        let (cpu, mem, _) = run(&program, 2);
        assert_eq!(cpu.pc, 0x0003);
        assert_eq!(cpu.sp(&mem), 7);
    }

    #[test]
    fn movx_through_ri_uses_p2_as_page() {
        // MOV P2,#12; MOV R0,#34; MOV A,#99; MOVX @R0,A
        let (_, mem, _) = run(&[0x75, 0xA0, 0x12, 0x78, 0x34, 0x74, 0x99, 0xF2], 4);
        assert_eq!(mem.xdata(0x1234), 0x99);
    }

    #[test]
    fn djnz_loop_counts_cycles() {
        // MOV R2,#03; DJNZ R2,$
        let (cpu, mem, _) = run(&[0x7A, 0x03, 0xDA, 0xFE], 4);
        assert_eq!(cpu.pc, 0x0004);
        assert_eq!(cpu.r(&mem, 2), 0);
        assert_eq!(cpu.cycles, 1 + 3 * 2);
    }

    #[test]
    fn register_bank_follows_psw() {
        // MOV PSW,#08; MOV R0,#55
        let (cpu, mem, _) = run(&[0x75, 0xD0, 0x08, 0x78, 0x55], 2);
        assert_eq!(mem.idata(0x08), 0x55);
        assert_eq!(mem.idata(0x00), 0x00);
        assert_eq!(cpu.r(&mem, 0), 0x55);
    }

    #[test]
    fn bit_operations_on_ram_and_sfr() {
        // SETB 00H; JB 00H,+1; NOP; SETB ACC.7; MOV C,ACC.7
        let (cpu, mem, periph) =
            run(&[0xD2, 0x00, 0x20, 0x00, 0x01, 0x00, 0xD2, 0xE7, 0xA2, 0xE7], 4);
        assert_eq!(mem.idata(0x20), 0x01);
        assert_eq!(cpu.a(&mem), 0x80);
        assert!(cpu.psw(&mem, PSW_C));
        assert_eq!(periph.writes, vec![(SFR_ACC, 0x80)]);
        assert_eq!(periph.reads, vec![SFR_ACC]);
    }

    #[test]
    fn direct_sfr_access_goes_through_peripheral() {
        // MOV 99H,#41; MOV A,86H
        let (_, _, periph) = run(&[0x75, 0x99, 0x41, 0xE5, 0x86], 2);
        assert_eq!(periph.writes, vec![(0x99, 0x41)]);
        assert_eq!(periph.reads, vec![0x86]);
    }

    #[test]
    fn upper_idata_is_indirect_only() {
        // MOV R0,#90; MOV @R0,#AA; MOV 90H,#BB
        let (_, mem, periph) = run(&[0x78, 0x90, 0x76, 0xAA, 0x75, 0x90, 0xBB], 3);
        assert_eq!(mem.idata(0x90), 0xAA);
        assert_eq!(mem.sfr(0x90), 0xBB);
        assert_eq!(periph.writes, vec![(0x90, 0xBB)]);
    }

    #[test]
    fn illegal_opcode_halts_after_one_cycle() {
        let (mut cpu, mut mem) = load(&[ILLEGAL_OPCODE]);
        let mut periph = Recorder::default();
        let halt = cpu.step(&mut mem, &mut periph);
        assert_eq!(
            halt,
            Err(Exception::IllegalOpcode {
                pc: 0,
                opcode: ILLEGAL_OPCODE
            })
        );
        assert_eq!(cpu.pc, 1);
        assert_eq!(cpu.cycles, 1);
    }

    #[test]
    fn stack_wrap_is_reported_but_not_fatal() {
        // MOV SP,#FF; PUSH ACC
        let (cpu, mem, periph) = run(&[0x75, 0x81, 0xFF, 0xC0, 0xE0], 2);
        assert_eq!(cpu.sp(&mem), 0);
        assert_eq!(periph.exceptions, vec![Exception::StackOverflow { pc: 3 }]);
    }

    #[test]
    fn cjne_sets_carry_when_less() {
        // MOV A,#10; CJNE A,#20,+2
        let (cpu, mem, _) = run(&[0x74, 0x10, 0xB4, 0x20, 0x02], 2);
        assert!(cpu.psw(&mem, PSW_C));
        assert_eq!(cpu.pc, 0x0007);
    }

    #[test]
    fn movc_reads_tables() {
        // MOV DPTR,#0008; MOV A,#01; MOVC A,@A+DPTR
        let (cpu, mem, _) = run(&[0x90, 0x00, 0x08, 0x74, 0x01, 0x93, 0, 0, 0x11, 0x22], 3);
        assert_eq!(cpu.a(&mem), 0x22);
    }
}
