//! SFR (special-function register) addresses for the i8051 microcontroller
//! and the TI CC111x/CC254x derivatives the harness targets.

/// Base address for SFRs: 0x80
pub const SFR_BASE: u8 = 0x80;
/// Port 0 register: 8-bit bidirectional I/O port
pub const SFR_P0: u8 = 0x80;
/// Stack pointer register: points to the top of the stack in internal RAM
pub const SFR_SP: u8 = 0x81;
/// Data pointer low byte: low byte of the 16-bit data pointer (DPTR)
pub const SFR_DPL: u8 = 0x82;
/// Data pointer high byte: high byte of the 16-bit data pointer (DPTR)
pub const SFR_DPH: u8 = 0x83;
/// Power control register: controls power management features
pub const SFR_PCON: u8 = 0x87;
/// Timer/counter control register: controls timer 0 and timer 1 operation
pub const SFR_TCON: u8 = 0x88;
/// Timer/counter mode register: sets operating modes for timer 0 and timer 1
pub const SFR_TMOD: u8 = 0x89;
/// Timer 0 low byte
pub const SFR_TL0: u8 = 0x8A;
/// Timer 1 low byte
pub const SFR_TL1: u8 = 0x8B;
/// Timer 0 high byte
pub const SFR_TH0: u8 = 0x8C;
/// Timer 1 high byte
pub const SFR_TH1: u8 = 0x8D;
/// Port 1 register: 8-bit bidirectional I/O port
pub const SFR_P1: u8 = 0x90;
/// Serial control register: controls serial port operation
pub const SFR_SCON: u8 = 0x98;
/// Serial buffer register: holds data for serial transmission/reception
pub const SFR_SBUF: u8 = 0x99;
/// Port 2 register: also the high address byte for `MOVX @Ri`
pub const SFR_P2: u8 = 0xA0;
/// Interrupt enable register
pub const SFR_IE: u8 = 0xA8;
/// Port 3 register: 8-bit bidirectional I/O port
pub const SFR_P3: u8 = 0xB0;
/// Interrupt priority register
pub const SFR_IP: u8 = 0xB8;
/// Timer 2 control register
pub const SFR_T2CON: u8 = 0xC8;
/// Program status word: contains processor status flags
pub const SFR_PSW: u8 = 0xD0;
/// Accumulator register: primary working register for arithmetic operations
pub const SFR_ACC: u8 = 0xE0;
/// B register: secondary working register used in multiplication/division
pub const SFR_B: u8 = 0xF0;

/// CC111x/CC254x USART 0 control and status
pub const SFR_U0CSR: u8 = 0x86;
/// CC111x/CC254x external memory page for `MOVX @Ri`
pub const SFR_MPAGE: u8 = 0x93;
/// CC1110 USART 0 receive/transmit data buffer
pub const SFR_U0DBUF: u8 = 0xC1;
/// CC111x/CC254x interrupt flags 2 (holds `UTX0IF`/`UTX1IF`)
pub const SFR_IRCON2: u8 = 0xE8;
/// CC2541 USART 1 control and status
pub const SFR_U1CSR: u8 = 0xF8;
/// CC2541 USART 1 receive/transmit data buffer
pub const SFR_U1DBUF: u8 = 0xF9;

/// Carry flag: indicates carry from/to the most significant bit
pub const PSW_C: u8 = 0x07;
/// Auxiliary carry flag: indicates carry from/to the fourth bit
pub const PSW_AC: u8 = 0x06;
/// User-defined flag 0
pub const PSW_F0: u8 = 0x05;
/// Register bank select 1
pub const PSW_RS1: u8 = 0x04;
/// Register bank select 0
pub const PSW_RS0: u8 = 0x03;
/// Overflow flag
pub const PSW_OV: u8 = 0x02;
/// User-defined flag 1
pub const PSW_F1: u8 = 0x01;
/// Parity flag: set when the accumulator holds an odd number of 1s
pub const PSW_P: u8 = 0x00;

/// Short name of a well-known SFR, used by the disassembler.
pub fn name(addr: u8) -> Option<&'static str> {
    Some(match addr {
        SFR_P0 => "P0",
        SFR_SP => "SP",
        SFR_DPL => "DPL",
        SFR_DPH => "DPH",
        SFR_U0CSR => "U0CSR",
        SFR_PCON => "PCON",
        SFR_TCON => "TCON",
        SFR_TMOD => "TMOD",
        SFR_TL0 => "TL0",
        SFR_TL1 => "TL1",
        SFR_TH0 => "TH0",
        SFR_TH1 => "TH1",
        SFR_P1 => "P1",
        SFR_MPAGE => "MPAGE",
        SFR_SCON => "SCON",
        SFR_SBUF => "SBUF",
        SFR_P2 => "P2",
        SFR_IE => "IE",
        SFR_P3 => "P3",
        SFR_IP => "IP",
        SFR_U0DBUF => "U0DBUF",
        SFR_T2CON => "T2CON",
        SFR_PSW => "PSW",
        SFR_ACC => "ACC",
        SFR_IRCON2 => "IRCON2",
        SFR_B => "B",
        SFR_U1CSR => "U1CSR",
        SFR_U1DBUF => "U1DBUF",
        _ => return None,
    })
}
