//! Console UART and the handful of SFR quirks firmware needs to boot.

use std::io::{self, ErrorKind, Read, Write};

use i8051::sfr::{SFR_IRCON2, SFR_MPAGE, SFR_P2, SFR_U0CSR, SFR_U1CSR, SFR_U1DBUF};
use i8051::{Exception, Memory, Peripheral};

use crate::error::Stop;

/// Status value that satisfies every "byte ready" poll.
const RX_READY: u8 = 4;

/// Bridges the target's UART data register to a host byte stream.
///
/// Reads of the data register pull one byte from `input`. Writes push the
/// stored byte to `output`. Status registers always report ready, so
/// firmware never waits on hardware.
pub struct UartHarness<R, W> {
    uart_data: u8,
    input: R,
    output: W,
}

impl<R: Read, W: Write> UartHarness<R, W> {
    pub fn new(uart_data: u8, input: R, output: W) -> Self {
        Self {
            uart_data,
            input,
            output,
        }
    }

    pub fn uart_data(&self) -> u8 {
        self.uart_data
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }

    fn is_cc2541(&self) -> bool {
        self.uart_data == SFR_U1DBUF
    }

    /// Value written to IRCON2 after each transmitted byte.
    fn tx_ready(&self) -> u8 {
        if self.is_cc2541() { 4 } else { 2 }
    }

    fn receive(&mut self) -> Result<u8, Stop> {
        // Prompts are usually written right before the firmware blocks on
        // input, so they must reach the host first.
        self.output.flush()?;
        let mut byte = [0u8];
        loop {
            match self.input.read(&mut byte) {
                Ok(0) => return Err(Stop::EndOfInput),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        tracing::debug!(byte = byte[0], "uart rx");
        Ok(match byte[0] {
            b'\n' => b'\r',
            b => b,
        })
    }
}

impl<R: Read, W: Write> Peripheral for UartHarness<R, W> {
    type Halt = Stop;

    fn sfr_read(&mut self, mem: &Memory, addr: u8) -> Result<u8, Stop> {
        if addr == SFR_U0CSR || (addr == SFR_U1CSR && self.is_cc2541()) {
            return Ok(RX_READY);
        }
        if addr == self.uart_data {
            return self.receive();
        }
        Ok(mem.sfr(addr))
    }

    fn sfr_write(&mut self, mem: &mut Memory, addr: u8) -> Result<(), Stop> {
        if addr == self.uart_data {
            let byte = mem.sfr(addr);
            tracing::debug!(byte, "uart tx");
            self.output.write_all(&[byte])?;
            mem.set_sfr(SFR_IRCON2, self.tx_ready());
        } else if addr == SFR_MPAGE {
            let page = mem.sfr(SFR_MPAGE);
            tracing::debug!(page, "mpage mirrored to P2");
            mem.set_sfr(SFR_P2, page);
        }
        Ok(())
    }

    fn exception(&mut self, _mem: &mut Memory, exception: Exception) -> Result<(), Stop> {
        match exception {
            Exception::IllegalOpcode { pc, opcode } => Err(Stop::IllegalOpcode { pc, opcode }),
            other => {
                tracing::warn!("ignoring {other}");
                Ok(())
            }
        }
    }
}
