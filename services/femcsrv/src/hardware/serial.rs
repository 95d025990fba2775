//! Bit-serial register access through the serial multiplexer
//!
//! Every transaction names a mux port, a 5-bit command word and a word size
//! in bits. Outgoing words are shifted left by the latch bits before being
//! sent; incoming words are shifted right after being received.

use tracing::{trace, warn};

use super::{HardwareError, RegisterBus};
use crate::can::rca::CARTRIDGES_NUMBER;

/// Largest command word the multiplexer accepts
pub const MAX_COMMAND: u8 = 0x1F;

/// Default bound on ready-flag polls before a transaction is abandoned
pub const DEFAULT_READY_POLLS: u32 = 1000;

/// Mux port for a module
///
/// Every cartridge owns two ports, LO (subsystem 1) first and bias
/// (subsystem 0) second. The other modules follow the cartridges.
pub fn mux_port(module: u8, subsystem: u8) -> u8 {
    if usize::from(module) < CARTRIDGES_NUMBER {
        2 * module + (1 - subsystem.min(1))
    } else {
        CARTRIDGES_NUMBER as u8 + module
    }
}

fn width_mask(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Serial access layer over a raw register bus
#[derive(Debug)]
pub struct SerialInterface<B> {
    bus: B,
    ready_polls: u32,
}

impl<B: RegisterBus> SerialInterface<B> {
    pub fn new(bus: B, ready_polls: u32) -> Self {
        Self {
            bus,
            ready_polls: ready_polls.max(1),
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn check_command(command: u8) -> Result<(), HardwareError> {
        if command > MAX_COMMAND {
            return Err(HardwareError::CommandRange { command });
        }
        Ok(())
    }

    /// Send `bits` bits of `data` after shifting it left by `shift`
    pub fn write(
        &mut self,
        port: u8,
        command: u8,
        data: u64,
        bits: u8,
        shift: u8,
    ) -> Result<(), HardwareError> {
        Self::check_command(command)?;
        let word = (data << shift) & width_mask(bits);
        trace!(port, command, word, bits, "serial write");
        self.bus.transfer_out(port, command, word, bits)
    }

    /// Receive `bits` bits and shift them right by `shift`
    pub fn read(&mut self, port: u8, command: u8, bits: u8, shift: u8) -> Result<u64, HardwareError> {
        Self::check_command(command)?;
        let raw = self.bus.transfer_in(port, command, bits)? & width_mask(bits);
        trace!(port, command, raw, bits, "serial read");
        Ok(raw >> shift)
    }

    /// Strobe commands carry no data
    pub fn strobe(&mut self, port: u8, command: u8, bits: u8) -> Result<(), HardwareError> {
        self.write(port, command, 0, bits, 0)
    }

    /// Read a status word until `ready` accepts it
    ///
    /// Gives up with [`HardwareError::Timeout`] after the configured number
    /// of polls. The last status read is returned on success.
    pub fn poll_ready<F>(
        &mut self,
        port: u8,
        command: u8,
        bits: u8,
        ready: F,
    ) -> Result<u64, HardwareError>
    where
        F: Fn(u64) -> bool,
    {
        for _ in 0..self.ready_polls {
            let status = self.read(port, command, bits, 0)?;
            if ready(status) {
                return Ok(status);
            }
        }
        warn!(port, command, polls = self.ready_polls, "Ready flag never set");
        Err(HardwareError::Timeout {
            port,
            polls: self.ready_polls,
        })
    }
}
