//! Simulated register bus
//!
//! Stands in for the serial multiplexer in tests and in the service binary.
//! Every transfer is recorded; reads are served from per-register queues,
//! then from programmed values, then as zero. Failures can be injected per
//! register or for the whole bus. Clones share the same state.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{bias, lpr, serial::mux_port, HardwareError, RegisterBus};
use crate::can::rca::{CARTRIDGES_NUMBER, LPR_MODULE};

/// One recorded register transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Out { port: u8, command: u8, data: u64, bits: u8 },
    In { port: u8, command: u8, bits: u8 },
}

impl Transfer {
    pub fn port(&self) -> u8 {
        match self {
            Self::Out { port, .. } | Self::In { port, .. } => *port,
        }
    }

    pub fn command(&self) -> u8 {
        match self {
            Self::Out { command, .. } | Self::In { command, .. } => *command,
        }
    }
}

#[derive(Debug, Default)]
struct BusState {
    transfers: Vec<Transfer>,
    queued: HashMap<(u8, u8), VecDeque<u64>>,
    programmed: HashMap<(u8, u8), u64>,
    failing: HashSet<(u8, u8)>,
    fail_all: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<BusState>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus whose status registers report an idle, ready front end
    ///
    /// Every bias port has both ready flags set and the LPR reports its ADC
    /// ready with the switch idle and the EDFA driver healthy.
    pub fn idle_front_end() -> Self {
        let bus = Self::new();
        let bias_ready = 0x04 | 0x08;
        for cartridge in 0..CARTRIDGES_NUMBER as u8 {
            let port = mux_port(cartridge, 0);
            for polarization in 0..2 {
                bus.set_read(port, bias::parallel_read(polarization), bias_ready);
            }
        }
        bus.set_read(mux_port(LPR_MODULE as u8, 0), lpr::PARALLEL_READ, 0x08);
        bus
    }

    /// Serve `value` once, ahead of any programmed value
    pub fn queue_read(&self, port: u8, command: u8, value: u64) {
        self.state
            .lock()
            .queued
            .entry((port, command))
            .or_default()
            .push_back(value);
    }

    /// Serve `value` on every read without a queued value
    pub fn set_read(&self, port: u8, command: u8, value: u64) {
        self.state.lock().programmed.insert((port, command), value);
    }

    /// Make every transfer on one register fail
    pub fn fail_command(&self, port: u8, command: u8) {
        self.state.lock().failing.insert((port, command));
    }

    /// Make every transfer fail
    pub fn fail_all(&self) {
        self.state.lock().fail_all = true;
    }

    /// Remove every injected failure
    pub fn heal(&self) {
        let mut state = self.state.lock();
        state.failing.clear();
        state.fail_all = false;
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.lock().transfers.clone()
    }

    /// Outgoing transfers only
    pub fn writes(&self) -> Vec<Transfer> {
        self.state
            .lock()
            .transfers
            .iter()
            .filter(|t| matches!(t, Transfer::Out { .. }))
            .cloned()
            .collect()
    }

    pub fn clear_transfers(&self) {
        self.state.lock().transfers.clear();
    }

    fn check_failure(state: &BusState, port: u8, command: u8) -> Result<(), HardwareError> {
        if state.fail_all || state.failing.contains(&(port, command)) {
            debug!(port, command, "Injected bus failure");
            return Err(HardwareError::Bus {
                port,
                command,
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl RegisterBus for SimulatedBus {
    fn transfer_out(&mut self, port: u8, command: u8, data: u64, bits: u8) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        state.transfers.push(Transfer::Out {
            port,
            command,
            data,
            bits,
        });
        Self::check_failure(&state, port, command)
    }

    fn transfer_in(&mut self, port: u8, command: u8, bits: u8) -> Result<u64, HardwareError> {
        let mut state = self.state.lock();
        state.transfers.push(Transfer::In {
            port,
            command,
            bits,
        });
        Self::check_failure(&state, port, command)?;
        if let Some(value) = state
            .queued
            .get_mut(&(port, command))
            .and_then(VecDeque::pop_front)
        {
            return Ok(value);
        }
        Ok(state
            .programmed
            .get(&(port, command))
            .copied()
            .unwrap_or(0))
    }
}
