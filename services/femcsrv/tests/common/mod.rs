//! Common test utilities and helpers
#![allow(dead_code)]

use std::sync::Arc;

use femcsrv::can::rca::CONTROL_RCA_OFFSET;
use femcsrv::endpoint::timer::ManualClock;
use femcsrv::hardware::bias;
use femcsrv::hardware::serial::mux_port;
use femcsrv::hardware::SimulatedBus;
use femcsrv::{FrontEnd, FrontEndConfig, Payload, Reply, Request};

/// cart3, pol0, sb0, SIS voltage
pub const SIS_VOLTAGE_CART3: u32 = 0x2008;
/// cart3, pol0, sb0, SIS open loop
pub const SIS_OPEN_LOOP_CART3: u32 = 0x2018;
/// cart5, pol0, sb0, SIS magnet current
pub const SIS_MAGNET_CURRENT_CART5: u32 = 0x4030;
/// cart3, pol0, sb0, LNA stage 0 drain voltage
pub const LNA_DRAIN_VOLTAGE_CART3: u32 = 0x2040;
/// cart3, pol0, sb0, LNA stage 0 drain current
pub const LNA_DRAIN_CURRENT_CART3: u32 = 0x2041;
/// cart3, pol0, sb0, LNA enable
pub const LNA_ENABLE_CART3: u32 = 0x2058;
/// cart3, pol0, LNA LED enable
pub const LNA_LED_ENABLE_CART3: u32 = 0x2100;
/// cart3, pol0, SIS heater enable
pub const HEATER_ENABLE_CART3: u32 = 0x2180;
/// cart1, pol0, sb0, LNA enable
pub const LNA_ENABLE_CART1: u32 = 0x0058;
/// cart9, pol0, SIS heater enable
pub const HEATER_ENABLE_CART9: u32 = 0x8180;
/// cart3, pol0, special messages, DAC 2, clear strobe
pub const DAC2_CLEAR_STROBE_CART3: u32 = 0x22E0;
/// cart3, pol0, special messages, DAC 1, clear strobe
pub const DAC1_CLEAR_STROBE_CART3: u32 = 0x22A0;

pub const OPTICAL_SWITCH_PORT: u32 = 0xD020;
pub const MODULATION_INPUT: u32 = 0xD038;
pub const EDFA_DRIVER_STATE: u32 = 0xD03C;

/// Slot of cart3
pub const CART3: usize = 2;
/// Slot of cart5
pub const CART5: usize = 4;

pub fn control(rca: u32) -> u32 {
    rca | CONTROL_RCA_OFFSET
}

/// Front end over a simulated bus with a hand-driven clock
pub struct Bench {
    pub bus: SimulatedBus,
    pub clock: ManualClock,
    pub frontend: FrontEnd<SimulatedBus>,
}

impl Bench {
    pub fn new(config: &FrontEndConfig) -> Self {
        let bus = SimulatedBus::idle_front_end();
        let clock = ManualClock::new();
        let frontend = FrontEnd::new(config, bus.clone(), Arc::new(clock.clone()));
        Self { bus, clock, frontend }
    }

    pub fn monitor(&mut self, rca: u32) -> Reply {
        self.frontend.handle(&Request::monitor(rca))
    }

    pub fn write(&mut self, rca: u32, data: &[u8]) -> Reply {
        let request = Request::new(rca, data).unwrap();
        self.frontend.handle(&request)
    }

    pub fn write_f32(&mut self, rca: u32, value: f32) -> Reply {
        self.frontend.handle(&Request::control(rca, Payload::from_f32(value)))
    }

    /// Program the bias ADC of a cartridge polarization
    pub fn set_bias_adc(&self, slot: u8, polarization: u8, raw: u64) {
        self.bus
            .set_read(mux_port(slot, 0), bias::adc_data_read(polarization), raw);
    }
}

impl Default for Bench {
    fn default() -> Self {
        Self::new(&FrontEndConfig::default())
    }
}

pub fn reply_f32(reply: &Reply) -> f32 {
    reply.payload.to_f32().unwrap()
}
