//! Front end: dispatch tree, endpoints, cartridge states and hardware
//!
//! One [`FrontEnd`] serves requests strictly one at a time; every request
//! runs to completion before the next is accepted.

pub mod builder;
pub mod cartridge;
pub mod special;

use std::sync::Arc;

use tracing::{info, warn};

use crate::can::{RcaClass, Reply, Request, Status};
use crate::config::{CartridgeState, FrontEndConfig};
use crate::dispatch::{dispatch, DispatchNode};
use crate::endpoint::timer::Clock;
use crate::endpoint::EndpointTable;
use crate::error::DispatchResult;
use crate::hardware::{FrontEndHardware, RegisterBus, SerialInterface};

pub use builder::TreeBuilder;
pub use cartridge::CartridgeStates;
pub use special::FeMode;

pub struct FrontEnd<B> {
    tree: DispatchNode,
    table: EndpointTable,
    cartridges: CartridgeStates,
    hardware: FrontEndHardware<B>,
    clock: Arc<dyn Clock>,
    mode: FeMode,
}

impl<B: RegisterBus> FrontEnd<B> {
    pub fn new(config: &FrontEndConfig, bus: B, clock: Arc<dyn Clock>) -> Self {
        let mut table = EndpointTable::new();
        let tree = TreeBuilder::new(config, &mut table).build();

        let mut hardware = FrontEndHardware::new(SerialInterface::new(bus, config.ready_polls));
        for slot in 0..config.cartridges.len() {
            hardware.set_sense_resistor(slot, config.sense_resistor(slot));
        }
        hardware.set_photodetector_coefficient(config.lpr.photodetector_coefficient);

        info!(endpoints = table.len(), "Front end configured");
        Self {
            tree,
            table,
            cartridges: CartridgeStates::from_config(config),
            hardware,
            clock,
            mode: FeMode::default(),
        }
    }

    pub fn handle(&mut self, request: &Request) -> Reply {
        match request.class {
            RcaClass::Special => special::handle(request, &mut self.mode),
            RcaClass::Monitor | RcaClass::Control => dispatch(
                &self.tree,
                &mut self.table,
                request,
                &self.cartridges,
                &mut self.hardware,
                self.clock.now(),
            ),
            RcaClass::Reserved => {
                warn!(rca = format_args!("0x{:05X}", request.rca), "RCA class out of range");
                Reply::status_only(request.rca, Status::HardwareRange)
            },
        }
    }

    pub fn set_state(&mut self, slot: usize, state: CartridgeState) -> DispatchResult<()> {
        self.cartridges.set_state(slot, state)
    }

    pub fn set_standby2(&mut self, slot: usize, standby2: bool) -> DispatchResult<()> {
        self.cartridges.set_standby2(slot, standby2)
    }

    pub fn cartridges(&self) -> &CartridgeStates {
        &self.cartridges
    }

    pub fn endpoints(&self) -> &EndpointTable {
        &self.table
    }

    pub fn hardware(&self) -> &FrontEndHardware<B> {
        &self.hardware
    }

    pub fn mode(&self) -> FeMode {
        self.mode
    }
}
