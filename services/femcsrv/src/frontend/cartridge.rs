//! Cartridge power state and standby2 flags

use tracing::info;

use crate::can::rca::CARTRIDGES_NUMBER;
use crate::config::{CartridgeState, FrontEndConfig};
use crate::dispatch::CapabilityLookup;
use crate::error::{DispatchError, DispatchResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cartridge {
    state: CartridgeState,
    standby2: bool,
}

/// Power state of every cartridge slot
#[derive(Debug, Clone, Default)]
pub struct CartridgeStates {
    slots: [Cartridge; CARTRIDGES_NUMBER],
}

impl CartridgeStates {
    pub fn from_config(config: &FrontEndConfig) -> Self {
        let mut states = Self::default();
        for (slot, cartridge) in states.slots.iter_mut().enumerate() {
            let configured = config.cartridge(slot);
            cartridge.state = configured.state;
            cartridge.standby2 = configured.standby2;
        }
        states
    }

    pub fn state(&self, slot: usize) -> Option<CartridgeState> {
        self.slots.get(slot).map(|c| c.state)
    }

    pub fn set_state(&mut self, slot: usize, state: CartridgeState) -> DispatchResult<()> {
        let cartridge = self
            .slots
            .get_mut(slot)
            .ok_or_else(|| DispatchError::HardwareNotInstalled(format!("cartridge slot {}", slot)))?;
        if cartridge.state != state {
            info!(cartridge = slot, from = ?cartridge.state, to = ?state, "Cartridge state changed");
            cartridge.state = state;
        }
        Ok(())
    }

    pub fn set_standby2(&mut self, slot: usize, standby2: bool) -> DispatchResult<()> {
        let cartridge = self
            .slots
            .get_mut(slot)
            .ok_or_else(|| DispatchError::HardwareNotInstalled(format!("cartridge slot {}", slot)))?;
        if cartridge.standby2 != standby2 {
            info!(cartridge = slot, standby2, "Cartridge standby2 changed");
            cartridge.standby2 = standby2;
        }
        Ok(())
    }
}

impl CapabilityLookup for CartridgeStates {
    fn check_power(&self, module: u8) -> DispatchResult<()> {
        let Some(cartridge) = self.slots.get(usize::from(module)) else {
            return Err(DispatchError::HardwareNotInstalled(format!("cartridge slot {}", module)));
        };
        match cartridge.state {
            CartridgeState::On | CartridgeState::Ready => Ok(()),
            CartridgeState::Error => Err(DispatchError::CartridgeFault(module)),
            CartridgeState::Off | CartridgeState::Initing | CartridgeState::GoStandby2 => {
                Err(DispatchError::HardwareBlocked(format!(
                    "cartridge {} is {:?}",
                    module, cartridge.state
                )))
            },
        }
    }

    fn standby2(&self, module: u8) -> bool {
        self.slots
            .get(usize::from(module))
            .is_some_and(|c| c.standby2)
    }
}
