//! Systemic interlocks applied ahead of control writes

use crate::dispatch::{CapabilityLookup, RoutingContext};
use crate::error::DispatchError;

/// Condition under which an endpoint refuses control writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interlock {
    /// Owning cartridge in standby2 power mode
    Standby2,
}

impl Interlock {
    pub fn check(self, caps: &dyn CapabilityLookup, ctx: &RoutingContext) -> Result<(), DispatchError> {
        match self {
            Self::Standby2 if caps.standby2(ctx.module) => Err(DispatchError::HardwareBlocked(format!(
                "cartridge {} in standby2",
                ctx.module
            ))),
            Self::Standby2 => Ok(()),
        }
    }
}
