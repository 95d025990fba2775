//! Hardware register transaction layer
//!
//! [`RegisterBus`] is the raw transport (the serial multiplexer on the real
//! front end, [`simulated::SimulatedBus`] everywhere else). [`PointIo`] is
//! the narrow read/write contract the endpoint handlers consume.

pub mod bias;
pub mod io;
pub mod lpr;
pub mod serial;
pub mod simulated;

use serde::Serialize;
use thiserror::Error;

use crate::can::Payload;
use crate::dispatch::RoutingContext;

pub use io::FrontEndHardware;
pub use serial::SerialInterface;
pub use simulated::SimulatedBus;

/// Transaction layer failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HardwareError {
    #[error("Command word 0x{command:02X} exceeds 5 bits")]
    CommandRange { command: u8 },

    #[error("Bus failure on port {port}, command 0x{command:02X}: {reason}")]
    Bus { port: u8, command: u8, reason: String },

    #[error("Port {port} not ready after {polls} polls")]
    Timeout { port: u8, polls: u32 },

    #[error("{what} value {value} cannot be encoded")]
    ValueRange { what: &'static str, value: f32 },

    #[error("{0} busy")]
    Busy(&'static str),

    #[error("No register access for {0:?}")]
    Unsupported(Point),
}

/// Raw register transport
pub trait RegisterBus: Send {
    /// Send a `bits` wide word, already shifted and masked
    fn transfer_out(&mut self, port: u8, command: u8, data: u64, bits: u8) -> Result<(), HardwareError>;

    /// Receive a `bits` wide word
    fn transfer_in(&mut self, port: u8, command: u8, bits: u8) -> Result<u64, HardwareError>;
}

/// Physical attribute behind an endpoint
///
/// The routing context supplies the cartridge, polarization, sideband,
/// stage, sensor or DAC a point refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Point {
    // Bias module
    SisSenseResistor,
    SisVoltage,
    SisCurrent,
    SisOpenLoop,
    SisMagnetVoltage,
    SisMagnetCurrent,
    LnaDrainVoltage,
    LnaDrainCurrent,
    LnaGateVoltage,
    LnaEnable,
    LnaLedEnable,
    SisHeaterEnable,
    SisHeaterCurrent,
    BiasDacResetStrobe,
    BiasDacClearStrobe,
    // LPR
    LprTemperature,
    OpticalSwitchPort,
    OpticalSwitchShutter,
    OpticalSwitchForceShutter,
    OpticalSwitchState,
    OpticalSwitchBusy,
    LaserPumpTemperature,
    LaserDriveCurrent,
    LaserPhotodetectorCurrent,
    PhotodetectorCurrent,
    PhotodetectorCoefficient,
    PhotodetectorPower,
    ModulationInput,
    ModulationDacResetStrobe,
    EdfaDriverState,
}

/// Scalar exchanged with the hardware
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Float(f32),
    Byte(u8),
}

impl Value {
    pub fn as_f32(self) -> f32 {
        match self {
            Self::Float(v) => v,
            Self::Byte(b) => f32::from(b),
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            Self::Float(v) => v != 0.0,
            Self::Byte(b) => b != 0,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Float(v) => v as u8,
            Self::Byte(b) => b,
        }
    }

    /// Reply payload in wire order
    pub fn to_payload(self) -> Payload {
        match self {
            Self::Float(v) => Payload::from_f32(v),
            Self::Byte(b) => Payload::from_u8(b),
        }
    }
}

/// Read/write contract between endpoint handlers and the hardware
pub trait PointIo {
    fn read(&mut self, point: Point, ctx: &RoutingContext) -> Result<Value, HardwareError>;

    fn write(&mut self, point: Point, ctx: &RoutingContext, value: Value) -> Result<(), HardwareError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Byte(1).as_f32(), 1.0);
        assert!(Value::Float(0.5).as_bool());
        assert!(!Value::Byte(0).as_bool());
        assert_eq!(Value::Byte(7).to_payload().as_slice(), &[7]);
        assert_eq!(Value::Float(1.0).to_payload().as_slice(), &[0x3F, 0x80, 0, 0]);
    }
}
