//! Routing context threaded through the dispatch tree
//!
//! Each branch that decodes an address field records the decoded index here,
//! so the leaf handler knows which cartridge, polarization, sideband, stage,
//! sensor or DAC it serves without any shared "currently addressed" state.

use serde::Serialize;

/// Address field captured by a dispatch branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Module,
    Subsystem,
    Polarization,
    Sideband,
    Stage,
    /// LPR module index; the temperature modules use it as sensor number
    Sensor,
    Dac,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RoutingContext {
    pub module: u8,
    pub subsystem: u8,
    pub polarization: u8,
    pub sideband: u8,
    pub stage: u8,
    pub sensor: u8,
    pub dac: u8,
}

impl RoutingContext {
    /// Copy of the context with `field` set to `index`
    pub fn with(mut self, field: Field, index: u8) -> Self {
        match field {
            Field::Module => self.module = index,
            Field::Subsystem => self.subsystem = index,
            Field::Polarization => self.polarization = index,
            Field::Sideband => self.sideband = index,
            Field::Stage => self.stage = index,
            Field::Sensor => self.sensor = index,
            Field::Dac => self.dac = index,
        }
        self
    }
}
