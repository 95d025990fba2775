//! Dispatch tree construction
//!
//! Builds the whole address tree once at startup. Section settings are
//! looked up through [`ConfigSource`] by the key of each node; a section
//! missing from the configuration keeps the built-in default.

use std::time::Duration;

use tracing::debug;

use crate::can::rca::{
    CARTRIDGES_NUMBER, CRYOSTAT_MODULE, IF_SWITCH_MODULE, LPR_MODULE, MODULES_NUMBER, POWER_DISTRIBUTION_MODULE,
};
use crate::config::{self, ConfigSource, FrontEndConfig, EDFA_DRIVER_STATE_KEY};
use crate::dispatch::{Branch, DispatchNode, Field, Guard, Selector};
use crate::endpoint::interlock::Interlock;
use crate::endpoint::{CorrectiveAction, Endpoint, EndpointId, EndpointTable, Format, Kind};
use crate::hardware::{Point, Value};

// Cartridge
const SUBSYSTEM: Selector = Selector::new(0x800, 11).recording(Field::Subsystem);
const POLARIZATION: Selector = Selector::new(0x400, 10).recording(Field::Polarization);
const POLARIZATION_MODULES: Selector = Selector::new(0x380, 7).recording(Field::Sideband);
const SIDEBAND_MODULES: Selector = Selector::new(0x060, 5);
const SIS_MODULES: Selector = Selector::new(0x018, 3);
const SIS_MAGNET_MODULES: Selector = Selector::new(0x010, 4);
const LNA_MODULES: Selector = Selector::new(0x01C, 2).recording(Field::Stage);
const LNA_STAGE_MODULES: Selector = Selector::new(0x003, 0);
const SIS_HEATER_MODULES: Selector = Selector::new(0x040, 6);
const SPECIAL_DAC: Selector = Selector::new(0x040, 6).recording(Field::Dac);
const DAC_STROBES: Selector = Selector::new(0x020, 5);

// LPR
const LPR_MODULES: Selector = Selector::new(0x030, 4).recording(Field::Sensor);
const OPTICAL_SWITCH_MODULES: Selector = Selector::new(0x00F, 1);
const EDFA_MODULES: Selector = Selector::new(0x00C, 2);
const LASER_MODULES: Selector = Selector::new(0x003, 0);
const PHOTODETECTOR_MODULES: Selector = Selector::new(0x003, 0);
const MODULATION_INPUT_MODULES: Selector = Selector::new(0x002, 1);

const MODULE: Selector = Selector::new(0x0F000, 12).recording(Field::Module);

const LNA_STAGES: u8 = 3;

/// Walks the configuration while filling the endpoint table
pub struct TreeBuilder<'a> {
    config: &'a FrontEndConfig,
    table: &'a mut EndpointTable,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(config: &'a FrontEndConfig, table: &'a mut EndpointTable) -> Self {
        Self { config, table }
    }

    fn source(&self) -> &dyn ConfigSource {
        self.config
    }

    /// Availability of a branch, `default` when the section is absent
    fn available(&self, key: &str, default: bool) -> bool {
        self.source().load(key).map_or(default, |section| section.available)
    }

    fn push(&mut self, endpoint: Endpoint) -> EndpointId {
        let endpoint = match self.source().load(endpoint.name()) {
            Some(section) => endpoint
                .with_available(section.available)
                .with_limits(section.limits)
                .with_bands(section.bands),
            None => endpoint,
        };
        self.table.push(endpoint)
    }

    fn leaf(&mut self, key: String, kind: Kind, format: Format, point: Point) -> DispatchNode {
        DispatchNode::Leaf(self.push(Endpoint::new(key, kind, format, point)))
    }

    fn interlocked(&mut self, key: String, format: Format, point: Point) -> DispatchNode {
        let endpoint = Endpoint::new(key, Kind::ReadWrite, format, point).with_interlock(Interlock::Standby2);
        DispatchNode::Leaf(self.push(endpoint))
    }

    /// Root of the module tree
    pub fn build(mut self) -> DispatchNode {
        let mut modules = Vec::with_capacity(MODULES_NUMBER);
        for slot in 0..CARTRIDGES_NUMBER {
            modules.push(self.cartridge(slot));
        }
        for module in CARTRIDGES_NUMBER..MODULES_NUMBER {
            let node = match module {
                LPR_MODULE => self.lpr(),
                POWER_DISTRIBUTION_MODULE => Branch::unavailable("power distribution").into(),
                IF_SWITCH_MODULE => Branch::unavailable("IF switch").into(),
                CRYOSTAT_MODULE => Branch::unavailable("cryostat").into(),
                _ => Branch::unavailable("FETIM").into(),
            };
            modules.push(node);
        }
        debug!(endpoints = self.table.len(), "Dispatch tree built");
        Branch::new("module", MODULE, modules).into()
    }

    // ========================================================================
    // Cartridge
    // ========================================================================

    fn cartridge(&mut self, slot: usize) -> DispatchNode {
        let key = config::cartridge_key(slot);
        let available = self.config.cartridge(slot).available && self.available(&key, true);
        let polarizations = (0..2).map(|pol| self.polarization(slot, pol)).collect();
        let bias = Branch::new("polarization", POLARIZATION, polarizations);
        let lo = Branch::unavailable("cartridge LO");
        Branch::new("cartridge", SUBSYSTEM, vec![bias.into(), lo.into()])
            .with_available(available)
            .with_guard(Guard::CartridgePower)
            .into()
    }

    fn polarization(&mut self, slot: usize, pol: u8) -> DispatchNode {
        let key = format!("{}.pol{}", config::cartridge_key(slot), pol);
        let available = self.available(&key, true);
        let children = vec![
            self.sideband(slot, &key, 0),
            self.sideband(slot, &key, 1),
            self.lna_led(&key),
            self.sis_heater(slot, &key),
            DispatchNode::Reserved,
            self.special(&key),
        ];
        Branch::new("polarization module", POLARIZATION_MODULES, children)
            .with_available(available)
            .into()
    }

    fn sideband(&mut self, slot: usize, pol_key: &str, sb: u8) -> DispatchNode {
        let key = format!("{}.sb{}", pol_key, sb);
        let available = self.available(&key, true);
        let band = config::band(slot);
        let children = vec![self.sis(band, &key), self.sis_magnet(band, &key), self.lna(&key)];
        Branch::new("sideband module", SIDEBAND_MODULES, children)
            .with_available(available)
            .into()
    }

    fn sis(&mut self, band: usize, sb_key: &str) -> DispatchNode {
        let key = format!("{}.sis", sb_key);
        let available = self.available(&key, config::has_sis(band));
        let children = vec![
            self.leaf(format!("{}.sense_resistor", key), Kind::ReadOnly, Format::Float, Point::SisSenseResistor),
            self.interlocked(format!("{}.voltage", key), Format::Float, Point::SisVoltage),
            self.leaf(format!("{}.current", key), Kind::ReadOnly, Format::Float, Point::SisCurrent),
            self.interlocked(format!("{}.open_loop", key), Format::Bool, Point::SisOpenLoop),
        ];
        Branch::new("SIS", SIS_MODULES, children)
            .with_available(available)
            .into()
    }

    fn sis_magnet(&mut self, band: usize, sb_key: &str) -> DispatchNode {
        let key = format!("{}.sis_magnet", sb_key);
        let available = self.available(&key, config::has_sis_magnet(band));
        let children = vec![
            self.leaf(format!("{}.voltage", key), Kind::ReadOnly, Format::Float, Point::SisMagnetVoltage),
            self.interlocked(format!("{}.current", key), Format::Float, Point::SisMagnetCurrent),
        ];
        Branch::new("SIS magnet", SIS_MAGNET_MODULES, children)
            .with_available(available)
            .into()
    }

    fn lna(&mut self, sb_key: &str) -> DispatchNode {
        let key = format!("{}.lna", sb_key);
        let available = self.available(&key, true);
        let mut children: Vec<DispatchNode> = (0..LNA_STAGES).map(|st| self.lna_stage(&key, st)).collect();
        children.extend([DispatchNode::Reserved, DispatchNode::Reserved, DispatchNode::Reserved]);
        children.push(self.interlocked(format!("{}.enable", key), Format::Bool, Point::LnaEnable));
        Branch::new("LNA", LNA_MODULES, children)
            .with_available(available)
            .into()
    }

    fn lna_stage(&mut self, lna_key: &str, stage: u8) -> DispatchNode {
        let key = format!("{}.st{}", lna_key, stage);
        let available = self.available(&key, true);
        let children = vec![
            self.interlocked(format!("{}.drain_voltage", key), Format::Float, Point::LnaDrainVoltage),
            self.interlocked(format!("{}.drain_current", key), Format::Float, Point::LnaDrainCurrent),
            self.leaf(format!("{}.gate_voltage", key), Kind::ReadOnly, Format::Float, Point::LnaGateVoltage),
        ];
        Branch::new("LNA stage", LNA_STAGE_MODULES, children)
            .with_available(available)
            .into()
    }

    fn lna_led(&mut self, pol_key: &str) -> DispatchNode {
        let key = format!("{}.lna_led", pol_key);
        let available = self.available(&key, true);
        let enable = self.interlocked(format!("{}.enable", key), Format::Bool, Point::LnaLedEnable);
        Branch::single("LNA LED", enable).with_available(available).into()
    }

    fn sis_heater(&mut self, slot: usize, pol_key: &str) -> DispatchNode {
        let key = format!("{}.sis_heater", pol_key);
        let available = self.available(&key, config::has_sis_heater(config::band(slot)));
        let mut enable = Endpoint::new(format!("{}.enable", key), Kind::WriteOnly, Format::Bool, Point::SisHeaterEnable)
            .with_interlock(Interlock::Standby2);
        if let Some(ms) = self.config.heater_cooldown_ms(slot) {
            enable = enable.with_cooldown(Duration::from_millis(ms));
        }
        let children = vec![
            DispatchNode::Leaf(self.push(enable)),
            self.leaf(format!("{}.current", key), Kind::ReadOnly, Format::Float, Point::SisHeaterCurrent),
        ];
        Branch::new("SIS heater", SIS_HEATER_MODULES, children)
            .with_available(available)
            .into()
    }

    fn special(&mut self, pol_key: &str) -> DispatchNode {
        let key = format!("{}.special", pol_key);
        let dacs = (0..2)
            .map(|dac| {
                let dac_key = format!("{}.dac{}", key, dac);
                let reset = self.leaf(
                    format!("{}.reset_strobe", dac_key),
                    Kind::WriteOnly,
                    Format::Byte,
                    Point::BiasDacResetStrobe,
                );
                // Only the first DAC has a clear strobe
                let clear = if dac == 0 {
                    self.leaf(
                        format!("{}.clear_strobe", dac_key),
                        Kind::WriteOnly,
                        Format::Byte,
                        Point::BiasDacClearStrobe,
                    )
                } else {
                    DispatchNode::Reserved
                };
                Branch::new("DAC strobe", DAC_STROBES, vec![reset, clear]).into()
            })
            .collect();
        Branch::new("special DAC", SPECIAL_DAC, dacs).into()
    }

    // ========================================================================
    // LPR
    // ========================================================================

    fn lpr(&mut self) -> DispatchNode {
        let available = self.config.lpr.available && self.available("lpr", true);
        let children = vec![
            self.leaf("lpr.temp0".to_string(), Kind::ReadOnly, Format::Float, Point::LprTemperature),
            self.leaf("lpr.temp1".to_string(), Kind::ReadOnly, Format::Float, Point::LprTemperature),
            self.optical_switch(),
            self.edfa(),
        ];
        Branch::new("LPR module", LPR_MODULES, children)
            .with_available(available)
            .into()
    }

    fn optical_switch(&mut self) -> DispatchNode {
        let key = "lpr.optical_switch";
        let children = vec![
            self.leaf(format!("{}.port", key), Kind::ReadWrite, Format::Byte, Point::OpticalSwitchPort),
            self.leaf(format!("{}.shutter", key), Kind::WriteOnly, Format::Byte, Point::OpticalSwitchShutter),
            self.leaf(
                format!("{}.force_shutter", key),
                Kind::WriteOnly,
                Format::Byte,
                Point::OpticalSwitchForceShutter,
            ),
            self.leaf(format!("{}.state", key), Kind::ReadOnly, Format::Byte, Point::OpticalSwitchState),
            self.leaf(format!("{}.busy", key), Kind::ReadOnly, Format::Byte, Point::OpticalSwitchBusy),
        ];
        Branch::new("optical switch", OPTICAL_SWITCH_MODULES, children)
            .with_available(self.available(key, true))
            .into()
    }

    fn edfa(&mut self) -> DispatchNode {
        let key = "lpr.edfa";
        let laser = vec![
            self.leaf(format!("{}.laser.pump_temperature", key), Kind::ReadOnly, Format::Float, Point::LaserPumpTemperature),
            self.leaf(format!("{}.laser.drive_current", key), Kind::ReadOnly, Format::Float, Point::LaserDriveCurrent),
            self.leaf(
                format!("{}.laser.photodetector_current", key),
                Kind::ReadOnly,
                Format::Float,
                Point::LaserPhotodetectorCurrent,
            ),
        ];
        let photodetector = vec![
            self.leaf(format!("{}.photodetector.current", key), Kind::ReadOnly, Format::Float, Point::PhotodetectorCurrent),
            self.leaf(
                format!("{}.photodetector.coefficient", key),
                Kind::ReadWrite,
                Format::Float,
                Point::PhotodetectorCoefficient,
            ),
            self.leaf(format!("{}.photodetector.power", key), Kind::ReadOnly, Format::Float, Point::PhotodetectorPower),
        ];
        let modulation_value = self.push(Endpoint::new(
            format!("{}.modulation_input.value", key),
            Kind::ReadWrite,
            Format::Float,
            Point::ModulationInput,
        ));
        let modulation = vec![
            DispatchNode::Leaf(modulation_value),
            self.leaf(
                format!("{}.modulation_input.reset_strobe", key),
                Kind::WriteOnly,
                Format::Byte,
                Point::ModulationDacResetStrobe,
            ),
        ];

        let mut driver = Endpoint::new(EDFA_DRIVER_STATE_KEY, Kind::ReadOnly, Format::Byte, Point::EdfaDriverState);
        if self.config.lpr.driver_alarm_action {
            driver = driver.with_corrective(CorrectiveAction {
                target: modulation_value,
                value: Value::Float(0.0),
            });
        }
        let driver = DispatchNode::Leaf(self.push(driver));

        let children = vec![
            Branch::new("laser", LASER_MODULES, laser).into(),
            Branch::new("photodetector", PHOTODETECTOR_MODULES, photodetector).into(),
            Branch::new("modulation input", MODULATION_INPUT_MODULES, modulation).into(),
            driver,
        ];
        Branch::new("EDFA", EDFA_MODULES, children)
            .with_available(self.available(key, true))
            .into()
    }
}
