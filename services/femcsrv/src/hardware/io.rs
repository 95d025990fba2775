//! Front-end register access for every monitor and control point
//!
//! Owns the serial interface and the shadows of the write-only registers.
//! Register shadows are only updated after the hardware accepted the write,
//! so a failed transaction never leaves a shadow describing a state the
//! hardware is not in.

use tracing::{debug, info};

use super::bias::{self, AnalogPoint, Breg, Dac1Point, Dac2Point, LnaQuantity};
use super::lpr::{self, LprAnalogPoint, LprAreg, LprStatus};
use super::serial::{mux_port, SerialInterface};
use super::{HardwareError, Point, PointIo, RegisterBus, Value};
use crate::can::rca::{CARTRIDGES_NUMBER, LPR_MODULE};
use crate::dispatch::RoutingContext;

const POLARIZATIONS: usize = 2;
const SIDEBANDS: usize = 2;

/// Cartridges whose sideband 0 LNA enable also drives sideband 1
const LNA_MIRRORED_CARTRIDGES: [u8; 2] = [0, 1];

/// Register-level model of the whole front end
#[derive(Debug)]
pub struct FrontEndHardware<B> {
    serial: SerialInterface<B>,
    bias_breg: [[Breg; POLARIZATIONS]; CARTRIDGES_NUMBER],
    sense_resistors: [[[f32; SIDEBANDS]; POLARIZATIONS]; CARTRIDGES_NUMBER],
    lpr_areg: LprAreg,
    switch_port: u8,
    shutter: bool,
    photodetector_coefficient: f32,
    modulation_input: f32,
}

impl<B: RegisterBus> FrontEndHardware<B> {
    pub fn new(serial: SerialInterface<B>) -> Self {
        Self {
            serial,
            bias_breg: [[Breg::default(); POLARIZATIONS]; CARTRIDGES_NUMBER],
            sense_resistors: [[[1.0; SIDEBANDS]; POLARIZATIONS]; CARTRIDGES_NUMBER],
            lpr_areg: LprAreg::default(),
            switch_port: lpr::PORT_SHUTTERED,
            shutter: true,
            photodetector_coefficient: lpr::EDFA_PD_POWER_COEFF_DEFAULT,
            modulation_input: 0.0,
        }
    }

    pub fn serial(&self) -> &SerialInterface<B> {
        &self.serial
    }

    /// Sense resistor used to scale the SIS current of every sideband
    pub fn set_sense_resistor(&mut self, cartridge: usize, resistor: f32) {
        if let Some(per_pol) = self.sense_resistors.get_mut(cartridge) {
            for sidebands in per_pol.iter_mut() {
                sidebands.fill(resistor);
            }
        }
    }

    pub fn set_photodetector_coefficient(&mut self, coefficient: f32) {
        self.photodetector_coefficient = coefficient;
    }

    /// Current BREG shadow for a cartridge polarization
    pub fn breg(&self, cartridge: usize, polarization: usize) -> Breg {
        self.bias_breg
            .get(cartridge)
            .and_then(|p| p.get(polarization))
            .copied()
            .unwrap_or_default()
    }

    fn cartridge_index(ctx: &RoutingContext) -> usize {
        usize::from(ctx.module).min(CARTRIDGES_NUMBER - 1)
    }

    fn polarization_index(ctx: &RoutingContext) -> usize {
        usize::from(ctx.polarization).min(POLARIZATIONS - 1)
    }

    fn sideband_index(ctx: &RoutingContext) -> usize {
        usize::from(ctx.sideband).min(SIDEBANDS - 1)
    }

    // ========================================================================
    // Bias module
    // ========================================================================

    fn bias_port(ctx: &RoutingContext) -> u8 {
        mux_port(ctx.module, 0)
    }

    /// AREG select, convert strobe, ready poll, ADC read
    fn bias_analog(&mut self, ctx: &RoutingContext, point: AnalogPoint) -> Result<f32, HardwareError> {
        let port = Self::bias_port(ctx);
        let po = ctx.polarization;
        self.serial.write(
            port,
            bias::parallel_write(po, bias::AREG),
            point.areg(),
            bias::AREG_SIZE,
            bias::AREG_SHIFT,
        )?;
        self.serial
            .strobe(port, bias::adc_convert_strobe(po), bias::ADC_STROBE_SIZE)?;
        self.serial.poll_ready(
            port,
            bias::parallel_read(po),
            bias::STATUS_SIZE,
            |s| bias::BiasStatus(s).adc_ready(),
        )?;
        let raw = self
            .serial
            .read(port, bias::adc_data_read(po), bias::ADC_DATA_SIZE, 0)?;
        let resistor = self.sense_resistors[Self::cartridge_index(ctx)]
            [Self::polarization_index(ctx)][Self::sideband_index(ctx)];
        Ok(point.scale(bias::adc_sample(raw), resistor))
    }

    fn write_breg(&mut self, ctx: &RoutingContext, update: impl Fn(Breg) -> Breg) -> Result<(), HardwareError> {
        let (cart, pol) = (Self::cartridge_index(ctx), Self::polarization_index(ctx));
        let next = update(self.bias_breg[cart][pol]);
        self.serial.write(
            Self::bias_port(ctx),
            bias::parallel_write(ctx.polarization, bias::BREG),
            next.encode(),
            bias::BREG_SIZE,
            bias::BREG_SHIFT,
        )?;
        self.bias_breg[cart][pol] = next;
        Ok(())
    }

    fn write_dac1(&mut self, ctx: &RoutingContext, point: Dac1Point, value: f32) -> Result<(), HardwareError> {
        let word = bias::dac1_word(ctx.sideband, ctx.stage, point, value)?;
        let port = Self::bias_port(ctx);
        let po = ctx.polarization;
        self.serial.poll_ready(
            port,
            bias::parallel_read(po),
            bias::STATUS_SIZE,
            |s| bias::BiasStatus(s).dac1_ready(),
        )?;
        self.serial.write(
            port,
            bias::dac_data_write(po, bias::DAC1),
            word,
            bias::DAC1_SIZE,
            bias::DAC1_SHIFT,
        )
    }

    fn write_dac2(&mut self, ctx: &RoutingContext, point: Dac2Point, value: f32) -> Result<(), HardwareError> {
        let word = bias::dac2_word(ctx.sideband, point, value)?;
        self.serial.write(
            Self::bias_port(ctx),
            bias::dac_data_write(ctx.polarization, bias::DAC2),
            word,
            bias::DAC2_SIZE,
            bias::DAC2_SHIFT,
        )
    }

    fn lna_point(ctx: &RoutingContext, quantity: LnaQuantity) -> AnalogPoint {
        AnalogPoint::Lna {
            sideband: ctx.sideband,
            stage: ctx.stage,
            quantity,
        }
    }

    // ========================================================================
    // LPR
    // ========================================================================

    fn lpr_port() -> u8 {
        mux_port(LPR_MODULE as u8, 0)
    }

    fn lpr_status(&mut self) -> Result<LprStatus, HardwareError> {
        let raw = self
            .serial
            .read(Self::lpr_port(), lpr::PARALLEL_READ, lpr::STATUS_SIZE, 0)?;
        Ok(LprStatus(raw))
    }

    fn lpr_analog(&mut self, point: LprAnalogPoint) -> Result<f32, HardwareError> {
        let port = Self::lpr_port();
        self.serial.write(
            port,
            lpr::parallel_write(lpr::BREG),
            point.breg(),
            lpr::BREG_SIZE,
            lpr::BREG_SHIFT,
        )?;
        self.serial
            .strobe(port, lpr::ADC_CONVERT_STROBE, lpr::ADC_STROBE_SIZE)?;
        self.serial
            .poll_ready(port, lpr::PARALLEL_READ, lpr::STATUS_SIZE, |s| {
                LprStatus(s).adc_ready()
            })?;
        let raw = self
            .serial
            .read(port, lpr::ADC_DATA_READ, lpr::ADC_DATA_SIZE, 0)?;
        Ok(point.scale(bias::adc_sample(raw)))
    }

    /// Move the optical switch; `check_busy` is skipped for forced shutters
    fn move_switch(&mut self, port_value: u8, check_busy: bool) -> Result<(), HardwareError> {
        if port_value != lpr::PORT_SHUTTERED && port_value > lpr::MAX_SWITCH_PORT {
            return Err(HardwareError::ValueRange {
                what: "optical switch port",
                value: f32::from(port_value),
            });
        }
        if check_busy && self.lpr_status()?.switch_busy() {
            return Err(HardwareError::Busy("optical switch"));
        }
        let next = self.lpr_areg.with_port(port_value);
        let port = Self::lpr_port();
        self.serial.write(
            port,
            lpr::parallel_write(lpr::AREG),
            next.encode(),
            lpr::AREG_SIZE,
            lpr::AREG_SHIFT,
        )?;
        self.lpr_areg = next;
        self.serial.strobe(
            port,
            lpr::OPTICAL_SWITCH_STROBE,
            lpr::OPTICAL_SWITCH_STROBE_SIZE,
        )?;
        self.switch_port = port_value;
        self.shutter = port_value == lpr::PORT_SHUTTERED;
        debug!(port = port_value, "Optical switch moved");
        Ok(())
    }
}

impl<B: RegisterBus> PointIo for FrontEndHardware<B> {
    fn read(&mut self, point: Point, ctx: &RoutingContext) -> Result<Value, HardwareError> {
        let sb = ctx.sideband;
        let breg = self.breg(Self::cartridge_index(ctx), Self::polarization_index(ctx));
        let value = match point {
            Point::SisSenseResistor => Value::Float(
                self.sense_resistors[Self::cartridge_index(ctx)][Self::polarization_index(ctx)]
                    [Self::sideband_index(ctx)],
            ),
            Point::SisVoltage => Value::Float(self.bias_analog(ctx, AnalogPoint::SisVoltage { sideband: sb })?),
            Point::SisCurrent => Value::Float(self.bias_analog(ctx, AnalogPoint::SisCurrent { sideband: sb })?),
            Point::SisOpenLoop => Value::Byte(u8::from(breg.sis_open_loop(sb))),
            Point::SisMagnetVoltage => {
                Value::Float(self.bias_analog(ctx, AnalogPoint::MagnetVoltage { sideband: sb })?)
            },
            Point::SisMagnetCurrent => {
                Value::Float(self.bias_analog(ctx, AnalogPoint::MagnetCurrent { sideband: sb })?)
            },
            Point::LnaDrainVoltage => {
                Value::Float(self.bias_analog(ctx, Self::lna_point(ctx, LnaQuantity::DrainVoltage))?)
            },
            Point::LnaDrainCurrent => {
                Value::Float(self.bias_analog(ctx, Self::lna_point(ctx, LnaQuantity::DrainCurrent))?)
            },
            Point::LnaGateVoltage => {
                Value::Float(self.bias_analog(ctx, Self::lna_point(ctx, LnaQuantity::GateVoltage))?)
            },
            // Enable states have no read back; the BREG shadow is the state
            Point::LnaEnable => Value::Byte(u8::from(breg.lna_enable(sb))),
            Point::LnaLedEnable => Value::Byte(u8::from(breg.lna_led())),
            Point::SisHeaterEnable => Value::Byte(u8::from(breg.heater())),
            Point::SisHeaterCurrent => Value::Float(self.bias_analog(ctx, AnalogPoint::HeaterCurrent)?),

            Point::LprTemperature => Value::Float(self.lpr_analog(LprAnalogPoint::Temperature {
                sensor: ctx.sensor,
            })?),
            Point::OpticalSwitchPort => Value::Byte(self.switch_port),
            Point::OpticalSwitchState => Value::Byte(u8::from(self.lpr_status()?.switch_error())),
            Point::OpticalSwitchBusy => Value::Byte(u8::from(self.lpr_status()?.switch_busy())),
            Point::LaserPumpTemperature => Value::Float(self.lpr_analog(LprAnalogPoint::PumpTemperature)?),
            Point::LaserDriveCurrent => Value::Float(self.lpr_analog(LprAnalogPoint::LaserDriveCurrent)?),
            Point::LaserPhotodetectorCurrent => {
                Value::Float(self.lpr_analog(LprAnalogPoint::LaserPhotodetectorCurrent)?)
            },
            Point::PhotodetectorCurrent => {
                Value::Float(self.lpr_analog(LprAnalogPoint::EdfaPhotodetectorCurrent)?)
            },
            Point::PhotodetectorCoefficient => Value::Float(self.photodetector_coefficient),
            Point::PhotodetectorPower => {
                let coefficient = self.photodetector_coefficient;
                Value::Float(self.lpr_analog(LprAnalogPoint::EdfaPhotodetectorPower { coefficient })?)
            },
            Point::ModulationInput => Value::Float(self.modulation_input),
            Point::EdfaDriverState => Value::Byte(u8::from(self.lpr_status()?.driver_error())),

            Point::BiasDacResetStrobe
            | Point::BiasDacClearStrobe
            | Point::OpticalSwitchShutter
            | Point::OpticalSwitchForceShutter
            | Point::ModulationDacResetStrobe => return Err(HardwareError::Unsupported(point)),
        };
        Ok(value)
    }

    fn write(&mut self, point: Point, ctx: &RoutingContext, value: Value) -> Result<(), HardwareError> {
        let sb = ctx.sideband;
        let on = value.as_bool();
        match point {
            Point::SisVoltage => self.write_dac2(ctx, Dac2Point::SisVoltage, value.as_f32()),
            Point::SisMagnetCurrent => self.write_dac2(ctx, Dac2Point::MagnetCurrent, value.as_f32()),
            Point::SisOpenLoop => self.write_breg(ctx, |b| b.with_sis_open_loop(sb, on)),
            Point::LnaDrainVoltage => self.write_dac1(ctx, Dac1Point::DrainVoltage, value.as_f32()),
            Point::LnaDrainCurrent => self.write_dac1(ctx, Dac1Point::DrainCurrent, value.as_f32()),
            Point::LnaEnable => {
                let mirrored = sb == 0 && LNA_MIRRORED_CARTRIDGES.contains(&ctx.module);
                self.write_breg(ctx, |b| {
                    let b = b.with_lna_enable(sb, on);
                    if mirrored {
                        b.with_lna_enable(1, on)
                    } else {
                        b
                    }
                })
            },
            Point::LnaLedEnable => self.write_breg(ctx, |b| b.with_lna_led(on)),
            Point::SisHeaterEnable => self.write_breg(ctx, |b| b.with_heater(on)),
            Point::BiasDacResetStrobe => self.serial.strobe(
                Self::bias_port(ctx),
                bias::dac_reset_strobe(ctx.polarization, ctx.dac),
                bias::DAC_STROBE_SIZE,
            ),
            Point::BiasDacClearStrobe => self.serial.strobe(
                Self::bias_port(ctx),
                bias::dac_clear_strobe(ctx.polarization),
                bias::DAC_STROBE_SIZE,
            ),

            Point::OpticalSwitchPort => self.move_switch(value.as_byte(), true),
            Point::OpticalSwitchShutter => self.move_switch(lpr::PORT_SHUTTERED, true),
            Point::OpticalSwitchForceShutter => self.move_switch(lpr::PORT_SHUTTERED, false),
            Point::PhotodetectorCoefficient => {
                self.photodetector_coefficient = value.as_f32();
                info!(coefficient = self.photodetector_coefficient, "Photodetector coefficient updated");
                Ok(())
            },
            Point::ModulationInput => {
                let word = lpr::modulation_dac_word(value.as_f32())?;
                self.serial.write(
                    Self::lpr_port(),
                    lpr::DAC_DATA_WRITE,
                    word,
                    lpr::DAC_SIZE,
                    lpr::DAC_SHIFT,
                )?;
                self.modulation_input = value.as_f32();
                Ok(())
            },
            Point::ModulationDacResetStrobe => {
                self.serial
                    .strobe(Self::lpr_port(), lpr::DAC_RESET_STROBE, lpr::DAC_STROBE_SIZE)
            },

            Point::SisSenseResistor
            | Point::SisCurrent
            | Point::SisMagnetVoltage
            | Point::LnaGateVoltage
            | Point::SisHeaterCurrent
            | Point::LprTemperature
            | Point::OpticalSwitchState
            | Point::OpticalSwitchBusy
            | Point::LaserPumpTemperature
            | Point::LaserDriveCurrent
            | Point::LaserPhotodetectorCurrent
            | Point::PhotodetectorCurrent
            | Point::PhotodetectorPower
            | Point::EdfaDriverState => Err(HardwareError::Unsupported(point)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::hardware::simulated::{SimulatedBus, Transfer};

    fn hardware() -> (SimulatedBus, FrontEndHardware<SimulatedBus>) {
        let bus = SimulatedBus::idle_front_end();
        let hw = FrontEndHardware::new(SerialInterface::new(bus.clone(), 8));
        (bus, hw)
    }

    fn cart(module: u8, polarization: u8, sideband: u8) -> RoutingContext {
        RoutingContext {
            module,
            polarization,
            sideband,
            ..Default::default()
        }
    }

    #[test]
    fn test_bias_analog_sequence() {
        let (bus, mut hw) = hardware();
        let ctx = cart(2, 1, 0);
        let port = mux_port(2, 0);
        bus.set_read(port, bias::adc_data_read(1), 0x4000);

        let value = hw.read(Point::SisVoltage, &ctx).unwrap();
        assert_eq!(value, Value::Float(12.5));

        let commands: Vec<u8> = bus.transfers().iter().map(Transfer::command).collect();
        assert_eq!(
            commands,
            vec![
                bias::parallel_write(1, bias::AREG),
                bias::adc_convert_strobe(1),
                bias::parallel_read(1),
                bias::adc_data_read(1),
            ]
        );
        assert!(bus.transfers().iter().all(|t| t.port() == port));
    }

    #[test]
    fn test_sis_current_uses_sense_resistor() {
        let (bus, mut hw) = hardware();
        hw.set_sense_resistor(3, 5.0);
        bus.set_read(mux_port(3, 0), bias::adc_data_read(0), 0x4000);
        let value = hw.read(Point::SisCurrent, &cart(3, 0, 1)).unwrap();
        assert_eq!(value, Value::Float(1.0));
        assert_eq!(hw.read(Point::SisSenseResistor, &cart(3, 0, 1)).unwrap(), Value::Float(5.0));
    }

    #[test]
    fn test_adc_timeout() {
        let bus = SimulatedBus::new();
        let mut hw = FrontEndHardware::new(SerialInterface::new(bus.clone(), 3));
        let result = hw.read(Point::LnaGateVoltage, &cart(0, 0, 0));
        assert!(matches!(result, Err(HardwareError::Timeout { polls: 3, .. })));
    }

    #[test]
    fn test_breg_shadow_survives_failed_write() {
        let (bus, mut hw) = hardware();
        let ctx = cart(4, 0, 1);
        hw.write(Point::LnaEnable, &ctx, Value::Byte(1)).unwrap();
        assert!(hw.breg(4, 0).lna_enable(1));

        bus.fail_command(mux_port(4, 0), bias::parallel_write(0, bias::BREG));
        assert!(hw.write(Point::LnaLedEnable, &ctx, Value::Byte(1)).is_err());
        assert!(!hw.breg(4, 0).lna_led());
        assert_eq!(hw.read(Point::LnaEnable, &ctx).unwrap(), Value::Byte(1));
    }

    #[test]
    fn test_lna_enable_mirrored_on_low_bands() {
        let (_bus, mut hw) = hardware();
        hw.write(Point::LnaEnable, &cart(1, 0, 0), Value::Byte(1)).unwrap();
        assert!(hw.breg(1, 0).lna_enable(0));
        assert!(hw.breg(1, 0).lna_enable(1));

        hw.write(Point::LnaEnable, &cart(5, 0, 0), Value::Byte(1)).unwrap();
        assert!(hw.breg(5, 0).lna_enable(0));
        assert!(!hw.breg(5, 0).lna_enable(1));
    }

    #[test]
    fn test_dac1_waits_for_ready() {
        let (bus, mut hw) = hardware();
        let port = mux_port(6, 0);
        bus.queue_read(port, bias::parallel_read(0), 0);
        let ctx = RoutingContext {
            module: 6,
            stage: 1,
            ..Default::default()
        };
        hw.write(Point::LnaDrainVoltage, &ctx, Value::Float(1.0)).unwrap();

        let writes = bus.writes();
        assert_eq!(writes.len(), 1);
        let polls = bus
            .transfers()
            .iter()
            .filter(|t| t.command() == bias::parallel_read(0))
            .count();
        assert_eq!(polls, 2);
        match &writes[0] {
            Transfer::Out { command, data, bits, .. } => {
                assert_eq!(*command, bias::dac_data_write(0, bias::DAC1));
                assert_eq!(*bits, bias::DAC1_SIZE);
                assert_eq!((data >> 2) & 0x3FFF, 3276);
            },
            other => panic!("unexpected transfer {:?}", other),
        }
    }

    #[test]
    fn test_optical_switch_busy_blocks_move() {
        let (bus, mut hw) = hardware();
        bus.queue_read(23, lpr::PARALLEL_READ, 0x0A);
        let ctx = RoutingContext::default();
        assert!(matches!(
            hw.write(Point::OpticalSwitchPort, &ctx, Value::Byte(2)),
            Err(HardwareError::Busy(_))
        ));
        assert!(bus.writes().is_empty());

        hw.write(Point::OpticalSwitchPort, &ctx, Value::Byte(2)).unwrap();
        assert_eq!(hw.read(Point::OpticalSwitchPort, &ctx).unwrap(), Value::Byte(2));

        // Forced shutter skips the busy check
        bus.queue_read(23, lpr::PARALLEL_READ, 0x0A);
        hw.write(Point::OpticalSwitchForceShutter, &ctx, Value::Byte(1)).unwrap();
        assert_eq!(
            hw.read(Point::OpticalSwitchPort, &ctx).unwrap(),
            Value::Byte(lpr::PORT_SHUTTERED)
        );
    }

    #[test]
    fn test_photodetector_power_uses_coefficient() {
        let (bus, mut hw) = hardware();
        bus.set_read(23, lpr::ADC_DATA_READ, 0x4000);
        let ctx = RoutingContext::default();
        hw.write(Point::PhotodetectorCoefficient, &ctx, Value::Float(8.0)).unwrap();
        assert_eq!(hw.read(Point::PhotodetectorPower, &ctx).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_read_only_points_refuse_writes() {
        let (_bus, mut hw) = hardware();
        assert!(matches!(
            hw.write(Point::EdfaDriverState, &RoutingContext::default(), Value::Byte(0)),
            Err(HardwareError::Unsupported(Point::EdfaDriverState))
        ));
    }
}
