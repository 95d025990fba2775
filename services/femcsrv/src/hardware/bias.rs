//! Bias module register layouts
//!
//! Every register is an explicit fixed-width word. The `encode` functions
//! return the unshifted data; the serial layer adds the latch bits given by
//! the `*_SHIFT` constants.

use super::HardwareError;

// ============================================================================
// Command words (Po = polarization, Da = DAC, Rg = register)
// ============================================================================

pub const AREG: u8 = 0;
pub const BREG: u8 = 1;
pub const DAC1: u8 = 0;
pub const DAC2: u8 = 1;

pub const fn adc_convert_strobe(po: u8) -> u8 {
    0x10 * po + 0x03
}

pub const fn dac_data_write(po: u8, da: u8) -> u8 {
    0x10 * po + da + 0x04
}

pub const fn adc_data_read(po: u8) -> u8 {
    0x10 * po + 0x06
}

pub const fn parallel_write(po: u8, rg: u8) -> u8 {
    0x10 * po + rg + 0x08
}

pub const fn parallel_read(po: u8) -> u8 {
    0x10 * po + 0x0A
}

pub const fn dac_reset_strobe(po: u8, da: u8) -> u8 {
    0x10 * po + da
}

pub const fn dac_clear_strobe(po: u8) -> u8 {
    0x10 * po + 0x02
}

// ============================================================================
// Word sizes
// ============================================================================

pub const AREG_SIZE: u8 = 13;
pub const AREG_SHIFT: u8 = 1;
pub const BREG_SIZE: u8 = 9;
pub const BREG_SHIFT: u8 = 1;
pub const STATUS_SIZE: u8 = 4;
pub const ADC_STROBE_SIZE: u8 = 3;
pub const ADC_DATA_SIZE: u8 = 18;
pub const DAC_STROBE_SIZE: u8 = 1;
pub const DAC1_SIZE: u8 = 26;
pub const DAC1_SHIFT: u8 = 2;
pub const DAC2_SIZE: u8 = 29;
pub const DAC2_SHIFT: u8 = 5;

pub const ADC_RANGE: f32 = 65536.0;
pub const DAC1_RANGE: f32 = 16384.0;
pub const DAC2_RANGE: f32 = 65536.0;

// ADC full scale per monitor point
pub const ADC_SIS_I_SCALE: f32 = 20.0;
pub const ADC_SIS_V_SCALE: f32 = 50.0;
pub const ADC_MAGNET_I_SCALE: f32 = 250.0;
pub const ADC_MAGNET_V_SCALE: f32 = 10.0;
pub const ADC_LNA_DRAIN_V_SCALE: f32 = 10.0;
pub const ADC_LNA_DRAIN_I_SCALE: f32 = 100.0;
pub const ADC_LNA_GATE_V_SCALE: f32 = 10.0;
pub const ADC_HEATER_I_SCALE: f32 = 425.0;

// ============================================================================
// AREG: monitor point selection (12 bits)
// ============================================================================

/// LNA stage quantity selected through `lnaPoint`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LnaQuantity {
    DrainVoltage = 0,
    DrainCurrent = 1,
    GateVoltage = 2,
}

/// Analog quantity reachable through the bias ADC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogPoint {
    SisVoltage { sideband: u8 },
    SisCurrent { sideband: u8 },
    MagnetVoltage { sideband: u8 },
    MagnetCurrent { sideband: u8 },
    Lna {
        sideband: u8,
        stage: u8,
        quantity: LnaQuantity,
    },
    HeaterCurrent,
}

impl AnalogPoint {
    /// AREG contents selecting this point
    ///
    /// Layout: lnaStage[1:0], lnaPoint[4:2], tempSensor[6:5],
    /// monitorPoint[10:7].
    pub fn areg(self) -> u64 {
        let (stage, lna_point, monitor_point) = match self {
            Self::SisVoltage { sideband } => (0, 0, 2 * sideband + 1),
            Self::SisCurrent { sideband } => (0, 0, 2 * sideband + 2),
            Self::MagnetVoltage { sideband } => (0, 0, 2 * sideband + 5),
            Self::MagnetCurrent { sideband } => (0, 0, 2 * sideband + 6),
            Self::Lna {
                sideband,
                stage,
                quantity,
            } => (stage, (3 * sideband + quantity as u8 + 4) & 0x07, 0),
            Self::HeaterCurrent => (0, 0, 0x09),
        };
        u64::from(stage & 0x03)
            | u64::from(lna_point & 0x07) << 2
            | u64::from(monitor_point & 0x0F) << 7
    }

    /// Convert a raw ADC sample to engineering units
    ///
    /// `sense_resistor` only applies to the SIS current.
    pub fn scale(self, adc: i16, sense_resistor: f32) -> f32 {
        let fraction = f32::from(adc) / ADC_RANGE;
        match self {
            Self::SisVoltage { .. } => ADC_SIS_V_SCALE * fraction,
            Self::SisCurrent { .. } => ADC_SIS_I_SCALE * fraction / sense_resistor,
            Self::MagnetVoltage { .. } => ADC_MAGNET_V_SCALE * fraction,
            Self::MagnetCurrent { .. } => ADC_MAGNET_I_SCALE * fraction,
            Self::Lna { quantity, .. } => match quantity {
                LnaQuantity::DrainVoltage => ADC_LNA_DRAIN_V_SCALE * fraction,
                LnaQuantity::DrainCurrent => ADC_LNA_DRAIN_I_SCALE * fraction,
                LnaQuantity::GateVoltage => ADC_LNA_GATE_V_SCALE * fraction,
            },
            Self::HeaterCurrent => ADC_HEATER_I_SCALE * fraction,
        }
    }
}

/// The ADC returns 18 bits; the top two are for internal use
pub fn adc_sample(raw: u64) -> i16 {
    (raw & 0xFFFF) as u16 as i16
}

// ============================================================================
// BREG: state register (8 bits)
// ============================================================================

/// Shadow of the write-only BREG
///
/// Layout: heater[0], LNA LED[1], SIS mode[3:2], LNA enable[5:4]. The
/// two-bit fields are indexed with the mask `2 - sideband`, so sideband 0
/// owns the upper bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Breg(u8);

impl Breg {
    const HEATER: u8 = 0x01;
    const LNA_LED: u8 = 0x02;
    const SIS_MODE_SHIFT: u8 = 2;
    const LNA_ENABLE_SHIFT: u8 = 4;

    fn sideband_mask(sideband: u8) -> u8 {
        (2 - sideband.min(1)) & 0x03
    }

    fn with(self, mask: u8, on: bool) -> Self {
        if on {
            Self(self.0 | mask)
        } else {
            Self(self.0 & !mask)
        }
    }

    pub fn raw(self) -> u8 {
        self.0
    }

    pub fn heater(self) -> bool {
        self.0 & Self::HEATER != 0
    }

    pub fn with_heater(self, on: bool) -> Self {
        self.with(Self::HEATER, on)
    }

    pub fn lna_led(self) -> bool {
        self.0 & Self::LNA_LED != 0
    }

    pub fn with_lna_led(self, on: bool) -> Self {
        self.with(Self::LNA_LED, on)
    }

    pub fn sis_open_loop(self, sideband: u8) -> bool {
        self.0 & (Self::sideband_mask(sideband) << Self::SIS_MODE_SHIFT) != 0
    }

    pub fn with_sis_open_loop(self, sideband: u8, on: bool) -> Self {
        self.with(Self::sideband_mask(sideband) << Self::SIS_MODE_SHIFT, on)
    }

    pub fn lna_enable(self, sideband: u8) -> bool {
        self.0 & (Self::sideband_mask(sideband) << Self::LNA_ENABLE_SHIFT) != 0
    }

    pub fn with_lna_enable(self, sideband: u8, on: bool) -> Self {
        self.with(Self::sideband_mask(sideband) << Self::LNA_ENABLE_SHIFT, on)
    }

    pub fn encode(self) -> u64 {
        u64::from(self.0)
    }
}

// ============================================================================
// Status register (4 bits)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BiasStatus(pub u64);

impl BiasStatus {
    pub fn dac1_ready(self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn adc_ready(self) -> bool {
        self.0 & 0x08 != 0
    }
}

// ============================================================================
// DAC1: LNA stage drain set points
// ============================================================================

/// LNA quantities driven by DAC1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dac1Point {
    DrainVoltage = 0,
    DrainCurrent = 1,
}

const DAC1_INPUT_DATA_REGISTER: u64 = 3;

fn to_dac_code(value: f32, range: f32, max: u64, what: &'static str) -> Result<u64, HardwareError> {
    let code = value.floor();
    if !code.is_finite() || code < 0.0 || code >= range {
        return Err(HardwareError::ValueRange { what, value });
    }
    Ok((code as u64).min(max))
}

/// DAC1 word for an LNA stage set point
///
/// Layout: data[13:0], input register[15:14], channel[19:16],
/// readWrite[22] and toggle[23] both zero.
pub fn dac1_word(sideband: u8, stage: u8, point: Dac1Point, value: f32) -> Result<u64, HardwareError> {
    let (scaled, what) = match point {
        Dac1Point::DrainVoltage => (DAC1_RANGE * value / 5.0, "LNA drain voltage"),
        Dac1Point::DrainCurrent => (DAC1_RANGE * value / 50.0, "LNA drain current"),
    };
    let data = to_dac_code(scaled, DAC1_RANGE, 0x3FFF, what)?;
    let channel = u64::from(8 * point as u8 + 4 * sideband + stage) & 0x0F;
    Ok(data | DAC1_INPUT_DATA_REGISTER << 14 | channel << 16)
}

// ============================================================================
// DAC2: SIS voltage and magnet current set points
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dac2Point {
    SisVoltage,
    MagnetCurrent,
}

/// DAC2 word
///
/// Layout: data[15:0], quickLoad[21] zero, register[23:22] (`Sb` for the SIS
/// voltage, `Sb + 2` for the magnet current).
pub fn dac2_word(sideband: u8, point: Dac2Point, value: f32) -> Result<u64, HardwareError> {
    let (scaled, register, what) = match point {
        Dac2Point::SisVoltage => (DAC2_RANGE * (0.5 + value / 50.0), sideband, "SIS voltage"),
        Dac2Point::MagnetCurrent => (
            DAC2_RANGE * (0.5 + value / 250.0),
            sideband + 2,
            "SIS magnet current",
        ),
    };
    let data = to_dac_code(scaled, DAC2_RANGE, 0xFFFF, what)?;
    Ok(data | u64::from(register & 0x03) << 22)
}
