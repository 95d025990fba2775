//! LPR (local oscillator photonic receiver) register layouts

use super::HardwareError;

// Command words
pub const DAC_RESET_STROBE: u8 = 0x01;
pub const OPTICAL_SWITCH_STROBE: u8 = 0x02;
pub const ADC_CONVERT_STROBE: u8 = 0x03;
pub const DAC_DATA_WRITE: u8 = 0x05;
pub const ADC_DATA_READ: u8 = 0x06;
pub const PARALLEL_READ: u8 = 0x0A;
pub const AREG: u8 = 0;
pub const BREG: u8 = 1;

pub const fn parallel_write(rg: u8) -> u8 {
    0x08 + rg
}

// Word sizes
pub const AREG_SIZE: u8 = 9;
pub const AREG_SHIFT: u8 = 1;
pub const BREG_SIZE: u8 = 4;
pub const BREG_SHIFT: u8 = 1;
pub const STATUS_SIZE: u8 = 4;
pub const ADC_STROBE_SIZE: u8 = 3;
pub const ADC_DATA_SIZE: u8 = 18;
pub const DAC_STROBE_SIZE: u8 = 1;
pub const OPTICAL_SWITCH_STROBE_SIZE: u8 = 10;
pub const DAC_SIZE: u8 = 29;
pub const DAC_SHIFT: u8 = 5;

pub const ADC_RANGE: f32 = 65536.0;
pub const DAC_RANGE: f32 = 65536.0;

pub const ADC_TEMP_SCALE: f32 = 978.4736;
pub const ADC_DRIVE_CURRENT_SCALE: f32 = 800.0;
pub const ADC_LASER_PD_CURRENT_SCALE: f32 = 50.0;
pub const ADC_LASER_PD_CURRENT_OFFSET: f32 = 25.0;
pub const ADC_EDFA_PD_CURRENT_SCALE: f32 = 500.0;
pub const ADC_VOLTAGE_IN_SCALE: f32 = 5.0;
pub const EDFA_PD_POWER_COEFF_DEFAULT: f32 = 28.0;

/// Optical switch port value meaning "shuttered"
pub const PORT_SHUTTERED: u8 = 0xFF;
/// Highest selectable optical switch port
pub const MAX_SWITCH_PORT: u8 = 0x0F;

// Pump temperature polynomial in the sensor voltage
const PUMP_TEMP_COEFFS: [f64; 7] = [366.86, -175.09, 216.53, -175.61, 85.865, -22.96, 2.5741];

/// LPR AREG: port[4:0], modulation input enable[7]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LprAreg {
    pub port: u8,
    pub modulation_enable: bool,
}

impl LprAreg {
    const SHUTTER: u8 = 0x00;

    /// Port field for a switch port, shutter included
    pub fn with_port(self, port: u8) -> Self {
        let field = if port == PORT_SHUTTERED {
            Self::SHUTTER
        } else {
            0x10 + (port & 0x0F)
        };
        Self { port: field, ..self }
    }

    pub fn encode(self) -> u64 {
        u64::from(self.port & 0x1F) | u64::from(self.modulation_enable) << 7
    }
}

/// Monitor point selected through the LPR BREG
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LprAnalogPoint {
    LaserPhotodetectorCurrent,
    EdfaPhotodetectorCurrent,
    /// Same BREG selection as the current, scaled by the conversion coefficient
    EdfaPhotodetectorPower { coefficient: f32 },
    Temperature { sensor: u8 },
    LaserDriveCurrent,
    PumpTemperature,
}

impl LprAnalogPoint {
    /// BREG contents selecting this point
    pub fn breg(self) -> u64 {
        match self {
            Self::LaserPhotodetectorCurrent => 0x00,
            Self::EdfaPhotodetectorCurrent | Self::EdfaPhotodetectorPower { .. } => 0x01,
            Self::Temperature { sensor } => 0x02 + u64::from(sensor & 0x01),
            Self::LaserDriveCurrent => 0x04,
            Self::PumpTemperature => 0x05,
        }
    }

    pub fn scale(self, adc: i16) -> f32 {
        let fraction = f32::from(adc) / ADC_RANGE;
        match self {
            Self::LaserPhotodetectorCurrent => {
                ADC_LASER_PD_CURRENT_OFFSET - ADC_LASER_PD_CURRENT_SCALE * fraction
            },
            Self::EdfaPhotodetectorCurrent => ADC_EDFA_PD_CURRENT_SCALE * fraction,
            Self::EdfaPhotodetectorPower { coefficient } => coefficient * fraction,
            Self::Temperature { .. } => ADC_TEMP_SCALE * fraction,
            Self::LaserDriveCurrent => ADC_DRIVE_CURRENT_SCALE * fraction,
            Self::PumpTemperature => {
                let vin = f64::from(ADC_VOLTAGE_IN_SCALE * fraction);
                PUMP_TEMP_COEFFS
                    .iter()
                    .rev()
                    .fold(0.0, |acc, coeff| acc * vin + coeff) as f32
            },
        }
    }
}

/// LPR status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LprStatus(pub u64);

impl LprStatus {
    /// EDFA driver in error
    pub fn driver_error(self) -> bool {
        self.0 & 0x01 != 0
    }

    /// Optical switch moving
    pub fn switch_busy(self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn switch_error(self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn adc_ready(self) -> bool {
        self.0 & 0x08 != 0
    }
}

/// DAC word for the EDFA modulation input
///
/// Layout: data[15:0], quickLoad[21] zero, register[23] (A).
pub fn modulation_dac_word(volts: f32) -> Result<u64, HardwareError> {
    let scaled = DAC_RANGE * 0.2 * volts;
    if !scaled.is_finite() || scaled < 0.0 {
        return Err(HardwareError::ValueRange {
            what: "modulation input",
            value: volts,
        });
    }
    // Saturates at the top of the 16-bit range
    Ok((scaled as u64).min(0xFFFF))
}
