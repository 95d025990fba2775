//! Front-end configuration
//!
//! Loaded once at startup through [`common::config_loader::load_layered`]:
//! defaults, then the config file, then `FEMC_` environment variables.
//! Endpoint and node settings are looked up by dotted section key through
//! [`ConfigSource`], e.g. `cart3.pol0.sb1.lna.st2.drain_voltage`. Cartridges
//! are keyed by band number, so `cart3` is the cartridge in slot 2.

use std::collections::BTreeMap;
use std::path::Path;

use common::config_loader::load_layered;
use errors::{config_error, FemcResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::can::rca::CARTRIDGES_NUMBER;
use crate::endpoint::alarm::{Band, MonitorBands, SetLimits};
use crate::hardware::lpr::EDFA_PD_POWER_COEFF_DEFAULT;
use crate::hardware::serial::DEFAULT_READY_POLLS;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "FEMC_";

/// Key of the EDFA driver state endpoint
pub const EDFA_DRIVER_STATE_KEY: &str = "lpr.edfa.driver_state";

const DEFAULT_HEATER_COOLDOWN_MS: u64 = 10_000;

/// Cartridge power state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CartridgeState {
    Error,
    Off,
    On,
    Initing,
    #[default]
    Ready,
    #[serde(rename = "GO_STANDBY2")]
    GoStandby2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartridgeConfig {
    pub available: bool,
    pub state: CartridgeState,
    pub standby2: bool,
    /// SIS current sense resistor in ohms; band default when absent
    pub sense_resistor: Option<f32>,
    /// Heater re-enable cooldown; band default when absent, 0 disables it
    pub heater_cooldown_ms: Option<u64>,
}

impl Default for CartridgeConfig {
    fn default() -> Self {
        Self {
            available: true,
            state: CartridgeState::Ready,
            standby2: false,
            sense_resistor: None,
            heater_cooldown_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LprConfig {
    pub available: bool,
    pub photodetector_coefficient: f32,
    /// Force the modulation input to zero when the EDFA driver reports an error
    pub driver_alarm_action: bool,
}

impl Default for LprConfig {
    fn default() -> Self {
        Self {
            available: true,
            photodetector_coefficient: EDFA_PD_POWER_COEFF_DEFAULT,
            driver_alarm_action: true,
        }
    }
}

/// Per-section settings
///
/// Dispatch branches only use `available`; endpoints use all of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub available: bool,
    pub limits: SetLimits,
    pub bands: MonitorBands,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            available: true,
            limits: SetLimits::default(),
            bands: MonitorBands::default(),
        }
    }
}

/// Key/value lookup consumed by the front-end builder
pub trait ConfigSource {
    fn load(&self, key: &str) -> Option<EndpointConfig>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontEndConfig {
    /// Bound on every register ready poll
    pub ready_polls: u32,
    /// Slots 0-9, i.e. bands 1-10
    pub cartridges: Vec<CartridgeConfig>,
    pub lpr: LprConfig,
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

impl Default for FrontEndConfig {
    fn default() -> Self {
        let mut endpoints = BTreeMap::new();
        endpoints.insert(
            EDFA_DRIVER_STATE_KEY.to_string(),
            EndpointConfig {
                bands: MonitorBands {
                    error: Band {
                        low: None,
                        high: Some(0.5),
                    },
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        Self {
            ready_polls: DEFAULT_READY_POLLS,
            cartridges: vec![CartridgeConfig::default(); CARTRIDGES_NUMBER],
            lpr: LprConfig::default(),
            endpoints,
        }
    }
}

impl ConfigSource for FrontEndConfig {
    fn load(&self, key: &str) -> Option<EndpointConfig> {
        let found = self.endpoints.get(key).cloned();
        if found.is_some() {
            debug!(key, "Section configured");
        }
        found
    }
}

impl FrontEndConfig {
    /// Load with the layered sources, then validate
    pub fn load(path: Option<&Path>) -> FemcResult<Self> {
        let config: Self = load_layered(path, ENV_PREFIX)?;
        config.validate()?;
        info!(
            cartridges = config.cartridges.len(),
            sections = config.endpoints.len(),
            lpr = config.lpr.available,
            "Front-end configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> FemcResult<()> {
        if self.ready_polls == 0 {
            return Err(config_error!("ready_polls must be at least 1"));
        }
        if self.cartridges.len() > CARTRIDGES_NUMBER {
            return Err(config_error!(
                "{} cartridges configured, at most {}",
                self.cartridges.len(),
                CARTRIDGES_NUMBER
            ));
        }
        for (slot, cartridge) in self.cartridges.iter().enumerate() {
            if let Some(r) = cartridge.sense_resistor {
                if !r.is_finite() || r <= 0.0 {
                    return Err(config_error!("cart{}: sense resistor {} not positive", slot + 1, r));
                }
            }
        }
        if !self.lpr.photodetector_coefficient.is_finite() {
            return Err(config_error!("lpr: photodetector coefficient not finite"));
        }
        for (key, section) in &self.endpoints {
            if let (Some(min), Some(max)) = (section.limits.min, section.limits.max) {
                if min > max {
                    return Err(config_error!("{}: limits min {} > max {}", key, min, max));
                }
            }
        }
        Ok(())
    }

    /// Settings for slot `slot`; slots missing from the file use defaults
    pub fn cartridge(&self, slot: usize) -> CartridgeConfig {
        self.cartridges.get(slot).cloned().unwrap_or_default()
    }

    pub fn sense_resistor(&self, slot: usize) -> f32 {
        self.cartridge(slot)
            .sense_resistor
            .unwrap_or_else(|| default_sense_resistor(band(slot)))
    }

    /// Heater cooldown in milliseconds, `None` when not rate limited
    pub fn heater_cooldown_ms(&self, slot: usize) -> Option<u64> {
        let configured = self.cartridge(slot).heater_cooldown_ms;
        let ms = configured.or_else(|| (band(slot) == 9).then_some(DEFAULT_HEATER_COOLDOWN_MS))?;
        (ms > 0).then_some(ms)
    }
}

/// Band number of a cartridge slot
pub fn band(slot: usize) -> usize {
    slot + 1
}

/// Section key of a cartridge slot
pub fn cartridge_key(slot: usize) -> String {
    format!("cart{}", band(slot))
}

pub fn default_sense_resistor(band: usize) -> f32 {
    match band {
        3 | 4 | 6 | 8 => 5.0,
        5 => 5.1,
        7 => 50.0,
        9 | 10 => 10.0,
        _ => 1.0,
    }
}

pub fn has_sis(band: usize) -> bool {
    band >= 3
}

pub fn has_sis_magnet(band: usize) -> bool {
    band >= 5
}

pub fn has_sis_heater(band: usize) -> bool {
    band >= 3
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FrontEndConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cartridges.len(), 10);
        assert_eq!(config.sense_resistor(4), 5.1);
        assert_eq!(config.sense_resistor(6), 50.0);
        assert_eq!(config.sense_resistor(0), 1.0);
        assert_eq!(config.heater_cooldown_ms(8), Some(10_000));
        assert_eq!(config.heater_cooldown_ms(2), None);
        let driver = config.load(EDFA_DRIVER_STATE_KEY).unwrap();
        assert_eq!(driver.bands.error.high, Some(0.5));
    }

    #[test]
    fn test_band_presence() {
        assert!(!has_sis(2));
        assert!(has_sis(3));
        assert!(!has_sis_magnet(4));
        assert!(has_sis_magnet(5));
        assert_eq!(cartridge_key(2), "cart3");
    }

    #[test]
    fn test_cooldown_override() {
        let mut config = FrontEndConfig::default();
        config.cartridges[8].heater_cooldown_ms = Some(0);
        config.cartridges[3].heater_cooldown_ms = Some(500);
        assert_eq!(config.heater_cooldown_ms(8), None);
        assert_eq!(config.heater_cooldown_ms(3), Some(500));
    }

    #[test]
    fn test_validation() {
        let mut config = FrontEndConfig::default();
        config.endpoints.insert(
            "cart3.pol0.sb0.sis.voltage".into(),
            EndpointConfig {
                limits: SetLimits {
                    min: Some(5.0),
                    max: Some(1.0),
                },
                ..Default::default()
            },
        );
        assert!(config.validate().is_err());

        let mut config = FrontEndConfig::default();
        config.cartridges[0].sense_resistor = Some(0.0);
        assert!(config.validate().is_err());

        let config = FrontEndConfig {
            cartridges: vec![CartridgeConfig::default(); 11],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_state_serde_names() {
        let state: CartridgeState = serde_yaml::from_str("GO_STANDBY2").unwrap();
        assert_eq!(state, CartridgeState::GoStandby2);
        assert_eq!(serde_json::to_string(&CartridgeState::Initing).unwrap(), "\"INITING\"");
    }
}
