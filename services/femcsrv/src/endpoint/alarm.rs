//! Range checks: control set limits and monitor warning/error bands
//!
//! Every bound is optional; an absent bound never triggers.

use serde::{Deserialize, Serialize};

use crate::can::Status;

/// Inclusive `[min, max]` accepted for a control value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetLimits {
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl SetLimits {
    pub fn contains(&self, value: f32) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    pub fn is_set(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }
}

/// Inclusive `[low, high]` band considered normal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Band {
    pub low: Option<f32>,
    pub high: Option<f32>,
}

impl Band {
    pub fn contains(&self, value: f32) -> bool {
        self.low.map_or(true, |low| value >= low) && self.high.map_or(true, |high| value <= high)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorBands {
    pub warning: Band,
    pub error: Band,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alarm {
    Ok,
    Warning,
    Error,
}

/// Classify a monitored value; the error band wins over the warning band
pub fn classify(value: f32, bands: &MonitorBands) -> Alarm {
    if !bands.error.contains(value) {
        Alarm::Error
    } else if !bands.warning.contains(value) {
        Alarm::Warning
    } else {
        Alarm::Ok
    }
}

impl Alarm {
    /// Status after applying this classification to `status`
    ///
    /// An `Ok` classification leaves the status untouched, so a prior
    /// failure is never cleared.
    pub fn escalate(self, status: Status) -> Status {
        match self {
            Self::Ok => status,
            Self::Warning if status.is_ok() => Status::MonitorWarningRange,
            Self::Error if status.is_ok() || status == Status::MonitorWarningRange => {
                Status::MonitorErrorRange
            },
            _ => status,
        }
    }
}
