//! Reply status codes
//!
//! The numeric values are part of the bus contract with the master
//! controller. Two names share `-10`: a control value outside its limits and
//! a monitored value inside its error band are reported with the same code,
//! the request direction tells them apart.

use serde::{Serialize, Serializer};

/// Status attached to every reply and to every cached control message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// `NO_ERROR`
    #[default]
    NoError,
    /// `ERROR`: the register transaction failed
    Error,
    /// `HARDW_RNG_ERR`: address out of range or hardware not installed
    HardwareRange,
    /// `HARDW_BLKD_ERR`: blocked by an interlock, a rate limit or the power state
    HardwareBlocked,
    /// `MON_ERROR_RNG`: monitored value inside the error band
    MonitorErrorRange,
    /// `MON_WARN_RNG`: monitored value inside the warning band
    MonitorWarningRange,
    /// `MON_CAN_RNG`: nothing to monitor at this address
    MonitorCanRange,
    /// `CON_ERROR_RNG`: control value outside the configured limits
    ControlErrorRange,
    /// `MON_ERROR_ACT`: error band reached and a corrective action was applied
    MonitorErrorAction,
}

impl Status {
    /// Wire code, one signed byte
    pub const fn code(self) -> i8 {
        match self {
            Self::NoError => 0,
            Self::Error => -1,
            Self::HardwareRange => -2,
            Self::HardwareBlocked => -3,
            Self::MonitorErrorRange => -10,
            Self::MonitorWarningRange => -11,
            Self::MonitorCanRange => -12,
            Self::ControlErrorRange => -10,
            Self::MonitorErrorAction => -13,
        }
    }

    /// Name used by the bus documentation
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoError => "NO_ERROR",
            Self::Error => "ERROR",
            Self::HardwareRange => "HARDW_RNG_ERR",
            Self::HardwareBlocked => "HARDW_BLKD_ERR",
            Self::MonitorErrorRange => "MON_ERROR_RNG",
            Self::MonitorWarningRange => "MON_WARN_RNG",
            Self::MonitorCanRange => "MON_CAN_RNG",
            Self::ControlErrorRange => "CON_ERROR_RNG",
            Self::MonitorErrorAction => "MON_ERROR_ACT",
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::NoError)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
