//! Dispatch error type
//!
//! Every rejection on the request path is a [`DispatchError`]. It maps to
//! exactly one reply [`Status`] and carries the shared error capabilities
//! through [`FemcErrorTrait`].

use errors::{ErrorCategory, FemcError, FemcErrorTrait};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::can::Status;
use crate::hardware::HardwareError;

/// Request path failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    // ======================================
    // Addressing Errors
    // ======================================
    #[error("RCA 0x{rca:05X}: {node} index {index} out of {size}")]
    AddressRange {
        rca: u32,
        node: String,
        index: u32,
        size: usize,
    },

    #[error("Hardware not installed: {0}")]
    HardwareNotInstalled(String),

    #[error("No monitor access at RCA 0x{0:05X}")]
    MonitorRange(u32),

    // ======================================
    // Validation Errors
    // ======================================
    #[error("Control rejected: {0}")]
    ControlRange(String),

    // ======================================
    // Interlock Errors
    // ======================================
    #[error("Hardware blocked: {0}")]
    HardwareBlocked(String),

    #[error("Cartridge {0} in error state")]
    CartridgeFault(u8),

    // ======================================
    // Hardware Errors
    // ======================================
    #[error(transparent)]
    Hardware(#[from] HardwareError),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

impl DispatchError {
    /// Reply status for this rejection
    pub fn status(&self) -> Status {
        match self {
            Self::AddressRange { .. } | Self::HardwareNotInstalled(_) => Status::HardwareRange,
            Self::MonitorRange(_) => Status::MonitorCanRange,
            Self::ControlRange(_) => Status::ControlErrorRange,
            Self::HardwareBlocked(_) => Status::HardwareBlocked,
            Self::CartridgeFault(_) | Self::Hardware(_) => Status::Error,
        }
    }

    /// Log at the level the error category calls for
    pub fn log(&self, rca: u32) {
        let code = self.error_code();
        match self.log_level() {
            tracing::Level::ERROR => error!(rca, code, "{}", self),
            tracing::Level::WARN => warn!(rca, code, "{}", self),
            _ => debug!(rca, code, "{}", self),
        }
    }
}

impl FemcErrorTrait for DispatchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::AddressRange { .. } => "ADDRESS_RANGE",
            Self::HardwareNotInstalled(_) => "NOT_INSTALLED",
            Self::MonitorRange(_) => "MONITOR_RANGE",
            Self::ControlRange(_) => "CONTROL_RANGE",
            Self::HardwareBlocked(_) => "HARDWARE_BLOCKED",
            Self::CartridgeFault(_) => "CARTRIDGE_FAULT",
            Self::Hardware(HardwareError::Timeout { .. }) => "TIMEOUT",
            Self::Hardware(_) => "HARDWARE_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::AddressRange { .. } | Self::HardwareNotInstalled(_) | Self::MonitorRange(_) => {
                ErrorCategory::Addressing
            },
            Self::ControlRange(_) => ErrorCategory::Validation,
            Self::HardwareBlocked(_) | Self::CartridgeFault(_) => ErrorCategory::Interlock,
            Self::Hardware(HardwareError::Timeout { .. }) => ErrorCategory::Timeout,
            Self::Hardware(_) => ErrorCategory::Hardware,
        }
    }
}

impl From<DispatchError> for FemcError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::AddressRange { rca, node, index, size } => FemcError::AddressRange {
                rca,
                reason: format!("{} index {} out of {}", node, index, size),
            },
            DispatchError::HardwareNotInstalled(what) => FemcError::NotInstalled(what),
            DispatchError::HardwareBlocked(why) => FemcError::Blocked(why),
            DispatchError::Hardware(HardwareError::Timeout { port, polls }) => {
                FemcError::Timeout(format!("port {} after {} polls", port, polls))
            },
            other => FemcError::Validation(other.to_string()),
        }
    }
}
