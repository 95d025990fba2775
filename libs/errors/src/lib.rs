//! Unified error handling for the front-end M&C services
//!
//! Every crate in the workspace either returns [`FemcError`] directly or keeps
//! its own domain error and implements [`FemcErrorTrait`] so that logging and
//! retry decisions stay uniform.

use thiserror::Error;

// ============================================================================
// FemcError - Main error type
// ============================================================================

/// Main error type for the front-end M&C services
#[derive(Debug, Error)]
pub enum FemcError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // ======================================
    // Addressing Errors
    // ======================================
    #[error("Address out of range: rca 0x{rca:05X}: {reason}")]
    AddressRange { rca: u32, reason: String },

    #[error("Hardware not installed: {0}")]
    NotInstalled(String),

    // ======================================
    // Validation Errors
    // ======================================
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        value: String,
        min: String,
        max: String,
    },

    // ======================================
    // Hardware Errors
    // ======================================
    #[error("Hardware error: {0}")]
    Hardware(String),

    #[error("Timeout waiting for {0}")]
    Timeout(String),

    #[error("Hardware blocked: {0}")]
    Blocked(String),

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {file}: {error}")]
    ParseError { file: String, error: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ======================================
    // Service & Runtime Errors
    // ======================================
    #[error("Service startup failed: {0}")]
    StartupFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    // ======================================
    // Catch-all for other errors
    // ======================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using FemcError
pub type FemcResult<T> = Result<T, FemcError>;

// Conversion traits for common error types
impl From<serde_json::Error> for FemcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for FemcError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}

impl From<figment::Error> for FemcError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<std::num::ParseIntError> for FemcError {
    fn from(err: std::num::ParseIntError) -> Self {
        Self::Validation(format!("Invalid integer: {}", err))
    }
}

impl From<std::num::ParseFloatError> for FemcError {
    fn from(err: std::num::ParseFloatError) -> Self {
        Self::Validation(format!("Invalid float: {}", err))
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::FemcError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::FemcError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::FemcError::Validation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::FemcError::Validation(format!($fmt, $($arg)*))
    };
}

// ============================================================================
// FemcError implements FemcErrorTrait
// ============================================================================

impl FemcErrorTrait for FemcError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::MissingConfig(_) => "MISSING_CONFIG",
            Self::AddressRange { .. } => "ADDRESS_RANGE",
            Self::NotInstalled(_) => "NOT_INSTALLED",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::OutOfRange { .. } => "OUT_OF_RANGE",
            Self::Hardware(_) => "HARDWARE_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Blocked(_) => "HARDWARE_BLOCKED",
            Self::Io(_) => "IO_ERROR",
            Self::ParseError { .. } => "PARSE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Deserialization(_) => "DESERIALIZATION_ERROR",
            Self::StartupFailed(_) => "STARTUP_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "OTHER_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } | Self::MissingConfig(_) => {
                ErrorCategory::Configuration
            },

            Self::AddressRange { .. } | Self::NotInstalled(_) => ErrorCategory::Addressing,

            Self::Validation(_) | Self::OutOfRange { .. } => ErrorCategory::Validation,

            Self::Hardware(_) => ErrorCategory::Hardware,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Blocked(_) => ErrorCategory::Interlock,

            Self::Io(_)
            | Self::ParseError { .. }
            | Self::Serialization(_)
            | Self::Deserialization(_)
            | Self::StartupFailed(_)
            | Self::Internal(_) => ErrorCategory::Internal,

            Self::Other(_) => ErrorCategory::Unknown,
        }
    }
}

// ============================================================================
// Error Trait - Architectural layer
// ============================================================================

/// Error category enum - used for classification and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    // Infrastructure layer
    Configuration,
    Internal,

    // Request layer
    Addressing,
    Validation,
    Interlock,

    // Hardware layer
    Hardware,
    Timeout,

    // Others
    Unknown,
}

/// Error capability trait
///
/// Each crate can keep its own domain-specific error type (e.g. the dispatch
/// error of the M&C core) and gain the shared behaviour by implementing this
/// trait. Only `error_code` and `category` are required.
pub trait FemcErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs and replies)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Whether the error is retryable (default implementation is category-based)
    ///
    /// Register transactions are never retried above the bounded ready poll,
    /// so only a timed out poll is worth another attempt by the requester.
    fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Timeout)
    }

    /// Recommended retry delay in milliseconds
    fn retry_delay_ms(&self) -> u64 {
        match self.category() {
            ErrorCategory::Timeout => 100,
            _ => 0,
        }
    }

    /// Maximum retry attempts
    fn max_retries(&self) -> u32 {
        if self.is_retryable() {
            3
        } else {
            0
        }
    }

    /// Get log level
    fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Hardware => Level::ERROR,
            ErrorCategory::Timeout
            | ErrorCategory::Interlock
            | ErrorCategory::Addressing
            | ErrorCategory::Validation
            | ErrorCategory::Configuration => Level::WARN,
            ErrorCategory::Unknown => Level::WARN,
        }
    }

    /// Whether an alert should be triggered
    fn should_alert(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Internal | ErrorCategory::Hardware
        )
    }
}
