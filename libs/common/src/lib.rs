//! Front-end M&C basic library
//!
//! Provides functions shared by the services of the workspace:
//! - logging bootstrap
//! - configuration loading helpers
//! - command-line arguments

pub mod config_loader;
pub mod logging;

// Bootstrap modules
pub mod bootstrap_args;

// Re-export common dependencies
pub use anyhow;
pub use serde;
pub use serde_json;

// Re-export CLI dependencies when cli feature is enabled
#[cfg(feature = "cli")]
pub use clap;

#[cfg(feature = "cli")]
pub use clap::Parser;
