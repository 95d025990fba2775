//! Service bootstrap: command line and logging
//!
//! Uses the shared arguments and logging setup from `common`.

use std::path::PathBuf;

use clap::Parser;
use errors::{FemcError, FemcResult};

pub use common::bootstrap_args::ServiceArgs;

pub const SERVICE_NAME: &str = "femcsrv";

/// Command-line arguments for femcsrv
#[derive(Parser, Debug, Clone)]
#[command(
    name = "femcsrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Front-end monitor and control service",
    long_about = None
)]
pub struct Args {
    #[command(flatten)]
    pub service: ServiceArgs,

    /// Read requests from a file instead of stdin
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// Console only, no log files
    #[arg(long)]
    pub console_only: bool,
}

/// Initialize logging with command-line arguments
///
/// Log root directory priority:
/// 1. FEMC_LOG_DIR environment variable
/// 2. `logs`
pub fn initialize_logging(args: &Args) -> FemcResult<()> {
    let console_level = args.service.parse_log_level();
    let ansi = !args.service.no_color;

    // Validation runs never leave log files behind
    if args.console_only || args.service.validate {
        return common::logging::init_console(console_level, ansi)
            .map_err(|e| FemcError::Configuration(format!("Failed to init logging: {}", e)));
    }

    common::logging::init_log_root(None);
    let log_config = common::logging::LogConfig {
        service_name: SERVICE_NAME.to_string(),
        log_dir: common::logging::get_log_root().join(SERVICE_NAME),
        console_level,
        file_level: tracing::Level::DEBUG,
        enable_json: false,
        ansi,
    };
    common::logging::init_with_config(log_config)
        .map_err(|e| FemcError::Configuration(format!("Failed to init logging: {}", e)))
}
