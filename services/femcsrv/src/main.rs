//! Front-end monitor and control service
//!
//! Serves line-delimited JSON requests from stdin or a file against a front
//! end built over the simulated register bus, one request at a time.

mod bootstrap;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use femcsrv::endpoint::timer::SystemClock;
use femcsrv::hardware::SimulatedBus;
use femcsrv::{service, FrontEnd, FrontEndConfig};

use bootstrap::{Args, SERVICE_NAME};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    bootstrap::initialize_logging(&args)?;

    let config_path = args.service.get_config_path(SERVICE_NAME);
    let config = FrontEndConfig::load(Some(Path::new(&config_path)))?;

    // Validation mode: validate and exit
    if args.service.validate {
        info!("Configuration {} is valid", config_path);
        return Ok(());
    }

    let mut frontend = FrontEnd::new(&config, SimulatedBus::idle_front_end(), Arc::new(SystemClock));

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => {
            info!("Reading requests from {}", path.display());
            Box::new(BufReader::new(tokio::fs::File::open(path).await?))
        },
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let mut lines = reader.lines();
    let mut stdout = tokio::io::stdout();

    info!("{} ready", SERVICE_NAME);
    let mut served = 0u64;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let output = service::process_line(&mut frontend, &line);
                stdout.write_all(format!("{}\n", output).as_bytes()).await?;
                stdout.flush().await?;
                served += 1;
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            },
        }
    }

    debug!(served, "Input closed");
    info!("{} stopped", SERVICE_NAME);
    Ok(())
}
