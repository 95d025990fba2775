//! Line protocol spoken by the `femcsrv` binary
//!
//! Each input line is one JSON object: either a bus request
//! `{"rca": 73736, "data": [63, 128, 0, 0]}` or a maintenance command
//! `{"op": "standby2", "cartridge": 2, "enabled": true}` /
//! `{"op": "state", "cartridge": 2, "state": "OFF"}`. Each produces one JSON
//! output line.

use errors::{FemcError, FemcResult};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::warn;

use crate::config::CartridgeState;
use crate::frontend::FrontEnd;
use crate::hardware::RegisterBus;
use crate::Request;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Maintenance {
    Standby2 { cartridge: usize, enabled: bool },
    State { cartridge: usize, state: CartridgeState },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Maintenance(Maintenance),
    Request {
        rca: u32,
        #[serde(default)]
        data: Vec<u8>,
    },
}

impl Command {
    pub fn parse(line: &str) -> FemcResult<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Execute one command against the front end
pub fn execute<B: RegisterBus>(frontend: &mut FrontEnd<B>, command: Command) -> FemcResult<JsonValue> {
    match command {
        Command::Request { rca, data } => {
            let request = Request::new(rca, &data).ok_or_else(|| {
                FemcError::Validation(format!("{} byte payload exceeds one CAN message", data.len()))
            })?;
            Ok(serde_json::to_value(frontend.handle(&request))?)
        },
        Command::Maintenance(Maintenance::Standby2 { cartridge, enabled }) => {
            frontend.set_standby2(cartridge, enabled)?;
            Ok(json!({ "op": "standby2", "cartridge": cartridge, "enabled": enabled }))
        },
        Command::Maintenance(Maintenance::State { cartridge, state }) => {
            frontend.set_state(cartridge, state)?;
            Ok(json!({ "op": "state", "cartridge": cartridge, "state": state }))
        },
    }
}

/// Parse and execute one input line; failures become an error object
pub fn process_line<B: RegisterBus>(frontend: &mut FrontEnd<B>, line: &str) -> JsonValue {
    match Command::parse(line).and_then(|command| execute(frontend, command)) {
        Ok(output) => output,
        Err(e) => {
            warn!("Rejected input line: {}", e);
            json!({ "error": e.to_string() })
        },
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse(r#"{"rca": 131074}"#).unwrap(),
            Command::Request {
                rca: 0x20002,
                data: vec![]
            }
        );
        assert_eq!(
            Command::parse(r#"{"op": "state", "cartridge": 3, "state": "GO_STANDBY2"}"#).unwrap(),
            Command::Maintenance(Maintenance::State {
                cartridge: 3,
                state: CartridgeState::GoStandby2
            })
        );
        assert!(Command::parse(r#"{"op": "reboot"}"#).is_err());
        assert!(Command::parse("not json").is_err());
    }
}
