//! Special RCAs (class 2)
//!
//! Served outside the hardware tree: firmware identification, the RCA
//! ranges the front end answers on and the operating mode.

use serde::Serialize;
use tracing::{info, warn};

use crate::can::byte_order::u32_to_le_wire;
use crate::can::rca::{
    FIRST_CONTROL_RCA, FIRST_MONITOR_RCA, FIRST_SPECIAL_CONTROL_RCA, FIRST_SPECIAL_MONITOR_RCA, GET_CONTROL_RCAS,
    GET_FE_MODE, GET_LAST_SPECIAL_RESERVED, GET_MONITOR_RCAS, GET_SPECIAL_CONTROL_RCAS, GET_SPECIAL_MONITOR_RCAS,
    GET_VERSION_INFO, LAST_CONTROL_RCA, LAST_MONITOR_RCA, LAST_SPECIAL_CONTROL_RCA, LAST_SPECIAL_MONITOR_RCA,
    SET_FE_MODE,
};
use crate::can::{Payload, Reply, Request, Status, MAX_PAYLOAD};

/// Front-end operating mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeMode {
    #[default]
    Operational,
    Troubleshooting,
    Maintenance,
}

impl FeMode {
    pub fn code(self) -> u8 {
        match self {
            Self::Operational => 0,
            Self::Troubleshooting => 1,
            Self::Maintenance => 2,
        }
    }
}

impl TryFrom<u8> for FeMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Operational),
            1 => Ok(Self::Troubleshooting),
            2 => Ok(Self::Maintenance),
            other => Err(other),
        }
    }
}

/// Firmware version as (major, minor, patch)
pub fn version() -> [u8; 3] {
    let parse = |s: &str| s.parse::<u8>().unwrap_or(0);
    [
        parse(env!("CARGO_PKG_VERSION_MAJOR")),
        parse(env!("CARGO_PKG_VERSION_MINOR")),
        parse(env!("CARGO_PKG_VERSION_PATCH")),
    ]
}

/// First and last RCA of a range, both little-endian
fn range_words(first: u32, last: u32) -> Payload {
    let mut bytes = [0u8; MAX_PAYLOAD];
    bytes[..4].copy_from_slice(&u32_to_le_wire(first));
    bytes[4..].copy_from_slice(&u32_to_le_wire(last));
    Payload::from_slice(&bytes).unwrap_or_default()
}

pub fn handle(request: &Request, mode: &mut FeMode) -> Reply {
    let rca = request.rca;
    if request.is_write() {
        return control(request, mode);
    }
    let payload = match rca {
        GET_VERSION_INFO => Payload::from_slice(&version()).unwrap_or_default(),
        GET_SPECIAL_MONITOR_RCAS => range_words(FIRST_SPECIAL_MONITOR_RCA, LAST_SPECIAL_MONITOR_RCA),
        GET_SPECIAL_CONTROL_RCAS => range_words(FIRST_SPECIAL_CONTROL_RCA, LAST_SPECIAL_CONTROL_RCA),
        GET_MONITOR_RCAS => range_words(FIRST_MONITOR_RCA, LAST_MONITOR_RCA),
        GET_CONTROL_RCAS => range_words(FIRST_CONTROL_RCA, LAST_CONTROL_RCA),
        GET_LAST_SPECIAL_RESERVED => Payload::from_slice(&[0; MAX_PAYLOAD]).unwrap_or_default(),
        // Monitor on the control RCA reads the mode back as well
        GET_FE_MODE | SET_FE_MODE => Payload::from_u8(mode.code()),
        _ => {
            warn!(rca = format_args!("0x{:05X}", rca), "Special monitor RCA out of range");
            return Reply::status_only(rca, Status::HardwareRange);
        },
    };
    Reply::new(rca, payload, Status::NoError)
}

fn control(request: &Request, mode: &mut FeMode) -> Reply {
    let rca = request.rca;
    match rca {
        SET_FE_MODE => {
            let requested = request.payload.to_u8().unwrap_or(u8::MAX);
            match FeMode::try_from(requested) {
                Ok(next) => {
                    if *mode != next {
                        info!(from = ?*mode, to = ?next, "FE mode changed");
                    }
                    *mode = next;
                    Reply::status_only(rca, Status::NoError)
                },
                Err(value) => {
                    warn!(value, "FE mode out of range");
                    Reply::status_only(rca, Status::ControlErrorRange)
                },
            }
        },
        FIRST_SPECIAL_MONITOR_RCA..=LAST_SPECIAL_MONITOR_RCA => {
            warn!(rca = format_args!("0x{:05X}", rca), "Control payload on special monitor RCA");
            Reply::status_only(rca, Status::ControlErrorRange)
        },
        _ => {
            warn!(rca = format_args!("0x{:05X}", rca), "Special control RCA out of range");
            Reply::status_only(rca, Status::HardwareRange)
        },
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_range_queries() {
        let mut mode = FeMode::default();
        let reply = handle(&Request::monitor(GET_MONITOR_RCAS), &mut mode);
        assert_eq!(reply.payload.as_slice(), &[0x01, 0, 0, 0, 0xFF, 0xFF, 0, 0]);

        let reply = handle(&Request::monitor(GET_SPECIAL_CONTROL_RCAS), &mut mode);
        assert_eq!(reply.payload.as_slice(), &[0x00, 0x10, 0x02, 0, 0xFF, 0x1F, 0x02, 0]);

        let reply = handle(&Request::monitor(GET_LAST_SPECIAL_RESERVED), &mut mode);
        assert_eq!(reply.payload.as_slice(), &[0; 8]);
    }

    #[test]
    fn test_version() {
        let mut mode = FeMode::default();
        let reply = handle(&Request::monitor(GET_VERSION_INFO), &mut mode);
        assert_eq!(reply.payload.len(), 3);
        assert_eq!(reply.payload.as_slice(), &version());
    }

    #[test]
    fn test_fe_mode() {
        let mut mode = FeMode::default();
        let set = Request::new(SET_FE_MODE, &[2]).unwrap();
        assert_eq!(handle(&set, &mut mode).status, Status::NoError);
        assert_eq!(mode, FeMode::Maintenance);
        assert_eq!(handle(&Request::monitor(GET_FE_MODE), &mut mode).payload.as_slice(), &[2]);

        let bad = Request::new(SET_FE_MODE, &[3]).unwrap();
        assert_eq!(handle(&bad, &mut mode).status, Status::ControlErrorRange);
        assert_eq!(mode, FeMode::Maintenance);
    }

    #[test]
    fn test_unknown_special() {
        let mut mode = FeMode::default();
        assert_eq!(handle(&Request::monitor(0x20100), &mut mode).status, Status::HardwareRange);
        let write = Request::new(0x21005, &[1]).unwrap();
        assert_eq!(handle(&write, &mut mode).status, Status::HardwareRange);
    }
}
