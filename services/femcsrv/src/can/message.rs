//! Request and reply messages exchanged with the bus framing layer

use serde::{Serialize, Serializer};

use super::byte_order::{f32_from_wire, f32_to_wire};
use super::rca::RcaClass;
use super::status::Status;

/// Largest payload carried by one CAN message
pub const MAX_PAYLOAD: usize = 8;

/// Up to eight payload bytes, stored inline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Payload {
    bytes: [u8; MAX_PAYLOAD],
    len: u8,
}

impl Payload {
    pub const fn empty() -> Self {
        Self {
            bytes: [0; MAX_PAYLOAD],
            len: 0,
        }
    }

    /// Copy a byte slice, `None` when it exceeds eight bytes
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        if data.len() > MAX_PAYLOAD {
            return None;
        }
        let mut bytes = [0; MAX_PAYLOAD];
        bytes[..data.len()].copy_from_slice(data);
        Some(Self {
            bytes,
            len: data.len() as u8,
        })
    }

    /// Float payload in wire order
    pub fn from_f32(value: f32) -> Self {
        let mut payload = Self::empty();
        payload.bytes[..4].copy_from_slice(&f32_to_wire(value));
        payload.len = 4;
        payload
    }

    pub fn from_u8(value: u8) -> Self {
        let mut payload = Self::empty();
        payload.bytes[0] = value;
        payload.len = 1;
        payload
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decode the first four bytes as a wire float
    pub fn to_f32(&self) -> Option<f32> {
        if self.len() < 4 {
            return None;
        }
        Some(f32_from_wire([
            self.bytes[0],
            self.bytes[1],
            self.bytes[2],
            self.bytes[3],
        ]))
    }

    pub fn to_u8(&self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        Some(self.bytes[0])
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_slice().serialize(serializer)
    }
}

/// Incoming request, after the bus framing layer stripped the CAN header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub rca: u32,
    pub payload: Payload,
    pub class: RcaClass,
}

impl Request {
    /// Build a request, `None` when the payload exceeds eight bytes
    pub fn new(rca: u32, data: &[u8]) -> Option<Self> {
        Some(Self {
            rca,
            payload: Payload::from_slice(data)?,
            class: RcaClass::from_rca(rca),
        })
    }

    pub fn monitor(rca: u32) -> Self {
        Self {
            rca,
            payload: Payload::empty(),
            class: RcaClass::from_rca(rca),
        }
    }

    pub fn control(rca: u32, payload: Payload) -> Self {
        Self {
            rca,
            payload,
            class: RcaClass::from_rca(rca),
        }
    }

    /// A non-empty payload always means a control write
    pub fn is_write(&self) -> bool {
        !self.payload.is_empty()
    }
}

/// Outgoing reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub rca: u32,
    #[serde(rename = "data")]
    pub payload: Payload,
    pub status: Status,
    /// Wire code of `status`, repeated for log readers
    #[serde(rename = "code")]
    pub code: i8,
}

impl Reply {
    pub fn new(rca: u32, payload: Payload, status: Status) -> Self {
        Self {
            rca,
            payload,
            status,
            code: status.code(),
        }
    }

    /// Reply without payload
    pub fn status_only(rca: u32, status: Status) -> Self {
        Self::new(rca, Payload::empty(), status)
    }
}
