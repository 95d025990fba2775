//! CAN message layer: RCA layout, payloads, status codes and byte order

pub mod byte_order;
pub mod message;
pub mod rca;
pub mod status;

pub use message::{Payload, Reply, Request, MAX_PAYLOAD};
pub use rca::RcaClass;
pub use status::Status;
