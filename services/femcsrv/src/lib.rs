//! Front-end monitor and control core
//!
//! Requests addressed by RCA are routed down the [`dispatch`] tree to an
//! [`endpoint`] handler, which reads or writes the bias and LPR registers
//! through the [`hardware`] layer and answers with a status-tagged reply.

pub mod can;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod frontend;
pub mod hardware;
pub mod service;

pub use can::{Payload, Reply, Request, Status};
pub use config::FrontEndConfig;
pub use error::DispatchError;
pub use frontend::FrontEnd;
