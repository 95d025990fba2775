//! RCA dispatch
//!
//! Monitor and control requests walk the [`DispatchNode`] tree from the
//! module selector down to one endpoint. Branch availability and the
//! cartridge power gate are checked on the way down; the endpoint itself
//! decides what the request shape means.

pub mod context;
pub mod node;

use std::time::Instant;

use tracing::debug;

use crate::can::{Reply, Request};
use crate::endpoint::{EndpointTable, HandlerEnv};
use crate::error::{DispatchError, DispatchResult};
use crate::hardware::PointIo;

pub use context::{Field, RoutingContext};
pub use node::{Branch, DispatchNode, Guard, Selector};

/// Front-end state consulted by the dispatch path
pub trait CapabilityLookup {
    /// Whether the cartridge in slot `module` may be addressed
    fn check_power(&self, module: u8) -> DispatchResult<()>;

    /// Whether the cartridge in slot `module` is in standby2
    fn standby2(&self, module: u8) -> bool;
}

/// Serve one monitor or control request
pub fn dispatch(
    root: &DispatchNode,
    table: &mut EndpointTable,
    request: &Request,
    caps: &dyn CapabilityLookup,
    io: &mut dyn PointIo,
    now: Instant,
) -> Reply {
    debug!(
        rca = format_args!("0x{:05X}", request.rca),
        data = ?request.payload.as_slice(),
        "Request"
    );

    let (id, ctx) = match root.resolve(request.rca, RoutingContext::default(), caps) {
        Ok(found) => found,
        Err(err) => {
            err.log(request.rca);
            return Reply::status_only(request.rca, err.status());
        },
    };

    let Some(endpoint) = table.get_mut(id) else {
        let err = DispatchError::HardwareNotInstalled(format!("endpoint {:?}", id));
        err.log(request.rca);
        return Reply::status_only(request.rca, err.status());
    };
    if !endpoint.available() {
        let err = DispatchError::HardwareNotInstalled(endpoint.name().to_string());
        err.log(request.rca);
        return Reply::status_only(request.rca, err.status());
    }

    let mut env = HandlerEnv { io, caps, ctx, now };
    let outcome = endpoint.handle(request, &mut env);
    let status = match outcome.correction {
        Some(action) => table.apply_correction(action, &mut env),
        None => outcome.status,
    };

    debug!(rca = format_args!("0x{:05X}", request.rca), %status, "Reply");
    Reply::new(request.rca, outcome.payload, status)
}
