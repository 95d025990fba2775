//! Last control message cache

use crate::can::{Payload, Status};

/// Payload and resulting status of the most recent control attempt
///
/// Starts empty with `NO_ERROR`, so a monitor of a control RCA that was
/// never written replays a well-defined empty message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LastControlMessage {
    payload: Payload,
    status: Status,
}

impl LastControlMessage {
    /// Record an attempt before it is validated
    pub fn attempt(payload: Payload) -> Self {
        Self {
            payload,
            status: Status::NoError,
        }
    }

    /// Record the outcome of the attempt
    pub fn complete(&mut self, status: Status) {
        self.status = status;
    }

    pub fn payload(&self) -> Payload {
        self.payload
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty_no_error() {
        let cache = LastControlMessage::default();
        assert!(cache.is_empty());
        assert_eq!(cache.status(), Status::NoError);
    }

    #[test]
    fn test_attempt_replaces_previous() {
        let mut cache = LastControlMessage::attempt(Payload::from_u8(1));
        cache.complete(Status::HardwareBlocked);

        let mut cache2 = LastControlMessage::attempt(Payload::from_f32(2.0));
        assert_eq!(cache2.status(), Status::NoError);
        cache2.complete(Status::ControlErrorRange);
        assert_eq!(cache2.payload(), Payload::from_f32(2.0));
        assert_ne!(cache, cache2);
    }
}
