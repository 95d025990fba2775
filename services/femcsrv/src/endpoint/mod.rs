//! Endpoint handlers
//!
//! An endpoint is one physical attribute (a SIS voltage, an LNA enable, a
//! strobe). The same handler serves all of them; what differs is the
//! [`Kind`] of access the attribute supports, its payload [`Format`] and
//! the optional guards layered on its control path.
//!
//! Request shapes:
//! - payload present: control write, recorded in the last control message
//!   before any validation
//! - no payload, control RCA: replay the last control message
//! - no payload, monitor RCA: read the hardware and classify the value

pub mod alarm;
pub mod cache;
pub mod interlock;
pub mod timer;

use std::time::{Duration, Instant};

use errors::FemcErrorTrait;
use tracing::{debug, error, info, warn};

use crate::can::{Payload, RcaClass, Request, Status};
use crate::dispatch::{CapabilityLookup, RoutingContext};
use crate::error::DispatchError;
use crate::hardware::{Point, PointIo, Value};

use alarm::{classify, Alarm, MonitorBands, SetLimits};
use cache::LastControlMessage;
use interlock::Interlock;
use timer::{AsyncTimer, TimerState};

/// Access supported by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    ReadWrite,
    /// Strobes and commands with nothing to read back
    WriteOnly,
    /// Measured quantities
    ReadOnly,
}

/// Payload encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// IEEE-754 single, big-endian on the wire
    Float,
    /// One byte, any non-zero value means enabled
    Bool,
    Byte,
}

impl Format {
    fn decode(self, payload: &Payload) -> Option<Value> {
        match self {
            Self::Float => payload.to_f32().map(Value::Float),
            Self::Bool => payload.to_u8().map(|b| Value::Byte(u8::from(b != 0))),
            Self::Byte => payload.to_u8().map(Value::Byte),
        }
    }

    fn encode(self, value: Value) -> Payload {
        match self {
            Self::Float => Payload::from_f32(value.as_f32()),
            Self::Bool | Self::Byte => Payload::from_u8(value.as_byte()),
        }
    }

    fn zero(self) -> Value {
        match self {
            Self::Float => Value::Float(0.0),
            Self::Bool | Self::Byte => Value::Byte(0),
        }
    }
}

/// Index of an endpoint in its [`EndpointTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(usize);

/// Minimum spacing between two enables
#[derive(Debug, Clone, Copy)]
struct Cooldown {
    timer: AsyncTimer,
    period: Duration,
}

impl Cooldown {
    fn arm(&mut self, now: Instant) -> Result<(), DispatchError> {
        match self.timer.query(now) {
            TimerState::Running => Err(DispatchError::HardwareBlocked(
                "cooldown timer still running".to_string(),
            )),
            TimerState::NotRunning | TimerState::Expired => self
                .timer
                .start(now, self.period, false)
                .map_err(|e| DispatchError::HardwareBlocked(e.to_string())),
        }
    }
}

/// Output forced to a safe value when the error band is reached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectiveAction {
    pub target: EndpointId,
    pub value: Value,
}

/// Everything a handler may touch besides its own endpoint
pub struct HandlerEnv<'a> {
    pub io: &'a mut dyn PointIo,
    pub caps: &'a dyn CapabilityLookup,
    pub ctx: RoutingContext,
    pub now: Instant,
}

/// Result of one handler invocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub payload: Payload,
    pub status: Status,
    /// Corrective action still to be applied by the owning table
    pub correction: Option<CorrectiveAction>,
}

impl Outcome {
    fn status(status: Status) -> Self {
        Self {
            payload: Payload::empty(),
            status,
            correction: None,
        }
    }
}

fn report(name: &str, rca: u32, err: &DispatchError) {
    match err.log_level() {
        tracing::Level::ERROR => error!(endpoint = name, rca, "{}", err),
        tracing::Level::WARN => warn!(endpoint = name, rca, "{}", err),
        _ => debug!(endpoint = name, rca, "{}", err),
    }
}

#[derive(Debug, Clone)]
pub struct Endpoint {
    name: String,
    kind: Kind,
    format: Format,
    point: Point,
    available: bool,
    current: Value,
    last_control: LastControlMessage,
    limits: Option<SetLimits>,
    bands: MonitorBands,
    interlock: Option<Interlock>,
    cooldown: Option<Cooldown>,
    corrective: Option<CorrectiveAction>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, kind: Kind, format: Format, point: Point) -> Self {
        Self {
            name: name.into(),
            kind,
            format,
            point,
            available: true,
            current: format.zero(),
            last_control: LastControlMessage::default(),
            limits: None,
            bands: MonitorBands::default(),
            interlock: None,
            cooldown: None,
            corrective: None,
        }
    }

    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn with_limits(mut self, limits: SetLimits) -> Self {
        self.limits = limits.is_set().then_some(limits);
        self
    }

    pub fn with_bands(mut self, bands: MonitorBands) -> Self {
        self.bands = bands;
        self
    }

    pub fn with_interlock(mut self, interlock: Interlock) -> Self {
        self.interlock = Some(interlock);
        self
    }

    /// Reject a second enable until `period` has elapsed since the first
    pub fn with_cooldown(mut self, period: Duration) -> Self {
        self.cooldown = Some(Cooldown {
            timer: AsyncTimer::default(),
            period,
        });
        self
    }

    pub fn with_corrective(mut self, action: CorrectiveAction) -> Self {
        self.corrective = Some(action);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn point(&self) -> Point {
        self.point
    }

    pub fn available(&self) -> bool {
        self.available
    }

    /// Last value read from, or accepted by, the hardware
    ///
    /// A successful write to a read-write endpoint stores the set point here,
    /// so a monitor read failing right after it replies with that set point.
    pub fn current(&self) -> Value {
        self.current
    }

    pub fn last_control(&self) -> LastControlMessage {
        self.last_control
    }

    pub fn handle(&mut self, request: &Request, env: &mut HandlerEnv<'_>) -> Outcome {
        if request.is_write() {
            return Outcome::status(self.control(request, env));
        }
        match request.class {
            RcaClass::Control => self.replay(request.rca),
            _ => self.monitor(request.rca, env),
        }
    }

    fn control(&mut self, request: &Request, env: &mut HandlerEnv<'_>) -> Status {
        if self.kind == Kind::ReadOnly || request.class != RcaClass::Control {
            let err = DispatchError::ControlRange(format!("{} accepts no control here", self.name));
            report(&self.name, request.rca, &err);
            return err.status();
        }

        self.last_control = LastControlMessage::attempt(request.payload);
        let status = match self.apply_control(&request.payload, env) {
            Ok(()) => Status::NoError,
            Err(err) => {
                report(&self.name, request.rca, &err);
                err.status()
            },
        };
        self.last_control.complete(status);
        status
    }

    fn apply_control(&mut self, payload: &Payload, env: &mut HandlerEnv<'_>) -> Result<(), DispatchError> {
        if let Some(interlock) = self.interlock {
            interlock.check(env.caps, &env.ctx)?;
        }

        let value = self.format.decode(payload).ok_or_else(|| {
            DispatchError::ControlRange(format!("{}: {} byte payload", self.name, payload.len()))
        })?;

        if let Some(limits) = self.limits {
            if !limits.contains(value.as_f32()) {
                return Err(DispatchError::ControlRange(format!(
                    "{} = {} outside [{:?}, {:?}]",
                    self.name,
                    value.as_f32(),
                    limits.min,
                    limits.max
                )));
            }
        }

        // Disabling is never rate limited
        if let Some(cooldown) = self.cooldown.as_mut() {
            if value.as_bool() {
                cooldown.arm(env.now)?;
            }
        }

        env.io.write(self.point, &env.ctx, value)?;
        if self.kind == Kind::ReadWrite {
            self.current = value;
        }
        debug!(endpoint = %self.name, ?value, "Control applied");
        Ok(())
    }

    fn replay(&self, rca: u32) -> Outcome {
        if self.kind == Kind::ReadOnly {
            let err = DispatchError::MonitorRange(rca);
            report(&self.name, rca, &err);
            return Outcome::status(err.status());
        }
        Outcome {
            payload: self.last_control.payload(),
            status: self.last_control.status(),
            correction: None,
        }
    }

    fn monitor(&mut self, rca: u32, env: &mut HandlerEnv<'_>) -> Outcome {
        if self.kind == Kind::WriteOnly {
            let err = DispatchError::MonitorRange(rca);
            report(&self.name, rca, &err);
            return Outcome::status(err.status());
        }

        match env.io.read(self.point, &env.ctx) {
            Err(e) => {
                let err = DispatchError::from(e);
                report(&self.name, rca, &err);
                // Stale but valid beats nothing
                Outcome {
                    payload: self.format.encode(self.current),
                    status: err.status(),
                    correction: None,
                }
            },
            Ok(value) => {
                self.current = value;
                let alarm = classify(value.as_f32(), &self.bands);
                let status = alarm.escalate(Status::NoError);
                if alarm != Alarm::Ok {
                    warn!(endpoint = %self.name, value = value.as_f32(), %status, "Monitor value out of band");
                }
                let correction = if alarm == Alarm::Error {
                    self.corrective
                } else {
                    None
                };
                Outcome {
                    payload: self.format.encode(value),
                    status,
                    correction,
                }
            },
        }
    }
}

/// All endpoints of the front end, addressed by [`EndpointId`]
#[derive(Debug, Default)]
pub struct EndpointTable {
    endpoints: Vec<Endpoint>,
}

impl EndpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, endpoint: Endpoint) -> EndpointId {
        self.endpoints.push(endpoint);
        EndpointId(self.endpoints.len() - 1)
    }

    pub fn get(&self, id: EndpointId) -> Option<&Endpoint> {
        self.endpoints.get(id.0)
    }

    pub fn get_mut(&mut self, id: EndpointId) -> Option<&mut Endpoint> {
        self.endpoints.get_mut(id.0)
    }

    /// Look an endpoint up by its configuration key
    pub fn find(&self, name: &str) -> Option<EndpointId> {
        self.endpoints
            .iter()
            .position(|e| e.name == name)
            .map(EndpointId)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    /// Force the corrective action's target to its safe value
    ///
    /// Returns `MON_ERROR_ACT` once applied, `ERROR` when the hardware
    /// refused the write.
    pub fn apply_correction(&mut self, action: CorrectiveAction, env: &mut HandlerEnv<'_>) -> Status {
        let Some(target) = self.endpoints.get_mut(action.target.0) else {
            error!(?action, "Corrective action target missing");
            return Status::Error;
        };
        match env.io.write(target.point, &env.ctx, action.value) {
            Ok(()) => {
                target.current = action.value;
                info!(endpoint = %target.name, value = ?action.value, "Corrective action applied");
                Status::MonitorErrorAction
            },
            Err(e) => {
                error!(endpoint = %target.name, "Corrective action failed: {}", e);
                Status::Error
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::hardware::HardwareError;
    use alarm::Band;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeIo {
        reads: HashMap<Point, Result<Value, HardwareError>>,
        writes: Vec<(Point, Value)>,
        fail_writes: bool,
    }

    impl PointIo for FakeIo {
        fn read(&mut self, point: Point, _ctx: &RoutingContext) -> Result<Value, HardwareError> {
            self.reads
                .get(&point)
                .cloned()
                .unwrap_or(Err(HardwareError::Unsupported(point)))
        }

        fn write(&mut self, point: Point, _ctx: &RoutingContext, value: Value) -> Result<(), HardwareError> {
            self.writes.push((point, value));
            if self.fail_writes {
                return Err(HardwareError::Timeout { port: 1, polls: 1 });
            }
            Ok(())
        }
    }

    struct Caps {
        standby2: bool,
    }

    impl CapabilityLookup for Caps {
        fn check_power(&self, _module: u8) -> Result<(), DispatchError> {
            Ok(())
        }

        fn standby2(&self, _module: u8) -> bool {
            self.standby2
        }
    }

    const CONTROL: u32 = 0x1_0008;
    const MONITOR: u32 = 0x0_0008;

    fn run(endpoint: &mut Endpoint, io: &mut FakeIo, request: Request) -> Outcome {
        run_at(endpoint, io, request, false, Instant::now())
    }

    fn run_at(endpoint: &mut Endpoint, io: &mut FakeIo, request: Request, standby2: bool, now: Instant) -> Outcome {
        let caps = Caps { standby2 };
        let mut env = HandlerEnv {
            io,
            caps: &caps,
            ctx: RoutingContext::default(),
            now,
        };
        endpoint.handle(&request, &mut env)
    }

    fn voltage() -> Endpoint {
        Endpoint::new("sis.voltage", Kind::ReadWrite, Format::Float, Point::SisVoltage).with_limits(SetLimits {
            min: Some(-10.0),
            max: Some(10.0),
        })
    }

    #[test]
    fn test_control_then_replay() {
        let mut ep = voltage();
        let mut io = FakeIo::default();
        let write = run(&mut ep, &mut io, Request::control(CONTROL, Payload::from_f32(2.5)));
        assert_eq!(write.status, Status::NoError);
        assert_eq!(io.writes, vec![(Point::SisVoltage, Value::Float(2.5))]);
        assert_eq!(ep.current(), Value::Float(2.5));

        for _ in 0..2 {
            let replay = run(&mut ep, &mut io, Request::monitor(CONTROL));
            assert_eq!(replay.payload, Payload::from_f32(2.5));
            assert_eq!(replay.status, Status::NoError);
        }
        assert_eq!(io.writes.len(), 1);
    }

    #[test]
    fn test_replay_before_any_control() {
        let mut ep = voltage();
        let replay = run(&mut ep, &mut FakeIo::default(), Request::monitor(CONTROL));
        assert!(replay.payload.is_empty());
        assert_eq!(replay.status, Status::NoError);
    }

    #[test]
    fn test_limits_suppress_write_and_are_cached() {
        let mut ep = voltage();
        let mut io = FakeIo::default();
        let out = run(&mut ep, &mut io, Request::control(CONTROL, Payload::from_f32(11.0)));
        assert_eq!(out.status, Status::ControlErrorRange);
        assert!(io.writes.is_empty());
        assert_eq!(ep.last_control().payload(), Payload::from_f32(11.0));
        assert_eq!(ep.last_control().status(), Status::ControlErrorRange);
        assert_eq!(ep.current(), Value::Float(0.0));
    }

    #[test]
    fn test_hardware_write_failure_cached() {
        let mut ep = voltage();
        let mut io = FakeIo {
            fail_writes: true,
            ..Default::default()
        };
        let out = run(&mut ep, &mut io, Request::control(CONTROL, Payload::from_f32(1.0)));
        assert_eq!(out.status, Status::Error);
        let replay = run(&mut ep, &mut io, Request::monitor(CONTROL));
        assert_eq!(replay.status, Status::Error);
        assert_eq!(replay.payload, Payload::from_f32(1.0));
    }

    #[test]
    fn test_short_float_payload() {
        let mut ep = voltage();
        let mut io = FakeIo::default();
        let out = run(&mut ep, &mut io, Request::control(CONTROL, Payload::from_u8(1)));
        assert_eq!(out.status, Status::ControlErrorRange);
        assert_eq!(ep.last_control().payload(), Payload::from_u8(1));
        assert!(io.writes.is_empty());
    }

    #[test]
    fn test_monitor_stale_on_failure() {
        let mut ep = voltage();
        let mut io = FakeIo::default();
        io.reads.insert(Point::SisVoltage, Ok(Value::Float(3.0)));
        let out = run(&mut ep, &mut io, Request::monitor(MONITOR));
        assert_eq!(out.payload, Payload::from_f32(3.0));

        io.reads.insert(Point::SisVoltage, Err(HardwareError::Timeout { port: 1, polls: 3 }));
        let out = run(&mut ep, &mut io, Request::monitor(MONITOR));
        assert_eq!(out.status, Status::Error);
        assert_eq!(out.payload, Payload::from_f32(3.0));
        assert_eq!(ep.current(), Value::Float(3.0));
    }

    #[test]
    fn test_monitor_bands() {
        let mut ep = voltage().with_bands(MonitorBands {
            warning: Band {
                low: Some(1.0),
                high: Some(9.0),
            },
            error: Band {
                low: Some(0.0),
                high: Some(10.0),
            },
        });
        let mut io = FakeIo::default();
        io.reads.insert(Point::SisVoltage, Ok(Value::Float(9.5)));
        assert_eq!(run(&mut ep, &mut io, Request::monitor(MONITOR)).status, Status::MonitorWarningRange);

        io.reads.insert(Point::SisVoltage, Ok(Value::Float(11.0)));
        let out = run(&mut ep, &mut io, Request::monitor(MONITOR));
        assert_eq!(out.status, Status::MonitorErrorRange);
        assert!(out.correction.is_none());
    }

    #[test]
    fn test_read_only_shape() {
        let mut ep = Endpoint::new("sis.current", Kind::ReadOnly, Format::Float, Point::SisCurrent);
        let mut io = FakeIo::default();
        let out = run(&mut ep, &mut io, Request::control(CONTROL, Payload::from_f32(1.0)));
        assert_eq!(out.status, Status::ControlErrorRange);
        assert!(ep.last_control().is_empty());
        assert_eq!(run(&mut ep, &mut io, Request::monitor(CONTROL)).status, Status::MonitorCanRange);
        assert!(io.writes.is_empty());
    }

    #[test]
    fn test_write_only_shape() {
        let mut ep = Endpoint::new("dac.reset", Kind::WriteOnly, Format::Byte, Point::BiasDacResetStrobe);
        let mut io = FakeIo::default();
        assert_eq!(
            run(&mut ep, &mut io, Request::control(CONTROL, Payload::from_u8(1))).status,
            Status::NoError
        );
        assert_eq!(run(&mut ep, &mut io, Request::monitor(CONTROL)).payload, Payload::from_u8(1));
        assert_eq!(run(&mut ep, &mut io, Request::monitor(MONITOR)).status, Status::MonitorCanRange);
    }

    #[test]
    fn test_control_payload_on_monitor_rca() {
        let mut ep = voltage();
        let mut io = FakeIo::default();
        let out = run(&mut ep, &mut io, Request::control(MONITOR, Payload::from_f32(1.0)));
        assert_eq!(out.status, Status::ControlErrorRange);
        assert!(io.writes.is_empty());
    }

    #[test]
    fn test_interlock_records_blocked_attempt() {
        let mut ep = Endpoint::new("lna.enable", Kind::ReadWrite, Format::Bool, Point::LnaEnable)
            .with_interlock(Interlock::Standby2);
        let mut io = FakeIo::default();
        let out = run_at(&mut ep, &mut io, Request::control(CONTROL, Payload::from_u8(1)), true, Instant::now());
        assert_eq!(out.status, Status::HardwareBlocked);
        assert!(io.writes.is_empty());
        assert_eq!(ep.last_control().payload(), Payload::from_u8(1));
        assert_eq!(ep.last_control().status(), Status::HardwareBlocked);
    }

    #[test]
    fn test_bool_payload_normalized() {
        let mut ep = Endpoint::new("lna.led", Kind::ReadWrite, Format::Bool, Point::LnaLedEnable);
        let mut io = FakeIo::default();
        run(&mut ep, &mut io, Request::control(CONTROL, Payload::from_u8(0x7F)));
        assert_eq!(io.writes, vec![(Point::LnaLedEnable, Value::Byte(1))]);
    }

    #[test]
    fn test_cooldown() {
        let clock = timer::ManualClock::new();
        let mut ep = Endpoint::new("heater.enable", Kind::WriteOnly, Format::Bool, Point::SisHeaterEnable)
            .with_cooldown(Duration::from_millis(10_000));
        let mut io = FakeIo::default();
        let enable = Request::control(CONTROL, Payload::from_u8(1));
        let disable = Request::control(CONTROL, Payload::from_u8(0));
        use timer::Clock;

        assert_eq!(run_at(&mut ep, &mut io, enable, false, clock.now()).status, Status::NoError);
        clock.advance(Duration::from_millis(500));
        assert_eq!(run_at(&mut ep, &mut io, enable, false, clock.now()).status, Status::HardwareBlocked);
        assert_eq!(run_at(&mut ep, &mut io, disable, false, clock.now()).status, Status::NoError);
        assert_eq!(io.writes.len(), 2);

        clock.advance(Duration::from_millis(9_500));
        assert_eq!(run_at(&mut ep, &mut io, enable, false, clock.now()).status, Status::NoError);
        assert_eq!(run_at(&mut ep, &mut io, enable, false, clock.now()).status, Status::HardwareBlocked);
        assert_eq!(io.writes.len(), 3);
    }

    #[test]
    fn test_corrective_action() {
        let mut table = EndpointTable::new();
        let target = table.push(Endpoint::new("mod.value", Kind::ReadWrite, Format::Float, Point::ModulationInput));
        let driver = table.push(
            Endpoint::new("driver", Kind::ReadOnly, Format::Byte, Point::EdfaDriverState)
                .with_bands(MonitorBands {
                    error: Band {
                        low: None,
                        high: Some(0.5),
                    },
                    ..Default::default()
                })
                .with_corrective(CorrectiveAction {
                    target,
                    value: Value::Float(0.0),
                }),
        );
        let mut io = FakeIo::default();
        io.reads.insert(Point::EdfaDriverState, Ok(Value::Byte(1)));
        let caps = Caps { standby2: false };
        let mut env = HandlerEnv {
            io: &mut io,
            caps: &caps,
            ctx: RoutingContext::default(),
            now: Instant::now(),
        };
        let out = table
            .get_mut(driver)
            .unwrap()
            .handle(&Request::monitor(MONITOR), &mut env);
        assert_eq!(out.status, Status::MonitorErrorRange);
        let action = out.correction.unwrap();
        assert_eq!(table.apply_correction(action, &mut env), Status::MonitorErrorAction);
        assert_eq!(io.writes, vec![(Point::ModulationInput, Value::Float(0.0))]);
        assert_eq!(table.find("mod.value"), Some(target));
    }
}
