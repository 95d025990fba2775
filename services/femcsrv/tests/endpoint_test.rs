//! Control cache, limits and monitor behaviour through the front end

use femcsrv::can::byte_order::{f32_from_wire, f32_to_wire};
use femcsrv::config::EndpointConfig;
use femcsrv::endpoint::alarm::SetLimits;
use femcsrv::hardware::bias;
use femcsrv::hardware::serial::mux_port;
use femcsrv::{FrontEndConfig, Status};

mod common;
use common::*;

fn limited() -> FrontEndConfig {
    let mut config = FrontEndConfig::default();
    config.endpoints.insert(
        "cart3.pol0.sb0.sis.voltage".into(),
        EndpointConfig {
            limits: SetLimits {
                min: Some(-10.0),
                max: Some(10.0),
            },
            ..Default::default()
        },
    );
    config
}

#[test]
fn test_replay_is_idempotent() {
    let mut bench = Bench::default();
    let rca = control(SIS_VOLTAGE_CART3);

    let empty = bench.monitor(rca);
    assert!(empty.payload.is_empty());
    assert_eq!(empty.status, Status::NoError);

    assert_eq!(bench.write_f32(rca, 2.5).status, Status::NoError);
    bench.bus.clear_transfers();
    for _ in 0..3 {
        let replay = bench.monitor(rca);
        assert_eq!(replay.payload.as_slice(), &f32_to_wire(2.5));
        assert_eq!(replay.status, Status::NoError);
    }
    assert!(bench.bus.transfers().is_empty());
}

#[test]
fn test_out_of_limits_never_written() {
    let mut bench = Bench::new(&limited());
    let rca = control(SIS_VOLTAGE_CART3);

    for value in [10.5, -11.0, f32::INFINITY] {
        let reply = bench.write_f32(rca, value);
        assert_eq!(reply.status, Status::ControlErrorRange);
        let replay = bench.monitor(rca);
        assert_eq!(replay.status, Status::ControlErrorRange);
        assert_eq!(replay.payload.as_slice(), &f32_to_wire(value));
    }
    assert!(bench.bus.writes().is_empty());

    assert_eq!(bench.write_f32(rca, 10.0).status, Status::NoError);
    assert_eq!(bench.bus.writes().len(), 1);
}

#[test]
fn test_stale_value_on_read_failure() {
    let mut bench = Bench::default();
    bench.set_bias_adc(CART3 as u8, 0, 0x4000);
    let good = bench.monitor(SIS_VOLTAGE_CART3);
    assert_eq!(good.status, Status::NoError);
    assert_eq!(reply_f32(&good), 12.5);

    bench.bus.fail_command(mux_port(CART3 as u8, 0), bias::adc_data_read(0));
    let stale = bench.monitor(SIS_VOLTAGE_CART3);
    assert_eq!(stale.status, Status::Error);
    assert_eq!(reply_f32(&stale), 12.5);

    bench.bus.heal();
    bench.set_bias_adc(CART3 as u8, 0, 0x2000);
    assert_eq!(reply_f32(&bench.monitor(SIS_VOLTAGE_CART3)), 6.25);
}

#[test]
fn test_failed_read_after_write_returns_set_point() {
    let mut bench = Bench::default();
    bench.set_bias_adc(CART3 as u8, 0, 0x4000);
    assert_eq!(reply_f32(&bench.monitor(SIS_VOLTAGE_CART3)), 12.5);

    assert_eq!(bench.write_f32(control(SIS_VOLTAGE_CART3), 2.5).status, Status::NoError);
    bench.bus.fail_command(mux_port(CART3 as u8, 0), bias::adc_data_read(0));
    let stale = bench.monitor(SIS_VOLTAGE_CART3);
    assert_eq!(stale.status, Status::Error);
    assert_eq!(reply_f32(&stale), 2.5);
}

#[test]
fn test_write_failure_is_cached() {
    let mut bench = Bench::default();
    bench.bus.fail_all();
    let rca = control(SIS_VOLTAGE_CART3);
    assert_eq!(bench.write_f32(rca, 1.0).status, Status::Error);
    let replay = bench.monitor(rca);
    assert_eq!(replay.status, Status::Error);
    assert_eq!(replay.payload.as_slice(), &f32_to_wire(1.0));
}

#[test]
fn test_float_wire_round_trip() {
    let mut bench = Bench::default();
    let rca = control(SIS_VOLTAGE_CART3);
    for value in [0.0, -3.75, 1.0e-7, 12.345] {
        bench.write_f32(rca, value);
        let replay = bench.monitor(rca);
        let bytes: [u8; 4] = replay.payload.as_slice().try_into().unwrap();
        assert_eq!(f32_from_wire(bytes), value);
    }
    assert_eq!(f32_to_wire(1.0), [0x3F, 0x80, 0x00, 0x00]);
}

#[test]
fn test_request_shape_errors() {
    let mut bench = Bench::default();

    // Control payload on a monitor RCA
    let reply = bench.write(SIS_VOLTAGE_CART3, &f32_to_wire(1.0));
    assert_eq!(reply.status, Status::ControlErrorRange);
    assert!(bench.monitor(control(SIS_VOLTAGE_CART3)).payload.is_empty());

    // SIS current is read only
    let current = 0x2010;
    assert_eq!(bench.write_f32(control(current), 1.0).status, Status::ControlErrorRange);
    assert_eq!(bench.monitor(control(current)).status, Status::MonitorCanRange);

    // Float endpoint fed a single byte
    assert_eq!(bench.write(control(SIS_VOLTAGE_CART3), &[1]).status, Status::ControlErrorRange);
    assert!(bench.bus.writes().is_empty());
}
