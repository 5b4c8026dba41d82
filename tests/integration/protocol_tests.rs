//! Protocol-surface tests: framing guarantees, validation, payload sizes,
//! notification behaviour.

use crate::harness::TestRig;
use plantmon::clock::CalendarTime;
use plantmon::link::Endpoint;
use plantmon::protocol::wire::{
    self, DEVICE_INFO_WIRE_LEN, SYSTEM_STATUS_WIRE_LEN, TIME_RESPONSE_WIRE_LEN,
};
use plantmon::protocol::{CommandFrame, StatusCode};

/// Every command id in the table, with a payload that passes validation.
fn representative_frames(rig: &mut TestRig) -> Vec<(u8, Vec<u8>)> {
    let profile = rig.config.active_profile().to_wire().to_vec();
    let creds = plantmon::link::LinkCredentials::new("net", "secretpw")
        .to_wire()
        .to_vec();

    let ts = CalendarTime::from_ymd_hms(2025, 1, 15, 12, 0, 0);
    let mut time_req = [0u8; wire::TIME_REQUEST_WIRE_LEN];
    wire::encode_calendar(&ts, &mut time_req);

    vec![
        (0x01, vec![]),
        (0x02, vec![]),
        (0x03, profile),
        (0x05, vec![]),
        (0x06, vec![]),
        (0x0A, time_req.to_vec()),
        (0x0B, vec![]),
        (0x0C, vec![]),
        (0x0D, creds),
        (0x0E, vec![]),
        (0x0F, vec![]),
        (0x10, vec![]),
        (0x11, vec![]),
        (0x12, vec![]),
        (0x13, vec![]),
        (0x14, vec![]),
        (0x15, b"UTC0".to_vec()),
        (0x16, vec![]),
    ]
}

// ── Property 7: id and sequence echo ──────────────────────────

#[test]
fn every_command_echoes_id_and_sequence() {
    let mut rig = TestRig::boot();
    // A sample so data-dependent handlers have something to answer with.
    rig.inject_sample(
        CalendarTime::from_ymd_hms(2025, 1, 15, 12, 0, 0),
        22.0,
        50.0,
        300.0,
        1500.0,
    );

    let frames = representative_frames(&mut rig);
    for (i, (id, payload)) in frames.into_iter().enumerate() {
        let seq = (i as u8).wrapping_mul(7).wrapping_add(3);
        let resp = rig.send(id, seq, &payload);
        assert_eq!(resp.response_id(), id, "id echo for 0x{id:02X}");
        assert_eq!(resp.sequence_num(), seq, "sequence echo for 0x{id:02X}");
    }
}

// ── Universal validation ──────────────────────────────────────

#[test]
fn undersized_header_is_invalid_parameter() {
    let mut rig = TestRig::boot();
    let resp = rig.send_raw(&[0x01]).unwrap();
    assert_eq!(resp.status(), StatusCode::InvalidParameter as u8);
}

#[test]
fn declared_length_must_match_received_bytes() {
    let mut rig = TestRig::boot();
    // Header says 2 payload bytes, frame carries 5.
    let mut raw = CommandFrame::encode(0x01, 4, &[1, 2, 3, 4, 5]);
    raw[2] = 2;
    raw[3] = 0;
    let resp = rig.send_raw(&raw).unwrap();
    assert_eq!(resp.status(), StatusCode::InvalidParameter as u8);
    assert_eq!(resp.sequence_num(), 4);
}

#[test]
fn wrong_payload_sizes_are_invalid_parameter() {
    let mut rig = TestRig::boot();
    for (id, bad_payload) in [
        (0x03u8, vec![0u8; 55]),  // profile must be 56
        (0x0A, vec![0u8; 35]),    // time request must be 36
        (0x0D, vec![0u8; 95]),    // credentials must be 96
        (0x15, vec![0u8; 65]),    // timezone is 1-64 bytes
        (0x15, vec![]),
    ] {
        let resp = rig.send(id, 1, &bad_payload);
        assert_eq!(
            resp.status(),
            StatusCode::InvalidParameter as u8,
            "command 0x{id:02X} with {} bytes",
            bad_payload.len()
        );
    }
}

// ── Data-dependent status codes ───────────────────────────────

#[test]
fn time_lookup_hit_and_miss() {
    let mut rig = TestRig::boot();
    let ts = CalendarTime::from_ymd_hms(2025, 1, 15, 12, 34, 0);
    rig.inject_sample(ts, 21.0, 44.0, 180.0, 2050.0);

    let mut req = [0u8; wire::TIME_REQUEST_WIRE_LEN];
    wire::encode_calendar(&ts, &mut req);
    let resp = rig.send(0x0A, 1, &req);
    assert_eq!(resp.status(), StatusCode::Success as u8);
    assert_eq!(resp.data_length() as usize, TIME_RESPONSE_WIRE_LEN);

    // The response opens with the actual calendar time of the record.
    let echoed = wire::decode_calendar(&resp.payload()[..36]).unwrap();
    assert!(echoed.same_minute(&ts));

    // A minute nothing was recorded for.
    let miss = CalendarTime::from_ymd_hms(2025, 1, 15, 3, 3, 0);
    wire::encode_calendar(&miss, &mut req);
    let resp = rig.send(0x0A, 2, &req);
    assert_eq!(resp.status(), StatusCode::Error as u8);
    assert_eq!(resp.data_length(), 0);
}

#[test]
fn sensor_read_counter_feeds_device_info() {
    let mut rig = TestRig::boot();
    rig.inject_sample(
        CalendarTime::from_ymd_hms(2025, 1, 15, 12, 0, 0),
        22.0,
        50.0,
        300.0,
        1500.0,
    );

    rig.send(0x01, 1, &[]);
    rig.send(0x01, 2, &[]);

    let resp = rig.send(0x06, 3, &[]);
    assert_eq!(resp.data_length() as usize, DEVICE_INFO_WIRE_LEN);
    let payload = resp.payload();
    assert_eq!(wire::get_fixed_str(&payload[0..32]), "Plant Monitor");
    assert_eq!(wire::get_fixed_str(&payload[48..64]), "2.0");
    let readings = u32::from_le_bytes(payload[68..72].try_into().unwrap());
    assert_eq!(readings, 2);
}

#[test]
fn system_status_uses_the_struct_form() {
    let mut rig = TestRig::boot();
    let resp = rig.send(0x02, 1, &[]);
    assert_eq!(resp.data_length() as usize, SYSTEM_STATUS_WIRE_LEN);

    let status = wire::SystemStatus::decode(resp.payload()).unwrap();
    assert_eq!(status.current_time, 0, "clock not synced yet");
    assert!(!status.link_connected);
    assert_eq!(status.heap_free, rig.system.heap_free);
}

#[test]
fn get_link_config_before_provisioning_is_an_error() {
    let mut rig = TestRig::boot();
    let resp = rig.send(0x0E, 1, &[]);
    assert_eq!(resp.status(), StatusCode::Error as u8);

    let resp = rig.send(0x0F, 2, &[]);
    assert_eq!(resp.status(), StatusCode::Error as u8, "connect without creds");

    let resp = rig.send(0x13, 3, &[]);
    assert_eq!(resp.status(), StatusCode::Error as u8, "save without creds");
}

#[test]
fn system_reset_responds_before_the_holdoff() {
    let mut rig = TestRig::boot();
    let resp = rig.send(0x05, 6, &[]);
    assert_eq!(resp.status(), StatusCode::Success as u8);
    assert_eq!(rig.system.reset_requested_after_ms, Some(500));
}

// ── Notifications ─────────────────────────────────────────────

#[test]
fn responses_are_notified_once_subscribed() {
    let mut rig = TestRig::boot();

    rig.send(0x06, 1, &[]);
    assert!(rig.host.transport().sent_on(Endpoint::Response).is_empty());

    rig.host.set_subscribed(Endpoint::Response, true);
    let resp = rig.send(0x06, 2, &[]);

    let sent = rig.host.transport().sent_on(Endpoint::Response);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].as_slice(), resp.as_bytes());
}

#[test]
fn response_readback_always_holds_the_last_response() {
    let mut rig = TestRig::boot();
    let first = rig.send(0x06, 1, &[]);
    assert_eq!(rig.host.read_last_response().unwrap(), first.as_bytes());

    let second = rig.send(0x0B, 2, &[]);
    assert_eq!(rig.host.read_last_response().unwrap(), second.as_bytes());
}

#[test]
fn store_status_read_reflects_occupancy() {
    let mut rig = TestRig::boot();
    let empty = rig.host.read_store_status(&rig.store);
    assert_eq!(i32::from_le_bytes(empty[0..4].try_into().unwrap()), 0);
    assert_eq!(i32::from_le_bytes(empty[8..12].try_into().unwrap()), 1);

    rig.inject_sample(
        CalendarTime::from_ymd_hms(2025, 1, 15, 12, 0, 0),
        22.0,
        50.0,
        300.0,
        1500.0,
    );
    let one = rig.host.read_store_status(&rig.store);
    assert_eq!(i32::from_le_bytes(one[0..4].try_into().unwrap()), 1);
    assert_eq!(i32::from_le_bytes(one[4..8].try_into().unwrap()), 1440);
}
