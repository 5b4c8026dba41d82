//! End-to-end scenarios: boot recovery, data round-trips, eviction,
//! watering advisory.

use crate::harness::TestRig;
use plantmon::clock::CalendarTime;
use plantmon::plant::{PlantCondition, PlantProfile};
use plantmon::protocol::wire::{SAMPLE_WIRE_LEN, WireSample};
use plantmon::protocol::StatusCode;
use plantmon::sample::MoistureKind;
use plantmon::store::COMPLETE_SAMPLE_THRESHOLD;

// ── S1: missing profile boot ──────────────────────────────────

#[test]
fn boot_with_erased_storage_synthesises_and_persists_the_default_profile() {
    let rig = TestRig::boot();
    // Exactly one store write happened: the recovered default profile.
    assert_eq!(rig.config.storage().write_count(), 1);

    let mut rig = rig;
    let resp = rig.send(0x0C, 1, &[]);
    assert_eq!(resp.status(), StatusCode::Success as u8);

    let profile = PlantProfile::from_wire(resp.payload()).unwrap();
    assert_eq!(profile.name.as_str(), "Succulent Plant");
    assert_eq!(profile.soil_dry_threshold, 2500.0);
}

// ── S2: latest-sample round-trip ──────────────────────────────

#[test]
fn latest_sample_round_trips_through_get_sensor_data() {
    let mut rig = TestRig::boot();
    let ts = CalendarTime::from_ymd_hms(2025, 1, 15, 12, 34, 0);
    rig.inject_sample(ts, 22.5, 48.0, 320.0, 1800.0);

    let resp = rig.send(0x01, 7, &[]);
    assert_eq!(resp.response_id(), 0x01);
    assert_eq!(resp.status(), 0x00);
    assert_eq!(resp.sequence_num(), 7);
    assert_eq!(resp.data_length() as usize, SAMPLE_WIRE_LEN);

    let decoded = WireSample::decode(resp.payload()).unwrap();
    assert!(decoded.timestamp.same_minute(&ts));
    assert_eq!(decoded.temperature, 22.5);
    assert_eq!(decoded.humidity, 48.0);
    assert_eq!(decoded.lux, 320.0);
    assert_eq!(decoded.soil_moisture, 1800.0);
    assert!(!decoded.error);
}

// ── S3: unknown command ───────────────────────────────────────

#[test]
fn unknown_command_is_rejected_with_invalid_command() {
    let mut rig = TestRig::boot();
    let resp = rig.send(0xFF, 3, &[]);
    assert_eq!(resp.response_id(), 0xFF);
    assert_eq!(resp.status(), 0x02);
    assert_eq!(resp.sequence_num(), 3);
    assert_eq!(resp.data_length(), 0);
}

// ── S4: masked secret ─────────────────────────────────────────

#[test]
fn link_config_readback_masks_the_secret() {
    let mut rig = TestRig::boot();
    let creds = plantmon::link::LinkCredentials::new("home", "abcdef");
    rig.config.set_active_credentials(creds);
    rig.config.save_credentials().unwrap();

    let resp = rig.send(0x0E, 5, &[]);
    assert_eq!(resp.status(), StatusCode::Success as u8);
    let payload = resp.payload();
    assert_eq!(&payload[..5], b"home\0");
    assert_eq!(&payload[32..39], b"abc***\0");

    // The stored secret itself is untouched.
    let stored = rig.config.load_credentials().unwrap();
    assert_eq!(stored.password.as_str(), "abcdef");
}

// ── S5: ring-store oldest eviction ────────────────────────────

#[test]
fn oldest_sample_is_evicted_after_a_full_buffer_plus_one() {
    let mut rig = TestRig::boot();
    let start = CalendarTime::from_ymd_hms(2025, 5, 10, 0, 0, 0);
    rig.fill_minutes(start, 1441, 1500.0);

    let now = CalendarTime::from_unix_local(
        start.naive_unix().unwrap() + 1440 * 60,
        0,
        false,
    );
    let recent = rig.store.get_recent_minutes(24, &now);
    assert_eq!(recent.len(), 1440);
    assert!(
        !recent.iter().any(|s| s.timestamp.same_minute(&start)),
        "first insert must be gone"
    );
}

// ── S6: watering advisory ─────────────────────────────────────

#[test]
fn three_dry_days_trigger_the_watering_advisory() {
    let mut rig = TestRig::boot();
    assert_eq!(rig.config.active_profile().dry_days_for_watering, 3);

    // Three complete days averaging above the dry threshold.
    let day1 = CalendarTime::from_ymd_hms(2025, 5, 10, 0, 0, 0);
    for day in 0..3i64 {
        let start = CalendarTime::from_unix_local(
            day1.naive_unix().unwrap() + day * 86_400,
            0,
            false,
        );
        rig.fill_minutes(start, COMPLETE_SAMPLE_THRESHOLD as i64, 2600.0);
    }

    // Latest sample sits exactly at the dry threshold.
    let now = CalendarTime::from_ymd_hms(2025, 5, 13, 0, 0, 0);
    rig.inject_sample(now, 22.0, 50.0, 300.0, 2500.0);

    let profile = rig.config.active_profile().clone();
    let condition = rig.decision.evaluate(&profile, &rig.store, &now);
    assert_eq!(condition, PlantCondition::NeedsWatering);
}

// ── Persistence round-trips (profile / credentials / timezone) ─

#[test]
fn profile_set_over_the_link_persists_byte_equal() {
    let mut rig = TestRig::boot();

    let mut profile = PlantProfile::factory_default(MoistureKind::Resistive);
    profile.name.clear();
    let _ = profile.name.push_str("Monstera");
    profile.soil_dry_threshold = 2300.0;
    profile.soil_wet_threshold = 900.0;
    profile.dry_days_for_watering = 5;

    let resp = rig.send(0x03, 9, &profile.to_wire());
    assert_eq!(resp.status(), StatusCode::Success as u8);

    // Active profile follows immediately.
    assert_eq!(rig.config.active_profile(), &profile);

    // And the persisted copy reloads byte-equal.
    let reloaded = rig.config.load_profile();
    assert_eq!(reloaded.to_wire(), profile.to_wire());

    // GetPlantProfile reflects the new active profile.
    let resp = rig.send(0x0C, 10, &[]);
    assert_eq!(resp.payload(), &profile.to_wire());
}

#[test]
fn timezone_set_get_save_round_trip() {
    let mut rig = TestRig::boot();
    let tz = b"CET-1CEST,M3.5.0,M10.5.0/3";

    let resp = rig.send(0x15, 1, tz);
    assert_eq!(resp.status(), StatusCode::Success as u8);

    let resp = rig.send(0x10, 2, &[]);
    assert_eq!(resp.payload(), tz);

    let resp = rig.send(0x16, 3, &[]);
    assert_eq!(resp.status(), StatusCode::Success as u8);
    assert_eq!(rig.config.load_timezone().as_str(), "CET-1CEST,M3.5.0,M10.5.0/3");
}

#[test]
fn link_credentials_set_connect_save_flow() {
    let mut rig = TestRig::boot();
    let creds = plantmon::link::LinkCredentials::new("greenhouse", "hunter2secret");
    let writes_before = rig.config.storage().write_count();

    // SetLinkConfig applies live without persisting.
    let resp = rig.send(0x0D, 1, &creds.to_wire());
    assert_eq!(resp.status(), StatusCode::Success as u8);
    assert_eq!(rig.config.storage().write_count(), writes_before);

    // Connect uses the live credentials.
    let resp = rig.send(0x0F, 2, &[]);
    assert_eq!(resp.status(), StatusCode::Success as u8);
    use plantmon::link::LinkControl as _;
    assert!(rig.link.is_connected());
    assert_eq!(rig.link.current_ssid(), Some("greenhouse"));

    // A second connect with the same SSID short-circuits to success.
    let resp = rig.send(0x0F, 3, &[]);
    assert_eq!(resp.status(), StatusCode::Success as u8);

    // SaveLinkConfig persists; a fresh load sees it.
    let resp = rig.send(0x13, 4, &[]);
    assert_eq!(resp.status(), StatusCode::Success as u8);
    let stored = rig.config.load_credentials().unwrap();
    assert_eq!(stored.ssid.as_str(), "greenhouse");

    // Disconnect.
    let resp = rig.send(0x12, 5, &[]);
    assert_eq!(resp.status(), StatusCode::Success as u8);
    assert!(!rig.link.is_connected());
}

#[test]
fn sync_time_anchors_the_clock_and_status_reports_it() {
    let mut rig = TestRig::boot();

    let resp = rig.send(0x11, 1, &[]);
    assert_eq!(resp.status(), StatusCode::Success as u8);

    // The external source completes with a known instant.
    let unix = CalendarTime::from_ymd_hms(2025, 1, 15, 3, 34, 0)
        .naive_unix()
        .unwrap();
    rig.time_sync.inject(unix);
    if let Some(t) = plantmon::clock::TimeSyncPort::poll(&mut rig.time_sync) {
        rig.clock.sync_to(t);
    }
    assert!(rig.clock.is_synchronised());

    let resp = rig.send(0x02, 2, &[]);
    let status = plantmon::protocol::wire::SystemStatus::decode(resp.payload()).unwrap();
    // Within a second of the injected instant (the test itself takes time).
    assert!((status.current_time as i64 - unix).abs() <= 1);
}
