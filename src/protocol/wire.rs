//! Packed payload layouts for the link.
//!
//! All multi-byte integers are little-endian, floats are IEEE-754 32-bit,
//! structs are packed with no compiler padding, and strings are fixed-length
//! zero-padded UTF-8. Sizes here are part of the compatibility surface and
//! are pinned by tests.
//!
//! The calendar struct keeps C `struct tm` conventions (month 0-11, year
//! since 1900, nine 32-bit fields) because existing clients decode it that
//! way.

use crate::clock::CalendarTime;
use crate::sample::Sample;
use crate::store::StoreStats;

/// Packed calendar struct: nine `i32` fields.
pub const CALENDAR_WIRE_LEN: usize = 36;

/// Composite sample envelope: calendar + five `f32` + flags.
pub const SAMPLE_WIRE_LEN: usize = 60;

/// Time-request payload: one packed calendar struct.
pub const TIME_REQUEST_WIRE_LEN: usize = CALENDAR_WIRE_LEN;

/// Time-response payload: calendar + four `f32`.
pub const TIME_RESPONSE_WIRE_LEN: usize = 52;

/// System status payload.
pub const SYSTEM_STATUS_WIRE_LEN: usize = 24;

/// Device info payload.
pub const DEVICE_INFO_WIRE_LEN: usize = 72;

/// Store status payload: four `i32` counters.
pub const STORE_STATUS_WIRE_LEN: usize = 16;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn put_i32(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn put_f32(buf: &mut [u8], off: usize, v: f32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

fn get_i32(buf: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn get_f32(buf: &[u8], off: usize) -> f32 {
    f32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

/// Copy `s` into a fixed-length zero-padded field.
pub fn put_fixed_str(buf: &mut [u8], s: &str) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(buf.len());
    buf[..n].copy_from_slice(&bytes[..n]);
    for b in buf[n..].iter_mut() {
        *b = 0;
    }
}

/// Read a fixed-length zero-padded field back into a string slice.
pub fn get_fixed_str(buf: &[u8]) -> &str {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    core::str::from_utf8(&buf[..end]).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Calendar struct
// ---------------------------------------------------------------------------

/// Encode a calendar time in `struct tm` field order:
/// sec, min, hour, mday, mon (0-11), year (since 1900), wday, yday, isdst.
pub fn encode_calendar(ct: &CalendarTime, buf: &mut [u8]) {
    put_i32(buf, 0, ct.second as i32);
    put_i32(buf, 4, ct.minute as i32);
    put_i32(buf, 8, ct.hour as i32);
    put_i32(buf, 12, ct.day as i32);
    put_i32(buf, 16, ct.month as i32 - 1);
    put_i32(buf, 20, ct.year as i32 - 1900);
    put_i32(buf, 24, ct.weekday as i32);
    put_i32(buf, 28, ct.yearday as i32);
    put_i32(buf, 32, ct.dst as i32);
}

/// Decode a packed calendar struct. `None` when the fields do not form a
/// civil timestamp; lookups treat that as a miss.
pub fn decode_calendar(data: &[u8]) -> Option<CalendarTime> {
    if data.len() < CALENDAR_WIRE_LEN {
        return None;
    }

    let second = get_i32(data, 0);
    let minute = get_i32(data, 4);
    let hour = get_i32(data, 8);
    let day = get_i32(data, 12);
    let month = get_i32(data, 16) + 1;
    let year = get_i32(data, 20) + 1900;

    if !(0..=59).contains(&second)
        || !(0..=59).contains(&minute)
        || !(0..=23).contains(&hour)
        || !(1..=31).contains(&day)
        || !(1..=12).contains(&month)
        || !(0..=u16::MAX as i32).contains(&year)
    {
        return None;
    }

    Some(CalendarTime::from_ymd_hms(
        year as u16,
        month as u8,
        day as u8,
        hour as u8,
        minute as u8,
        second as u8,
    ))
}

// ---------------------------------------------------------------------------
// Composite sample envelope
// ---------------------------------------------------------------------------

/// Encode the shared sample envelope sent on the latest-sample path:
/// calendar, lux, temperature, humidity, aggregate soil moisture, primary
/// soil temperature, error flag, data version, two pad bytes.
///
/// The envelope is revision-independent; the capacitive per-channel array
/// travels over the bulk-transfer endpoint instead.
pub fn encode_sample(sample: &Sample) -> [u8; SAMPLE_WIRE_LEN] {
    let mut buf = [0u8; SAMPLE_WIRE_LEN];
    encode_calendar(&sample.timestamp, &mut buf[..CALENDAR_WIRE_LEN]);
    put_f32(&mut buf, 36, sample.lux);
    put_f32(&mut buf, 40, sample.temperature);
    put_f32(&mut buf, 44, sample.humidity);
    put_f32(&mut buf, 48, sample.soil_moisture());
    put_f32(&mut buf, 52, sample.soil_temperature.primary());
    buf[56] = sample.error as u8;
    buf[57] = sample.data_version;
    // buf[58..60] stays zero (padding)
    buf
}

/// Decoded view of the sample envelope, for host-side clients and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WireSample {
    pub timestamp: CalendarTime,
    pub lux: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub soil_moisture: f32,
    pub soil_temperature: f32,
    pub error: bool,
    pub data_version: u8,
}

impl WireSample {
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() != SAMPLE_WIRE_LEN {
            return None;
        }
        Some(Self {
            timestamp: decode_calendar(&data[..CALENDAR_WIRE_LEN])?,
            lux: get_f32(data, 36),
            temperature: get_f32(data, 40),
            humidity: get_f32(data, 44),
            soil_moisture: get_f32(data, 48),
            soil_temperature: get_f32(data, 52),
            error: data[56] != 0,
            data_version: data[57],
        })
    }
}

// ---------------------------------------------------------------------------
// Time-data response
// ---------------------------------------------------------------------------

/// Encode the found sample for a time-data request: the actual calendar
/// time followed by temperature, humidity, lux, soil moisture.
pub fn encode_time_response(sample: &Sample) -> [u8; TIME_RESPONSE_WIRE_LEN] {
    let mut buf = [0u8; TIME_RESPONSE_WIRE_LEN];
    encode_calendar(&sample.timestamp, &mut buf[..CALENDAR_WIRE_LEN]);
    put_f32(&mut buf, 36, sample.temperature);
    put_f32(&mut buf, 40, sample.humidity);
    put_f32(&mut buf, 44, sample.lux);
    put_f32(&mut buf, 48, sample.soil_moisture());
    buf
}

// ---------------------------------------------------------------------------
// System status
// ---------------------------------------------------------------------------

/// The struct-form system status payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemStatus {
    pub uptime_seconds: u32,
    pub heap_free: u32,
    pub heap_min: u32,
    pub task_count: u32,
    /// Epoch seconds; zero until the clock has synchronised.
    pub current_time: u32,
    pub link_connected: bool,
    pub subscribed: bool,
}

impl SystemStatus {
    pub fn encode(&self) -> [u8; SYSTEM_STATUS_WIRE_LEN] {
        let mut buf = [0u8; SYSTEM_STATUS_WIRE_LEN];
        put_u32(&mut buf, 0, self.uptime_seconds);
        put_u32(&mut buf, 4, self.heap_free);
        put_u32(&mut buf, 8, self.heap_min);
        put_u32(&mut buf, 12, self.task_count);
        put_u32(&mut buf, 16, self.current_time);
        buf[20] = self.link_connected as u8;
        buf[21] = self.subscribed as u8;
        // buf[22..24] padding
        buf
    }

    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() != SYSTEM_STATUS_WIRE_LEN {
            return None;
        }
        Some(Self {
            uptime_seconds: u32::from_le_bytes(data[0..4].try_into().ok()?),
            heap_free: u32::from_le_bytes(data[4..8].try_into().ok()?),
            heap_min: u32::from_le_bytes(data[8..12].try_into().ok()?),
            task_count: u32::from_le_bytes(data[12..16].try_into().ok()?),
            current_time: u32::from_le_bytes(data[16..20].try_into().ok()?),
            link_connected: data[20] != 0,
            subscribed: data[21] != 0,
        })
    }
}

// ---------------------------------------------------------------------------
// Device info
// ---------------------------------------------------------------------------

/// Device info payload: `name[32]` + `fw[16]` + `hw[16]` + uptime + readings.
pub fn encode_device_info(
    name: &str,
    firmware_version: &str,
    hardware_version: &str,
    uptime_seconds: u32,
    reading_count: u32,
) -> [u8; DEVICE_INFO_WIRE_LEN] {
    let mut buf = [0u8; DEVICE_INFO_WIRE_LEN];
    put_fixed_str(&mut buf[0..32], name);
    put_fixed_str(&mut buf[32..48], firmware_version);
    put_fixed_str(&mut buf[48..64], hardware_version);
    put_u32(&mut buf, 64, uptime_seconds);
    put_u32(&mut buf, 68, reading_count);
    buf
}

// ---------------------------------------------------------------------------
// Store status
// ---------------------------------------------------------------------------

/// Encode buffer occupancy for the store-status endpoint: valid count,
/// capacity, empty flag, full flag.
pub fn encode_store_status(stats: &StoreStats, capacity: usize) -> [u8; STORE_STATUS_WIRE_LEN] {
    let mut buf = [0u8; STORE_STATUS_WIRE_LEN];
    put_i32(&mut buf, 0, stats.minute_count as i32);
    put_i32(&mut buf, 4, capacity as i32);
    put_i32(&mut buf, 8, (stats.minute_count == 0) as i32);
    put_i32(&mut buf, 12, (stats.minute_count as usize >= capacity) as i32);
    buf
}
