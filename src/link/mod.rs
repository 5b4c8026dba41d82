//! Link adapter: endpoints, subscriptions and notification delivery.
//!
//! The device exposes one primary 128-bit service with five characteristics.
//! The UUIDs are a compatibility surface shared with existing clients and
//! must stay bit-exact. Stack integration (GATT registration, advertising)
//! lives behind [`LinkTransport`]; this module owns everything above it:
//! which endpoints are subscribed, the last response for readback, and the
//! handoff of inbound command frames to the protocol engine's task.

pub mod control;

pub use control::{LinkControl, LinkCredentials, SimLinkControl, CREDENTIALS_WIRE_LEN};

use core::fmt::Write as _;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

use crate::protocol::frame::Response;
use crate::protocol::wire::{encode_sample, encode_store_status, SAMPLE_WIRE_LEN};
use crate::sample::{HardwareRevision, Sample};
use crate::store::RingStore;

/// Advertised application name, also returned in device info.
pub const APP_NAME: &str = "Plant Monitor";

/// Firmware version string returned in device info.
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// UUIDs (bit-exact compatibility surface)
// ---------------------------------------------------------------------------
//
// Byte arrays are in over-the-air (little-endian) order, the same order the
// BLE stack consumes. `uuid_string` renders the canonical text form.

/// Primary service `59462f12-9543-9999-12c8-58b459a2712d`.
pub const SERVICE_UUID: [u8; 16] = [
    0x2d, 0x71, 0xa2, 0x59, 0xb4, 0x58, 0xc8, 0x12, 0x99, 0x99, 0x43, 0x95, 0x12, 0x2f, 0x46, 0x59,
];

/// Latest-sample characteristic `6a3b2c01-4e5f-6a7b-8c9d-e0f123456789` (read, notify).
pub const CHR_SENSOR_DATA_UUID: [u8; 16] = [
    0x89, 0x67, 0x45, 0x23, 0xf1, 0xe0, 0x9d, 0x8c, 0x7b, 0x6a, 0x5f, 0x4e, 0x01, 0x2c, 0x3b, 0x6a,
];

/// Store-status characteristic `6a3b2c1d-4e5f-6a7b-8c9d-e0f123456790` (read, write).
pub const CHR_STORE_STATUS_UUID: [u8; 16] = [
    0x90, 0x67, 0x45, 0x23, 0xf1, 0xe0, 0x9d, 0x8c, 0x7b, 0x6a, 0x5f, 0x4e, 0x1d, 0x2c, 0x3b, 0x6a,
];

/// Command characteristic `6a3b2c1d-4e5f-6a7b-8c9d-e0f123456791` (write, write-no-rsp).
pub const CHR_COMMAND_UUID: [u8; 16] = [
    0x91, 0x67, 0x45, 0x23, 0xf1, 0xe0, 0x9d, 0x8c, 0x7b, 0x6a, 0x5f, 0x4e, 0x1d, 0x2c, 0x3b, 0x6a,
];

/// Response characteristic `6a3b2c1d-4e5f-6a7b-8c9d-e0f123456792` (read, notify).
pub const CHR_RESPONSE_UUID: [u8; 16] = [
    0x92, 0x67, 0x45, 0x23, 0xf1, 0xe0, 0x9d, 0x8c, 0x7b, 0x6a, 0x5f, 0x4e, 0x1d, 0x2c, 0x3b, 0x6a,
];

/// Bulk-transfer characteristic `6a3b2c1d-4e5f-6a7b-8c9d-e0f123456793` (read, write, notify).
pub const CHR_BULK_TRANSFER_UUID: [u8; 16] = [
    0x93, 0x67, 0x45, 0x23, 0xf1, 0xe0, 0x9d, 0x8c, 0x7b, 0x6a, 0x5f, 0x4e, 0x1d, 0x2c, 0x3b, 0x6a,
];

/// Canonical text form of a little-endian UUID byte array.
pub fn uuid_string(uuid: &[u8; 16]) -> std::string::String {
    let mut s = std::string::String::with_capacity(36);
    for (i, b) in uuid.iter().rev().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            s.push('-');
        }
        let _ = write!(s, "{b:02x}");
    }
    s
}

// ---------------------------------------------------------------------------
// Device identity
// ---------------------------------------------------------------------------

/// Identity baked at boot: hardware revision and the radio MAC.
#[derive(Debug, Clone, Copy)]
pub struct DeviceIdentity {
    pub hardware: HardwareRevision,
    pub mac: [u8; 6],
}

impl DeviceIdentity {
    /// Advertised device name: `PlantMonitor_<HWVER2>_<LAST4HEXOFMAC>`.
    pub fn advertised_name(&self) -> heapless::String<32> {
        let mut name = heapless::String::new();
        let _ = write!(
            name,
            "PlantMonitor_{:02}_{:02X}{:02X}",
            self.hardware.code(),
            self.mac[4],
            self.mac[5]
        );
        name
    }
}

// ---------------------------------------------------------------------------
// Endpoints and subscriptions
// ---------------------------------------------------------------------------

/// The five logical endpoints of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Latest composite sample (read + notify).
    SensorData,
    /// Ring-store occupancy (read + write).
    StoreStatus,
    /// Command frames (write, write-without-response).
    Command,
    /// Response frames (read + notify).
    Response,
    /// Bulk transfer (read + write + notify), reserved.
    BulkTransfer,
}

#[derive(Debug, Clone, Copy, Default)]
struct Subscriptions {
    sensor_data: bool,
    response: bool,
    bulk_transfer: bool,
}

// ---------------------------------------------------------------------------
// Transport port
// ---------------------------------------------------------------------------

/// Driven port to the packet transport (GATT notifications on the target).
pub trait LinkTransport {
    /// Deliver a notification on an endpoint. Fire-and-forget: failures are
    /// logged by the caller and never block the engine.
    fn notify(&mut self, endpoint: Endpoint, data: &[u8]) -> crate::error::Result<()>;
}

/// Host transport recording every notification for inspection.
#[derive(Default)]
pub struct SimTransport {
    pub sent: Vec<(Endpoint, Vec<u8>)>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications delivered on one endpoint.
    pub fn sent_on(&self, endpoint: Endpoint) -> Vec<&Vec<u8>> {
        self.sent
            .iter()
            .filter(|(ep, _)| *ep == endpoint)
            .map(|(_, d)| d)
            .collect()
    }
}

impl LinkTransport for SimTransport {
    fn notify(&mut self, endpoint: Endpoint, data: &[u8]) -> crate::error::Result<()> {
        self.sent.push((endpoint, data.to_vec()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Inbound command channel
// ---------------------------------------------------------------------------

/// Largest accepted inbound command frame.
pub const MAX_COMMAND_FRAME: usize = 512;

/// Depth of the inbound command queue.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// One raw command frame as written to the command endpoint.
pub struct CommandMsg {
    pub frame: heapless::Vec<u8, MAX_COMMAND_FRAME>,
}

/// Bounded channel carrying command frames from transport callbacks to the
/// link-host task. Owned by the composition root, borrowed by both sides.
pub type CommandChannel = Channel<CriticalSectionRawMutex, CommandMsg, COMMAND_QUEUE_DEPTH>;

/// Enqueue a raw frame from a transport write callback. Oversized or
/// queue-full frames are dropped (the client retries).
pub fn push_command_frame(channel: &CommandChannel, raw: &[u8]) -> bool {
    let mut frame = heapless::Vec::new();
    if frame.extend_from_slice(raw).is_err() {
        warn!("command frame of {} bytes dropped (too large)", raw.len());
        return false;
    }
    if channel.try_send(CommandMsg { frame }).is_err() {
        warn!("command queue full, frame dropped");
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// Link host
// ---------------------------------------------------------------------------

/// Owns the transport, subscription state and response readback.
pub struct LinkHost<T: LinkTransport> {
    transport: T,
    subs: Subscriptions,
    last_response: Option<Response>,
}

impl<T: LinkTransport> LinkHost<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            subs: Subscriptions::default(),
            last_response: None,
        }
    }

    /// Track a client (un)subscribing on a notify-capable endpoint.
    pub fn set_subscribed(&mut self, endpoint: Endpoint, subscribed: bool) {
        match endpoint {
            Endpoint::SensorData => self.subs.sensor_data = subscribed,
            Endpoint::Response => self.subs.response = subscribed,
            Endpoint::BulkTransfer => self.subs.bulk_transfer = subscribed,
            _ => {}
        }
        info!("{endpoint:?} subscription {}", if subscribed { "enabled" } else { "disabled" });
    }

    pub fn is_subscribed(&self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::SensorData => self.subs.sensor_data,
            Endpoint::Response => self.subs.response,
            Endpoint::BulkTransfer => self.subs.bulk_transfer,
            _ => false,
        }
    }

    /// A client disconnected: subscriptions are gone.
    pub fn reset(&mut self) {
        self.subs = Subscriptions::default();
        self.last_response = None;
    }

    /// Hand a finished response to the client: keep it for reads and notify
    /// when subscribed. Notification failures are logged, never propagated.
    pub fn deliver_response(&mut self, response: Response) {
        if self.subs.response {
            if let Err(e) = self.transport.notify(Endpoint::Response, response.as_bytes()) {
                warn!("response notification failed: {e}");
            } else {
                debug!(
                    "response 0x{:02X} notified ({} bytes)",
                    response.response_id(),
                    response.as_bytes().len()
                );
            }
        }
        self.last_response = Some(response);
    }

    /// Push the latest sample on the sensor-data endpoint (sampling tick).
    pub fn notify_sample(&mut self, sample: &Sample) {
        if !self.subs.sensor_data {
            return;
        }
        let wire = encode_sample(sample);
        if let Err(e) = self.transport.notify(Endpoint::SensorData, &wire) {
            warn!("sample notification failed: {e}");
        }
    }

    /// Serve a read on the latest-sample endpoint.
    pub fn read_latest_sample(&self, store: &RingStore) -> Option<[u8; SAMPLE_WIRE_LEN]> {
        store.latest_minute().map(|s| encode_sample(&s))
    }

    /// Serve a read on the store-status endpoint.
    pub fn read_store_status(&self, store: &RingStore) -> [u8; 16] {
        encode_store_status(&store.stats(), store.minute_capacity())
    }

    /// Serve a read on the response endpoint.
    pub fn read_last_response(&self) -> Option<&[u8]> {
        self.last_response.as_ref().map(|r| r.as_bytes())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}
