//! Command dispatch engine.
//!
//! Transport-decoupled: callers feed raw frame bytes via [`dispatch`] and
//! receive a built [`Response`]; the link host forwards it to the transport.
//! At most one command is in flight: a frame arriving while the busy flag
//! is set is silently dropped and the client retries.
//!
//! Handler errors map one-to-one onto the response status byte; handlers
//! never suspend and never block on the link.
//!
//! [`dispatch`]: ProtocolEngine::dispatch

use log::{info, warn};

use super::frame::{CommandFrame, Response, StatusCode};
use super::wire::{
    decode_calendar, encode_device_info, encode_sample, encode_time_response, SystemStatus,
    CALENDAR_WIRE_LEN,
};
use crate::clock::{Clock, TimeSyncPort, MAX_TIMEZONE_LEN};
use crate::link::{
    DeviceIdentity, LinkControl, LinkCredentials, APP_NAME, CREDENTIALS_WIRE_LEN, FIRMWARE_VERSION,
};
use crate::plant::profile::{PlantProfile, PROFILE_WIRE_LEN};
use crate::storage::{ConfigStore, Storage};
use crate::store::RingStore;
use crate::system::{SwitchInput, SystemControl};

/// Delay between the reset response and the actual restart, letting the
/// notification leave the radio.
pub const RESET_HOLDOFF_MS: u32 = 500;

/// The full command table. Unknown ids answer `INVALID_COMMAND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    GetSensorData = 0x01,
    GetSystemStatus = 0x02,
    SetPlantProfile = 0x03,
    SystemReset = 0x05,
    GetDeviceInfo = 0x06,
    GetTimeData = 0x0A,
    GetSwitchStatus = 0x0B,
    GetPlantProfile = 0x0C,
    SetLinkConfig = 0x0D,
    GetLinkConfig = 0x0E,
    LinkConnect = 0x0F,
    GetTimezone = 0x10,
    SyncTime = 0x11,
    LinkDisconnect = 0x12,
    SaveLinkConfig = 0x13,
    SavePlantProfile = 0x14,
    SetTimezone = 0x15,
    SaveTimezone = 0x16,
}

impl CommandId {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x01 => Some(Self::GetSensorData),
            0x02 => Some(Self::GetSystemStatus),
            0x03 => Some(Self::SetPlantProfile),
            0x05 => Some(Self::SystemReset),
            0x06 => Some(Self::GetDeviceInfo),
            0x0A => Some(Self::GetTimeData),
            0x0B => Some(Self::GetSwitchStatus),
            0x0C => Some(Self::GetPlantProfile),
            0x0D => Some(Self::SetLinkConfig),
            0x0E => Some(Self::GetLinkConfig),
            0x0F => Some(Self::LinkConnect),
            0x10 => Some(Self::GetTimezone),
            0x11 => Some(Self::SyncTime),
            0x12 => Some(Self::LinkDisconnect),
            0x13 => Some(Self::SaveLinkConfig),
            0x14 => Some(Self::SavePlantProfile),
            0x15 => Some(Self::SetTimezone),
            0x16 => Some(Self::SaveTimezone),
            _ => None,
        }
    }
}

/// Borrowed collaborators for one dispatch pass. The engine holds no
/// references between calls; everything is scoped to the request.
pub struct CommandContext<'a, S: Storage> {
    pub store: &'a mut RingStore,
    pub config: &'a mut ConfigStore<S>,
    pub clock: &'a mut Clock,
    pub link: &'a mut dyn LinkControl,
    pub time_sync: &'a mut dyn TimeSyncPort,
    pub system: &'a mut dyn SystemControl,
    pub switch: &'a dyn SwitchInput,
    pub identity: DeviceIdentity,
    /// Whether the response endpoint currently has a subscriber.
    pub response_subscribed: bool,
}

/// The command/response engine.
pub struct ProtocolEngine {
    busy: bool,
    sensor_read_count: u32,
}

impl ProtocolEngine {
    pub fn new() -> Self {
        Self {
            busy: false,
            sensor_read_count: 0,
        }
    }

    /// Total successful sensor-data reads, reported in device info.
    pub fn sensor_read_count(&self) -> u32 {
        self.sensor_read_count
    }

    /// Process one raw command frame.
    ///
    /// Returns `None` only when another command is in flight; the frame is
    /// then dropped without a response and retry is the client's job.
    pub fn dispatch<S: Storage>(
        &mut self,
        raw: &[u8],
        ctx: &mut CommandContext<'_, S>,
    ) -> Option<Response> {
        if self.busy {
            warn!("command received while another is processing, ignoring");
            return None;
        }
        self.busy = true;
        let response = self.dispatch_inner(raw, ctx);
        self.busy = false;
        Some(response)
    }

    fn dispatch_inner<S: Storage>(
        &mut self,
        raw: &[u8],
        ctx: &mut CommandContext<'_, S>,
    ) -> Response {
        let frame = match CommandFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("malformed command frame: {e:?}");
                let id = raw.first().copied().unwrap_or(0);
                let seq = raw.get(1).copied().unwrap_or(0);
                return Response::new(id, StatusCode::InvalidParameter, seq);
            }
        };

        info!(
            "command 0x{:02X} seq={} len={}",
            frame.command_id,
            frame.sequence_num,
            frame.data.len()
        );

        let Some(cmd) = CommandId::from_u8(frame.command_id) else {
            warn!("unknown command id 0x{:02X}", frame.command_id);
            return Response::new(frame.command_id, StatusCode::InvalidCommand, frame.sequence_num);
        };

        let id = frame.command_id;
        let seq = frame.sequence_num;
        match cmd {
            CommandId::GetSensorData => self.get_sensor_data(id, seq, ctx),
            CommandId::GetSystemStatus => self.get_system_status(id, seq, ctx),
            CommandId::SetPlantProfile => self.set_plant_profile(id, seq, frame.data, ctx),
            CommandId::SystemReset => {
                ctx.system.schedule_reset(RESET_HOLDOFF_MS);
                Response::new(id, StatusCode::Success, seq)
            }
            CommandId::GetDeviceInfo => self.get_device_info(id, seq, ctx),
            CommandId::GetTimeData => self.get_time_data(id, seq, frame.data, ctx),
            CommandId::GetSwitchStatus => {
                let state = ctx.switch.is_pressed() as u8;
                Response::with_payload(id, StatusCode::Success, seq, &[state])
            }
            CommandId::GetPlantProfile => {
                let wire = ctx.config.active_profile().to_wire();
                Response::with_payload(id, StatusCode::Success, seq, &wire)
            }
            CommandId::SetLinkConfig => self.set_link_config(id, seq, frame.data, ctx),
            CommandId::GetLinkConfig => self.get_link_config(id, seq, ctx),
            CommandId::LinkConnect => self.link_connect(id, seq, ctx),
            CommandId::GetTimezone => {
                Response::with_payload(id, StatusCode::Success, seq, ctx.clock.timezone().as_bytes())
            }
            CommandId::SyncTime => match ctx.time_sync.request_sync() {
                Ok(()) => Response::new(id, StatusCode::Success, seq),
                Err(e) => {
                    warn!("time sync request failed: {e}");
                    Response::new(id, StatusCode::Error, seq)
                }
            },
            CommandId::LinkDisconnect => match ctx.link.disconnect() {
                Ok(()) => Response::new(id, StatusCode::Success, seq),
                Err(e) => {
                    warn!("disconnect failed: {e}");
                    Response::new(id, StatusCode::Error, seq)
                }
            },
            CommandId::SaveLinkConfig => match ctx.config.save_credentials() {
                Ok(()) => Response::new(id, StatusCode::Success, seq),
                Err(e) => {
                    warn!("saving link credentials failed: {e}");
                    Response::new(id, StatusCode::Error, seq)
                }
            },
            CommandId::SavePlantProfile => {
                let profile = ctx.config.active_profile().clone();
                match ctx.config.save_profile(&profile) {
                    Ok(()) => Response::new(id, StatusCode::Success, seq),
                    Err(e) => {
                        warn!("saving profile failed: {e}");
                        Response::new(id, StatusCode::Error, seq)
                    }
                }
            }
            CommandId::SetTimezone => self.set_timezone(id, seq, frame.data, ctx),
            CommandId::SaveTimezone => {
                let tz = ctx.clock.timezone();
                match ctx.config.save_timezone(tz) {
                    Ok(()) => Response::new(id, StatusCode::Success, seq),
                    Err(e) => {
                        warn!("saving timezone failed: {e}");
                        Response::new(id, StatusCode::Error, seq)
                    }
                }
            }
        }
    }

    // ── Handlers with payloads ────────────────────────────────

    fn get_sensor_data<S: Storage>(
        &mut self,
        id: u8,
        seq: u8,
        ctx: &mut CommandContext<'_, S>,
    ) -> Response {
        match ctx.store.latest_minute() {
            Some(sample) => {
                self.sensor_read_count = self.sensor_read_count.wrapping_add(1);
                Response::with_payload(id, StatusCode::Success, seq, &encode_sample(&sample))
            }
            None => {
                warn!("no sensor data available yet");
                Response::new(id, StatusCode::Error, seq)
            }
        }
    }

    fn get_system_status<S: Storage>(
        &mut self,
        id: u8,
        seq: u8,
        ctx: &mut CommandContext<'_, S>,
    ) -> Response {
        let status = SystemStatus {
            uptime_seconds: ctx.clock.uptime_secs() as u32,
            heap_free: ctx.system.heap_free(),
            heap_min: ctx.system.heap_min_free(),
            task_count: ctx.system.task_count(),
            current_time: ctx.clock.current_unix().unwrap_or(0).max(0) as u32,
            link_connected: ctx.link.is_connected(),
            subscribed: ctx.response_subscribed,
        };
        Response::with_payload(id, StatusCode::Success, seq, &status.encode())
    }

    fn set_plant_profile<S: Storage>(
        &mut self,
        id: u8,
        seq: u8,
        data: &[u8],
        ctx: &mut CommandContext<'_, S>,
    ) -> Response {
        if data.len() != PROFILE_WIRE_LEN {
            warn!(
                "profile payload of {} bytes (expected {PROFILE_WIRE_LEN})",
                data.len()
            );
            return Response::new(id, StatusCode::InvalidParameter, seq);
        }

        let profile = match PlantProfile::from_wire(data) {
            Ok(p) => p,
            Err(e) => {
                warn!("profile payload rejected: {e}");
                return Response::new(id, StatusCode::InvalidParameter, seq);
            }
        };

        info!("new plant profile received: {}", profile.name);
        match ctx.config.save_profile(&profile) {
            Ok(()) => {
                ctx.config.update_active_profile(profile);
                Response::new(id, StatusCode::Success, seq)
            }
            Err(e) => {
                warn!("failed to persist profile: {e}");
                Response::new(id, StatusCode::Error, seq)
            }
        }
    }

    fn get_device_info<S: Storage>(
        &mut self,
        id: u8,
        seq: u8,
        ctx: &mut CommandContext<'_, S>,
    ) -> Response {
        let wire = encode_device_info(
            APP_NAME,
            FIRMWARE_VERSION,
            ctx.identity.hardware.version_string(),
            ctx.clock.uptime_secs() as u32,
            self.sensor_read_count,
        );
        Response::with_payload(id, StatusCode::Success, seq, &wire)
    }

    fn get_time_data<S: Storage>(
        &mut self,
        id: u8,
        seq: u8,
        data: &[u8],
        ctx: &mut CommandContext<'_, S>,
    ) -> Response {
        if data.len() != CALENDAR_WIRE_LEN {
            warn!("time request of {} bytes (expected {CALENDAR_WIRE_LEN})", data.len());
            return Response::new(id, StatusCode::InvalidParameter, seq);
        }

        let Some(requested) = decode_calendar(data) else {
            warn!("time request does not decode to a civil timestamp");
            return Response::new(id, StatusCode::Error, seq);
        };

        match ctx.store.get_at_minute(&requested) {
            Some(sample) => {
                Response::with_payload(id, StatusCode::Success, seq, &encode_time_response(&sample))
            }
            None => {
                info!(
                    "no data for {:04}-{:02}-{:02} {:02}:{:02}",
                    requested.year, requested.month, requested.day, requested.hour, requested.minute
                );
                Response::new(id, StatusCode::Error, seq)
            }
        }
    }

    fn set_link_config<S: Storage>(
        &mut self,
        id: u8,
        seq: u8,
        data: &[u8],
        ctx: &mut CommandContext<'_, S>,
    ) -> Response {
        if data.len() != CREDENTIALS_WIRE_LEN {
            warn!(
                "credentials payload of {} bytes (expected {CREDENTIALS_WIRE_LEN})",
                data.len()
            );
            return Response::new(id, StatusCode::InvalidParameter, seq);
        }

        let creds = match LinkCredentials::from_wire(data) {
            Ok(c) => c,
            Err(e) => {
                warn!("credentials rejected: {e}");
                return Response::new(id, StatusCode::InvalidParameter, seq);
            }
        };

        ctx.link.configure(&creds);
        ctx.config.set_active_credentials(creds);
        Response::new(id, StatusCode::Success, seq)
    }

    fn get_link_config<S: Storage>(
        &mut self,
        id: u8,
        seq: u8,
        ctx: &mut CommandContext<'_, S>,
    ) -> Response {
        match ctx.config.active_credentials() {
            Some(creds) => {
                // The secret leaves the device masked, never verbatim.
                let wire = creds.masked().to_wire();
                Response::with_payload(id, StatusCode::Success, seq, &wire)
            }
            None => {
                info!("link credentials not provisioned");
                Response::new(id, StatusCode::Error, seq)
            }
        }
    }

    fn link_connect<S: Storage>(
        &mut self,
        id: u8,
        seq: u8,
        ctx: &mut CommandContext<'_, S>,
    ) -> Response {
        let Some(creds) = ctx.config.active_credentials().cloned() else {
            warn!("connect requested without credentials");
            return Response::new(id, StatusCode::Error, seq);
        };

        if ctx.link.is_connected() && ctx.link.current_ssid() == Some(creds.ssid.as_str()) {
            info!("already connected to {}", creds.ssid);
            return Response::new(id, StatusCode::Success, seq);
        }

        ctx.link.configure(&creds);
        match ctx.link.connect() {
            Ok(()) => Response::new(id, StatusCode::Success, seq),
            Err(e) => {
                warn!("connect failed: {e}");
                Response::new(id, StatusCode::Error, seq)
            }
        }
    }

    fn set_timezone<S: Storage>(
        &mut self,
        id: u8,
        seq: u8,
        data: &[u8],
        ctx: &mut CommandContext<'_, S>,
    ) -> Response {
        if data.is_empty() || data.len() > MAX_TIMEZONE_LEN {
            warn!("timezone payload of {} bytes", data.len());
            return Response::new(id, StatusCode::InvalidParameter, seq);
        }

        let Ok(tz_str) = core::str::from_utf8(data) else {
            warn!("timezone payload is not UTF-8");
            return Response::new(id, StatusCode::InvalidParameter, seq);
        };

        match ctx.clock.set_timezone(tz_str) {
            Ok(()) => Response::new(id, StatusCode::Success, seq),
            Err(e) => {
                warn!("timezone rejected: {e}");
                Response::new(id, StatusCode::InvalidParameter, seq)
            }
        }
    }
}

impl Default for ProtocolEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SimLinkControl;
    use crate::clock::SimTimeSync;
    use crate::sample::{HardwareRevision, MoistureKind};
    use crate::storage::MemoryStorage;
    use crate::system::{SimSwitch, SimSystem};

    struct Harness {
        store: RingStore,
        config: ConfigStore<MemoryStorage>,
        clock: Clock,
        link: SimLinkControl,
        time_sync: SimTimeSync,
        system: SimSystem,
        switch: SimSwitch,
        engine: ProtocolEngine,
    }

    impl Harness {
        fn new() -> Self {
            let mut config = ConfigStore::new(MemoryStorage::new(), MoistureKind::Resistive);
            config.load_profile();
            Self {
                store: RingStore::new(),
                config,
                clock: Clock::new(),
                link: SimLinkControl::new(),
                time_sync: SimTimeSync::new(),
                system: SimSystem::new(),
                switch: SimSwitch::default(),
                engine: ProtocolEngine::new(),
            }
        }

        fn dispatch(&mut self, raw: &[u8]) -> Option<Response> {
            let mut ctx = CommandContext {
                store: &mut self.store,
                config: &mut self.config,
                clock: &mut self.clock,
                link: &mut self.link,
                time_sync: &mut self.time_sync,
                system: &mut self.system,
                switch: &self.switch,
                identity: DeviceIdentity {
                    hardware: HardwareRevision::Rev2,
                    mac: [0, 1, 2, 3, 4, 5],
                },
                response_subscribed: false,
            };
            self.engine.dispatch(raw, &mut ctx)
        }
    }

    #[test]
    fn unknown_command_answers_invalid_command() {
        let mut h = Harness::new();
        let resp = h.dispatch(&CommandFrame::encode(0xFF, 3, &[])).unwrap();
        assert_eq!(resp.response_id(), 0xFF);
        assert_eq!(resp.status(), StatusCode::InvalidCommand as u8);
        assert_eq!(resp.sequence_num(), 3);
        assert_eq!(resp.data_length(), 0);
    }

    #[test]
    fn short_frame_answers_invalid_parameter() {
        let mut h = Harness::new();
        let resp = h.dispatch(&[0x01, 0x02]).unwrap();
        assert_eq!(resp.status(), StatusCode::InvalidParameter as u8);
    }

    #[test]
    fn length_mismatch_answers_invalid_parameter() {
        let mut h = Harness::new();
        // Declares 10 bytes, carries none.
        let resp = h.dispatch(&[0x01, 0x07, 0x0A, 0x00]).unwrap();
        assert_eq!(resp.status(), StatusCode::InvalidParameter as u8);
        assert_eq!(resp.sequence_num(), 0x07);
    }

    #[test]
    fn busy_engine_silently_drops_the_frame() {
        let mut h = Harness::new();
        h.engine.busy = true;
        assert!(h.dispatch(&CommandFrame::encode(0x06, 1, &[])).is_none());

        h.engine.busy = false;
        assert!(h.dispatch(&CommandFrame::encode(0x06, 1, &[])).is_some());
    }

    #[test]
    fn sensor_data_without_samples_is_an_error() {
        let mut h = Harness::new();
        let resp = h.dispatch(&CommandFrame::encode(0x01, 7, &[])).unwrap();
        assert_eq!(resp.status(), StatusCode::Error as u8);
        assert_eq!(h.engine.sensor_read_count(), 0);
    }

    #[test]
    fn get_switch_status_reports_one_byte() {
        let mut h = Harness::new();
        h.switch.pressed = true;
        let resp = h.dispatch(&CommandFrame::encode(0x0B, 2, &[])).unwrap();
        assert_eq!(resp.status(), StatusCode::Success as u8);
        assert_eq!(resp.payload(), &[1]);
    }

    #[test]
    fn system_reset_schedules_the_holdoff() {
        let mut h = Harness::new();
        let resp = h.dispatch(&CommandFrame::encode(0x05, 9, &[])).unwrap();
        assert_eq!(resp.status(), StatusCode::Success as u8);
        assert_eq!(h.system.reset_requested_after_ms, Some(RESET_HOLDOFF_MS));
    }

    #[test]
    fn set_timezone_validates_and_applies() {
        let mut h = Harness::new();
        let resp = h
            .dispatch(&CommandFrame::encode(0x15, 1, b"UTC0"))
            .unwrap();
        assert_eq!(resp.status(), StatusCode::Success as u8);
        assert_eq!(h.clock.timezone(), "UTC0");

        let resp = h
            .dispatch(&CommandFrame::encode(0x15, 2, b"not a zone!"))
            .unwrap();
        assert_eq!(resp.status(), StatusCode::InvalidParameter as u8);
        assert_eq!(h.clock.timezone(), "UTC0");

        let resp = h.dispatch(&CommandFrame::encode(0x15, 3, &[])).unwrap();
        assert_eq!(resp.status(), StatusCode::InvalidParameter as u8);
    }

    #[test]
    fn sync_time_requests_external_sync() {
        let mut h = Harness::new();
        let resp = h.dispatch(&CommandFrame::encode(0x11, 4, &[])).unwrap();
        assert_eq!(resp.status(), StatusCode::Success as u8);
        assert!(h.time_sync.sync_requested());
    }
}
