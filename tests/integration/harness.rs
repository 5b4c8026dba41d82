//! Test rig wiring every subsystem to its simulation adapter.

use plantmon::clock::{CalendarTime, Clock, SimTimeSync};
use plantmon::link::{
    DeviceIdentity, Endpoint, LinkHost, SimLinkControl, SimTransport,
};
use plantmon::plant::DecisionEngine;
use plantmon::protocol::{CommandContext, CommandFrame, ProtocolEngine, Response};
use plantmon::sample::{HardwareRevision, MoistureKind, Sample, SoilMoisture};
use plantmon::storage::{ConfigStore, MemoryStorage};
use plantmon::store::RingStore;
use plantmon::system::{SimSwitch, SimSystem};

pub struct TestRig {
    pub store: RingStore,
    pub config: ConfigStore<MemoryStorage>,
    pub clock: Clock,
    pub link: SimLinkControl,
    pub time_sync: SimTimeSync,
    pub system: SimSystem,
    pub switch: SimSwitch,
    pub engine: ProtocolEngine,
    pub host: LinkHost<SimTransport>,
    pub decision: DecisionEngine,
    pub identity: DeviceIdentity,
}

impl TestRig {
    /// Boot against empty storage: the factory profile is synthesised and
    /// persisted, the clock gets the stored (default) timezone.
    pub fn boot() -> Self {
        let mut config = ConfigStore::new(MemoryStorage::new(), MoistureKind::Resistive);
        config.load_profile();

        let mut clock = Clock::new();
        let tz = config.load_timezone();
        clock.set_timezone(&tz).expect("stored timezone parses");

        Self {
            store: RingStore::new(),
            config,
            clock,
            link: SimLinkControl::new(),
            time_sync: SimTimeSync::new(),
            system: SimSystem::new(),
            switch: SimSwitch::default(),
            engine: ProtocolEngine::new(),
            host: LinkHost::new(SimTransport::new()),
            decision: DecisionEngine::new(),
            identity: DeviceIdentity {
                hardware: HardwareRevision::Rev2,
                mac: [0x24, 0x6F, 0x28, 0x00, 0xA1, 0xB2],
            },
        }
    }

    /// Feed a raw frame through dispatch and response delivery.
    pub fn send_raw(&mut self, raw: &[u8]) -> Option<Response> {
        let mut ctx = CommandContext {
            store: &mut self.store,
            config: &mut self.config,
            clock: &mut self.clock,
            link: &mut self.link,
            time_sync: &mut self.time_sync,
            system: &mut self.system,
            switch: &self.switch,
            identity: self.identity,
            response_subscribed: self.host.is_subscribed(Endpoint::Response),
        };
        let response = self.engine.dispatch(raw, &mut ctx)?;
        self.host.deliver_response(response.clone());
        Some(response)
    }

    /// Send a well-formed command and expect a response.
    pub fn send(&mut self, command_id: u8, sequence_num: u8, payload: &[u8]) -> Response {
        let raw = CommandFrame::encode(command_id, sequence_num, payload);
        self.send_raw(&raw).expect("engine was not busy")
    }

    /// Insert a composite sample with the given field values.
    pub fn inject_sample(
        &mut self,
        ts: CalendarTime,
        temperature: f32,
        humidity: f32,
        lux: f32,
        soil_mv: f32,
    ) -> Sample {
        let mut sample = Sample::zeroed(MoistureKind::Resistive, ts);
        sample.temperature = temperature;
        sample.humidity = humidity;
        sample.lux = lux;
        sample.soil = SoilMoisture::Resistive { millivolts: soil_mv };
        self.store.insert(sample);
        sample
    }

    /// Insert `count` benign samples starting at `start`, one per minute.
    pub fn fill_minutes(&mut self, start: CalendarTime, count: i64, soil_mv: f32) {
        let base = start.naive_unix().expect("valid start");
        for i in 0..count {
            let ts = CalendarTime::from_unix_local(base + i * 60, 0, false);
            self.inject_sample(ts, 22.0, 50.0, 300.0, soil_mv);
        }
    }
}
