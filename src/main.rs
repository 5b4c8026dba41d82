//! Firmware entry point.
//!
//! Boot order mirrors the deployed device: storage, configuration, clock,
//! sensors, indicator, link. Link failures are non-fatal so sensing and the
//! indicator keep running. After boot a single cooperative loop runs the
//! sampling tick, the analysis tick, hourly cleanup and command dispatch;
//! nothing suspends inside a ring-store operation, so the tasks never
//! observe partial state.
//!
//! On the host this binary runs against the simulation backends; on the
//! target the cfg-gated adapters (NVS, system control) take over and the
//! integrator supplies real sensor and transport adapters.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};

use plantmon::clock::{Clock, SimTimeSync, TimeSyncPort};
use plantmon::indicator::{ColourScheme, Indicator, SimLed};
use plantmon::link::{
    CommandChannel, DeviceIdentity, Endpoint, LinkControl, LinkHost, SimLinkControl, SimTransport,
};
use plantmon::plant::DecisionEngine;
use plantmon::protocol::{CommandContext, ProtocolEngine};
use plantmon::sample::{HardwareRevision, MoistureKind};
use plantmon::scheduler::{TickScheduler, ANALYSIS_PERIOD, CLEANUP_PERIOD, SAMPLING_PERIOD};
use plantmon::sensors::{sim::SimHub, MoistureFrontEnd, SensorSet, ThreadDelay};
use plantmon::storage::{ConfigStore, Storage};
use plantmon::store::RingStore;
use plantmon::system::{SimSwitch, SystemControl};
use plantmon::Error;

/// Compiled-for board revision.
const HARDWARE: HardwareRevision = HardwareRevision::Rev2;

/// Main-loop pacing.
const LOOP_SLEEP: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    init_logging();

    info!("plant monitor v{} starting", plantmon::link::FIRMWARE_VERSION);
    info!("hardware revision {}", HARDWARE.version_string());

    let storage = open_storage().context("persistent storage init")?;
    run(storage)
}

#[cfg(target_os = "espidf")]
fn open_storage() -> plantmon::Result<plantmon::storage::NvsStorage> {
    plantmon::storage::NvsStorage::init()
}

#[cfg(not(target_os = "espidf"))]
fn open_storage() -> plantmon::Result<plantmon::storage::MemoryStorage> {
    Ok(plantmon::storage::MemoryStorage::new())
}

fn run<S: Storage>(storage: S) -> Result<()> {
    // ── Configuration ─────────────────────────────────────────
    let mut config = ConfigStore::new(storage, HARDWARE.moisture_kind());
    config.load_profile();

    let mut clock = Clock::new();
    let tz = config.load_timezone();
    if let Err(e) = clock.set_timezone(&tz) {
        warn!("stored timezone {tz:?} rejected ({e}), keeping default");
    }

    match config.load_credentials() {
        Ok(creds) => info!("link provisioned for SSID {}", creds.ssid),
        Err(Error::NotFound) => info!("link not provisioned yet"),
        Err(e) => warn!("link credentials unusable: {e}"),
    }

    // ── Sensors ───────────────────────────────────────────────
    let bench = SimHub::new();
    bench.set_air(22.0, 50.0);
    bench.set_lux(300.0);
    bench.set_moisture_mv(1600.0);

    let mut sensors = SensorSet::new(
        bench.light(),
        bench.air(),
        MoistureFrontEnd::Resistive(bench.resistive_probe()),
        Vec::new(),
        Box::new(ThreadDelay),
    );
    info!(
        "{} soil temperature probe(s) detected",
        sensors.soil_probe_count()
    );

    // ── Indicator ─────────────────────────────────────────────
    let scheme = match HARDWARE.moisture_kind() {
        MoistureKind::Resistive => ColourScheme::Discrete,
        MoistureKind::Capacitive => ColourScheme::capacitive_gradient(),
    };
    let mut indicator = Indicator::new(SimLed::new(), scheme);
    let mut delay = ThreadDelay;
    indicator.startup_cycle(&mut delay, 50);

    // ── Link ──────────────────────────────────────────────────
    let identity = DeviceIdentity {
        hardware: HARDWARE,
        mac: read_mac(),
    };
    info!("advertising as {}", identity.advertised_name());

    let mut link_host = LinkHost::new(SimTransport::new());
    let mut link = SimLinkControl::new();
    if let Some(creds) = config.active_credentials().cloned() {
        link.configure(&creds);
    }
    let command_channel = CommandChannel::new();

    // ── Core state ────────────────────────────────────────────
    let mut store = RingStore::new();
    let mut engine = ProtocolEngine::new();
    let mut decision = DecisionEngine::new();
    let mut time_sync = SimTimeSync::new();
    let mut system = open_system();
    let switch = SimSwitch::default();

    let mut sampling = TickScheduler::new(SAMPLING_PERIOD);
    let mut analysis = TickScheduler::new(ANALYSIS_PERIOD);
    let mut cleanup = TickScheduler::new(CLEANUP_PERIOD);

    info!("initialisation complete");

    // ── Cooperative loop ──────────────────────────────────────
    loop {
        let tick = Instant::now();

        if let Some(unix) = time_sync.poll() {
            clock.sync_to(unix);
        }

        if sampling.poll(tick) {
            let sample = sensors.acquire(clock.now());
            store.insert(sample);
            link_host.notify_sample(&sample);
        }

        if analysis.poll(tick) {
            let now = clock.now();
            let condition = decision.evaluate(config.active_profile(), &store, &now);
            let moisture = store
                .latest_minute()
                .map(|s| s.soil_moisture())
                .unwrap_or(0.0);
            indicator.show(condition, moisture);
        }

        if cleanup.poll(tick) {
            store.cleanup(&clock.now());
        }

        while let Ok(msg) = command_channel.try_receive() {
            let mut ctx = CommandContext {
                store: &mut store,
                config: &mut config,
                clock: &mut clock,
                link: &mut link,
                time_sync: &mut time_sync,
                system: system.as_mut(),
                switch: &switch,
                identity,
                response_subscribed: link_host.is_subscribed(Endpoint::Response),
            };
            if let Some(response) = engine.dispatch(&msg.frame, &mut ctx) {
                link_host.deliver_response(response);
            }
        }

        std::thread::sleep(LOOP_SLEEP);
    }
}

fn init_logging() {
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::log::EspLogger::initialize_default();
    }
    #[cfg(not(target_os = "espidf"))]
    {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
}

fn open_system() -> Box<dyn SystemControl> {
    #[cfg(target_os = "espidf")]
    {
        Box::new(plantmon::system::EspSystem)
    }
    #[cfg(not(target_os = "espidf"))]
    {
        Box::new(plantmon::system::SimSystem::new())
    }
}

fn read_mac() -> [u8; 6] {
    #[cfg(target_os = "espidf")]
    {
        let mut mac = [0u8; 6];
        unsafe {
            esp_idf_svc::sys::esp_read_mac(
                mac.as_mut_ptr(),
                esp_idf_svc::sys::esp_mac_type_t_ESP_MAC_BT,
            );
        }
        mac
    }
    #[cfg(not(target_os = "espidf"))]
    {
        [0x24, 0x6F, 0x28, 0x00, 0xA1, 0xB2]
    }
}
