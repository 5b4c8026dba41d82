//! Sensor port traits and the composite acquisition step.
//!
//! Chip-level register drivers are outside this crate; each sensor family is
//! a driven port implemented by a hardware adapter on the target and by the
//! simulation backends in [`sim`] on the host. [`SensorSet`] owns one adapter
//! per fitted sensor and performs the per-sensor filtering policies when a
//! sampling tick fires.

pub mod sim;

use log::{debug, warn};

use crate::clock::CalendarTime;
use crate::error::SensorError;
use crate::sample::{
    MoistureKind, Sample, SoilMoisture, SoilTemperatures, MAX_SOIL_TEMP_PROBES, MOISTURE_CHANNELS,
};

/// Number of sequential light readings per sample.
const LIGHT_READS: usize = 5;
/// Spacing between light readings.
const LIGHT_READ_SPACING_MS: u32 = 50;
/// Minimum valid light readings to produce a value.
const LIGHT_MIN_VALID: usize = 3;

/// Number of ADC reads averaged for the resistive moisture value.
const MOISTURE_READS: usize = 10;
/// Spacing between moisture ADC reads.
const MOISTURE_READ_SPACING_MS: u32 = 10;

// ---------------------------------------------------------------------------
// Port traits
// ---------------------------------------------------------------------------

/// Inter-read pacing. Hardware adapters sleep; tests use [`NoDelay`].
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

/// Sleeping delay for real acquisition runs.
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
}

/// Zero-cost delay for tests.
pub struct NoDelay;

impl Delay for NoDelay {
    fn delay_ms(&mut self, _ms: u32) {}
}

/// Ambient light sensor: one lux reading per call.
pub trait LightSensor {
    fn read_lux(&mut self) -> Result<f32, SensorError>;
}

/// Combined air temperature / relative humidity reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirReading {
    pub temperature: f32,
    pub humidity: f32,
}

/// Air temperature/humidity sensor.
pub trait AirSensor {
    fn read(&mut self) -> Result<AirReading, SensorError>;
}

/// Resistive soil-moisture probe: one ADC conversion in millivolts.
pub trait ResistiveProbe {
    fn read_millivolts(&mut self) -> Result<f32, SensorError>;
}

/// Four-channel capacitive moisture front-end. Channels are measured one at
/// a time; a driver must not excite more than one channel per call.
pub trait CapacitiveBank {
    fn measure_channel(&mut self, channel: usize) -> Result<f32, SensorError>;
}

/// Soil-temperature probe (population detected at boot).
pub trait SoilTempProbe {
    fn read_celsius(&mut self) -> Result<f32, SensorError>;
}

/// The fitted moisture front-end, one of the two hardware variants.
pub enum MoistureFrontEnd {
    Resistive(Box<dyn ResistiveProbe + Send>),
    Capacitive(Box<dyn CapacitiveBank + Send>),
}

impl MoistureFrontEnd {
    pub fn kind(&self) -> MoistureKind {
        match self {
            Self::Resistive(_) => MoistureKind::Resistive,
            Self::Capacitive(_) => MoistureKind::Capacitive,
        }
    }
}

// ---------------------------------------------------------------------------
// Composite acquisition
// ---------------------------------------------------------------------------

/// The adapter set for one board, owned by the sampling task.
pub struct SensorSet {
    light: Box<dyn LightSensor + Send>,
    air: Box<dyn AirSensor + Send>,
    moisture: MoistureFrontEnd,
    soil_probes: Vec<Box<dyn SoilTempProbe + Send>>,
    delay: Box<dyn Delay + Send>,
}

impl SensorSet {
    pub fn new(
        light: Box<dyn LightSensor + Send>,
        air: Box<dyn AirSensor + Send>,
        moisture: MoistureFrontEnd,
        soil_probes: Vec<Box<dyn SoilTempProbe + Send>>,
        delay: Box<dyn Delay + Send>,
    ) -> Self {
        let mut probes = soil_probes;
        probes.truncate(MAX_SOIL_TEMP_PROBES);
        Self {
            light,
            air,
            moisture,
            soil_probes: probes,
            delay,
        }
    }

    pub fn moisture_kind(&self) -> MoistureKind {
        self.moisture.kind()
    }

    /// Number of soil-temperature probes detected at boot.
    pub fn soil_probe_count(&self) -> usize {
        self.soil_probes.len()
    }

    /// Read every adapter into one composite sample stamped `now`.
    ///
    /// Sub-sensor failures never abort the pass: the affected field is
    /// zeroed and the sample's `error` flag set. Soil-temperature read
    /// failures only zero their slot.
    pub fn acquire(&mut self, now: CalendarTime) -> Sample {
        let mut sample = Sample::zeroed(self.moisture.kind(), now);

        match self.air.read() {
            Ok(air) => {
                sample.temperature = air.temperature;
                sample.humidity = air.humidity;
            }
            Err(e) => {
                warn!("air sensor read failed: {e}");
                sample.error = true;
            }
        }

        match self.read_light_filtered() {
            Ok(lux) => sample.lux = lux,
            Err(e) => {
                warn!("light sensor: {e}");
                sample.error = true;
            }
        }

        sample.soil = self.read_moisture(&mut sample.error);
        sample.soil_temperature = self.read_soil_temperatures();

        debug!(
            "sample {:02}:{:02} temp={:.1} hum={:.1} lux={:.1} soil={:.1} err={}",
            now.hour,
            now.minute,
            sample.temperature,
            sample.humidity,
            sample.lux,
            sample.soil_moisture(),
            sample.error
        );
        sample
    }

    /// Light policy: five sequential readings 50 ms apart, sorted, lowest
    /// and highest discarded, arithmetic mean of the middle. Fewer than
    /// three valid readings is a sensor error.
    fn read_light_filtered(&mut self) -> Result<f32, SensorError> {
        let mut readings: Vec<f32> = Vec::with_capacity(LIGHT_READS);
        for i in 0..LIGHT_READS {
            match self.light.read_lux() {
                Ok(lux) => readings.push(lux),
                Err(e) => debug!("light read {}/{} failed: {e}", i + 1, LIGHT_READS),
            }
            self.delay.delay_ms(LIGHT_READ_SPACING_MS);
        }

        let n = readings.len();
        if n < LIGHT_MIN_VALID {
            return Err(SensorError::NotEnoughSamples);
        }

        readings.sort_by(f32::total_cmp);
        let start = usize::from(n > 3);
        let end = if n > 4 { n - 1 } else { n };
        let trimmed = &readings[start..end];
        Ok(trimmed.iter().sum::<f32>() / trimmed.len() as f32)
    }

    fn read_moisture(&mut self, error: &mut bool) -> SoilMoisture {
        match &mut self.moisture {
            MoistureFrontEnd::Resistive(probe) => {
                // Ten paced ADC conversions, averaged.
                let mut sum = 0.0f32;
                let mut valid = 0usize;
                for i in 0..MOISTURE_READS {
                    match probe.read_millivolts() {
                        Ok(mv) => {
                            sum += mv;
                            valid += 1;
                        }
                        Err(e) => debug!("moisture read {}/{} failed: {e}", i + 1, MOISTURE_READS),
                    }
                    self.delay.delay_ms(MOISTURE_READ_SPACING_MS);
                }

                if valid == 0 {
                    warn!("moisture sensor: every ADC read failed");
                    *error = true;
                    SoilMoisture::Resistive { millivolts: 0.0 }
                } else {
                    SoilMoisture::Resistive {
                        millivolts: sum / valid as f32,
                    }
                }
            }

            MoistureFrontEnd::Capacitive(bank) => {
                // Channels measured independently, in sequence, so one
                // excited channel cannot influence the next.
                let mut channels = [0.0f32; MOISTURE_CHANNELS];
                for (ch, slot) in channels.iter_mut().enumerate() {
                    match bank.measure_channel(ch) {
                        Ok(pf) => *slot = pf,
                        Err(e) => {
                            warn!("capacitance channel {ch} failed: {e}");
                            *error = true;
                        }
                    }
                }
                SoilMoisture::Capacitive { channels }
            }
        }
    }

    /// Probe read failures zero the slot without flagging the sample.
    fn read_soil_temperatures(&mut self) -> SoilTemperatures {
        let mut temps = SoilTemperatures::default();
        for (i, probe) in self.soil_probes.iter_mut().enumerate() {
            temps.values[i] = match probe.read_celsius() {
                Ok(c) => c,
                Err(e) => {
                    warn!("soil temperature probe {i}: {e}");
                    0.0
                }
            };
        }
        temps.count = self.soil_probes.len() as u8;
        temps
    }
}

#[cfg(test)]
mod tests {
    use super::sim::{ScriptedLight, SimHub};
    use super::*;

    fn now() -> CalendarTime {
        CalendarTime::from_ymd_hms(2025, 1, 15, 12, 34, 0)
    }

    fn hub_set(hub: &SimHub) -> SensorSet {
        SensorSet::new(
            hub.light(),
            hub.air(),
            MoistureFrontEnd::Resistive(hub.resistive_probe()),
            vec![hub.soil_probe(0), hub.soil_probe(1)],
            Box::new(NoDelay),
        )
    }

    #[test]
    fn composite_sample_carries_all_fields() {
        let hub = SimHub::new();
        hub.set_air(22.5, 48.0);
        hub.set_lux(320.0);
        hub.set_moisture_mv(1800.0);
        hub.set_soil_temp(0, 18.5);
        hub.set_soil_temp(1, 17.0);

        let mut set = hub_set(&hub);
        let sample = set.acquire(now());

        assert!(!sample.error);
        assert_eq!(sample.temperature, 22.5);
        assert_eq!(sample.humidity, 48.0);
        assert_eq!(sample.lux, 320.0);
        assert_eq!(sample.soil_moisture(), 1800.0);
        assert_eq!(sample.soil_temperature.count, 2);
        assert_eq!(sample.soil_temperature.values[0], 18.5);
    }

    #[test]
    fn light_outliers_are_trimmed() {
        // Five readings: 0 and 10000 are discarded, mean of {100,110,120}.
        let light = ScriptedLight::new(vec![
            Ok(10_000.0),
            Ok(100.0),
            Ok(0.0),
            Ok(120.0),
            Ok(110.0),
        ]);
        let hub = SimHub::new();
        let mut set = SensorSet::new(
            Box::new(light),
            hub.air(),
            MoistureFrontEnd::Resistive(hub.resistive_probe()),
            Vec::new(),
            Box::new(NoDelay),
        );

        let sample = set.acquire(now());
        assert!(!sample.error);
        assert_eq!(sample.lux, 110.0);
    }

    #[test]
    fn too_few_light_readings_flag_the_sample() {
        let light = ScriptedLight::new(vec![
            Ok(100.0),
            Err(SensorError::BusFailed),
            Err(SensorError::CrcMismatch),
            Err(SensorError::BusFailed),
            Ok(120.0),
        ]);
        let hub = SimHub::new();
        let mut set = SensorSet::new(
            Box::new(light),
            hub.air(),
            MoistureFrontEnd::Resistive(hub.resistive_probe()),
            Vec::new(),
            Box::new(NoDelay),
        );

        let sample = set.acquire(now());
        assert!(sample.error);
        assert_eq!(sample.lux, 0.0);
    }

    #[test]
    fn air_failure_zeroes_and_flags() {
        let hub = SimHub::new();
        hub.set_lux(100.0);
        hub.fail_air(true);

        let mut set = hub_set(&hub);
        let sample = set.acquire(now());
        assert!(sample.error);
        assert_eq!(sample.temperature, 0.0);
        assert_eq!(sample.humidity, 0.0);
    }

    #[test]
    fn capacitive_channels_store_array_and_mean() {
        let hub = SimHub::new();
        hub.set_lux(10.0);
        hub.set_capacitance([2.0, 4.0, 6.0, 8.0]);

        let mut set = SensorSet::new(
            hub.light(),
            hub.air(),
            MoistureFrontEnd::Capacitive(hub.capacitive_bank()),
            Vec::new(),
            Box::new(NoDelay),
        );

        let sample = set.acquire(now());
        assert!(!sample.error);
        match sample.soil {
            SoilMoisture::Capacitive { channels } => {
                assert_eq!(channels, [2.0, 4.0, 6.0, 8.0]);
            }
            _ => panic!("expected capacitive variant"),
        }
        assert_eq!(sample.soil_moisture(), 5.0);
    }

    #[test]
    fn capacitive_channel_failure_zeroes_that_channel() {
        let hub = SimHub::new();
        hub.set_lux(10.0);
        hub.set_capacitance([2.0, 4.0, 6.0, 8.0]);
        hub.fail_capacitance_channel(Some(2));

        let mut set = SensorSet::new(
            hub.light(),
            hub.air(),
            MoistureFrontEnd::Capacitive(hub.capacitive_bank()),
            Vec::new(),
            Box::new(NoDelay),
        );

        let sample = set.acquire(now());
        assert!(sample.error);
        match sample.soil {
            SoilMoisture::Capacitive { channels } => {
                assert_eq!(channels, [2.0, 4.0, 0.0, 8.0]);
            }
            _ => panic!("expected capacitive variant"),
        }
    }

    #[test]
    fn soil_probe_failure_zeroes_slot_without_error() {
        let hub = SimHub::new();
        hub.set_lux(10.0);
        hub.set_soil_temp(0, 18.0);
        hub.fail_soil_probe(1, true);

        let mut set = hub_set(&hub);
        let sample = set.acquire(now());

        assert!(!sample.error, "probe failure must not flag the sample");
        assert_eq!(sample.soil_temperature.values[0], 18.0);
        assert_eq!(sample.soil_temperature.values[1], 0.0);
        assert_eq!(sample.soil_temperature.count, 2);
    }

    #[test]
    fn all_moisture_reads_failing_flags_the_sample() {
        let hub = SimHub::new();
        hub.set_lux(10.0);
        hub.fail_moisture(true);

        let mut set = hub_set(&hub);
        let sample = set.acquire(now());
        assert!(sample.error);
        assert_eq!(sample.soil_moisture(), 0.0);
    }
}
