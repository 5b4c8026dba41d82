//! Simulation sensor backends for host builds and tests.
//!
//! [`SimHub`] is a shared, injectable sensor bench: tests keep the hub and
//! mutate values or failure modes while the [`SensorSet`](super::SensorSet)
//! owns lightweight adapter handles reading from it. No globals; every hub
//! is an independent instance.

use std::sync::{Arc, Mutex};

use super::{AirReading, AirSensor, CapacitiveBank, LightSensor, ResistiveProbe, SoilTempProbe};
use crate::error::SensorError;
use crate::sample::{MAX_SOIL_TEMP_PROBES, MOISTURE_CHANNELS};

#[derive(Debug)]
struct SimState {
    lux: f32,
    lux_fail: bool,
    temperature: f32,
    humidity: f32,
    air_fail: bool,
    moisture_mv: f32,
    moisture_fail: bool,
    capacitance: [f32; MOISTURE_CHANNELS],
    capacitance_fail_channel: Option<usize>,
    soil_temps: [f32; MAX_SOIL_TEMP_PROBES],
    soil_fail: [bool; MAX_SOIL_TEMP_PROBES],
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            lux: 0.0,
            lux_fail: false,
            temperature: 22.0,
            humidity: 50.0,
            air_fail: false,
            moisture_mv: 1500.0,
            moisture_fail: false,
            capacitance: [0.0; MOISTURE_CHANNELS],
            capacitance_fail_channel: None,
            soil_temps: [0.0; MAX_SOIL_TEMP_PROBES],
            soil_fail: [false; MAX_SOIL_TEMP_PROBES],
        }
    }
}

/// Shared simulated sensor bench.
#[derive(Clone, Default)]
pub struct SimHub {
    state: Arc<Mutex<SimState>>,
}

impl SimHub {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Injection ─────────────────────────────────────────────

    pub fn set_lux(&self, lux: f32) {
        self.state.lock().unwrap().lux = lux;
    }

    pub fn fail_light(&self, fail: bool) {
        self.state.lock().unwrap().lux_fail = fail;
    }

    pub fn set_air(&self, temperature: f32, humidity: f32) {
        let mut s = self.state.lock().unwrap();
        s.temperature = temperature;
        s.humidity = humidity;
    }

    pub fn fail_air(&self, fail: bool) {
        self.state.lock().unwrap().air_fail = fail;
    }

    pub fn set_moisture_mv(&self, mv: f32) {
        self.state.lock().unwrap().moisture_mv = mv;
    }

    pub fn fail_moisture(&self, fail: bool) {
        self.state.lock().unwrap().moisture_fail = fail;
    }

    pub fn set_capacitance(&self, channels: [f32; MOISTURE_CHANNELS]) {
        self.state.lock().unwrap().capacitance = channels;
    }

    pub fn fail_capacitance_channel(&self, channel: Option<usize>) {
        self.state.lock().unwrap().capacitance_fail_channel = channel;
    }

    pub fn set_soil_temp(&self, probe: usize, celsius: f32) {
        if probe < MAX_SOIL_TEMP_PROBES {
            self.state.lock().unwrap().soil_temps[probe] = celsius;
        }
    }

    pub fn fail_soil_probe(&self, probe: usize, fail: bool) {
        if probe < MAX_SOIL_TEMP_PROBES {
            self.state.lock().unwrap().soil_fail[probe] = fail;
        }
    }

    // ── Adapter handles ───────────────────────────────────────

    pub fn light(&self) -> Box<dyn LightSensor + Send> {
        Box::new(SimLight { hub: self.clone() })
    }

    pub fn air(&self) -> Box<dyn AirSensor + Send> {
        Box::new(SimAir { hub: self.clone() })
    }

    pub fn resistive_probe(&self) -> Box<dyn ResistiveProbe + Send> {
        Box::new(SimResistive { hub: self.clone() })
    }

    pub fn capacitive_bank(&self) -> Box<dyn CapacitiveBank + Send> {
        Box::new(SimCapacitive { hub: self.clone() })
    }

    pub fn soil_probe(&self, index: usize) -> Box<dyn SoilTempProbe + Send> {
        Box::new(SimSoilProbe {
            hub: self.clone(),
            index,
        })
    }
}

struct SimLight {
    hub: SimHub,
}

impl LightSensor for SimLight {
    fn read_lux(&mut self) -> Result<f32, SensorError> {
        let s = self.hub.state.lock().unwrap();
        if s.lux_fail {
            Err(SensorError::BusFailed)
        } else {
            Ok(s.lux)
        }
    }
}

struct SimAir {
    hub: SimHub,
}

impl AirSensor for SimAir {
    fn read(&mut self) -> Result<AirReading, SensorError> {
        let s = self.hub.state.lock().unwrap();
        if s.air_fail {
            Err(SensorError::CrcMismatch)
        } else {
            Ok(AirReading {
                temperature: s.temperature,
                humidity: s.humidity,
            })
        }
    }
}

struct SimResistive {
    hub: SimHub,
}

impl ResistiveProbe for SimResistive {
    fn read_millivolts(&mut self) -> Result<f32, SensorError> {
        let s = self.hub.state.lock().unwrap();
        if s.moisture_fail {
            Err(SensorError::AdcReadFailed)
        } else {
            Ok(s.moisture_mv)
        }
    }
}

struct SimCapacitive {
    hub: SimHub,
}

impl CapacitiveBank for SimCapacitive {
    fn measure_channel(&mut self, channel: usize) -> Result<f32, SensorError> {
        let s = self.hub.state.lock().unwrap();
        if channel >= MOISTURE_CHANNELS {
            return Err(SensorError::OutOfRange);
        }
        if s.capacitance_fail_channel == Some(channel) {
            Err(SensorError::BusFailed)
        } else {
            Ok(s.capacitance[channel])
        }
    }
}

struct SimSoilProbe {
    hub: SimHub,
    index: usize,
}

impl SoilTempProbe for SimSoilProbe {
    fn read_celsius(&mut self) -> Result<f32, SensorError> {
        let s = self.hub.state.lock().unwrap();
        if self.index >= MAX_SOIL_TEMP_PROBES || s.soil_fail[self.index] {
            Err(SensorError::BusFailed)
        } else {
            Ok(s.soil_temps[self.index])
        }
    }
}

/// A light sensor that replays a fixed script of readings, then repeats the
/// last entry. Used to exercise the outlier filter deterministically.
pub struct ScriptedLight {
    script: Vec<Result<f32, SensorError>>,
    pos: usize,
}

impl ScriptedLight {
    pub fn new(script: Vec<Result<f32, SensorError>>) -> Self {
        Self { script, pos: 0 }
    }
}

impl LightSensor for ScriptedLight {
    fn read_lux(&mut self) -> Result<f32, SensorError> {
        let idx = self.pos.min(self.script.len().saturating_sub(1));
        self.pos += 1;
        self.script.get(idx).copied().unwrap_or(Ok(0.0))
    }
}
