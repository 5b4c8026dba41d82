//! Composite sample data model.
//!
//! One `Sample` is produced per sampling tick. The soil-moisture field is a
//! sum type because the moisture front-end differs per hardware revision:
//! early boards read a resistive probe through the ADC (millivolts), later
//! boards measure four capacitive channels (picofarads). The envelope carries
//! the hardware revision and a data-structure version tag so link peers can
//! interpret what they receive.

use crate::clock::CalendarTime;

/// Version tag embedded in every sample and in the wire encoding.
pub const DATA_STRUCTURE_VERSION: u8 = 2;

/// Maximum number of soil-temperature probes any revision carries.
pub const MAX_SOIL_TEMP_PROBES: usize = 4;

/// Number of capacitive moisture channels on capacitive revisions.
pub const MOISTURE_CHANNELS: usize = 4;

// ---------------------------------------------------------------------------
// Hardware revision
// ---------------------------------------------------------------------------

/// Board revision. Determines the moisture front-end and probe population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareRevision {
    /// Resistive moisture probe, no soil-temperature probes.
    Rev1,
    /// Resistive moisture probe, no soil-temperature probes.
    Rev2,
    /// Capacitive 4-channel moisture, up to 2 soil-temperature probes.
    Rev3,
    /// Capacitive 4-channel moisture, up to 4 soil-temperature probes.
    Rev4,
}

impl HardwareRevision {
    /// Two-digit revision code used in the advertised device name.
    pub const fn code(self) -> u8 {
        match self {
            Self::Rev1 => 10,
            Self::Rev2 => 20,
            Self::Rev3 => 30,
            Self::Rev4 => 40,
        }
    }

    /// Human-readable revision string for the device-info payload.
    pub const fn version_string(self) -> &'static str {
        match self {
            Self::Rev1 => "1.0",
            Self::Rev2 => "2.0",
            Self::Rev3 => "3.0",
            Self::Rev4 => "4.0",
        }
    }

    pub const fn moisture_kind(self) -> MoistureKind {
        match self {
            Self::Rev1 | Self::Rev2 => MoistureKind::Resistive,
            Self::Rev3 | Self::Rev4 => MoistureKind::Capacitive,
        }
    }

    /// How many soil-temperature probe slots this revision can populate.
    pub const fn max_soil_temp_probes(self) -> usize {
        match self {
            Self::Rev1 | Self::Rev2 => 0,
            Self::Rev3 => 2,
            Self::Rev4 => 4,
        }
    }
}

/// The kind of moisture front-end fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoistureKind {
    /// ADC probe; primary value is millivolts.
    Resistive,
    /// Four-channel capacitance probe; primary value is picofarads.
    Capacitive,
}

// ---------------------------------------------------------------------------
// Soil readings
// ---------------------------------------------------------------------------

/// Moisture measurement, variant per hardware revision.
///
/// Whatever the unit, a *higher* raw value means *drier* soil: the resistive
/// probe reads higher voltage as soil dries, and the capacitive path keeps
/// the same orientation so profile thresholds transfer. A sudden drop
/// therefore signals a watering event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SoilMoisture {
    Resistive {
        millivolts: f32,
    },
    Capacitive {
        /// Per-channel capacitance in picofarads, measured independently.
        channels: [f32; MOISTURE_CHANNELS],
    },
}

impl SoilMoisture {
    /// The aggregate primary value: the millivolt reading, or the arithmetic
    /// mean of the four capacitive channels.
    pub fn aggregate(&self) -> f32 {
        match self {
            Self::Resistive { millivolts } => *millivolts,
            Self::Capacitive { channels } => {
                channels.iter().sum::<f32>() / MOISTURE_CHANNELS as f32
            }
        }
    }

    pub const fn zeroed(kind: MoistureKind) -> Self {
        match kind {
            MoistureKind::Resistive => Self::Resistive { millivolts: 0.0 },
            MoistureKind::Capacitive => Self::Capacitive {
                channels: [0.0; MOISTURE_CHANNELS],
            },
        }
    }
}

/// Soil-temperature probe readings. Slots beyond `count` are zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SoilTemperatures {
    pub values: [f32; MAX_SOIL_TEMP_PROBES],
    pub count: u8,
}

impl SoilTemperatures {
    /// The reading used by daily aggregates: the first probe, or zero when
    /// no probe is fitted.
    pub fn primary(&self) -> f32 {
        self.values[0]
    }
}

// ---------------------------------------------------------------------------
// Composite sample
// ---------------------------------------------------------------------------

/// The output of one sampling tick.
///
/// Sub-sensor failures zero the affected field and set `error`; the sample
/// is still stored. Zero is a legal measurement for some fields, so `error`
/// is the only reliable validity indicator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: CalendarTime,
    pub lux: f32,
    pub temperature: f32,
    pub humidity: f32,
    pub soil: SoilMoisture,
    pub soil_temperature: SoilTemperatures,
    pub error: bool,
    pub data_version: u8,
}

impl Sample {
    /// A zeroed sample for the given moisture kind, stamped with `timestamp`.
    pub fn zeroed(kind: MoistureKind, timestamp: CalendarTime) -> Self {
        Self {
            timestamp,
            lux: 0.0,
            temperature: 0.0,
            humidity: 0.0,
            soil: SoilMoisture::zeroed(kind),
            soil_temperature: SoilTemperatures::default(),
            error: false,
            data_version: DATA_STRUCTURE_VERSION,
        }
    }

    /// Aggregate soil moisture value (see [`SoilMoisture::aggregate`]).
    pub fn soil_moisture(&self) -> f32 {
        self.soil.aggregate()
    }
}
