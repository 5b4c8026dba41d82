//! Unified error types for the plant monitor firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! top-level control loop's error handling uniform. All variants are `Copy`
//! so they can be passed through the scheduler and protocol engine without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Bad argument: out-of-range enum, zero length where positive required.
    InvalidArgument(&'static str),
    /// A subsystem was used before its init. Programming error.
    NotInitialised(&'static str),
    /// No record matches (minute lookup, daily summary, missing blob).
    NotFound,
    /// A persisted blob has an unexpected size.
    SizeMismatch { expected: usize, got: usize },
    /// Persistent storage or link-layer operation failed.
    Io(&'static str),
    /// A sub-sensor failed during a sampling pass.
    Sensor(SensorError),
    /// Bounded external wait (time sync, link connect) elapsed.
    Timeout,
    /// Timezone string could not be parsed.
    InvalidTimezone,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::NotInitialised(what) => write!(f, "{what} not initialised"),
            Self::NotFound => write!(f, "not found"),
            Self::SizeMismatch { expected, got } => {
                write!(f, "size mismatch: expected {expected}, got {got}")
            }
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Timeout => write!(f, "timed out"),
            Self::InvalidTimezone => write!(f, "invalid timezone string"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// A specific sub-sensor failed. The composite sample records this with its
/// single `error` flag and carries whatever values were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Bus transaction (I2C/1-Wire) failed or timed out.
    BusFailed,
    /// ADC conversion returned an error.
    AdcReadFailed,
    /// Reading carried a CRC that did not match; the reading is discarded.
    CrcMismatch,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// Too few valid readings to apply the outlier filter.
    NotEnoughSamples,
    /// The probe was not detected at boot.
    NotDetected,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFailed => write!(f, "bus transaction failed"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::CrcMismatch => write!(f, "CRC mismatch"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::NotEnoughSamples => write!(f, "not enough valid readings"),
            Self::NotDetected => write!(f, "probe not detected"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
