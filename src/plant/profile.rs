//! Plant profile: the tunable thresholds that parameterise the decision
//! engine.
//!
//! The profile crosses the link and the flash store as one packed 56-byte
//! blob, so encode/decode live on the type itself and both paths share them.

use heapless::String;

use crate::error::{Error, Result};
use crate::sample::MoistureKind;

/// Packed wire/persist size: `name[32]` + 5 × `f32` + 1 × `i32`.
pub const PROFILE_WIRE_LEN: usize = 56;

const NAME_LEN: usize = 32;

// Factory defaults, tuned for a succulent.
const DEFAULT_NAME: &str = "Succulent Plant";
const DEFAULT_DRY_THRESHOLD: f32 = 2500.0;
const DEFAULT_WET_THRESHOLD: f32 = 1000.0;
const DEFAULT_DRY_DAYS: i32 = 3;
const DEFAULT_TEMP_HIGH: f32 = 35.0;
const DEFAULT_TEMP_LOW: f32 = 10.0;
/// Watering-event delta per moisture front-end: a resistive probe swings
/// hundreds of millivolts on watering, the capacitive channels a few pF.
const DEFAULT_WATERING_DELTA_MV: f32 = 200.0;
const DEFAULT_WATERING_DELTA_PF: f32 = 2.0;

/// Active plant profile.
///
/// Thresholds follow the raw-value orientation of the moisture sensor:
/// higher = drier. `soil_dry_threshold` is therefore numerically *above*
/// `soil_wet_threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlantProfile {
    pub name: String<NAME_LEN>,
    /// At or above this the soil counts as dry.
    pub soil_dry_threshold: f32,
    /// At or below this the soil counts as wet.
    pub soil_wet_threshold: f32,
    /// Consecutive dry days before a watering advisory fires.
    pub dry_days_for_watering: i32,
    pub temp_high_limit: f32,
    pub temp_low_limit: f32,
    /// Moisture drop within the recent window that registers a watering.
    pub watering_delta: f32,
}

impl PlantProfile {
    /// The compiled-in default, persisted when nothing valid is stored.
    pub fn factory_default(kind: MoistureKind) -> Self {
        let mut name = String::new();
        let _ = name.push_str(DEFAULT_NAME);
        Self {
            name,
            soil_dry_threshold: DEFAULT_DRY_THRESHOLD,
            soil_wet_threshold: DEFAULT_WET_THRESHOLD,
            dry_days_for_watering: DEFAULT_DRY_DAYS,
            temp_high_limit: DEFAULT_TEMP_HIGH,
            temp_low_limit: DEFAULT_TEMP_LOW,
            watering_delta: match kind {
                MoistureKind::Resistive => DEFAULT_WATERING_DELTA_MV,
                MoistureKind::Capacitive => DEFAULT_WATERING_DELTA_PF,
            },
        }
    }

    /// Encode into the packed little-endian blob shared by link and flash.
    pub fn to_wire(&self) -> [u8; PROFILE_WIRE_LEN] {
        let mut buf = [0u8; PROFILE_WIRE_LEN];
        let name = self.name.as_bytes();
        buf[..name.len().min(NAME_LEN)].copy_from_slice(&name[..name.len().min(NAME_LEN)]);

        buf[32..36].copy_from_slice(&self.soil_dry_threshold.to_le_bytes());
        buf[36..40].copy_from_slice(&self.soil_wet_threshold.to_le_bytes());
        buf[40..44].copy_from_slice(&self.dry_days_for_watering.to_le_bytes());
        buf[44..48].copy_from_slice(&self.temp_high_limit.to_le_bytes());
        buf[48..52].copy_from_slice(&self.temp_low_limit.to_le_bytes());
        buf[52..56].copy_from_slice(&self.watering_delta.to_le_bytes());
        buf
    }

    /// Decode a packed blob. Rejects wrong sizes and non-UTF-8 names.
    pub fn from_wire(data: &[u8]) -> Result<Self> {
        if data.len() != PROFILE_WIRE_LEN {
            return Err(Error::SizeMismatch {
                expected: PROFILE_WIRE_LEN,
                got: data.len(),
            });
        }

        let name_end = data[..NAME_LEN]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_LEN);
        let name_str = core::str::from_utf8(&data[..name_end])
            .map_err(|_| Error::InvalidArgument("profile name is not UTF-8"))?;
        let mut name = String::new();
        let _ = name.push_str(name_str);

        let f32_at = |off: usize| f32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]]);
        let i32_at = |off: usize| i32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]]);

        Ok(Self {
            name,
            soil_dry_threshold: f32_at(32),
            soil_wet_threshold: f32_at(36),
            dry_days_for_watering: i32_at(40),
            temp_high_limit: f32_at(44),
            temp_low_limit: f32_at(48),
            watering_delta: f32_at(52),
        })
    }
}
