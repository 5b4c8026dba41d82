//! Plant-condition decision engine.
//!
//! Classifies the plant's state from the latest reading, a short sliding
//! window (watering-event detection) and multi-day aggregates
//! (prolonged-dryness detection). The engine memoises its previous output
//! for the hysteresis rule.

pub mod profile;

pub use profile::PlantProfile;

use log::{debug, info, warn};

use crate::clock::CalendarTime;
use crate::store::RingStore;

/// Classifier output. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlantCondition {
    SoilDry,
    SoilWet,
    NeedsWatering,
    WateringCompleted,
    TempTooHigh,
    TempTooLow,
    Error,
}

impl PlantCondition {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SoilDry => "soil dry",
            Self::SoilWet => "soil wet",
            Self::NeedsWatering => "needs watering",
            Self::WateringCompleted => "watering completed",
            Self::TempTooHigh => "temperature too high",
            Self::TempTooLow => "temperature too low",
            Self::Error => "error",
        }
    }
}

/// Minimum samples the recent window must hold before the watering-event
/// rule applies.
const WATERING_WINDOW_MIN_SAMPLES: usize = 3;

/// State-aware classifier.
///
/// Boots assuming wet soil. A device rebooting into a long-dry environment
/// therefore needs one full advisory cycle before the "previously dry" rule
/// can fire.
pub struct DecisionEngine {
    last_condition: PlantCondition,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self {
            last_condition: PlantCondition::SoilWet,
        }
    }

    /// The previously emitted condition (hysteresis input).
    pub fn last_condition(&self) -> PlantCondition {
        self.last_condition
    }

    /// Classify against the store contents at local time `now`.
    ///
    /// First match wins:
    /// 1. missing/invalid latest sample → `Error` (memo unchanged)
    /// 2. temperature at or above the high limit
    /// 3. temperature at or below the low limit
    /// 4. moisture dropped ≥ `watering_delta` since two samples ago
    /// 5. previously dry/advisory and now at or below the wet threshold
    /// 6. enough consecutive dry daily summaries → advisory
    /// 7. at or above dry threshold / 8. at or below wet threshold
    /// 9. previous state (hysteresis)
    pub fn evaluate(
        &mut self,
        profile: &PlantProfile,
        store: &RingStore,
        now: &CalendarTime,
    ) -> PlantCondition {
        let Some(latest) = store.latest_minute() else {
            warn!("decision: no sample available");
            return PlantCondition::Error;
        };
        if latest.error {
            warn!("decision: latest sample flagged erroneous");
            return PlantCondition::Error;
        }

        let condition = self.classify(profile, store, now, latest.soil_moisture(), latest.temperature);
        if condition != self.last_condition {
            info!(
                "plant condition: {} -> {}",
                self.last_condition.as_str(),
                condition.as_str()
            );
        }
        self.last_condition = condition;
        condition
    }

    fn classify(
        &self,
        profile: &PlantProfile,
        store: &RingStore,
        now: &CalendarTime,
        soil_moisture: f32,
        temperature: f32,
    ) -> PlantCondition {
        // Temperature limits outrank every moisture rule.
        if temperature >= profile.temp_high_limit {
            return PlantCondition::TempTooHigh;
        }
        if temperature <= profile.temp_low_limit {
            return PlantCondition::TempTooLow;
        }

        // A sharp drop against the sample two steps back means water was
        // just added (higher raw value = drier soil).
        if self.watering_event_detected(profile, store, now, soil_moisture) {
            info!(
                "watering event: moisture fell >= {:.0} within the recent window",
                profile.watering_delta
            );
            return PlantCondition::WateringCompleted;
        }

        if matches!(
            self.last_condition,
            PlantCondition::SoilDry | PlantCondition::NeedsWatering
        ) && soil_moisture <= profile.soil_wet_threshold
        {
            info!("watering completed: dry state reached the wet threshold");
            return PlantCondition::WateringCompleted;
        }

        if self.prolonged_dryness(profile, store) {
            debug!(
                "needs watering: {} consecutive dry days reached",
                profile.dry_days_for_watering
            );
            return PlantCondition::NeedsWatering;
        }

        if soil_moisture >= profile.soil_dry_threshold {
            return PlantCondition::SoilDry;
        }
        if soil_moisture <= profile.soil_wet_threshold {
            return PlantCondition::SoilWet;
        }

        self.last_condition
    }

    /// Rule 4: compare the current reading with the sample two steps earlier
    /// in the last hour. Skipped until the window holds three samples.
    fn watering_event_detected(
        &self,
        profile: &PlantProfile,
        store: &RingStore,
        now: &CalendarTime,
        current_moisture: f32,
    ) -> bool {
        let mut window = store.get_recent_minutes(1, now);
        if window.len() < WATERING_WINDOW_MIN_SAMPLES {
            debug!("watering check: window too small ({})", window.len());
            return false;
        }

        // Newest first; slot [2] is the sample two steps before the current.
        window.sort_by_key(|s| core::cmp::Reverse(s.timestamp.naive_unix().unwrap_or(i64::MIN)));

        let reference = window[2].soil_moisture();
        let decrease = reference - current_moisture;
        debug!(
            "watering check: two-ago={reference:.0} current={current_moisture:.0} drop={decrease:.0} threshold={:.0}",
            profile.watering_delta
        );
        decrease >= profile.watering_delta
    }

    /// Rule 6: the most recent `dry_days` complete summaries all averaged at
    /// or above the dry threshold.
    fn prolonged_dryness(&self, profile: &PlantProfile, store: &RingStore) -> bool {
        if profile.dry_days_for_watering <= 0 {
            return false;
        }
        let wanted = profile.dry_days_for_watering.min(30) as usize;
        let summaries = store.get_recent_daily_summaries(wanted as u8);
        if summaries.len() < wanted {
            return false;
        }

        let dry_days = summaries
            .iter()
            .filter(|s| s.avg_soil_moisture >= profile.soil_dry_threshold)
            .count();
        dry_days >= wanted
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}
