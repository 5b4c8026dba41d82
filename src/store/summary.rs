//! Daily summary records.
//!
//! One record per calendar date, recomputed from the minute buffer on every
//! insert whose date matches. A summary becomes `complete` once the day has
//! accumulated at least [`COMPLETE_SAMPLE_THRESHOLD`] samples (about 20
//! hours); only complete summaries are visible to queries.

use crate::clock::CalendarTime;
use crate::sample::Sample;

/// Sample count at which a day is considered fully covered.
pub const COMPLETE_SAMPLE_THRESHOLD: u16 = 1200;

/// Aggregate statistics over a single calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DailySummary {
    /// Date of the summarised day, time-of-day zeroed.
    pub date: CalendarTime,
    pub max_temperature: f32,
    pub min_temperature: f32,
    pub avg_temperature: f32,
    pub avg_humidity: f32,
    pub avg_lux: f32,
    pub avg_soil_moisture: f32,
    pub max_soil_moisture: f32,
    pub min_soil_moisture: f32,
    pub max_soil_temperature: f32,
    pub min_soil_temperature: f32,
    pub avg_soil_temperature: f32,
    pub valid_samples: u16,
    pub complete: bool,
}

impl DailySummary {
    /// Aggregate all samples in `samples` whose date matches `date`.
    ///
    /// Returns `None` when no sample matches. Erroneous samples participate
    /// with whatever (possibly zeroed) values they carry; the stored `error`
    /// flag is the only validity marker, so aggregates over days with sensor
    /// failures are a documented approximation.
    pub fn compute<'a, I>(date: &CalendarTime, samples: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        let mut count: u32 = 0;
        let mut temp_sum = 0.0f32;
        let mut humidity_sum = 0.0f32;
        let mut lux_sum = 0.0f32;
        let mut soil_sum = 0.0f32;
        let mut soil_temp_sum = 0.0f32;
        let mut min_temp = f32::MAX;
        let mut max_temp = f32::MIN;
        let mut min_soil = f32::MAX;
        let mut max_soil = f32::MIN;
        let mut min_soil_temp = f32::MAX;
        let mut max_soil_temp = f32::MIN;

        for sample in samples {
            if !sample.timestamp.same_date(date) {
                continue;
            }
            count += 1;

            let temp = sample.temperature;
            temp_sum += temp;
            min_temp = min_temp.min(temp);
            max_temp = max_temp.max(temp);

            humidity_sum += sample.humidity;
            lux_sum += sample.lux;

            let soil = sample.soil_moisture();
            soil_sum += soil;
            min_soil = min_soil.min(soil);
            max_soil = max_soil.max(soil);

            let soil_temp = sample.soil_temperature.primary();
            soil_temp_sum += soil_temp;
            min_soil_temp = min_soil_temp.min(soil_temp);
            max_soil_temp = max_soil_temp.max(soil_temp);
        }

        if count == 0 {
            return None;
        }

        let n = count as f32;
        Some(Self {
            date: date.date_only(),
            max_temperature: max_temp,
            min_temperature: min_temp,
            avg_temperature: temp_sum / n,
            avg_humidity: humidity_sum / n,
            avg_lux: lux_sum / n,
            avg_soil_moisture: soil_sum / n,
            max_soil_moisture: max_soil,
            min_soil_moisture: min_soil,
            max_soil_temperature: max_soil_temp,
            min_soil_temperature: min_soil_temp,
            avg_soil_temperature: soil_temp_sum / n,
            valid_samples: count.min(u16::MAX as u32) as u16,
            complete: count >= COMPLETE_SAMPLE_THRESHOLD as u32,
        })
    }
}
