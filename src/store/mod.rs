//! Time-indexed ring-buffer store.
//!
//! Constant-memory historical store with two resolutions:
//!
//! - `minute`: 1440 self-describing slots (24 h at one sample per minute),
//!   addressed by a monotonically advancing write index.
//! - `daily`: 30 summary slots addressed by the date hash
//!   `((month-1)*31 + day) % 30`. Two dates more than ~30 days apart can
//!   hash to the same slot; the newer date simply overwrites the older.
//!
//! The store owns both buffers exclusively. Queries that need the current
//! time take it as a parameter so the store stays clock-free.

pub mod summary;

pub use summary::{DailySummary, COMPLETE_SAMPLE_THRESHOLD};

use log::{debug, info};

use crate::clock::calendar::DAILY_SLOTS;
use crate::clock::CalendarTime;
use crate::sample::Sample;

/// Minute-buffer depth: 24 hours at one-minute resolution.
pub const MINUTE_SLOTS: usize = 1440;

/// Retention horizon of the minute buffer, seconds.
const MINUTE_RETENTION_SECS: i64 = 24 * 3600;

/// Retention horizon of the daily buffer, seconds.
const DAILY_RETENTION_SECS: i64 = 30 * 24 * 3600;

#[derive(Debug, Clone, Copy)]
struct MinuteSlot {
    sample: Option<Sample>,
}

impl MinuteSlot {
    const EMPTY: Self = Self { sample: None };
}

/// Buffer occupancy counters and time extents, for the status endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StoreStats {
    pub minute_count: u16,
    pub daily_count: u16,
    pub oldest_minute: Option<CalendarTime>,
    pub newest_minute: Option<CalendarTime>,
    pub oldest_daily: Option<CalendarTime>,
    pub newest_daily: Option<CalendarTime>,
}

/// The historical store. Constructed once at boot; the sampling path writes,
/// the analysis task and protocol engine borrow read-only views.
pub struct RingStore {
    minutes: Box<[MinuteSlot]>,
    daily: [DailySummary; DAILY_SLOTS],
    write_idx: usize,
}

impl RingStore {
    pub fn new() -> Self {
        info!(
            "ring store: {} minute slots, {} daily slots",
            MINUTE_SLOTS, DAILY_SLOTS
        );
        Self {
            minutes: vec![MinuteSlot::EMPTY; MINUTE_SLOTS].into_boxed_slice(),
            daily: [DailySummary::default(); DAILY_SLOTS],
            write_idx: 0,
        }
    }

    // ── Writes ────────────────────────────────────────────────

    /// Insert a composite sample and refresh the matching daily summary.
    ///
    /// A sample whose minute duplicates one already stored overwrites that
    /// slot in place instead of consuming a new one, so the buffer never
    /// holds two slots for the same minute tuple. The most recent slot is
    /// checked first since repeats land there in practice.
    pub fn insert(&mut self, sample: Sample) {
        let duplicate_idx = self
            .latest_index()
            .filter(|&i| {
                self.minutes[i]
                    .sample
                    .map(|s| s.timestamp.same_minute(&sample.timestamp))
                    .unwrap_or(false)
            })
            .or_else(|| {
                self.minutes.iter().position(|slot| {
                    slot.sample
                        .map(|s| s.timestamp.same_minute(&sample.timestamp))
                        .unwrap_or(false)
                })
            });

        let (slot, duplicate) = match duplicate_idx {
            Some(i) => (i, true),
            None => {
                let idx = self.write_idx;
                self.write_idx = (self.write_idx + 1) % MINUTE_SLOTS;
                (idx, false)
            }
        };
        self.minutes[slot].sample = Some(sample);

        debug!(
            "minute[{}] <- {:02}:{:02} soil={:.0}{}",
            slot,
            sample.timestamp.hour,
            sample.timestamp.minute,
            sample.soil_moisture(),
            if duplicate { " (overwrite)" } else { "" }
        );

        self.refresh_daily_summary(&sample.timestamp);
    }

    /// Recompute the daily summary for `date` from the minute buffer and
    /// write it into its hashed slot. Runs in O(buffer) and is invoked on
    /// every insert, which is fine at minute granularity.
    fn refresh_daily_summary(&mut self, date: &CalendarTime) {
        let samples = self.minutes.iter().filter_map(|s| s.sample.as_ref());
        if let Some(summary) = DailySummary::compute(date, samples) {
            let idx = date.daily_slot_index();
            self.daily[idx] = summary;
        }
    }

    /// Invalidate minute slots older than 24 h and daily slots older than
    /// 30 d, measured against `now`. Returns (minutes, days) cleared.
    pub fn cleanup(&mut self, now: &CalendarTime) -> (u16, u16) {
        let Some(now_unix) = now.naive_unix() else {
            return (0, 0);
        };

        let minute_cutoff = now_unix - MINUTE_RETENTION_SECS;
        let daily_cutoff = now_unix - DAILY_RETENTION_SECS;
        let mut cleared_minutes = 0u16;
        let mut cleared_days = 0u16;

        for slot in self.minutes.iter_mut() {
            let stale = slot
                .sample
                .as_ref()
                .and_then(|s| s.timestamp.naive_unix())
                .map(|t| t < minute_cutoff)
                .unwrap_or(false);
            if stale {
                slot.sample = None;
                cleared_minutes += 1;
            }
        }

        for summary in self.daily.iter_mut() {
            if !summary.complete {
                continue;
            }
            let stale = summary
                .date
                .naive_unix()
                .map(|t| t < daily_cutoff)
                .unwrap_or(false);
            if stale {
                summary.complete = false;
                cleared_days += 1;
            }
        }

        if cleared_minutes > 0 || cleared_days > 0 {
            info!(
                "cleanup: removed {} minute entries, {} daily entries",
                cleared_minutes, cleared_days
            );
        }
        (cleared_minutes, cleared_days)
    }

    /// Reset both buffers and the write index.
    pub fn clear_all(&mut self) {
        for slot in self.minutes.iter_mut() {
            slot.sample = None;
        }
        self.daily = [DailySummary::default(); DAILY_SLOTS];
        self.write_idx = 0;
        info!("all data buffers cleared");
    }

    /// Manually recompute the summary for a date. `false` when the minute
    /// buffer holds no sample for that day.
    pub fn recalculate_daily_summary(&mut self, date: &CalendarTime) -> bool {
        let samples = self.minutes.iter().filter_map(|s| s.sample.as_ref());
        match DailySummary::compute(date, samples) {
            Some(summary) => {
                self.daily[date.daily_slot_index()] = summary;
                true
            }
            None => false,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// The most recently written sample, if any.
    pub fn latest_minute(&self) -> Option<Sample> {
        self.latest_index().and_then(|i| self.minutes[i].sample)
    }

    /// Linear scan for the slot matching `ts` at minute precision.
    pub fn get_at_minute(&self, ts: &CalendarTime) -> Option<Sample> {
        self.minutes
            .iter()
            .filter_map(|s| s.sample.as_ref())
            .find(|s| s.timestamp.same_minute(ts))
            .copied()
    }

    /// All valid samples no older than `hours` (clamped to 1..=24) before
    /// `now`. Scan order, not time order; callers sort if they care.
    pub fn get_recent_minutes(&self, hours: u8, now: &CalendarTime) -> Vec<Sample> {
        let hours = hours.clamp(1, 24);
        let Some(now_unix) = now.naive_unix() else {
            return Vec::new();
        };
        let cutoff = now_unix - hours as i64 * 3600;

        self.minutes
            .iter()
            .filter_map(|s| s.sample.as_ref())
            .filter(|s| {
                s.timestamp
                    .naive_unix()
                    .map(|t| t >= cutoff && t <= now_unix)
                    .unwrap_or(false)
            })
            .copied()
            .collect()
    }

    /// All valid samples whose date matches `date`, for bulk export.
    pub fn get_minutes_for_day(&self, date: &CalendarTime) -> Vec<Sample> {
        self.minutes
            .iter()
            .filter_map(|s| s.sample.as_ref())
            .filter(|s| s.timestamp.same_date(date))
            .copied()
            .collect()
    }

    /// The complete summary for `date`, if one exists.
    pub fn get_daily_summary(&self, date: &CalendarTime) -> Option<DailySummary> {
        self.daily
            .iter()
            .find(|d| d.complete && d.date.same_date(date))
            .copied()
    }

    /// The most recent `n` (clamped to 1..=30) complete summaries, sorted by
    /// date ascending.
    pub fn get_recent_daily_summaries(&self, n: u8) -> Vec<DailySummary> {
        let n = n.clamp(1, DAILY_SLOTS as u8) as usize;
        let mut complete: Vec<DailySummary> =
            self.daily.iter().filter(|d| d.complete).copied().collect();
        complete.sort_by(|a, b| a.date.cmp_date(&b.date));

        let skip = complete.len().saturating_sub(n);
        complete.split_off(skip)
    }

    /// Occupancy counters and time extents of both buffers.
    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats::default();

        for sample in self.minutes.iter().filter_map(|s| s.sample.as_ref()) {
            stats.minute_count += 1;
            let ts = sample.timestamp;
            match (stats.oldest_minute, ts.naive_unix()) {
                (_, None) => {}
                (None, Some(_)) => {
                    stats.oldest_minute = Some(ts);
                    stats.newest_minute = Some(ts);
                }
                (Some(oldest), Some(t)) => {
                    if oldest.naive_unix().map(|o| t < o).unwrap_or(true) {
                        stats.oldest_minute = Some(ts);
                    }
                    if stats
                        .newest_minute
                        .and_then(|nw| nw.naive_unix())
                        .map(|nw| t > nw)
                        .unwrap_or(true)
                    {
                        stats.newest_minute = Some(ts);
                    }
                }
            }
        }

        for summary in self.daily.iter().filter(|d| d.complete) {
            stats.daily_count += 1;
            let date = summary.date;
            if stats
                .oldest_daily
                .map(|o| date.cmp_date(&o).is_lt())
                .unwrap_or(true)
            {
                stats.oldest_daily = Some(date);
            }
            if stats
                .newest_daily
                .map(|nw| date.cmp_date(&nw).is_gt())
                .unwrap_or(true)
            {
                stats.newest_daily = Some(date);
            }
        }

        stats
    }

    /// Minute-buffer capacity, for the status endpoint.
    pub const fn minute_capacity(&self) -> usize {
        MINUTE_SLOTS
    }

    fn latest_index(&self) -> Option<usize> {
        let idx = (self.write_idx + MINUTE_SLOTS - 1) % MINUTE_SLOTS;
        self.minutes[idx].sample.as_ref().map(|_| idx)
    }
}

impl Default for RingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::{MoistureKind, Sample, SoilMoisture};

    /// Sample `minutes_after` minutes past 2025-05-10 00:00 local.
    fn sample_at(minutes_after: i64, soil: f32) -> Sample {
        let base = CalendarTime::from_ymd_hms(2025, 5, 10, 0, 0, 0)
            .naive_unix()
            .unwrap();
        let ts = CalendarTime::from_unix_local(base + minutes_after * 60, 0, false);
        let mut s = Sample::zeroed(MoistureKind::Resistive, ts);
        s.temperature = 22.0;
        s.humidity = 48.0;
        s.lux = 320.0;
        s.soil = SoilMoisture::Resistive { millivolts: soil };
        s
    }

    #[test]
    fn latest_minute_returns_last_insert() {
        let mut store = RingStore::new();
        assert!(store.latest_minute().is_none());

        store.insert(sample_at(0, 1800.0));
        store.insert(sample_at(1, 1850.0));

        let latest = store.latest_minute().unwrap();
        assert_eq!(latest.soil_moisture(), 1850.0);
        assert_eq!(latest.timestamp.minute, 1);
    }

    #[test]
    fn duplicate_minute_overwrites_in_place() {
        let mut store = RingStore::new();
        store.insert(sample_at(0, 1800.0));

        let mut again = sample_at(0, 2100.0);
        again.timestamp.second = 30; // same minute, different second
        store.insert(again);

        assert_eq!(store.stats().minute_count, 1);
        assert_eq!(store.latest_minute().unwrap().soil_moisture(), 2100.0);
    }

    #[test]
    fn non_adjacent_duplicate_minute_also_overwrites() {
        let mut store = RingStore::new();
        store.insert(sample_at(0, 1000.0));
        store.insert(sample_at(1, 1100.0));
        // Same minute as the first insert, arriving after an unrelated one.
        store.insert(sample_at(0, 2000.0));

        assert_eq!(store.stats().minute_count, 2);
        let target = CalendarTime::from_ymd_hms(2025, 5, 10, 0, 0, 0);
        assert_eq!(store.get_at_minute(&target).unwrap().soil_moisture(), 2000.0);
    }

    #[test]
    fn get_at_minute_finds_embedded_timestamp() {
        let mut store = RingStore::new();
        for i in 0..10 {
            store.insert(sample_at(i, 1000.0 + i as f32));
        }

        let target = CalendarTime::from_ymd_hms(2025, 5, 10, 0, 7, 0);
        let found = store.get_at_minute(&target).unwrap();
        assert_eq!(found.soil_moisture(), 1007.0);

        let missing = CalendarTime::from_ymd_hms(2025, 5, 10, 3, 0, 0);
        assert!(store.get_at_minute(&missing).is_none());
    }

    #[test]
    fn wraparound_keeps_exactly_one_buffer_of_samples() {
        let mut store = RingStore::new();
        for i in 0..(MINUTE_SLOTS as i64 + 1) {
            store.insert(sample_at(i, 1500.0));
        }

        let now = sample_at(MINUTE_SLOTS as i64, 0.0).timestamp;
        let recent = store.get_recent_minutes(24, &now);
        assert_eq!(recent.len(), MINUTE_SLOTS);

        let first_ts = sample_at(0, 0.0).timestamp;
        assert!(
            !recent.iter().any(|s| s.timestamp.same_minute(&first_ts)),
            "oldest sample must have been evicted"
        );
    }

    #[test]
    fn recent_minutes_filters_by_age() {
        let mut store = RingStore::new();
        store.insert(sample_at(0, 1.0));
        store.insert(sample_at(30, 2.0));
        store.insert(sample_at(90, 3.0));

        let now = sample_at(90, 0.0).timestamp;
        let within_hour = store.get_recent_minutes(1, &now);
        assert_eq!(within_hour.len(), 2); // t=30 and t=90
    }

    #[test]
    fn daily_summary_becomes_complete_and_queryable() {
        let mut store = RingStore::new();
        for i in 0..COMPLETE_SAMPLE_THRESHOLD as i64 {
            store.insert(sample_at(i, 2000.0));
        }

        let date = CalendarTime::from_ymd_hms(2025, 5, 10, 0, 0, 0);
        let summary = store.get_daily_summary(&date).unwrap();
        assert!(summary.complete);
        assert_eq!(summary.valid_samples, COMPLETE_SAMPLE_THRESHOLD);
        assert_eq!(summary.avg_soil_moisture, 2000.0);
    }

    #[test]
    fn incomplete_day_is_not_queryable() {
        let mut store = RingStore::new();
        for i in 0..10 {
            store.insert(sample_at(i, 2000.0));
        }
        let date = CalendarTime::from_ymd_hms(2025, 5, 10, 0, 0, 0);
        assert!(store.get_daily_summary(&date).is_none());
        // The slot is still maintained internally.
        assert!(store.recalculate_daily_summary(&date));
    }

    #[test]
    fn recent_summaries_sorted_ascending() {
        let mut store = RingStore::new();
        // Build three complete days by direct minute inserts.
        for day in 0..3i64 {
            for i in 0..COMPLETE_SAMPLE_THRESHOLD as i64 {
                store.insert(sample_at(day * 1440 + i, 2000.0 + day as f32));
            }
        }

        let recent = store.get_recent_daily_summaries(2);
        assert_eq!(recent.len(), 2);
        assert!(recent[0].date.cmp_date(&recent[1].date).is_lt());
        assert_eq!(recent[1].date.day, 12);
        assert_eq!(recent[1].avg_soil_moisture, 2002.0);
    }

    #[test]
    fn cleanup_drops_stale_entries() {
        let mut store = RingStore::new();
        store.insert(sample_at(0, 1500.0));
        store.insert(sample_at(1, 1500.0));

        // Two days later everything in the minute buffer is stale.
        let later = sample_at(2 * 1440, 0.0).timestamp;
        let (minutes, _) = store.cleanup(&later);
        assert_eq!(minutes, 2);
        assert!(store.latest_minute().is_none());
        assert_eq!(store.stats().minute_count, 0);
    }

    #[test]
    fn clear_all_resets_everything() {
        let mut store = RingStore::new();
        for i in 0..50 {
            store.insert(sample_at(i, 1500.0));
        }
        store.clear_all();

        let stats = store.stats();
        assert_eq!(stats.minute_count, 0);
        assert_eq!(stats.daily_count, 0);
        assert!(store.latest_minute().is_none());
    }

    #[test]
    fn stats_track_time_extents() {
        let mut store = RingStore::new();
        store.insert(sample_at(5, 1.0));
        store.insert(sample_at(10, 2.0));
        store.insert(sample_at(7, 3.0));

        let stats = store.stats();
        assert_eq!(stats.minute_count, 3);
        assert_eq!(stats.oldest_minute.unwrap().minute, 5);
        assert_eq!(stats.newest_minute.unwrap().minute, 10);
    }

    #[test]
    fn minutes_for_day_excludes_other_dates() {
        let mut store = RingStore::new();
        for i in 0..5 {
            store.insert(sample_at(i, 1.0));
        }
        for i in 0..3 {
            store.insert(sample_at(1440 + i, 2.0)); // next day
        }

        let day1 = CalendarTime::from_ymd_hms(2025, 5, 10, 0, 0, 0);
        assert_eq!(store.get_minutes_for_day(&day1).len(), 5);
        let day2 = CalendarTime::from_ymd_hms(2025, 5, 11, 0, 0, 0);
        assert_eq!(store.get_minutes_for_day(&day2).len(), 3);
    }
}
