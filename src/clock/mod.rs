//! Wall-clock service.
//!
//! Monotonic uptime plus an optional epoch anchor set by external time sync.
//! Before the first sync the clock reports an epoch-relative time that still
//! advances, so history queries stay ordered even if their absolute dates are
//! meaningless. Local time is resolved through the stored POSIX timezone
//! string, honouring DST rules when the string encodes them.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: `esp_timer_get_time()` supplies monotonic microseconds.
//! On host/test: `std::time::Instant`.

pub mod calendar;
pub mod tz;

pub use calendar::CalendarTime;
pub use tz::PosixTz;

use log::info;

use crate::error::Result;

/// Timezone applied when nothing is persisted.
pub const DEFAULT_TIMEZONE: &str = "JST-9";

/// Maximum persisted timezone string length, NUL excluded.
pub const MAX_TIMEZONE_LEN: usize = 64;

/// The firmware clock. Constructed once at boot and passed by reference.
pub struct Clock {
    #[cfg(not(target_os = "espidf"))]
    boot: std::time::Instant,
    /// Epoch seconds corresponding to uptime zero, set on first sync.
    boot_epoch: Option<i64>,
    tz: PosixTz,
    tz_string: heapless::String<MAX_TIMEZONE_LEN>,
}

impl Clock {
    pub fn new() -> Self {
        let mut tz_string = heapless::String::new();
        let _ = tz_string.push_str(DEFAULT_TIMEZONE);
        Self {
            #[cfg(not(target_os = "espidf"))]
            boot: std::time::Instant::now(),
            boot_epoch: None,
            // The compiled-in default always parses.
            tz: PosixTz::parse(DEFAULT_TIMEZONE).expect("default timezone is valid"),
            tz_string,
        }
    }

    /// Seconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_secs(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000_000
    }

    /// Seconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_secs(&self) -> u64 {
        self.boot.elapsed().as_secs()
    }

    /// Current local civil time.
    ///
    /// Unsynchronised clocks count from the epoch, so the value advances
    /// monotonically either way.
    pub fn now(&self) -> CalendarTime {
        let unix = self.raw_unix();
        let (offset, dst) = self.tz.offset_at(unix);
        CalendarTime::from_unix_local(unix, offset, dst)
    }

    /// Epoch seconds, or `None` until the first successful sync.
    pub fn current_unix(&self) -> Option<i64> {
        self.boot_epoch.map(|_| self.raw_unix())
    }

    /// Whether an external sync event has anchored the clock.
    pub fn is_synchronised(&self) -> bool {
        self.boot_epoch.is_some()
    }

    /// Anchor the clock: `unix_now` is the epoch time at this instant.
    pub fn sync_to(&mut self, unix_now: i64) {
        self.boot_epoch = Some(unix_now - self.uptime_secs() as i64);
        info!("clock synchronised, epoch={unix_now}");
    }

    /// Validate and apply a POSIX timezone string.
    pub fn set_timezone(&mut self, tz_str: &str) -> Result<()> {
        let trimmed = tz_str.trim_end_matches('\0');
        let parsed = PosixTz::parse(trimmed)?;
        self.tz = parsed;
        self.tz_string.clear();
        let _ = self.tz_string.push_str(&trimmed[..trimmed.len().min(MAX_TIMEZONE_LEN)]);
        info!("timezone set to {}", self.tz_string);
        Ok(())
    }

    /// The active timezone string.
    pub fn timezone(&self) -> &str {
        &self.tz_string
    }

    fn raw_unix(&self) -> i64 {
        self.boot_epoch.unwrap_or(0) + self.uptime_secs() as i64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// External time sync port
// ---------------------------------------------------------------------------

/// Driven port for the external time source (SNTP on the target).
///
/// `request_sync` kicks off a sync attempt; the owner keeps running and calls
/// `poll` from its loop. The attempt is bounded: an implementation gives up
/// silently after its timeout and the scheduler continues regardless.
pub trait TimeSyncPort {
    fn request_sync(&mut self) -> Result<()>;

    /// Returns the synchronised epoch time once, when a sync completed.
    fn poll(&mut self) -> Option<i64>;
}

/// Host-side time source with manual injection, used by tests and the
/// simulation build.
#[derive(Default)]
pub struct SimTimeSync {
    requested: bool,
    pending: Option<i64>,
}

impl SimTimeSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a sync has been requested and not yet completed.
    pub fn sync_requested(&self) -> bool {
        self.requested
    }

    /// Complete an outstanding request with the given epoch time.
    pub fn inject(&mut self, unix: i64) {
        if self.requested {
            self.pending = Some(unix);
        }
    }
}

impl TimeSyncPort for SimTimeSync {
    fn request_sync(&mut self) -> Result<()> {
        self.requested = true;
        Ok(())
    }

    fn poll(&mut self) -> Option<i64> {
        let done = self.pending.take();
        if done.is_some() {
            self.requested = false;
        }
        done
    }
}
