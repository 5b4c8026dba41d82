//! Tick pacing for the periodic tasks.
//!
//! Each long-running loop (sampling, analysis, cleanup) owns a
//! [`TickScheduler`]. Ticks are timer-driven, not elapsed-time computed: a
//! pass that runs late re-arms from "now", so a missed period is never
//! replayed. When several periods elapse before `poll` is reached again,
//! exactly one tick fires and the rest are coalesced away, acceptable at
//! minute granularity.

use std::time::{Duration, Instant};

use log::debug;

/// Nominal sampling period.
pub const SAMPLING_PERIOD: Duration = Duration::from_secs(60);

/// Analysis (classification + indicator) period.
pub const ANALYSIS_PERIOD: Duration = Duration::from_secs(60);

/// Ring-store cleanup period.
pub const CLEANUP_PERIOD: Duration = Duration::from_secs(3600);

/// Fixed-period tick source with coalescing.
pub struct TickScheduler {
    period: Duration,
    next_due: Option<Instant>,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
        }
    }

    /// Whether a tick fires at `now`. The first poll always fires (the boot
    /// path wants an immediate first sample), after which ticks fire once
    /// per period.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            None => {
                self.next_due = Some(now + self.period);
                true
            }
            Some(due) if now >= due => {
                // Re-arm from now: late ticks are dropped, never caught up.
                if now.duration_since(due) >= self.period {
                    debug!("tick overran by >= one period, coalescing");
                }
                self.next_due = Some(now + self.period);
                true
            }
            Some(_) => false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time until the next tick (for loop sleep sizing).
    pub fn time_to_next(&self, now: Instant) -> Duration {
        match self.next_due {
            Some(due) if due > now => due - now,
            _ => Duration::ZERO,
        }
    }
}
