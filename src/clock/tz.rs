//! POSIX timezone string parsing and offset evaluation.
//!
//! The device stores its timezone as a POSIX `TZ` string (e.g. `JST-9`,
//! `CET-1CEST,M3.5.0,M10.5.0/3`), the format `setenv("TZ", ...)` consumes
//! on the target. This module evaluates the string directly so the clock can
//! resolve local time, including daylight-saving transitions when the string
//! encodes them.
//!
//! Supported grammar (the subset seen in the wild on these devices):
//!
//! ```text
//! std offset [ dst [offset] [ , start[/time] , end[/time] ] ]
//! offset = [+|-] hh [:mm [:ss]]          (positive = west of Greenwich)
//! start/end = Jn | n | Mm.w.d            (J1-365, 0-365, month.week.day)
//! time = [+|-] hh [:mm [:ss]]            (default 02:00:00)
//! ```
//!
//! A DST name without explicit rules falls back to the US rule
//! (`M3.2.0,M11.1.0`), matching newlib's behaviour on the target.

use time::{Date, Month, PrimitiveDateTime, Time};

use crate::error::{Error, Result};

const DEFAULT_TRANSITION_SECS: i32 = 2 * 3600;

/// A parsed POSIX timezone specification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PosixTz {
    /// Standard-time offset, seconds east of UTC.
    std_offset: i32,
    dst: Option<DstRule>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DstRule {
    /// DST offset, seconds east of UTC.
    offset: i32,
    start: Transition,
    end: Transition,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Transition {
    day: TransitionDay,
    /// Wall-clock seconds after midnight at which the switch happens.
    time_secs: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TransitionDay {
    /// `Jn`: day 1-365, February 29 never counted.
    JulianNoLeap(u16),
    /// `n`: day 0-365, February 29 counted in leap years.
    JulianWithLeap(u16),
    /// `Mm.w.d`: weekday `d` (0 = Sunday) of week `w` (5 = last) in month `m`.
    MonthWeekDay { month: u8, week: u8, weekday: u8 },
}

impl PosixTz {
    /// Parse a POSIX TZ string. The whole input must be consumed.
    pub fn parse(s: &str) -> Result<Self> {
        let mut p = Parser::new(s.trim_end_matches('\0'));

        p.name()?;
        let std_west = p.offset()?;
        let std_offset = -std_west;

        if p.at_end() {
            return Ok(Self {
                std_offset,
                dst: None,
            });
        }

        p.name()?;
        let dst_offset = if p.peek_is_offset() {
            -p.offset()?
        } else {
            std_offset + 3600
        };

        let (start, end) = if p.at_end() {
            // Name-only DST spec: newlib applies the US rule.
            (
                Transition {
                    day: TransitionDay::MonthWeekDay {
                        month: 3,
                        week: 2,
                        weekday: 0,
                    },
                    time_secs: DEFAULT_TRANSITION_SECS,
                },
                Transition {
                    day: TransitionDay::MonthWeekDay {
                        month: 11,
                        week: 1,
                        weekday: 0,
                    },
                    time_secs: DEFAULT_TRANSITION_SECS,
                },
            )
        } else {
            p.expect(b',')?;
            let start = p.transition()?;
            p.expect(b',')?;
            let end = p.transition()?;
            (start, end)
        };

        if !p.at_end() {
            return Err(Error::InvalidTimezone);
        }

        Ok(Self {
            std_offset,
            dst: Some(DstRule {
                offset: dst_offset,
                start,
                end,
            }),
        })
    }

    /// Resolve the UTC offset (seconds east) and DST flag for an instant.
    pub fn offset_at(&self, unix: i64) -> (i32, bool) {
        let Some(rule) = self.dst else {
            return (self.std_offset, false);
        };

        // Year boundary as seen in standard local time. Good enough: no
        // mainstream rule transitions within an hour of New Year.
        let year = local_year(unix, self.std_offset);
        let start = transition_unix(year, &rule.start, self.std_offset);
        let end = transition_unix(year, &rule.end, rule.offset);

        let active = if start <= end {
            unix >= start && unix < end
        } else {
            // Southern hemisphere: DST spans the new year.
            unix >= start || unix < end
        };

        if active {
            (rule.offset, true)
        } else {
            (self.std_offset, false)
        }
    }

    /// Whether this specification carries a DST rule at all.
    pub fn has_dst(&self) -> bool {
        self.dst.is_some()
    }

    /// The standard-time offset, seconds east of UTC.
    pub fn std_offset_secs(&self) -> i32 {
        self.std_offset
    }
}

fn local_year(unix: i64, offset: i32) -> i32 {
    time::OffsetDateTime::from_unix_timestamp(unix.saturating_add(offset as i64))
        .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
        .year()
}

/// Epoch instant of a rule transition in a given year.
///
/// `wall_offset` is the offset in effect *before* the transition (standard
/// time for the spring switch, DST for the autumn switch), per POSIX.
fn transition_unix(year: i32, tr: &Transition, wall_offset: i32) -> i64 {
    let date = match tr.day {
        TransitionDay::JulianNoLeap(n) => {
            // Day 60 onward skips Feb 29 even in leap years.
            let leap = Date::from_calendar_date(year, Month::December, 31)
                .map(|d| d.ordinal() == 366)
                .unwrap_or(false);
            let ordinal = if leap && n >= 60 { n + 1 } else { n };
            Date::from_ordinal_date(year, ordinal.clamp(1, 366))
        }
        TransitionDay::JulianWithLeap(n) => Date::from_ordinal_date(year, (n + 1).clamp(1, 366)),
        TransitionDay::MonthWeekDay {
            month,
            week,
            weekday,
        } => month_week_day(year, month, week, weekday),
    }
    .unwrap_or(Date::MIN);

    let midnight = PrimitiveDateTime::new(date, Time::MIDNIGHT)
        .assume_utc()
        .unix_timestamp();
    midnight + tr.time_secs as i64 - wall_offset as i64
}

fn month_week_day(year: i32, month: u8, week: u8, weekday: u8) -> std::result::Result<Date, time::error::ComponentRange> {
    let month = Month::try_from(month.clamp(1, 12)).unwrap_or(Month::January);
    let first = Date::from_calendar_date(year, month, 1)?;
    let first_wd = first.weekday().number_days_from_sunday();
    let mut day = 1 + ((weekday as i16 + 7 - first_wd as i16) % 7) as u8 + (week.saturating_sub(1)) * 7;
    let days_in_month = time::util::days_in_year_month(year, month);
    while day > days_in_month {
        day -= 7;
    }
    Date::from_calendar_date(year, month, day)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            bytes: s.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, b: u8) -> Result<()> {
        if self.peek() == Some(b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(Error::InvalidTimezone)
        }
    }

    fn peek_is_offset(&self) -> bool {
        matches!(self.peek(), Some(b'+' | b'-' | b'0'..=b'9'))
    }

    /// Zone name: three or more alphabetic characters, or a `<...>` form.
    fn name(&mut self) -> Result<()> {
        if self.peek() == Some(b'<') {
            self.pos += 1;
            let start = self.pos;
            while let Some(b) = self.peek() {
                if b == b'>' {
                    if self.pos - start < 3 {
                        return Err(Error::InvalidTimezone);
                    }
                    self.pos += 1;
                    return Ok(());
                }
                self.pos += 1;
            }
            return Err(Error::InvalidTimezone);
        }

        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphabetic() {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos - start < 3 {
            return Err(Error::InvalidTimezone);
        }
        Ok(())
    }

    /// `[+|-]hh[:mm[:ss]]` in seconds, sign preserved (POSIX west-positive).
    fn offset(&mut self) -> Result<i32> {
        let sign = match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                -1
            }
            Some(b'+') => {
                self.pos += 1;
                1
            }
            _ => 1,
        };

        let hours = self.number(2)?;
        if hours > 24 {
            return Err(Error::InvalidTimezone);
        }
        let mut secs = hours as i32 * 3600;

        if self.peek() == Some(b':') {
            self.pos += 1;
            let minutes = self.number(2)?;
            if minutes > 59 {
                return Err(Error::InvalidTimezone);
            }
            secs += minutes as i32 * 60;

            if self.peek() == Some(b':') {
                self.pos += 1;
                let seconds = self.number(2)?;
                if seconds > 59 {
                    return Err(Error::InvalidTimezone);
                }
                secs += seconds as i32;
            }
        }

        Ok(sign * secs)
    }

    fn number(&mut self, max_digits: usize) -> Result<u16> {
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() && self.pos - start < max_digits {
                value = value * 10 + (b - b'0') as u32;
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start || value > u16::MAX as u32 {
            return Err(Error::InvalidTimezone);
        }
        Ok(value as u16)
    }

    fn transition(&mut self) -> Result<Transition> {
        let day = match self.peek() {
            Some(b'J') => {
                self.pos += 1;
                let n = self.number(3)?;
                if !(1..=365).contains(&n) {
                    return Err(Error::InvalidTimezone);
                }
                TransitionDay::JulianNoLeap(n)
            }
            Some(b'M') => {
                self.pos += 1;
                let month = self.number(2)?;
                self.expect(b'.')?;
                let week = self.number(1)?;
                self.expect(b'.')?;
                let weekday = self.number(1)?;
                if !(1..=12).contains(&month) || !(1..=5).contains(&week) || weekday > 6 {
                    return Err(Error::InvalidTimezone);
                }
                TransitionDay::MonthWeekDay {
                    month: month as u8,
                    week: week as u8,
                    weekday: weekday as u8,
                }
            }
            Some(b'0'..=b'9') => {
                let n = self.number(3)?;
                if n > 365 {
                    return Err(Error::InvalidTimezone);
                }
                TransitionDay::JulianWithLeap(n)
            }
            _ => return Err(Error::InvalidTimezone),
        };

        let time_secs = if self.peek() == Some(b'/') {
            self.pos += 1;
            let sign = match self.peek() {
                Some(b'-') => {
                    self.pos += 1;
                    -1
                }
                Some(b'+') => {
                    self.pos += 1;
                    1
                }
                _ => 1,
            };
            let hours = self.number(3)?;
            let mut t = hours as i32 * 3600;
            if self.peek() == Some(b':') {
                self.pos += 1;
                t += self.number(2)? as i32 * 60;
                if self.peek() == Some(b':') {
                    self.pos += 1;
                    t += self.number(2)? as i32;
                }
            }
            sign * t
        } else {
            DEFAULT_TRANSITION_SECS
        };

        // POSIX extended range: -167h..167h. Anything wilder is a typo.
        if time_secs.abs() as i64 > 167 * 3600 {
            return Err(Error::InvalidTimezone);
        }

        Ok(Transition { day, time_secs })
    }
}
