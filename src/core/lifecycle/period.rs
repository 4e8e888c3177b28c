//! Clock and period arithmetic for episodes and encounters
//!
//! Closing times follow the 24-hour rule: the remote store rejects or
//! mis-compares an end time less than 24 hours after the start, so every
//! close writes `now + 24h` as the period end instead of the wall-clock
//! end. The offset is fixed and must not be made configurable.

use crate::domain::{CarelinkError, Period, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Hours added to the close time when ending an encounter or episode
pub const CLOSE_OFFSET_HOURS: i64 = 24;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to
///
/// ```
/// use carelink::core::lifecycle::period::{Clock, FixedClock};
/// use chrono::{Duration, TimeZone, Utc};
///
/// let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
/// clock.advance(Duration::days(3));
/// assert_eq!(clock.now(), Utc.with_ymd_and_hms(2025, 1, 4, 0, 0, 0).unwrap());
/// ```
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Period of a newly opened episode: `[start, start + horizon_hours]`
///
/// # Errors
///
/// [`CarelinkError::Configuration`] if the horizon does not fit a
/// representable timestamp.
pub fn opening_period(start: DateTime<Utc>, horizon_hours: i64) -> Result<Period> {
    let end = Duration::try_hours(horizon_hours)
        .and_then(|horizon| start.checked_add_signed(horizon))
        .ok_or_else(|| {
            CarelinkError::Configuration(format!(
                "episode horizon of {horizon_hours} hours overflows the calendar"
            ))
        })?;
    Ok(Period {
        start: Some(start.into()),
        end: Some(end.into()),
    })
}

/// End time written when closing at `now`
pub fn closing_end(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(CLOSE_OFFSET_HOURS)
}

/// `period` with its end replaced by [`closing_end`], start kept verbatim
pub fn closed_period(period: &Period, now: DateTime<Utc>) -> Period {
    Period {
        start: period.start.clone(),
        end: Some(closing_end(now).into()),
    }
}
