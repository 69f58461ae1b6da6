//! Calendar month periods evaluated in the business time zone.

use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::GatewayError;

/// A calendar month in the business time zone.
///
/// Trips are grouped by the month of their start date as seen on the
/// operating region's clock, not in UTC.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub struct MonthPeriod {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1-12.
    pub month: u32,
}

impl MonthPeriod {
    /// Creates a validated period.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if `month` is outside 1-12
    /// or the year is outside chrono's supported range.
    pub fn new(year: i32, month: u32) -> Result<Self, GatewayError> {
        if !(1..=12).contains(&month) {
            return Err(GatewayError::InvalidRequest(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(GatewayError::InvalidRequest(format!(
                "year out of range: {year}"
            )));
        }
        Ok(Self { year, month })
    }

    /// The period containing `instant` on the business clock.
    #[must_use]
    pub fn containing(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = instant.with_timezone(&offset);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }

    /// The current period on the business clock.
    #[must_use]
    pub fn current(offset: FixedOffset) -> Self {
        Self::containing(Utc::now(), offset)
    }

    /// Builds a period from optional filters, defaulting each missing
    /// component to the current month or year.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for an invalid month.
    pub fn from_filters(
        month: Option<u32>,
        year: Option<i32>,
        offset: FixedOffset,
    ) -> Result<Self, GatewayError> {
        let now = Self::current(offset);
        Self::new(year.unwrap_or(now.year), month.unwrap_or(now.month))
    }

    /// The following month.
    #[must_use]
    pub const fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Half-open UTC range `[start, end)` covering this month on the
    /// business clock.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if the month boundaries
    /// cannot be represented.
    pub fn utc_range(
        self,
        offset: FixedOffset,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), GatewayError> {
        let start = month_start(self, offset)?;
        let end = month_start(self.next(), offset)?;
        Ok((start, end))
    }

    /// Returns `true` if `instant` falls in this month on the business clock.
    #[must_use]
    pub fn contains(self, instant: DateTime<Utc>, offset: FixedOffset) -> bool {
        Self::containing(instant, offset) == self
    }
}

fn month_start(period: MonthPeriod, offset: FixedOffset) -> Result<DateTime<Utc>, GatewayError> {
    offset
        .with_ymd_and_hms(period.year, period.month, 1, 0, 0, 0)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| GatewayError::InvalidRequest(format!("unrepresentable month {period}")))
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn riyadh() -> FixedOffset {
        let Some(offset) = FixedOffset::east_opt(3 * 3600) else {
            panic!("valid offset");
        };
        offset
    }

    #[test]
    fn rejects_month_out_of_range() {
        assert!(MonthPeriod::new(2026, 0).is_err());
        assert!(MonthPeriod::new(2026, 13).is_err());
        assert!(MonthPeriod::new(2026, 12).is_ok());
    }

    #[test]
    fn next_wraps_year() {
        let Ok(dec) = MonthPeriod::new(2025, 12) else {
            panic!("valid period");
        };
        assert_eq!(dec.next(), MonthPeriod { year: 2026, month: 1 });
    }

    #[test]
    fn containing_uses_business_clock() {
        // 22:30 UTC on Jan 31 is already Feb 1 in UTC+3.
        let Some(instant) = Utc.with_ymd_and_hms(2026, 1, 31, 22, 30, 0).single() else {
            panic!("valid timestamp");
        };
        assert_eq!(
            MonthPeriod::containing(instant, riyadh()),
            MonthPeriod { year: 2026, month: 2 }
        );
        assert_eq!(
            MonthPeriod::containing(instant, FixedOffset::east_opt(0).unwrap_or(riyadh())),
            MonthPeriod { year: 2026, month: 1 }
        );
    }

    #[test]
    fn utc_range_is_shifted_by_offset() {
        let Ok(period) = MonthPeriod::new(2026, 3) else {
            panic!("valid period");
        };
        let Ok((start, end)) = period.utc_range(riyadh()) else {
            panic!("range should be representable");
        };
        assert_eq!(start.to_rfc3339(), "2026-02-28T21:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-03-31T21:00:00+00:00");
    }

    #[test]
    fn from_filters_defaults_missing_parts() {
        let now = MonthPeriod::current(riyadh());
        let Ok(period) = MonthPeriod::from_filters(Some(4), None, riyadh()) else {
            panic!("valid filters");
        };
        assert_eq!(period.year, now.year);
        assert_eq!(period.month, 4);
        assert!(MonthPeriod::from_filters(Some(99), None, riyadh()).is_err());
    }

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(MonthPeriod { year: 2026, month: 7 }.to_string(), "2026-07");
    }
}
