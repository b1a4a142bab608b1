use std::ops::{Add, AddAssign};

use time::{Date, Month, OffsetDateTime, UtcOffset};

use crate::error::BillingError;

/// One calendar month of a billing run.
///
/// Holds the first day, the first day of the following month (exclusive
/// bound for measurement queries) and the last day (inclusive bound printed
/// on invoices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BillingPeriod {
    year: i32,
    month: Month,
    start: Date,
    end: Date,
    last_day: Date,
}

impl BillingPeriod {
    pub const MIN_YEAR: i32 = 1990;
    pub const MAX_YEAR: i32 = 9998;

    pub fn new(year: i32, month: u8) -> Result<Self, BillingError> {
        let invalid = || BillingError::InvalidPeriod { year, month };

        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(invalid());
        }
        let month_value = Month::try_from(month).map_err(|_| invalid())?;

        let start = Date::from_calendar_date(year, month_value, 1).map_err(|_| invalid())?;
        let end = match month_value {
            Month::December => Date::from_calendar_date(year + 1, Month::January, 1),
            m => Date::from_calendar_date(year, m.next(), 1),
        }
        .map_err(|_| invalid())?;
        let last_day = end.previous_day().ok_or_else(invalid)?;

        Ok(Self {
            year,
            month: month_value,
            start,
            end,
            last_day,
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Month {
        self.month
    }

    pub fn month_number(&self) -> u8 {
        self.month as u8
    }

    /// First day of the month.
    pub fn start(&self) -> Date {
        self.start
    }

    /// First day of the next month.
    pub fn end_exclusive(&self) -> Date {
        self.end
    }

    /// Last day of the month.
    pub fn last_day(&self) -> Date {
        self.last_day
    }

    /// Midnight of `date` at the given offset, as an absolute instant.
    pub fn instant_at(date: Date, offset: UtcOffset) -> OffsetDateTime {
        date.midnight().assume_offset(offset)
    }
}

/// Summed price and consumption over a set of measurements.
///
/// The all-zero value stands for "no matching rows"; stores never return an
/// absent total.
#[derive(Debug, Clone, Copy, Default, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UsageTotals {
    pub price: f64,
    pub consumption: f64,
}

impl UsageTotals {
    pub const ZERO: UsageTotals = UsageTotals {
        price: 0.0,
        consumption: 0.0,
    };

    pub fn new(price: f64, consumption: f64) -> Self {
        Self { price, consumption }
    }
}

impl Add for UsageTotals {
    type Output = UsageTotals;

    fn add(self, rhs: Self) -> Self::Output {
        UsageTotals {
            price: self.price + rhs.price,
            consumption: self.consumption + rhs.consumption,
        }
    }
}

impl AddAssign for UsageTotals {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Aggregated usage of one tariff level within a billing month.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TimeBlockUsage {
    pub time_block: u8,
    pub consumption: f64,
    pub price: f64,
    pub start_date: Date,
    pub end_date: Date,
}

/// Engine output for one `(customer, month)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MonthlyUsage {
    pub customer_id: i32,
    pub period: BillingPeriod,
    pub totals: UsageTotals,
    /// Ordered by ascending `time_block`.
    pub blocks: Vec<TimeBlockUsage>,
}

impl MonthlyUsage {
    pub fn total_price(&self) -> f64 {
        self.totals.price
    }

    pub fn total_consumption(&self) -> f64 {
        self.totals.consumption
    }

    pub fn block_consumption(&self) -> f64 {
        self.blocks.iter().map(|b| b.consumption).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn period_bounds_for_regular_month() {
        let period = BillingPeriod::new(2024, 3).unwrap();
        assert_eq!(period.start(), date!(2024 - 03 - 01));
        assert_eq!(period.end_exclusive(), date!(2024 - 04 - 01));
        assert_eq!(period.last_day(), date!(2024 - 03 - 31));
        assert_eq!(period.month_number(), 3);
    }

    #[test]
    fn period_bounds_roll_over_december() {
        let period = BillingPeriod::new(2023, 12).unwrap();
        assert_eq!(period.end_exclusive(), date!(2024 - 01 - 01));
        assert_eq!(period.last_day(), date!(2023 - 12 - 31));
    }

    #[test]
    fn period_handles_leap_february() {
        let period = BillingPeriod::new(2024, 2).unwrap();
        assert_eq!(period.last_day(), date!(2024 - 02 - 29));
    }

    #[test]
    fn period_rejects_invalid_input() {
        assert!(matches!(
            BillingPeriod::new(2024, 13),
            Err(BillingError::InvalidPeriod { year: 2024, month: 13 })
        ));
        assert!(BillingPeriod::new(2024, 0).is_err());
        assert!(BillingPeriod::new(1989, 5).is_err());
    }

    #[test]
    fn instant_at_applies_offset() {
        let offset = UtcOffset::from_hms(1, 0, 0).unwrap();
        let instant = BillingPeriod::instant_at(date!(2024 - 03 - 01), offset);
        assert_eq!(instant, datetime!(2024-02-29 23:00:00 UTC));
    }

    #[test]
    fn usage_totals_accumulate() {
        let mut total = UsageTotals::ZERO;
        total += UsageTotals::new(1.5, 10.0);
        total += UsageTotals::new(0.5, 2.0);
        assert_eq!(total, UsageTotals::new(2.0, 12.0));
    }
}
