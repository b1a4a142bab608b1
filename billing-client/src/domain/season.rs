use std::{fmt, str::FromStr};

use time::{Month, Weekday};

use crate::error::BillingError;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 5;
pub const MAX_HOUR: u8 = 23;

/// Day class a tariff level applies to. Public holidays are not special-cased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum DayType {
    /// Monday to Friday.
    Workday,
    /// Saturday and Sunday.
    Offday,
}

impl DayType {
    pub const ALL: [DayType; 2] = [DayType::Workday, DayType::Offday];

    pub fn of(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Saturday | Weekday::Sunday => Self::Offday,
            _ => Self::Workday,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workday => "WORKDAY",
            Self::Offday => "OFFDAY",
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DayType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WORKDAY" => Ok(Self::Workday),
            "OFFDAY" => Ok(Self::Offday),
            other => Err(BillingError::InvalidTariffLevel(format!(
                "unknown day type '{other}'"
            ))),
        }
    }
}

/// A single clock hour assigned to a tariff tier for one day class.
///
/// A tier is the set of all `TariffLevel` rows sharing `(level, day_type)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TariffLevel {
    level: u8,
    hour: u8,
    day_type: DayType,
}

impl TariffLevel {
    pub fn new(level: u8, hour: u8, day_type: DayType) -> Result<Self, BillingError> {
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            return Err(BillingError::InvalidTariffLevel(format!(
                "level {level} outside {MIN_LEVEL}..={MAX_LEVEL}"
            )));
        }
        if hour > MAX_HOUR {
            return Err(BillingError::InvalidTariffLevel(format!(
                "hour {hour} outside 0..={MAX_HOUR}"
            )));
        }

        Ok(Self {
            level,
            hour,
            day_type,
        })
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn day_type(&self) -> DayType {
        self.day_type
    }
}

/// A named range of calendar months with its tariff level assignments.
///
/// `start_month > end_month` describes a season that wraps past December,
/// e.g. November through February.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Season {
    pub id: i32,
    pub season_key: String,
    pub season_name: String,
    start_month: u8,
    end_month: u8,
    levels: Vec<TariffLevel>,
}

impl Season {
    pub fn new(
        id: i32,
        season_key: impl Into<String>,
        season_name: impl Into<String>,
        start_month: u8,
        end_month: u8,
    ) -> Result<Self, BillingError> {
        for month in [start_month, end_month] {
            if !(1..=12).contains(&month) {
                return Err(BillingError::InvalidSeason(format!(
                    "month {month} outside 1..=12"
                )));
            }
        }

        Ok(Self {
            id,
            season_key: season_key.into(),
            season_name: season_name.into(),
            start_month,
            end_month,
            levels: Vec::new(),
        })
    }

    /// Adds one hour to `level` for the given day class.
    pub fn with_level(mut self, level: u8, hour: u8, day_type: DayType) -> Result<Self, BillingError> {
        self.levels.push(TariffLevel::new(level, hour, day_type)?);
        Ok(self)
    }

    /// Adds every hour in `hours` to `level` for the given day class.
    pub fn with_hours(
        mut self,
        level: u8,
        hours: impl IntoIterator<Item = u8>,
        day_type: DayType,
    ) -> Result<Self, BillingError> {
        for hour in hours {
            self.levels.push(TariffLevel::new(level, hour, day_type)?);
        }
        Ok(self)
    }

    pub fn push_level(&mut self, level: TariffLevel) {
        self.levels.push(level);
    }

    pub fn start_month(&self) -> u8 {
        self.start_month
    }

    pub fn end_month(&self) -> u8 {
        self.end_month
    }

    pub fn levels(&self) -> &[TariffLevel] {
        &self.levels
    }

    pub fn crosses_calendar_year(&self) -> bool {
        self.start_month > self.end_month
    }

    pub fn is_active_in(&self, month: Month) -> bool {
        let month = month as u8;
        if self.crosses_calendar_year() {
            month >= self.start_month || month <= self.end_month
        } else {
            self.start_month <= month && month <= self.end_month
        }
    }
}
