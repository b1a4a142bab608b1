use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use time::Month;

use crate::domain::{DayType, Season, TariffLevel};

/// Clock hours per tariff level, split by day class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelHours {
    workday: BTreeMap<u8, BTreeSet<u8>>,
    offday: BTreeMap<u8, BTreeSet<u8>>,
}

impl LevelHours {
    pub fn insert(&mut self, level: &TariffLevel) {
        let target = match level.day_type() {
            DayType::Workday => &mut self.workday,
            DayType::Offday => &mut self.offday,
        };
        target.entry(level.level()).or_default().insert(level.hour());
    }

    pub fn hours(&self, level: u8, day_type: DayType) -> Option<&BTreeSet<u8>> {
        match day_type {
            DayType::Workday => self.workday.get(&level),
            DayType::Offday => self.offday.get(&level),
        }
    }

    pub fn workday_hours(&self) -> &BTreeMap<u8, BTreeSet<u8>> {
        &self.workday
    }

    pub fn offday_hours(&self) -> &BTreeMap<u8, BTreeSet<u8>> {
        &self.offday
    }

    /// Levels configured for either day class, ascending.
    pub fn possible_levels(&self) -> Vec<u8> {
        self.workday
            .keys()
            .chain(self.offday.keys())
            .copied()
            .collect::<BTreeSet<u8>>()
            .into_iter()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.workday.is_empty() && self.offday.is_empty()
    }
}

impl<'a> FromIterator<&'a TariffLevel> for LevelHours {
    fn from_iter<I: IntoIterator<Item = &'a TariffLevel>>(iter: I) -> Self {
        let mut hours = LevelHours::default();
        for level in iter {
            hours.insert(level);
        }
        hours
    }
}

/// Source of tariff level assignments for a calendar month.
pub trait CalendarProvider: Send + Sync {
    fn level_hours(&self, month: Month) -> LevelHours;
}

impl<T: CalendarProvider + ?Sized> CalendarProvider for Arc<T> {
    fn level_hours(&self, month: Month) -> LevelHours {
        (**self).level_hours(month)
    }
}

/// Immutable set of seasons, loaded once and shared between billing runs.
#[derive(Debug, Clone, Default)]
pub struct SeasonalCalendar {
    seasons: Vec<Season>,
}

impl SeasonalCalendar {
    pub fn new(seasons: Vec<Season>) -> Self {
        Self { seasons }
    }

    pub fn seasons(&self) -> &[Season] {
        &self.seasons
    }

    pub fn active_seasons(&self, month: Month) -> impl Iterator<Item = &Season> + '_ {
        self.seasons.iter().filter(move |s| s.is_active_in(month))
    }
}

impl CalendarProvider for SeasonalCalendar {
    // Overlapping seasons contribute the union of their hours.
    fn level_hours(&self, month: Month) -> LevelHours {
        self.active_seasons(month)
            .flat_map(|s| s.levels().iter())
            .collect()
    }
}
