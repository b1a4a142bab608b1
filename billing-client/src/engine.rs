//! Tariff aggregation: monthly totals plus a per-level breakdown.

use std::collections::BTreeMap;

use futures::future::try_join_all;

use crate::calendar::{CalendarProvider, LevelHours};
use crate::domain::{BillingPeriod, DayType, MonthlyUsage, TimeBlockUsage, UsageTotals};
use crate::error::{BillingError, BillingResult};
use crate::store::MeasurementStore;

/// Splits a customer's monthly consumption into seasonal tariff blocks.
///
/// The engine is read-only. It issues one total query and at most two block
/// queries per configured level (one per day class). The block queries run
/// concurrently. Dropping the returned future cancels all of them.
pub struct TariffAggregationEngine<S, C> {
    store: S,
    calendar: C,
}

impl<S, C> TariffAggregationEngine<S, C>
where
    S: MeasurementStore,
    C: CalendarProvider,
{
    pub fn new(store: S, calendar: C) -> Self {
        Self { store, calendar }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Aggregate `(customer_id, period)`.
    ///
    /// Does not check that the period has measurements; without any the
    /// result is all zeros with no blocks.
    pub async fn aggregate(&self, customer_id: i32, period: BillingPeriod) -> BillingResult<MonthlyUsage> {
        let levels = self.calendar.level_hours(period.month());

        let (totals, blocks) = futures::try_join!(
            self.store.total_usage(customer_id, &period),
            self.time_block_usage(customer_id, &period, &levels),
        )?;

        tracing::debug!(
            customer_id,
            year = period.year(),
            month = period.month_number(),
            levels = levels.possible_levels().len(),
            blocks = blocks.len(),
            total_consumption = totals.consumption,
            "tariff aggregation finished"
        );

        Ok(MonthlyUsage {
            customer_id,
            period,
            totals,
            blocks,
        })
    }

    /// Per-level usage for `period`, ascending by level.
    ///
    /// A level is reported iff its summed consumption is positive, including
    /// when its price sums to zero.
    pub async fn time_block_usage(
        &self,
        customer_id: i32,
        period: &BillingPeriod,
        levels: &LevelHours,
    ) -> BillingResult<Vec<TimeBlockUsage>> {
        let start = period.start();
        let end = period.end_exclusive();

        let lookups: Vec<_> = levels
            .possible_levels()
            .into_iter()
            .flat_map(move |level| {
                DayType::ALL
                    .into_iter()
                    .filter_map(move |day_type| levels.hours(level, day_type).map(|hours| (level, day_type, hours)))
            })
            .collect();

        let results = try_join_all(lookups.into_iter().map(move |(level, day_type, hours)| async move {
            let usage = self
                .store
                .block_usage(customer_id, start, end, hours, day_type)
                .await?;
            Ok::<_, BillingError>((level, usage))
        }))
        .await?;

        let mut per_level: BTreeMap<u8, UsageTotals> = BTreeMap::new();
        for (level, usage) in results {
            *per_level.entry(level).or_default() += usage;
        }

        Ok(per_level
            .into_iter()
            .filter(|(_, sum)| sum.consumption > 0.0)
            .map(|(level, sum)| TimeBlockUsage {
                time_block: level,
                consumption: sum.consumption,
                price: sum.price,
                start_date: start,
                end_date: period.last_day(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::BTreeSet,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use time::{macros::datetime, Date, Duration, OffsetDateTime};

    use super::*;
    use crate::calendar::SeasonalCalendar;
    use crate::domain::{Measurement, Season};
    use crate::store::InMemoryMeasurementStore;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn reading(customer_id: i32, measured_at: OffsetDateTime, kwh: f64, price: f64) -> Measurement {
        Measurement {
            customer_id,
            measured_at,
            consumption_kwh: kwh,
            price_per_kwh: price,
        }
    }

    /// Season covering January to June: level 1 on workday nights, level 2
    /// for the rest of the working day.
    fn first_half_calendar() -> SeasonalCalendar {
        let season = Season::new(1, "s1", "First half", 1, 6)
            .and_then(|s| s.with_hours(1, 0..=7, DayType::Workday))
            .and_then(|s| s.with_hours(2, 8..=23, DayType::Workday))
            .unwrap();
        SeasonalCalendar::new(vec![season])
    }

    /// Five rows at 03:00 (2 kWh at 0.1) and five at 10:00 (1 kWh at 0.2),
    /// one pair per day starting at `first_day`, stepping `step_days`.
    async fn scenario_rows(store: &InMemoryMeasurementStore, first_day: OffsetDateTime, step_days: i64) {
        for i in 0..5 {
            let day = first_day + Duration::days(i * step_days);
            store.insert(reading(1, day + Duration::hours(3), 2.0, 0.1)).await;
            store.insert(reading(1, day + Duration::hours(10), 1.0, 0.2)).await;
        }
    }

    #[tokio::test]
    async fn scenario_a_splits_weekday_usage_by_level() {
        let store = InMemoryMeasurementStore::default();
        // Monday 2024-03-04 through Friday 2024-03-08.
        scenario_rows(&store, datetime!(2024-03-04 00:00:00 UTC), 1).await;
        let engine = TariffAggregationEngine::new(store, first_half_calendar());

        let usage = engine
            .aggregate(1, BillingPeriod::new(2024, 3).unwrap())
            .await
            .unwrap();

        assert_eq!(usage.blocks.len(), 2);
        assert_eq!(usage.blocks[0].time_block, 1);
        assert!(approx(usage.blocks[0].consumption, 10.0));
        assert!(approx(usage.blocks[0].price, 1.0));
        assert_eq!(usage.blocks[1].time_block, 2);
        assert!(approx(usage.blocks[1].consumption, 5.0));
        assert!(approx(usage.blocks[1].price, 1.0));
        assert!(approx(usage.total_consumption(), 15.0));
        assert!(approx(usage.total_price(), 2.0));

        let first = &usage.blocks[0];
        assert_eq!(first.start_date, Date::from_calendar_date(2024, time::Month::March, 1).unwrap());
        assert_eq!(first.end_date, Date::from_calendar_date(2024, time::Month::March, 31).unwrap());
    }

    #[tokio::test]
    async fn scenario_b_weekend_rows_only_reach_grand_total() {
        let store = InMemoryMeasurementStore::default();
        // Every Saturday of March 2024.
        scenario_rows(&store, datetime!(2024-03-02 00:00:00 UTC), 7).await;
        let engine = TariffAggregationEngine::new(store, first_half_calendar());

        let usage = engine
            .aggregate(1, BillingPeriod::new(2024, 3).unwrap())
            .await
            .unwrap();

        assert!(usage.blocks.is_empty());
        assert!(approx(usage.total_consumption(), 15.0));
        assert!(approx(usage.total_price(), 2.0));
    }

    #[tokio::test]
    async fn scenario_c_level_without_matching_hours_is_absent() {
        let store = InMemoryMeasurementStore::default();
        store
            .insert(reading(1, datetime!(2024-03-05 03:00:00 UTC), 2.0, 0.1))
            .await;
        let engine = TariffAggregationEngine::new(store, first_half_calendar());

        let usage = engine
            .aggregate(1, BillingPeriod::new(2024, 3).unwrap())
            .await
            .unwrap();

        let levels: Vec<u8> = usage.blocks.iter().map(|b| b.time_block).collect();
        assert_eq!(levels, vec![1]);
    }

    #[tokio::test]
    async fn scenario_d_overlapping_seasons_merge_level_hours() {
        let early = Season::new(1, "early", "Early", 1, 6)
            .and_then(|s| s.with_hours(1, [3], DayType::Workday))
            .unwrap();
        let spring = Season::new(2, "spring", "Spring", 3, 5)
            .and_then(|s| s.with_hours(1, [10], DayType::Workday))
            .unwrap();
        let calendar = SeasonalCalendar::new(vec![early, spring]);
        assert_eq!(
            calendar.level_hours(time::Month::March).hours(1, DayType::Workday),
            Some(&BTreeSet::from([3, 10]))
        );

        let store = InMemoryMeasurementStore::default();
        scenario_rows(&store, datetime!(2024-03-04 00:00:00 UTC), 1).await;
        let engine = TariffAggregationEngine::new(store, calendar);

        let usage = engine
            .aggregate(1, BillingPeriod::new(2024, 3).unwrap())
            .await
            .unwrap();
        assert_eq!(usage.blocks.len(), 1);
        assert!(approx(usage.blocks[0].consumption, 15.0));
        assert!(approx(usage.blocks[0].price, 2.0));
    }

    #[tokio::test]
    async fn month_without_seasons_yields_no_blocks() {
        let store = InMemoryMeasurementStore::default();
        let engine = TariffAggregationEngine::new(store, first_half_calendar());

        let usage = engine
            .aggregate(1, BillingPeriod::new(2024, 9).unwrap())
            .await
            .unwrap();

        assert!(usage.blocks.is_empty());
        assert_eq!(usage.totals, UsageTotals::ZERO);
    }

    #[tokio::test]
    async fn zero_priced_consumption_is_reported() {
        let store = InMemoryMeasurementStore::default();
        store
            .insert(reading(1, datetime!(2024-03-05 03:00:00 UTC), 4.0, 0.0))
            .await;
        let engine = TariffAggregationEngine::new(store, first_half_calendar());

        let usage = engine
            .aggregate(1, BillingPeriod::new(2024, 3).unwrap())
            .await
            .unwrap();

        assert_eq!(usage.blocks.len(), 1);
        assert_eq!(usage.blocks[0].price, 0.0);
        assert_eq!(usage.blocks[0].consumption, 4.0);
    }

    #[tokio::test]
    async fn level_combines_both_day_classes_and_output_is_ascending() {
        let season = Season::new(1, "all", "All year", 1, 12)
            .and_then(|s| s.with_hours(3, 12..=23, DayType::Offday))
            .and_then(|s| s.with_hours(1, 0..=11, DayType::Workday))
            .and_then(|s| s.with_hours(2, 12..=23, DayType::Workday))
            .and_then(|s| s.with_hours(1, 0..=11, DayType::Offday))
            .unwrap();
        let store = InMemoryMeasurementStore::default();
        store
            .insert_many([
                // Tuesday morning and Saturday morning both land in level 1.
                reading(1, datetime!(2024-03-05 05:00:00 UTC), 1.0, 1.0),
                reading(1, datetime!(2024-03-09 05:00:00 UTC), 2.0, 1.0),
                // Tuesday afternoon: level 2.
                reading(1, datetime!(2024-03-05 15:00:00 UTC), 3.0, 1.0),
                // Sunday evening: level 3.
                reading(1, datetime!(2024-03-10 20:00:00 UTC), 4.0, 1.0),
            ])
            .await;
        let engine = TariffAggregationEngine::new(store, SeasonalCalendar::new(vec![season]));

        let usage = engine
            .aggregate(1, BillingPeriod::new(2024, 3).unwrap())
            .await
            .unwrap();

        let summary: Vec<(u8, f64)> = usage.blocks.iter().map(|b| (b.time_block, b.consumption)).collect();
        assert_eq!(summary, vec![(1, 3.0), (2, 3.0), (3, 4.0)]);
        assert!(usage
            .blocks
            .windows(2)
            .all(|w| w[0].time_block < w[1].time_block));
        assert!(usage.block_consumption() <= usage.total_consumption() + 1e-9);
    }

    #[tokio::test]
    async fn partial_coverage_keeps_block_sum_below_total() {
        let store = InMemoryMeasurementStore::default();
        scenario_rows(&store, datetime!(2024-03-02 00:00:00 UTC), 1).await;
        let engine = TariffAggregationEngine::new(store, first_half_calendar());

        let usage = engine
            .aggregate(1, BillingPeriod::new(2024, 3).unwrap())
            .await
            .unwrap();

        assert!(usage.block_consumption() < usage.total_consumption());
    }

    /// Store that counts block queries and can be told to fail them.
    struct CountingStore {
        inner: InMemoryMeasurementStore,
        block_calls: AtomicUsize,
        fail_blocks: bool,
    }

    #[async_trait::async_trait]
    impl MeasurementStore for CountingStore {
        async fn total_usage(&self, customer_id: i32, period: &BillingPeriod) -> BillingResult<UsageTotals> {
            self.inner.total_usage(customer_id, period).await
        }

        async fn block_usage(
            &self,
            customer_id: i32,
            start: Date,
            end: Date,
            hours: &BTreeSet<u8>,
            day_type: DayType,
        ) -> BillingResult<UsageTotals> {
            self.block_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_blocks {
                return Err(BillingError::StoreUnavailable(sqlx::Error::PoolClosed));
            }
            self.inner.block_usage(customer_id, start, end, hours, day_type).await
        }

        async fn count_measurements(&self, customer_id: i32, period: &BillingPeriod) -> BillingResult<u64> {
            self.inner.count_measurements(customer_id, period).await
        }
    }

    #[tokio::test]
    async fn issues_one_block_query_per_level_and_day_class() {
        let season = Season::new(1, "all", "All year", 1, 12)
            .and_then(|s| s.with_hours(1, [1], DayType::Workday))
            .and_then(|s| s.with_hours(1, [1], DayType::Offday))
            .and_then(|s| s.with_hours(2, [2], DayType::Workday))
            .unwrap();
        let store = Arc::new(CountingStore {
            inner: InMemoryMeasurementStore::default(),
            block_calls: AtomicUsize::new(0),
            fail_blocks: false,
        });
        let engine = TariffAggregationEngine::new(store.clone(), Arc::new(SeasonalCalendar::new(vec![season])));

        engine
            .aggregate(1, BillingPeriod::new(2024, 3).unwrap())
            .await
            .unwrap();
        assert_eq!(store.block_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn store_failure_is_propagated_unchanged() {
        let store = CountingStore {
            inner: InMemoryMeasurementStore::default(),
            block_calls: AtomicUsize::new(0),
            fail_blocks: true,
        };
        let engine = TariffAggregationEngine::new(store, first_half_calendar());

        let err = engine
            .aggregate(1, BillingPeriod::new(2024, 3).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::StoreUnavailable(sqlx::Error::PoolClosed)));
    }
}
