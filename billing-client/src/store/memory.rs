use std::collections::{BTreeMap, BTreeSet};

use time::{Date, OffsetDateTime, UtcOffset};
use tokio::sync::RwLock;

use super::MeasurementStore;
use crate::domain::{BillingPeriod, DayType, Measurement, UsageTotals};
use crate::error::BillingResult;

/// In-process measurement store for tests, dry runs and small datasets.
///
/// Rows are keyed by `(customer_id, measured_at)` like the database table.
pub struct InMemoryMeasurementStore {
    rows: RwLock<BTreeMap<(i32, OffsetDateTime), Measurement>>,
    offset: UtcOffset,
}

impl Default for InMemoryMeasurementStore {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl InMemoryMeasurementStore {
    pub fn new(offset: UtcOffset) -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            offset,
        }
    }

    /// Returns `false` when a row with the same key already exists.
    pub async fn insert(&self, measurement: Measurement) -> bool {
        let key = (measurement.customer_id, measurement.measured_at);
        let mut rows = self.rows.write().await;
        if rows.contains_key(&key) {
            return false;
        }
        rows.insert(key, measurement);
        true
    }

    /// Returns the number of rows written.
    pub async fn insert_many<I>(&self, measurements: I) -> u64
    where
        I: IntoIterator<Item = Measurement>,
    {
        let mut written = 0;
        for m in measurements {
            if self.insert(m).await {
                written += 1;
            }
        }
        written
    }

    pub async fn delete_for_period(&self, customer_id: i32, period: &BillingPeriod) -> u64 {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, m| !(m.customer_id == customer_id && self.within(m, period.start(), period.end_exclusive())));
        (before - rows.len()) as u64
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn within(&self, m: &Measurement, start: Date, end: Date) -> bool {
        let local = m.measured_at.to_offset(self.offset);
        let date = local.date();
        date >= start && date < end
    }

    async fn sum_where<F>(&self, customer_id: i32, start: Date, end: Date, filter: F) -> UsageTotals
    where
        F: Fn(OffsetDateTime) -> bool,
    {
        let rows = self.rows.read().await;
        rows.values()
            .filter(|m| m.customer_id == customer_id && self.within(m, start, end))
            .filter(|m| filter(m.measured_at.to_offset(self.offset)))
            .fold(UsageTotals::ZERO, |acc, m| acc + UsageTotals::new(m.price(), m.consumption_kwh))
    }
}

#[async_trait::async_trait]
impl MeasurementStore for InMemoryMeasurementStore {
    async fn total_usage(&self, customer_id: i32, period: &BillingPeriod) -> BillingResult<UsageTotals> {
        Ok(self
            .sum_where(customer_id, period.start(), period.end_exclusive(), |_| true)
            .await)
    }

    async fn block_usage(
        &self,
        customer_id: i32,
        start: Date,
        end: Date,
        hours: &BTreeSet<u8>,
        day_type: DayType,
    ) -> BillingResult<UsageTotals> {
        Ok(self
            .sum_where(customer_id, start, end, |local| {
                hours.contains(&local.hour()) && DayType::of(local.weekday()) == day_type
            })
            .await)
    }

    async fn count_measurements(&self, customer_id: i32, period: &BillingPeriod) -> BillingResult<u64> {
        let rows = self.rows.read().await;
        let count = rows
            .values()
            .filter(|m| m.customer_id == customer_id && self.within(m, period.start(), period.end_exclusive()))
            .count();
        Ok(count as u64)
    }
}
