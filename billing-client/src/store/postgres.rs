use std::collections::BTreeSet;

use sqlx::PgPool;
use time::{Date, UtcOffset};

use super::MeasurementStore;
use crate::db::measurement_queries;
use crate::domain::{BillingPeriod, DayType, Measurement, UsageTotals};
use crate::error::BillingResult;

/// Postgres-backed store over `measurements_electricity_usage`.
///
/// Month boundaries and hour/weekday classification are evaluated at a fixed
/// UTC offset.
#[derive(Debug, Clone)]
pub struct PgMeasurementStore {
    pool: PgPool,
    offset: UtcOffset,
}

impl PgMeasurementStore {
    pub fn new(pool: PgPool, offset: UtcOffset) -> Self {
        Self { pool, offset }
    }

    /// Returns the number of rows written; existing keys are skipped.
    pub async fn insert(&self, batch: &[Measurement]) -> Result<u64, sqlx::Error> {
        measurement_queries::insert_measurements(&self.pool, batch).await
    }

    pub async fn delete_for_period(&self, customer_id: i32, period: &BillingPeriod) -> BillingResult<u64> {
        let (start, end) = self.bounds(period.start(), period.end_exclusive());
        let removed = measurement_queries::delete_measurements(&self.pool, customer_id, start, end).await?;
        tracing::info!(
            customer_id,
            year = period.year(),
            month = period.month_number(),
            removed,
            "measurements removed"
        );
        Ok(removed)
    }

    fn bounds(&self, start: Date, end: Date) -> (time::OffsetDateTime, time::OffsetDateTime) {
        (
            BillingPeriod::instant_at(start, self.offset),
            BillingPeriod::instant_at(end, self.offset),
        )
    }
}

#[async_trait::async_trait]
impl MeasurementStore for PgMeasurementStore {
    async fn total_usage(&self, customer_id: i32, period: &BillingPeriod) -> BillingResult<UsageTotals> {
        let (start, end) = self.bounds(period.start(), period.end_exclusive());
        measurement_queries::total_usage(&self.pool, customer_id, start, end).await
    }

    async fn block_usage(
        &self,
        customer_id: i32,
        start: Date,
        end: Date,
        hours: &BTreeSet<u8>,
        day_type: DayType,
    ) -> BillingResult<UsageTotals> {
        if hours.is_empty() {
            return Ok(UsageTotals::ZERO);
        }
        let (start, end) = self.bounds(start, end);
        measurement_queries::block_usage(&self.pool, customer_id, start, end, self.offset, hours, day_type).await
    }

    async fn count_measurements(&self, customer_id: i32, period: &BillingPeriod) -> BillingResult<u64> {
        let (start, end) = self.bounds(period.start(), period.end_exclusive());
        measurement_queries::count_measurements(&self.pool, customer_id, start, end).await
    }
}
