//! Read access to hourly measurements.
//!
//! [`MeasurementStore`] is the only dependency of the aggregation engine on
//! measurement data. Every aggregate returns [`UsageTotals::ZERO`] when no
//! rows match; an `Err` always means the backend itself failed.

mod memory;
mod postgres;

use std::{collections::BTreeSet, sync::Arc};

use time::Date;

use crate::domain::{BillingPeriod, DayType, UsageTotals};
use crate::error::BillingResult;

pub use memory::InMemoryMeasurementStore;
pub use postgres::PgMeasurementStore;

#[async_trait::async_trait]
pub trait MeasurementStore: Send + Sync {
    /// Totals over every measurement of the customer within `period`.
    async fn total_usage(&self, customer_id: i32, period: &BillingPeriod) -> BillingResult<UsageTotals>;

    /// Totals over measurements in `[start, end)` whose local hour is in
    /// `hours` and whose weekday belongs to `day_type`.
    async fn block_usage(
        &self,
        customer_id: i32,
        start: Date,
        end: Date,
        hours: &BTreeSet<u8>,
        day_type: DayType,
    ) -> BillingResult<UsageTotals>;

    async fn count_measurements(&self, customer_id: i32, period: &BillingPeriod) -> BillingResult<u64>;
}

#[async_trait::async_trait]
impl<T: MeasurementStore + ?Sized> MeasurementStore for Arc<T> {
    async fn total_usage(&self, customer_id: i32, period: &BillingPeriod) -> BillingResult<UsageTotals> {
        (**self).total_usage(customer_id, period).await
    }

    async fn block_usage(
        &self,
        customer_id: i32,
        start: Date,
        end: Date,
        hours: &BTreeSet<u8>,
        day_type: DayType,
    ) -> BillingResult<UsageTotals> {
        (**self).block_usage(customer_id, start, end, hours, day_type).await
    }

    async fn count_measurements(&self, customer_id: i32, period: &BillingPeriod) -> BillingResult<u64> {
        (**self).count_measurements(customer_id, period).await
    }
}
