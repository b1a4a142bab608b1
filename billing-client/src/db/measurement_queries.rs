use std::collections::BTreeSet;

use sqlx::{PgPool, Postgres, QueryBuilder};
use time::{OffsetDateTime, UtcOffset};

use crate::domain::{DayType, Measurement, UsageTotals};
use crate::error::BillingResult;

// Local wall-clock time of a measurement: the UTC timestamp shifted by the
// configured offset (seconds east of UTC, bound as $4).
const LOCAL_TS: &str = "((mu.measured_at AT TIME ZONE 'UTC') + ($4::int * INTERVAL '1 second'))";

const INSERT_COLUMNS: usize = 4;

/// Most rows one INSERT can carry under Postgres' 65535 bind parameter limit.
pub const MAX_INSERT_BATCH: usize = u16::MAX as usize / INSERT_COLUMNS;

/// Sum of price and consumption for a customer in `[start, end)`.
pub async fn total_usage(
    pool: &PgPool,
    customer_id: i32,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> BillingResult<UsageTotals> {
    let totals = sqlx::query_as::<_, UsageTotals>(
        r#"
        SELECT
            COALESCE(SUM(mu.consumption_kwh * mu.price_per_kwh), 0)::float8 AS price,
            COALESCE(SUM(mu.consumption_kwh), 0)::float8                    AS consumption
        FROM measurements_electricity_usage mu
        WHERE mu.customer_id = $1
          AND mu.measured_at >= $2
          AND mu.measured_at <  $3
        "#,
    )
    .bind(customer_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    Ok(totals)
}

fn block_usage_sql(day_type: DayType) -> String {
    // EXTRACT(DOW) numbers Sunday as 0 and Saturday as 6.
    let day_filter = match day_type {
        DayType::Offday => "IN (0, 6)",
        DayType::Workday => "BETWEEN 1 AND 5",
    };

    let local_ts = LOCAL_TS;
    format!(
        r#"
        SELECT
            COALESCE(SUM(mu.consumption_kwh * mu.price_per_kwh), 0)::float8 AS price,
            COALESCE(SUM(mu.consumption_kwh), 0)::float8                    AS consumption
        FROM measurements_electricity_usage mu
        WHERE mu.customer_id = $1
          AND mu.measured_at >= $2
          AND mu.measured_at <  $3
          AND EXTRACT(HOUR FROM {local_ts})::int = ANY($5)
          AND EXTRACT(DOW FROM {local_ts}) {day_filter}
        "#
    )
}

/// Seconds east of UTC, as bound to `$4`.
fn offset_seconds(offset: UtcOffset) -> i32 {
    offset.whole_seconds()
}

/// Same aggregation as [`total_usage`], restricted to the given local hours
/// of the day and to weekdays of one day class.
pub async fn block_usage(
    pool: &PgPool,
    customer_id: i32,
    start: OffsetDateTime,
    end: OffsetDateTime,
    offset: UtcOffset,
    hours: &BTreeSet<u8>,
    day_type: DayType,
) -> BillingResult<UsageTotals> {
    let sql = block_usage_sql(day_type);
    let hours: Vec<i32> = hours.iter().map(|h| i32::from(*h)).collect();

    let totals = sqlx::query_as::<_, UsageTotals>(&sql)
        .bind(customer_id)
        .bind(start)
        .bind(end)
        .bind(offset_seconds(offset))
        .bind(hours)
        .fetch_one(pool)
        .await?;

    Ok(totals)
}

pub async fn count_measurements(
    pool: &PgPool,
    customer_id: i32,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> BillingResult<u64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM measurements_electricity_usage mu
        WHERE mu.customer_id = $1
          AND mu.measured_at >= $2
          AND mu.measured_at <  $3
        "#,
    )
    .bind(customer_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    Ok(count.max(0) as u64)
}

pub async fn delete_measurements(
    pool: &PgPool,
    customer_id: i32,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> BillingResult<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM measurements_electricity_usage
        WHERE customer_id = $1
          AND measured_at >= $2
          AND measured_at <  $3
        "#,
    )
    .bind(customer_id)
    .bind(start)
    .bind(end)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Insert a batch of measurements, skipping rows whose primary key exists.
///
/// Batches larger than [`MAX_INSERT_BATCH`] are split into several
/// statements. Returns the number of rows actually written.
pub async fn insert_measurements(pool: &PgPool, batch: &[Measurement]) -> Result<u64, sqlx::Error> {
    let mut written = 0;
    for chunk in batch.chunks(MAX_INSERT_BATCH) {
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO measurements_electricity_usage (customer_id, measured_at, consumption_kwh, price_per_kwh) ",
        );

        builder.push_values(chunk, |mut b, m| {
            b.push_bind(m.customer_id)
                .push_bind(m.measured_at)
                .push_bind(m.consumption_kwh)
                .push_bind(m.price_per_kwh);
        });
        builder.push(" ON CONFLICT (customer_id, measured_at) DO NOTHING");

        written += builder.build().execute(pool).await?.rows_affected();
    }
    Ok(written)
}
