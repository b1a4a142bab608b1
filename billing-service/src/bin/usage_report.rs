use anyhow::{bail, Context, Result};
use billing_client::{db::season_queries, domain::BillingPeriod, PgMeasurementStore, TariffAggregationEngine};
use billing_service::{config::AppConfig, observability, projection::monthly_usage_value};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        bail!("usage: usage_report <customer_id> <year> <month>");
    }
    let customer_id: i32 = args[1].parse().context("invalid customer_id")?;
    let year: i32 = args[2].parse().context("invalid year")?;
    let month: u8 = args[3].parse().context("invalid month")?;
    let period = BillingPeriod::new(year, month)?;

    let cfg = AppConfig::load()?;
    let pool = cfg.database.connect().await?;

    let calendar = season_queries::load_calendar(&pool).await?;
    let engine = TariffAggregationEngine::new(PgMeasurementStore::new(pool, cfg.database.utc_offset), calendar);

    let usage = engine.aggregate(customer_id, period).await?;
    println!("{}", serde_json::to_string_pretty(&monthly_usage_value(&usage))?);

    Ok(())
}
