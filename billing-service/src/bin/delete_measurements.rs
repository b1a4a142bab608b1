use anyhow::{bail, Context, Result};
use billing_client::{domain::BillingPeriod, PgMeasurementStore};
use billing_service::{config::AppConfig, observability};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        bail!("usage: delete_measurements <customer_id> <year> <month>");
    }
    let customer_id: i32 = args[1].parse().context("invalid customer_id")?;
    let period = BillingPeriod::new(
        args[2].parse().context("invalid year")?,
        args[3].parse().context("invalid month")?,
    )?;

    let cfg = AppConfig::load()?;
    let store = PgMeasurementStore::new(cfg.database.connect().await?, cfg.database.utc_offset);

    let records_removed = store.delete_for_period(customer_id, &period).await?;
    println!(
        "{}",
        serde_json::json!({
            "customer_id": customer_id,
            "year": period.year(),
            "month": period.month_number(),
            "records_removed": records_removed,
        })
    );

    Ok(())
}
