use anyhow::{bail, Result};
use billing_client::{db::billing_queries, domain::Measurement, PgMeasurementStore};
use billing_service::{
    config::AppConfig,
    metrics_server, observability,
    pipeline::Pipeline,
    sinks::PgMeasurementSink,
    sources::MeasurementCsvFileSource,
    transform,
};
use std::{env, sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: ingest_measurements <path/to/name-<customer_id>.csv>");
    }
    let file_path = &args[1];

    let cfg = AppConfig::load()?;
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let source = MeasurementCsvFileSource::from_path(file_path, cfg.database.utc_offset)?;
    let customer_id = source.customer_id();

    let pool = cfg.database.connect().await?;

    // Schema is expected to be applied out-of-band via `sql/schema/*.sql`.
    if billing_queries::find_customer(&pool, customer_id).await?.is_none() {
        bail!("customer {customer_id} not found");
    }

    let ingestion = &cfg.ingestion;
    let sink = PgMeasurementSink::new(
        PgMeasurementStore::new(pool, cfg.database.utc_offset),
        ingestion.batch_size,
        ingestion.max_retries,
        Duration::from_millis(ingestion.retry_backoff_ms),
    );

    let pipeline: Pipeline<_, Measurement, _> = Pipeline {
        source,
        transforms: vec![Arc::new(transform::MeasurementValidation)],
        sink,
    };

    tracing::info!(customer_id, file = %file_path, "ingesting measurements");
    let report = pipeline.run().await?;

    println!(
        "{}",
        serde_json::json!({
            "customer_id": customer_id,
            "records_added": report.records_added,
            "duplicates": report.duplicates,
            "rejected": report.rejected,
        })
    );

    Ok(())
}
