use anyhow::{bail, Context, Result};
use billing_client::{db::season_queries, PgMeasurementStore, TariffAggregationEngine};
use billing_service::{
    config::AppConfig,
    invoice::{CreateInvoice, InvoiceAssembler, InvoiceService, PgBillingRepository},
    observability,
    projection::Projection,
};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 8 {
        bail!(
            "usage: create_invoice <customer_id> <year> <month> <invoice_number> \
             <payment_reason> <receiver_reference> <location_issued> [invoice_code] [days_payment_due]"
        );
    }

    let request = CreateInvoice {
        customer_id: args[1].parse().context("invalid customer_id")?,
        year: args[2].parse().context("invalid year")?,
        month: args[3].parse().context("invalid month")?,
        invoice_number: args[4].clone(),
        payment_reason: args[5].clone(),
        receiver_reference: args[6].clone(),
        location_issued: args[7].clone(),
        invoice_code: args.get(8).cloned(),
        days_payment_due: args
            .get(9)
            .map(|d| d.parse())
            .transpose()
            .context("invalid days_payment_due")?,
    };

    let cfg = AppConfig::load()?;
    let pool = cfg.database.connect().await?;
    let offset = cfg.database.utc_offset;

    let calendar = season_queries::load_calendar(&pool).await?;
    let engine = TariffAggregationEngine::new(PgMeasurementStore::new(pool.clone(), offset), calendar);
    let service = InvoiceService::new(
        PgBillingRepository::new(pool),
        engine,
        InvoiceAssembler::new(cfg.invoice.clone()),
    )
    .with_utc_offset(offset);

    let invoice = service.create_invoice(&request).await?;

    println!("{}", serde_json::to_string_pretty(&invoice.project(&[]))?);

    Ok(())
}
