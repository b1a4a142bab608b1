use anyhow::{bail, Context, Result};
use billing_service::{
    config::AppConfig,
    invoice::{invoice_document, PgBillingRepository},
    observability,
};
use std::env;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: invoice_document <invoice_id>");
    }
    let invoice_id: i32 = args[1].parse().context("invalid invoice_id")?;

    let cfg = AppConfig::load()?;
    let pool = cfg.database.connect().await?;
    let repository = PgBillingRepository::new(pool);

    let document = invoice_document(&repository, invoice_id).await?;
    println!("{}", serde_json::to_string_pretty(&document)?);

    Ok(())
}
