use billing_client::db::measurement_queries::MAX_INSERT_BATCH;
use serde::{Deserialize, Deserializer};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::fs;
use time::{macros::format_description, UtcOffset};

use crate::invoice::InvoiceAssembler;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
    /// Offset used for month boundaries and hour/weekday classification,
    /// written as `+HH:MM` or `-HH:MM`.
    #[serde(default = "default_utc_offset", deserialize_with = "deserialize_utc_offset")]
    pub utc_offset: UtcOffset,
}

impl DatabaseConfig {
    pub async fn connect(&self) -> anyhow::Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.uri)
            .await?;
        Ok(pool)
    }
}

fn default_utc_offset() -> UtcOffset {
    UtcOffset::UTC
}

pub fn parse_utc_offset(s: &str) -> Result<UtcOffset, time::error::Parse> {
    UtcOffset::parse(s.trim(), format_description!("[offset_hour sign:mandatory]:[offset_minute]"))
}

fn deserialize_utc_offset<'de, D>(deserializer: D) -> Result<UtcOffset, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_utc_offset(&raw).map_err(|e| serde::de::Error::custom(format!("invalid utc_offset '{raw}': {e}")))
}

/// Invoice policy constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvoiceConfig {
    pub tax_rate: f64,
    pub days_payment_due: i64,
    pub invoice_code: String,
    pub item_name_prefix: String,
    pub item_unit: String,
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            tax_rate: 0.22,
            days_payment_due: 15,
            invoice_code: "OTHR".to_string(),
            item_name_prefix: "Time block".to_string(),
            item_unit: "kWh".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub invoice: InvoiceConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("BILLING_CONFIG").unwrap_or_else(|_| "billing-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        if !(0.0..=1.0).contains(&cfg.invoice.tax_rate) {
            anyhow::bail!("invoice.tax_rate must be within 0..=1, got {}", cfg.invoice.tax_rate);
        }
        if !(0..=InvoiceAssembler::MAX_DAYS_PAYMENT_DUE).contains(&cfg.invoice.days_payment_due) {
            anyhow::bail!(
                "invoice.days_payment_due must be within 0..={}, got {}",
                InvoiceAssembler::MAX_DAYS_PAYMENT_DUE,
                cfg.invoice.days_payment_due
            );
        }
        if !(1..=MAX_INSERT_BATCH).contains(&cfg.ingestion.batch_size) {
            anyhow::bail!(
                "ingestion.batch_size must be within 1..={MAX_INSERT_BATCH}, got {}",
                cfg.ingestion.batch_size
            );
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_policy_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [database]
            uri = "postgres://localhost/billing"
            max_connections = 4
            "#,
        )
        .unwrap();

        assert_eq!(cfg.database.utc_offset, UtcOffset::UTC);
        assert_eq!(cfg.invoice.tax_rate, 0.22);
        assert_eq!(cfg.invoice.days_payment_due, 15);
        assert_eq!(cfg.invoice.invoice_code, "OTHR");
        assert_eq!(cfg.ingestion.batch_size, 1000);
        assert!(cfg.metrics.is_none());
    }

    #[test]
    fn full_config_overrides_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [database]
            uri = "postgres://localhost/billing"
            max_connections = 2
            utc_offset = "+01:00"

            [invoice]
            tax_rate = 0.095
            days_payment_due = 30

            [ingestion]
            batch_size = 50

            [metrics]
            bind_addr = "127.0.0.1:9100"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.database.utc_offset, UtcOffset::from_hms(1, 0, 0).unwrap());
        assert_eq!(cfg.invoice.tax_rate, 0.095);
        assert_eq!(cfg.invoice.days_payment_due, 30);
        assert_eq!(cfg.invoice.item_unit, "kWh");
        assert_eq!(cfg.ingestion.batch_size, 50);
        assert_eq!(cfg.ingestion.max_retries, 3);
        assert_eq!(cfg.metrics.unwrap().bind_addr, "127.0.0.1:9100");
    }

    #[test]
    fn rejects_invalid_offset_and_tax_rate() {
        let bad_offset = r#"
            [database]
            uri = "postgres://localhost/billing"
            max_connections = 2
            utc_offset = "Europe/Ljubljana"
        "#;
        assert!(AppConfig::from_toml(bad_offset).is_err());

        let bad_tax = r#"
            [database]
            uri = "postgres://localhost/billing"
            max_connections = 2

            [invoice]
            tax_rate = 22.0
        "#;
        assert!(AppConfig::from_toml(bad_tax).is_err());
    }

    #[test]
    fn parses_negative_offsets() {
        assert_eq!(
            parse_utc_offset("-05:30").unwrap(),
            UtcOffset::from_hms(-5, -30, 0).unwrap()
        );
    }

    fn with_section(section: &str) -> String {
        format!(
            r#"
            [database]
            uri = "postgres://localhost/billing"
            max_connections = 2

            {section}
            "#
        )
    }

    #[test]
    fn batch_size_is_bounded_by_insert_parameters() {
        let max = AppConfig::from_toml(&with_section("[ingestion]\nbatch_size = 16383")).unwrap();
        assert_eq!(max.ingestion.batch_size, MAX_INSERT_BATCH);

        for size in [0, 16384, 20000] {
            let res = AppConfig::from_toml(&with_section(&format!("[ingestion]\nbatch_size = {size}")));
            assert!(res.is_err(), "batch_size {size} was accepted");
        }
    }

    #[test]
    fn days_payment_due_is_bounded() {
        let zero = AppConfig::from_toml(&with_section("[invoice]\ndays_payment_due = 0")).unwrap();
        assert_eq!(zero.invoice.days_payment_due, 0);

        for days in ["-1", "366", "9223372036854775807"] {
            let res = AppConfig::from_toml(&with_section(&format!("[invoice]\ndays_payment_due = {days}")));
            assert!(res.is_err(), "days_payment_due {days} was accepted");
        }
    }
}
