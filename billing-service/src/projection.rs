//! Field allow-list projection of stored records into JSON maps.
//!
//! Invoice documents are rendered from plain maps; the bookkeeping columns
//! `id`, `created_at` and `updated_at` are left out by default, and callers
//! can drop further columns per entity.

use billing_client::domain::{Customer, CustomerContract, Invoice, InvoiceItem, MonthlyUsage, Provider};
use serde_json::{json, Map, Value};
use time::{macros::format_description, Date, PrimitiveDateTime};

pub const DEFAULT_EXCLUDED: [&str; 3] = ["id", "created_at", "updated_at"];

pub fn date_value(date: Date) -> Value {
    Value::String(date.to_string())
}

pub fn datetime_value(dt: PrimitiveDateTime) -> Value {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    Value::String(dt.format(format).unwrap_or_else(|_| dt.to_string()))
}

/// A record that can be flattened into named column values.
pub trait Projection {
    /// Every column in table order.
    fn fields(&self) -> Vec<(&'static str, Value)>;

    fn project(&self, exclude: &[&str]) -> Map<String, Value> {
        self.fields()
            .into_iter()
            .filter(|(name, _)| !exclude.contains(name))
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    /// Drops `id`, `created_at`, `updated_at` and any `extra` columns.
    fn project_default(&self, extra: &[&str]) -> Map<String, Value> {
        let mut exclude: Vec<&str> = DEFAULT_EXCLUDED.to_vec();
        exclude.extend_from_slice(extra);
        self.project(&exclude)
    }
}

impl Projection for Customer {
    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", json!(self.id)),
            ("fullname", json!(self.fullname)),
            ("email", json!(self.email)),
            ("tax_code", json!(self.tax_code)),
            ("street_address", json!(self.street_address)),
            ("zip_code", json!(self.zip_code)),
            ("zip_name", json!(self.zip_name)),
            ("created_at", datetime_value(self.created_at)),
            ("updated_at", datetime_value(self.updated_at)),
        ]
    }
}

impl Projection for Provider {
    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", json!(self.id)),
            ("full_title", json!(self.full_title)),
            ("email", json!(self.email)),
            ("webpage", json!(self.webpage)),
            ("tax_code", json!(self.tax_code)),
            ("iban_number", json!(self.iban_number)),
            ("street_address", json!(self.street_address)),
            ("zip_code", json!(self.zip_code)),
            ("zip_name", json!(self.zip_name)),
            ("created_at", datetime_value(self.created_at)),
            ("updated_at", datetime_value(self.updated_at)),
        ]
    }
}

impl Projection for CustomerContract {
    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", json!(self.id)),
            ("provider_id", json!(self.provider_id)),
            ("customer_id", json!(self.customer_id)),
            ("customer_type", json!(self.customer_type.as_str())),
            ("contract_number", json!(self.contract_number)),
            ("energy_meter_number", json!(self.energy_meter_number)),
            ("package_name", json!(self.package_name)),
            (
                "termination_date",
                self.termination_date.map(datetime_value).unwrap_or(Value::Null),
            ),
            ("created_at", datetime_value(self.created_at)),
            ("updated_at", datetime_value(self.updated_at)),
        ]
    }
}

impl Projection for Invoice {
    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", json!(self.id)),
            ("contract_id", json!(self.contract_id)),
            ("invoice_number", json!(self.invoice_number)),
            ("issued_date", date_value(self.issued_date)),
            ("service_date", date_value(self.service_date)),
            ("location_issued", json!(self.location_issued)),
            ("due_date", date_value(self.due_date)),
            ("invoice_code", json!(self.invoice_code)),
            ("payment_reason", json!(self.payment_reason)),
            ("receiver_iban", json!(self.receiver_iban)),
            ("receiver_reference", json!(self.receiver_reference)),
            ("base_amount", json!(self.base_amount)),
            ("tax_amount", json!(self.tax_amount)),
            ("total_amount", json!(self.total_amount)),
            ("created_at", datetime_value(self.created_at)),
            ("updated_at", datetime_value(self.updated_at)),
        ]
    }
}

impl Projection for InvoiceItem {
    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", json!(self.id)),
            ("electricity_invoice_id", json!(self.invoice_id)),
            ("name", json!(self.name)),
            ("unit", json!(self.unit)),
            ("quantity", json!(self.quantity)),
            ("amount", json!(self.amount)),
            ("date_from", date_value(self.date_from)),
            ("date_to", date_value(self.date_to)),
            ("created_at", datetime_value(self.created_at)),
            ("updated_at", datetime_value(self.updated_at)),
        ]
    }
}

/// Engine output as printed by the usage report.
pub fn monthly_usage_value(usage: &MonthlyUsage) -> Value {
    let blocks: Vec<Value> = usage
        .blocks
        .iter()
        .map(|b| {
            json!({
                "time_block": b.time_block,
                "consumption": b.consumption,
                "price": b.price,
                "start_date": date_value(b.start_date),
                "end_date": date_value(b.end_date),
            })
        })
        .collect();

    json!({
        "customer_id": usage.customer_id,
        "year": usage.period.year(),
        "month": usage.period.month_number(),
        "total_price": usage.total_price(),
        "total_consumption": usage.total_consumption(),
        "time_blocks": blocks,
    })
}
