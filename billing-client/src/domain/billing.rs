use std::{fmt, str::FromStr};

use time::{Date, PrimitiveDateTime};

use crate::error::BillingError;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Customer {
    pub id: i32,
    pub fullname: String,
    pub email: String,
    pub tax_code: String,
    pub street_address: String,
    pub zip_code: i32,
    pub zip_name: String,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Provider {
    pub id: i32,
    pub full_title: String,
    pub email: String,
    pub webpage: String,
    pub tax_code: String,
    pub iban_number: String,
    pub street_address: String,
    pub zip_code: i32,
    pub zip_name: String,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum CustomerType {
    Residential,
    Business,
    Municipal,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Residential => "RESIDENTIAL",
            Self::Business => "BUSINESS",
            Self::Municipal => "MUNICIPAL",
        }
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomerType {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RESIDENTIAL" => Ok(Self::Residential),
            "BUSINESS" => Ok(Self::Business),
            "MUNICIPAL" => Ok(Self::Municipal),
            other => Err(BillingError::InvalidRecord(format!(
                "unknown customer type '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for CustomerType {
    type Error = BillingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Supply contract between a customer and a provider.
///
/// A contract without `termination_date` is the customer's active one.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CustomerContract {
    pub id: i32,
    pub provider_id: i32,
    pub customer_id: i32,
    #[sqlx(try_from = "String")]
    pub customer_type: CustomerType,
    pub contract_number: String,
    pub energy_meter_number: String,
    pub package_name: String,
    pub termination_date: Option<PrimitiveDateTime>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

impl CustomerContract {
    pub fn is_active(&self) -> bool {
        self.termination_date.is_none()
    }
}

/// Stored invoice header.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Invoice {
    pub id: i32,
    pub contract_id: i32,
    pub invoice_number: String,
    pub issued_date: Date,
    pub service_date: Date,
    pub location_issued: String,
    pub due_date: Date,
    pub invoice_code: String,
    pub payment_reason: String,
    pub receiver_iban: String,
    pub receiver_reference: String,
    pub base_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InvoiceItem {
    pub id: i32,
    pub invoice_id: i32,
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    pub amount: f64,
    pub date_from: Date,
    pub date_to: Date,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

/// Invoice header and line items ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NewInvoice {
    pub contract_id: i32,
    pub invoice_number: String,
    pub issued_date: Date,
    pub service_date: Date,
    pub location_issued: String,
    pub due_date: Date,
    pub invoice_code: String,
    pub payment_reason: String,
    pub receiver_iban: String,
    pub receiver_reference: String,
    pub base_amount: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub items: Vec<NewInvoiceItem>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NewInvoiceItem {
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    pub amount: f64,
    pub date_from: Date,
    pub date_to: Date,
}
