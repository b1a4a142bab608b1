use billing_client::{BillingError, BillingResult};
use serde_json::{Map, Value};

use super::repository::BillingRepository;
use crate::projection::Projection;

/// Render data for a stored invoice: `{invoice, contract, provider, customer}`.
///
/// Items are nested under `invoice.invoice_items`.
pub async fn invoice_document<R>(repository: &R, invoice_id: i32) -> BillingResult<Value>
where
    R: BillingRepository + ?Sized,
{
    let invoice = repository
        .find_invoice(invoice_id)
        .await?
        .ok_or(BillingError::InvoiceNotFound(invoice_id))?;
    let items = repository.invoice_items(invoice_id).await?;

    let contract = repository
        .find_contract(invoice.contract_id)
        .await?
        .ok_or_else(|| {
            BillingError::InvalidRecord(format!(
                "contract {} of invoice {} not found",
                invoice.contract_id, invoice.id
            ))
        })?;

    let (provider, customer) = futures::try_join!(
        repository.find_provider(contract.provider_id),
        repository.find_customer(contract.customer_id),
    )?;
    let provider = provider
        .ok_or_else(|| BillingError::InvalidRecord(format!("provider {} not found", contract.provider_id)))?;
    let customer = customer.ok_or(BillingError::CustomerNotFound(contract.customer_id))?;

    let mut invoice_map = invoice.project_default(&["contract_id"]);
    let item_values = items
        .iter()
        .map(|item| Value::Object(item.project_default(&[])))
        .collect();
    invoice_map.insert("invoice_items".to_string(), Value::Array(item_values));

    let mut document = Map::new();
    document.insert("invoice".to_string(), Value::Object(invoice_map));
    document.insert(
        "contract".to_string(),
        Value::Object(contract.project_default(&["customer_id", "provider_id", "termination_date"])),
    );
    document.insert("provider".to_string(), Value::Object(provider.project_default(&[])));
    document.insert("customer".to_string(), Value::Object(customer.project_default(&[])));

    tracing::debug!(invoice_id, items = items.len(), "invoice document assembled");
    Ok(Value::Object(document))
}
