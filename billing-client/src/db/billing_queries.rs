use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::domain::{Customer, CustomerContract, Invoice, InvoiceItem, NewInvoice, Provider};
use crate::error::BillingResult;

const CONTRACT_COLUMNS: &str = r#"
    id,
    provider_id,
    customer_id,
    customer_type::text AS customer_type,
    contract_number,
    energy_meter_number,
    package_name,
    termination_date,
    created_at,
    updated_at
"#;

pub async fn find_customer(pool: &PgPool, customer_id: i32) -> BillingResult<Option<Customer>> {
    let row = sqlx::query_as::<_, Customer>(
        r#"
        SELECT id, fullname, email, tax_code, street_address, zip_code, zip_name, created_at, updated_at
        FROM electricity_customers
        WHERE id = $1
        "#,
    )
    .bind(customer_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn find_provider(pool: &PgPool, provider_id: i32) -> BillingResult<Option<Provider>> {
    let row = sqlx::query_as::<_, Provider>(
        r#"
        SELECT
            id, full_title, email, webpage, tax_code, iban_number,
            street_address, zip_code, zip_name, created_at, updated_at
        FROM electricity_providers
        WHERE id = $1
        "#,
    )
    .bind(provider_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// The customer's contract without a termination date, if any.
pub async fn active_contract(pool: &PgPool, customer_id: i32) -> BillingResult<Option<CustomerContract>> {
    let sql = format!(
        r#"
        SELECT {CONTRACT_COLUMNS}
        FROM electricity_customers_contracts
        WHERE customer_id = $1
          AND termination_date IS NULL
        ORDER BY id
        LIMIT 1
        "#,
        CONTRACT_COLUMNS = CONTRACT_COLUMNS
    );

    let row = sqlx::query_as::<_, CustomerContract>(&sql)
        .bind(customer_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn find_contract(pool: &PgPool, contract_id: i32) -> BillingResult<Option<CustomerContract>> {
    let sql = format!(
        r#"
        SELECT {CONTRACT_COLUMNS}
        FROM electricity_customers_contracts
        WHERE id = $1
        "#,
        CONTRACT_COLUMNS = CONTRACT_COLUMNS
    );

    let row = sqlx::query_as::<_, CustomerContract>(&sql)
        .bind(contract_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Persist an invoice header and its items in one transaction.
pub async fn insert_invoice(pool: &PgPool, invoice: &NewInvoice) -> BillingResult<Invoice> {
    let mut tx = pool.begin().await?;

    let stored = sqlx::query_as::<_, Invoice>(
        r#"
        INSERT INTO electricity_invoices (
            contract_id, invoice_number, issued_date, service_date, location_issued, due_date,
            invoice_code, payment_reason, receiver_iban, receiver_reference,
            base_amount, tax_amount, total_amount
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING
            id, contract_id, invoice_number, issued_date, service_date, location_issued, due_date,
            invoice_code, payment_reason, receiver_iban, receiver_reference,
            base_amount, tax_amount, total_amount, created_at, updated_at
        "#,
    )
    .bind(invoice.contract_id)
    .bind(&invoice.invoice_number)
    .bind(invoice.issued_date)
    .bind(invoice.service_date)
    .bind(&invoice.location_issued)
    .bind(invoice.due_date)
    .bind(&invoice.invoice_code)
    .bind(&invoice.payment_reason)
    .bind(&invoice.receiver_iban)
    .bind(&invoice.receiver_reference)
    .bind(invoice.base_amount)
    .bind(invoice.tax_amount)
    .bind(invoice.total_amount)
    .fetch_one(&mut *tx)
    .await?;

    if !invoice.items.is_empty() {
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO electricity_invoices_items (electricity_invoice_id, name, unit, quantity, amount, date_from, date_to) ",
        );
        builder.push_values(&invoice.items, |mut b, item| {
            b.push_bind(stored.id)
                .push_bind(&item.name)
                .push_bind(&item.unit)
                .push_bind(item.quantity)
                .push_bind(item.amount)
                .push_bind(item.date_from)
                .push_bind(item.date_to);
        });
        builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(stored)
}

pub async fn find_invoice(pool: &PgPool, invoice_id: i32) -> BillingResult<Option<Invoice>> {
    let row = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT
            id, contract_id, invoice_number, issued_date, service_date, location_issued, due_date,
            invoice_code, payment_reason, receiver_iban, receiver_reference,
            base_amount, tax_amount, total_amount, created_at, updated_at
        FROM electricity_invoices
        WHERE id = $1
        "#,
    )
    .bind(invoice_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn invoice_items(pool: &PgPool, invoice_id: i32) -> BillingResult<Vec<InvoiceItem>> {
    let rows = sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT
            id,
            electricity_invoice_id AS invoice_id,
            name,
            unit,
            quantity,
            amount,
            date_from,
            date_to,
            created_at,
            updated_at
        FROM electricity_invoices_items
        WHERE electricity_invoice_id = $1
        ORDER BY id
        "#,
    )
    .bind(invoice_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
