use billing_client::{
    db::billing_queries,
    domain::{Customer, CustomerContract, Invoice, InvoiceItem, NewInvoice, Provider},
    BillingResult,
};
use sqlx::PgPool;

/// Customer, contract and invoice records used by invoicing.
#[async_trait::async_trait]
pub trait BillingRepository: Send + Sync {
    async fn find_customer(&self, customer_id: i32) -> BillingResult<Option<Customer>>;

    async fn find_provider(&self, provider_id: i32) -> BillingResult<Option<Provider>>;

    async fn active_contract(&self, customer_id: i32) -> BillingResult<Option<CustomerContract>>;

    async fn find_contract(&self, contract_id: i32) -> BillingResult<Option<CustomerContract>>;

    /// Stores the header and every item atomically.
    async fn insert_invoice(&self, invoice: &NewInvoice) -> BillingResult<Invoice>;

    async fn find_invoice(&self, invoice_id: i32) -> BillingResult<Option<Invoice>>;

    async fn invoice_items(&self, invoice_id: i32) -> BillingResult<Vec<InvoiceItem>>;
}

#[derive(Debug, Clone)]
pub struct PgBillingRepository {
    pool: PgPool,
}

impl PgBillingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BillingRepository for PgBillingRepository {
    async fn find_customer(&self, customer_id: i32) -> BillingResult<Option<Customer>> {
        billing_queries::find_customer(&self.pool, customer_id).await
    }

    async fn find_provider(&self, provider_id: i32) -> BillingResult<Option<Provider>> {
        billing_queries::find_provider(&self.pool, provider_id).await
    }

    async fn active_contract(&self, customer_id: i32) -> BillingResult<Option<CustomerContract>> {
        billing_queries::active_contract(&self.pool, customer_id).await
    }

    async fn find_contract(&self, contract_id: i32) -> BillingResult<Option<CustomerContract>> {
        billing_queries::find_contract(&self.pool, contract_id).await
    }

    async fn insert_invoice(&self, invoice: &NewInvoice) -> BillingResult<Invoice> {
        billing_queries::insert_invoice(&self.pool, invoice).await
    }

    async fn find_invoice(&self, invoice_id: i32) -> BillingResult<Option<Invoice>> {
        billing_queries::find_invoice(&self.pool, invoice_id).await
    }

    async fn invoice_items(&self, invoice_id: i32) -> BillingResult<Vec<InvoiceItem>> {
        billing_queries::invoice_items(&self.pool, invoice_id).await
    }
}

#[async_trait::async_trait]
impl<T: BillingRepository + ?Sized> BillingRepository for std::sync::Arc<T> {
    async fn find_customer(&self, customer_id: i32) -> BillingResult<Option<Customer>> {
        (**self).find_customer(customer_id).await
    }

    async fn find_provider(&self, provider_id: i32) -> BillingResult<Option<Provider>> {
        (**self).find_provider(provider_id).await
    }

    async fn active_contract(&self, customer_id: i32) -> BillingResult<Option<CustomerContract>> {
        (**self).active_contract(customer_id).await
    }

    async fn find_contract(&self, contract_id: i32) -> BillingResult<Option<CustomerContract>> {
        (**self).find_contract(contract_id).await
    }

    async fn insert_invoice(&self, invoice: &NewInvoice) -> BillingResult<Invoice> {
        (**self).insert_invoice(invoice).await
    }

    async fn find_invoice(&self, invoice_id: i32) -> BillingResult<Option<Invoice>> {
        (**self).find_invoice(invoice_id).await
    }

    async fn invoice_items(&self, invoice_id: i32) -> BillingResult<Vec<InvoiceItem>> {
        (**self).invoice_items(invoice_id).await
    }
}
