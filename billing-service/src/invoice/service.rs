use std::time::Instant;

use billing_client::{
    domain::{BillingPeriod, Invoice},
    BillingError, BillingResult, CalendarProvider, MeasurementStore, TariffAggregationEngine,
};
use time::{Date, OffsetDateTime, UtcOffset};

use super::assembler::{CreateInvoice, InvoiceAssembler};
use super::repository::BillingRepository;

/// Creates invoices from aggregated usage.
pub struct InvoiceService<R, S, C> {
    repository: R,
    engine: TariffAggregationEngine<S, C>,
    assembler: InvoiceAssembler,
    offset: UtcOffset,
}

impl<R, S, C> InvoiceService<R, S, C>
where
    R: BillingRepository,
    S: MeasurementStore,
    C: CalendarProvider,
{
    pub fn new(repository: R, engine: TariffAggregationEngine<S, C>, assembler: InvoiceAssembler) -> Self {
        Self {
            repository,
            engine,
            assembler,
            offset: UtcOffset::UTC,
        }
    }

    /// Offset used to decide today's issue date.
    pub fn with_utc_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    pub async fn create_invoice(&self, request: &CreateInvoice) -> BillingResult<Invoice> {
        let today = OffsetDateTime::now_utc().to_offset(self.offset).date();
        self.create_invoice_on(request, today).await
    }

    /// Checks, in order: period and payment term are valid, customer exists,
    /// an active contract exists, the month has measurements. Only then
    /// aggregates and persists.
    pub async fn create_invoice_on(&self, request: &CreateInvoice, issued_date: Date) -> BillingResult<Invoice> {
        let started = Instant::now();
        let customer_id = request.customer_id;
        let period = BillingPeriod::new(request.year, request.month)?;
        self.assembler.days_payment_due(request)?;

        self.repository
            .find_customer(customer_id)
            .await?
            .ok_or(BillingError::CustomerNotFound(customer_id))?;

        let contract = self
            .repository
            .active_contract(customer_id)
            .await?
            .ok_or(BillingError::NoActiveContract(customer_id))?;

        let count = self.engine.store().count_measurements(customer_id, &period).await?;
        if count == 0 {
            metrics::counter!("invoice_rejected_total", "reason" => "no_measurements").increment(1);
            return Err(BillingError::NoMeasurementsForPeriod {
                customer_id,
                year: period.year(),
                month: period.month_number(),
            });
        }

        let provider = self
            .repository
            .find_provider(contract.provider_id)
            .await?
            .ok_or_else(|| {
                BillingError::InvalidRecord(format!(
                    "provider {} of contract {} not found",
                    contract.provider_id, contract.id
                ))
            })?;

        let usage = self.engine.aggregate(customer_id, period).await?;
        metrics::histogram!("tariff_aggregation_seconds").record(started.elapsed().as_secs_f64());

        let new_invoice = self
            .assembler
            .assemble(request, &contract, &provider, &usage, issued_date)?;
        let invoice = self.repository.insert_invoice(&new_invoice).await?;

        metrics::counter!("invoices_created_total").increment(1);
        tracing::info!(
            customer_id,
            invoice_id = invoice.id,
            invoice_number = %invoice.invoice_number,
            year = period.year(),
            month = period.month_number(),
            measurements = count,
            items = new_invoice.items.len(),
            total_amount = invoice.total_amount,
            "invoice created"
        );

        Ok(invoice)
    }
}
