use billing_client::{
    domain::{CustomerContract, MonthlyUsage, NewInvoice, NewInvoiceItem, Provider},
    BillingError, BillingResult,
};
use serde::Deserialize;
use time::{Date, Duration};

use crate::config::InvoiceConfig;

/// Request to bill one customer for one month.
///
/// `invoice_code` and `days_payment_due` fall back to the configured policy.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateInvoice {
    pub customer_id: i32,
    pub year: i32,
    pub month: u8,
    pub payment_reason: String,
    pub receiver_reference: String,
    pub invoice_number: String,
    pub location_issued: String,
    #[serde(default)]
    pub invoice_code: Option<String>,
    #[serde(default)]
    pub days_payment_due: Option<i64>,
}

/// Turns a month of aggregated usage into an invoice header with one line
/// item per tariff block.
#[derive(Debug, Clone)]
pub struct InvoiceAssembler {
    policy: InvoiceConfig,
}

impl InvoiceAssembler {
    pub const MAX_DAYS_PAYMENT_DUE: i64 = 365;

    pub fn new(policy: InvoiceConfig) -> Self {
        Self { policy }
    }

    /// Payment term for `request`, falling back to the policy.
    pub fn days_payment_due(&self, request: &CreateInvoice) -> BillingResult<i64> {
        let days = request.days_payment_due.unwrap_or(self.policy.days_payment_due);
        if !(0..=Self::MAX_DAYS_PAYMENT_DUE).contains(&days) {
            return Err(BillingError::InvalidPaymentTerms(days));
        }
        Ok(days)
    }

    pub fn assemble(
        &self,
        request: &CreateInvoice,
        contract: &CustomerContract,
        provider: &Provider,
        usage: &MonthlyUsage,
        issued_date: Date,
    ) -> BillingResult<NewInvoice> {
        let days_due = self.days_payment_due(request)?;
        let due_date = issued_date
            .checked_add(Duration::days(days_due))
            .ok_or(BillingError::InvalidPaymentTerms(days_due))?;

        let base_amount = usage.total_price();
        let tax_amount = base_amount * self.policy.tax_rate;
        let total_amount = base_amount + tax_amount;

        let items = usage
            .blocks
            .iter()
            .map(|block| NewInvoiceItem {
                name: format!("{} {}", self.policy.item_name_prefix, block.time_block),
                unit: self.policy.item_unit.clone(),
                quantity: block.consumption,
                amount: block.price,
                date_from: block.start_date,
                date_to: block.end_date,
            })
            .collect();

        Ok(NewInvoice {
            contract_id: contract.id,
            invoice_number: request.invoice_number.clone(),
            issued_date,
            service_date: usage.period.last_day(),
            location_issued: request.location_issued.clone(),
            due_date,
            invoice_code: request
                .invoice_code
                .clone()
                .unwrap_or_else(|| self.policy.invoice_code.clone()),
            payment_reason: request.payment_reason.clone(),
            receiver_iban: provider.iban_number.clone(),
            receiver_reference: request.receiver_reference.clone(),
            base_amount,
            tax_amount,
            total_amount,
            items,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use billing_client::domain::{BillingPeriod, CustomerType, TimeBlockUsage, UsageTotals};
    use time::macros::{date, datetime};

    pub(crate) fn contract(customer_id: i32) -> CustomerContract {
        CustomerContract {
            id: 11,
            provider_id: 21,
            customer_id,
            customer_type: CustomerType::Residential,
            contract_number: "C-2024-001".to_string(),
            energy_meter_number: "EM-778".to_string(),
            package_name: "Home".to_string(),
            termination_date: None,
            created_at: datetime!(2024-01-01 00:00:00),
            updated_at: datetime!(2024-01-01 00:00:00),
        }
    }

    pub(crate) fn provider() -> Provider {
        Provider {
            id: 21,
            full_title: "Grid Supply d.o.o.".to_string(),
            email: "billing@grid.example".to_string(),
            webpage: "https://grid.example".to_string(),
            tax_code: "SI12345678".to_string(),
            iban_number: "SI56 1910 0000 0123 438".to_string(),
            street_address: "Main Street 1".to_string(),
            zip_code: 1000,
            zip_name: "Ljubljana".to_string(),
            created_at: datetime!(2024-01-01 00:00:00),
            updated_at: datetime!(2024-01-01 00:00:00),
        }
    }

    pub(crate) fn request(customer_id: i32) -> CreateInvoice {
        CreateInvoice {
            customer_id,
            year: 2024,
            month: 3,
            payment_reason: "Electricity 03/2024".to_string(),
            receiver_reference: "SI00 2024-03".to_string(),
            invoice_number: "INV-2024-0003".to_string(),
            location_issued: "Ljubljana".to_string(),
            invoice_code: None,
            days_payment_due: None,
        }
    }

    pub(crate) fn usage() -> MonthlyUsage {
        let period = BillingPeriod::new(2024, 3).unwrap();
        MonthlyUsage {
            customer_id: 1,
            period,
            totals: UsageTotals::new(10.0, 80.0),
            blocks: vec![
                TimeBlockUsage {
                    time_block: 1,
                    consumption: 30.0,
                    price: 6.0,
                    start_date: period.start(),
                    end_date: period.last_day(),
                },
                TimeBlockUsage {
                    time_block: 3,
                    consumption: 50.0,
                    price: 4.0,
                    start_date: period.start(),
                    end_date: period.last_day(),
                },
            ],
        }
    }

    #[test]
    fn computes_dates_and_amounts_from_policy() {
        let assembler = InvoiceAssembler::new(InvoiceConfig::default());
        let invoice = assembler
            .assemble(&request(1), &contract(1), &provider(), &usage(), date!(2024 - 04 - 02))
            .unwrap();

        assert_eq!(invoice.contract_id, 11);
        assert_eq!(invoice.issued_date, date!(2024 - 04 - 02));
        assert_eq!(invoice.due_date, date!(2024 - 04 - 17));
        assert_eq!(invoice.service_date, date!(2024 - 03 - 31));
        assert_eq!(invoice.invoice_code, "OTHR");
        assert_eq!(invoice.receiver_iban, "SI56 1910 0000 0123 438");
        assert_eq!(invoice.base_amount, 10.0);
        assert!((invoice.tax_amount - 2.2).abs() < 1e-9);
        assert!((invoice.total_amount - 12.2).abs() < 1e-9);
    }

    #[test]
    fn one_item_per_block_in_level_order() {
        let assembler = InvoiceAssembler::new(InvoiceConfig::default());
        let invoice = assembler
            .assemble(&request(1), &contract(1), &provider(), &usage(), date!(2024 - 04 - 02))
            .unwrap();

        let names: Vec<_> = invoice.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Time block 1", "Time block 3"]);

        let item = &invoice.items[1];
        assert_eq!(item.unit, "kWh");
        assert_eq!(item.quantity, 50.0);
        assert_eq!(item.amount, 4.0);
        assert_eq!(item.date_from, date!(2024 - 03 - 01));
        assert_eq!(item.date_to, date!(2024 - 03 - 31));
    }

    #[test]
    fn request_overrides_code_and_due_days() {
        let policy = InvoiceConfig {
            tax_rate: 0.0,
            item_name_prefix: "Block".to_string(),
            ..InvoiceConfig::default()
        };
        let mut req = request(1);
        req.invoice_code = Some("ELEC".to_string());
        req.days_payment_due = Some(30);

        let invoice = InvoiceAssembler::new(policy)
            .assemble(&req, &contract(1), &provider(), &usage(), date!(2024 - 04 - 02))
            .unwrap();
        assert_eq!(invoice.invoice_code, "ELEC");
        assert_eq!(invoice.due_date, date!(2024 - 05 - 02));
        assert_eq!(invoice.tax_amount, 0.0);
        assert_eq!(invoice.total_amount, 10.0);
        assert_eq!(invoice.items[0].name, "Block 1");
    }

    #[test]
    fn rejects_negative_and_oversized_payment_terms() {
        let assembler = InvoiceAssembler::new(InvoiceConfig::default());

        for days in [-30, 366, i64::MAX, i64::MIN] {
            let mut req = request(1);
            req.days_payment_due = Some(days);

            let res = assembler.assemble(&req, &contract(1), &provider(), &usage(), date!(2024 - 04 - 02));
            assert!(
                matches!(res, Err(BillingError::InvalidPaymentTerms(d)) if d == days),
                "days_payment_due {days} was accepted"
            );
        }

        let mut req = request(1);
        req.days_payment_due = Some(0);
        let invoice = assembler
            .assemble(&req, &contract(1), &provider(), &usage(), date!(2024 - 04 - 02))
            .unwrap();
        assert_eq!(invoice.due_date, invoice.issued_date);
    }

    #[test]
    fn request_deserializes_with_optional_fields_missing() {
        let req: CreateInvoice = serde_json::from_str(
            r#"{
                "customer_id": 4,
                "year": 2024,
                "month": 2,
                "payment_reason": "Electricity",
                "receiver_reference": "SI00 1",
                "invoice_number": "1/2024",
                "location_issued": "Maribor"
            }"#,
        )
        .unwrap();
        assert_eq!(req.customer_id, 4);
        assert!(req.invoice_code.is_none());
        assert!(req.days_payment_due.is_none());
    }
}
