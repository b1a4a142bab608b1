mod billing;
mod measurement;
mod season;
mod usage;

pub use billing::{
    Customer, CustomerContract, CustomerType, Invoice, InvoiceItem, NewInvoice, NewInvoiceItem,
    Provider,
};
pub use measurement::Measurement;
pub use season::{DayType, Season, TariffLevel, MAX_HOUR, MAX_LEVEL, MIN_LEVEL};
pub use usage::{BillingPeriod, MonthlyUsage, TimeBlockUsage, UsageTotals};
