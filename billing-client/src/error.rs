#[derive(thiserror::Error, Debug)]
pub enum BillingError {
    #[error("no measurements found for customer {customer_id} in {year}-{month:02}")]
    NoMeasurementsForPeriod { customer_id: i32, year: i32, month: u8 },
    #[error("measurement store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
    #[error("invalid billing period {year}-{month}")]
    InvalidPeriod { year: i32, month: u8 },
    #[error("invalid season: {0}")]
    InvalidSeason(String),
    #[error("invalid tariff level: {0}")]
    InvalidTariffLevel(String),
    #[error("invalid stored record: {0}")]
    InvalidRecord(String),
    #[error("customer {0} not found")]
    CustomerNotFound(i32),
    #[error("customer {0} does not have an active contract")]
    NoActiveContract(i32),
    #[error("invoice {0} not found")]
    InvoiceNotFound(i32),
    #[error("payment due in {0} days is outside 0..=365")]
    InvalidPaymentTerms(i64),
}

impl BillingError {
    /// Whether the failure was caused by the request rather than the backend.
    ///
    /// Only a failing store transport counts as a server-side error; every
    /// other kind is a rejected precondition or invalid input.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::StoreUnavailable(_))
    }
}

pub type BillingResult<T> = Result<T, BillingError>;
