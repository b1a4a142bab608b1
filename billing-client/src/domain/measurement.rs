use time::OffsetDateTime;

/// One hourly reading; `(customer_id, measured_at)` is the primary key.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    pub customer_id: i32,
    pub measured_at: OffsetDateTime,
    pub consumption_kwh: f64,
    pub price_per_kwh: f64,
}

impl Measurement {
    pub fn price(&self) -> f64 {
        self.consumption_kwh * self.price_per_kwh
    }
}
