//! Tariff aggregation for monthly electricity billing.
//!
//! The crate groups hourly measurements into seasonal tariff blocks. It holds
//! the domain types, the seasonal calendar, the measurement store seam with
//! Postgres and in-memory backends, and the aggregation engine that ties them
//! together.

pub mod calendar;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod store;

pub use calendar::{CalendarProvider, LevelHours, SeasonalCalendar};
pub use engine::TariffAggregationEngine;
pub use error::{BillingError, BillingResult};
pub use store::{InMemoryMeasurementStore, MeasurementStore, PgMeasurementStore};
