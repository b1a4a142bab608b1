pub mod postgres;

pub use postgres::{MeasurementSink, MeasurementWriter, PgMeasurementSink};
