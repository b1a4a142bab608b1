use crate::pipeline::{Envelope, PipelineError, Transform};
use billing_client::domain::Measurement;
use time::macros::datetime;

/// Pure validation of a `Measurement` record.
///
/// Rules:
/// - consumption and unit price must be finite and non-negative.
/// - measured_at must be within [2000-01-01, 2100-01-01).
pub fn validate_measurement(env: Envelope<Measurement>) -> Result<Envelope<Measurement>, PipelineError> {
    let m = &env.payload;

    if !m.consumption_kwh.is_finite() || m.consumption_kwh < 0.0 {
        return Err(PipelineError::Transform(format!(
            "consumption_kwh must be non-negative, got {}",
            m.consumption_kwh
        )));
    }

    if !m.price_per_kwh.is_finite() || m.price_per_kwh < 0.0 {
        return Err(PipelineError::Transform(format!(
            "price_per_kwh must be non-negative, got {}",
            m.price_per_kwh
        )));
    }

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    if m.measured_at < min_ts || m.measured_at >= max_ts {
        return Err(PipelineError::Transform("timestamp out of allowed range".to_string()));
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct MeasurementValidation;

#[async_trait::async_trait]
impl Transform<Measurement, Measurement> for MeasurementValidation {
    async fn apply(&self, input: Envelope<Measurement>) -> Result<Envelope<Measurement>, PipelineError> {
        match validate_measurement(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("validation_measurement_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}
