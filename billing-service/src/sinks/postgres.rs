use std::time::Duration;

use billing_client::{domain::Measurement, InMemoryMeasurementStore, PgMeasurementStore};
use futures::StreamExt;

use crate::pipeline::{Envelope, PipelineError, Sink, SinkReport};

/// Batch write side of a measurement store.
///
/// Returns the number of rows actually written; rows whose
/// `(customer_id, measured_at)` key already exists are skipped.
#[async_trait::async_trait]
pub trait MeasurementWriter: Send + Sync {
    async fn write_batch(&self, batch: &[Measurement]) -> Result<u64, sqlx::Error>;
}

#[async_trait::async_trait]
impl MeasurementWriter for PgMeasurementStore {
    async fn write_batch(&self, batch: &[Measurement]) -> Result<u64, sqlx::Error> {
        self.insert(batch).await
    }
}

#[async_trait::async_trait]
impl MeasurementWriter for InMemoryMeasurementStore {
    async fn write_batch(&self, batch: &[Measurement]) -> Result<u64, sqlx::Error> {
        Ok(self.insert_many(batch.iter().cloned()).await)
    }
}

pub struct MeasurementSink<W> {
    writer: W,
    batch_size: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

pub type PgMeasurementSink = MeasurementSink<PgMeasurementStore>;

impl<W: MeasurementWriter> MeasurementSink<W> {
    pub fn new(writer: W, batch_size: usize, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            writer,
            batch_size: batch_size.max(1),
            max_retries,
            retry_backoff,
        }
    }

    async fn flush_batch(&self, batch: &[Envelope<Measurement>], report: &mut SinkReport) -> Result<(), PipelineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let rows: Vec<Measurement> = batch.iter().map(|env| env.payload.clone()).collect();

        let mut attempt: u32 = 0;
        loop {
            match self.writer.write_batch(&rows).await {
                Ok(written) => {
                    let skipped = rows.len() as u64 - written.min(rows.len() as u64);
                    report.records_added += written;
                    report.duplicates += skipped;

                    metrics::counter!("measurements_ingested_total").increment(written);
                    if skipped > 0 {
                        metrics::counter!("measurements_duplicate_total").increment(skipped);
                        tracing::debug!(skipped, "duplicate measurements skipped");
                    }

                    if let Some(min_received) = batch.iter().map(|e| e.received_at).min() {
                        if let Ok(dur) = std::time::SystemTime::now().duration_since(min_received) {
                            metrics::histogram!("ingest_end_to_end_latency_seconds").record(dur.as_secs_f64());
                        }
                    }

                    return Ok(());
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let sleep_for = self.retry_backoff * attempt;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        "measurement sink flush failed, retrying with backoff"
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "measurement sink flush failed, giving up");
                    metrics::counter!("measurement_sink_errors_total").increment(1);
                    return Err(PipelineError::Sink(e.to_string()));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl<W: MeasurementWriter> Sink<Measurement> for MeasurementSink<W> {
    async fn run<S>(&self, mut input: S) -> Result<SinkReport, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<Measurement>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut report = SinkReport::default();
        let mut buffer: Vec<Envelope<Measurement>> = Vec::with_capacity(self.batch_size);

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::warn!(error = %e, "measurement rejected upstream");
                    report.rejected += 1;
                    continue;
                }
            };

            buffer.push(env);
            if buffer.len() >= self.batch_size {
                self.flush_batch(&buffer, &mut report).await?;
                buffer.clear();
            }
        }

        self.flush_batch(&buffer, &mut report).await?;

        Ok(report)
    }
}
