use std::{
    fs::File,
    path::{Path, PathBuf},
    time::SystemTime,
};

use billing_client::domain::Measurement;
use csv::StringRecord;
use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    OffsetDateTime, PrimitiveDateTime, UtcOffset,
};

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

const LOCAL_WITH_SECONDS: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const LOCAL_WITHOUT_SECONDS: &[FormatItem<'static>] = format_description!("[year]-[month]-[day] [hour]:[minute]");

/// Meter export for a single customer.
///
/// The file name carries the customer id as a `-<id>.csv` suffix. Contents
/// are `;` separated with a header row and decimal commas; the first three
/// columns are read by position:
/// - measured_at (RFC3339, or `YYYY-MM-DD HH:MM[:SS]` local to `offset`)
/// - consumption_kwh
/// - price_per_kwh
pub struct MeasurementCsvFileSource {
    path: PathBuf,
    customer_id: i32,
    offset: UtcOffset,
}

impl MeasurementCsvFileSource {
    pub fn from_path<P: Into<PathBuf>>(path: P, offset: UtcOffset) -> Result<Self, PipelineError> {
        let path = path.into();
        let customer_id = customer_id_from_path(&path)?;
        if !path.is_file() {
            return Err(PipelineError::Source(format!(
                "measurement file '{}' does not exist",
                path.display()
            )));
        }

        Ok(Self {
            path,
            customer_id,
            offset,
        })
    }

    pub fn customer_id(&self) -> i32 {
        self.customer_id
    }
}

/// Extracts the customer id from names like `export-march-42.csv`.
pub fn customer_id_from_path(path: &Path) -> Result<i32, PipelineError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| PipelineError::Source(format!("invalid file name '{}'", path.display())))?;

    let stem = name
        .strip_suffix(".csv")
        .ok_or_else(|| PipelineError::Source(format!("only CSV files are accepted, got '{name}'")))?;

    let missing_id = || {
        PipelineError::Source(format!(
            "file name '{name}' has no customer id, expected the form '<name>-<id>.csv'"
        ))
    };

    let (_, id) = stem.rsplit_once('-').ok_or_else(missing_id)?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(missing_id());
    }
    id.parse().map_err(|_| missing_id())
}

fn parse_decimal(column: &str, raw: &str) -> Result<f64, PipelineError> {
    let normalized = raw.trim().replace(',', ".");
    normalized
        .parse()
        .map_err(|e| PipelineError::Source(format!("invalid {column} '{raw}': {e}")))
}

fn parse_measured_at(raw: &str, offset: UtcOffset) -> Result<OffsetDateTime, PipelineError> {
    let trimmed = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(ts);
    }

    PrimitiveDateTime::parse(trimmed, LOCAL_WITH_SECONDS)
        .or_else(|_| PrimitiveDateTime::parse(trimmed, LOCAL_WITHOUT_SECONDS))
        .map(|local| local.assume_offset(offset))
        .map_err(|e| PipelineError::Source(format!("invalid measured_at '{raw}': {e}")))
}

fn record_to_measurement(
    record: &StringRecord,
    customer_id: i32,
    offset: UtcOffset,
) -> Result<Measurement, PipelineError> {
    let get = |idx: usize, name: &str| -> Result<&str, PipelineError> {
        record
            .get(idx)
            .ok_or_else(|| PipelineError::Source(format!("missing column '{name}' in CSV record")))
    };

    let measured_at = parse_measured_at(get(0, "measured_at")?, offset)?;
    let consumption_kwh = parse_decimal("consumption_kwh", get(1, "consumption_kwh")?)?;
    let price_per_kwh = parse_decimal("price_per_kwh", get(2, "price_per_kwh")?)?;

    Ok(Measurement {
        customer_id,
        measured_at,
        consumption_kwh,
        price_per_kwh,
    })
}

#[async_trait::async_trait]
impl Source<Measurement> for MeasurementCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<Measurement> {
        // Blocking reader; exports are one customer-month, small enough to
        // read inline.
        let path = self.path.clone();
        let customer_id = self.customer_id;
        let offset = self.offset;

        let s = async_stream::stream! {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to open CSV file: {e}")));
                    return;
                }
            };
            let mut rdr = csv::ReaderBuilder::new()
                .delimiter(b';')
                .has_headers(true)
                .flexible(true)
                .from_reader(file);

            for (line, result) in rdr.records().enumerate() {
                let parsed = result
                    .map_err(|e| PipelineError::Source(format!("failed to read CSV record: {e}")))
                    .and_then(|record| record_to_measurement(&record, customer_id, offset));

                match parsed {
                    Ok(measurement) => {
                        yield Ok(Envelope {
                            payload: measurement,
                            received_at: SystemTime::now(),
                        });
                    }
                    Err(e) => {
                        metrics::counter!("measurement_csv_parse_errors_total").increment(1);
                        tracing::warn!(error = %e, line = line + 2, "skipping CSV record");
                        yield Err(e);
                    }
                }
            }
        };

        Box::pin(s)
    }
}
