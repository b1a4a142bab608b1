pub mod measurement_csv_file;

pub use measurement_csv_file::MeasurementCsvFileSource;
