//! CSV export for benchmark records.

use std::io::Write;
use std::path::Path;

use crate::BenchError;
use crate::core::schema::{BenchRecord, OperationRecord};

/// CSV column headers in deterministic order.
pub const CSV_HEADERS: &[&str] = &[
    "schema_version",
    "record_id",
    "timestamp",
    "enclave_path",
    "provider",
    "git_sha",
    "operation",
    "entry_point",
    "iterations",
    "failures",
    "average_ns",
    "mean_ns",
    "median_ns",
    "stddev_ns",
    "min_ns",
    "max_ns",
];

/// CSV exporter for benchmark records.
///
/// Flattens each record into one row per measured operation.
#[derive(Debug, Clone, Default)]
pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        CsvExporter
    }

    /// Export records to a CSV file, replacing any existing file.
    pub fn export(&self, records: &[BenchRecord], output: &Path) -> Result<(), BenchError> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BenchError::Message(format!("failed to create directory: {e}")))?;
            }
        }

        let file = std::fs::File::create(output)
            .map_err(|e| BenchError::Message(format!("failed to create file: {e}")))?;

        self.export_to_writer(records, file)
    }

    /// Export records to any writer implementing Write.
    pub fn export_to_writer<W: Write>(
        &self,
        records: &[BenchRecord],
        writer: W,
    ) -> Result<(), BenchError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer
            .write_record(CSV_HEADERS)
            .map_err(|e| BenchError::Message(format!("failed to write CSV headers: {e}")))?;

        for record in records {
            for op in &record.operations {
                csv_writer
                    .write_record(&self.operation_to_row(record, op))
                    .map_err(|e| BenchError::Message(format!("failed to write CSV row: {e}")))?;
            }
        }

        csv_writer
            .flush()
            .map_err(|e| BenchError::Message(format!("failed to flush CSV writer: {e}")))?;

        Ok(())
    }

    fn operation_to_row(&self, record: &BenchRecord, op: &OperationRecord) -> Vec<String> {
        vec![
            record.schema_version.to_string(),
            record.record_id.clone(),
            record.timestamp.clone(),
            record.enclave_path.clone(),
            record.provider.name.clone(),
            record.env.git_sha.clone().unwrap_or_default(),
            op.kind.to_string(),
            op.entry_point.clone(),
            op.iterations.to_string(),
            op.failures.to_string(),
            op.average_ns.to_string(),
            op.stats.mean_ns.to_string(),
            op.stats.median_ns.map(|v| v.to_string()).unwrap_or_default(),
            op.stats.stddev_ns.map(|v| format!("{v:.1}")).unwrap_or_default(),
            op.stats.min_ns.to_string(),
            op.stats.max_ns.to_string(),
        ]
    }
}
