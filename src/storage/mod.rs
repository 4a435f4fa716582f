//! Storage layer for benchmark records.

pub mod csv;
pub mod jsonl;

pub use self::csv::{CSV_HEADERS, CsvExporter};
pub use jsonl::RunLog;
