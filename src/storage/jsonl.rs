//! Append-only run log: one `BenchRecord` per line.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::core::schema::{BenchRecord, SCHEMA_VERSION};
use crate::{BenchError, BenchResult};

/// History of benchmark runs kept as JSON lines.
///
/// A log that does not exist yet holds no runs. Records are checked
/// both when they are written and when they are read back.
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        RunLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds `record` as the last line of the log.
    pub fn append(&self, record: &BenchRecord) -> BenchResult<()> {
        check_record(record)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_err("create directory for", e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err("open", e))?;

        // One write per line so concurrent appenders do not interleave.
        let mut line = serde_json::to_vec(record)
            .map_err(|e| BenchError::Message(format!("encoding run {}: {e}", record.record_id)))?;
        line.push(b'\n');
        file.write_all(&line).map_err(|e| self.io_err("write", e))
    }

    /// Every run in the log, oldest first.
    pub fn records(&self) -> BenchResult<Vec<BenchRecord>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err("open", e)),
        };

        let stream = serde_json::Deserializer::from_reader(BufReader::new(file));
        let mut runs = Vec::new();
        for item in stream.into_iter::<BenchRecord>() {
            let record = item.map_err(|e| {
                BenchError::Message(format!(
                    "{}: malformed run at line {}: {e}",
                    self.path.display(),
                    e.line()
                ))
            })?;
            check_record(&record).map_err(|e| {
                BenchError::Message(format!("{}: run #{}: {e}", self.path.display(), runs.len() + 1))
            })?;
            runs.push(record);
        }
        Ok(runs)
    }

    /// Runs of the enclave image with the given SHA-256.
    pub fn runs_of(&self, enclave_sha256: &str) -> BenchResult<Vec<BenchRecord>> {
        let mut runs = self.records()?;
        runs.retain(|r| r.enclave_sha256.as_deref() == Some(enclave_sha256));
        Ok(runs)
    }

    /// Runs made through the named execution provider.
    pub fn runs_by(&self, provider: &str) -> BenchResult<Vec<BenchRecord>> {
        let mut runs = self.records()?;
        runs.retain(|r| r.provider.name == provider);
        Ok(runs)
    }

    fn io_err(&self, what: &str, e: std::io::Error) -> BenchError {
        BenchError::Message(format!("cannot {what} run log {}: {e}", self.path.display()))
    }
}

/// Rejects records this version cannot interpret faithfully.
fn check_record(record: &BenchRecord) -> BenchResult<()> {
    if record.schema_version != SCHEMA_VERSION {
        return Err(BenchError::Message(format!(
            "record {} uses schema v{}, this build writes v{SCHEMA_VERSION}",
            record.record_id, record.schema_version
        )));
    }
    if record.provider.name.is_empty() {
        return Err(BenchError::Message(format!("record {} names no provider", record.record_id)));
    }
    if let Some(hash) = &record.enclave_sha256 {
        if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(BenchError::Message(format!(
                "record {} has a malformed enclave hash {hash:?}",
                record.record_id
            )));
        }
    }
    for op in &record.operations {
        if op.entry_point != op.kind.entry_point() {
            return Err(BenchError::Message(format!(
                "record {}: {} is not the entry point of {}",
                record.record_id, op.entry_point, op.kind
            )));
        }
        if op.samples_ns.len() as u64 + u64::from(op.failures) != u64::from(op.iterations) {
            return Err(BenchError::Message(format!(
                "record {}: {} has {} samples and {} failures for {} iterations",
                record.record_id,
                op.kind,
                op.samples_ns.len(),
                op.failures,
                op.iterations
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::env::EnvironmentInfo;
    use crate::core::schema::{OperationRecord, RunConfig, TimingStat};
    use crate::provider::{OperationKind, ProviderInfo};

    fn record(provider: &str) -> BenchRecord {
        BenchRecord::new(
            "libenclave.signed.so".to_string(),
            EnvironmentInfo::default(),
            ProviderInfo { name: provider.to_string(), mode: None },
            RunConfig::default(),
        )
    }

    fn op(kind: OperationKind, entry_point: &str) -> OperationRecord {
        OperationRecord {
            kind,
            entry_point: entry_point.to_string(),
            iterations: 1,
            failures: 0,
            average_ns: 10,
            stats: TimingStat::from_samples(&[10]),
            samples_ns: vec![10],
        }
    }

    #[test]
    fn test_foreign_schema_version_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(dir.path().join("runs.jsonl"));

        let mut rec = record("mock");
        rec.schema_version = 999;

        let err = log.append(&rec).unwrap_err();
        assert!(err.to_string().contains("schema v999"));
        assert!(!log.path().exists());
    }

    #[test]
    fn test_missing_log_has_no_runs() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(dir.path().join("missing.jsonl"));
        assert!(log.records().unwrap().is_empty());
        assert!(log.runs_by("mock").unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_entry_point_rejected() {
        let mut rec = record("mock");
        rec.operations.push(op(OperationKind::Training, "cnn_inference_f32_cpp"));
        let err = check_record(&rec).unwrap_err();
        assert!(err.to_string().contains("not the entry point of training"));
    }

    #[test]
    fn test_sample_count_must_match_iterations() {
        let mut rec = record("mock");
        rec.operations.push(op(OperationKind::Inference, "cnn_inference_f32_cpp"));
        assert!(check_record(&rec).is_ok());

        rec.operations[0].iterations = 5;
        let err = check_record(&rec).unwrap_err();
        assert!(err.to_string().contains("1 samples and 0 failures for 5 iterations"));

        rec.operations[0].failures = 4;
        assert!(check_record(&rec).is_ok());
    }

    #[test]
    fn test_bad_hash_and_empty_provider_rejected() {
        let mut rec = record("mock");
        rec.enclave_sha256 = Some("not-a-hash".to_string());
        assert!(check_record(&rec).is_err());

        rec.enclave_sha256 = Some(crate::sha256_hex(b"enclave"));
        assert!(check_record(&rec).is_ok());

        assert!(check_record(&record("")).is_err());
    }

    #[test]
    fn test_filters_by_provider_and_hash() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::open(dir.path().join("runs.jsonl"));
        let hash_a = crate::sha256_hex(b"image a");
        let hash_b = crate::sha256_hex(b"image b");

        for (provider, hash) in [("sgx", &hash_a), ("mock", &hash_a), ("sgx", &hash_b)] {
            let mut rec = record(provider);
            rec.enclave_sha256 = Some(hash.clone());
            log.append(&rec).unwrap();
        }

        assert_eq!(log.runs_of(&hash_a).unwrap().len(), 2);
        assert_eq!(log.runs_of(&hash_b).unwrap()[0].provider.name, "sgx");
        assert_eq!(log.runs_by("sgx").unwrap().len(), 2);
        assert!(log.runs_of(&crate::sha256_hex(b"other")).unwrap().is_empty());
    }
}
