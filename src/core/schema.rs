//! BenchRecord schema v1 - machine-readable output of a benchmark run.

use serde::{Deserialize, Serialize};

use super::env::EnvironmentInfo;
use crate::bench::{BenchConfig, RunOutcome};
use crate::provider::{OperationKind, ProviderInfo};

/// Schema version for forward compatibility
pub const SCHEMA_VERSION: u32 = 1;

/// Spread of the successful samples of one operation, in whole nanoseconds.
///
/// Rank statistics are taken from the sorted samples without
/// interpolation, except the median of an even count, which is the
/// midpoint of the two middle samples rounded down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingStat {
    pub samples: u32,
    pub mean_ns: u64,
    pub min_ns: u64,
    pub max_ns: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_ns: Option<u64>,
    /// Population standard deviation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stddev_ns: Option<f64>,
}

impl TimingStat {
    pub fn from_samples(samples_ns: &[u64]) -> Self {
        let mut sorted = samples_ns.to_vec();
        sorted.sort_unstable();
        let (Some(&min_ns), Some(&max_ns)) = (sorted.first(), sorted.last()) else {
            return TimingStat {
                samples: 0,
                mean_ns: 0,
                min_ns: 0,
                max_ns: 0,
                median_ns: None,
                p95_ns: None,
                stddev_ns: None,
            };
        };

        let n = sorted.len();
        let total: u128 = sorted.iter().map(|&v| u128::from(v)).sum();
        let mean_ns = (total / n as u128) as u64;

        let mid = n / 2;
        let median_ns = if n % 2 == 1 {
            sorted[mid]
        } else {
            let (lo, hi) = (sorted[mid - 1], sorted[mid]);
            lo + (hi - lo) / 2
        };

        // nearest rank: ceil(95 * n / 100)
        let rank = (95 * n).div_ceil(100).max(1);

        let exact_mean = total as f64 / n as f64;
        let variance =
            sorted.iter().map(|&v| (v as f64 - exact_mean).powi(2)).sum::<f64>() / n as f64;

        TimingStat {
            samples: n as u32,
            mean_ns,
            min_ns,
            max_ns,
            median_ns: Some(median_ns),
            p95_ns: Some(sorted[rank - 1]),
            stddev_ns: Some(variance.sqrt()),
        }
    }
}

/// Run configuration recorded alongside the results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub debug: bool,
    pub warmup: OperationKind,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig { debug: true, warmup: OperationKind::Training }
    }
}

impl From<&BenchConfig> for RunConfig {
    fn from(cfg: &BenchConfig) -> Self {
        RunConfig { debug: cfg.debug, warmup: cfg.warmup }
    }
}

/// Results for one operation kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub entry_point: String,
    pub iterations: u32,
    pub failures: u32,
    /// Reported average: sum of `elapsed / iterations` over successful calls
    pub average_ns: u64,
    pub stats: TimingStat,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples_ns: Vec<u64>,
}

/// Canonical benchmark record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchRecord {
    /// Schema version for forward compatibility
    pub schema_version: u32,

    /// Unique identifier for this record
    pub record_id: String,

    /// ISO 8601 timestamp
    pub timestamp: String,

    /// Path of the signed enclave image
    pub enclave_path: String,

    /// SHA-256 of the enclave image, when it could be read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclave_sha256: Option<String>,

    pub env: EnvironmentInfo,

    pub provider: ProviderInfo,

    pub config: RunConfig,

    /// Elapsed time of the warm-up call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warmup_ns: Option<u64>,

    pub operations: Vec<OperationRecord>,

    /// Command line arguments used
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cli_args: Vec<String>,
}

impl BenchRecord {
    /// Create a new BenchRecord with required fields
    pub fn new(
        enclave_path: String,
        env: EnvironmentInfo,
        provider: ProviderInfo,
        config: RunConfig,
    ) -> Self {
        let timestamp = crate::now_string();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let stamp: String = timestamp.chars().take(19).filter(|c| c.is_ascii_digit()).collect();
        let record_id = format!("{:x}-{}", nanos, stamp);

        BenchRecord {
            schema_version: SCHEMA_VERSION,
            record_id,
            timestamp,
            enclave_path,
            enclave_sha256: None,
            env,
            provider,
            config,
            warmup_ns: None,
            operations: Vec::new(),
            cli_args: Vec::new(),
        }
    }

    /// Build a record from a completed run.
    pub fn from_outcome(outcome: &RunOutcome, config: &BenchConfig, env: EnvironmentInfo) -> Self {
        let mut record = BenchRecord::new(
            outcome.enclave.to_string_lossy().to_string(),
            env,
            outcome.provider.clone(),
            RunConfig::from(config),
        );
        record.warmup_ns = outcome.warmup_ns;
        record.operations = outcome
            .operations
            .iter()
            .map(|s| OperationRecord {
                kind: s.kind,
                entry_point: s.kind.entry_point().to_string(),
                iterations: s.iterations,
                failures: s.failures,
                average_ns: s.average_ns,
                stats: s.stats.clone(),
                samples_ns: s.samples_ns.clone(),
            })
            .collect();
        record
    }

    pub fn operation(&self, kind: OperationKind) -> Option<&OperationRecord> {
        self.operations.iter().find(|o| o.kind == kind)
    }
}
