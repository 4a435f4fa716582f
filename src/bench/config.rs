use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::provider::OperationKind;
use crate::{BenchError, BenchResult};

/// Image loaded when nothing else is configured, relative to the working directory.
pub const DEFAULT_ENCLAVE: &str = "libenclave.signed.so";
/// Timed calls per operation unless configured otherwise.
pub const DEFAULT_ITERATIONS: u32 = 5;
/// Upper bound on timed calls per operation.
pub const MAX_ITERATIONS: u32 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPlan {
    pub kind: OperationKind,
    pub iterations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchConfig {
    pub enclave: PathBuf,
    pub debug: bool,
    /// Untimed call issued once before measuring.
    pub warmup: OperationKind,
    pub operations: Vec<OperationPlan>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            enclave: PathBuf::from(DEFAULT_ENCLAVE),
            debug: true,
            warmup: OperationKind::Training,
            operations: OperationKind::BENCH_ORDER
                .iter()
                .map(|&kind| OperationPlan { kind, iterations: DEFAULT_ITERATIONS })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    enclave: Option<PathBuf>,
    #[serde(default)]
    debug: Option<bool>,
    #[serde(default)]
    warmup: Option<OperationKind>,
    #[serde(default, rename = "operation")]
    operations: Option<Vec<RawOperation>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOperation {
    kind: OperationKind,
    #[serde(default)]
    iterations: Option<u32>,
}

impl BenchConfig {
    /// Overrides the iteration count of every operation.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        for op in &mut self.operations {
            op.iterations = iterations;
        }
        self
    }

    pub fn with_enclave(mut self, enclave: impl Into<PathBuf>) -> Self {
        self.enclave = enclave.into();
        self
    }

    pub fn validate(&self) -> BenchResult<()> {
        for op in &self.operations {
            if op.iterations == 0 {
                return Err(BenchError::Message(format!(
                    "operation '{}' must have at least one iteration",
                    op.kind
                )));
            }
            if op.iterations > MAX_ITERATIONS {
                return Err(BenchError::Message(format!(
                    "operation '{}' asks for {} iterations, at most {MAX_ITERATIONS} are allowed",
                    op.kind, op.iterations
                )));
            }
        }
        Ok(())
    }
}

/// Parses a TOML benchmark plan. Keys left out keep their defaults.
pub fn parse_bench_config(s: &str) -> BenchResult<BenchConfig> {
    let raw: RawConfig = toml::from_str(s).map_err(|e| BenchError::Message(e.to_string()))?;
    let defaults = BenchConfig::default();
    let operations = match raw.operations {
        Some(list) => list
            .into_iter()
            .map(|op| OperationPlan {
                kind: op.kind,
                iterations: op.iterations.unwrap_or(DEFAULT_ITERATIONS),
            })
            .collect(),
        None => defaults.operations,
    };
    let cfg = BenchConfig {
        enclave: raw.enclave.unwrap_or(defaults.enclave),
        debug: raw.debug.unwrap_or(defaults.debug),
        warmup: raw.warmup.unwrap_or(defaults.warmup),
        operations,
    };
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_bench_config(path: &Path) -> BenchResult<BenchConfig> {
    let s = std::fs::read_to_string(path).map_err(|e| BenchError::Message(e.to_string()))?;
    parse_bench_config(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan() {
        let cfg = BenchConfig::default();
        assert_eq!(cfg.enclave, PathBuf::from("libenclave.signed.so"));
        assert!(cfg.debug);
        assert_eq!(cfg.warmup, OperationKind::Training);
        let kinds: Vec<_> = cfg.operations.iter().map(|o| o.kind).collect();
        assert_eq!(kinds, OperationKind::BENCH_ORDER);
        assert!(cfg.operations.iter().all(|o| o.iterations == 5));
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        assert_eq!(parse_bench_config("").unwrap(), BenchConfig::default());
    }

    #[test]
    fn test_parse_operations() {
        let cfg = parse_bench_config(
            r#"
enclave = "/opt/dnnl/enclave.signed.so"
debug = false

[[operation]]
kind = "parallel-inference"
iterations = 10

[[operation]]
kind = "training"
"#,
        )
        .unwrap();
        assert_eq!(cfg.enclave, PathBuf::from("/opt/dnnl/enclave.signed.so"));
        assert!(!cfg.debug);
        assert_eq!(cfg.warmup, OperationKind::Training);
        assert_eq!(
            cfg.operations,
            vec![
                OperationPlan { kind: OperationKind::ParallelInference, iterations: 10 },
                OperationPlan { kind: OperationKind::Training, iterations: 5 },
            ]
        );
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let err = parse_bench_config("[[operation]]\nkind = \"inference\"\niterations = 0\n")
            .unwrap_err();
        assert!(err.to_string().contains("at least one iteration"));
    }

    #[test]
    fn test_iteration_ceiling() {
        let at_limit = format!("[[operation]]\nkind = \"training\"\niterations = {MAX_ITERATIONS}\n");
        assert!(parse_bench_config(&at_limit).is_ok());

        let err = parse_bench_config("[[operation]]\nkind = \"training\"\niterations = 4294967295\n")
            .unwrap_err();
        assert!(err.to_string().contains("at most 1000000"));

        assert!(BenchConfig::default().with_iterations(u32::MAX).validate().is_err());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(parse_bench_config("[[operation]]\nkind = \"pooling\"\n").is_err());
    }

    #[test]
    fn test_with_iterations_overrides_all() {
        let cfg = BenchConfig::default().with_iterations(2);
        assert!(cfg.operations.iter().all(|o| o.iterations == 2));
    }
}
