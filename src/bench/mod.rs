//! Config-driven benchmarking of enclave entry points.

pub mod clock;
pub mod config;
pub mod driver;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{
    BenchConfig, MAX_ITERATIONS, OperationPlan, load_bench_config, parse_bench_config,
};
pub use driver::{
    BANNER, EXIT_PROMPT, EnclaveSession, OperationSummary, RunOutcome, measure_operation,
    run_benchmark,
};
