//! Benchmark driver: enclave session lifecycle and the timed call loop.
//!
//! A run loads the enclave once, issues one untimed warm-up call, then
//! times every configured operation and writes one report line per
//! operation. The enclave is destroyed exactly once at the end, whether or
//! not individual calls failed.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::schema::TimingStat;
use crate::provider::{EnclaveHandle, ExecutionProvider, OperationKind, ProviderInfo};
use crate::status::{SgxStatus, write_error_message};
use crate::{BenchError, BenchResult};

use super::clock::Clock;
use super::config::{BenchConfig, OperationPlan};

pub const BANNER: &str = "Intel(R) Deep Neural Network Library (DNNL)";
pub const EXIT_PROMPT: &str = "Enter a character before exit ...";

fn out_err(e: io::Error) -> BenchError {
    BenchError::Message(format!("failed to write report: {e}"))
}

fn as_nanos(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

/// A loaded enclave. Unloads on `close` or drop, never twice.
pub struct EnclaveSession<'p> {
    provider: &'p dyn ExecutionProvider,
    handle: Option<EnclaveHandle>,
}

impl<'p> EnclaveSession<'p> {
    pub fn open(provider: &'p dyn ExecutionProvider, path: &Path, debug: bool) -> BenchResult<Self> {
        let handle = provider
            .load(path, debug)
            .map_err(|status| BenchError::Load { path: path.to_path_buf(), status })?;
        info!(%handle, path = %path.display(), "enclave loaded");
        Ok(EnclaveSession { provider, handle: Some(handle) })
    }

    pub fn handle(&self) -> Option<EnclaveHandle> {
        self.handle
    }

    pub fn call(&self, kind: OperationKind) -> BenchResult<i32> {
        let handle = self
            .handle
            .ok_or(BenchError::Call { kind, status: SgxStatus::INVALID_ENCLAVE_ID })?;
        self.provider.call(handle, kind).map_err(|status| BenchError::Call { kind, status })
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            match self.provider.unload(handle) {
                Ok(()) => info!(%handle, "enclave destroyed"),
                Err(status) => warn!(%handle, %status, "failed to destroy enclave"),
            }
        }
    }
}

impl Drop for EnclaveSession<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Timing results for one operation kind.
#[derive(Debug, Clone)]
pub struct OperationSummary {
    pub kind: OperationKind,
    pub iterations: u32,
    pub failures: u32,
    /// Elapsed time of each successful call, in call order.
    pub samples_ns: Vec<u64>,
    /// Sum of `elapsed / iterations` over successful calls. Failed calls
    /// add nothing but still count in the divisor.
    pub average_ns: u64,
    pub stats: TimingStat,
}

impl OperationSummary {
    pub fn report_line(&self) -> String {
        format!("{} = {}[nanoseconds]", self.kind.label(), self.average_ns)
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub provider: ProviderInfo,
    pub enclave: PathBuf,
    pub warmup: OperationKind,
    /// Elapsed time of the warm-up call, if it succeeded.
    pub warmup_ns: Option<u64>,
    pub operations: Vec<OperationSummary>,
}

/// Times `plan.iterations` calls of `plan.kind`.
///
/// Failed calls are reported on `out` through the status table and the
/// loop carries on.
pub fn measure_operation<W: Write + ?Sized>(
    session: &EnclaveSession<'_>,
    plan: &OperationPlan,
    clock: &dyn Clock,
    out: &mut W,
) -> BenchResult<OperationSummary> {
    let divisor = u64::from(plan.iterations.max(1));
    let mut samples_ns = Vec::new();
    let mut average_ns: u64 = 0;
    let mut failures = 0;

    for i in 0..plan.iterations {
        let start = clock.now();
        let result = session.call(plan.kind);
        let elapsed = as_nanos(clock.now().saturating_sub(start));
        match result {
            Ok(retval) => {
                debug!(kind = %plan.kind, iteration = i, elapsed_ns = elapsed, retval, "sample");
                average_ns += elapsed / divisor;
                samples_ns.push(elapsed);
            }
            Err(BenchError::Call { status, .. }) => {
                warn!(kind = %plan.kind, iteration = i, %status, "call failed");
                write_error_message(out, status).map_err(out_err)?;
                failures += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(OperationSummary {
        kind: plan.kind,
        iterations: plan.iterations,
        failures,
        stats: TimingStat::from_samples(&samples_ns),
        samples_ns,
        average_ns,
    })
}

/// Runs the whole benchmark against `provider`, writing the report to `out`.
///
/// A load failure is printed on `out` and returned as `BenchError::Load`
/// before any call is issued.
pub fn run_benchmark<W: Write + ?Sized>(
    provider: &dyn ExecutionProvider,
    config: &BenchConfig,
    clock: &dyn Clock,
    out: &mut W,
) -> BenchResult<RunOutcome> {
    config.validate()?;

    let session = match EnclaveSession::open(provider, &config.enclave, config.debug) {
        Ok(s) => s,
        Err(e) => {
            if let BenchError::Load { status, .. } = &e {
                write_error_message(out, *status).map_err(out_err)?;
            }
            return Err(e);
        }
    };

    writeln!(out, "{}", BANNER).map_err(out_err)?;

    // The first call loads resources inside the enclave; keep it out of the numbers.
    let start = clock.now();
    let warmup_ns = match session.call(config.warmup) {
        Ok(_) => Some(as_nanos(clock.now().saturating_sub(start))),
        Err(e) => {
            warn!(kind = %config.warmup, error = %e, "warm-up call failed");
            None
        }
    };
    info!(kind = %config.warmup, ?warmup_ns, "warm-up done");

    let mut operations = Vec::with_capacity(config.operations.len());
    for plan in &config.operations {
        let summary = measure_operation(&session, plan, clock, out)?;
        writeln!(out, "{}", summary.report_line()).map_err(out_err)?;
        info!(
            kind = %summary.kind,
            average_ns = summary.average_ns,
            failures = summary.failures,
            "operation measured"
        );
        operations.push(summary);
    }

    session.close();

    Ok(RunOutcome {
        provider: provider.info(),
        enclave: config.enclave.clone(),
        warmup: config.warmup,
        warmup_ns,
        operations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::clock::ManualClock;
    use crate::provider::{MockConfig, MockProvider, ProviderEvent};
    use std::time::Duration;

    fn plan(kind: OperationKind, iterations: u32) -> OperationPlan {
        OperationPlan { kind, iterations }
    }

    #[test]
    fn test_session_unloads_once_on_close() {
        let provider = MockProvider::default_mock();
        let session = EnclaveSession::open(&provider, Path::new("e.so"), true).unwrap();
        assert!(session.handle().is_some());
        session.close();
        assert_eq!(provider.unload_count(), 1);
    }

    #[test]
    fn test_session_unloads_on_drop() {
        let provider = MockProvider::default_mock();
        {
            let _session = EnclaveSession::open(&provider, Path::new("e.so"), true).unwrap();
        }
        assert_eq!(provider.unload_count(), 1);
    }

    #[test]
    fn test_session_open_failure_does_not_unload() {
        let provider =
            MockProvider::new(MockConfig::new("mock").load_fails(SgxStatus::INVALID_SIGNATURE));
        let err = EnclaveSession::open(&provider, Path::new("e.so"), true).err().unwrap();
        assert!(matches!(err, BenchError::Load { status: SgxStatus::INVALID_SIGNATURE, .. }));
        assert_eq!(provider.unload_count(), 0);
    }

    #[test]
    fn test_measure_fixed_duration() {
        let clock = ManualClock::new();
        let provider = MockProvider::new(
            MockConfig::new("mock")
                .with_duration(OperationKind::Inference, Duration::from_nanos(1_000))
                .with_clock(clock.clone()),
        );
        let session = EnclaveSession::open(&provider, Path::new("e.so"), true).unwrap();
        let mut out = Vec::new();
        let summary =
            measure_operation(&session, &plan(OperationKind::Inference, 5), &clock, &mut out)
                .unwrap();
        assert_eq!(summary.average_ns, 1_000);
        assert_eq!(summary.samples_ns, vec![1_000; 5]);
        assert_eq!(summary.failures, 0);
        assert_eq!(summary.report_line(), "Inference time = 1000[nanoseconds]");
        assert!(out.is_empty());
    }

    #[test]
    fn test_failed_sample_still_counts_in_divisor() {
        let clock = ManualClock::new();
        let provider = MockProvider::new(
            MockConfig::new("mock")
                .with_duration(OperationKind::Training, Duration::from_nanos(1_000))
                .fails_nth(OperationKind::Training, 2, SgxStatus::OUT_OF_EPC)
                .with_clock(clock.clone()),
        );
        let session = EnclaveSession::open(&provider, Path::new("e.so"), true).unwrap();
        let mut out = Vec::new();
        let summary =
            measure_operation(&session, &plan(OperationKind::Training, 5), &clock, &mut out)
                .unwrap();
        // 4 successes of 1000ns, each contributing 1000 / 5.
        assert_eq!(summary.average_ns, 800);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.samples_ns.len(), 4);
        assert_eq!(summary.stats.mean_ns, 1_000);
        assert_eq!(String::from_utf8(out).unwrap(), "Error: Out of EPC memory.\n");
    }

    #[test]
    fn test_average_uses_per_sample_integer_division() {
        let clock = ManualClock::new();
        let provider = MockProvider::new(
            MockConfig::new("mock")
                .with_duration(OperationKind::Inference, Duration::from_nanos(7))
                .with_clock(clock.clone()),
        );
        let session = EnclaveSession::open(&provider, Path::new("e.so"), true).unwrap();
        let summary = measure_operation(
            &session,
            &plan(OperationKind::Inference, 3),
            &clock,
            &mut io::sink(),
        )
        .unwrap();
        // 7 / 3 == 2 per sample, truncated before summing.
        assert_eq!(summary.average_ns, 6);
    }

    #[test]
    fn test_run_issues_warmup_then_ordered_calls() {
        let provider = MockProvider::default_mock();
        let clock = ManualClock::new();
        let mut out = Vec::new();
        let outcome = run_benchmark(&provider, &BenchConfig::default(), &clock, &mut out).unwrap();

        let mut expected = vec![OperationKind::Training];
        for kind in OperationKind::BENCH_ORDER {
            expected.extend(std::iter::repeat_n(kind, 5));
        }
        assert_eq!(provider.calls(), expected);
        assert_eq!(outcome.operations.len(), 3);
        assert_eq!(outcome.warmup_ns, Some(0));

        let events = provider.events();
        assert!(matches!(events.first(), Some(ProviderEvent::Load { debug: true, .. })));
        assert!(matches!(events.last(), Some(ProviderEvent::Unload(_))));
        assert_eq!(provider.unload_count(), 1);
    }

    #[test]
    fn test_warmup_failure_is_not_reported_on_stdout() {
        let provider = MockProvider::new(
            MockConfig::new("mock").fails_nth(OperationKind::Training, 0, SgxStatus::UNEXPECTED),
        );
        let clock = ManualClock::new();
        let mut out = Vec::new();
        let outcome = run_benchmark(&provider, &BenchConfig::default(), &clock, &mut out).unwrap();
        assert!(outcome.warmup_ns.is_none());
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("Error:"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_run_rejects_invalid_config_before_loading() {
        let provider = MockProvider::default_mock();
        let cfg = BenchConfig::default().with_iterations(0);
        let err = run_benchmark(&provider, &cfg, &ManualClock::new(), &mut io::sink()).unwrap_err();
        assert!(matches!(err, BenchError::Message(_)));
        assert!(provider.events().is_empty());
    }

    #[test]
    fn test_oversized_plan_rejected_before_loading() {
        let provider = MockProvider::default_mock();
        let cfg = BenchConfig {
            operations: vec![plan(OperationKind::Inference, u32::MAX)],
            ..BenchConfig::default()
        };
        let err = run_benchmark(&provider, &cfg, &ManualClock::new(), &mut io::sink()).unwrap_err();
        assert!(err.to_string().contains("at most"));
        assert!(provider.events().is_empty());
    }

    #[test]
    fn test_samples_grow_only_with_successes() {
        let provider = MockProvider::new(
            MockConfig::new("mock").fails(OperationKind::Inference, SgxStatus::ENCLAVE_LOST),
        );
        let session = EnclaveSession::open(&provider, Path::new("e.so"), true).unwrap();
        let summary = measure_operation(
            &session,
            &plan(OperationKind::Inference, 1_000),
            &ManualClock::new(),
            &mut io::sink(),
        )
        .unwrap();
        assert_eq!(summary.failures, 1_000);
        assert_eq!(summary.samples_ns.capacity(), 0);
    }
}
