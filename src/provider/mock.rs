//! Mock provider for testing and dry runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::bench::clock::ManualClock;
use crate::status::SgxStatus;

use super::traits::{EnclaveHandle, ExecutionProvider, OperationKind, ProviderInfo, ProviderResult};

/// A call that should fail with `status`.
///
/// `call_index` counts calls of `kind` from zero, including the warm-up
/// call. `None` fails every call of that kind.
#[derive(Debug, Clone)]
pub struct ScheduledFailure {
    pub kind: OperationKind,
    pub call_index: Option<usize>,
    pub status: SgxStatus,
}

/// Configuration for mock provider responses.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Name to report
    pub name: String,
    /// Status returned by `load` instead of a handle
    pub load_status: Option<SgxStatus>,
    /// Synthetic duration of each call, per kind
    pub call_durations: HashMap<OperationKind, Duration>,
    /// Calls that should fail
    pub failures: Vec<ScheduledFailure>,
    /// Value every successful call returns
    pub retval: i32,
    /// Clock advanced by the synthetic durations
    pub clock: Option<ManualClock>,
}

impl MockConfig {
    /// Create a new mock config with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        MockConfig { name: name.into(), ..Default::default() }
    }

    /// Make `load` fail with `status`.
    pub fn load_fails(mut self, status: SgxStatus) -> Self {
        self.load_status = Some(status);
        self
    }

    /// Make every call of `kind` fail with `status`.
    pub fn fails(mut self, kind: OperationKind, status: SgxStatus) -> Self {
        self.failures.push(ScheduledFailure { kind, call_index: None, status });
        self
    }

    /// Make the `n`th call of `kind` fail with `status`.
    pub fn fails_nth(mut self, kind: OperationKind, n: usize, status: SgxStatus) -> Self {
        self.failures.push(ScheduledFailure { kind, call_index: Some(n), status });
        self
    }

    /// Set the synthetic duration of calls of `kind`.
    pub fn with_duration(mut self, kind: OperationKind, duration: Duration) -> Self {
        self.call_durations.insert(kind, duration);
        self
    }

    /// Set the same synthetic duration for every kind.
    pub fn with_duration_all(mut self, duration: Duration) -> Self {
        for kind in [OperationKind::Training, OperationKind::Inference, OperationKind::ParallelInference] {
            self.call_durations.insert(kind, duration);
        }
        self
    }

    /// Advance `clock` by the synthetic duration on every call.
    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }
}

/// Something the mock provider was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    Load { path: PathBuf, debug: bool },
    Call(OperationKind),
    Unload(EnclaveHandle),
}

/// Mock provider for unit testing.
///
/// Returns configurable results without touching any enclave runtime and
/// records every request in an event log.
pub struct MockProvider {
    config: MockConfig,
    events: Mutex<Vec<ProviderEvent>>,
}

const MOCK_EID: u64 = 0x2a;

impl MockProvider {
    /// Create a new mock provider with the given configuration.
    pub fn new(config: MockConfig) -> Self {
        MockProvider { config, events: Mutex::new(Vec::new()) }
    }

    /// Create a mock provider that succeeds everywhere instantly.
    pub fn default_mock() -> Self {
        Self::new(MockConfig::new("mock"))
    }

    /// Everything the provider was asked to do, in order.
    pub fn events(&self) -> Vec<ProviderEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Kinds of all calls issued, in order.
    pub fn calls(&self) -> Vec<OperationKind> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProviderEvent::Call(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    /// Number of `unload` requests received.
    pub fn unload_count(&self) -> usize {
        self.events().iter().filter(|e| matches!(e, ProviderEvent::Unload(_))).count()
    }

    fn record(&self, event: ProviderEvent) -> usize {
        let mut events = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let index = match &event {
            ProviderEvent::Call(kind) => events
                .iter()
                .filter(|e| matches!(e, ProviderEvent::Call(k) if k == kind))
                .count(),
            _ => 0,
        };
        events.push(event);
        index
    }

    fn scheduled_failure(&self, kind: OperationKind, index: usize) -> Option<SgxStatus> {
        self.config
            .failures
            .iter()
            .find(|f| f.kind == kind && f.call_index.is_none_or(|n| n == index))
            .map(|f| f.status)
    }
}

impl ExecutionProvider for MockProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo { name: self.config.name.clone(), mode: Some("mock".to_string()) }
    }

    fn load(&self, path: &Path, debug: bool) -> ProviderResult<EnclaveHandle> {
        self.record(ProviderEvent::Load { path: path.to_path_buf(), debug });
        match self.config.load_status {
            Some(status) => Err(status),
            None => Ok(EnclaveHandle(MOCK_EID)),
        }
    }

    fn call(&self, handle: EnclaveHandle, kind: OperationKind) -> ProviderResult<i32> {
        if handle != EnclaveHandle(MOCK_EID) {
            return Err(SgxStatus::INVALID_ENCLAVE_ID);
        }
        let index = self.record(ProviderEvent::Call(kind));
        if let (Some(clock), Some(d)) = (&self.config.clock, self.config.call_durations.get(&kind)) {
            clock.advance(*d);
        }
        match self.scheduled_failure(kind, index) {
            Some(status) => Err(status),
            None => Ok(self.config.retval),
        }
    }

    fn unload(&self, handle: EnclaveHandle) -> ProviderResult<()> {
        self.record(ProviderEvent::Unload(handle));
        if handle != EnclaveHandle(MOCK_EID) {
            return Err(SgxStatus::INVALID_ENCLAVE_ID);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::clock::Clock;

    #[test]
    fn test_mock_provider_default() {
        let provider = MockProvider::default_mock();
        assert_eq!(provider.info().name, "mock");
        let handle = provider.load(Path::new("enclave.so"), true).unwrap();
        assert_eq!(provider.call(handle, OperationKind::Training), Ok(0));
        assert!(provider.unload(handle).is_ok());
        assert_eq!(provider.unload_count(), 1);
    }

    #[test]
    fn test_mock_provider_load_fails() {
        let provider = MockProvider::new(MockConfig::new("mock").load_fails(SgxStatus::NO_DEVICE));
        let result = provider.load(Path::new("enclave.so"), true);
        assert_eq!(result, Err(SgxStatus::NO_DEVICE));
        assert_eq!(
            provider.events(),
            vec![ProviderEvent::Load { path: PathBuf::from("enclave.so"), debug: true }]
        );
    }

    #[test]
    fn test_mock_provider_fails_nth_call_only() {
        let provider = MockProvider::new(
            MockConfig::new("mock").fails_nth(OperationKind::Inference, 1, SgxStatus::OUT_OF_EPC),
        );
        let handle = provider.load(Path::new("x"), false).unwrap();
        assert!(provider.call(handle, OperationKind::Inference).is_ok());
        assert_eq!(provider.call(handle, OperationKind::Inference), Err(SgxStatus::OUT_OF_EPC));
        assert!(provider.call(handle, OperationKind::Inference).is_ok());
        assert!(provider.call(handle, OperationKind::Training).is_ok());
    }

    #[test]
    fn test_mock_provider_rejects_unknown_handle() {
        let provider = MockProvider::default_mock();
        assert_eq!(
            provider.call(EnclaveHandle(7), OperationKind::Training),
            Err(SgxStatus::INVALID_ENCLAVE_ID)
        );
        assert!(provider.calls().is_empty());
    }

    #[test]
    fn test_mock_provider_advances_clock() {
        let clock = ManualClock::new();
        let provider = MockProvider::new(
            MockConfig::new("mock")
                .with_duration(OperationKind::Training, Duration::from_micros(3))
                .with_clock(clock.clone()),
        );
        let handle = provider.load(Path::new("x"), true).unwrap();
        provider.call(handle, OperationKind::Training).unwrap();
        provider.call(handle, OperationKind::Inference).unwrap();
        assert_eq!(clock.now(), Duration::from_micros(3));
    }
}
