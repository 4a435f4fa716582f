//! Execution provider trait and the types that cross the enclave boundary.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::status::SgxStatus;

/// Result of a provider operation; the error is the runtime status.
pub type ProviderResult<T> = Result<T, SgxStatus>;

/// Opaque identifier of a loaded enclave (`sgx_enclave_id_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnclaveHandle(pub u64);

impl fmt::Display for EnclaveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "eid:{}", self.0)
    }
}

/// The enclave entry points this harness knows how to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Training,
    Inference,
    ParallelInference,
}

impl OperationKind {
    /// Default benchmarking order of the entry points.
    pub const BENCH_ORDER: [OperationKind; 3] = [
        OperationKind::Inference,
        OperationKind::Training,
        OperationKind::ParallelInference,
    ];

    /// Name of the ECALL behind this operation.
    pub fn entry_point(self) -> &'static str {
        match self {
            OperationKind::Training => "cnn_training_f32_cpp",
            OperationKind::Inference => "cnn_inference_f32_cpp",
            OperationKind::ParallelInference => "cpu_rnn_inference_f32_cpp",
        }
    }

    /// Label used in the human-readable report line.
    pub fn label(self) -> &'static str {
        match self {
            OperationKind::Training => "Training time",
            OperationKind::Inference => "Inference time",
            OperationKind::ParallelInference => "Inference time in parallel",
        }
    }

    /// Short name used in records and config files.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Training => "training",
            OperationKind::Inference => "inference",
            OperationKind::ParallelInference => "parallel-inference",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive information about a provider, recorded with each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

/// Boundary to an isolated execution runtime.
///
/// Implementations load a signed enclave image, dispatch ECALLs into it
/// and tear it down again. How calls are marshalled and how isolation is
/// enforced is entirely the provider's business.
pub trait ExecutionProvider {
    /// Returns name and mode of this provider.
    fn info(&self) -> ProviderInfo;

    /// Loads the signed image at `path`.
    ///
    /// # Arguments
    /// * `path` - Path to the signed enclave shared object
    /// * `debug` - Launch the enclave in debug mode
    fn load(&self, path: &Path, debug: bool) -> ProviderResult<EnclaveHandle>;

    /// Invokes the entry point for `kind` and returns the ECALL's own
    /// return value. The error is the runtime status of the transition.
    fn call(&self, handle: EnclaveHandle, kind: OperationKind) -> ProviderResult<i32>;

    /// Destroys the enclave. The handle must not be used afterwards.
    fn unload(&self, handle: EnclaveHandle) -> ProviderResult<()>;
}
