//! Execution providers: the boundary between the driver and the enclave runtime.

pub mod mock;
#[cfg(feature = "sgx")]
pub mod sgx;
pub mod traits;

pub use mock::{MockConfig, MockProvider, ProviderEvent};
#[cfg(feature = "sgx")]
pub use sgx::SgxProvider;
pub use traits::{EnclaveHandle, ExecutionProvider, OperationKind, ProviderInfo, ProviderResult};
