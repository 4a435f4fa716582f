#![cfg_attr(not(feature = "sgx"), forbid(unsafe_code))]

pub mod bench;
pub mod core;
pub mod provider;
pub mod status;
pub mod storage;

use std::path::PathBuf;

use thiserror::Error;

use crate::provider::OperationKind;
use crate::status::SgxStatus;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("{0}")]
    Message(String),
    #[error("failed to load enclave {}: {status}", .path.display())]
    Load { path: PathBuf, status: SgxStatus },
    #[error("{} call failed: {status}", .kind.entry_point())]
    Call { kind: OperationKind, status: SgxStatus },
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl BenchError {
    /// Process exit code for this error: -1 when the enclave could not be
    /// loaded, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            BenchError::Load { .. } => -1,
            _ => 1,
        }
    }
}

pub type BenchResult<T> = Result<T, BenchError>;

pub(crate) fn now_string() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".to_string())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha256::digest;
    digest(bytes)
}
