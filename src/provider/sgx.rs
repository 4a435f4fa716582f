//! Provider backed by the Intel SGX untrusted runtime.
//!
//! The ECALL stubs come from the edger8r-generated untrusted bridge for
//! the DNNL sample enclave; `build.rs` links it together with `sgx_urts`.

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use tracing::{debug, info};

use crate::status::SgxStatus;

use super::traits::{EnclaveHandle, ExecutionProvider, OperationKind, ProviderInfo, ProviderResult};

unsafe extern "C" {
    fn sgx_create_enclave(
        file_name: *const c_char, debug: c_int, launch_token: *mut c_void,
        launch_token_updated: *mut c_int, enclave_id: *mut u64, misc_attr: *mut c_void,
    ) -> SgxStatus;
    fn sgx_destroy_enclave(enclave_id: u64) -> SgxStatus;

    fn cnn_training_f32_cpp(eid: u64, retval: *mut c_int) -> SgxStatus;
    fn cnn_inference_f32_cpp(eid: u64, retval: *mut c_int) -> SgxStatus;
    fn cpu_rnn_inference_f32_cpp(eid: u64, retval: *mut c_int) -> SgxStatus;
}

/// OCALL used by the enclave to print text on the host's stdout.
///
/// The bridge has already bounded and NUL-terminated `s`.
#[unsafe(no_mangle)]
pub extern "C" fn ocall_print_string(s: *const c_char) {
    if s.is_null() {
        return;
    }
    let text = unsafe { CStr::from_ptr(s) };
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(text.to_bytes());
    let _ = stdout.flush();
}

/// Hardware or simulation SGX provider, depending on which runtime
/// library the binary was linked against.
#[derive(Debug, Default)]
pub struct SgxProvider;

impl SgxProvider {
    pub fn new() -> Self {
        SgxProvider
    }
}

impl ExecutionProvider for SgxProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo { name: "sgx".to_string(), mode: option_env!("SGX_MODE").map(str::to_string) }
    }

    fn load(&self, path: &Path, debug: bool) -> ProviderResult<EnclaveHandle> {
        let c_path =
            CString::new(path.as_os_str().as_bytes()).map_err(|_| SgxStatus::INVALID_PARAMETER)?;
        let mut eid: u64 = 0;
        info!(path = %path.display(), debug, "creating enclave");
        let status = unsafe {
            sgx_create_enclave(
                c_path.as_ptr(),
                c_int::from(debug),
                ptr::null_mut(),
                ptr::null_mut(),
                &mut eid,
                ptr::null_mut(),
            )
        };
        status.into_result()?;
        Ok(EnclaveHandle(eid))
    }

    fn call(&self, handle: EnclaveHandle, kind: OperationKind) -> ProviderResult<i32> {
        let mut retval: c_int = 0;
        let status = unsafe {
            match kind {
                OperationKind::Training => cnn_training_f32_cpp(handle.0, &mut retval),
                OperationKind::Inference => cnn_inference_f32_cpp(handle.0, &mut retval),
                OperationKind::ParallelInference => cpu_rnn_inference_f32_cpp(handle.0, &mut retval),
            }
        };
        debug!(%handle, ecall = kind.entry_point(), %status, retval, "ecall returned");
        status.into_result()?;
        Ok(retval)
    }

    fn unload(&self, handle: EnclaveHandle) -> ProviderResult<()> {
        info!(%handle, "destroying enclave");
        unsafe { sgx_destroy_enclave(handle.0) }.into_result()
    }
}
