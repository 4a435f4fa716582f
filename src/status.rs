//! SGX status codes and the table of user-facing messages for them.
//!
//! The table is a `static` slice built at compile time and searched
//! linearly; it never changes for the lifetime of the process.

use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Status returned by the SGX untrusted runtime (`sgx_status_t`).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SgxStatus(pub u32);

impl SgxStatus {
    pub const SUCCESS: SgxStatus = SgxStatus(0x0000);

    pub const UNEXPECTED: SgxStatus = SgxStatus(0x0001);
    pub const INVALID_PARAMETER: SgxStatus = SgxStatus(0x0002);
    pub const OUT_OF_MEMORY: SgxStatus = SgxStatus(0x0003);
    pub const ENCLAVE_LOST: SgxStatus = SgxStatus(0x0004);

    pub const INVALID_ENCLAVE: SgxStatus = SgxStatus(0x2001);
    pub const INVALID_ENCLAVE_ID: SgxStatus = SgxStatus(0x2002);
    pub const INVALID_SIGNATURE: SgxStatus = SgxStatus(0x2003);
    pub const OUT_OF_EPC: SgxStatus = SgxStatus(0x2005);
    pub const NO_DEVICE: SgxStatus = SgxStatus(0x2006);
    pub const MEMORY_MAP_CONFLICT: SgxStatus = SgxStatus(0x2007);
    pub const INVALID_ATTRIBUTE: SgxStatus = SgxStatus(0x2008);
    pub const INVALID_METADATA: SgxStatus = SgxStatus(0x2009);
    pub const DEVICE_BUSY: SgxStatus = SgxStatus(0x200c);
    pub const INVALID_VERSION: SgxStatus = SgxStatus(0x200d);
    pub const ENCLAVE_FILE_ACCESS: SgxStatus = SgxStatus(0x200f);

    pub fn is_success(self) -> bool {
        self == SgxStatus::SUCCESS
    }

    /// Converts a raw runtime status into a `Result`.
    pub fn into_result(self) -> Result<(), SgxStatus> {
        if self.is_success() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for SgxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// A message and an optional remediation hint registered for a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEntry {
    pub code: SgxStatus,
    pub message: &'static str,
    pub hint: Option<&'static str>,
}

const fn entry(code: SgxStatus, message: &'static str, hint: Option<&'static str>) -> ErrorEntry {
    ErrorEntry { code, message, hint }
}

/// Errors that `sgx_create_enclave` and the ECALL bridges may return.
pub static ERROR_TABLE: &[ErrorEntry] = &[
    entry(SgxStatus::UNEXPECTED, "Unexpected error occurred.", None),
    entry(SgxStatus::INVALID_PARAMETER, "Invalid parameter.", None),
    entry(SgxStatus::OUT_OF_MEMORY, "Out of memory.", None),
    entry(
        SgxStatus::ENCLAVE_LOST,
        "Power transition occurred.",
        Some("Please refer to the sample \"PowerTransition\" for details."),
    ),
    entry(SgxStatus::INVALID_ENCLAVE, "Invalid enclave image.", None),
    entry(SgxStatus::INVALID_ENCLAVE_ID, "Invalid enclave identification.", None),
    entry(SgxStatus::INVALID_SIGNATURE, "Invalid enclave signature.", None),
    entry(SgxStatus::OUT_OF_EPC, "Out of EPC memory.", None),
    entry(
        SgxStatus::NO_DEVICE,
        "Invalid SGX device.",
        Some("Please make sure SGX module is enabled in the BIOS, and install SGX driver afterwards."),
    ),
    entry(SgxStatus::MEMORY_MAP_CONFLICT, "Memory map conflicted.", None),
    entry(SgxStatus::INVALID_METADATA, "Invalid enclave metadata.", None),
    entry(SgxStatus::DEVICE_BUSY, "SGX device was busy.", None),
    entry(SgxStatus::INVALID_VERSION, "Enclave version was invalid.", None),
    entry(SgxStatus::INVALID_ATTRIBUTE, "Enclave was not authorized.", None),
    entry(SgxStatus::ENCLAVE_FILE_ACCESS, "Can't open enclave file.", None),
];

/// Finds the table entry for `code`, if one is registered.
pub fn lookup(code: SgxStatus) -> Option<&'static ErrorEntry> {
    ERROR_TABLE.iter().find(|e| e.code == code)
}

/// Writes the user-facing description of `code` to `out`.
///
/// Known codes print the hint (if any) as `Info:` followed by the
/// `Error:` line. Unknown codes print the raw value and point at the SDK
/// reference instead.
pub fn write_error_message<W: Write + ?Sized>(out: &mut W, code: SgxStatus) -> io::Result<()> {
    match lookup(code) {
        Some(e) => {
            if let Some(hint) = e.hint {
                writeln!(out, "Info: {}", hint)?;
            }
            writeln!(out, "Error: {}", e.message)
        }
        None => writeln!(
            out,
            "Error code is {}. Please refer to the \"Intel SGX SDK Developer Reference\" for more details.",
            code
        ),
    }
}
