//! Environment detection utilities for benchmark records.

use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};

/// Device nodes exposed by the in-kernel and out-of-tree SGX drivers.
const SGX_DEVICE_NODES: &[&str] = &["/dev/sgx_enclave", "/dev/sgx/enclave", "/dev/isgx"];
const AESM_SOCKET: &str = "/var/run/aesmd/aesm.socket";

/// Environment information for benchmark reproducibility
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ram_bytes: Option<u64>,

    pub os: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,

    /// First SGX device node found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sgx_device: Option<String>,

    /// Whether the AESM service socket is present
    pub aesm_available: bool,

    /// `SGX_SDK` of the running process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sgx_sdk: Option<String>,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        EnvironmentInfo {
            cpu_model: None,
            cpu_cores: None,
            total_ram_bytes: None,
            os: std::env::consts::OS.to_string(),
            hostname: None,
            git_sha: None,
            sgx_device: None,
            aesm_available: false,
            sgx_sdk: None,
        }
    }
}

impl EnvironmentInfo {
    /// Detect environment information from the current system
    pub fn detect() -> Self {
        use sysinfo::System;

        let mut sys = System::new_all();
        sys.refresh_all();

        EnvironmentInfo {
            cpu_model: sys.cpus().first().map(|c| c.brand().to_string()),
            cpu_cores: sys.physical_core_count().map(|c| c as u32),
            total_ram_bytes: Some(sys.total_memory()),
            os: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            hostname: System::host_name(),
            git_sha: detect_git_sha(),
            sgx_device: detect_sgx_device(),
            aesm_available: Path::new(AESM_SOCKET).exists(),
            sgx_sdk: std::env::var("SGX_SDK").ok().filter(|s| !s.is_empty()),
        }
    }
}

/// Detect git SHA from `git rev-parse HEAD`
fn detect_git_sha() -> Option<String> {
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn detect_sgx_device() -> Option<String> {
    SGX_DEVICE_NODES
        .iter()
        .find(|p| Path::new(p).exists())
        .map(|p| p.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detect_has_os() {
        let env = EnvironmentInfo::detect();
        assert!(!env.os.is_empty());
    }

    #[test]
    fn test_environment_default() {
        let env = EnvironmentInfo::default();
        assert!(!env.os.is_empty());
        assert!(env.cpu_model.is_none());
        assert!(env.sgx_device.is_none());
    }

    #[test]
    fn test_detected_sgx_device_is_a_known_node() {
        if let Some(dev) = detect_sgx_device() {
            assert!(SGX_DEVICE_NODES.contains(&dev.as_str()));
        }
    }
}
