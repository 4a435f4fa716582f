use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=SGX_SDK");
    println!("cargo:rerun-if-env-changed=SGX_MODE");
    println!("cargo:rerun-if-env-changed=ENCLAVE_U_LIB_DIR");

    if env::var_os("CARGO_FEATURE_SGX").is_none() {
        return;
    }

    let sdk = env::var("SGX_SDK").unwrap_or_else(|_| "/opt/intel/sgxsdk".to_string());
    let sim = env::var("SGX_MODE").map(|m| m.eq_ignore_ascii_case("SIM")).unwrap_or(false);
    let mode = if sim { "SIM" } else { "HW" };

    // Untrusted bridge generated by sgx_edger8r from the enclave's EDL and
    // compiled to libenclave_u.a next to the enclave build.
    let bridge_dir = env::var("ENCLAVE_U_LIB_DIR").unwrap_or_else(|_| "App".to_string());
    println!("cargo:rustc-link-search=native={}", bridge_dir);
    println!("cargo:rustc-link-lib=static=enclave_u");

    println!("cargo:rustc-link-search=native={}/lib64", sdk);
    if sim {
        println!("cargo:rustc-link-lib=dylib=sgx_urts_sim");
        println!("cargo:rustc-link-lib=dylib=sgx_uae_service_sim");
    } else {
        println!("cargo:rustc-link-lib=dylib=sgx_urts");
        println!("cargo:rustc-link-lib=dylib=sgx_uae_service");
    }
    println!("cargo:rustc-env=SGX_MODE={}", mode);
}
