//! Core types and schemas for sgx-dnnl-bench.
//!
//! This module contains the `BenchRecord` schema (v1) written for every run.

pub mod env;
pub mod schema;

pub use env::EnvironmentInfo;
pub use schema::{BenchRecord, OperationRecord, RunConfig, SCHEMA_VERSION, TimingStat};
