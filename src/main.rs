#![forbid(unsafe_code)]

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sgx_dnnl_bench::bench::{
    BenchConfig, EXIT_PROMPT, MonotonicClock, RunOutcome, load_bench_config, run_benchmark,
};
use sgx_dnnl_bench::core::{BenchRecord, EnvironmentInfo};
use sgx_dnnl_bench::provider::{ExecutionProvider, MockProvider};
use sgx_dnnl_bench::storage::{CsvExporter, RunLog};
use sgx_dnnl_bench::{BenchError, BenchResult, sha256_hex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    /// Intel SGX untrusted runtime (requires the `sgx` feature)
    Sgx,
    /// In-process mock, for dry runs without SGX hardware
    Mock,
}

#[derive(Parser, Debug)]
#[command(name = "sgx-dnnl-bench")]
#[command(
    about = "Benchmark DNNL training and inference inside an SGX enclave",
    after_help = "The sgx provider needs a build with `cargo build --release --features sgx`; \
                  without it, pass `--provider mock`."
)]
struct Cli {
    /// Enable verbose logging (or set SGX_BENCH_LOG)
    #[arg(long)]
    verbose: bool,
    /// Benchmark plan (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Signed enclave image [default: libenclave.signed.so]
    #[arg(long)]
    enclave: Option<PathBuf>,
    /// Timed calls per operation [default: 5]
    #[arg(long)]
    iterations: Option<u32>,
    /// Execution provider to run against
    #[arg(long, value_enum, default_value_t = ProviderKind::Sgx)]
    provider: ProviderKind,
    /// Write machine-readable JSON record to this file
    #[arg(long)]
    json: Option<PathBuf>,
    /// Append the record to this JSON-lines history
    #[arg(long)]
    jsonl: Option<PathBuf>,
    /// Export the record to CSV, one row per operation
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Exit right after the report instead of waiting for a keypress
    #[arg(long)]
    no_wait: bool,
}

fn init_tracing(verbose: bool) {
    let env = std::env::var("SGX_BENCH_LOG").unwrap_or_else(|_| {
        if verbose { "sgx_dnnl_bench=debug".to_string() } else { "sgx_dnnl_bench=info".to_string() }
    });
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn build_config(cli: &Cli) -> BenchResult<BenchConfig> {
    let mut config = match &cli.config {
        Some(path) => load_bench_config(path)
            .map_err(|e| BenchError::Message(format!("{}: {e}", path.display())))?,
        None => BenchConfig::default(),
    };
    if let Some(enclave) = &cli.enclave {
        config = config.with_enclave(enclave);
    }
    if let Some(n) = cli.iterations {
        config = config.with_iterations(n);
    }
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "sgx")]
fn sgx_provider() -> BenchResult<Box<dyn ExecutionProvider>> {
    Ok(Box::new(sgx_dnnl_bench::provider::SgxProvider::new()))
}

#[cfg(not(feature = "sgx"))]
fn sgx_provider() -> BenchResult<Box<dyn ExecutionProvider>> {
    Err(BenchError::Message(
        "the sgx provider is not compiled in; rebuild with `cargo build --release --features sgx` \
         (SGX_SDK set to the SDK root, ENCLAVE_U_LIB_DIR to the directory holding libenclave_u.a) or pass --provider mock"
            .to_string(),
    ))
}

fn make_provider(kind: ProviderKind) -> BenchResult<Box<dyn ExecutionProvider>> {
    match kind {
        ProviderKind::Sgx => sgx_provider(),
        ProviderKind::Mock => Ok(Box::new(MockProvider::default_mock())),
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> BenchResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_vec_pretty(value).context("serializing record")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn save_outputs(cli: &Cli, config: &BenchConfig, outcome: &RunOutcome) -> BenchResult<()> {
    if cli.json.is_none() && cli.jsonl.is_none() && cli.csv.is_none() {
        return Ok(());
    }
    let mut record = BenchRecord::from_outcome(outcome, config, EnvironmentInfo::detect());
    record.enclave_sha256 = std::fs::read(&config.enclave).ok().map(|b| sha256_hex(&b));
    record.cli_args = std::env::args().collect();

    if let Some(path) = &cli.json {
        write_json(path, &record)?;
        info!(path = %path.display(), "wrote JSON record");
    }
    if let Some(path) = &cli.jsonl {
        let log = RunLog::open(path);
        log.append(&record)?;
        match &record.enclave_sha256 {
            Some(hash) => {
                let runs = log.runs_of(hash)?.len();
                info!(path = %path.display(), runs_of_image = runs, "appended run");
            }
            None => info!(path = %path.display(), "appended run"),
        }
    }
    if let Some(path) = &cli.csv {
        CsvExporter::new().export(std::slice::from_ref(&record), path)?;
        info!(path = %path.display(), "wrote CSV");
    }
    Ok(())
}

fn run(cli: &Cli) -> BenchResult<()> {
    let config = build_config(cli)?;
    let provider = make_provider(cli.provider)?;
    let clock = MonotonicClock::new();

    // Not locked across the run: enclave threads print through the OCALL.
    let outcome = run_benchmark(&*provider, &config, &clock, &mut std::io::stdout())?;

    save_outputs(cli, &config, &outcome)?;

    if !cli.no_wait {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", EXIT_PROMPT).context("writing prompt")?;
        stdout.flush().context("flushing stdout")?;
        let _ = std::io::stdin().read(&mut [0u8; 1]);
    }
    Ok(())
}

fn main() {
    color_eyre::install().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        match &e {
            // Already explained on stdout through the status table.
            BenchError::Load { .. } => error!("{}", e),
            _ => eprintln!("{:#}", e),
        }
        std::process::exit(e.exit_code());
    }
}
