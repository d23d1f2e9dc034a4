//! # HTTP Benchmark - Main Entry Point
//!
//! Entry point for the HTTP load benchmark harness. A single invocation:
//! 1. **Initializes logging**: structured output via tracing, `RUST_LOG` controlled
//! 2. **Parses arguments**: connections, duration, results path, and overrides
//! 3. **Starts the server**: the embedded keep-alive HTTP endpoint
//! 4. **Drives the load**: N concurrent connection drivers for the duration
//! 5. **Writes results**: per-window throughput CSV at the requested path
//!
//! The client prints its one-line run summary to stdout; everything else goes
//! through the tracing subscriber.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use http_bench::cli::{Args, RunConfiguration};
use http_bench::{results, BenchmarkClient, BenchmarkServer, Payload, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Log level is controlled via RUST_LOG, e.g.
    // RUST_LOG=debug cargo run -- 100 30 results.csv
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = RunConfiguration::from(&args);

    info!("Starting HTTP benchmark v{}", http_bench::VERSION);
    info!("Run: {}", config);

    // The payload is loaded and gzip-compressed once, before any connection
    // is accepted. A bad --payload path is fatal here rather than per request.
    let payload = match &config.payload_file {
        Some(path) => Payload::from_file(path)?,
        None => Payload::builtin_json()?,
    };

    let server_config = ServerConfig::new(config.port, config.idle_timeout_ms);
    let server = BenchmarkServer::bind(&server_config, payload).await?;
    info!("Server listening on {}", server.local_addr());

    let client = BenchmarkClient::new(config.host.clone(), config.port);
    let samples = client.run(config.connections, config.duration).await?;

    results::write_csv(&config.results_file, &samples)?;

    server.shutdown().await?;
    info!("Benchmark complete, results in {}", config.results_file.display());

    Ok(())
}
