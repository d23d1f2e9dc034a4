//! # HTTP Load Benchmark Harness
//!
//! A paired client/server harness for measuring sustained HTTP request
//! throughput over persistent connections. The client opens a fixed number of
//! concurrent connections and drives each through a zero-think-time
//! GET/response loop for a configured duration; the server is a deliberately
//! minimal keep-alive endpoint that returns a fixed synthetic payload (plain
//! or gzip) and reclaims connections that go read-idle.
//!
//! ## Architecture Overview
//!
//! The crate is organized into focused modules:
//!
//! - `client`: Connection drivers, stop coordination, and the run lifecycle
//! - `server`: Listener, per-connection serving, and the idle reaper
//! - `http`: Minimal HTTP/1.1 wire codec shared by both sides
//! - `payload`: Fixed response body with its pre-computed gzip variant
//! - `metrics`: Request counter, stop signal, sampler, and run summary
//! - `results`: CSV rendering of the collected sample windows
//! - `cli`: Command-line parsing and run configuration
//!
//! Throughput is recorded in fixed 250 ms windows: every completed response
//! increments a shared atomic counter, and a sampler task drains the counter
//! on each tick into a timestamped [`Sample`]. The run returns the ordered
//! sample sequence, which the binary renders to CSV.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use http_bench::{BenchmarkClient, BenchmarkServer, Payload, ServerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::new(8000, 5000);
//!     let server = BenchmarkServer::bind(&config, Payload::builtin_json()?).await?;
//!
//!     let client = BenchmarkClient::new("localhost", 8000);
//!     let samples = client.run(100, Duration::from_secs(30)).await?;
//!     println!("collected {} sample windows", samples.len() - 1);
//!
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Measurement Model
//!
//! This is a saturation benchmark: drivers re-request the instant the
//! previous response completes, so the measured rate is bounded by the
//! connection count and the server, not by a shaped arrival rate. Per-window
//! rates in the CSV use each window's actual duration, which keeps late timer
//! ticks from skewing the numbers.

/// Client-side load generation
///
/// Contains the `BenchmarkClient` run lifecycle and the per-connection
/// drivers. The client handles:
/// - Fan-out of N independent connection driver tasks
/// - Stop-signal publication after the test duration
/// - Bounded post-signal drain with a grace period
/// - Sample collection and the printed throughput summary
pub mod client;

/// Command-line interface and configuration
///
/// Parses the three positional parameters (connections, duration seconds,
/// results path) plus optional host/port/idle-timeout/payload flags, and
/// resolves them into a `RunConfiguration`.
pub mod cli;

/// Minimal HTTP/1.1 wire codec
///
/// Fixed GET request encoding, response encoding with exact Content-Length,
/// incremental request aggregation under a read-idle timeout, and the
/// connection-level error taxonomy shared by client and server.
pub mod http;

/// Performance measurement primitives
///
/// The shared `RequestCounter` with its atomic read-and-reset drain, the
/// one-directional `StopSignal`, the windowing `Sampler`, and the
/// `RunSummary` aggregate.
pub mod metrics;

/// Synthetic response payload
///
/// Loads the fixed body once, pre-computes the gzip variant, and exposes
/// both as immutable slices shared across all server connections.
pub mod payload;

/// Result output formatting
///
/// Renders the collected samples as the results CSV.
pub mod results;

/// Benchmark HTTP server
///
/// Listener construction with an explicit backlog, the accept loop,
/// per-connection request handling with gzip negotiation, and the
/// read-idle reaper.
pub mod server;

// Re-export the primary types for convenient library usage

/// Client-side entry point for driving a load run
pub use client::BenchmarkClient;

/// Server-side entry point and its configuration
pub use server::{BenchmarkServer, ServerConfig};

/// Fixed response body store
pub use payload::Payload;

/// Core measurement types
pub use metrics::{RequestCounter, RunSummary, Sample, StopSignal};

/// The current version of the benchmark harness
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
///
/// Defaults match the workload this harness is built around: a local
/// saturation run against the built-in JSON document.
pub mod defaults {
    use std::time::Duration;

    /// Default client target host
    pub const HOST: &str = "localhost";

    /// Default port for the server and the client
    pub const PORT: u16 = 8000;

    /// Default server-side read-idle timeout in milliseconds
    ///
    /// Five seconds is generous next to the zero-think-time driver loop;
    /// it only fires for stalled or half-open peers.
    pub const IDLE_TIMEOUT_MS: u64 = 5000;

    /// Throughput sampling period
    ///
    /// 250 ms windows are fine-grained enough to show ramp-up and jitter
    /// while keeping a multi-minute run's sample sequence small.
    pub const SAMPLE_PERIOD: Duration = Duration::from_millis(250);

    /// Bounded wait for drivers to finish after the stop signal
    ///
    /// A driver only checks the stop flag between responses, so a stalled
    /// server can hold drivers past the test duration. After 10 seconds the
    /// run proceeds with the samples it has and leaves stragglers behind.
    pub const DRAIN_GRACE: Duration = Duration::from_secs(10);

    /// Listen backlog for the server socket
    ///
    /// Sized for the connection storm at run start, when every driver
    /// connects at once.
    pub const LISTEN_BACKLOG: i32 = 15 * 1024;

    /// Ceiling on the size of one aggregated request
    ///
    /// Requests are aggregated fully in memory before handling. The driver's
    /// fixed GET is a few hundred bytes, so anything approaching this limit
    /// is a misbehaving peer and the connection is dropped.
    pub const MAX_REQUEST_BYTES: usize = 30000;
}
