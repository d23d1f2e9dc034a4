use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// HTTP load benchmark - saturation throughput over persistent connections
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Number of concurrent connections to open
    pub connections: usize,

    /// Test duration in seconds
    pub duration_seconds: u64,

    /// Path of the results CSV file
    pub results_file: PathBuf,

    /// Host the client connects to
    #[clap(long, default_value = crate::defaults::HOST)]
    pub host: String,

    /// Port the server listens on and the client targets
    #[clap(long, default_value_t = crate::defaults::PORT)]
    pub port: u16,

    /// Server-side read-idle timeout in milliseconds
    #[clap(long, default_value_t = crate::defaults::IDLE_TIMEOUT_MS)]
    pub idle_timeout_ms: u64,

    /// Serve a payload file instead of the built-in JSON document
    #[clap(long)]
    pub payload: Option<PathBuf>,
}

/// Resolved run configuration derived from the command line
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub connections: usize,
    pub duration: Duration,
    pub results_file: PathBuf,
    pub host: String,
    pub port: u16,
    pub idle_timeout_ms: u64,
    pub payload_file: Option<PathBuf>,
}

impl From<&Args> for RunConfiguration {
    fn from(args: &Args) -> Self {
        Self {
            connections: args.connections,
            duration: Duration::from_secs(args.duration_seconds),
            results_file: args.results_file.clone(),
            host: args.host.clone(),
            port: args.port,
            idle_timeout_ms: args.idle_timeout_ms,
            payload_file: args.payload.clone(),
        }
    }
}

impl fmt::Display for RunConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} connections for {:?} against {}:{} (idle timeout {} ms, results to {})",
            self.connections,
            self.duration,
            self.host,
            self.port,
            self.idle_timeout_ms,
            self.results_file.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments() {
        let args = Args::try_parse_from(["http-bench", "100", "30", "out.csv"]).unwrap();
        assert_eq!(args.connections, 100);
        assert_eq!(args.duration_seconds, 30);
        assert_eq!(args.results_file, PathBuf::from("out.csv"));
        assert_eq!(args.host, "localhost");
        assert_eq!(args.port, 8000);
        assert_eq!(args.idle_timeout_ms, 5000);
        assert!(args.payload.is_none());
    }

    #[test]
    fn test_missing_arguments_are_rejected() {
        assert!(Args::try_parse_from(["http-bench"]).is_err());
        assert!(Args::try_parse_from(["http-bench", "100"]).is_err());
        assert!(Args::try_parse_from(["http-bench", "100", "30"]).is_err());
        assert!(Args::try_parse_from(["http-bench", "abc", "30", "out.csv"]).is_err());
    }

    #[test]
    fn test_flag_overrides() {
        let args = Args::try_parse_from([
            "http-bench",
            "8",
            "5",
            "out.csv",
            "--host",
            "10.0.0.7",
            "--port",
            "9100",
            "--idle-timeout-ms",
            "250",
            "--payload",
            "body.json",
        ])
        .unwrap();
        assert_eq!(args.host, "10.0.0.7");
        assert_eq!(args.port, 9100);
        assert_eq!(args.idle_timeout_ms, 250);
        assert_eq!(args.payload, Some(PathBuf::from("body.json")));
    }

    #[test]
    fn test_configuration_from_args() {
        let args = Args::try_parse_from(["http-bench", "16", "10", "r.csv"]).unwrap();
        let config = RunConfiguration::from(&args);

        assert_eq!(config.connections, 16);
        assert_eq!(config.duration, Duration::from_secs(10));
        assert_eq!(config.results_file, PathBuf::from("r.csv"));

        let banner = config.to_string();
        assert!(banner.contains("16 connections"));
        assert!(banner.contains("localhost:8000"));
        assert!(banner.contains("r.csv"));
    }
}
