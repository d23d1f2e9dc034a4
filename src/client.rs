//! Closed-loop HTTP load generation.
//!
//! The client opens a fixed number of persistent connections and drives each
//! through a zero-think-time GET/response loop: a driver issues its next
//! request the instant the previous response finishes. Concurrency is fixed
//! by the connection count rather than an arrival rate, so the measured
//! number is the saturation throughput for that many connections. This is a
//! deliberate design choice, not request-rate shaping in disguise.
//!
//! Coordination is intentionally thin: one shared atomic counter incremented
//! per completed response, one shared stop flag checked between responses,
//! and a sampler task draining the counter into 250 ms windows. Drivers own
//! their connections exclusively; nothing else touches them.

use crate::http;
use crate::metrics::{RequestCounter, RunSummary, Sample, Sampler, StopSignal};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

/// Closed-loop HTTP load generator
pub struct BenchmarkClient {
    host: String,
    port: u16,
}

impl BenchmarkClient {
    /// Client targeting `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Drive `connections` persistent connections for `duration`
    ///
    /// Returns the ordered sample sequence and prints the one-line summary.
    /// The first sample is the baseline taken before any connection is
    /// opened, so the result always has at least one element. A driver whose
    /// connection fails at any point simply finishes early; the run itself
    /// never aborts for per-connection faults.
    pub async fn run(&self, connections: usize, duration: Duration) -> Result<Vec<Sample>> {
        let counter = Arc::new(RequestCounter::new());
        let stop = Arc::new(StopSignal::new());

        let epoch = Instant::now();
        let sampler = Sampler::start(counter.clone(), epoch, crate::defaults::SAMPLE_PERIOD);

        let request = Arc::new(http::encode_get_request(&self.host));
        let target = format!("{}:{}", self.host, self.port);
        let mut drivers = Vec::with_capacity(connections);
        for id in 0..connections {
            let target = target.clone();
            let request = request.clone();
            let counter = counter.clone();
            let stop = stop.clone();
            drivers.push(tokio::spawn(async move {
                drive_connection(id, &target, &request, &counter, &stop).await;
            }));
        }
        info!("Started {} connection drivers against {}", connections, target);

        sleep(duration).await;
        stop.set();
        debug!("Stop signal published after {:?}", duration);

        // Bounded wait for the drivers; stragglers are detached, not aborted,
        // so an in-flight exchange is never cancelled mid-request
        let drain = async {
            for driver in drivers {
                let _ = driver.await;
            }
        };
        if timeout(crate::defaults::DRAIN_GRACE, drain).await.is_err() {
            warn!("Client didn't stop after 10 seconds");
        }

        let samples = sampler.stop().await?;
        let summary = RunSummary::from_samples(&samples, epoch.elapsed().as_nanos() as u64);
        println!("{}", summary);

        Ok(samples)
    }
}

/// One connection's closed loop: connect once, then send, await the full
/// response, count it, and check the stop flag
///
/// Any connection failure is terminal for the driver; there is no reconnect.
/// The stop flag is only checked between responses, so an in-flight exchange
/// always completes before the driver exits.
async fn drive_connection(
    id: usize,
    target: &str,
    request: &[u8],
    counter: &RequestCounter,
    stop: &StopSignal,
) {
    let stream = match TcpStream::connect(target).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Driver {}: connect failure: {}", id, e);
            return;
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Driver {}: failed to set TCP_NODELAY: {}", id, e);
    }
    let mut stream = BufReader::new(stream);
    debug!("Driver {}: connected to {}", id, target);

    loop {
        if let Err(e) = stream.write_all(request).await {
            error!("Driver {}: send failed: {}", id, e);
            break;
        }
        match http::read_response(&mut stream).await {
            Ok(Some(response)) => {
                if response.status != 200 {
                    debug!("Driver {}: unexpected status {}", id, response.status);
                }
                counter.increment();
            }
            Ok(None) => {
                debug!("Driver {}: server closed the connection", id);
                break;
            }
            Err(e) => {
                error!("Driver {}: receive failed: {}", id, e);
                break;
            }
        }
        if stop.is_set() {
            debug!("Driver {}: stop observed, closing", id);
            break;
        }
    }
}
