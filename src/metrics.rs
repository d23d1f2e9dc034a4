use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

/// One throughput measurement window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Monotonic nanoseconds since the run started
    pub elapsed_nanos: u64,
    /// Responses completed since the previous sample
    pub requests: u64,
}

impl Sample {
    pub fn new(elapsed_nanos: u64, requests: u64) -> Self {
        Self {
            elapsed_nanos,
            requests,
        }
    }
}

/// Shared counter of completed responses
///
/// Incremented once per fully-received response by the connection drivers and
/// drained by the sampler. The drain is a single atomic swap, so an increment
/// racing with it lands either in the closing window or the next one, never
/// in both and never nowhere.
#[derive(Debug, Default)]
pub struct RequestCounter {
    count: AtomicU64,
}

impl RequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed response
    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Atomically read and reset the counter
    pub fn take(&self) -> u64 {
        self.count.swap(0, Ordering::AcqRel)
    }

    /// Current value, without resetting
    pub fn current(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }
}

/// One-directional stop flag published by the client once the test duration
/// elapses and observed by every driver between responses
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the stop request; never unset
    pub fn set(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Periodic drain of the request counter into timestamped windows
///
/// Runs as its own task, decoupled from the connection drivers: a stalled
/// driver never delays a tick. The baseline sample is taken synchronously in
/// `start` before the task exists, and the first scheduled tick lands one
/// full period after `epoch`. Stopping performs a final drain so increments
/// after the last natural tick are kept in the sequence.
pub struct Sampler {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<Vec<Sample>>,
}

impl Sampler {
    /// Take the baseline sample and start ticking every `period`
    pub fn start(counter: Arc<RequestCounter>, epoch: Instant, period: Duration) -> Self {
        let mut samples = vec![drain(&counter, epoch)];

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(epoch + period, period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        samples.push(drain(&counter, epoch));
                    }
                    _ = &mut stop_rx => {
                        samples.push(drain(&counter, epoch));
                        break;
                    }
                }
            }
            debug!("Sampler stopped after {} windows", samples.len());
            samples
        });

        Self { stop_tx, handle }
    }

    /// Stop ticking and hand back the collected sample sequence
    pub async fn stop(self) -> Result<Vec<Sample>> {
        let _ = self.stop_tx.send(());
        self.handle.await.context("Sampler task panicked")
    }
}

fn drain(counter: &RequestCounter, epoch: Instant) -> Sample {
    Sample::new(epoch.elapsed().as_nanos() as u64, counter.take())
}

/// Aggregate result of one run
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_requests: u64,
    pub elapsed_ms: u64,
    pub throughput_rps: f64,
}

impl RunSummary {
    /// Total the sample sequence against the wall time elapsed between the
    /// baseline sample and `now_nanos`
    pub fn from_samples(samples: &[Sample], now_nanos: u64) -> Self {
        let total_requests = samples.iter().map(|s| s.requests).sum();
        let first_nanos = samples.first().map(|s| s.elapsed_nanos).unwrap_or(0);
        let elapsed_ms = now_nanos.saturating_sub(first_nanos) / 1_000_000;
        let throughput_rps = if elapsed_ms > 0 {
            total_requests as f64 / elapsed_ms as f64 * 1000.0
        } else {
            0.0
        };

        Self {
            total_requests,
            elapsed_ms,
            throughput_rps,
        }
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Performed {} requests in {} ms, avg throughput={:.2} rps",
            self.total_requests, self.elapsed_ms, self.throughput_rps
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_take_resets() {
        let counter = RequestCounter::new();
        counter.increment();
        counter.increment();
        counter.increment();

        assert_eq!(counter.current(), 3);
        assert_eq!(counter.take(), 3);
        assert_eq!(counter.take(), 0);
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_counter_loses_nothing_under_concurrent_increment() {
        const THREADS: usize = 8;
        const PER_THREAD: u64 = 10_000;

        let counter = RequestCounter::new();
        let drained = AtomicU64::new(0);

        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..PER_THREAD {
                        counter.increment();
                    }
                });
            }
            // Drain concurrently with the incrementing threads
            scope.spawn(|| {
                for _ in 0..100 {
                    drained.fetch_add(counter.take(), Ordering::Relaxed);
                    std::thread::yield_now();
                }
            });
        });

        let total = drained.load(Ordering::Relaxed) + counter.take();
        assert_eq!(total, THREADS as u64 * PER_THREAD);
    }

    #[test]
    fn test_stop_signal_is_one_directional() {
        let stop = StopSignal::new();
        assert!(!stop.is_set());
        stop.set();
        assert!(stop.is_set());
        stop.set();
        assert!(stop.is_set());
    }

    #[tokio::test]
    async fn test_sampler_baseline_and_final_drain() {
        let counter = Arc::new(RequestCounter::new());
        let sampler = Sampler::start(counter.clone(), Instant::now(), Duration::from_millis(50));

        for _ in 0..7 {
            counter.increment();
        }
        tokio::time::sleep(Duration::from_millis(120)).await;
        for _ in 0..3 {
            counter.increment();
        }

        let samples = sampler.stop().await.unwrap();

        // Baseline, at least two ticks, and the final drain
        assert!(samples.len() >= 4);
        assert_eq!(samples[0].requests, 0);
        let total: u64 = samples.iter().map(|s| s.requests).sum();
        assert_eq!(total, 10);
        assert!(samples
            .windows(2)
            .all(|pair| pair[1].elapsed_nanos > pair[0].elapsed_nanos));
    }

    #[tokio::test]
    async fn test_sampler_with_no_traffic_still_returns_baseline() {
        let counter = Arc::new(RequestCounter::new());
        let sampler = Sampler::start(counter, Instant::now(), Duration::from_secs(60));

        let samples = sampler.stop().await.unwrap();
        assert!(!samples.is_empty());
        assert_eq!(samples[0].requests, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = RunSummary {
            total_requests: 1234,
            elapsed_ms: 2000,
            throughput_rps: 617.0,
        };
        assert_eq!(
            summary.to_string(),
            "Performed 1234 requests in 2000 ms, avg throughput=617.00 rps"
        );
    }

    #[test]
    fn test_summary_from_samples() {
        let samples = vec![
            Sample::new(0, 0),
            Sample::new(250_000_000, 100),
            Sample::new(500_000_000, 150),
        ];
        let summary = RunSummary::from_samples(&samples, 500_000_000);

        assert_eq!(summary.total_requests, 250);
        assert_eq!(summary.elapsed_ms, 500);
        assert!((summary.throughput_rps - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_of_empty_run_is_zeroed() {
        let summary = RunSummary::from_samples(&[], 0);
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.elapsed_ms, 0);
        assert_eq!(summary.throughput_rps, 0.0);
    }
}
