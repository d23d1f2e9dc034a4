use std::time::Duration;

use anyhow::Result;
use http_bench::BenchmarkClient;

/// A run against a port nobody is listening on still completes cleanly.
///
/// Every driver fails its connect and finishes immediately, so the run
/// reduces to the sampler ticking over an idle counter. It must still
/// produce samples, report zero requests, and not hang in the drain.
#[tokio::test(flavor = "multi_thread")]
async fn dead_port_run_completes_promptly() -> Result<()> {
    // Bind an ephemeral port, then drop the listener so connects are refused.
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);

    let client = BenchmarkClient::new("127.0.0.1", port);
    let started = std::time::Instant::now();
    let samples = client.run(5, Duration::from_millis(300)).await?;

    // Well under the drain grace: the drivers were already gone at stop time.
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "dead-port run took {:?}",
        started.elapsed()
    );
    assert!(!samples.is_empty(), "the baseline sample is recorded even with no traffic");
    let total: u64 = samples.iter().map(|s| s.requests).sum();
    assert_eq!(total, 0);
    Ok(())
}
