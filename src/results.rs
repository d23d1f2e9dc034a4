use crate::metrics::Sample;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// CSV column header
pub const CSV_HEADER: &str = "Elapsed time (s),Requests per second";

/// Render the sample sequence as CSV lines, one row per window after the
/// baseline
///
/// Elapsed time is seconds since the first sample with three decimal places;
/// requests per second is the window's count divided by the window's actual
/// duration, rounded to the nearest integer.
pub fn format_csv(samples: &[Sample]) -> Vec<String> {
    let mut lines = Vec::with_capacity(samples.len());
    lines.push(CSV_HEADER.to_string());

    let first = match samples.first() {
        Some(first) => first,
        None => return lines,
    };
    for pair in samples.windows(2) {
        let elapsed_secs = (pair[1].elapsed_nanos - first.elapsed_nanos) as f64 / 1e9;
        let window_secs = (pair[1].elapsed_nanos - pair[0].elapsed_nanos) as f64 / 1e9;
        let rps = (pair[1].requests as f64 / window_secs).round() as i64;
        lines.push(format!("{:.3},{}", elapsed_secs, rps));
    }

    lines
}

/// Write the sample sequence to `path` as CSV
pub fn write_csv(path: &Path, samples: &[Sample]) -> Result<()> {
    let mut contents = format_csv(samples).join("\n");
    contents.push('\n');
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write results to {}", path.display()))?;

    info!(
        "Wrote {} sample windows to {}",
        samples.len().saturating_sub(1),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_rows_after_the_baseline() {
        let samples = vec![
            Sample::new(0, 0),
            Sample::new(250_000_000, 100),
            Sample::new(500_000_000, 200),
        ];
        let lines = format_csv(&samples);

        assert_eq!(
            lines,
            vec![
                CSV_HEADER.to_string(),
                "0.250,400".to_string(),
                "0.500,800".to_string(),
            ]
        );
    }

    #[test]
    fn test_rate_uses_the_actual_window_duration() {
        // A late tick: the window is 300 ms, not the nominal 250 ms
        let samples = vec![Sample::new(0, 0), Sample::new(300_000_000, 100)];
        let lines = format_csv(&samples);
        assert_eq!(lines[1], "0.300,333");
    }

    #[test]
    fn test_baseline_only_run_produces_header_only() {
        assert_eq!(
            format_csv(&[Sample::new(0, 0)]),
            vec![CSV_HEADER.to_string()]
        );
        assert_eq!(format_csv(&[]), vec![CSV_HEADER.to_string()]);
    }

    #[test]
    fn test_write_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let samples = vec![Sample::new(0, 0), Sample::new(250_000_000, 50)];

        write_csv(&path, &samples).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Elapsed time (s),Requests per second\n0.250,200\n");
    }

    #[test]
    fn test_write_csv_to_bad_path_reports_the_path() {
        let samples = vec![Sample::new(0, 0)];
        let error = write_csv(Path::new("/nonexistent/dir/results.csv"), &samples).unwrap_err();
        assert!(format!("{:#}", error).contains("/nonexistent/dir/results.csv"));
    }
}
