use crate::error::{UlsError, UlsResult};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs::OpenOptions,
    io::Write,
    time::{Duration, Instant},
};

/// A record of timing information for one solver step.
///
/// Steps are the phases of a solve call: `validate`, `factorize`, `least_p`,
/// `support_reduction`, `homotopy_stage`, `lp_build` and `lp_minimize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingRecord {
    /// Name of the step (e.g., "factorize", "lp_minimize")
    pub step_name: String,
    /// The solve call this step belonged to, counted from 1
    pub run: usize,
    /// Duration of the step in milliseconds
    pub duration_ms: f64,
    /// Unix timestamp when the step was recorded
    pub timestamp: u64,
}

/// Performance tracking for the solvers.
///
/// `TimingTracker` collects a record per solver step and provides
/// per-step statistics and CSV export. [`crate::UlsSolver`] owns one and
/// starts a new run for every solve call.
#[derive(Debug, Default)]
pub struct TimingTracker {
    step_timings: Vec<TimingRecord>,
    current_run: usize,
}

impl TimingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_run(&mut self) {
        self.current_run += 1;
    }

    pub fn current_run(&self) -> usize {
        self.current_run
    }

    pub fn record_step(&mut self, step_name: &str, duration: Duration) {
        let record = TimingRecord {
            step_name: step_name.to_string(),
            run: self.current_run,
            duration_ms: duration.as_secs_f64() * 1000.0,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        self.step_timings.push(record);
    }

    pub fn records(&self) -> &[TimingRecord] {
        &self.step_timings
    }

    pub fn write_step_timings_to_csv(&self, filename: &str) -> UlsResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(filename)
            .map_err(|e| UlsError::Io(format!("Failed to create timing file: {}", e)))?;

        writeln!(file, "step_name,run,duration_ms,timestamp")
            .map_err(|e| UlsError::Io(format!("Failed to write header: {}", e)))?;

        for record in &self.step_timings {
            writeln!(
                file,
                "{},{},{:.3},{}",
                record.step_name, record.run, record.duration_ms, record.timestamp
            )
            .map_err(|e| UlsError::Io(format!("Failed to write timing record: {}", e)))?;
        }

        Ok(())
    }

    /// Per-step `(average ms, max ms, count)`.
    pub fn get_step_statistics(&self) -> HashMap<String, (f64, f64, usize)> {
        let mut stats = HashMap::new();

        for record in &self.step_timings {
            let entry = stats
                .entry(record.step_name.clone())
                .or_insert((0.0f64, 0.0f64, 0));
            entry.0 += record.duration_ms;
            entry.1 = entry.1.max(record.duration_ms);
            entry.2 += 1;
        }

        // Convert to (average, max, count)
        for (_, stats) in stats.iter_mut() {
            stats.0 /= stats.2 as f64;
        }

        stats
    }
}

/// Runs `f` and records its wall time under `name`, whether it fails or not.
pub fn time_fn<F, R>(tracker: &mut TimingTracker, name: &str, f: F) -> UlsResult<R>
where
    F: FnOnce() -> UlsResult<R>,
{
    let start = Instant::now();
    let result = f();
    tracker.record_step(name, start.elapsed());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_average_and_max() {
        let mut tracker = TimingTracker::new();
        tracker.start_run();
        tracker.record_step("factorize", Duration::from_millis(2));
        tracker.record_step("factorize", Duration::from_millis(4));
        tracker.record_step("least_p", Duration::from_millis(1));

        let stats = tracker.get_step_statistics();
        let (avg, max, count) = stats["factorize"];
        assert!((avg - 3.0).abs() < 1e-9);
        assert!((max - 4.0).abs() < 1e-9);
        assert_eq!(count, 2);
        assert_eq!(stats["least_p"].2, 1);
        assert!(tracker.records().iter().all(|r| r.run == 1));
    }

    #[test]
    fn test_time_fn_records_failures() {
        let mut tracker = TimingTracker::new();
        let result: UlsResult<()> = time_fn(&mut tracker, "validate", || {
            Err(UlsError::InvalidInput("bad".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(tracker.records().len(), 1);
        assert_eq!(tracker.records()[0].step_name, "validate");
    }

    #[test]
    fn test_csv_export() {
        let mut tracker = TimingTracker::new();
        tracker.start_run();
        tracker.record_step("lp_minimize", Duration::from_millis(3));
        let path = std::env::temp_dir().join(format!("uls_timing_{}.csv", std::process::id()));
        let filename = path.to_string_lossy().to_string();
        tracker.write_step_timings_to_csv(&filename).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("step_name,run,duration_ms,timestamp"));
        assert!(lines.next().unwrap().starts_with("lp_minimize,1,3.000,"));
        std::fs::remove_file(&path).unwrap();
    }
}
