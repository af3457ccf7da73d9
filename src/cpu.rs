//! System CPU utilization sampling.
//!
//! [`CpuMonitor`] samples a [`CpuSampler`] on its own thread at a fixed
//! interval while a transcode runs, and hands back every sample when
//! stopped. [`ProcStatSampler`] is the stock sampler; it reads the
//! aggregate `cpu` line of `/proc/stat` and reports the busy share of the
//! ticks elapsed since its previous reading.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use vqscore::{CpuMonitor, ProcStatSampler};
//!
//! let monitor = CpuMonitor::start(Box::new(ProcStatSampler::new()), Duration::from_secs(1));
//! // ... run the workload ...
//! let usage = monitor.stop();
//! println!("{:.1}% over {} samples", usage.average, usage.samples.len());
//! ```

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde::Serialize;

/// A source of system-wide CPU utilization readings.
pub trait CpuSampler: Send {
    /// Utilization in percent (0 to 100) since the previous call, or `None`
    /// if no reading is available (first call, unsupported platform,
    /// unreadable source).
    fn sample(&mut self) -> Option<f64>;
}

/// Cumulative tick counters from one `/proc/stat` reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    idle: u64,
    total: u64,
}

/// Parse the aggregate `cpu` line of `/proc/stat`.
///
/// Idle time is `idle + iowait`; the total sums `user` through `steal`.
/// `guest` columns are already included in `user` and are not added again.
fn parse_proc_stat(contents: &str) -> Option<CpuTimes> {
    let line = contents.lines().find(|line| line.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map_while(|field| field.parse().ok())
        .collect();
    if fields.len() < 4 {
        return None;
    }

    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    let total = fields.iter().sum();
    Some(CpuTimes { idle, total })
}

fn utilization(previous: CpuTimes, current: CpuTimes) -> Option<f64> {
    let total = current.total.checked_sub(previous.total)?;
    let idle = current.idle.checked_sub(previous.idle)?;
    if total == 0 {
        return None;
    }
    let busy = total.saturating_sub(idle);
    Some(busy as f64 * 100.0 / total as f64)
}

/// Samples `/proc/stat` deltas. Always `None` off Linux.
#[derive(Debug, Default)]
pub struct ProcStatSampler {
    previous: Option<CpuTimes>,
}

impl ProcStatSampler {
    pub fn new() -> Self {
        Self::default()
    }

    fn read() -> Option<CpuTimes> {
        if !cfg!(target_os = "linux") {
            return None;
        }
        let contents = std::fs::read_to_string("/proc/stat").ok()?;
        parse_proc_stat(&contents)
    }
}

impl CpuSampler for ProcStatSampler {
    fn sample(&mut self) -> Option<f64> {
        let current = Self::read()?;
        let previous = self.previous.replace(current)?;
        utilization(previous, current)
    }
}

/// Samples collected over one monitoring period.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuUsage {
    /// Utilization readings in percent, in sampling order.
    pub samples: Vec<f64>,
    /// Mean of `samples`; 0 when there are none.
    pub average: f64,
}

impl CpuUsage {
    pub fn from_samples(samples: Vec<f64>) -> Self {
        let average = if samples.is_empty() {
            0.0
        } else {
            samples.iter().sum::<f64>() / samples.len() as f64
        };
        Self { samples, average }
    }
}

/// A running sampling thread.
///
/// Dropping the monitor without calling [`stop`](CpuMonitor::stop) ends the
/// thread at its next wake-up and discards the samples.
pub struct CpuMonitor {
    stop_tx: Sender<()>,
    handle: JoinHandle<Vec<f64>>,
}

impl CpuMonitor {
    /// Start sampling every `interval`.
    ///
    /// The sampler is primed once before the first interval so that the
    /// first recorded sample covers a full interval. [`stop`](CpuMonitor::stop)
    /// takes one last reading covering the partial interval in progress.
    pub fn start(mut sampler: Box<dyn CpuSampler>, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            let _ = sampler.sample();
            let mut samples = Vec::new();
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => match sampler.sample() {
                        Some(value) => samples.push(value),
                        None => log::debug!("CPU sample unavailable"),
                    },
                    Ok(()) => {
                        match sampler.sample() {
                            Some(value) => samples.push(value),
                            None => log::debug!("Final CPU sample unavailable"),
                        }
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            samples
        });

        Self { stop_tx, handle }
    }

    /// Stop sampling and collect the readings.
    pub fn stop(self) -> CpuUsage {
        // The thread may already be gone if it panicked.
        let _ = self.stop_tx.send(());
        let samples = match self.handle.join() {
            Ok(samples) => samples,
            Err(_) => {
                log::warn!("CPU monitor thread panicked; no samples recorded");
                Vec::new()
            }
        };
        if samples.is_empty() {
            log::warn!("No CPU samples were collected");
        }
        CpuUsage::from_samples(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "cpu  4705 356 584 3699 23 0 12 0 0 0\n\
                        cpu0 1393 180 180 1900 10 0 6 0 0 0\n\
                        intr 114930548 113199788 3 0 5 263 0 4 [... lots more numbers ...]\n";

    #[test]
    fn parses_aggregate_line() {
        let times = parse_proc_stat(STAT).unwrap();
        assert_eq!(times.idle, 3699 + 23);
        assert_eq!(times.total, 4705 + 356 + 584 + 3699 + 23 + 12);
    }

    #[test]
    fn rejects_missing_cpu_line() {
        assert!(parse_proc_stat("intr 1 2 3\n").is_none());
        assert!(parse_proc_stat("cpu  1 2\n").is_none());
    }

    #[test]
    fn utilization_from_deltas() {
        let previous = CpuTimes { idle: 100, total: 200 };
        let current = CpuTimes { idle: 125, total: 300 };
        assert_eq!(utilization(previous, current), Some(75.0));
        assert_eq!(utilization(current, current), None);
        assert_eq!(utilization(current, previous), None);
    }

    #[test]
    fn usage_average() {
        assert_eq!(CpuUsage::from_samples(vec![10.0, 30.0]).average, 20.0);
        assert_eq!(CpuUsage::from_samples(Vec::new()).average, 0.0);
    }
}
