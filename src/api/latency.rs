//! In-memory histogram of full cycle durations (fetch, detect, deliver, save).

use std::sync::Mutex;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Shared cycle-duration stats. Scanner records, API reads.
/// Values stored in milliseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl LatencyStats {
    /// Tracks 1ms to 1h, 3 significant figures.
    pub fn new() -> Result<Self> {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 3_600_000, 3)
            .map_err(|e| AppError::Config(format!("latency histogram: {e}")))?;
        Ok(Self {
            inner: Mutex::new(histogram),
        })
    }

    pub fn record(&self, d: Duration) {
        let ms = d.as_millis().min(u128::from(u64::MAX)) as u64;
        if let Ok(mut h) = self.inner.lock() {
            h.saturating_record(ms);
        }
    }

    /// Return (p50_ms, p95_ms, p99_ms). None if no samples.
    pub fn percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        let Ok(h) = self.inner.lock() else {
            return (None, None, None);
        };
        if h.len() == 0 {
            return (None, None, None);
        }
        let p50 = h.value_at_quantile(0.5);
        let p95 = h.value_at_quantile(0.95);
        let p99 = h.value_at_quantile(0.99);
        (Some(p50), Some(p95), Some(p99))
    }

    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }
}
