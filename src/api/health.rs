//! Shared health state for the /health endpoint.
//! Written by the scanner at the end of every cycle, read by the API.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};

/// Shared health metrics. Updated by the scanner, read by the API.
#[derive(Default)]
pub struct HealthState {
    scan_count: AtomicU64,
    /// Unix seconds of the last finished cycle (0 = none yet).
    last_run_unix: AtomicI64,
    last_cycle_ok: AtomicBool,
    markets_tracked: AtomicU64,
    alerts_sent: AtomicU64,
    consecutive_failures: AtomicU32,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed counters from restored state so /health survives restarts.
    pub fn restore(&self, scan_count: u64, last_run: Option<DateTime<Utc>>) {
        self.scan_count.store(scan_count, Ordering::Relaxed);
        if let Some(ts) = last_run {
            self.last_run_unix.store(ts.timestamp(), Ordering::Relaxed);
        }
    }

    pub fn record_success(&self, scan_count: u64, now: DateTime<Utc>, markets_tracked: usize) {
        self.scan_count.store(scan_count, Ordering::Relaxed);
        self.last_run_unix.store(now.timestamp(), Ordering::Relaxed);
        self.markets_tracked.store(markets_tracked as u64, Ordering::Relaxed);
        self.last_cycle_ok.store(true, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    /// Returns the failure streak including this one.
    pub fn record_failure(&self) -> u32 {
        self.last_cycle_ok.store(false, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn add_alerts_sent(&self, n: u64) {
        self.alerts_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn scan_count(&self) -> u64 {
        self.scan_count.load(Ordering::Relaxed)
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        match self.last_run_unix.load(Ordering::Relaxed) {
            0 => None,
            secs => DateTime::from_timestamp(secs, 0),
        }
    }

    pub fn last_cycle_ok(&self) -> bool {
        self.last_cycle_ok.load(Ordering::Relaxed)
    }

    pub fn markets_tracked(&self) -> u64 {
        self.markets_tracked.load(Ordering::Relaxed)
    }

    pub fn alerts_sent(&self) -> u64 {
        self.alerts_sent.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn failure_streak_resets_on_success() {
        let health = HealthState::new();
        assert_eq!(health.record_failure(), 1);
        assert_eq!(health.record_failure(), 2);
        assert!(!health.last_cycle_ok());

        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        health.record_success(7, now, 40);
        assert_eq!(health.consecutive_failures(), 0);
        assert!(health.last_cycle_ok());
        assert_eq!(health.last_run(), Some(now));
        assert_eq!(health.markets_tracked(), 40);
    }

    #[test]
    fn restore_seeds_scan_count() {
        let health = HealthState::new();
        assert_eq!(health.last_run(), None);
        health.restore(120, None);
        assert_eq!(health.scan_count(), 120);
    }
}
