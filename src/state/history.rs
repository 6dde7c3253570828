use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One retained observation of a market's probability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub probability: f64,
    pub timestamp: DateTime<Utc>,
}

/// Append-only per-market price series, ordered by timestamp.
///
/// Writes are uncapped so a cycle sees everything it recorded; bounding
/// happens in [`PriceHistory::trim`] at persistence time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceHistory {
    series: BTreeMap<String, Vec<PricePoint>>,
}

impl PriceHistory {
    pub fn record(&mut self, market_id: &str, probability: f64, now: DateTime<Utc>) {
        let series = self.series.entry(market_id.to_string()).or_default();
        let point = PricePoint { probability, timestamp: now };
        match series.last() {
            Some(last) if last.timestamp > now => {
                // out-of-order write: keep the series sorted
                let at = series.partition_point(|p| p.timestamp <= now);
                series.insert(at, point);
            }
            _ => series.push(point),
        }
    }

    /// Probability of the earliest point still retained for `market_id`.
    ///
    /// This is the reference for every delta. It is deliberately the window
    /// floor, not a strict "N hours ago" sample: once trimming or a restart has
    /// shortened the series, the oldest remaining point is used as-is.
    pub fn oldest_available(&self, market_id: &str) -> Option<f64> {
        self.series
            .get(market_id)
            .and_then(|s| s.first())
            .map(|p| p.probability)
    }

    #[cfg(test)]
    pub fn points(&self, market_id: &str) -> &[PricePoint] {
        self.series.get(market_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drop points older than `retention`, keep the most recent `max_points`
    /// per market, and forget markets left with nothing.
    pub fn trim(&mut self, now: DateTime<Utc>, retention: Duration, max_points: usize) {
        let cutoff = now - retention;
        self.series.retain(|_, series| {
            series.retain(|p| p.timestamp > cutoff);
            if series.len() > max_points {
                series.drain(..series.len() - max_points);
            }
            !series.is_empty()
        });
    }

    pub fn market_count(&self) -> usize {
        self.series.len()
    }

    pub fn point_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }
}
