//! Pure signal detectors: no I/O, no cooldown awareness, deterministic for a
//! given snapshot + history + matches. Every number they produce is in
//! percentage points.

pub mod correlation;
pub mod gap;
pub mod velocity;

pub use correlation::detect_correlation_anomalies;
pub use gap::detect_gaps;
pub use velocity::detect_moves;

use crate::state::PriceHistory;
use crate::types::MarketSnapshot;

/// `(old, new, delta)` against the oldest retained point, or None when the
/// market has no history at all.
pub(crate) fn delta_points(
    history: &PriceHistory,
    market: &MarketSnapshot,
) -> Option<(f64, f64, f64)> {
    let old = history.oldest_available(&market.id)? * 100.0;
    let new = market.points();
    Some((old, new, new - old))
}

/// Tolerance for threshold comparisons, so 0.55 * 100 still counts as 55.
pub(crate) const POINTS_EPSILON: f64 = 1e-9;

#[inline]
pub(crate) fn at_least(value: f64, threshold: f64) -> bool {
    value + POINTS_EPSILON >= threshold
}
