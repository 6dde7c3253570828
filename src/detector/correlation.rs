use crate::config::DetectionConfig;
use crate::detector::{at_least, delta_points};
use crate::matcher::{normalize_title, similarity};
use crate::state::PriceHistory;
use crate::types::{CorrelationCandidate, MarketSnapshot};

struct Moved<'a> {
    market: &'a MarketSnapshot,
    lowered: String,
    normalized: String,
    delta: f64,
}

/// Both titles are linked when one keyword of a hint pair appears in each,
/// in either order.
fn linked_by_hint(a: &str, b: &str, hints: &[(String, String)]) -> bool {
    hints.iter().any(|(k1, k2)| {
        (a.contains(k1.as_str()) && b.contains(k2.as_str()))
            || (a.contains(k2.as_str()) && b.contains(k1.as_str()))
    })
}

/// Pairs expected to move together where exactly one side moved decisively.
///
/// Looks at every unordered pair of markets that have history, across both
/// platforms. A pair is "expected to correlate" via the keyword hint table,
/// or failing that via normalized-title similarity strictly above
/// `correlation_similarity`. It is an anomaly only when one side's |delta|
/// reaches `correlation_threshold` while the other's stays below
/// `laggard_ratio * correlation_threshold`. Output is in discovery order.
pub fn detect_correlation_anomalies(
    markets: &[MarketSnapshot],
    history: &PriceHistory,
    cfg: &DetectionConfig,
) -> Vec<CorrelationCandidate> {
    let moved: Vec<Moved<'_>> = markets
        .iter()
        .filter_map(|market| {
            let (_, _, delta) = delta_points(history, market)?;
            Some(Moved {
                market,
                lowered: market.title.to_lowercase(),
                normalized: normalize_title(&market.title),
                delta,
            })
        })
        .collect();

    let threshold = cfg.correlation_threshold;
    let quiet_below = threshold * cfg.laggard_ratio;
    let mut anomalies = Vec::new();

    for (i, a) in moved.iter().enumerate() {
        for b in &moved[i + 1..] {
            let big_a = at_least(a.delta.abs(), threshold);
            let big_b = at_least(b.delta.abs(), threshold);
            // Cheap exit before any string work: exactly one side must move.
            if big_a == big_b {
                continue;
            }
            let (mover, laggard) = if big_a { (a, b) } else { (b, a) };
            if laggard.delta.abs() >= quiet_below {
                continue;
            }

            let correlated = linked_by_hint(&a.lowered, &b.lowered, &cfg.correlation_hints)
                || similarity(&a.normalized, &b.normalized) > cfg.correlation_similarity;
            if !correlated {
                continue;
            }

            anomalies.push(CorrelationCandidate {
                mover: mover.market.clone(),
                laggard: laggard.market.clone(),
                delta_mover: mover.delta,
                delta_laggard: laggard.delta,
            });
        }
    }

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn snap(id: &str, title: &str, probability: f64) -> MarketSnapshot {
        MarketSnapshot {
            id: id.to_string(),
            title: title.to_string(),
            secondary_title: None,
            platform: Platform::Polymarket,
            probability,
            url: String::new(),
            observed_at: now(),
        }
    }

    /// Markets whose history starts at `start` and now sit at `start + delta` points.
    fn setup(specs: &[(&str, &str, f64, f64)]) -> (Vec<MarketSnapshot>, PriceHistory) {
        let mut history = PriceHistory::default();
        let mut markets = Vec::new();
        for &(id, title, start, delta) in specs {
            history.record(id, start / 100.0, now() - Duration::hours(6));
            markets.push(snap(id, title, (start + delta) / 100.0));
        }
        (markets, history)
    }

    #[test]
    fn keyword_linked_pair_with_one_mover_is_an_anomaly() {
        let (markets, history) = setup(&[
            ("poly_1", "Iran nuclear deal signed by June?", 30.0, 12.0),
            ("kalshi_1", "New US sanctions on Tehran oil exports", 50.0, 1.0),
        ]);
        let found = detect_correlation_anomalies(&markets, &history, &DetectionConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].mover.id, "poly_1");
        assert_eq!(found[0].laggard.id, "kalshi_1");
        assert!((found[0].delta_mover - 12.0).abs() < 1e-6);
        assert!((found[0].delta_laggard - 1.0).abs() < 1e-6);
    }

    #[test]
    fn both_sides_moving_is_not_an_anomaly() {
        let (markets, history) = setup(&[
            ("poly_1", "Iran nuclear deal signed by June?", 30.0, 12.0),
            ("kalshi_1", "New US sanctions on Tehran oil exports", 50.0, 11.0),
        ]);
        let cfg = DetectionConfig::default();
        assert!(detect_correlation_anomalies(&markets, &history, &cfg).is_empty());
    }

    #[test]
    fn laggard_must_be_decisively_quiet() {
        // 4 points is below the 10-point threshold but above 0.3 × 10.
        let (markets, history) = setup(&[
            ("poly_1", "Iran nuclear deal signed by June?", 30.0, 12.0),
            ("kalshi_1", "New US sanctions on Tehran oil exports", 50.0, -4.0),
        ]);
        let cfg = DetectionConfig::default();
        assert!(detect_correlation_anomalies(&markets, &history, &cfg).is_empty());
    }

    #[test]
    fn mover_can_be_the_second_market() {
        let (markets, history) = setup(&[
            ("poly_1", "Israel attack on Iran before April", 20.0, 0.5),
            ("poly_2", "US-Iran war declared in 2026", 10.0, -15.0),
            ("kalshi_1", "Iran launches strike on Israel", 40.0, 2.0),
        ]);
        let found = detect_correlation_anomalies(&markets, &history, &DetectionConfig::default());
        let pairs: Vec<_> = found
            .iter()
            .map(|c| (c.mover.id.as_str(), c.laggard.id.as_str()))
            .collect();
        // "war" in poly_2 links to "strike" in kalshi_1; poly_1/kalshi_1 never moved.
        assert!(pairs.contains(&("poly_2", "kalshi_1")), "pairs={pairs:?}");
        assert!(found.iter().all(|c| c.mover.id == "poly_2"));
    }

    #[test]
    fn similar_titles_correlate_without_a_hint() {
        let cfg = DetectionConfig {
            correlation_hints: Vec::new(),
            ..DetectionConfig::default()
        };
        let (markets, history) = setup(&[
            ("poly_1", "Will the Fed cut rates in March?", 40.0, 14.0),
            ("kalshi_1", "Fed cuts rates in March", 42.0, 0.0),
            ("kalshi_2", "Bitcoin above 100k on Friday", 60.0, 0.0),
        ]);
        let found = detect_correlation_anomalies(&markets, &history, &cfg);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].laggard.id, "kalshi_1");
    }

    #[test]
    fn markets_without_history_are_ignored() {
        let (mut markets, history) =
            setup(&[("poly_1", "Iran nuclear deal signed by June?", 30.0, 12.0)]);
        markets.push(snap("kalshi_new", "New US sanctions on Iran", 0.5));
        let cfg = DetectionConfig::default();
        assert!(detect_correlation_anomalies(&markets, &history, &cfg).is_empty());
    }
}
