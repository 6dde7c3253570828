//! One detection cycle over an explicitly owned [`PersistedState`].
//!
//! normalize → match → record history → detect → cooldown filter. Nothing
//! here awaits or touches the network; the scanner wraps it with fetches,
//! delivery and persistence.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::DetectionConfig;
use crate::detector::{detect_correlation_anomalies, detect_gaps, detect_moves};
use crate::matcher::match_markets;
use crate::state::PersistedState;
use crate::types::{Alert, AlertClass, MarketSnapshot, MatchedPair};

/// What one cycle produced.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub pairs: Vec<MatchedPair>,
    /// Alerts that passed their cooldown, already marked fired.
    pub alerts: Vec<Alert>,
    pub gap_candidates: usize,
    pub move_candidates: usize,
    pub correlation_candidates: usize,
    /// Candidates held back by an active cooldown.
    pub suppressed: usize,
}

impl CycleOutcome {
    pub fn count(&self, class: AlertClass) -> usize {
        self.alerts.iter().filter(|a| a.class() == class).count()
    }
}

/// Run detection for one cycle and mutate `state` in place.
///
/// `side_a`/`side_b` are the two platforms' snapshots; either may be empty
/// when its provider was unavailable. Candidates are filtered through the
/// per-class cooldown, capped per class, and marked fired at `now`.
pub fn run_cycle(
    state: &mut PersistedState,
    cfg: &DetectionConfig,
    side_a: &[MarketSnapshot],
    side_b: &[MarketSnapshot],
    now: DateTime<Utc>,
) -> CycleOutcome {
    state.scan_count += 1;
    state.last_run = Some(now);

    let all_markets: Vec<MarketSnapshot> = side_a.iter().chain(side_b).cloned().collect();
    for market in &all_markets {
        state.price_history.record(&market.id, market.probability, now);
    }

    let pairs = match_markets(side_a, side_b, cfg.match_threshold);
    debug!(
        pairs = pairs.len(),
        side_a = side_a.len(),
        side_b = side_b.len(),
        "matched {} cross-platform pairs",
        pairs.len()
    );

    let mut outcome = CycleOutcome::default();

    let gaps = detect_gaps(&pairs, side_a, side_b, cfg.match_threshold, cfg.gap_threshold);
    outcome.gap_candidates = gaps.len();
    let gaps = gaps.into_iter().map(Alert::Gap);
    admit(state, &mut outcome, gaps, AlertClass::Gap, cfg.gap_cooldown, cfg.max_gap_alerts, now);

    let moves = detect_moves(&all_markets, &state.price_history, cfg.move_threshold);
    outcome.move_candidates = moves.len();
    let moves = moves.into_iter().map(Alert::Move);
    admit(
        state,
        &mut outcome,
        moves,
        AlertClass::Move,
        cfg.move_cooldown,
        cfg.max_move_alerts,
        now,
    );

    let anomalies = detect_correlation_anomalies(&all_markets, &state.price_history, cfg);
    outcome.correlation_candidates = anomalies.len();
    let anomalies = anomalies.into_iter().map(Alert::Correlation);
    admit(
        state,
        &mut outcome,
        anomalies,
        AlertClass::Correlation,
        cfg.correlation_cooldown,
        cfg.max_correlation_alerts,
        now,
    );

    let swept = state.cooldowns_gap.sweep(cfg.gap_cooldown, now)
        + state.cooldowns_move.sweep(cfg.move_cooldown, now)
        + state.cooldowns_correlation.sweep(cfg.correlation_cooldown, now);
    if swept > 0 {
        debug!(swept, "cooldown keys expired");
    }

    outcome.pairs = pairs;
    info!(
        scan = state.scan_count,
        markets = all_markets.len(),
        pairs = outcome.pairs.len(),
        gaps = outcome.count(AlertClass::Gap),
        moves = outcome.count(AlertClass::Move),
        correlations = outcome.count(AlertClass::Correlation),
        suppressed = outcome.suppressed,
        "Cycle #{} | {} markets | {} pairs | alerts gap={} move={} corr={} | suppressed={}",
        state.scan_count,
        all_markets.len(),
        outcome.pairs.len(),
        outcome.count(AlertClass::Gap),
        outcome.count(AlertClass::Move),
        outcome.count(AlertClass::Correlation),
        outcome.suppressed,
    );
    outcome
}

/// Cooldown filter plus per-class cap, in candidate order.
fn admit(
    state: &mut PersistedState,
    outcome: &mut CycleOutcome,
    candidates: impl Iterator<Item = Alert>,
    class: AlertClass,
    cooldown: Duration,
    cap: usize,
    now: DateTime<Utc>,
) {
    let mut admitted = 0;
    for alert in candidates {
        if admitted >= cap {
            break;
        }
        let key = alert.key();
        let cooldowns = state.cooldowns_mut(class);
        if !cooldowns.can_fire(&key, cooldown, now) {
            debug!(class = %class, key = %key, "suppressed by cooldown");
            outcome.suppressed += 1;
            continue;
        }
        cooldowns.mark_fired(key, now);
        outcome.alerts.push(alert);
        admitted += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn snap(id: &str, title: &str, platform: Platform, probability: f64) -> MarketSnapshot {
        MarketSnapshot {
            id: id.to_string(),
            title: title.to_string(),
            secondary_title: None,
            platform,
            probability,
            url: format!("https://example.com/{id}"),
            observed_at: t0(),
        }
    }

    #[test]
    fn same_question_gap_alerts_once_per_cooldown() {
        let cfg = DetectionConfig::default();
        let mut state = PersistedState::default();
        let a = vec![snap(
            "poly_1",
            "Will Khamenei leave office in 2026?",
            Platform::Polymarket,
            0.70,
        )];
        let b = vec![snap(
            "kalshi_KXKHAM",
            "Khamenei leaves office in 2026",
            Platform::Kalshi,
            0.63,
        )];

        let first = run_cycle(&mut state, &cfg, &a, &b, t0());
        assert_eq!(first.pairs.len(), 1);
        assert!(first.pairs[0].similarity >= 0.45);
        assert_eq!(first.alerts.len(), 1, "alerts={:?}", first.alerts);
        match &first.alerts[0] {
            Alert::Gap(g) => assert!((g.gap - 7.0).abs() < 1e-6, "gap={}", g.gap),
            other => panic!("expected gap alert, got {other:?}"),
        }

        let second = run_cycle(&mut state, &cfg, &a, &b, t0() + Duration::minutes(3));
        assert!(second.alerts.is_empty(), "cooldown must hold: {:?}", second.alerts);
        assert_eq!(second.gap_candidates, 1);
        assert_eq!(second.suppressed, 1);
        assert_eq!(state.scan_count, 2);
        assert_eq!(state.last_run, Some(t0() + Duration::minutes(3)));

        let later = run_cycle(&mut state, &cfg, &a, &b, t0() + Duration::minutes(31));
        assert_eq!(later.count(AlertClass::Gap), 1, "cooldown elapsed");
    }

    #[test]
    fn reversed_roles_share_the_gap_cooldown() {
        let cfg = DetectionConfig::default();
        let mut state = PersistedState::default();
        let poly = vec![snap("poly_1", "Iran nuclear test in 2026", Platform::Polymarket, 0.30)];
        let kalshi = vec![snap("kalshi_1", "Iran nuclear test in 2026", Platform::Kalshi, 0.40)];

        assert_eq!(run_cycle(&mut state, &cfg, &poly, &kalshi, t0()).alerts.len(), 1);
        let swapped = run_cycle(&mut state, &cfg, &kalshi, &poly, t0() + Duration::minutes(1));
        assert_eq!(swapped.count(AlertClass::Gap), 0);
    }

    #[test]
    fn history_drives_move_alerts_across_cycles() {
        let cfg = DetectionConfig::default();
        let mut state = PersistedState::default();
        let before = vec![snap("poly_1", "US strikes Iran by March", Platform::Polymarket, 0.40)];
        let after = vec![snap("poly_1", "US strikes Iran by March", Platform::Polymarket, 0.55)];

        let first = run_cycle(&mut state, &cfg, &before, &[], t0());
        assert!(first.alerts.is_empty(), "a single point cannot move");

        let second = run_cycle(&mut state, &cfg, &after, &[], t0() + Duration::hours(2));
        assert_eq!(second.count(AlertClass::Move), 1);
        match &second.alerts[0] {
            Alert::Move(m) => assert!((m.delta - 15.0).abs() < 1e-6),
            other => panic!("expected move alert, got {other:?}"),
        }
        assert_eq!(state.price_history.points("poly_1").len(), 2);
    }

    #[test]
    fn per_class_cap_limits_alerts() {
        let cfg = DetectionConfig {
            max_move_alerts: 2,
            correlation_hints: Vec::new(),
            correlation_similarity: 1.0,
            ..DetectionConfig::default()
        };
        let mut state = PersistedState::default();
        let ids = ["poly_a", "poly_b", "poly_c", "poly_d"];
        let start: Vec<_> = ids
            .iter()
            .map(|id| snap(id, &format!("market {id}"), Platform::Polymarket, 0.20))
            .collect();
        let end: Vec<_> = ids
            .iter()
            .map(|id| snap(id, &format!("market {id}"), Platform::Polymarket, 0.50))
            .collect();

        run_cycle(&mut state, &cfg, &start, &[], t0());
        let out = run_cycle(&mut state, &cfg, &end, &[], t0() + Duration::hours(1));
        assert_eq!(out.move_candidates, 4);
        assert_eq!(out.count(AlertClass::Move), 2);
        assert_eq!(state.cooldowns_move.len(), 2);
    }

    #[test]
    fn one_empty_platform_still_runs_single_platform_detectors() {
        let cfg = DetectionConfig::default();
        let mut state = PersistedState::default();
        state.price_history.record("kalshi_1", 0.10, t0() - Duration::hours(10));
        let kalshi = vec![snap("kalshi_1", "Regime change in Iran", Platform::Kalshi, 0.30)];

        let out = run_cycle(&mut state, &cfg, &[], &kalshi, t0());
        assert!(out.pairs.is_empty());
        assert_eq!(out.count(AlertClass::Move), 1);
    }
}
