use std::collections::HashMap;

use crate::detector::at_least;
use crate::types::{GapCandidate, MarketSnapshot, MatchedPair};

/// Cross-platform gaps for matched pairs, largest first.
///
/// `gap = |a - b|` in points; a pair is a candidate when `gap >= threshold`.
/// Pairs whose ids are missing from either side are ignored. Capping the
/// number of alerts per cycle is left to the caller.
pub fn detect_gaps(
    pairs: &[MatchedPair],
    side_a: &[MarketSnapshot],
    side_b: &[MarketSnapshot],
    min_similarity: f64,
    threshold: f64,
) -> Vec<GapCandidate> {
    let by_id_a: HashMap<&str, &MarketSnapshot> =
        side_a.iter().map(|m| (m.id.as_str(), m)).collect();
    let by_id_b: HashMap<&str, &MarketSnapshot> =
        side_b.iter().map(|m| (m.id.as_str(), m)).collect();

    let mut candidates: Vec<GapCandidate> = pairs
        .iter()
        .filter(|p| p.similarity >= min_similarity)
        .filter_map(|pair| {
            let market_a = by_id_a.get(pair.id_a.as_str())?;
            let market_b = by_id_b.get(pair.id_b.as_str())?;
            let prob_a = market_a.points();
            let prob_b = market_b.points();
            let gap = (prob_a - prob_b).abs();
            at_least(gap, threshold).then(|| GapCandidate {
                pair: pair.clone(),
                market_a: (*market_a).clone(),
                market_b: (*market_b).clone(),
                prob_a,
                prob_b,
                gap,
            })
        })
        .collect();

    candidates.sort_by(|x, y| y.gap.total_cmp(&x.gap));
    candidates
}
