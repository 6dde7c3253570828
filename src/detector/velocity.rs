use crate::detector::{at_least, delta_points};
use crate::state::PriceHistory;
use crate::types::{MarketSnapshot, MoveCandidate};

/// Big moves over the retained window, largest |delta| first.
///
/// The reference is the oldest retained point, not a fixed lookback. Markets
/// with no history are skipped: there is nothing to measure against.
pub fn detect_moves(
    markets: &[MarketSnapshot],
    history: &PriceHistory,
    threshold: f64,
) -> Vec<MoveCandidate> {
    let mut moves: Vec<MoveCandidate> = markets
        .iter()
        .filter_map(|market| {
            let (old, new, delta) = delta_points(history, market)?;
            at_least(delta.abs(), threshold).then(|| MoveCandidate {
                market: market.clone(),
                old,
                new,
                delta,
            })
        })
        .collect();

    moves.sort_by(|x, y| y.delta.abs().total_cmp(&x.delta.abs()));
    moves
}
