pub mod normalize;
pub mod similarity;

pub use normalize::normalize_title;
pub use similarity::similarity;

use tracing::debug;

use crate::types::{MarketSnapshot, MatchedPair};

/// Normalized comparison fields for one market, computed once per cycle.
struct Titles {
    title: String,
    secondary: Option<String>,
}

impl Titles {
    fn of(market: &MarketSnapshot) -> Self {
        Self {
            title: normalize_title(&market.title),
            secondary: market.secondary_title.as_deref().map(normalize_title),
        }
    }
}

/// Best score across the attempted comparisons: title vs title, A title vs
/// B subtitle, A parent-event title vs B title.
fn pair_score(a: &Titles, b: &Titles) -> f64 {
    let mut score = similarity(&a.title, &b.title);
    if let Some(b_sub) = &b.secondary {
        score = score.max(similarity(&a.title, b_sub));
    }
    if let Some(a_parent) = &a.secondary {
        score = score.max(similarity(a_parent, &b.title));
    }
    score
}

/// Greedy cross-platform pairing.
///
/// A-markets are visited in input order; each takes the highest-scoring B
/// market not yet consumed (first one wins a tie). Pairs scoring below
/// `threshold` are discarded and both markets stay standalone. A B-market is
/// consumed at most once per call.
pub fn match_markets(
    side_a: &[MarketSnapshot],
    side_b: &[MarketSnapshot],
    threshold: f64,
) -> Vec<MatchedPair> {
    let titles_b: Vec<Titles> = side_b.iter().map(Titles::of).collect();
    let mut consumed = vec![false; side_b.len()];
    let mut pairs = Vec::new();

    for market_a in side_a {
        let titles_a = Titles::of(market_a);

        let mut best: Option<(usize, f64)> = None;
        for (idx, titles) in titles_b.iter().enumerate() {
            if consumed[idx] {
                continue;
            }
            let score = pair_score(&titles_a, titles);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }

        let Some((idx, score)) = best else {
            continue;
        };
        if score < threshold {
            debug!(
                market_id = %market_a.id,
                best_score = score,
                "no counterpart above {threshold:.2}"
            );
            continue;
        }

        consumed[idx] = true;
        pairs.push(MatchedPair {
            id_a: market_a.id.clone(),
            id_b: side_b[idx].id.clone(),
            similarity: score,
        });
    }

    pairs
}
