use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::AlertKey;

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Polymarket,
    Kalshi,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Platform::Polymarket => "Polymarket",
            Platform::Kalshi => "Kalshi",
        };
        write!(f, "{s}")
    }
}

/// One observation of a binary-outcome market, validated at the provider boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Platform-qualified id, stable across cycles (`poly_…`, `kalshi_…`).
    pub id: String,
    pub title: String,
    /// Kalshi subtitle or Polymarket parent-event title.
    pub secondary_title: Option<String>,
    pub platform: Platform,
    /// YES probability in [0, 1].
    pub probability: f64,
    pub url: String,
    pub observed_at: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Probability expressed in percentage points.
    #[inline]
    pub fn points(&self) -> f64 {
        self.probability * 100.0
    }
}

/// Same-question pairing between a platform A and a platform B market.
/// Recomputed every cycle, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPair {
    pub id_a: String,
    pub id_b: String,
    pub similarity: f64,
}

// ---------------------------------------------------------------------------
// Detector output
// ---------------------------------------------------------------------------

/// Cross-platform mispricing. All prices in percentage points.
#[derive(Debug, Clone)]
pub struct GapCandidate {
    pub pair: MatchedPair,
    pub market_a: MarketSnapshot,
    pub market_b: MarketSnapshot,
    pub prob_a: f64,
    pub prob_b: f64,
    pub gap: f64,
}

/// Single-market move across the retained history window.
#[derive(Debug, Clone)]
pub struct MoveCandidate {
    pub market: MarketSnapshot,
    pub old: f64,
    pub new: f64,
    pub delta: f64,
}

/// One market of a correlated pair moved, the other did not react.
#[derive(Debug, Clone)]
pub struct CorrelationCandidate {
    pub mover: MarketSnapshot,
    pub laggard: MarketSnapshot,
    pub delta_mover: f64,
    pub delta_laggard: f64,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertClass {
    Gap,
    Move,
    Correlation,
}

impl std::fmt::Display for AlertClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertClass::Gap => "gap",
            AlertClass::Move => "move",
            AlertClass::Correlation => "correlation",
        };
        write!(f, "{s}")
    }
}

/// A candidate that survived its class cooldown and is ready for delivery.
#[derive(Debug, Clone)]
pub enum Alert {
    Gap(GapCandidate),
    Move(MoveCandidate),
    Correlation(CorrelationCandidate),
}

impl Alert {
    pub fn class(&self) -> AlertClass {
        match self {
            Alert::Gap(_) => AlertClass::Gap,
            Alert::Move(_) => AlertClass::Move,
            Alert::Correlation(_) => AlertClass::Correlation,
        }
    }

    pub fn key(&self) -> AlertKey {
        match self {
            Alert::Gap(g) => AlertKey::pair(&g.pair.id_a, &g.pair.id_b),
            Alert::Move(m) => AlertKey::single(&m.market.id),
            Alert::Correlation(c) => AlertKey::pair(&c.mover.id, &c.laggard.id),
        }
    }
}
