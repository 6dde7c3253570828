//! Provider boundary: fetch each platform, validate every entry once, and
//! hand the core typed [`MarketSnapshot`]s. A failed fetch is
//! `AppError::ProviderUnavailable`; a bad entry is a counted [`Rejection`].

pub mod kalshi;
pub mod polymarket;

pub use kalshi::KalshiClient;
pub use polymarket::PolymarketClient;

use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};

use crate::config::HTTP_TIMEOUT_SECS;
use crate::error::Result;

/// Why a single provider entry was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MissingId,
    MissingProbability,
    ProbabilityOutOfRange,
    OffTopic,
    Expired,
}

#[derive(Debug, Default)]
pub struct FetchStats {
    pub api_total: usize,
    pub rejected_missing_id: usize,
    pub rejected_missing_probability: usize,
    pub rejected_out_of_range: usize,
    pub rejected_off_topic: usize,
    pub rejected_expired: usize,
    pub duplicates: usize,
    pub qualified: usize,
}

impl FetchStats {
    pub fn reject(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::MissingId => self.rejected_missing_id += 1,
            Rejection::MissingProbability => self.rejected_missing_probability += 1,
            Rejection::ProbabilityOutOfRange => self.rejected_out_of_range += 1,
            Rejection::OffTopic => self.rejected_off_topic += 1,
            Rejection::Expired => self.rejected_expired += 1,
        }
    }

    /// Entries that failed validation (as opposed to being filtered out).
    pub fn malformed(&self) -> usize {
        self.rejected_missing_id + self.rejected_missing_probability + self.rejected_out_of_range
    }
}

/// Topic and staleness filter applied to every provider entry.
#[derive(Debug, Clone, Default)]
pub struct MarketFilter {
    /// Lowercase keywords; empty accepts everything.
    pub keywords: Vec<String>,
}

impl MarketFilter {
    pub fn new(keywords: Vec<String>) -> Self {
        Self { keywords }
    }

    pub fn check(
        &self,
        title: &str,
        context: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), Rejection> {
        if !self.keywords.is_empty() {
            let text = format!("{title} {context}").to_lowercase();
            if !self.keywords.iter().any(|kw| text.contains(kw.as_str())) {
                return Err(Rejection::OffTopic);
            }
        }
        if is_expired_title(title, now) {
            return Err(Rejection::Expired);
        }
        Ok(())
    }
}

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sep", 9),
    ("oct", 10),
    ("nov", 11),
    ("dec", 12),
];

/// True when the title names a month and a `20xx` year that is already over.
pub fn is_expired_title(title: &str, now: DateTime<Utc>) -> bool {
    let text = title.to_lowercase();
    let Some(year) = first_year(&text) else {
        return false;
    };
    let words: Vec<&str> = text
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    MONTHS.iter().any(|&(name, month)| {
        words.contains(&name)
            && (year < now.year() || (year == now.year() && month < now.month()))
    })
}

/// First standalone `20xx` in the text.
fn first_year(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    (0..bytes.len().saturating_sub(3)).find_map(|i| {
        let window = &bytes[i..i + 4];
        let bounded_left = i == 0 || !bytes[i - 1].is_ascii_digit();
        let bounded_right = bytes.get(i + 4).map_or(true, |b| !b.is_ascii_digit());
        if !(window.starts_with(b"20") && window.iter().all(u8::is_ascii_digit)) {
            return None;
        }
        if !(bounded_left && bounded_right) {
            return None;
        }
        std::str::from_utf8(window).ok()?.parse::<i32>().ok()
    })
}

/// Accept a JSON number or a numeric string.
pub(crate) fn json_f64(v: Option<&serde_json::Value>) -> Option<f64> {
    let v = v?;
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

pub(crate) fn validate_probability(p: f64) -> std::result::Result<f64, Rejection> {
    if p.is_finite() && (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(Rejection::ProbabilityOutOfRange)
    }
}

pub(crate) fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?)
}
