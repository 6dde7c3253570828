use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::fetcher::{http_client, json_f64, validate_probability};
use crate::fetcher::{FetchStats, MarketFilter, Rejection};
use crate::types::{MarketSnapshot, Platform};

pub struct KalshiClient {
    http: reqwest::Client,
    base_url: String,
}

impl KalshiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.into(),
        })
    }

    /// Fetch up to 500 open markets.
    pub async fn fetch(
        &self,
        filter: &MarketFilter,
        now: DateTime<Utc>,
    ) -> Result<(Vec<MarketSnapshot>, FetchStats)> {
        let url = format!("{}/markets?limit=500&status=open", self.base_url);
        let unavailable = |reason: String| AppError::provider(Platform::Kalshi, reason);

        let resp = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(unavailable(format!("HTTP {}", resp.status())));
        }
        let body: Value = resp.json().await.map_err(|e| unavailable(e.to_string()))?;
        let items = body
            .get("markets")
            .and_then(Value::as_array)
            .ok_or_else(|| unavailable("response has no markets array".to_string()))?;

        let (markets, stats) = parse_markets(items, filter, now);
        info!(
            platform = "kalshi",
            total = stats.api_total,
            qualified = stats.qualified,
            malformed = stats.malformed(),
            off_topic = stats.rejected_off_topic,
            expired = stats.rejected_expired,
            "Kalshi: {} markets qualified",
            stats.qualified
        );
        Ok((markets, stats))
    }
}

pub(crate) fn parse_markets(
    items: &[Value],
    filter: &MarketFilter,
    now: DateTime<Utc>,
) -> (Vec<MarketSnapshot>, FetchStats) {
    let mut stats = FetchStats {
        api_total: items.len(),
        ..FetchStats::default()
    };
    let mut seen = HashSet::new();
    let mut markets = Vec::new();

    for item in items {
        match parse_market(item, filter, now) {
            Ok(snapshot) if seen.insert(snapshot.id.clone()) => markets.push(snapshot),
            Ok(_) => stats.duplicates += 1,
            Err(rejection) => {
                debug!(?rejection, ticker = str_field(item, "ticker"), "skipping Kalshi market");
                stats.reject(rejection);
            }
        }
    }

    stats.qualified = markets.len();
    (markets, stats)
}

fn parse_market(
    item: &Value,
    filter: &MarketFilter,
    now: DateTime<Utc>,
) -> std::result::Result<MarketSnapshot, Rejection> {
    let title = str_field(item, "title").trim();
    let subtitle = str_field(item, "subtitle").trim();
    filter.check(title, subtitle, now)?;

    let ticker = Some(str_field(item, "ticker").trim())
        .filter(|t| !t.is_empty())
        .ok_or(Rejection::MissingId)?;
    let probability = validate_probability(yes_price(item).ok_or(Rejection::MissingProbability)?)?;

    Ok(MarketSnapshot {
        id: format!("kalshi_{ticker}"),
        title: title.to_string(),
        secondary_title: (!subtitle.is_empty()).then(|| subtitle.to_string()),
        platform: Platform::Kalshi,
        probability,
        url: format!("https://kalshi.com/markets/{}", ticker.to_lowercase()),
        observed_at: now,
    })
}

fn str_field<'a>(v: &'a Value, key: &str) -> &'a str {
    v.get(key).and_then(Value::as_str).unwrap_or("")
}

/// `yes_ask` cents, else `last_price` cents, else their `*_dollars` string
/// forms. Zero means "no quote" and falls through.
fn yes_price(item: &Value) -> Option<f64> {
    let cents = ["yes_ask", "last_price"]
        .into_iter()
        .filter_map(|key| json_f64(item.get(key)))
        .find(|c| *c != 0.0)
        .map(|c| c / 100.0);
    cents.or_else(|| {
        ["yes_ask_dollars", "last_price_dollars"]
            .into_iter()
            .filter_map(|key| json_f64(item.get(key)))
            .find(|d| *d != 0.0)
    })
}
