use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::fetcher::{http_client, is_expired_title, json_f64, validate_probability};
use crate::fetcher::{FetchStats, MarketFilter, Rejection};
use crate::types::{MarketSnapshot, Platform};

const TOP_EVENTS_QUERY: &[(&str, &str)] = &[
    ("active", "true"),
    ("closed", "false"),
    ("limit", "200"),
    ("order", "volume24hr"),
    ("ascending", "false"),
];

/// Page size of each per-keyword tag search.
const TAG_SEARCH_LIMIT: &str = "50";

pub struct PolymarketClient {
    http: reqwest::Client,
    base_url: String,
}

impl PolymarketClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: http_client()?,
            base_url: base_url.into(),
        })
    }

    /// Fetch the highest-volume open events, then search `tag=<keyword>` for
    /// each configured keyword, and flatten the markets of all of them.
    ///
    /// Only the volume pass is required. A failed tag search is logged and
    /// skipped.
    pub async fn fetch(
        &self,
        filter: &MarketFilter,
        now: DateTime<Utc>,
    ) -> Result<(Vec<MarketSnapshot>, FetchStats)> {
        let mut events = self.get_events(TOP_EVENTS_QUERY).await?;
        let top_events = events.len();

        for keyword in &filter.keywords {
            let query = [
                ("active", "true"),
                ("closed", "false"),
                ("limit", TAG_SEARCH_LIMIT),
                ("tag", keyword.as_str()),
            ];
            match self.get_events(&query).await {
                Ok(found) => {
                    debug!(tag = %keyword, events = found.len(), "Polymarket tag search");
                    events.extend(found);
                }
                Err(e) => warn!(tag = %keyword, "Polymarket tag search failed: {e}"),
            }
        }

        let (markets, stats) = parse_events(&events, filter, now);
        info!(
            platform = "polymarket",
            events = events.len(),
            top_events,
            total = stats.api_total,
            qualified = stats.qualified,
            duplicates = stats.duplicates,
            malformed = stats.malformed(),
            off_topic = stats.rejected_off_topic,
            expired = stats.rejected_expired,
            "Polymarket: {} markets qualified",
            stats.qualified
        );
        Ok((markets, stats))
    }

    async fn get_events(&self, query: &[(&str, &str)]) -> Result<Vec<Value>> {
        let url = format!("{}/events", self.base_url);
        let unavailable = |reason: String| AppError::provider(Platform::Polymarket, reason);

        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(unavailable(format!("HTTP {}", resp.status())));
        }
        let body: Value = resp.json().await.map_err(|e| unavailable(e.to_string()))?;
        match body {
            Value::Array(events) => Ok(events),
            _ => Err(unavailable("/events response was not an array".to_string())),
        }
    }
}

pub(crate) fn parse_events(
    events: &[Value],
    filter: &MarketFilter,
    now: DateTime<Utc>,
) -> (Vec<MarketSnapshot>, FetchStats) {
    let mut stats = FetchStats::default();
    let mut seen = HashSet::new();
    let mut markets = Vec::new();

    for event in events {
        let Some(event_markets) = event.get("markets").and_then(Value::as_array) else {
            continue;
        };
        stats.api_total += event_markets.len();

        for market in event_markets {
            match parse_market(event, market, filter, now) {
                Ok(snapshot) => {
                    if seen.insert(snapshot.id.clone()) {
                        markets.push(snapshot);
                    } else {
                        stats.duplicates += 1;
                    }
                }
                Err(rejection) => {
                    debug!(
                        ?rejection,
                        event = str_field(event, "title"),
                        "skipping Polymarket market"
                    );
                    stats.reject(rejection);
                }
            }
        }
    }

    stats.qualified = markets.len();
    (markets, stats)
}

fn parse_market(
    event: &Value,
    market: &Value,
    filter: &MarketFilter,
    now: DateTime<Utc>,
) -> std::result::Result<MarketSnapshot, Rejection> {
    let event_title = str_field(event, "title");
    let description = str_field(event, "description");

    let title = [str_field(market, "question"), str_field(market, "groupItemTitle")]
        .into_iter()
        .find(|t| !t.trim().is_empty())
        .unwrap_or(event_title);

    filter.check(title, &format!("{event_title} {description}"), now)?;
    if is_expired_title(event_title, now) {
        return Err(Rejection::Expired);
    }

    let id = id_field(market)
        .or_else(|| id_field(event))
        .ok_or(Rejection::MissingId)?;
    let probability =
        validate_probability(yes_price(market).ok_or(Rejection::MissingProbability)?)?;

    let slug = str_field(event, "slug");
    Ok(MarketSnapshot {
        id: format!("poly_{id}"),
        title: title.trim().to_string(),
        secondary_title: (!event_title.trim().is_empty()).then(|| event_title.trim().to_string()),
        platform: Platform::Polymarket,
        probability,
        url: if slug.is_empty() {
            String::new()
        } else {
            format!("https://polymarket.com/event/{slug}")
        },
        observed_at: now,
    })
}

/// `outcomePrices[0]` (a JSON-encoded string array, or a plain array), else a
/// non-zero `bestAsk`, else a non-zero `lastTradePrice`.
fn yes_price(market: &Value) -> Option<f64> {
    let from_outcomes = match market.get("outcomePrices") {
        Some(Value::String(raw)) => serde_json::from_str::<Vec<Value>>(raw)
            .ok()
            .and_then(|prices| json_f64(prices.first())),
        Some(Value::Array(prices)) => json_f64(prices.first()),
        _ => None,
    };
    from_outcomes.or_else(|| {
        ["bestAsk", "lastTradePrice"]
            .into_iter()
            .filter_map(|key| json_f64(market.get(key)))
            .find(|p| *p != 0.0)
    })
}

fn str_field<'a>(v: &'a Value, key: &str) -> &'a str {
    v.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Ids arrive as strings or numbers.
fn id_field(v: &Value) -> Option<String> {
    match v.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
