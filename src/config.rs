use std::str::FromStr;

use chrono::Duration;

use crate::error::{AppError, Result};
use crate::state::RetentionLimits;

pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";
pub const KALSHI_API_URL: &str = "https://api.elections.kalshi.com/trade-api/v2";
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Provider and notifier request timeout (seconds).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Delay before each notifier retry, in milliseconds. Attempts = len + 1.
pub const NOTIFY_BACKOFF_MS: &[u64] = &[500, 1_000, 2_000, 4_000];

/// Upper bound on a server-requested `retry_after` wait (seconds).
pub const NOTIFY_MAX_RETRY_AFTER_SECS: u64 = 60;

/// Telegram rejects messages above 4096 chars; leave headroom.
pub const NOTIFY_CHUNK_CHARS: usize = 4_000;

/// Markets listed in a periodic snapshot message.
pub const SNAPSHOT_MAX_MARKETS: usize = 15;

/// Keyword pairs whose markets are expected to move together. One keyword
/// must appear in each title, in either order.
pub const DEFAULT_CORRELATION_HINTS: &[(&str, &str)] = &[
    ("supreme leader", "regime"),
    ("supreme leader", "succession"),
    ("nuclear", "sanctions"),
    ("war", "strike"),
    ("israel", "attack"),
    ("regime", "revolution"),
    ("irgc", "regime"),
    ("mojtaba", "supreme leader"),
];

/// Detector thresholds, all in percentage points unless noted.
pub mod detection_defaults {
    pub const MATCH_THRESHOLD: f64 = 0.45;
    pub const GAP_THRESHOLD_PTS: f64 = 5.0;
    pub const MOVE_THRESHOLD_PTS: f64 = 10.0;
    pub const CORRELATION_THRESHOLD_PTS: f64 = 10.0;
    pub const CORRELATION_SIMILARITY: f64 = 0.4;
    pub const LAGGARD_RATIO: f64 = 0.3;
    pub const GAP_COOLDOWN_MINS: i64 = 30;
    pub const MOVE_COOLDOWN_MINS: i64 = 120;
    pub const CORRELATION_COOLDOWN_MINS: i64 = 60;
    pub const MAX_GAP_ALERTS: usize = 3;
    pub const MAX_MOVE_ALERTS: usize = 3;
    pub const MAX_CORRELATION_ALERTS: usize = 2;
}

pub mod retention_defaults {
    pub const HISTORY_WINDOW_HOURS: i64 = 25;
    pub const HISTORY_MAX_POINTS: usize = 500;
    pub const MAX_COOLDOWN_KEYS: usize = 5_000;
}

/// Knobs for one detection cycle.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Minimum title similarity for a cross-platform pair (0–1).
    pub match_threshold: f64,
    pub gap_threshold: f64,
    pub move_threshold: f64,
    pub correlation_threshold: f64,
    /// Fallback title similarity above which two markets count as correlated (0–1).
    pub correlation_similarity: f64,
    /// Laggard must stay below `laggard_ratio * correlation_threshold`.
    pub laggard_ratio: f64,
    pub correlation_hints: Vec<(String, String)>,
    pub gap_cooldown: Duration,
    pub move_cooldown: Duration,
    pub correlation_cooldown: Duration,
    pub max_gap_alerts: usize,
    pub max_move_alerts: usize,
    pub max_correlation_alerts: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        use detection_defaults::*;
        Self {
            match_threshold: MATCH_THRESHOLD,
            gap_threshold: GAP_THRESHOLD_PTS,
            move_threshold: MOVE_THRESHOLD_PTS,
            correlation_threshold: CORRELATION_THRESHOLD_PTS,
            correlation_similarity: CORRELATION_SIMILARITY,
            laggard_ratio: LAGGARD_RATIO,
            correlation_hints: DEFAULT_CORRELATION_HINTS
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
            gap_cooldown: Duration::minutes(GAP_COOLDOWN_MINS),
            move_cooldown: Duration::minutes(MOVE_COOLDOWN_MINS),
            correlation_cooldown: Duration::minutes(CORRELATION_COOLDOWN_MINS),
            max_gap_alerts: MAX_GAP_ALERTS,
            max_move_alerts: MAX_MOVE_ALERTS,
            max_correlation_alerts: MAX_CORRELATION_ALERTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub state_file: String,
    pub api_port: u16,
    pub scan_interval_secs: u64,
    pub gamma_api_url: String,
    pub kalshi_api_url: String,
    /// Unset token or chat id → alerts are logged, not sent.
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    /// Topic filter applied at the provider boundary (MARKET_KEYWORDS, comma-separated).
    /// Empty accepts every market.
    pub market_keywords: Vec<String>,
    /// Send a heartbeat every N scans (0 = never).
    pub heartbeat_every_scans: u64,
    /// Send a market snapshot every N scans (0 = never).
    pub snapshot_every_scans: u64,
    pub detection: DetectionConfig,
    pub retention: RetentionLimits,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        use detection_defaults::*;
        use retention_defaults::*;

        let detection = DetectionConfig {
            match_threshold: env_parse("MATCH_THRESHOLD", MATCH_THRESHOLD)?,
            gap_threshold: env_parse("GAP_THRESHOLD_PTS", GAP_THRESHOLD_PTS)?,
            move_threshold: env_parse("MOVE_THRESHOLD_PTS", MOVE_THRESHOLD_PTS)?,
            correlation_threshold: env_parse(
                "CORRELATION_THRESHOLD_PTS",
                CORRELATION_THRESHOLD_PTS,
            )?,
            correlation_similarity: env_parse("CORRELATION_SIMILARITY", CORRELATION_SIMILARITY)?,
            laggard_ratio: env_parse("LAGGARD_RATIO", LAGGARD_RATIO)?,
            correlation_hints: match std::env::var("CORRELATION_HINTS") {
                Ok(raw) => parse_hints(&raw)?,
                Err(_) => DetectionConfig::default().correlation_hints,
            },
            gap_cooldown: env_minutes("GAP_COOLDOWN_MINS", GAP_COOLDOWN_MINS)?,
            move_cooldown: env_minutes("MOVE_COOLDOWN_MINS", MOVE_COOLDOWN_MINS)?,
            correlation_cooldown: env_minutes(
                "CORRELATION_COOLDOWN_MINS",
                CORRELATION_COOLDOWN_MINS,
            )?,
            max_gap_alerts: env_parse("MAX_GAP_ALERTS", MAX_GAP_ALERTS)?,
            max_move_alerts: env_parse("MAX_MOVE_ALERTS", MAX_MOVE_ALERTS)?,
            max_correlation_alerts: env_parse("MAX_CORRELATION_ALERTS", MAX_CORRELATION_ALERTS)?,
        };

        let retention = RetentionLimits {
            history_window: checked_duration(
                "HISTORY_RETENTION_HOURS",
                env_parse("HISTORY_RETENTION_HOURS", HISTORY_WINDOW_HOURS)?,
                Duration::try_hours,
            )?,
            history_max_points: env_parse("HISTORY_MAX_POINTS", HISTORY_MAX_POINTS)?,
            max_cooldown_keys: env_parse("MAX_COOLDOWN_KEYS", MAX_COOLDOWN_KEYS)?,
        };

        let cfg = Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            state_file: std::env::var("STATE_FILE")
                .unwrap_or_else(|_| "data/scanner_state.json".to_string()),
            api_port: env_parse("API_PORT", 3000u16)?,
            scan_interval_secs: env_parse("SCAN_INTERVAL_SECS", 180u64)?,
            gamma_api_url: std::env::var("GAMMA_API_URL")
                .unwrap_or_else(|_| GAMMA_API_URL.to_string()),
            kalshi_api_url: std::env::var("KALSHI_API_URL")
                .unwrap_or_else(|_| KALSHI_API_URL.to_string()),
            telegram_bot_token: non_empty_var("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: non_empty_var("TELEGRAM_CHAT_ID"),
            market_keywords: std::env::var("MARKET_KEYWORDS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            heartbeat_every_scans: env_parse("HEARTBEAT_EVERY_SCANS", 120u64)?,
            snapshot_every_scans: env_parse("SNAPSHOT_EVERY_SCANS", 10u64)?,
            detection,
            retention,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.scan_interval_secs == 0 {
            return Err(AppError::Config("SCAN_INTERVAL_SECS must be positive".to_string()));
        }
        for (name, v) in [
            ("MATCH_THRESHOLD", self.detection.match_threshold),
            ("CORRELATION_SIMILARITY", self.detection.correlation_similarity),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(AppError::Config(format!("{name} must be within [0, 1], got {v}")));
            }
        }
        if self.retention.history_window.is_zero() {
            return Err(AppError::Config("HISTORY_RETENTION_HOURS must be positive".to_string()));
        }
        if self.retention.history_max_points == 0 {
            return Err(AppError::Config("HISTORY_MAX_POINTS must be positive".to_string()));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw:?}"))),
        _ => Ok(default),
    }
}

fn env_minutes(key: &str, default: i64) -> Result<Duration> {
    checked_duration(key, env_parse(key, default)?, Duration::try_minutes)
}

/// Negative amounts and amounts beyond chrono's range are config errors.
fn checked_duration(
    key: &str,
    amount: i64,
    to_duration: fn(i64) -> Option<Duration>,
) -> Result<Duration> {
    if amount < 0 {
        return Err(AppError::Config(format!("{key} must not be negative, got {amount}")));
    }
    to_duration(amount)
        .ok_or_else(|| AppError::Config(format!("{key} is out of range: {amount}")))
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `a:b,c:d` into lowercase keyword pairs.
fn parse_hints(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((a, b)) if !a.trim().is_empty() && !b.trim().is_empty() => {
                Ok((a.trim().to_lowercase(), b.trim().to_lowercase()))
            }
            _ => Err(AppError::Config(format!(
                "CORRELATION_HINTS entry {entry:?} must look like keyword:keyword"
            ))),
        })
        .collect()
}
