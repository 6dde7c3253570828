//! Async cycle runner around the synchronous detection engine.
//!
//! One cycle: fetch both platforms concurrently, run [`engine::run_cycle`],
//! deliver admitted alerts, persist. Cycles are single-flight: the next tick
//! is not polled until the current cycle returns, and missed ticks are
//! skipped rather than bunched up.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::join;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::api::{HealthState, LatencyStats};
use crate::config::Config;
use crate::engine;
use crate::error::{AppError, Result};
use crate::fetcher::{FetchStats, KalshiClient, MarketFilter, PolymarketClient};
use crate::notify::{format, Notifier};
use crate::persist::StateGateway;
use crate::state::PersistedState;
use crate::types::{Alert, MarketSnapshot, Platform};

/// Summary of a finished cycle, used for health reporting.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub markets: usize,
    pub pairs: usize,
    pub alerts: usize,
    pub delivered: usize,
    pub unavailable: Vec<Platform>,
}

pub struct Scanner {
    cfg: Config,
    polymarket: PolymarketClient,
    kalshi: KalshiClient,
    filter: MarketFilter,
    notifier: Notifier,
    gateway: StateGateway,
    state: PersistedState,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
}

impl Scanner {
    pub fn new(
        cfg: Config,
        notifier: Notifier,
        gateway: StateGateway,
        state: PersistedState,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
    ) -> Result<Self> {
        health.restore(state.scan_count, state.last_run);
        Ok(Self {
            polymarket: PolymarketClient::new(cfg.gamma_api_url.clone())?,
            kalshi: KalshiClient::new(cfg.kalshi_api_url.clone())?,
            filter: MarketFilter::new(cfg.market_keywords.clone()),
            cfg,
            notifier,
            gateway,
            state,
            health,
            latency,
        })
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    pub async fn announce_startup(&self) {
        let tracked = self.state.price_history.market_count();
        let text = format::startup(&self.cfg, tracked, tracked > 0);
        if let Err(e) = self.notifier.send(&text).await {
            warn!("Startup message not delivered: {e}");
        }
    }

    /// Run cycles forever on the configured interval. The first cycle starts
    /// immediately.
    pub async fn run(&mut self) {
        let mut ticker = interval(Duration::from_secs(self.cfg.scan_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One scheduled cycle with health bookkeeping. Never fails: errors are
    /// logged and surfaced as a degraded-mode message.
    pub async fn tick(&mut self) {
        let started = Instant::now();
        match self.run_once(Utc::now()).await {
            Ok(report) => {
                self.latency.record(started.elapsed());
                self.health
                    .record_success(self.state.scan_count, Utc::now(), report.markets);
            }
            Err(e) => {
                let streak = self.health.record_failure();
                error!(consecutive_failures = streak, "Cycle failed: {e}");
                if streak == 1 || streak % 10 == 0 {
                    let text = format::degraded(&e.to_string(), streak);
                    if let Err(send_err) = self.notifier.send(&text).await {
                        warn!("Degraded-mode message not delivered: {send_err}");
                    }
                }
            }
        }
    }

    pub async fn run_once(&mut self, now: DateTime<Utc>) -> Result<CycleReport> {
        let (poly, kalshi) = join(
            self.polymarket.fetch(&self.filter, now),
            self.kalshi.fetch(&self.filter, now),
        )
        .await;

        let mut report = CycleReport::default();
        let poly = platform_or_empty(Platform::Polymarket, poly, &mut report);
        let kalshi = platform_or_empty(Platform::Kalshi, kalshi, &mut report);
        if report.unavailable.len() == 2 {
            return Err(AppError::AllProvidersUnavailable(
                "skipping detection this cycle".to_string(),
            ));
        }

        let outcome = engine::run_cycle(&mut self.state, &self.cfg.detection, &poly, &kalshi, now);
        report.markets = poly.len() + kalshi.len();
        report.pairs = outcome.pairs.len();
        report.alerts = outcome.alerts.len();

        for alert in &outcome.alerts {
            log_alert(alert);
            match self.notifier.send_alert(alert).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(class = %alert.class(), key = %alert.key(), "Alert not delivered: {e}")
                }
            }
        }
        self.health.add_alerts_sent(report.delivered as u64);

        let scan = self.state.scan_count;
        if every(scan, self.cfg.snapshot_every_scans) {
            let all: Vec<MarketSnapshot> = poly.into_iter().chain(kalshi).collect();
            self.send_quietly(&format::snapshot(&all)).await;
        }
        if every(scan, self.cfg.heartbeat_every_scans) {
            let text = format::heartbeat(
                scan,
                self.state.price_history.market_count(),
                self.health.alerts_sent(),
                now,
            );
            self.send_quietly(&text).await;
        }

        self.gateway.save(&mut self.state, now)?;
        Ok(report)
    }

    /// Persist the current state, e.g. on shutdown.
    pub fn save(&mut self) -> Result<()> {
        self.gateway.save(&mut self.state, Utc::now())?;
        info!(path = %self.gateway.path().display(), "State saved");
        Ok(())
    }

    async fn send_quietly(&self, text: &str) {
        if let Err(e) = self.notifier.send(text).await {
            warn!("Message not delivered: {e}");
        }
    }
}

fn platform_or_empty(
    platform: Platform,
    fetched: Result<(Vec<MarketSnapshot>, FetchStats)>,
    report: &mut CycleReport,
) -> Vec<MarketSnapshot> {
    match fetched {
        Ok((markets, _stats)) => markets,
        Err(e) => {
            warn!(platform = %platform, "Treating platform as empty this cycle: {e}");
            report.unavailable.push(platform);
            Vec::new()
        }
    }
}

fn every(scan: u64, period: u64) -> bool {
    period > 0 && scan > 0 && scan % period == 0
}

fn log_alert(alert: &Alert) {
    match alert {
        Alert::Gap(g) => info!(
            event = "GAP_ALERT",
            market_a = %g.market_a.id,
            market_b = %g.market_b.id,
            gap = g.gap,
            similarity = g.pair.similarity,
            "GAP  | {:.1} pts | {} {:.1}% vs {} {:.1}% | {}",
            g.gap, g.market_a.platform, g.prob_a, g.market_b.platform, g.prob_b, g.market_a.title,
        ),
        Alert::Move(m) => info!(
            event = "MOVE_ALERT",
            market_id = %m.market.id,
            delta = m.delta,
            "MOVE | {:+.1} pts | {:.1}% -> {:.1}% | {}",
            m.delta, m.old, m.new, m.market.title,
        ),
        Alert::Correlation(c) => info!(
            event = "CORRELATION_ALERT",
            mover = %c.mover.id,
            laggard = %c.laggard.id,
            delta_mover = c.delta_mover,
            delta_laggard = c.delta_laggard,
            "CORR | {} {:+.1} pts | {} {:+.1} pts",
            c.mover.title, c.delta_mover, c.laggard.title, c.delta_laggard,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionConfig;
    use crate::state::RetentionLimits;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::{json, Value};

    async fn events() -> Json<Value> {
        Json(json!([{
            "id": "77",
            "title": "Khamenei leaves office",
            "slug": "khamenei-leaves-office",
            "markets": [{"id": "501", "question": "Will Khamenei leave office in 2026?", "outcomePrices": "[\"0.70\", \"0.30\"]"}],
        }]))
    }

    async fn markets() -> Json<Value> {
        Json(json!({"markets": [
            {"ticker": "KXKHAM-26", "title": "Khamenei leaves office in 2026", "yes_ask": 63},
        ]}))
    }

    async fn unavailable() -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(base: &str, state_file: &str) -> Config {
        Config {
            log_level: "info".to_string(),
            state_file: state_file.to_string(),
            api_port: 0,
            scan_interval_secs: 180,
            gamma_api_url: base.to_string(),
            kalshi_api_url: base.to_string(),
            telegram_bot_token: None,
            telegram_chat_id: None,
            market_keywords: vec!["khamenei".to_string()],
            heartbeat_every_scans: 0,
            snapshot_every_scans: 0,
            detection: DetectionConfig::default(),
            retention: RetentionLimits::default(),
        }
    }

    fn scanner(cfg: Config) -> Scanner {
        let gateway = StateGateway::new(&cfg.state_file, cfg.retention.clone());
        Scanner::new(
            cfg,
            Notifier::LogOnly,
            gateway,
            PersistedState::default(),
            Arc::new(HealthState::new()),
            Arc::new(LatencyStats::new().unwrap()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn cycle_fetches_detects_and_persists() {
        let app = Router::new()
            .route("/events", get(events))
            .route("/markets", get(markets));
        let base = serve(app).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut scanner = scanner(config(&base, path.to_str().unwrap()));

        let report = scanner.run_once(Utc::now()).await.unwrap();
        assert_eq!(report.markets, 2);
        assert_eq!(report.pairs, 1);
        assert_eq!(report.alerts, 1);
        assert_eq!(report.delivered, 1);
        assert!(report.unavailable.is_empty());

        let again = scanner.run_once(Utc::now()).await.unwrap();
        assert_eq!(again.alerts, 0, "gap cooldown must hold");

        let restored = StateGateway::new(&path, RetentionLimits::default()).load(Utc::now());
        assert_eq!(restored.scan_count, 2);
        assert_eq!(restored.cooldowns_gap.len(), 1);
        assert_eq!(restored.price_history.market_count(), 2);
    }

    #[tokio::test]
    async fn one_platform_down_is_partial_not_fatal() {
        let app = Router::new()
            .route("/events", get(unavailable))
            .route("/markets", get(markets));
        let base = serve(app).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut scanner = scanner(config(&base, path.to_str().unwrap()));

        let report = scanner.run_once(Utc::now()).await.unwrap();
        assert_eq!(report.unavailable, vec![Platform::Polymarket]);
        assert_eq!(report.markets, 1);
        assert_eq!(report.pairs, 0);
        assert_eq!(scanner.state().scan_count, 1);
    }

    #[tokio::test]
    async fn both_platforms_down_fails_the_cycle_and_marks_health() {
        let app = Router::new()
            .route("/events", get(unavailable))
            .route("/markets", get(unavailable));
        let base = serve(app).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut scanner = scanner(config(&base, path.to_str().unwrap()));

        assert!(scanner.run_once(Utc::now()).await.is_err());
        scanner.tick().await;
        assert_eq!(scanner.health.consecutive_failures(), 1);
        assert!(!scanner.health.last_cycle_ok());
        assert_eq!(scanner.state().scan_count, 0);
    }

    #[test]
    fn cadence_skips_zero_period() {
        assert!(every(10, 10));
        assert!(!every(11, 10));
        assert!(!every(10, 0));
        assert!(!every(0, 10));
    }
}
