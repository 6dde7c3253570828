//! Plain-text message bodies. No markup, so no escaping rules to get wrong.

use chrono::{DateTime, Utc};

use crate::config::{Config, SNAPSHOT_MAX_MARKETS};
use crate::types::{Alert, CorrelationCandidate, GapCandidate, MarketSnapshot, MoveCandidate};

pub fn alert(alert: &Alert) -> String {
    match alert {
        Alert::Gap(g) => gap(g),
        Alert::Move(m) => big_move(m),
        Alert::Correlation(c) => correlation(c),
    }
}

pub fn gap(g: &GapCandidate) -> String {
    let (cheap, rich) = if g.prob_a <= g.prob_b {
        (&g.market_a, &g.market_b)
    } else {
        (&g.market_b, &g.market_a)
    };
    format!(
        "CROSS-PLATFORM GAP: {gap:.1} pts\n\n\
         {a_platform}: {a_title}\n  YES {prob_a:.1}%\n\
         {b_platform}: {b_title}\n  YES {prob_b:.1}%\n\n\
         Cheaper on {cheap_platform}, richer on {rich_platform} (match {sim:.0}%)\n\
         {a_url}\n{b_url}",
        gap = g.gap,
        a_platform = g.market_a.platform,
        a_title = g.market_a.title,
        prob_a = g.prob_a,
        b_platform = g.market_b.platform,
        b_title = g.market_b.title,
        prob_b = g.prob_b,
        cheap_platform = cheap.platform,
        rich_platform = rich.platform,
        sim = g.pair.similarity * 100.0,
        a_url = g.market_a.url,
        b_url = g.market_b.url,
    )
}

pub fn big_move(m: &MoveCandidate) -> String {
    let direction = if m.delta >= 0.0 { "UP" } else { "DOWN" };
    format!(
        "BIG MOVE {direction}: {delta:+.1} pts\n\n\
         {title}\n{platform}: {old:.1}% -> {new:.1}%\n{url}",
        delta = m.delta,
        title = m.market.title,
        platform = m.market.platform,
        old = m.old,
        new = m.new,
        url = m.market.url,
    )
}

pub fn correlation(c: &CorrelationCandidate) -> String {
    format!(
        "CORRELATION ANOMALY\n\n\
         Moved {dm:+.1} pts: {mover} ({mover_platform})\n\
         Barely moved {dl:+.1} pts: {laggard} ({laggard_platform})\n\n\
         The second market has not reacted yet.\n{mover_url}\n{laggard_url}",
        dm = c.delta_mover,
        mover = c.mover.title,
        mover_platform = c.mover.platform,
        dl = c.delta_laggard,
        laggard = c.laggard.title,
        laggard_platform = c.laggard.platform,
        mover_url = c.mover.url,
        laggard_url = c.laggard.url,
    )
}

pub fn startup(cfg: &Config, markets_tracked: usize, restored: bool) -> String {
    let d = &cfg.detection;
    format!(
        "Market signal scanner started\n\n\
         Scan interval: {interval}s\n\
         Tracked markets: {markets_tracked}\n\
         History: {history}\n\
         Gap threshold: {gap} pts\n\
         Move threshold: {mv} pts\n\
         Correlation threshold: {corr} pts",
        interval = cfg.scan_interval_secs,
        history = if restored { "restored" } else { "empty" },
        gap = d.gap_threshold,
        mv = d.move_threshold,
        corr = d.correlation_threshold,
    )
}

pub fn heartbeat(
    scan_count: u64,
    markets_tracked: usize,
    alerts_sent: u64,
    now: DateTime<Utc>,
) -> String {
    format!(
        "Heartbeat {time}\n\
         Scans: {scan_count}\n\
         Tracked markets: {markets_tracked}\n\
         Alerts sent: {alerts_sent}",
        time = now.format("%Y-%m-%d %H:%M UTC"),
    )
}

/// Top markets by probability, at most [`SNAPSHOT_MAX_MARKETS`].
pub fn snapshot(markets: &[MarketSnapshot]) -> String {
    let mut top: Vec<&MarketSnapshot> = markets.iter().collect();
    top.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    top.truncate(SNAPSHOT_MAX_MARKETS);

    let mut out = format!("Market snapshot ({} markets)\n", markets.len());
    for m in top {
        out.push_str(&format!("\n{:>5.1}%  {} [{}]", m.points(), m.title, m.platform));
    }
    out
}

pub fn degraded(reason: &str, consecutive_failures: u32) -> String {
    format!("Scanner degraded ({consecutive_failures} consecutive failed cycles)\n\n{reason}")
}
