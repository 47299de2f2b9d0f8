//! Orchestrator — drives discovery and position monitoring.
//!
//! Two cadences run from one select loop against the shared ledger:
//! the discovery cycle (fetch → dedup → validate → score → enter) and the
//! monitoring cycle (fresh snapshot → re-price → exit policy → exit).
//! A cycle always runs to completion before the loop picks the next tick,
//! and a scan arriving before `min_scan_gap` has elapsed is dropped as a
//! no-op — that guard, not a lock, is what prevents overlapping scans
//! when timers drift.
//!
//! Nothing in here is fatal: cycle errors are logged and audited, and the
//! loop only ends on an explicit stop. Repeated discovery failures flip
//! the loop onto the fallback source until a fetch succeeds again.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::audit::{ActionKind, AuditSink};
use super::config::MonitorConfig;
use super::exit::ExitPolicy;
use super::portfolio::Portfolio;
use super::scoring::ScoringEngine;
use super::types::{EntryDecision, PoolRecord};
use crate::sources::PoolSource;
use crate::state::StateWriter;

// ─────────────────────────────────────────────────────────
// Published status
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MonitorState {
    Stopped,
    Scanning,
    IdleBetweenScans,
}

/// Broadcast after every state change for observers (admin endpoint).
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub using_fallback: bool,
    pub pools_cached: usize,
    pub scans: u64,
    pub last_scan_at: Option<DateTime<Utc>>,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self {
            state: MonitorState::Stopped,
            using_fallback: false,
            pools_cached: 0,
            scans: 0,
            last_scan_at: None,
        }
    }
}

#[derive(Debug, Default)]
struct Stats {
    scans: u64,
    scans_rate_limited: u64,
    evaluated: u64,
    entered: u64,
    entries_declined: u64,
    updates: u64,
    exits: u64,
    source_failures: u64,
}

// ─────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────

pub struct PoolMonitor {
    cfg: MonitorConfig,
    scoring: ScoringEngine,
    exit_policy: ExitPolicy,
    portfolio: Arc<Mutex<Portfolio>>,
    primary: Box<dyn PoolSource>,
    fallback: Box<dyn PoolSource>,
    audit: AuditSink,
    state_writer: StateWriter,
    status_tx: watch::Sender<MonitorStatus>,

    /// Last seen snapshot per pool id. A cache hit skips re-evaluation.
    pool_cache: HashMap<String, PoolRecord>,
    last_scan: Option<Instant>,
    last_scan_at: Option<DateTime<Utc>>,
    consecutive_failures: u32,
    stats: Stats,
}

impl PoolMonitor {
    pub fn new(
        cfg: MonitorConfig,
        scoring: ScoringEngine,
        exit_policy: ExitPolicy,
        portfolio: Arc<Mutex<Portfolio>>,
        primary: Box<dyn PoolSource>,
        fallback: Box<dyn PoolSource>,
        audit: AuditSink,
        state_writer: StateWriter,
    ) -> (Self, watch::Receiver<MonitorStatus>) {
        let (status_tx, status_rx) = watch::channel(MonitorStatus::default());
        let monitor = Self {
            cfg,
            scoring,
            exit_policy,
            portfolio,
            primary,
            fallback,
            audit,
            state_writer,
            status_tx,
            pool_cache: HashMap::new(),
            last_scan: None,
            last_scan_at: None,
            consecutive_failures: 0,
            stats: Stats::default(),
        };
        (monitor, status_rx)
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "🔭 monitor started | scan={}s update={}s gap>={}s fallback_after={} failures",
            self.cfg.scan_interval.as_secs(),
            self.cfg.update_interval.as_secs(),
            self.cfg.min_scan_gap.as_secs(),
            self.cfg.max_source_failures,
        );

        let mut scan_tick = tokio::time::interval(self.cfg.scan_interval);
        let mut update_tick = tokio::time::interval(self.cfg.update_interval);
        let mut snapshot_tick = tokio::time::interval(self.cfg.snapshot_interval);
        scan_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        update_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        snapshot_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Intervals fire immediately once; only the first scan is wanted.
        update_tick.tick().await;
        snapshot_tick.tick().await;

        loop {
            tokio::select! {
                _ = scan_tick.tick() => {
                    self.publish(MonitorState::Scanning);
                    self.scan_cycle().await;
                    self.publish(MonitorState::IdleBetweenScans);
                }
                _ = update_tick.tick() => {
                    self.update_cycle().await;
                }
                _ = snapshot_tick.tick() => {
                    self.log_performance().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.publish(MonitorState::Stopped);
        info!(
            "🔭 shutdown | scans={} (rate_limited={}) evaluated={} entered={} declined={} updates={} exits={} source_failures={}",
            self.stats.scans,
            self.stats.scans_rate_limited,
            self.stats.evaluated,
            self.stats.entered,
            self.stats.entries_declined,
            self.stats.updates,
            self.stats.exits,
            self.stats.source_failures,
        );
    }

    fn publish(&self, state: MonitorState) {
        let _ = self.status_tx.send(MonitorStatus {
            state,
            using_fallback: self.on_fallback(),
            pools_cached: self.pool_cache.len(),
            scans: self.stats.scans,
            last_scan_at: self.last_scan_at,
        });
    }

    fn on_fallback(&self) -> bool {
        self.consecutive_failures >= self.cfg.max_source_failures
    }

    fn source(&self) -> &dyn PoolSource {
        if self.on_fallback() {
            self.fallback.as_ref()
        } else {
            self.primary.as_ref()
        }
    }

    // ─────────────────────────────────────────────────
    // Discovery cycle
    // ─────────────────────────────────────────────────

    async fn scan_cycle(&mut self) {
        // Timer drift guard: never let two scans crowd each other.
        if let Some(last) = self.last_scan {
            if last.elapsed() < self.cfg.min_scan_gap {
                self.stats.scans_rate_limited += 1;
                debug!(
                    "scan dropped: only {:.1}s since previous",
                    last.elapsed().as_secs_f64()
                );
                return;
            }
        }
        self.last_scan = Some(Instant::now());
        self.last_scan_at = Some(Utc::now());
        self.stats.scans += 1;

        let source = self.source();
        let source_name = source.name();
        let pools = match source.fetch_pools().await {
            Ok(pools) => {
                if self.consecutive_failures > 0 {
                    info!(
                        "✅ discovery recovered via {source_name} after {} failures",
                        self.consecutive_failures,
                    );
                }
                self.consecutive_failures = 0;
                pools
            }
            Err(e) => {
                self.consecutive_failures += 1;
                self.stats.source_failures += 1;
                warn!(
                    "❌ discovery via {source_name} failed ({}/{} before fallback): {e:#}",
                    self.consecutive_failures, self.cfg.max_source_failures,
                );
                self.audit.record(
                    "",
                    false,
                    ActionKind::SourceFailure {
                        source: source_name.to_string(),
                        message: e.to_string(),
                    },
                );
                if self.on_fallback() {
                    warn!("↪️ switching discovery to {}", self.fallback.name());
                }
                return;
            }
        };

        let candidates = dedup_by_pair(pools);
        let mut fresh = 0usize;
        let mut entered = 0usize;

        for pool in candidates {
            if !pool.is_valid() {
                continue;
            }
            if self.pool_cache.contains_key(&pool.id) {
                continue; // already evaluated this pool
            }
            fresh += 1;
            self.stats.evaluated += 1;

            let eval = self.scoring.evaluate(&pool);
            for warning in &eval.warnings {
                debug!(pool = %pool.id, "⚠️ {warning}");
            }
            if eval.decision == EntryDecision::Enter {
                let mut pf = self.portfolio.lock().await;
                if pf.enter_position(&pool).is_some() {
                    self.stats.entered += 1;
                    entered += 1;
                } else {
                    self.stats.entries_declined += 1;
                }
            }
            self.pool_cache.insert(pool.id.clone(), pool);
        }

        info!(
            "🔍 scan #{} via {source_name}: {fresh} new candidates, {entered} entered | cache={}",
            self.stats.scans,
            self.pool_cache.len(),
        );
    }

    // ─────────────────────────────────────────────────
    // Monitoring cycle
    // ─────────────────────────────────────────────────

    async fn update_cycle(&mut self) {
        let watchlist: Vec<(String, String)> = {
            let pf = self.portfolio.lock().await;
            pf.active()
                .iter()
                .map(|p| (p.id.clone(), p.pool_id.clone()))
                .collect()
        };
        if watchlist.is_empty() {
            return;
        }

        let source = self.source();
        let snapshots = join_all(
            watchlist
                .iter()
                .map(|(_, pool_id)| source.fetch_metrics(pool_id)),
        )
        .await;

        for ((position_id, pool_id), snapshot) in watchlist.iter().zip(snapshots) {
            match snapshot {
                Ok(Some(pool)) => {
                    self.pool_cache.insert(pool.id.clone(), pool.clone());
                    self.reprice(position_id, &pool).await;
                }
                Ok(None) => {
                    debug!("no metrics for {pool_id} this cycle, skipping");
                }
                Err(e) => {
                    warn!("❌ metrics fetch for {pool_id} failed: {e:#}");
                    self.audit.record(
                        pool_id,
                        false,
                        ActionKind::SourceFailure {
                            source: self.source().name().to_string(),
                            message: e.to_string(),
                        },
                    );
                }
            }
        }
    }

    /// Re-mark one position and apply the exit policy to it.
    async fn reprice(&mut self, position_id: &str, pool: &PoolRecord) {
        let mut pf = self.portfolio.lock().await;
        if pf.update_position(pool).is_none() {
            return; // position exited between cycles
        }
        self.stats.updates += 1;

        let decision = match pf.active().iter().find(|p| p.id == position_id) {
            Some(position) => self.exit_policy.evaluate_exit(position, pool),
            None => return,
        };
        if decision.should_exit {
            info!("🚪 exit trigger ({:?}): {}", decision.urgency, decision.reason);
            if pf
                .exit_position(position_id, pool, &decision.reason, decision.urgency)
                .is_some()
            {
                self.stats.exits += 1;
            }
        }
    }

    // ─────────────────────────────────────────────────
    // Performance cadence
    // ─────────────────────────────────────────────────

    async fn log_performance(&self) {
        let pf = self.portfolio.lock().await;
        let summary = pf.summary();
        let stats = pf.performance();
        info!(
            "📊 portfolio ${:.2} (cash ${:.2}, invested ${:.2}) | P&L ${:+.2} ({:+.2}%) | open={} closed={} win_rate={:.0}%",
            summary.total_value_usd,
            summary.cash_usd,
            summary.invested_usd,
            summary.total_pnl_usd,
            summary.total_pnl_pct,
            summary.active_positions,
            summary.closed_positions,
            stats.win_rate_pct,
        );
        if let Err(e) = self.state_writer.write_portfolio(&pf).await {
            warn!("failed to write portfolio snapshot: {e:#}");
        }
    }
}

/// Collapse snapshots of the same `(base_mint, quote_mint)` market,
/// keeping the most recently created record on conflict.
fn dedup_by_pair(pools: Vec<PoolRecord>) -> Vec<PoolRecord> {
    let mut best: HashMap<(String, String), PoolRecord> = HashMap::new();
    for pool in pools {
        match best.entry(pool.pair_key()) {
            Entry::Occupied(mut slot) => {
                if pool.created_at > slot.get().created_at {
                    slot.insert(pool);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(pool);
            }
        }
    }
    best.into_values().collect()
}
