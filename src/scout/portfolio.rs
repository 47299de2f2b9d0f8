//! Portfolio ledger — owns all simulated capital.
//!
//! Single source of truth for cash, open positions and closed history.
//! Mutated only through `enter_position` / `update_position` /
//! `exit_position`; the orchestrator wraps the whole ledger in one mutex,
//! so methods here stay synchronous.
//!
//! Mark-to-model asymmetry: interim re-pricing applies only half the
//! price delta, exiting crystallizes the full delta.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::audit::{ActionKind, AuditSink};
use super::config::PortfolioConfig;
use super::types::{ExitUrgency, PoolRecord, Position, PositionStatus};

/// Share of the price move priced into an open position's interim mark.
const INTERIM_PRICE_EXPOSURE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct PortfolioSummary {
    pub total_value_usd: f64,
    pub cash_usd: f64,
    pub invested_usd: f64,
    pub active_positions: usize,
    pub closed_positions: usize,
    pub total_pnl_usd: f64,
    pub total_pnl_pct: f64,
}

/// Statistics over closed trades only.
#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct PerformanceStats {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate_pct: f64,
    pub avg_win_usd: f64,
    pub avg_loss_usd: f64,
    /// Gross profit over gross loss; infinite with profit and no losses.
    pub profit_factor: f64,
    /// Mean over stddev of closed return percentages.
    pub sharpe: f64,
}

pub struct Portfolio {
    cfg: PortfolioConfig,
    cash_usd: f64,
    invested_usd: f64,
    active: Vec<Position>,
    closed: Vec<Position>,
    audit: AuditSink,
}

impl Portfolio {
    pub fn new(cfg: PortfolioConfig, audit: AuditSink) -> Self {
        Self {
            cash_usd: cfg.starting_cash_usd,
            invested_usd: 0.0,
            active: Vec::new(),
            closed: Vec::new(),
            cfg,
            audit,
        }
    }

    pub fn active(&self) -> &[Position] {
        &self.active
    }

    pub fn closed(&self) -> &[Position] {
        &self.closed
    }

    /// Pool ids with an open position, i.e. the monitoring watchlist.
    pub fn watchlist(&self) -> Vec<String> {
        self.active.iter().map(|p| p.pool_id.clone()).collect()
    }

    // ─────────────────────────────────────────────────
    // Entry
    // ─────────────────────────────────────────────────

    /// Open a position in `pool`, or None when a precondition fails.
    /// Preconditions never mutate state.
    pub fn enter_position(&mut self, pool: &PoolRecord) -> Option<Position> {
        if self.active.len() >= self.cfg.max_positions {
            debug!(pool = %pool.id, "entry rejected: position cap {} reached", self.cfg.max_positions);
            return None;
        }
        if self.cash_usd < self.cfg.position_size_usd {
            debug!(pool = %pool.id, "entry rejected: cash ${:.2} below position size", self.cash_usd);
            return None;
        }
        if self.invested_usd >= self.cfg.max_total_investment_usd {
            debug!(pool = %pool.id, "entry rejected: invested ${:.2} at cap", self.invested_usd);
            return None;
        }
        if self.active.iter().any(|p| p.pool_id == pool.id) {
            debug!(pool = %pool.id, "entry rejected: already holding this pool");
            return None;
        }

        let amount = self.cfg.position_size_usd.min(self.cash_usd);
        let position = Position {
            id: Uuid::new_v4().to_string(),
            pool_id: pool.id.clone(),
            pair: pool.pair_label(),
            entered_at: Utc::now(),
            entry_price: pool.price,
            entry_apy_pct: pool.apy_pct,
            amount_usd: amount,
            current_value_usd: amount,
            current_apy_pct: pool.apy_pct,
            pnl_usd: 0.0,
            pnl_pct: 0.0,
            status: PositionStatus::Active,
            exited_at: None,
            exit_price: None,
            exit_reason: None,
        };

        self.cash_usd -= amount;
        self.invested_usd += amount;
        self.audit
            .record(&pool.id, true, ActionKind::Entered { amount_usd: amount });
        info!(
            "🟢 entered {} ${:.2} @ {:.6} (APY {:.1}%) | cash ${:.2}",
            position.pair, amount, pool.price, pool.apy_pct, self.cash_usd,
        );

        self.active.push(position.clone());
        Some(position)
    }

    // ─────────────────────────────────────────────────
    // Interim re-pricing
    // ─────────────────────────────────────────────────

    /// Refresh the interim mark of the position holding `pool`.
    pub fn update_position(&mut self, pool: &PoolRecord) -> Option<&Position> {
        let now = Utc::now();
        let position = self.active.iter_mut().find(|p| p.pool_id == pool.id)?;

        let hours = position.hours_held(now);
        position.current_value_usd = mark_to_model(
            position.amount_usd,
            position.entry_apy_pct,
            position.entry_price,
            pool.price,
            hours,
            INTERIM_PRICE_EXPOSURE,
        );
        position.current_apy_pct = pool.apy_pct;
        position.pnl_usd = position.current_value_usd - position.amount_usd;
        position.pnl_pct = position.pnl_usd / position.amount_usd * 100.0;

        self.audit.record(
            &pool.id,
            true,
            ActionKind::Updated {
                value_usd: position.current_value_usd,
                pnl_pct: position.pnl_pct,
            },
        );
        Some(&*position)
    }

    // ─────────────────────────────────────────────────
    // Exit
    // ─────────────────────────────────────────────────

    /// Close the active position `position_id` against a fresh snapshot.
    /// None when no such active position exists (already exited, unknown id).
    pub fn exit_position(
        &mut self,
        position_id: &str,
        pool: &PoolRecord,
        reason: &str,
        urgency: ExitUrgency,
    ) -> Option<Position> {
        let idx = self.active.iter().position(|p| p.id == position_id)?;
        let mut position = self.active.remove(idx);
        let now = Utc::now();

        let hours = position.hours_held(now);
        let final_value = mark_to_model(
            position.amount_usd,
            position.entry_apy_pct,
            position.entry_price,
            pool.price,
            hours,
            1.0,
        );

        position.current_value_usd = final_value;
        position.current_apy_pct = pool.apy_pct;
        position.pnl_usd = final_value - position.amount_usd;
        position.pnl_pct = position.pnl_usd / position.amount_usd * 100.0;
        position.status = PositionStatus::Exited;
        position.exited_at = Some(now);
        position.exit_price = Some(pool.price);
        position.exit_reason = Some(reason.to_string());

        self.cash_usd += final_value;
        self.invested_usd -= position.amount_usd;

        self.audit.record(
            &pool.id,
            true,
            ActionKind::Exited {
                reason: reason.to_string(),
                pnl_usd: position.pnl_usd,
                urgency,
            },
        );
        info!(
            "🔴 exited {} after {:.1}h: ${:.2} → ${:.2} ({:+.2}%) — {}",
            position.pair, hours, position.amount_usd, final_value, position.pnl_pct, reason,
        );

        self.closed.push(position.clone());
        Some(position)
    }

    // ─────────────────────────────────────────────────
    // Aggregates
    // ─────────────────────────────────────────────────

    /// Pure read; calling it twice without a mutation in between returns
    /// identical numbers.
    pub fn summary(&self) -> PortfolioSummary {
        let active_value: f64 = self.active.iter().map(|p| p.current_value_usd).sum();
        let active_pnl: f64 = self.active.iter().map(|p| p.pnl_usd).sum();
        let closed_pnl: f64 = self.closed.iter().map(|p| p.pnl_usd).sum();
        let total_pnl = active_pnl + closed_pnl;
        let principal = self.cfg.starting_cash_usd;

        PortfolioSummary {
            total_value_usd: self.cash_usd + active_value,
            cash_usd: self.cash_usd,
            invested_usd: self.invested_usd,
            active_positions: self.active.len(),
            closed_positions: self.closed.len(),
            total_pnl_usd: total_pnl,
            total_pnl_pct: if principal > 0.0 {
                total_pnl / principal * 100.0
            } else {
                0.0
            },
        }
    }

    pub fn performance(&self) -> PerformanceStats {
        if self.closed.is_empty() {
            return PerformanceStats::default();
        }

        let wins: Vec<f64> = self
            .closed
            .iter()
            .filter(|p| p.pnl_usd > 0.0)
            .map(|p| p.pnl_usd)
            .collect();
        let losses: Vec<f64> = self
            .closed
            .iter()
            .filter(|p| p.pnl_usd <= 0.0)
            .map(|p| p.pnl_usd.abs())
            .collect();

        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().sum();
        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else if gross_profit > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let returns: Vec<f64> = self.closed.iter().map(|p| p.pnl_pct).collect();
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        let stddev = variance.sqrt();
        let sharpe = if stddev > 0.0 { mean / stddev } else { 0.0 };

        PerformanceStats {
            trades: self.closed.len(),
            wins: wins.len(),
            losses: losses.len(),
            win_rate_pct: wins.len() as f64 / self.closed.len() as f64 * 100.0,
            avg_win_usd: if wins.is_empty() {
                0.0
            } else {
                gross_profit / wins.len() as f64
            },
            avg_loss_usd: if losses.is_empty() {
                0.0
            } else {
                gross_loss / losses.len() as f64
            },
            profit_factor,
            sharpe,
        }
    }
}

/// `amount + apy_accrual + exposure × price_delta`, where the accrual
/// pro-rates the entry APY per hour held and the delta is the full price
/// move applied to the allocated amount.
fn mark_to_model(
    amount: f64,
    entry_apy_pct: f64,
    entry_price: f64,
    current_price: f64,
    hours_held: f64,
    price_exposure: f64,
) -> f64 {
    let apy_accrual = entry_apy_pct / 100.0 / 365.0 / 24.0 * hours_held * amount;
    let price_delta = (current_price - entry_price) / entry_price * amount;
    amount + apy_accrual + price_exposure * price_delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scout::types::TokenInfo;
    use chrono::Duration;

    fn make_pool(id: &str, price: f64, apy: f64, tvl: f64) -> PoolRecord {
        PoolRecord {
            id: id.to_string(),
            base: TokenInfo {
                mint: format!("{id}-base"),
                symbol: "WIF".to_string(),
                decimals: 9,
                reserve: tvl / 2.0 / price,
            },
            quote: TokenInfo {
                mint: "usdc".to_string(),
                symbol: "USDC".to_string(),
                decimals: 6,
                reserve: tvl / 2.0,
            },
            tvl_usd: tvl,
            volume_24h_usd: 10_000.0,
            fees_24h_usd: 25.0,
            apy_pct: apy,
            created_at: Utc::now() - Duration::hours(2),
            lp_supply: 1_000.0,
            price,
        }
    }

    fn make_portfolio() -> Portfolio {
        Portfolio::new(PortfolioConfig::default(), AuditSink::disconnected())
    }

    #[test]
    fn test_enter_debits_cash_and_credits_invested() {
        let mut pf = make_portfolio();
        let pos = pf.enter_position(&make_pool("p1", 1.0, 20.0, 50_000.0)).unwrap();
        assert!((pos.amount_usd - 50.0).abs() < 1e-9);
        assert!((pf.cash_usd - 950.0).abs() < 1e-9);
        assert!((pf.invested_usd - 50.0).abs() < 1e-9);
        assert_eq!(pf.active.len(), 1);
    }

    #[test]
    fn test_no_duplicate_position_per_pool() {
        let mut pf = make_portfolio();
        let pool = make_pool("p1", 1.0, 20.0, 50_000.0);
        assert!(pf.enter_position(&pool).is_some());
        assert!(pf.enter_position(&pool).is_none());
        assert_eq!(pf.active.len(), 1);
    }

    #[test]
    fn test_position_cap_enforced() {
        let cfg = PortfolioConfig {
            max_positions: 2,
            ..PortfolioConfig::default()
        };
        let mut pf = Portfolio::new(cfg, AuditSink::disconnected());
        assert!(pf.enter_position(&make_pool("p1", 1.0, 20.0, 50_000.0)).is_some());
        assert!(pf.enter_position(&make_pool("p2", 1.0, 20.0, 50_000.0)).is_some());
        assert!(pf.enter_position(&make_pool("p3", 1.0, 20.0, 50_000.0)).is_none());
    }

    #[test]
    fn test_investment_cap_enforced() {
        let cfg = PortfolioConfig {
            starting_cash_usd: 1_000.0,
            position_size_usd: 100.0,
            max_positions: 10,
            max_total_investment_usd: 200.0,
        };
        let mut pf = Portfolio::new(cfg, AuditSink::disconnected());
        assert!(pf.enter_position(&make_pool("p1", 1.0, 20.0, 50_000.0)).is_some());
        assert!(pf.enter_position(&make_pool("p2", 1.0, 20.0, 50_000.0)).is_some());
        // invested now at the $200 cap
        assert!(pf.enter_position(&make_pool("p3", 1.0, 20.0, 50_000.0)).is_none());
    }

    #[test]
    fn test_exit_formula_full_price_exposure() {
        // Entry APY 20%, price 1.0 → 1.2, 24h held:
        // accrual = 0.20/365/24 · 24 · 50, delta = 0.2 · 50 = 10.
        let mut pf = make_portfolio();
        let pos = pf.enter_position(&make_pool("p1", 1.0, 20.0, 50_000.0)).unwrap();
        pf.active[0].entered_at = Utc::now() - Duration::hours(24);

        let exited = pf
            .exit_position(&pos.id, &make_pool("p1", 1.2, 20.0, 50_000.0), "take-profit", ExitUrgency::Medium)
            .unwrap();

        let expected = 50.0 + 0.20 / 365.0 / 24.0 * 24.0 * 50.0 + 10.0;
        assert!((exited.current_value_usd - expected).abs() < 1e-6);
        let expected_pct = (expected - 50.0) / 50.0 * 100.0;
        assert!((exited.pnl_pct - expected_pct).abs() < 1e-6);
        assert_eq!(exited.status, PositionStatus::Exited);
        assert!((pf.cash_usd - (950.0 + expected)).abs() < 1e-6);
        assert!(pf.invested_usd.abs() < 1e-9);
    }

    #[test]
    fn test_interim_mark_uses_half_price_exposure() {
        let mut pf = make_portfolio();
        pf.enter_position(&make_pool("p1", 1.0, 0.0, 50_000.0)).unwrap();

        // Zero APY isolates the price leg: +20% move marks at +10%.
        pf.update_position(&make_pool("p1", 1.2, 0.0, 50_000.0)).unwrap();
        let pos = &pf.active[0];
        assert!((pos.current_value_usd - 55.0).abs() < 1e-6);
        assert!((pos.pnl_pct - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_exit_is_terminal_and_closed_grows_monotonically() {
        let mut pf = make_portfolio();
        let pool = make_pool("p1", 1.0, 20.0, 50_000.0);
        let pos = pf.enter_position(&pool).unwrap();

        assert!(pf.exit_position(&pos.id, &pool, "test", ExitUrgency::Low).is_some());
        // Same id again: position is gone from active, no reopen.
        assert!(pf.exit_position(&pos.id, &pool, "test", ExitUrgency::Low).is_none());
        assert!(pf.update_position(&pool).is_none());
        assert_eq!(pf.closed.len(), 1);

        // A fresh entry in the same pool is a new position, history keeps both.
        let pos2 = pf.enter_position(&pool).unwrap();
        assert_ne!(pos2.id, pos.id);
        pf.exit_position(&pos2.id, &pool, "test", ExitUrgency::Low);
        assert_eq!(pf.closed.len(), 2);
    }

    #[test]
    fn test_exit_unknown_id_is_noop() {
        let mut pf = make_portfolio();
        let pool = make_pool("p1", 1.0, 20.0, 50_000.0);
        pf.enter_position(&pool).unwrap();
        assert!(pf.exit_position("no-such-id", &pool, "test", ExitUrgency::Low).is_none());
        assert_eq!(pf.active.len(), 1);
        assert!((pf.cash_usd - 950.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_read_is_idempotent_and_reconciles() {
        let mut pf = make_portfolio();
        pf.enter_position(&make_pool("p1", 1.0, 20.0, 50_000.0)).unwrap();
        pf.update_position(&make_pool("p1", 1.1, 20.0, 50_000.0)).unwrap();

        let a = pf.summary();
        let b = pf.summary();
        assert_eq!(a, b);
        // cash + invested + unrealized P&L = total value
        assert!((a.cash_usd + a.invested_usd + a.total_pnl_usd - a.total_value_usd).abs() < 1e-9);
    }

    #[test]
    fn test_performance_stats_empty_portfolio() {
        let pf = make_portfolio();
        let stats = pf.performance();
        assert_eq!(stats.trades, 0);
        assert!(stats.win_rate_pct.abs() < 1e-9);
        assert!(stats.profit_factor.abs() < 1e-9);
        assert!(stats.sharpe.abs() < 1e-9);
    }

    #[test]
    fn test_performance_stats_mixed_trades() {
        let mut pf = make_portfolio();

        // One winner (+full delta on a 20% move) and one loser (−10%).
        let p1 = pf.enter_position(&make_pool("p1", 1.0, 0.0, 50_000.0)).unwrap();
        pf.exit_position(&p1.id, &make_pool("p1", 1.2, 0.0, 50_000.0), "tp", ExitUrgency::Medium);
        let p2 = pf.enter_position(&make_pool("p2", 1.0, 0.0, 50_000.0)).unwrap();
        pf.exit_position(&p2.id, &make_pool("p2", 0.9, 0.0, 50_000.0), "sl", ExitUrgency::High);

        let stats = pf.performance();
        assert_eq!(stats.trades, 2);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert!((stats.win_rate_pct - 50.0).abs() < 1e-6);
        assert!((stats.avg_win_usd - 10.0).abs() < 1e-6);
        assert!((stats.avg_loss_usd - 5.0).abs() < 1e-6);
        assert!((stats.profit_factor - 2.0).abs() < 1e-6);
        // returns +20 / −10 → mean 5, stddev 15
        assert!((stats.sharpe - 5.0 / 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_profit_factor_infinite_without_losses() {
        let mut pf = make_portfolio();
        let p1 = pf.enter_position(&make_pool("p1", 1.0, 0.0, 50_000.0)).unwrap();
        pf.exit_position(&p1.id, &make_pool("p1", 1.2, 0.0, 50_000.0), "tp", ExitUrgency::Medium);
        assert!(pf.performance().profit_factor.is_infinite());
    }
}
