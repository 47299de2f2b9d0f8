//! Exit policy: ordered hard triggers, first match wins.
//!
//! Capital-preservation checks (stop-loss, liquidity depth) sit ahead of
//! the opportunistic ones; that ordering is the tie-break, not scoring.

use chrono::Utc;

use super::config::ExitCriteria;
use super::types::{ExitDecision, ExitUrgency, PoolRecord, Position};

/// Yield must drop by more than this share of its entry value to trigger
/// the relative-decline exit.
const APY_DECLINE_EXIT_PCT: f64 = 50.0;

/// A position larger than 1/10th of pool TVL cannot exit cleanly.
const MIN_DEPTH_MULTIPLE: f64 = 10.0;

pub struct ExitPolicy {
    criteria: ExitCriteria,
}

impl ExitPolicy {
    pub fn new(criteria: ExitCriteria) -> Self {
        Self { criteria }
    }

    /// Judge an open position against a fresh snapshot of its pool.
    /// Expects the position's interim mark (`pnl_pct`) to be current.
    pub fn evaluate_exit(&self, position: &Position, pool: &PoolRecord) -> ExitDecision {
        let c = &self.criteria;

        // 1. Stop-loss
        if position.pnl_pct <= c.stop_loss_pct {
            return exit(
                format!(
                    "stop-loss: P&L {:.2}% at or below {:.2}%",
                    position.pnl_pct, c.stop_loss_pct
                ),
                ExitUrgency::High,
            );
        }

        // 2. Take-profit
        if position.pnl_pct >= c.take_profit_pct {
            return exit(
                format!(
                    "take-profit: P&L {:.2}% at or above {:.2}%",
                    position.pnl_pct, c.take_profit_pct
                ),
                ExitUrgency::Medium,
            );
        }

        // 3. Yield collapse
        if pool.apy_pct < c.exit_apy_floor_pct {
            return exit(
                format!(
                    "yield collapse: APY {:.1}% under floor {:.1}%",
                    pool.apy_pct, c.exit_apy_floor_pct
                ),
                ExitUrgency::Medium,
            );
        }

        // 4. Max holding time
        let held = position.hours_held(Utc::now());
        if held >= c.max_hold_hours {
            return exit(
                format!("held {held:.1}h, limit {:.0}h", c.max_hold_hours),
                ExitUrgency::Low,
            );
        }

        // 5. Relative yield decline
        if position.entry_apy_pct > 0.0 {
            let decline_pct =
                (position.entry_apy_pct - pool.apy_pct) / position.entry_apy_pct * 100.0;
            if decline_pct > APY_DECLINE_EXIT_PCT {
                return exit(
                    format!(
                        "APY fell {decline_pct:.0}% from entry ({:.1}% -> {:.1}%)",
                        position.entry_apy_pct, pool.apy_pct
                    ),
                    ExitUrgency::Medium,
                );
            }
        }

        // 6. Liquidity risk
        if pool.tvl_usd < position.amount_usd * MIN_DEPTH_MULTIPLE {
            return exit(
                format!(
                    "pool too shallow: TVL ${:.0} vs position ${:.0}",
                    pool.tvl_usd, position.amount_usd
                ),
                ExitUrgency::High,
            );
        }

        ExitDecision {
            should_exit: false,
            reason: format!("holding: P&L {:.2}%, APY {:.1}%", position.pnl_pct, pool.apy_pct),
            urgency: ExitUrgency::Low,
        }
    }
}

fn exit(reason: String, urgency: ExitUrgency) -> ExitDecision {
    ExitDecision {
        should_exit: true,
        reason,
        urgency,
    }
}
