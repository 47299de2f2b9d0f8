//! Core data types shared by the scoring engine, exit policy and ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────
// Pool snapshot
// ─────────────────────────────────────────────────────────

/// One side of a liquidity pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub mint: String,
    pub symbol: String,
    pub decimals: u8,
    /// On-chain reserve, already scaled to whole tokens.
    pub reserve: f64,
}

/// Normalized snapshot of a pool's economics at a point in time.
///
/// Produced fresh on every discovery cycle; immutable once built.
/// A later snapshot of the same `id` supersedes this one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRecord {
    /// Stable across snapshots of the same pool (pair address).
    pub id: String,
    pub base: TokenInfo,
    pub quote: TokenInfo,
    pub tvl_usd: f64,
    pub volume_24h_usd: f64,
    pub fees_24h_usd: f64,
    /// Annualized yield percentage. May exceed 100.
    pub apy_pct: f64,
    pub created_at: DateTime<Utc>,
    pub lp_supply: f64,
    /// Quoted price of the base token in quote-token units. Must be > 0.
    pub price: f64,
}

impl PoolRecord {
    /// Records failing this never reach the scoring engine.
    pub fn is_valid(&self) -> bool {
        self.tvl_usd > 0.0
            && self.apy_pct >= 0.0
            && self.volume_24h_usd >= 0.0
            && self.base.reserve >= 0.0
            && self.quote.reserve >= 0.0
            && self.price > 0.0
    }

    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.base.symbol, self.quote.symbol)
    }

    /// Dedup key for discovery: two records with the same mint pair are
    /// snapshots of the same market even if their pool ids differ.
    pub fn pair_key(&self) -> (String, String) {
        (self.base.mint.clone(), self.quote.mint.clone())
    }

    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds() as f64 / 3600.0
    }

    /// Liquidity balance ratio in [0, 1]: `2·min(b, q) / (b + q)` where
    /// `b = base_reserve × price` and `q = quote_reserve`. 1.0 is a perfect
    /// 50/50 pool; 0.0 when the pool holds no value at all.
    pub fn balance_ratio(&self) -> f64 {
        let base_value = self.base.reserve * self.price;
        let quote_value = self.quote.reserve;
        let total = base_value + quote_value;
        if total <= 0.0 {
            return 0.0;
        }
        2.0 * base_value.min(quote_value) / total
    }
}

// ─────────────────────────────────────────────────────────
// Decisions
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryDecision {
    Enter,
    Skip,
}

/// Output of one scoring-engine evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: EntryDecision,
    pub score: i32,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
}

/// How urgently an exit trigger wants the position gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitUrgency {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone)]
pub struct ExitDecision {
    pub should_exit: bool,
    pub reason: String,
    pub urgency: ExitUrgency,
}

// ─────────────────────────────────────────────────────────
// Position
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Active,
    Exited,
}

/// One simulated capital allocation into a pool, tracked entry to exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub pool_id: String,
    pub pair: String,
    pub entered_at: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_apy_pct: f64,
    pub amount_usd: f64,
    /// Interim mark-to-model value, refreshed by the monitoring cadence.
    pub current_value_usd: f64,
    pub current_apy_pct: f64,
    pub pnl_usd: f64,
    pub pnl_pct: f64,
    pub status: PositionStatus,
    pub exited_at: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub exit_reason: Option<String>,
}

impl Position {
    pub fn hours_held(&self, now: DateTime<Utc>) -> f64 {
        (now - self.entered_at).num_seconds() as f64 / 3600.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_pool(id: &str, tvl: f64, volume: f64, apy: f64) -> PoolRecord {
        PoolRecord {
            id: id.to_string(),
            base: TokenInfo {
                mint: format!("{id}-base"),
                symbol: "WIF".to_string(),
                decimals: 9,
                reserve: tvl / 2.0,
            },
            quote: TokenInfo {
                mint: "So11111111111111111111111111111111111111112".to_string(),
                symbol: "SOL".to_string(),
                decimals: 9,
                reserve: tvl / 2.0,
            },
            tvl_usd: tvl,
            volume_24h_usd: volume,
            fees_24h_usd: volume * 0.0025,
            apy_pct: apy,
            created_at: Utc::now(),
            lp_supply: 1_000.0,
            price: 1.0,
        }
    }

    #[test]
    fn test_validity_gates() {
        assert!(make_pool("p1", 1000.0, 500.0, 15.0).is_valid());

        let mut zero_tvl = make_pool("p2", 0.0, 500.0, 15.0);
        zero_tvl.tvl_usd = 0.0;
        assert!(!zero_tvl.is_valid());

        let mut bad_price = make_pool("p3", 1000.0, 500.0, 15.0);
        bad_price.price = 0.0;
        assert!(!bad_price.is_valid());

        let mut negative_apy = make_pool("p4", 1000.0, 500.0, 15.0);
        negative_apy.apy_pct = -1.0;
        assert!(!negative_apy.is_valid());
    }

    #[test]
    fn test_balance_ratio_perfect_pool() {
        // Equal reserves at price 1.0 → exact 50/50.
        let pool = make_pool("p1", 10_000.0, 0.0, 0.0);
        assert!((pool.balance_ratio() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_balance_ratio_lopsided_pool() {
        let mut pool = make_pool("p1", 10_000.0, 0.0, 0.0);
        pool.base.reserve = 9_000.0;
        pool.quote.reserve = 1_000.0;
        // 2 * 1000 / 10000 = 0.2
        assert!((pool.balance_ratio() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_balance_ratio_empty_pool_guard() {
        let mut pool = make_pool("p1", 10_000.0, 0.0, 0.0);
        pool.base.reserve = 0.0;
        pool.quote.reserve = 0.0;
        assert!((pool.balance_ratio() - 0.0).abs() < 1e-9);
    }
}
