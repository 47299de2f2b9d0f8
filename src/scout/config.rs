//! Runtime configuration. All knobs have working defaults and can be
//! overridden from the environment (loaded after dotenv in main).
//!
//! Entry tuning ships as two named presets: `lenient` matches the loose
//! thresholds used with synthetic/demo data, `strict` is the live-market
//! tuning. `SCOUT_PROFILE` selects one; individual env vars still override
//! single fields on top.

use std::time::Duration;

fn env_f64(key: &str, field: &mut f64) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(f) = v.parse::<f64>() {
            *field = f;
        }
    }
}

fn env_u64(key: &str, field: &mut u64) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(n) = v.parse::<u64>() {
            *field = n;
        }
    }
}

fn env_usize(key: &str, field: &mut usize) {
    if let Ok(v) = std::env::var(key) {
        if let Ok(n) = v.parse::<usize>() {
            *field = n;
        }
    }
}

pub fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

// ─────────────────────────────────────────────────────────
// Scoring weights
// ─────────────────────────────────────────────────────────

/// Point values awarded by the scoring engine. Tunable per deployment,
/// not business constants.
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    /// Base points once the yield gate passes (heaviest gate).
    pub apy_gate: i32,
    pub tvl_gate: i32,
    pub volume_gate: i32,
    /// Pool age inside the acceptable window.
    pub age_in_window: i32,
    /// Extra on top when age falls in the sweet-spot sub-window.
    pub age_sweet_spot: i32,
    /// Smaller award when age is outside the window (plus a warning).
    pub age_outside: i32,
    /// Balance ratio at or above the configured minimum.
    pub balanced: i32,
    /// Consolation points below the minimum ratio (plus a warning).
    pub imbalanced: i32,
    /// Yield at `apy_exceptional_mult ×` the minimum.
    pub exceptional_apy: i32,
    /// Volume at `volume_exceptional_mult ×` the minimum.
    pub exceptional_volume: i32,
    /// Subtracted when yield exceeds the sanity ceiling.
    pub rug_penalty: i32,
    /// Subtracted when TVL is disproportionately small vs 24h volume.
    pub thin_tvl_penalty: i32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            apy_gate: 30,
            tvl_gate: 20,
            volume_gate: 20,
            age_in_window: 15,
            age_sweet_spot: 10,
            age_outside: 5,
            balanced: 10,
            imbalanced: 2,
            exceptional_apy: 10,
            exceptional_volume: 10,
            rug_penalty: 20,
            thin_tvl_penalty: 15,
        }
    }
}

// ─────────────────────────────────────────────────────────
// Entry criteria
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EntryCriteria {
    /// Hard gates; any failure short-circuits to SKIP.
    pub min_apy_pct: f64,
    pub min_tvl_usd: f64,
    pub min_volume_usd: f64,
    /// ENTER iff total score reaches this.
    pub min_score: i32,
    /// Acceptable pool age window, hours.
    pub min_age_hours: f64,
    pub max_age_hours: f64,
    /// Sweet-spot sub-window inside the acceptable window.
    pub sweet_age_min_hours: f64,
    pub sweet_age_max_hours: f64,
    /// Minimum liquidity balance ratio (1.0 = perfect 50/50).
    pub min_balance_ratio: f64,
    /// Yield above this is treated as a rug-pull signal.
    pub max_sane_apy_pct: f64,
    /// Red flag when 24h volume exceeds this multiple of TVL.
    pub turnover_red_flag: f64,
    /// Bonus multiples over the respective minimums.
    pub apy_exceptional_mult: f64,
    pub volume_exceptional_mult: f64,
    pub weights: ScoreWeights,
}

impl EntryCriteria {
    /// Loose tuning for synthetic/demo data.
    pub fn lenient() -> Self {
        Self {
            min_apy_pct: 12.0,
            min_tvl_usd: 100.0,
            min_volume_usd: 500.0,
            min_score: 70,
            min_age_hours: 0.5,
            max_age_hours: 48.0,
            sweet_age_min_hours: 1.0,
            sweet_age_max_hours: 6.0,
            min_balance_ratio: 0.7,
            max_sane_apy_pct: 500.0,
            turnover_red_flag: 3.0,
            apy_exceptional_mult: 2.0,
            volume_exceptional_mult: 5.0,
            weights: ScoreWeights::default(),
        }
    }

    /// Stricter tuning for live market data.
    pub fn strict() -> Self {
        Self {
            min_apy_pct: 20.0,
            min_tvl_usd: 50_000.0,
            min_volume_usd: 10_000.0,
            min_score: 75,
            ..Self::lenient()
        }
    }

    pub fn from_env() -> Self {
        let profile = std::env::var("SCOUT_PROFILE").unwrap_or_default();
        let mut c = match profile.as_str() {
            "strict" => Self::strict(),
            _ => Self::lenient(),
        };
        env_f64("SCOUT_MIN_APY", &mut c.min_apy_pct);
        env_f64("SCOUT_MIN_TVL", &mut c.min_tvl_usd);
        env_f64("SCOUT_MIN_VOLUME", &mut c.min_volume_usd);
        if let Ok(v) = std::env::var("SCOUT_MIN_SCORE") {
            if let Ok(n) = v.parse::<i32>() {
                c.min_score = n;
            }
        }
        env_f64("SCOUT_MIN_AGE_HOURS", &mut c.min_age_hours);
        env_f64("SCOUT_MAX_AGE_HOURS", &mut c.max_age_hours);
        env_f64("SCOUT_SWEET_AGE_MIN", &mut c.sweet_age_min_hours);
        env_f64("SCOUT_SWEET_AGE_MAX", &mut c.sweet_age_max_hours);
        env_f64("SCOUT_MIN_BALANCE_RATIO", &mut c.min_balance_ratio);
        c
    }
}

// ─────────────────────────────────────────────────────────
// Exit criteria
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExitCriteria {
    /// Negative percentage; P&L at or below this triggers stop-loss.
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// Current pool yield below this triggers a yield-collapse exit.
    pub exit_apy_floor_pct: f64,
    pub max_hold_hours: f64,
}

impl Default for ExitCriteria {
    fn default() -> Self {
        Self {
            stop_loss_pct: -10.0,
            take_profit_pct: 20.0,
            exit_apy_floor_pct: 8.0,
            max_hold_hours: 72.0,
        }
    }
}

impl ExitCriteria {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        env_f64("SCOUT_STOP_LOSS_PCT", &mut c.stop_loss_pct);
        env_f64("SCOUT_TAKE_PROFIT_PCT", &mut c.take_profit_pct);
        env_f64("SCOUT_EXIT_APY_FLOOR", &mut c.exit_apy_floor_pct);
        env_f64("SCOUT_MAX_HOLD_HOURS", &mut c.max_hold_hours);
        c
    }
}

// ─────────────────────────────────────────────────────────
// Portfolio sizing
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PortfolioConfig {
    pub starting_cash_usd: f64,
    pub position_size_usd: f64,
    pub max_positions: usize,
    pub max_total_investment_usd: f64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            starting_cash_usd: 1_000.0,
            position_size_usd: 50.0,
            max_positions: 5,
            max_total_investment_usd: 500.0,
        }
    }
}

impl PortfolioConfig {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        env_f64("SCOUT_STARTING_CASH", &mut c.starting_cash_usd);
        env_f64("SCOUT_POSITION_SIZE", &mut c.position_size_usd);
        env_usize("SCOUT_MAX_POSITIONS", &mut c.max_positions);
        env_f64("SCOUT_MAX_INVESTMENT", &mut c.max_total_investment_usd);
        c
    }
}

// ─────────────────────────────────────────────────────────
// Orchestration cadences
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub scan_interval: Duration,
    pub update_interval: Duration,
    /// A scan arriving before this much time has passed since the previous
    /// one is dropped as a no-op (guards against timer drift overlap).
    pub min_scan_gap: Duration,
    /// Consecutive discovery failures before flipping to the fallback source.
    pub max_source_failures: u32,
    /// Performance-logging / snapshot cadence.
    pub snapshot_interval: Duration,
    pub action_log_max: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(60),
            update_interval: Duration::from_secs(30),
            min_scan_gap: Duration::from_secs(10),
            max_source_failures: 3,
            snapshot_interval: Duration::from_secs(300),
            action_log_max: 200,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        let mut scan_secs = c.scan_interval.as_secs();
        let mut update_secs = c.update_interval.as_secs();
        let mut gap_secs = c.min_scan_gap.as_secs();
        let mut snap_secs = c.snapshot_interval.as_secs();
        env_u64("SCOUT_SCAN_INTERVAL_SECS", &mut scan_secs);
        env_u64("SCOUT_UPDATE_INTERVAL_SECS", &mut update_secs);
        env_u64("SCOUT_MIN_SCAN_GAP_SECS", &mut gap_secs);
        env_u64("SCOUT_SNAPSHOT_INTERVAL_SECS", &mut snap_secs);
        c.scan_interval = Duration::from_secs(scan_secs.max(1));
        c.update_interval = Duration::from_secs(update_secs.max(1));
        c.min_scan_gap = Duration::from_secs(gap_secs);
        c.snapshot_interval = Duration::from_secs(snap_secs.max(1));
        if let Ok(v) = std::env::var("SCOUT_MAX_SOURCE_FAILURES") {
            if let Ok(n) = v.parse::<u32>() {
                c.max_source_failures = n;
            }
        }
        env_usize("SCOUT_ACTION_LOG_MAX", &mut c.action_log_max);
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_differ_only_in_thresholds() {
        let lenient = EntryCriteria::lenient();
        let strict = EntryCriteria::strict();
        assert!(strict.min_apy_pct > lenient.min_apy_pct);
        assert!(strict.min_tvl_usd > lenient.min_tvl_usd);
        assert!(strict.min_score > lenient.min_score);
        // Shared shape: same age window and weights.
        assert!((strict.max_age_hours - lenient.max_age_hours).abs() < 1e-9);
        assert_eq!(strict.weights.apy_gate, lenient.weights.apy_gate);
    }

    #[test]
    fn test_defaults_are_coherent() {
        let e = EntryCriteria::lenient();
        assert!(e.min_age_hours < e.sweet_age_min_hours);
        assert!(e.sweet_age_max_hours < e.max_age_hours);
        assert!(e.min_balance_ratio > 0.0 && e.min_balance_ratio <= 1.0);

        let x = ExitCriteria::default();
        assert!(x.stop_loss_pct < 0.0);
        assert!(x.take_profit_pct > 0.0);

        let p = PortfolioConfig::default();
        assert!(p.position_size_usd * p.max_positions as f64 <= p.starting_cash_usd);
    }
}
