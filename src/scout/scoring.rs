//! Entry scoring engine.
//!
//! Additive point model with early rejection on hard gates, evaluated in a
//! fixed order: yield → TVL → 24h volume. Each gate awards its base points
//! as it passes; the first failing gate short-circuits to SKIP, keeping
//! only the points banked so far and a single explanatory reason. Pools
//! clearing all gates collect age, balance and exceptional-metric bonuses,
//! minus red-flag penalties (the score may go negative). ENTER iff the
//! total reaches the configured minimum score.
//!
//! All thresholds and point values come from [`EntryCriteria`].

use chrono::Utc;
use tracing::debug;

use super::audit::{ActionKind, AuditSink};
use super::config::EntryCriteria;
use super::types::{EntryDecision, Evaluation, PoolRecord};

pub struct ScoringEngine {
    criteria: EntryCriteria,
    audit: AuditSink,
}

impl ScoringEngine {
    pub fn new(criteria: EntryCriteria, audit: AuditSink) -> Self {
        Self { criteria, audit }
    }

    pub fn criteria(&self) -> &EntryCriteria {
        &self.criteria
    }

    /// Score one pool snapshot. Never mutates the record; malformed records
    /// must be filtered out by [`PoolRecord::is_valid`] before this point.
    pub fn evaluate(&self, pool: &PoolRecord) -> Evaluation {
        let c = &self.criteria;
        let w = &c.weights;
        let mut score = 0;

        // ── Hard gates, short-circuit in order ──
        if pool.apy_pct < c.min_apy_pct {
            let reason = format!(
                "APY {:.1}% below minimum {:.1}%",
                pool.apy_pct, c.min_apy_pct
            );
            return self.reject(pool, score, reason);
        }
        score += w.apy_gate;

        if pool.tvl_usd < c.min_tvl_usd {
            let reason = format!(
                "TVL ${:.0} below minimum ${:.0}",
                pool.tvl_usd, c.min_tvl_usd
            );
            return self.reject(pool, score, reason);
        }
        score += w.tvl_gate;

        if pool.volume_24h_usd < c.min_volume_usd {
            let reason = format!(
                "24h volume ${:.0} below minimum ${:.0}",
                pool.volume_24h_usd, c.min_volume_usd
            );
            return self.reject(pool, score, reason);
        }
        score += w.volume_gate;

        let mut reasons = vec![
            format!("APY {:.1}% clears {:.1}%", pool.apy_pct, c.min_apy_pct),
            format!("TVL ${:.0} clears ${:.0}", pool.tvl_usd, c.min_tvl_usd),
            format!(
                "24h volume ${:.0} clears ${:.0}",
                pool.volume_24h_usd, c.min_volume_usd
            ),
        ];
        let mut warnings = Vec::new();

        // ── Pool age ──
        let age = pool.age_hours(Utc::now());
        if age >= c.min_age_hours && age <= c.max_age_hours {
            score += w.age_in_window;
            if age >= c.sweet_age_min_hours && age <= c.sweet_age_max_hours {
                score += w.age_sweet_spot;
                reasons.push(format!("age {age:.1}h in sweet spot"));
            } else {
                reasons.push(format!("age {age:.1}h within window"));
            }
        } else {
            score += w.age_outside;
            warnings.push(format!(
                "age {age:.1}h outside {:.1}-{:.1}h window",
                c.min_age_hours, c.max_age_hours
            ));
        }

        // ── Liquidity balance ──
        let ratio = pool.balance_ratio();
        if ratio >= c.min_balance_ratio {
            score += w.balanced;
            reasons.push(format!("liquidity balance {ratio:.2}"));
        } else {
            score += w.imbalanced;
            warnings.push(format!(
                "lopsided liquidity: balance {ratio:.2} below {:.2}",
                c.min_balance_ratio
            ));
        }

        // ── Exceptional metrics (both may apply) ──
        if pool.apy_pct >= c.min_apy_pct * c.apy_exceptional_mult {
            score += w.exceptional_apy;
            reasons.push(format!(
                "APY {:.1}% at {:.0}x the minimum",
                pool.apy_pct, c.apy_exceptional_mult
            ));
        }
        if pool.volume_24h_usd >= c.min_volume_usd * c.volume_exceptional_mult {
            score += w.exceptional_volume;
            reasons.push(format!(
                "volume ${:.0} at {:.0}x the minimum",
                pool.volume_24h_usd, c.volume_exceptional_mult
            ));
        }

        // ── Red flags ──
        if pool.apy_pct > c.max_sane_apy_pct {
            score -= w.rug_penalty;
            warnings.push(format!(
                "APY {:.1}% above sanity ceiling {:.1}% (rug signal)",
                pool.apy_pct, c.max_sane_apy_pct
            ));
        }
        if pool.volume_24h_usd > pool.tvl_usd * c.turnover_red_flag {
            score -= w.thin_tvl_penalty;
            warnings.push(format!(
                "TVL ${:.0} thin against 24h volume ${:.0}",
                pool.tvl_usd, pool.volume_24h_usd
            ));
        }

        let decision = if score >= c.min_score {
            EntryDecision::Enter
        } else {
            EntryDecision::Skip
        };
        self.finish(pool, decision, score, reasons, warnings)
    }

    /// Hard-gate failure: always SKIP, whatever points were banked.
    fn reject(&self, pool: &PoolRecord, score: i32, reason: String) -> Evaluation {
        self.finish(pool, EntryDecision::Skip, score, vec![reason], vec![])
    }

    fn finish(
        &self,
        pool: &PoolRecord,
        decision: EntryDecision,
        score: i32,
        reasons: Vec<String>,
        warnings: Vec<String>,
    ) -> Evaluation {
        debug!(
            pool = %pool.id,
            score,
            ?decision,
            warnings = warnings.len(),
            "evaluated"
        );
        self.audit
            .record(&pool.id, true, ActionKind::Evaluated { decision, score });
        Evaluation {
            decision,
            score,
            reasons,
            warnings,
        }
    }
}
