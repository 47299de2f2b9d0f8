//! Synthetic pool source.
//!
//! Stands in for the real discovery API in demos and acts as the fallback
//! once the live source keeps failing. Emits randomized but plausible pool
//! records and replays them through `fetch_metrics` as a bounded random
//! walk, so positions opened against synthetic data can actually hit their
//! exit triggers. The core treats this data exactly like real data.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use tokio::sync::Mutex;

use super::PoolSource;
use crate::scout::types::{PoolRecord, TokenInfo};

const QUOTE_MINT: &str = "So11111111111111111111111111111111111111112";

const SYMBOLS: &[&str] = &[
    "WIF", "BONK", "POPCAT", "MEW", "BODEN", "SLERF", "SAMO", "PONKE", "GIGA", "FWOG",
];

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Pools emitted per discovery sweep.
    pub batch_size: usize,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self { batch_size: 8 }
    }
}

pub struct SyntheticSource {
    cfg: SyntheticConfig,
    seq: AtomicU64,
    /// Last emitted snapshot per pool id, walked forward on each metrics call.
    pools: Mutex<HashMap<String, PoolRecord>>,
}

impl SyntheticSource {
    pub fn new(cfg: SyntheticConfig) -> Self {
        Self {
            cfg,
            seq: AtomicU64::new(0),
            pools: Mutex::new(HashMap::new()),
        }
    }

    fn generate_pool(&self) -> PoolRecord {
        let mut rng = rand::thread_rng();
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let symbol = SYMBOLS[rng.gen_range(0..SYMBOLS.len())];
        let now = Utc::now();

        // Log-uniform TVL between $50 and $500k keeps both gate failures
        // and attractive candidates in every batch.
        let tvl_usd = (50.0_f64.ln() + rng.gen::<f64>() * (500_000.0_f64 / 50.0).ln()).exp();
        let volume_24h_usd = tvl_usd * rng.gen_range(0.05..4.0);
        let fees_24h_usd = volume_24h_usd * 0.0025;
        let apy_pct = fees_24h_usd / tvl_usd * 365.0 * 100.0;
        let price = rng.gen_range(0.000_1..5.0);
        let age_hours = rng.gen_range(0.1..72.0);

        // Split TVL across the two sides with some imbalance.
        let base_share = rng.gen_range(0.25..0.75);
        let base_value = tvl_usd * base_share;
        let quote_value = tvl_usd - base_value;

        PoolRecord {
            id: format!("SYNTH-{n:06}"),
            base: TokenInfo {
                mint: format!("synth-mint-{n:06}"),
                symbol: symbol.to_string(),
                decimals: 9,
                reserve: base_value / price,
            },
            quote: TokenInfo {
                mint: QUOTE_MINT.to_string(),
                symbol: "SOL".to_string(),
                decimals: 9,
                reserve: quote_value,
            },
            tvl_usd,
            volume_24h_usd,
            fees_24h_usd,
            apy_pct,
            created_at: now - ChronoDuration::seconds((age_hours * 3600.0) as i64),
            lp_supply: rng.gen_range(1_000.0..1_000_000.0),
            price,
        }
    }

    fn walk(record: &mut PoolRecord) {
        let mut rng = rand::thread_rng();
        record.price *= 1.0 + rng.gen_range(-0.03..0.03);
        record.apy_pct *= rng.gen_range(0.85..1.15);
        record.tvl_usd *= 1.0 + rng.gen_range(-0.05..0.05);
        record.volume_24h_usd *= 1.0 + rng.gen_range(-0.10..0.10);
        record.fees_24h_usd = record.volume_24h_usd * 0.0025;
    }
}

#[async_trait]
impl PoolSource for SyntheticSource {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn fetch_pools(&self) -> Result<Vec<PoolRecord>> {
        let batch: Vec<PoolRecord> = (0..self.cfg.batch_size)
            .map(|_| self.generate_pool())
            .collect();

        let mut pools = self.pools.lock().await;
        for record in &batch {
            pools.insert(record.id.clone(), record.clone());
        }
        Ok(batch)
    }

    async fn fetch_metrics(&self, pool_id: &str) -> Result<Option<PoolRecord>> {
        let mut pools = self.pools.lock().await;
        match pools.get_mut(pool_id) {
            Some(record) => {
                Self::walk(record);
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_is_valid_and_unique() {
        let source = SyntheticSource::new(SyntheticConfig { batch_size: 20 });
        let batch = source.fetch_pools().await.unwrap();
        assert_eq!(batch.len(), 20);
        for record in &batch {
            assert!(record.is_valid(), "invalid synthetic record: {record:?}");
        }
        let mut ids: Vec<&str> = batch.iter().map(|r| r.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 20);
    }

    #[tokio::test]
    async fn test_metrics_walk_known_pool() {
        let source = SyntheticSource::new(SyntheticConfig::default());
        let batch = source.fetch_pools().await.unwrap();
        let id = batch[0].id.clone();

        let snap = source.fetch_metrics(&id).await.unwrap().unwrap();
        assert_eq!(snap.id, id);
        assert!(snap.is_valid());
        // Bounded walk: one step moves price at most 3%.
        let drift = (snap.price / batch[0].price - 1.0).abs();
        assert!(drift <= 0.03 + 1e-9);
    }

    #[tokio::test]
    async fn test_metrics_unknown_pool_is_absent_not_error() {
        let source = SyntheticSource::new(SyntheticConfig::default());
        let snap = source.fetch_metrics("no-such-pool").await.unwrap();
        assert!(snap.is_none());
    }
}
