//! DexScreener HTTP adapter.
//!
//! Thin client over the public REST API; no SDK, just reqwest + serde_json.
//! The API reports liquidity/volume but no fee rate or APY, so the APY is
//! derived from 24h volume at the standard AMM fee tier over TVL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::PoolSource;
use crate::scout::types::{PoolRecord, TokenInfo};

const DEFAULT_API_BASE: &str = "https://api.dexscreener.com";

/// Fee share assumed for pools whose DEX does not publish one (0.25%,
/// the common constant-product tier on Solana).
const ASSUMED_FEE_RATE: f64 = 0.0025;

#[derive(Debug, Clone)]
pub struct DexScreenerConfig {
    pub api_base: String,
    /// Search query used for discovery sweeps.
    pub query: String,
    pub request_timeout: Duration,
}

impl Default for DexScreenerConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            query: "SOL".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl DexScreenerConfig {
    pub fn from_env() -> Self {
        let mut c = Self::default();
        if let Ok(v) = std::env::var("SCOUT_DEXSCREENER_BASE") {
            if !v.is_empty() {
                c.api_base = v;
            }
        }
        if let Ok(v) = std::env::var("SCOUT_SEARCH_QUERY") {
            if !v.is_empty() {
                c.query = v;
            }
        }
        c
    }
}

// ─────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    /// The pairs endpoint sends an explicit null when nothing matches.
    pairs: Option<Vec<PairDto>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairDto {
    chain_id: String,
    pair_address: String,
    base_token: TokenDto,
    quote_token: TokenDto,
    /// Base price in quote-token units, serialized as a string.
    price_native: Option<String>,
    volume: Option<VolumeDto>,
    liquidity: Option<LiquidityDto>,
    /// Millisecond epoch; absent for older listings.
    pair_created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenDto {
    address: String,
    symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VolumeDto {
    h24: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LiquidityDto {
    usd: Option<f64>,
    base: Option<f64>,
    quote: Option<f64>,
}

impl PairDto {
    /// Normalize into a pool record; None when the pair is missing the
    /// fields the scoring engine cannot do without.
    fn into_record(self, now: DateTime<Utc>) -> Option<PoolRecord> {
        let price = self.price_native.as_deref()?.parse::<f64>().ok()?;
        let liquidity = self.liquidity?;
        let tvl_usd = liquidity.usd?;
        let volume_24h_usd = self.volume.and_then(|v| v.h24).unwrap_or(0.0);
        let fees_24h_usd = volume_24h_usd * ASSUMED_FEE_RATE;
        let apy_pct = if tvl_usd > 0.0 {
            fees_24h_usd / tvl_usd * 365.0 * 100.0
        } else {
            0.0
        };
        let created_at = self
            .pair_created_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or(now);

        Some(PoolRecord {
            id: self.pair_address,
            base: TokenInfo {
                mint: self.base_token.address,
                symbol: self.base_token.symbol.unwrap_or_else(|| "?".to_string()),
                decimals: 9,
                reserve: liquidity.base.unwrap_or(0.0),
            },
            quote: TokenInfo {
                mint: self.quote_token.address,
                symbol: self.quote_token.symbol.unwrap_or_else(|| "?".to_string()),
                decimals: 9,
                reserve: liquidity.quote.unwrap_or(0.0),
            },
            tvl_usd,
            volume_24h_usd,
            fees_24h_usd,
            apy_pct,
            created_at,
            lp_supply: 0.0,
            price,
        })
    }
}

// ─────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────

pub struct DexScreenerSource {
    cfg: DexScreenerConfig,
    client: reqwest::Client,
}

impl DexScreenerSource {
    pub fn new(cfg: DexScreenerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { cfg, client })
    }

    async fn get_pairs(&self, url: &str) -> Result<Vec<PairDto>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("DexScreener request failed")?;
        if !resp.status().is_success() {
            anyhow::bail!("DexScreener returned status {}", resp.status());
        }
        let body: SearchResponse = resp
            .json()
            .await
            .context("failed to parse DexScreener response")?;
        Ok(body.pairs.unwrap_or_default())
    }
}

#[async_trait]
impl PoolSource for DexScreenerSource {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn fetch_pools(&self) -> Result<Vec<PoolRecord>> {
        let url = format!(
            "{}/latest/dex/search?q={}",
            self.cfg.api_base, self.cfg.query
        );
        let pairs = self.get_pairs(&url).await?;
        let now = Utc::now();
        let records: Vec<PoolRecord> = pairs
            .into_iter()
            .filter(|p| p.chain_id == "solana")
            .filter_map(|p| p.into_record(now))
            .collect();
        debug!("dexscreener search returned {} solana pairs", records.len());
        Ok(records)
    }

    async fn fetch_metrics(&self, pool_id: &str) -> Result<Option<PoolRecord>> {
        let url = format!("{}/latest/dex/pairs/solana/{pool_id}", self.cfg.api_base);
        let pairs = self.get_pairs(&url).await?;
        Ok(pairs.into_iter().next().and_then(|p| p.into_record(Utc::now())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_PAIR: &str = r#"{
        "chainId": "solana",
        "dexId": "raydium",
        "pairAddress": "8sLbNZoA1cfnvMJLPfp98ZLAnFSYCFApfJKMbiXNLwxj",
        "baseToken": {"address": "EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm", "name": "dogwifhat", "symbol": "WIF"},
        "quoteToken": {"address": "So11111111111111111111111111111111111111112", "name": "Wrapped SOL", "symbol": "SOL"},
        "priceNative": "0.01833",
        "volume": {"h24": 2500000.5},
        "liquidity": {"usd": 8200000, "base": 220000000, "quote": 24000},
        "pairCreatedAt": 1703274000000
    }"#;

    #[test]
    fn test_pair_maps_to_record() {
        let dto: PairDto = serde_json::from_str(SAMPLE_PAIR).unwrap();
        let rec = dto.into_record(Utc::now()).unwrap();

        assert_eq!(rec.id, "8sLbNZoA1cfnvMJLPfp98ZLAnFSYCFApfJKMbiXNLwxj");
        assert_eq!(rec.base.symbol, "WIF");
        assert_eq!(rec.quote.symbol, "SOL");
        assert!((rec.price - 0.01833).abs() < 1e-9);
        assert!((rec.tvl_usd - 8_200_000.0).abs() < 1e-6);
        assert!((rec.volume_24h_usd - 2_500_000.5).abs() < 1e-6);
        // APY derived: volume · 0.25% / TVL, annualized.
        let expected_apy = 2_500_000.5 * 0.0025 / 8_200_000.0 * 365.0 * 100.0;
        assert!((rec.apy_pct - expected_apy).abs() < 1e-6);
        assert!(rec.is_valid());
    }

    #[test]
    fn test_pair_without_price_is_dropped() {
        let dto: PairDto = serde_json::from_str(
            r#"{
                "chainId": "solana",
                "pairAddress": "abc",
                "baseToken": {"address": "a", "symbol": "A"},
                "quoteToken": {"address": "b", "symbol": "B"},
                "liquidity": {"usd": 1000, "base": 10, "quote": 10}
            }"#,
        )
        .unwrap();
        assert!(dto.into_record(Utc::now()).is_none());
    }

    #[test]
    fn test_missing_created_at_falls_back_to_now() {
        let dto: PairDto = serde_json::from_str(
            r#"{
                "chainId": "solana",
                "pairAddress": "abc",
                "baseToken": {"address": "a", "symbol": "A"},
                "quoteToken": {"address": "b", "symbol": "B"},
                "priceNative": "1.0",
                "volume": {"h24": 100},
                "liquidity": {"usd": 1000, "base": 10, "quote": 10}
            }"#,
        )
        .unwrap();
        let now = Utc::now();
        let rec = dto.into_record(now).unwrap();
        assert_eq!(rec.created_at, now);
    }

    #[test]
    fn test_search_response_tolerates_null_pairs() {
        let body: SearchResponse =
            serde_json::from_str(r#"{"schemaVersion": "1.0.0", "pairs": null}"#).unwrap();
        assert!(body.pairs.unwrap_or_default().is_empty());
    }
}
