//! Pool data collaborators.
//!
//! The core consumes normalized [`PoolRecord`]s and does not care where
//! they came from; everything behind this trait is a mechanical call to a
//! third party (or the synthetic generator standing in for one).

pub mod dexscreener;
pub mod synthetic;

use anyhow::Result;
use async_trait::async_trait;

use crate::scout::types::PoolRecord;

#[async_trait]
pub trait PoolSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Discover candidate pools. An empty list is a valid answer;
    /// errors are counted by the orchestrator toward fallback switching.
    async fn fetch_pools(&self) -> Result<Vec<PoolRecord>>;

    /// Fresh snapshot of one pool. `Ok(None)` means "skip this position
    /// this cycle", not an error.
    async fn fetch_metrics(&self, pool_id: &str) -> Result<Option<PoolRecord>>;
}
