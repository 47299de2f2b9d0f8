//! On-disk state snapshots.
//!
//! Observability only: the portfolio is process-resident and never
//! restored from disk. Snapshots are written on the performance-logging
//! cadence and once more at shutdown.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scout::portfolio::{PerformanceStats, Portfolio, PortfolioSummary};
use crate::scout::types::Position;

pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {parent:?}"))?;
    }
    let data = serde_json::to_string_pretty(value).context("failed to serialize snapshot")?;
    tokio::fs::write(path, data)
        .await
        .with_context(|| format!("failed to write {path:?}"))?;
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct PortfolioSnapshot {
    pub ts: DateTime<Utc>,
    pub summary: PortfolioSummary,
    pub performance: PerformanceStats,
    pub active: Vec<Position>,
    pub closed: Vec<Position>,
}

#[derive(Debug, Clone)]
pub struct StateWriter {
    dir: PathBuf,
}

impl StateWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn from_env() -> Self {
        let dir = std::env::var("SCOUT_STATE_DIR").unwrap_or_else(|_| "state".to_string());
        Self::new(PathBuf::from(dir))
    }

    pub fn portfolio_path(&self) -> PathBuf {
        self.dir.join("portfolio.json")
    }

    pub fn actions_path(&self) -> PathBuf {
        self.dir.join("actions.json")
    }

    pub async fn write_portfolio(&self, portfolio: &Portfolio) -> Result<()> {
        let snapshot = PortfolioSnapshot {
            ts: Utc::now(),
            summary: portfolio.summary(),
            performance: portfolio.performance(),
            active: portfolio.active().to_vec(),
            closed: portfolio.closed().to_vec(),
        };
        write_json(&self.portfolio_path(), &snapshot).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scout::audit::AuditSink;
    use crate::scout::config::PortfolioConfig;

    #[tokio::test]
    async fn test_portfolio_snapshot_round_trips_as_json() {
        let dir = std::env::temp_dir().join(format!("pool_scout_{}", uuid::Uuid::new_v4()));
        let writer = StateWriter::new(dir.clone());
        let portfolio = Portfolio::new(PortfolioConfig::default(), AuditSink::disconnected());

        writer.write_portfolio(&portfolio).await.unwrap();

        let raw = tokio::fs::read_to_string(writer.portfolio_path()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["summary"]["active_positions"], 0);
        assert!((value["summary"]["cash_usd"].as_f64().unwrap() - 1_000.0).abs() < 1e-9);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
