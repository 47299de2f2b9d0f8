use std::env;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pool_scout::admin::{self, AdminState};
use pool_scout::scout::audit::{AuditSink, AuditWriter};
use pool_scout::scout::config::{
    env_flag, EntryCriteria, ExitCriteria, MonitorConfig, PortfolioConfig,
};
use pool_scout::scout::exit::ExitPolicy;
use pool_scout::scout::monitor::PoolMonitor;
use pool_scout::scout::portfolio::Portfolio;
use pool_scout::scout::scoring::ScoringEngine;
use pool_scout::sources::dexscreener::{DexScreenerConfig, DexScreenerSource};
use pool_scout::sources::synthetic::{SyntheticConfig, SyntheticSource};
use pool_scout::sources::PoolSource;
use pool_scout::state::StateWriter;

/// Console logging, plus a non-blocking file layer when SCOUT_LOG_FILE is
/// set. The returned guard must stay alive for the file writer to flush.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match env::var("SCOUT_LOG_FILE") {
        Ok(path) if !path.is_empty() => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| ".".into());
            let file = path
                .file_name()
                .map(|f| f.to_owned())
                .unwrap_or_else(|| "pool_scout.log".into());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = init_tracing();

    info!("═══════════════════════════════════════════════════");
    info!("  pool_scout — LP scoring & paper-position simulator");
    info!("═══════════════════════════════════════════════════");

    let entry = EntryCriteria::from_env();
    let exit = ExitCriteria::from_env();
    let sizing = PortfolioConfig::from_env();
    let monitor_cfg = MonitorConfig::from_env();
    let state_writer = StateWriter::from_env();
    let use_synthetic = env_flag("SCOUT_SYNTHETIC");

    info!(
        "📊 entry: apy>={:.0}% tvl>=${:.0} vol>=${:.0} score>={} | exit: sl={:.0}% tp={:.0}% floor={:.0}% max_hold={:.0}h",
        entry.min_apy_pct, entry.min_tvl_usd, entry.min_volume_usd, entry.min_score,
        exit.stop_loss_pct, exit.take_profit_pct, exit.exit_apy_floor_pct, exit.max_hold_hours,
    );
    info!(
        "💰 sizing: cash=${:.0} position=${:.0} max_positions={} max_invested=${:.0}",
        sizing.starting_cash_usd,
        sizing.position_size_usd,
        sizing.max_positions,
        sizing.max_total_investment_usd,
    );

    // ═══ Audit pipeline ═══
    let (audit, audit_rx) = AuditSink::channel();
    let writer = AuditWriter::new(
        monitor_cfg.action_log_max,
        audit_rx,
        state_writer.actions_path(),
        monitor_cfg.snapshot_interval,
    );
    let writer_handle = tokio::spawn(writer.run());

    // ═══ Ledger + engines ═══
    let portfolio = Arc::new(Mutex::new(Portfolio::new(sizing, audit.clone())));
    let scoring = ScoringEngine::new(entry, audit.clone());
    let exit_policy = ExitPolicy::new(exit);

    // ═══ Data sources ═══
    let primary: Box<dyn PoolSource> = if use_synthetic {
        info!("📝 SYNTHETIC mode — primary source is the demo generator");
        Box::new(SyntheticSource::new(SyntheticConfig::default()))
    } else {
        Box::new(DexScreenerSource::new(DexScreenerConfig::from_env())?)
    };
    let fallback: Box<dyn PoolSource> = Box::new(SyntheticSource::new(SyntheticConfig::default()));

    // ═══ Orchestrator ═══
    let (monitor, status_rx) = PoolMonitor::new(
        monitor_cfg,
        scoring,
        exit_policy,
        portfolio.clone(),
        primary,
        fallback,
        audit,
        state_writer.clone(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor_handle = tokio::spawn(monitor.run(shutdown_rx));

    // ═══ Optional status endpoint ═══
    let admin_handle = match env::var("SCOUT_ADMIN_ADDR") {
        Ok(addr) if !addr.is_empty() => {
            let addr = addr.parse()?;
            let state = AdminState {
                portfolio: portfolio.clone(),
                status_rx,
            };
            Some(tokio::spawn(async move {
                if let Err(e) = admin::serve(state, addr).await {
                    warn!("admin endpoint failed: {e:#}");
                }
            }))
        }
        _ => None,
    };

    // ═══ Run until Ctrl+C ═══
    tokio::signal::ctrl_c().await?;
    info!("🛑 stop requested — letting in-flight cycles finish");

    let _ = shutdown_tx.send(true);
    let _ = monitor_handle.await;

    if let Some(handle) = admin_handle {
        handle.abort();
        let _ = handle.await;
    }

    // Final snapshot + summary before the audit pipeline closes.
    {
        let pf = portfolio.lock().await;
        if let Err(e) = state_writer.write_portfolio(&pf).await {
            warn!("failed to write final snapshot: {e:#}");
        }
        let summary = pf.summary();
        let stats = pf.performance();
        info!(
            "🏁 final: ${:.2} total ({:+.2}%) | {} open, {} closed, win_rate={:.0}%",
            summary.total_value_usd,
            summary.total_pnl_pct,
            summary.active_positions,
            summary.closed_positions,
            stats.win_rate_pct,
        );
    }

    // Dropping the last ledger (and its sink) closes the audit channel;
    // the writer flushes once more and exits.
    drop(portfolio);
    if tokio::time::timeout(Duration::from_secs(5), writer_handle)
        .await
        .is_err()
    {
        warn!("audit writer did not flush in time");
    }

    Ok(())
}
