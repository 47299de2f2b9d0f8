//! Append-only action log.
//!
//! Every evaluation, entry, re-price and exit leaves one record here.
//! Producers push through a fire-and-forget [`AuditSink`] (unbounded send,
//! never blocks); the [`AuditWriter`] actor owns the bounded ring buffer
//! and flushes it to disk on a slow cadence and at shutdown.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::types::{EntryDecision, ExitUrgency};

// ─────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────

/// What happened. One variant per event type; no free-form detail bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ActionKind {
    Evaluated { decision: EntryDecision, score: i32 },
    Entered { amount_usd: f64 },
    Updated { value_usd: f64, pnl_pct: f64 },
    Exited { reason: String, pnl_usd: f64, urgency: ExitUrgency },
    SourceFailure { source: String, message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub ts: DateTime<Utc>,
    pub pool_id: String,
    pub success: bool,
    #[serde(flatten)]
    pub kind: ActionKind,
}

// ─────────────────────────────────────────────────────────
// Ring buffer
// ─────────────────────────────────────────────────────────

/// Bounded append-only history. Oldest records drop first.
#[derive(Debug)]
pub struct ActionLog {
    max: usize,
    records: VecDeque<ActionRecord>,
}

impl ActionLog {
    pub fn new(max: usize) -> Self {
        Self {
            max: max.max(1),
            records: VecDeque::with_capacity(max.max(1)),
        }
    }

    pub fn push(&mut self, record: ActionRecord) {
        if self.records.len() == self.max {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn snapshot(&self) -> Vec<ActionRecord> {
        self.records.iter().cloned().collect()
    }
}

// ─────────────────────────────────────────────────────────
// Sink
// ─────────────────────────────────────────────────────────

/// Cloneable producer handle. `record` never blocks and never fails the
/// caller; once the writer is gone, records are silently dropped.
#[derive(Debug, Clone)]
pub struct AuditSink {
    tx: mpsc::UnboundedSender<ActionRecord>,
}

impl AuditSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ActionRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A sink with no consumer, for tests and tools.
    pub fn disconnected() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    pub fn record(&self, pool_id: &str, success: bool, kind: ActionKind) {
        let _ = self.tx.send(ActionRecord {
            ts: Utc::now(),
            pool_id: pool_id.to_string(),
            success,
            kind,
        });
    }
}

// ─────────────────────────────────────────────────────────
// Writer actor
// ─────────────────────────────────────────────────────────

/// Owns the ring buffer. Drains the sink channel, flushes JSON periodically
/// and once more when every sink handle has been dropped.
pub struct AuditWriter {
    log: ActionLog,
    rx: mpsc::UnboundedReceiver<ActionRecord>,
    out_path: PathBuf,
    flush_interval: Duration,
}

impl AuditWriter {
    pub fn new(
        max_records: usize,
        rx: mpsc::UnboundedReceiver<ActionRecord>,
        out_path: PathBuf,
        flush_interval: Duration,
    ) -> Self {
        Self {
            log: ActionLog::new(max_records),
            rx,
            out_path,
            flush_interval,
        }
    }

    pub async fn run(mut self) {
        let mut flush = tokio::time::interval(self.flush_interval);
        flush.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        flush.tick().await; // first tick fires immediately, skip it

        loop {
            tokio::select! {
                rec = self.rx.recv() => {
                    match rec {
                        Some(rec) => self.log.push(rec),
                        None => break, // all sinks dropped
                    }
                }
                _ = flush.tick() => {
                    self.flush().await;
                }
            }
        }

        self.flush().await;
        debug!("audit writer stopped ({} records retained)", self.log.len());
    }

    async fn flush(&self) {
        if self.log.is_empty() {
            return;
        }
        if let Err(e) = crate::state::write_json(&self.out_path, &self.log.snapshot()).await {
            warn!("failed to flush action log to {:?}: {e:#}", self.out_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(pool_id: &str) -> ActionRecord {
        ActionRecord {
            ts: Utc::now(),
            pool_id: pool_id.to_string(),
            success: true,
            kind: ActionKind::Evaluated {
                decision: EntryDecision::Skip,
                score: 0,
            },
        }
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut log = ActionLog::new(3);
        for i in 0..5 {
            log.push(make_record(&format!("pool-{i}")));
        }
        assert_eq!(log.len(), 3);
        let ids: Vec<String> = log.snapshot().iter().map(|r| r.pool_id.clone()).collect();
        assert_eq!(ids, vec!["pool-2", "pool-3", "pool-4"]);
    }

    #[tokio::test]
    async fn test_sink_delivers_records() {
        let (sink, mut rx) = AuditSink::channel();
        sink.record("pool-a", true, ActionKind::Entered { amount_usd: 50.0 });
        let rec = rx.recv().await.expect("record delivered");
        assert_eq!(rec.pool_id, "pool-a");
        assert!(rec.success);
        assert!(matches!(rec.kind, ActionKind::Entered { .. }));
    }

    #[test]
    fn test_disconnected_sink_never_panics() {
        let sink = AuditSink::disconnected();
        sink.record("pool-a", false, ActionKind::SourceFailure {
            source: "dexscreener".to_string(),
            message: "timeout".to_string(),
        });
    }
}
