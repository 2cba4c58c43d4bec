//! Stage-completion events and coarse cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use linchpin_common::Stage;

use crate::job::JobState;

// ── Progress events ───────────────────────────────────────────────────────────

/// Emitted once per stage, after its tables are persisted (or it failed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    pub job_id: Uuid,
    pub stage: Stage,
    pub success: bool,
    pub error: Option<String>,
    /// Job state after the event.
    pub state: JobState,
    pub timestamp: DateTime<Utc>,
}

impl StageEvent {
    pub fn completed(job_id: Uuid, stage: Stage, state: JobState) -> Self {
        Self {
            job_id,
            stage,
            success: true,
            error: None,
            state,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(job_id: Uuid, stage: Stage, error: impl Into<String>) -> Self {
        Self {
            job_id,
            stage,
            success: false,
            error: Some(error.into()),
            state: JobState::Failed,
            timestamp: Utc::now(),
        }
    }
}

/// One-way progress notification. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: StageEvent);
}

/// Fans events out over a `tokio::sync::broadcast` channel. Events sent with
/// no live subscriber are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<StageEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<StageEvent> {
        self.tx.clone()
    }
}

impl ProgressSink for BroadcastSink {
    fn emit(&self, event: StageEvent) {
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: StageEvent) {}
}

// ── Cancellation ─────────────────────────────────────────────────────────────

/// Shared flag checked at stage boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
