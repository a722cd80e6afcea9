//! Audit event sink.
//!
//! Mirroring attempts and outcomes are recorded as a side effect. The sink
//! is fire-and-forget: recording must never block the caller or alter the
//! result of the operation being audited.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::Serialize;

use meshstore_common::{NodeId, ShardHash};

/// What kind of event is being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditKind {
    /// A mirror-establishment run committed new replicas.
    MirrorEstablished,
    /// A mirror-establishment run failed after passing the outcome gate.
    MirrorFailed,
}

/// One audit record of a mirroring attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub kind: AuditKind,
    pub shard_hash: ShardHash,
    /// Peers the event concerns: newly committed replicas on success,
    /// empty on failure.
    pub nodes: Vec<NodeId>,
    /// Unix timestamp (seconds) the event was recorded.
    pub timestamp: u64,
}

impl AuditEvent {
    #[must_use]
    pub fn new(kind: AuditKind, shard_hash: ShardHash, nodes: Vec<NodeId>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        AuditEvent {
            kind,
            shard_hash,
            nodes,
            timestamp,
        }
    }
}

/// Fire-and-forget audit sink.
pub trait AuditSink: Send + Sync {
    /// Records `event`. Must not block; failures stay inside the sink.
    fn record(&self, event: AuditEvent);
}

/// Sink that forwards events to the structured log and drops them.
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(target: "meshstore::audit", "{}", payload),
            Err(e) => tracing::warn!("failed to serialize audit event: {}", e),
        }
    }
}

/// Sink that retains events in memory, for tests and inspection.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in arrival order.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().push(event);
    }
}
