//! Detached execution of post-acknowledgment side effects.
//!
//! Once a report is merged and acknowledged, reputation scoring and mirror
//! establishment happen off the request path: the reconciliation engine
//! enqueues [`SideEffect`]s on an unbounded channel and the
//! [`EffectWorker`] drains it on a background task. Worker failures are
//! logged and audited only — they can never reach the caller whose report
//! was already accepted.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use meshstore_common::{ExchangeOutcome, NodeId, ShardHash};

use crate::mirror::MirrorOrchestrator;
use crate::reputation::ReputationScorer;

/// Work dispatched after a first-time report merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Apply a reputation point delta to a peer.
    AdjustReputation { node_id: NodeId, delta: i64 },

    /// Run the mirror-establishment orchestrator for a shard.
    EstablishMirror {
        shard_hash: ShardHash,
        /// Peer the shard can be pulled from.
        source: NodeId,
        outcome: ExchangeOutcome,
    },
}

/// Creates the channel connecting the reconciliation engine to an
/// [`EffectWorker`].
#[must_use]
pub fn effect_channel() -> (
    mpsc::UnboundedSender<SideEffect>,
    mpsc::UnboundedReceiver<SideEffect>,
) {
    mpsc::unbounded_channel()
}

/// Background executor for [`SideEffect`]s.
pub struct EffectWorker {
    scorer: ReputationScorer,
    orchestrator: Arc<MirrorOrchestrator>,
    replication_factor: usize,
}

impl EffectWorker {
    #[must_use]
    pub fn new(
        scorer: ReputationScorer,
        orchestrator: Arc<MirrorOrchestrator>,
        replication_factor: usize,
    ) -> Self {
        EffectWorker {
            scorer,
            orchestrator,
            replication_factor,
        }
    }

    /// Executes a single effect. Failures are logged, never returned.
    pub async fn handle(&self, effect: SideEffect) {
        match effect {
            SideEffect::AdjustReputation { node_id, delta } => {
                self.scorer.adjust(&node_id, delta).await;
            }
            SideEffect::EstablishMirror {
                shard_hash,
                source,
                outcome,
            } => {
                if let Err(e) = self
                    .orchestrator
                    .trigger_mirror_establish(self.replication_factor, shard_hash, source, outcome)
                    .await
                {
                    warn!("mirror establishment for {} failed: {}", shard_hash, e);
                }
            }
        }
    }

    /// Drains the channel until every sender is dropped.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<SideEffect>) {
        while let Some(effect) = rx.recv().await {
            self.handle(effect).await;
        }
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<SideEffect>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }
}
