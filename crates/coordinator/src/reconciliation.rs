//! # Report Reconciliation Engine
//!
//! Request-facing entry point for exchange-report submission. Merges the
//! two parties' independent, possibly-conflicting, possibly-duplicated
//! reports of one shard transfer into the authoritative transfer record.
//!
//! ## Submission Flow
//!
//! ```text
//! SubmitReport { report, reporter }
//!      │
//!      ▼ (1) find record by token      ──▶ Internal / NotFound
//!      ▼ (2) validate report           ──▶ BadRequest
//!      ▼ (3) authorize reporter        ──▶ NotAuthorized
//!      ▼ (4) conditional merge
//!      ├─ AlreadyRecorded ──▶ Ack::AlreadyRecorded (no side effects)
//!      └─ Merged ──▶ enqueue side effects ──▶ Ack::Created
//! ```
//!
//! ## Idempotence
//!
//! Each report slot on the transfer record is set-once. Resubmission is
//! never an error: the duplicate is acknowledged with
//! [`ReportAck::AlreadyRecorded`], nothing is written, and no side effect
//! runs. The merge is an atomic conditional update in the store, so two
//! concurrent identical submissions cannot both be `Created`.
//!
//! ## Side Effects
//!
//! On first-time merge only, the engine enqueues mirror establishment
//! (gated downstream on the outcome kind) and, for client-submitted
//! reports, a reputation adjustment for the record's farmer. Both are
//! detached: they never block or alter the acknowledgment.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use meshstore_common::{
    validate_exchange_report, ExchangeReport, NodeId, ReportParty, TransferRecord,
    RESULT_CODE_SUCCESS,
};

use crate::effects::SideEffect;
use crate::stores::{MergeOutcome, TransferRecordStore};

/// Reconciliation failure, surfaced synchronously to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReportError {
    /// Persistence or infrastructure failure, not actionable by the
    /// caller.
    #[error("internal error: {0}")]
    Internal(String),

    /// No transfer record matches the supplied token.
    #[error("no transfer record matches the supplied token")]
    NotFound,

    /// The report failed structural validation.
    #[error("invalid exchange report")]
    BadRequest,

    /// The reporter is not a party to this exchange.
    #[error("reporter is not a party to this exchange")]
    NotAuthorized,
}

/// Caller identity, resolved by the upstream authentication layer. The
/// core never parses credentials itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterIdentity {
    /// An authenticated user: the client side of exchanges it initiated.
    User { id: String },

    /// An authenticated storage node: the farmer side. Trust in the node
    /// id is established upstream, so no further equality check is made
    /// against the record.
    Farmer { node_id: NodeId },
}

/// One report submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReport {
    pub report: ExchangeReport,
    pub reporter: ReporterIdentity,
}

/// Acknowledgment of an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportAck {
    /// First-time merge; the report is now part of the record.
    Created,

    /// The slot was already populated; nothing changed.
    AlreadyRecorded,
}

/// Validates, authorizes, and idempotently merges exchange reports, then
/// hands side effects to the background effect worker.
pub struct ReconciliationEngine {
    records: Arc<dyn TransferRecordStore>,
    effects: mpsc::UnboundedSender<SideEffect>,
    reputation_points: i64,
}

impl ReconciliationEngine {
    #[must_use]
    pub fn new(
        records: Arc<dyn TransferRecordStore>,
        effects: mpsc::UnboundedSender<SideEffect>,
        reputation_points: i64,
    ) -> Self {
        ReconciliationEngine {
            records,
            effects,
            reputation_points,
        }
    }

    /// Submits one exchange report.
    pub async fn submit_report(&self, request: SubmitReport) -> Result<ReportAck, ReportError> {
        let record = self
            .records
            .find_by_token(&request.report.token)
            .await
            .map_err(|e| ReportError::Internal(e.to_string()))?
            .ok_or(ReportError::NotFound)?;

        if !validate_exchange_report(&request.report) {
            return Err(ReportError::BadRequest);
        }

        let party = match &request.reporter {
            ReporterIdentity::User { id } => {
                if *id != record.client {
                    return Err(ReportError::NotAuthorized);
                }
                ReportParty::Client
            }
            ReporterIdentity::Farmer { .. } => ReportParty::Farmer,
        };

        let merge = self
            .records
            .record_report(&request.report.token, party, request.report.clone())
            .await
            .map_err(|e| ReportError::Internal(e.to_string()))?;

        match merge {
            MergeOutcome::AlreadyRecorded => Ok(ReportAck::AlreadyRecorded),
            MergeOutcome::Merged => {
                self.dispatch_side_effects(&record, &request);
                Ok(ReportAck::Created)
            }
        }
    }

    /// Enqueues the post-merge side effects. Runs for first-time merges
    /// only; enqueue failure means the worker is gone, which is logged
    /// and otherwise ignored — the acknowledgment is already determined.
    fn dispatch_side_effects(&self, record: &TransferRecord, request: &SubmitReport) {
        // Validation passed, so the outcome kind parses.
        if let Some(outcome) = request.report.outcome() {
            self.enqueue(SideEffect::EstablishMirror {
                shard_hash: record.shard_hash,
                source: record.farmer,
                outcome,
            });
        }

        if matches!(request.reporter, ReporterIdentity::User { .. }) {
            let delta = if request.report.exchange_result_code == RESULT_CODE_SUCCESS {
                self.reputation_points
            } else {
                -self.reputation_points
            };
            self.enqueue(SideEffect::AdjustReputation {
                node_id: record.farmer,
                delta,
            });
        }
    }

    fn enqueue(&self, effect: SideEffect) {
        if self.effects.send(effect).is_err() {
            warn!("effect worker is gone; dropping side effect");
        }
    }
}
