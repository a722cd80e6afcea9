//! The transfer record: one authoritative row per shard exchange.

use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, ShardHash};
use crate::report::ExchangeReport;

/// Which party of the exchange submitted a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportParty {
    /// The requesting client.
    Client,
    /// The storage node that served the exchange.
    Farmer,
}

/// Authoritative record of one shard exchange, keyed by `token`.
///
/// Created when a transfer is initiated (outside this core) and mutated at
/// most twice, once per party, by the reconciliation engine. Each report
/// slot is set-once: the store's conditional update refuses to overwrite a
/// populated slot, so duplicate submissions reconcile as no-ops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    /// Opaque id correlating reports to this record.
    pub token: String,

    /// Identity of the requesting party (authenticated user id).
    pub client: String,

    /// Identity of the storage node.
    pub farmer: NodeId,

    /// Shard this exchange moved.
    pub shard_hash: ShardHash,

    /// The client's report, set at most once.
    pub client_report: Option<ExchangeReport>,

    /// The farmer's report, set at most once.
    pub farmer_report: Option<ExchangeReport>,
}

impl TransferRecord {
    /// Creates a record for a freshly initiated transfer with no reports.
    #[must_use]
    pub fn new(
        token: impl Into<String>,
        client: impl Into<String>,
        farmer: NodeId,
        shard_hash: ShardHash,
    ) -> Self {
        TransferRecord {
            token: token.into(),
            client: client.into(),
            farmer,
            shard_hash,
            client_report: None,
            farmer_report: None,
        }
    }

    /// The report slot belonging to `party`.
    #[must_use]
    pub fn report_for(&self, party: ReportParty) -> Option<&ExchangeReport> {
        match party {
            ReportParty::Client => self.client_report.as_ref(),
            ReportParty::Farmer => self.farmer_report.as_ref(),
        }
    }
}
