//! Persistence collaborator contracts.
//!
//! The coordination core does not own a persistence engine; it consumes
//! abstract stores offering lookup and update by key. All traits are
//! object-safe and `Send + Sync` so implementations can be shared across
//! request tasks behind `Arc<dyn _>`.

use async_trait::async_trait;
use thiserror::Error;

use meshstore_common::{
    Contact, ContractSet, ExchangeReport, Mirror, NodeId, ReportParty, ShardHash, TransferRecord,
};

/// Backend failure from a document store. The message is preserved
/// verbatim for the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0}")]
    Backend(String),
}

/// Backend failure from the contract ledger.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{0}")]
    Backend(String),
}

/// Result of the conditional report merge on a transfer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The slot was empty; the report is now persisted.
    Merged,
    /// The slot was already populated. Nothing was written.
    AlreadyRecorded,
}

/// Store of transfer records, keyed by token.
#[async_trait]
pub trait TransferRecordStore: Send + Sync {
    /// Looks up the record for `token`. `Ok(None)` means no record exists.
    async fn find_by_token(&self, token: &str) -> Result<Option<TransferRecord>, StoreError>;

    /// Atomically sets the report slot for `party` if, and only if, it is
    /// currently unset. Implementations must make the check-and-set a
    /// single conditional update, not a read followed by a write, so two
    /// concurrent identical submissions cannot both merge.
    async fn record_report(
        &self,
        token: &str,
        party: ReportParty,
        report: ExchangeReport,
    ) -> Result<MergeOutcome, StoreError>;
}

/// Read-only peer lookup by node id.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// `Ok(None)` means the peer is unknown to the directory.
    async fn find_by_id(&self, node_id: &NodeId) -> Result<Option<Contact>, StoreError>;
}

/// Peer store with write access, used by the reputation scorer.
#[async_trait]
pub trait ContactStore: ContactDirectory {
    async fn save(&self, contact: Contact) -> Result<(), StoreError>;
}

/// Store of mirror records per shard, with contacts already resolved.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    async fn find_by_shard_hash(&self, shard_hash: &ShardHash) -> Result<Vec<Mirror>, StoreError>;

    /// Marks the mirror assigning `shard_hash` to `node_id` as established,
    /// removing it from the candidate pool. A missing mirror is a backend
    /// error.
    async fn mark_established(
        &self,
        shard_hash: &ShardHash,
        node_id: &NodeId,
    ) -> Result<(), StoreError>;
}

/// The per-shard contract ledger.
#[async_trait]
pub trait ContractLedger: Send + Sync {
    /// Loads the contract set for `shard_hash`. A shard with no contracts
    /// yet loads as an empty set.
    async fn load(&self, shard_hash: &ShardHash) -> Result<ContractSet, LedgerError>;

    /// Persists an updated contract set.
    async fn save(&self, set: ContractSet) -> Result<(), LedgerError>;
}
