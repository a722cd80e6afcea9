//! In-memory collaborator implementations.
//!
//! Hash-map-backed implementations of the persistence contracts, used by
//! tests and by deployments that keep coordination state in process. Write
//! counters are exposed so callers can assert that an idempotent
//! resubmission produced no further writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use meshstore_common::{
    Contact, ContractSet, ExchangeReport, Mirror, NodeId, ReportParty, ShardHash, TransferRecord,
};

use crate::stores::{
    ContactDirectory, ContactStore, ContractLedger, LedgerError, MergeOutcome, MirrorStore,
    StoreError, TransferRecordStore,
};

/// In-memory [`TransferRecordStore`].
#[derive(Default)]
pub struct MemoryTransferStore {
    records: RwLock<HashMap<String, TransferRecord>>,
    saves: AtomicUsize,
}

impl MemoryTransferStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a record, replacing any existing one with the same token.
    pub fn insert(&self, record: TransferRecord) {
        self.records.write().insert(record.token.clone(), record);
    }

    /// Number of report merges that actually wrote.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransferRecordStore for MemoryTransferStore {
    async fn find_by_token(&self, token: &str) -> Result<Option<TransferRecord>, StoreError> {
        Ok(self.records.read().get(token).cloned())
    }

    async fn record_report(
        &self,
        token: &str,
        party: ReportParty,
        report: ExchangeReport,
    ) -> Result<MergeOutcome, StoreError> {
        // Single write lock across check and set: the conditional update
        // the trait contract requires.
        let mut records = self.records.write();
        let record = records
            .get_mut(token)
            .ok_or_else(|| StoreError::Backend(format!("no transfer record for token {token}")))?;
        let slot = match party {
            ReportParty::Client => &mut record.client_report,
            ReportParty::Farmer => &mut record.farmer_report,
        };
        if slot.is_some() {
            return Ok(MergeOutcome::AlreadyRecorded);
        }
        *slot = Some(report);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(MergeOutcome::Merged)
    }
}

/// In-memory [`ContactStore`] (and [`ContactDirectory`]).
#[derive(Default)]
pub struct MemoryContactStore {
    contacts: RwLock<HashMap<NodeId, Contact>>,
    saves: AtomicUsize,
}

impl MemoryContactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, contact: Contact) {
        self.contacts.write().insert(contact.node_id, contact);
    }

    /// Number of completed saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContactDirectory for MemoryContactStore {
    async fn find_by_id(&self, node_id: &NodeId) -> Result<Option<Contact>, StoreError> {
        Ok(self.contacts.read().get(node_id).cloned())
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn save(&self, contact: Contact) -> Result<(), StoreError> {
        self.contacts.write().insert(contact.node_id, contact);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory [`MirrorStore`].
#[derive(Default)]
pub struct MemoryMirrorStore {
    mirrors: RwLock<HashMap<ShardHash, Vec<Mirror>>>,
}

impl MemoryMirrorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, mirror: Mirror) {
        self.mirrors
            .write()
            .entry(mirror.shard_hash)
            .or_default()
            .push(mirror);
    }
}

#[async_trait]
impl MirrorStore for MemoryMirrorStore {
    async fn find_by_shard_hash(&self, shard_hash: &ShardHash) -> Result<Vec<Mirror>, StoreError> {
        Ok(self
            .mirrors
            .read()
            .get(shard_hash)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_established(
        &self,
        shard_hash: &ShardHash,
        node_id: &NodeId,
    ) -> Result<(), StoreError> {
        let mut mirrors = self.mirrors.write();
        let mirror = mirrors
            .get_mut(shard_hash)
            .into_iter()
            .flatten()
            .find(|m| m.contact.as_ref().map(|c| c.node_id) == Some(*node_id))
            .ok_or_else(|| {
                StoreError::Backend(format!("no mirror assigns {shard_hash} to {node_id}"))
            })?;
        mirror.is_established = true;
        Ok(())
    }
}

/// In-memory [`ContractLedger`].
#[derive(Default)]
pub struct MemoryContractLedger {
    sets: RwLock<HashMap<ShardHash, ContractSet>>,
    saves: AtomicUsize,
}

impl MemoryContractLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a contract set, replacing any existing one for the shard.
    pub fn insert(&self, set: ContractSet) {
        self.sets.write().insert(set.shard_hash, set);
    }

    /// Number of completed saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContractLedger for MemoryContractLedger {
    async fn load(&self, shard_hash: &ShardHash) -> Result<ContractSet, LedgerError> {
        Ok(self
            .sets
            .read()
            .get(shard_hash)
            .cloned()
            .unwrap_or_else(|| ContractSet::new(*shard_hash)))
    }

    async fn save(&self, set: ContractSet) -> Result<(), LedgerError> {
        self.sets.write().insert(set.shard_hash, set);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
