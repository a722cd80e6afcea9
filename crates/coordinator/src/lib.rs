//! # Meshstore Coordinator Crate
//!
//! Reconciliation and self-healing core of the meshstore coordination
//! service. Storage nodes ("farmers") and clients independently report the
//! outcome of shard-transfer exchanges; this crate merges the two reports
//! into one authoritative transfer record, converts outcomes into
//! peer-reputation adjustments, and drives the automated mirroring
//! protocol when an outcome indicates a shard is under-replicated.
//!
//! ## Architecture Overview
//!
//! ```text
//! SubmitReport
//!      │
//!      ▼
//! ReconciliationEngine ──▶ TransferRecordStore (conditional merge)
//!      │
//!      │ side effects (detached, via channel)
//!      ▼
//! EffectWorker
//!      ├──▶ ReputationScorer ──▶ ContactStore
//!      └──▶ MirrorOrchestrator
//!               ├──▶ ContractLedger
//!               ├──▶ MirrorStore / ContactDirectory
//!               ├──▶ NetworkTransport
//!               └──▶ AuditSink
//! ```
//!
//! Persistence, peer directory, network transport, and the audit sink are
//! abstract collaborators; `memory` provides hash-map-backed
//! implementations for tests and in-process deployments.

pub mod audit;
pub mod config;
pub mod effects;
pub mod memory;
pub mod mirror;
pub mod network;
pub mod reconciliation;
pub mod reputation;
pub mod stores;

pub use audit::{AuditEvent, AuditKind, AuditSink, LogAuditSink, MemoryAuditSink};
pub use config::{ConfigError, CoordinatorConfig, DEFAULT_REPLICATION_FACTOR};
pub use effects::{effect_channel, EffectWorker, SideEffect};
pub use memory::{
    MemoryContactStore, MemoryContractLedger, MemoryMirrorStore, MemoryTransferStore,
};
pub use mirror::{MirrorError, MirrorOrchestrator};
pub use network::{NetworkError, NetworkTransport, RetrievalPointer};
pub use reconciliation::{
    ReconciliationEngine, ReportAck, ReportError, ReporterIdentity, SubmitReport,
};
pub use reputation::{ReputationScorer, REPUTATION_POINTS};
pub use stores::{
    ContactDirectory, ContactStore, ContractLedger, LedgerError, MergeOutcome, MirrorStore,
    StoreError, TransferRecordStore,
};
