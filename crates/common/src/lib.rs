//! # Meshstore Common Crate
//!
//! Shared domain types for the meshstore coordination service.
//!
//! ## Modules
//! - `ids`: fixed-length peer and shard identifiers
//! - `report`: exchange reports, outcome kinds, and report validation
//! - `transfer`: the authoritative transfer record reconciling both parties
//! - `contact`: peer contact records with reputation signals
//! - `mirror`: mirror candidates and per-shard contract sets
//! - `ranking`: pure comparators for peer-quality ordering

pub mod contact;
pub mod ids;
pub mod mirror;
pub mod ranking;
pub mod report;
pub mod transfer;

pub use contact::{Contact, REPUTATION_MAX, REPUTATION_MIN};
pub use ids::{IdError, NodeId, ShardHash, ID_LEN};
pub use mirror::{Contract, ContractSet, Mirror};
pub use report::{
    validate_exchange_report, ExchangeOutcome, ExchangeReport, RECOGNIZED_RESULT_CODES,
    RESULT_CODE_FAILURE, RESULT_CODE_SUCCESS,
};
pub use transfer::{ReportParty, TransferRecord};
