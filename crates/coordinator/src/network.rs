//! Network transport collaborator contract.
//!
//! The transport performs retrieval-pointer negotiation and shard
//! replication between peers. Its wire protocol is outside this core; the
//! orchestrator only needs these two operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use meshstore_common::{Contact, Contract, NodeId};

/// Transport-level failure. The message is preserved verbatim for the
/// caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("{0}")]
    Transport(String),
}

/// Transport-layer credential enabling a peer to pull a shard from the
/// source peer it was negotiated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalPointer {
    /// The peer the shard can be pulled from.
    pub source: NodeId,

    /// Opaque retrieval credential issued by the source peer.
    pub token: String,
}

/// Low-level peer-to-peer transport.
#[async_trait]
pub trait NetworkTransport: Send + Sync {
    /// Negotiates a retrieval pointer for the shard covered by `contract`
    /// with the `source` peer.
    async fn get_retrieval_pointer(
        &self,
        source: &Contact,
        contract: &Contract,
    ) -> Result<RetrievalPointer, NetworkError>;

    /// Asks each of `targets` to pull the shard through `pointer`.
    async fn request_replication(
        &self,
        pointer: &RetrievalPointer,
        targets: &[Contact],
    ) -> Result<(), NetworkError>;
}
