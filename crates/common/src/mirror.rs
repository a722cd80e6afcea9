//! Mirror candidates and per-shard contract sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::contact::Contact;
use crate::ids::{NodeId, ShardHash};

/// A storage agreement for one (shard, node) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    /// Hash of the shard the agreement covers.
    pub data_hash: ShardHash,

    /// Unix timestamp (ms) the storage period begins.
    pub store_begin: i64,

    /// Unix timestamp (ms) the storage period ends.
    pub store_end: i64,
}

/// A candidate or established replica assignment of a shard to a peer.
///
/// `contact: None` is a dangling mirror: the linked peer could not be
/// resolved from the directory. Dangling mirrors are never candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mirror {
    pub shard_hash: ShardHash,
    pub contact: Option<Contact>,
    pub contract: Contract,
    pub is_established: bool,
}

/// The set of storage agreements for one shard, keyed by node id.
///
/// Source of truth for how many nodes currently hold or are committed to
/// hold the shard. `BTreeMap` keeps iteration order deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSet {
    pub shard_hash: ShardHash,
    contracts: BTreeMap<NodeId, Contract>,
}

impl ContractSet {
    /// An empty set for `shard_hash`.
    #[must_use]
    pub fn new(shard_hash: ShardHash) -> Self {
        ContractSet {
            shard_hash,
            contracts: BTreeMap::new(),
        }
    }

    /// Number of nodes holding or committed to hold the shard.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Whether `node_id` already holds a contract for this shard.
    #[must_use]
    pub fn holds(&self, node_id: &NodeId) -> bool {
        self.contracts.contains_key(node_id)
    }

    /// Adds a contract for `node_id`. Returns `false` (and leaves the set
    /// unchanged) if the node already holds one: a node never gains a
    /// second concurrent contract for the same shard.
    pub fn add(&mut self, node_id: NodeId, contract: Contract) -> bool {
        use std::collections::btree_map::Entry;
        match self.contracts.entry(node_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(contract);
                true
            }
        }
    }

    /// Node ids currently in the set, in deterministic order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.contracts.keys()
    }
}
