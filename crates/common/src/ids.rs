//! Fixed-length identifiers for peers and shards.
//!
//! Both identifiers are 20-byte hashes rendered as lowercase hex on the
//! wire. A peer id is derived from the peer's identity key; a shard hash
//! identifies the content of one stored shard.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Sha3_256};
use thiserror::Error;

/// Byte length of [`NodeId`] and [`ShardHash`].
pub const ID_LEN: usize = 20;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IdError {
    #[error("invalid id length: expected {expected} bytes, found {found}")]
    InvalidLength { expected: usize, found: usize },

    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}

fn parse_fixed(s: &str) -> Result<[u8; ID_LEN], IdError> {
    let bytes = hex::decode(s)?;
    if bytes.len() != ID_LEN {
        return Err(IdError::InvalidLength {
            expected: ID_LEN,
            found: bytes.len(),
        });
    }
    let mut out = [0u8; ID_LEN];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Stable identifier of a network peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub [u8; ID_LEN]);

impl NodeId {
    /// Derives a node id from an identity key: SHA3-256 truncated to
    /// [`ID_LEN`] bytes.
    #[must_use]
    pub fn from_identity_key(key: &[u8]) -> Self {
        let digest = Sha3_256::digest(key);
        let mut out = [0u8; ID_LEN];
        out.copy_from_slice(&digest[..ID_LEN]);
        NodeId(out)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", hex::encode(self.0))
    }
}

impl FromStr for NodeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(NodeId(parse_fixed(s)?))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Content hash identifying one stored shard.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardHash(pub [u8; ID_LEN]);

impl ShardHash {
    /// Derives a shard hash from raw shard content.
    #[must_use]
    pub fn from_content(data: &[u8]) -> Self {
        let digest = Sha3_256::digest(data);
        let mut out = [0u8; ID_LEN];
        out.copy_from_slice(&digest[..ID_LEN]);
        ShardHash(out)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }
}

impl fmt::Display for ShardHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ShardHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShardHash({})", hex::encode(self.0))
    }
}

impl FromStr for ShardHash {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ShardHash(parse_fixed(s)?))
    }
}

impl Serialize for ShardHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for ShardHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
