//! Peer contact records and their reputation signals.

use serde::{Deserialize, Serialize};

use crate::ids::NodeId;

/// Lower clamp of the running reputation score.
pub const REPUTATION_MIN: i64 = 0;

/// Upper clamp of the running reputation score.
pub const REPUTATION_MAX: i64 = 5000;

/// A known network peer.
///
/// `timeout_rate` and `response_time` are observed signals that may simply
/// never have been measured for a peer; absence is meaningful to the
/// ranking comparators (absent timeout rate ranks best, absent response
/// time ranks worst) and is therefore an explicit `Option`, not a sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Stable identifier derived from the peer's identity key.
    pub node_id: NodeId,

    /// Network address, host only.
    pub address: String,

    /// Listening port.
    pub port: u16,

    /// Protocol version string the peer advertised.
    pub protocol: String,

    /// Unix timestamp (ms) the peer was last seen.
    pub last_seen: i64,

    /// Cumulative reputation points, clamped to
    /// `[REPUTATION_MIN, REPUTATION_MAX]`.
    #[serde(default)]
    pub reputation: i64,

    /// Observed fraction of requests that timed out, if measured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_rate: Option<f64>,

    /// Observed response time in milliseconds, if measured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
}

impl Contact {
    /// Applies a reputation point delta, clamping the running score into
    /// `[REPUTATION_MIN, REPUTATION_MAX]`.
    pub fn record_points(&mut self, delta: i64) {
        self.reputation = self
            .reputation
            .saturating_add(delta)
            .clamp(REPUTATION_MIN, REPUTATION_MAX);
    }
}
