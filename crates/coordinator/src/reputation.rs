//! Reputation scoring from exchange outcomes.
//!
//! The scorer applies point deltas to tracked peers. It is fire-and-forget
//! relative to its callers: lookup and save failures are logged, never
//! propagated, so a reputation hiccup cannot fail an already-accepted
//! report. The adjustment is at-least-applied, not strictly serializable —
//! concurrent deltas for one peer are as safe as the underlying contact
//! store makes them.

use std::sync::Arc;

use tracing::warn;

use meshstore_common::NodeId;

use crate::stores::ContactStore;

/// Fixed magnitude of a reputation adjustment: success-family outcomes
/// score `+REPUTATION_POINTS`, failure-family outcomes score the negative.
pub const REPUTATION_POINTS: i64 = 10;

/// Applies reputation point deltas to tracked peers.
pub struct ReputationScorer {
    contacts: Arc<dyn ContactStore>,
}

impl ReputationScorer {
    #[must_use]
    pub fn new(contacts: Arc<dyn ContactStore>) -> Self {
        ReputationScorer { contacts }
    }

    /// Applies `delta` points to the peer's tracked reputation record.
    ///
    /// Unknown peers accrue no reputation: if the contact is absent this
    /// is a no-op, the peer is never created here.
    pub async fn adjust(&self, node_id: &NodeId, delta: i64) {
        let mut contact = match self.contacts.find_by_id(node_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => return,
            Err(e) => {
                warn!("reputation lookup failed for {}: {}", node_id, e);
                return;
            }
        };
        contact.record_points(delta);
        if let Err(e) = self.contacts.save(contact).await {
            warn!("reputation save failed for {}: {}", node_id, e);
        }
    }
}
