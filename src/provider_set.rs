//! Providers of a single content key.

use std::collections::HashMap;
use std::time::SystemTime;

use crate::common::PeerId;

#[derive(Debug, Clone, Default)]
/// The providers known for one content key, and when each was last seen.
///
/// Holds at most one entry per peer. The number of peers per key is not
/// capped; records only leave through expiration.
pub struct ProviderSet {
    /// Peers in the order they were first added.
    providers: Vec<PeerId>,
    last_seen: HashMap<PeerId, SystemTime>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `peer`, or overwrites its last seen time if already present.
    pub fn set_val(&mut self, peer: PeerId, time: SystemTime) {
        if self.last_seen.insert(peer.clone(), time).is_none() {
            self.providers.push(peer);
        }
    }

    /// All the providers in this set.
    pub fn providers(&self) -> &[PeerId] {
        &self.providers
    }

    pub fn last_seen(&self, peer: &PeerId) -> Option<SystemTime> {
        self.last_seen.get(peer).copied()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
