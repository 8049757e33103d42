//! Peer address book.
//!
//! Tracks the network addresses known for each peer independently of provider
//! records, with per-address expiration.

use std::{
    collections::HashMap,
    fmt::Debug,
    net::SocketAddr,
    sync::RwLock,
    time::{Duration, Instant},
};

use crate::common::{deadline_after, PeerId, ProviderInfo};

/// Addresses known for peers. Shared by every caller thread, so
/// implementations must be safe for concurrent use.
pub trait AddressBook: Send + Sync + Debug {
    /// Records `addrs` for `peer`, each valid for at least `ttl`.
    fn add_addrs(&self, peer: &PeerId, addrs: &[SocketAddr], ttl: Duration);

    /// Returns the unexpired addresses of `peer`.
    fn addrs(&self, peer: &PeerId) -> Vec<SocketAddr>;

    /// Expands peer ids into [ProviderInfo]s with their current addresses.
    ///
    /// Peers without known addresses are still returned, with none.
    fn provider_infos(&self, peers: &[PeerId]) -> Vec<ProviderInfo> {
        peers
            .iter()
            .map(|peer| ProviderInfo::new(peer.clone(), self.addrs(peer)))
            .collect()
    }
}

#[derive(Debug, Default)]
/// In memory [AddressBook].
pub struct MemoryAddressBook {
    peers: RwLock<HashMap<PeerId, HashMap<SocketAddr, Instant>>>,
}

impl MemoryAddressBook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AddressBook for MemoryAddressBook {
    fn add_addrs(&self, peer: &PeerId, addrs: &[SocketAddr], ttl: Duration) {
        if addrs.is_empty() {
            return;
        }

        let expires_at = deadline_after(ttl);

        let mut peers = match self.peers.write() {
            Ok(peers) => peers,
            Err(poisoned) => poisoned.into_inner(),
        };

        let known = peers.entry(peer.clone()).or_default();
        known.retain(|_, expiry| *expiry > Instant::now());

        for addr in addrs {
            let expiry = known.entry(*addr).or_insert(expires_at);

            // Never shorten an address' lifetime.
            if *expiry < expires_at {
                *expiry = expires_at;
            }
        }
    }

    fn addrs(&self, peer: &PeerId) -> Vec<SocketAddr> {
        let peers = match self.peers.read() {
            Ok(peers) => peers,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();

        let mut addrs: Vec<SocketAddr> = peers
            .get(peer)
            .map(|known| {
                known
                    .iter()
                    .filter(|(_, expiry)| **expiry > now)
                    .map(|(addr, _)| *addr)
                    .collect()
            })
            .unwrap_or_default();

        addrs.sort();
        addrs
    }
}
