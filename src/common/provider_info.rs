//! A provider peer and the addresses it can be reached at.
use std::net::SocketAddr;

use crate::common::PeerId;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A peer announcing itself as a provider, along with its known addresses.
pub struct ProviderInfo {
    pub peer_id: PeerId,
    pub addrs: Vec<SocketAddr>,
}

impl ProviderInfo {
    /// Creates a new ProviderInfo from a peer id and its addresses.
    pub fn new(peer_id: PeerId, addrs: Vec<SocketAddr>) -> ProviderInfo {
        ProviderInfo { peer_id, addrs }
    }
}
