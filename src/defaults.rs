//! Protocol defaults shared with the rest of the DHT node.

use std::time::Duration;

/// How long a provider record stays valid after it was last refreshed.
///
/// Also known as the Provider Record Expiration Interval.
pub const DEFAULT_PROVIDE_VALIDITY: Duration = Duration::from_secs(48 * 60 * 60);

/// How long the addresses of a provider peer are kept in the address book.
///
/// Those addresses are returned alongside the provider. After they expire,
/// callers need an extra lookup to find the addresses of a returned peer.
pub const DEFAULT_PROVIDER_ADDR_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Time between two garbage collection rounds over the stored records.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Default number of content keys whose provider sets are kept in memory.
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// Default number of buffered datastore writes before an automatic flush.
pub const DEFAULT_BATCH_BUFFER_SIZE: usize = 256;
