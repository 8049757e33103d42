use std::time::Duration;

use crate::cache::ProviderCache;
use crate::defaults::{
    DEFAULT_BATCH_BUFFER_SIZE, DEFAULT_CACHE_SIZE, DEFAULT_CLEANUP_INTERVAL,
    DEFAULT_PROVIDER_ADDR_TTL, DEFAULT_PROVIDE_VALIDITY,
};
use crate::Error;

#[derive(Debug)]
/// Provider manager configurations
pub struct Config {
    /// Time between two garbage collection rounds over the stored records.
    ///
    /// Defaults to [DEFAULT_CLEANUP_INTERVAL]
    pub cleanup_interval: Duration,
    /// How long after its last refresh a provider record is considered expired.
    ///
    /// Defaults to [DEFAULT_PROVIDE_VALIDITY]
    pub provide_validity: Duration,
    /// How long the addresses of an added provider are kept in the address book.
    ///
    /// Defaults to [DEFAULT_PROVIDER_ADDR_TTL]
    pub provider_addr_ttl: Duration,
    /// Number of buffered datastore writes that triggers a flush.
    ///
    /// Defaults to [DEFAULT_BATCH_BUFFER_SIZE]
    pub batch_buffer_size: usize,
    /// Cache of provider sets.
    ///
    /// Defaults to None, where a [crate::cache::LruProviderCache] of
    /// [DEFAULT_CACHE_SIZE] entries will be used.
    pub cache: Option<Box<dyn ProviderCache>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            provide_validity: DEFAULT_PROVIDE_VALIDITY,
            provider_addr_ttl: DEFAULT_PROVIDER_ADDR_TTL,
            batch_buffer_size: DEFAULT_BATCH_BUFFER_SIZE,
            cache: None,
        }
    }
}

impl Config {
    // === Options ===

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn with_provide_validity(mut self, validity: Duration) -> Self {
        self.provide_validity = validity;
        self
    }

    pub fn with_cache(mut self, cache: Box<dyn ProviderCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.cleanup_interval.is_zero() {
            return Err(Error::InvalidConfig("cleanup_interval must be non-zero"));
        }

        Ok(())
    }
}
