//! Provider manager: adds and pulls providers out of the datastore,
//! caching them in between.

mod actor;
mod config;

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use bytes::Bytes;
use flume::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use tracing::debug_span;

use crate::address_book::AddressBook;
use crate::cache::{LruProviderCache, ProviderCache};
use crate::common::{PeerId, ProviderInfo};
use crate::datastore::{Autobatch, Datastore};
use crate::Error;

pub(crate) use actor::ActorMessage;
pub use config::Config;

use actor::Actor;

/// A store that associates peers and their addresses to content keys.
pub trait ProviderStore {
    /// Records `provider` as a provider of `key`.
    fn add_provider(&self, key: &[u8], provider: ProviderInfo) -> Result<(), Error>;

    /// Returns the live providers of `key` with their known addresses.
    fn get_providers(&self, key: &[u8]) -> Result<Vec<ProviderInfo>, Error>;

    /// Stops the store, persisting any buffered writes.
    fn close(&self) -> Result<(), Error>;
}

#[derive(Debug, Clone)]
/// Handle to the provider records of this node.
///
/// All the state lives in a single worker thread that handles one request at
/// a time, and periodically garbage collects expired records. Cloning the
/// handle is cheap, every clone talks to the same worker.
///
/// The worker stops on [ProviderManager::close], or once every handle is dropped.
pub struct ProviderManager {
    local: PeerId,
    address_book: Arc<dyn AddressBook>,
    provider_addr_ttl: Duration,
    pub(crate) sender: Sender<ActorMessage>,
}

impl ProviderManager {
    /// Starts the worker thread and returns immediately.
    ///
    /// `local` is this node's own peer id, whose addresses are never
    /// recorded in the `address_book`.
    pub fn new<D: Datastore + 'static>(
        local: PeerId,
        address_book: Arc<dyn AddressBook>,
        datastore: D,
        config: Config,
    ) -> Result<Self, Error> {
        config.validate()?;

        let cache: Box<dyn ProviderCache> = match config.cache {
            Some(cache) => cache,
            None => Box::new(LruProviderCache::default()),
        };

        // Requests are handed off directly to the worker, so a busy worker
        // throttles its callers.
        let (sender, receiver) = flume::bounded(0);

        let actor = Actor::new(
            cache,
            Autobatch::new(Box::new(datastore), config.batch_buffer_size),
            receiver,
            config.cleanup_interval,
            config.provide_validity,
        );

        // Keep logging to whatever subscriber the caller had when constructing.
        let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());

        thread::Builder::new()
            .name("providers-manager".to_string())
            .spawn(move || tracing::dispatcher::with_default(&dispatch, || actor.run()))?;

        Ok(ProviderManager {
            local,
            address_book,
            provider_addr_ttl: config.provider_addr_ttl,
            sender,
        })
    }

    // === Public Methods ===

    /// Records `provider` as a provider of `key`.
    ///
    /// Blocks until the worker accepts the request, the record itself is
    /// written asynchronously.
    pub fn add_provider(&self, key: &[u8], provider: ProviderInfo) -> Result<(), Error> {
        let _span = debug_span!("add_provider", peer = %provider.peer_id).entered();

        let message = self.add_message(key, provider);

        self.sender.send(message).map_err(|_| Error::Shutdown)
    }

    /// Same as [Self::add_provider] but gives up with [Error::Timeout] if the
    /// worker didn't accept the request before `deadline`.
    ///
    /// The provider's addresses are recorded in the address book even then.
    pub fn add_provider_with_deadline(
        &self,
        key: &[u8],
        provider: ProviderInfo,
        deadline: Instant,
    ) -> Result<(), Error> {
        let _span = debug_span!("add_provider", peer = %provider.peer_id).entered();

        let message = self.add_message(key, provider);

        self.sender
            .send_deadline(message, deadline)
            .map_err(|error| match error {
                SendTimeoutError::Timeout(_) => Error::Timeout,
                SendTimeoutError::Disconnected(_) => Error::Shutdown,
            })
    }

    /// Returns the unexpired providers of `key`, with their addresses
    /// from the address book.
    pub fn get_providers(&self, key: &[u8]) -> Result<Vec<ProviderInfo>, Error> {
        let _span = debug_span!("get_providers").entered();

        let (message, receiver) = get_message(key);

        self.sender.send(message).map_err(|_| Error::Shutdown)?;

        let peers = receiver.recv().map_err(|_| Error::Shutdown)?;

        Ok(self.address_book.provider_infos(&peers))
    }

    /// Same as [Self::get_providers] but gives up with [Error::Timeout] if
    /// the worker didn't respond before `deadline`.
    pub fn get_providers_with_deadline(
        &self,
        key: &[u8],
        deadline: Instant,
    ) -> Result<Vec<ProviderInfo>, Error> {
        let _span = debug_span!("get_providers").entered();

        let (message, receiver) = get_message(key);

        self.sender
            .send_deadline(message, deadline)
            .map_err(|error| match error {
                SendTimeoutError::Timeout(_) => Error::Timeout,
                SendTimeoutError::Disconnected(_) => Error::Shutdown,
            })?;

        let peers = receiver
            .recv_deadline(deadline)
            .map_err(|error| match error {
                RecvTimeoutError::Timeout => Error::Timeout,
                RecvTimeoutError::Disconnected => Error::Shutdown,
            })?;

        Ok(self.address_book.provider_infos(&peers))
    }

    /// Stops the worker and waits until it has flushed buffered writes.
    ///
    /// Returns [Error::Shutdown] if the worker was already stopped.
    pub fn close(&self) -> Result<(), Error> {
        let (sender, receiver) = flume::bounded::<()>(1);

        self.sender
            .send(ActorMessage::Shutdown(sender))
            .map_err(|_| Error::Shutdown)?;

        receiver.recv().map_err(|_| Error::Shutdown)
    }

    // === Private Methods ===

    /// Records the provider's addresses, then builds the worker's request.
    pub(crate) fn add_message(&self, key: &[u8], provider: ProviderInfo) -> ActorMessage {
        // Don't add our own addresses.
        if provider.peer_id != self.local {
            self.address_book.add_addrs(
                &provider.peer_id,
                &provider.addrs,
                self.provider_addr_ttl,
            );
        }

        ActorMessage::AddProvider {
            key: Bytes::copy_from_slice(key),
            peer: provider.peer_id,
        }
    }

    pub(crate) fn address_book(&self) -> &dyn AddressBook {
        self.address_book.as_ref()
    }
}

/// Builds a get request, with a response channel that has room for the one
/// response, so the worker never blocks on a caller that gave up.
pub(crate) fn get_message(key: &[u8]) -> (ActorMessage, Receiver<Vec<PeerId>>) {
    let (sender, receiver) = flume::bounded(1);

    (
        ActorMessage::GetProviders {
            key: Bytes::copy_from_slice(key),
            sender,
        },
        receiver,
    )
}

impl ProviderStore for ProviderManager {
    fn add_provider(&self, key: &[u8], provider: ProviderInfo) -> Result<(), Error> {
        ProviderManager::add_provider(self, key, provider)
    }

    fn get_providers(&self, key: &[u8]) -> Result<Vec<ProviderInfo>, Error> {
        ProviderManager::get_providers(self, key)
    }

    fn close(&self) -> Result<(), Error> {
        ProviderManager::close(self)
    }
}

#[cfg(test)]
mod test {
    use std::net::SocketAddr;

    use super::*;
    use crate::address_book::MemoryAddressBook;
    use crate::datastore::MemoryDatastore;

    fn manager() -> (Arc<MemoryAddressBook>, ProviderManager) {
        let address_book = Arc::new(MemoryAddressBook::new());

        let manager = ProviderManager::new(
            PeerId::random(),
            address_book.clone(),
            MemoryDatastore::new(),
            Config::default(),
        )
        .unwrap();

        (address_book, manager)
    }

    #[test]
    fn shutdown() {
        let (_, manager) = manager();

        let clone = manager.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));

            clone.close().unwrap();
        })
        .join()
        .unwrap();

        assert!(matches!(manager.close(), Err(Error::Shutdown)));
        assert!(matches!(
            manager.get_providers(b"key"),
            Err(Error::Shutdown)
        ));
    }

    #[test]
    fn drop_stops_the_worker() {
        let store = Arc::new(MemoryDatastore::new());

        let manager = ProviderManager::new(
            PeerId::random(),
            Arc::new(MemoryAddressBook::new()),
            store.clone(),
            Config::default(),
        )
        .unwrap();

        let peer = PeerId::random();
        manager
            .add_provider(b"key", ProviderInfo::new(peer.clone(), vec![]))
            .unwrap();

        drop(manager);

        // The worker flushes on its way out.
        let deadline = Instant::now() + Duration::from_secs(5);
        while !store.contains(&crate::codec::record_key(b"key", &peer)) {
            assert!(Instant::now() < deadline, "record was never flushed");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn own_addresses_are_not_recorded() {
        let address_book = Arc::new(MemoryAddressBook::new());
        let local = PeerId::random();

        let manager = ProviderManager::new(
            local.clone(),
            address_book.clone(),
            MemoryDatastore::new(),
            Config::default(),
        )
        .unwrap();

        let addr = SocketAddr::from(([127, 0, 0, 1], 4001));

        manager
            .add_provider(b"key", ProviderInfo::new(local.clone(), vec![addr]))
            .unwrap();

        assert!(address_book.addrs(&local).is_empty());
        assert_eq!(
            manager.get_providers(b"key").unwrap(),
            vec![ProviderInfo::new(local, vec![])]
        );

        manager.close().unwrap();
    }

    #[test]
    fn invalid_config() {
        let result = ProviderManager::new(
            PeerId::random(),
            Arc::new(MemoryAddressBook::new()),
            MemoryDatastore::new(),
            Config::default().with_cleanup_interval(Duration::ZERO),
        );

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn unbounded_intervals() {
        let address_book = Arc::new(MemoryAddressBook::new());

        let manager = ProviderManager::new(
            PeerId::random(),
            address_book.clone(),
            MemoryDatastore::new(),
            Config {
                provider_addr_ttl: Duration::MAX,
                ..Config::default()
                    .with_cleanup_interval(Duration::MAX)
                    .with_provide_validity(Duration::MAX)
            },
        )
        .unwrap();

        let peer = PeerId::random();
        let addr = SocketAddr::from(([127, 0, 0, 1], 4001));

        manager
            .add_provider(b"key", ProviderInfo::new(peer.clone(), vec![addr]))
            .unwrap();

        assert_eq!(address_book.addrs(&peer), vec![addr]);
        assert_eq!(
            manager.get_providers(b"key").unwrap(),
            vec![ProviderInfo::new(peer, vec![addr])]
        );

        manager.close().unwrap();
    }

    /// Holds every query until released.
    #[derive(Debug)]
    struct StallingDatastore {
        inner: MemoryDatastore,
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl Datastore for StallingDatastore {
        fn get(&self, key: &str) -> Result<Bytes, crate::datastore::StoreError> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: Bytes) -> Result<(), crate::datastore::StoreError> {
            self.inner.put(key, value)
        }

        fn delete(&self, key: &str) -> Result<(), crate::datastore::StoreError> {
            self.inner.delete(key)
        }

        fn query(
            &self,
            prefix: &str,
        ) -> Result<crate::datastore::QueryResults, crate::datastore::StoreError> {
            let _ = self.entered.send(());
            let _ = self.release.recv();

            self.inner.query(prefix)
        }
    }

    #[test]
    fn deadline_elapses_while_worker_is_busy() {
        let (entered_sender, entered) = flume::unbounded();
        let (release, release_receiver) = flume::unbounded();

        let manager = ProviderManager::new(
            PeerId::random(),
            Arc::new(MemoryAddressBook::new()),
            StallingDatastore {
                inner: MemoryDatastore::new(),
                entered: entered_sender,
                release: release_receiver,
            },
            Config::default(),
        )
        .unwrap();

        let clone = manager.clone();
        let busy = thread::spawn(move || clone.get_providers(b"key"));

        // The worker is now stuck loading "key".
        entered.recv().unwrap();

        let result = manager.add_provider_with_deadline(
            b"other",
            ProviderInfo::new(PeerId::random(), vec![]),
            Instant::now() + Duration::from_millis(50),
        );
        assert!(matches!(result, Err(Error::Timeout)));

        let result =
            manager.get_providers_with_deadline(b"other", Instant::now() + Duration::from_millis(50));
        assert!(matches!(result, Err(Error::Timeout)));

        release.send(()).unwrap();
        assert!(busy.join().unwrap().unwrap().is_empty());

        // Later requests still go through.
        release.send(()).unwrap();
        assert!(manager
            .get_providers_with_deadline(b"other", Instant::now() + Duration::from_secs(5))
            .unwrap()
            .is_empty());

        manager.close().unwrap();
    }

    #[test]
    fn provider_store_trait_object() {
        let (address_book, manager) = manager();
        let store: Box<dyn ProviderStore> = Box::new(manager);

        let peer = PeerId::random();
        let addr = SocketAddr::from(([10, 0, 0, 7], 4001));

        store
            .add_provider(b"key", ProviderInfo::new(peer.clone(), vec![addr]))
            .unwrap();

        assert_eq!(address_book.addrs(&peer), vec![addr]);
        assert_eq!(
            store.get_providers(b"key").unwrap(),
            vec![ProviderInfo::new(peer, vec![addr])]
        );

        store.close().unwrap();
    }
}
