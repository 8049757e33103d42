//! The provider manager's worker: sole owner of the cache, the write buffer
//! and the garbage collection of expired records.
//!
//! Every iteration of [Actor::run] handles at most one message from the inbox
//! and advances an in-flight garbage collection round by at most one record,
//! so a long sweep is interleaved with ordinary traffic instead of blocking it.

use std::collections::HashSet;
use std::time::{Duration, Instant, SystemTime};

use bytes::Bytes;
use flume::{Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};
use tracing::{debug, error, trace};

use crate::cache::ProviderCache;
use crate::codec::{
    decode_timestamp, encode_timestamp, peer_id_from_record_key, record_key, scan_prefix,
    PROVIDERS_KEY_PREFIX,
};
use crate::common::{deadline_after, PeerId};
use crate::datastore::{Autobatch, QueryResults, StoreError};
use crate::provider_set::ProviderSet;

#[derive(Debug)]
pub(crate) enum ActorMessage {
    AddProvider { key: Bytes, peer: PeerId },
    GetProviders { key: Bytes, sender: Sender<Vec<PeerId>> },
    Shutdown(Sender<()>),
}

#[derive(Debug)]
/// State of an in-flight garbage collection round.
struct GcRound {
    /// Scan over every stored provider record.
    results: QueryResults,
    /// Records written since the round started, which the scan may have
    /// observed with a stale timestamp.
    skip: HashSet<String>,
    started_at: SystemTime,
    removed: usize,
}

#[derive(Debug)]
pub(crate) struct Actor {
    cache: Box<dyn ProviderCache>,
    datastore: Autobatch,
    receiver: Receiver<ActorMessage>,

    cleanup_interval: Duration,
    provide_validity: Duration,

    gc_round: Option<GcRound>,
    /// When the next garbage collection round is due, while none is in flight.
    next_gc: Instant,
}

impl Actor {
    pub fn new(
        cache: Box<dyn ProviderCache>,
        datastore: Autobatch,
        receiver: Receiver<ActorMessage>,
        cleanup_interval: Duration,
        provide_validity: Duration,
    ) -> Self {
        Self {
            cache,
            datastore,
            receiver,
            cleanup_interval,
            provide_validity,
            gc_round: None,
            next_gc: deadline_after(cleanup_interval),
        }
    }

    /// Runs until a [ActorMessage::Shutdown] arrives or every sender is dropped,
    /// then flushes buffered writes.
    pub fn run(mut self) {
        let mut shutdown_ack = None;

        loop {
            match self.next_message() {
                Ok(Some(ActorMessage::Shutdown(sender))) => {
                    shutdown_ack = Some(sender);
                    break;
                }
                Ok(Some(message)) => self.handle_message(message),
                Ok(None) => {}
                Err(RecvError::Disconnected) => {
                    debug!("Provider manager was dropped without being closed");
                    break;
                }
            }

            if self.gc_round.is_some() {
                self.tick_gc_round();
            } else if Instant::now() >= self.next_gc {
                self.start_gc_round();
            }
        }

        self.stop();
        // Disconnect the inbox before acknowledging, later requests fail right away.
        drop(self);

        if let Some(sender) = shutdown_ack {
            let _ = sender.send(());
        }
    }

    // === Private Methods ===

    /// Blocks until a message arrives or the next round is due while idle,
    /// only polls while a round is in flight.
    fn next_message(&self) -> Result<Option<ActorMessage>, RecvError> {
        if self.gc_round.is_some() {
            return match self.receiver.try_recv() {
                Ok(message) => Ok(Some(message)),
                Err(TryRecvError::Empty) => Ok(None),
                Err(TryRecvError::Disconnected) => Err(RecvError::Disconnected),
            };
        }

        match self.receiver.recv_deadline(self.next_gc) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(RecvError::Disconnected),
        }
    }

    fn handle_message(&mut self, message: ActorMessage) {
        match message {
            ActorMessage::AddProvider { key, peer } => self.add_provider(&key, peer),
            ActorMessage::GetProviders { key, sender } => {
                let providers = self.get_providers(key);

                // Buffered, so this never blocks even if the caller gave up.
                let _ = sender.send(providers);
            }
            ActorMessage::Shutdown(_) => {}
        }
    }

    fn add_provider(&mut self, key: &[u8], peer: PeerId) {
        let now = SystemTime::now();

        if let Some(set) = self.cache.get(key) {
            set.set_val(peer.clone(), now);
        }

        // Write through even on a cache hit, the datastore is the source of truth.
        let record_key = record_key(key, &peer);

        if let Err(error) = self
            .datastore
            .put(&record_key, Bytes::from(encode_timestamp(now)))
        {
            error!(?error, ?peer, "Error adding new provider");
            return;
        }

        if let Some(round) = self.gc_round.as_mut() {
            // Tell the in-flight round to skip this record, as it was
            // refreshed after the round started.
            round.skip.insert(record_key);
        }
    }

    fn get_providers(&mut self, key: Bytes) -> Vec<PeerId> {
        if let Some(set) = self.cache.get(&key) {
            return set.providers().to_vec();
        }

        let set = self.load_provider_set(&key);
        let providers = set.providers().to_vec();

        // Never cache a negative result.
        if !set.is_empty() {
            self.cache.add(key, set);
        }

        providers
    }

    /// Builds the provider set of `key` from the datastore, removing expired
    /// and unreadable records along the way.
    fn load_provider_set(&mut self, key: &[u8]) -> ProviderSet {
        let mut set = ProviderSet::new();

        let results = match self.datastore.query(&scan_prefix(key)) {
            Ok(results) => results,
            Err(StoreError::NotFound) => return set,
            Err(error) => {
                error!(?error, "Error reading providers");
                return set;
            }
        };

        let now = SystemTime::now();

        for result in results {
            let entry = match result {
                Ok(entry) => entry,
                Err(error) => {
                    error!(?error, "Error reading providers");
                    continue;
                }
            };

            let time = match decode_timestamp(&entry.value) {
                Ok(time) => time,
                Err(error) => {
                    error!(?error, key = %entry.key, "Parsing provider record from datastore");
                    remove_record(&mut self.datastore, &entry.key);
                    continue;
                }
            };

            if is_expired(now, time, self.provide_validity) {
                remove_record(&mut self.datastore, &entry.key);
                continue;
            }

            match peer_id_from_record_key(&entry.key) {
                Ok(peer) => set.set_val(peer, time),
                Err(error) => {
                    error!(?error, "Decoding provider peer id");
                    remove_record(&mut self.datastore, &entry.key);
                }
            }
        }

        set
    }

    fn start_gc_round(&mut self) {
        // Dropping the cache is much cheaper than invalidating the entries
        // touched by the sweep, it is lazily rebuilt on the next reads.
        self.cache.purge();

        match self.datastore.query(PROVIDERS_KEY_PREFIX) {
            Ok(results) => {
                debug!("Starting provider records garbage collection");

                self.gc_round = Some(GcRound {
                    results,
                    skip: HashSet::new(),
                    started_at: SystemTime::now(),
                    removed: 0,
                });
            }
            Err(error) => {
                error!(?error, "Provider records garbage collection query failed");
                self.next_gc = deadline_after(self.cleanup_interval);
            }
        }
    }

    /// Evaluates the next record of the in-flight round.
    fn tick_gc_round(&mut self) {
        let round = match self.gc_round.as_mut() {
            Some(round) => round,
            None => return,
        };

        let entry = match round.results.next() {
            Some(Ok(entry)) => entry,
            Some(Err(error)) => {
                error!(?error, "Got error from garbage collection query");
                return;
            }
            None => {
                self.finish_gc_round();
                return;
            }
        };

        if round.skip.contains(&entry.key) {
            trace!(key = %entry.key, "Skipping provider record refreshed during garbage collection");
            return;
        }

        let expired = match decode_timestamp(&entry.value) {
            Ok(time) => is_expired(round.started_at, time, self.provide_validity),
            Err(error) => {
                error!(?error, key = %entry.key, "Parsing provider record from datastore");
                true
            }
        };

        if expired {
            round.removed += 1;
            remove_record(&mut self.datastore, &entry.key);
        }
    }

    fn finish_gc_round(&mut self) {
        if let Some(round) = self.gc_round.take() {
            debug!(
                removed = round.removed,
                skipped = round.skip.len(),
                "Finished provider records garbage collection"
            );

            round.results.close();
        }

        self.next_gc = deadline_after(self.cleanup_interval);
    }

    fn stop(&mut self) {
        if let Some(round) = self.gc_round.take() {
            round.results.close();
        }

        if let Err(error) = self.datastore.flush() {
            error!(?error, "Failed to flush datastore");
        }
    }
}

/// Deletes a record, a missing record being already as good as deleted.
fn remove_record(datastore: &mut Autobatch, key: &str) {
    match datastore.delete(key) {
        Ok(()) | Err(StoreError::NotFound) => {}
        Err(error) => {
            error!(?error, key, "Failed to remove provider record from datastore");
        }
    }
}

/// Records last seen in the future are never expired.
fn is_expired(reference: SystemTime, last_seen: SystemTime, validity: Duration) -> bool {
    reference
        .duration_since(last_seen)
        .map(|age| age > validity)
        .unwrap_or(false)
}
