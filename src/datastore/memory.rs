//! In-memory ordered [Datastore].

use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use bytes::Bytes;

use super::{Datastore, Entry, QueryResults, StoreError};

#[derive(Debug, Default)]
/// A [Datastore] backed by a [BTreeMap].
///
/// Queries iterate over a snapshot taken when the query starts, so writes
/// made while a query is streaming are not observed by it.
pub struct MemoryDatastore {
    entries: RwLock<BTreeMap<String, Bytes>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|entries| entries.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether `key` is stored.
    pub fn contains(&self, key: &str) -> bool {
        self.read()
            .map(|entries| entries.contains_key(key))
            .unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Bytes>>, StoreError> {
        self.entries
            .read()
            .map_err(|_| StoreError::Backend("memory datastore lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Bytes>>, StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::Backend("memory datastore lock poisoned".to_string()))
    }
}

impl Datastore for MemoryDatastore {
    fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        self.read()?.get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.write()?.insert(key.to_string(), value);

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.write()?
            .remove(key)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    fn query(&self, prefix: &str) -> Result<QueryResults, StoreError> {
        let snapshot: Vec<Entry> = self
            .read()?
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| Entry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();

        Ok(QueryResults::new(snapshot.into_iter().map(Ok)))
    }
}
