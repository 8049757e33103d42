//! Durable key-value storage of provider records.
//!
//! [Datastore] is the seam to whatever ordered key-value backend the node
//! persists to. [Autobatch] buffers writes in front of it, and
//! [MemoryDatastore] is a reference in-memory backend.

mod autobatch;
mod memory;

use std::{fmt::Debug, sync::Arc};

use bytes::Bytes;

pub use autobatch::Autobatch;
pub use memory::MemoryDatastore;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Datastore errors.
pub enum StoreError {
    /// The key is absent. Expected when deleting an already removed record
    /// or reading a key that was never written.
    #[error("datastore: key not found")]
    NotFound,

    /// Any other backend failure.
    #[error("datastore backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A key-value pair returned by a [Datastore::query].
pub struct Entry {
    pub key: String,
    pub value: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A single write, applied as part of a [Datastore::commit].
pub enum BatchOp {
    Put { key: String, value: Bytes },
    Delete { key: String },
}

/// An ordered key-value store that can be shared across threads.
pub trait Datastore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError>;

    /// Returns [StoreError::NotFound] if `key` is absent.
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Streams every entry whose key starts with `prefix`, in key order.
    fn query(&self, prefix: &str) -> Result<QueryResults, StoreError>;

    /// Applies `ops` in order.
    ///
    /// Deleting an absent key is not an error inside a batch.
    fn commit(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        for op in ops {
            match op {
                BatchOp::Put { key, value } => self.put(&key, value)?,
                BatchOp::Delete { key } => match self.delete(&key) {
                    Ok(()) | Err(StoreError::NotFound) => {}
                    Err(error) => return Err(error),
                },
            }
        }

        Ok(())
    }
}

impl<D: Datastore + ?Sized> Datastore for Arc<D> {
    fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }

    fn query(&self, prefix: &str) -> Result<QueryResults, StoreError> {
        (**self).query(prefix)
    }

    fn commit(&self, ops: Vec<BatchOp>) -> Result<(), StoreError> {
        (**self).commit(ops)
    }
}

/// Lazily streamed results of a prefix query.
///
/// Dropping it, or calling [QueryResults::close], stops the query mid-stream.
pub struct QueryResults {
    inner: Box<dyn Iterator<Item = Result<Entry, StoreError>> + Send>,
}

impl QueryResults {
    pub fn new<I>(results: I) -> Self
    where
        I: Iterator<Item = Result<Entry, StoreError>> + Send + 'static,
    {
        Self {
            inner: Box::new(results),
        }
    }

    pub fn close(self) {}
}

impl Iterator for QueryResults {
    type Item = Result<Entry, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl Debug for QueryResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "QueryResults (_)")
    }
}
