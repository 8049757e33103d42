//! Write buffering in front of a [Datastore].

use std::collections::BTreeMap;

use bytes::Bytes;
use tracing::trace;

use super::{BatchOp, Datastore, QueryResults, StoreError};

#[derive(Debug, Clone)]
enum Op {
    Put(Bytes),
    Delete,
}

#[derive(Debug)]
/// Buffers puts and deletes, committing them to the wrapped [Datastore] as
/// one batch once `max_buffer_entries` keys are pending, or on [Autobatch::flush].
///
/// Buffered writes are lost unless flushed before this adapter is dropped.
pub struct Autobatch {
    child: Box<dyn Datastore>,
    buffer: BTreeMap<String, Op>,
    max_buffer_entries: usize,
}

impl Autobatch {
    pub fn new(child: Box<dyn Datastore>, max_buffer_entries: usize) -> Self {
        Self {
            child,
            buffer: BTreeMap::new(),
            max_buffer_entries,
        }
    }

    /// Number of keys with a pending write.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Reads `key`, observing buffered writes first.
    pub fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        match self.buffer.get(key) {
            Some(Op::Put(value)) => Ok(value.clone()),
            Some(Op::Delete) => Err(StoreError::NotFound),
            None => self.child.get(key),
        }
    }

    pub fn put(&mut self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.buffer.insert(key.to_string(), Op::Put(value));

        self.flush_if_full()
    }

    pub fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.buffer.insert(key.to_string(), Op::Delete);

        self.flush_if_full()
    }

    /// Flushes pending writes, then queries the wrapped datastore.
    pub fn query(&mut self, prefix: &str) -> Result<QueryResults, StoreError> {
        self.flush()?;

        self.child.query(prefix)
    }

    /// Commits every pending write to the wrapped datastore.
    ///
    /// The buffer is emptied even if the commit fails.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let buffer = std::mem::take(&mut self.buffer);

        trace!(ops = buffer.len(), "Flushing buffered datastore writes");

        let ops = buffer
            .into_iter()
            .map(|(key, op)| match op {
                Op::Put(value) => BatchOp::Put { key, value },
                Op::Delete => BatchOp::Delete { key },
            })
            .collect();

        self.child.commit(ops)
    }

    fn flush_if_full(&mut self) -> Result<(), StoreError> {
        if self.buffer.len() >= self.max_buffer_entries {
            return self.flush();
        }

        Ok(())
    }
}
