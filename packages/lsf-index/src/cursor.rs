//! Independent cursors over one message type.
//!
//! A cursor holds a shared handle on the index and its own position, so any
//! number of consumers can walk the same log concurrently. Decoded messages
//! may be kept in a small per-cursor LRU cache; the index itself is never
//! touched.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::error::Result;
use crate::index::LogIndex;
use crate::message::LogMessage;
use crate::wire::header::ANY_ENTITY;

pub struct LogCursor {
    index: Arc<LogIndex>,
    type_id: u16,
    entity: u8,
    records: Arc<[u32]>,
    /// Position in `records` of the next record to return.
    next: usize,
    cache: Option<LruCache<u32, LogMessage>>,
}

impl LogCursor {
    /// Cursor over every record of `type_id`.
    pub fn open(index: Arc<LogIndex>, type_id: u16) -> Self {
        Self::open_entity(index, type_id, ANY_ENTITY)
    }

    /// Cursor over the records of `type_id` sent by `entity`.
    pub fn open_entity(index: Arc<LogIndex>, type_id: u16, entity: u8) -> Self {
        let records = index
            .records_of(type_id, entity)
            .unwrap_or_else(|| Arc::from(Vec::new()));
        Self {
            index,
            type_id,
            entity,
            records,
            next: 0,
            cache: None,
        }
    }

    /// Keep up to `capacity` decoded messages. 0 disables the cache.
    pub fn with_cache(mut self, capacity: usize) -> Self {
        self.cache = NonZeroUsize::new(capacity).map(LruCache::new);
        self
    }

    pub fn type_id(&self) -> u16 {
        self.type_id
    }

    pub fn entity(&self) -> u8 {
        self.entity
    }

    pub fn index(&self) -> &Arc<LogIndex> {
        &self.index
    }

    /// Records this cursor walks over.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records not yet returned.
    pub fn remaining(&self) -> usize {
        self.records.len() - self.next
    }

    /// Number of records returned since the start (or since the last seek).
    pub fn position(&self) -> usize {
        self.next
    }

    /// Record index of the message returned last.
    pub fn current_record_index(&self) -> Option<usize> {
        self.next
            .checked_sub(1)
            .map(|pos| self.records[pos] as usize)
    }

    /// Record index of the message `next_message` would return.
    pub fn peek_record_index(&self) -> Option<usize> {
        self.records.get(self.next).map(|&r| r as usize)
    }

    /// Timestamp of the next message, read from the index without decoding.
    pub fn peek_time(&self) -> Option<f64> {
        self.peek_record_index()
            .and_then(|r| self.index.time_of(r))
    }

    /// Decode and return the next message.
    pub fn next_message(&mut self) -> Option<Result<LogMessage>> {
        let record = *self.records.get(self.next)?;
        self.next += 1;
        Some(self.load(record))
    }

    /// Step back one record and return it. `None` at the first record.
    pub fn previous_message(&mut self) -> Option<Result<LogMessage>> {
        if self.next < 2 {
            return None;
        }
        self.next -= 1;
        let record = self.records[self.next - 1];
        Some(self.load(record))
    }

    /// The message returned last, decoded again (or from the cache).
    pub fn current(&mut self) -> Option<Result<LogMessage>> {
        let pos = self.next.checked_sub(1)?;
        let record = self.records[pos];
        Some(self.load(record))
    }

    /// Skip up to `n` records without decoding them. Returns how many were
    /// skipped.
    pub fn advance(&mut self, n: usize) -> usize {
        let step = n.min(self.remaining());
        self.next += step;
        step
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }

    /// Position the cursor so that the next message is the first with
    /// timestamp `>= t`. Returns that record index, or `None` (cursor
    /// exhausted) when there is none.
    pub fn seek_to_time(&mut self, t: f64) -> Option<usize> {
        let hint = self
            .current_record_index()
            .filter(|&r| self.index.time_of(r).is_some_and(|ts| ts < t))
            .unwrap_or(0);

        match self
            .index
            .nearest_at_or_after(self.type_id, self.entity, hint, t)
        {
            Some(record) => {
                self.next = self.records.partition_point(|&r| (r as usize) < record);
                Some(record)
            }
            None => {
                self.next = self.records.len();
                None
            }
        }
    }

    fn load(&mut self, record: u32) -> Result<LogMessage> {
        if let Some(cache) = self.cache.as_mut() {
            if let Some(msg) = cache.get(&record) {
                return Ok(msg.clone());
            }
        }
        let msg = self.index.message_at(record as usize)?;
        if let Some(cache) = self.cache.as_mut() {
            cache.put(record, msg.clone());
        }
        Ok(msg)
    }
}

impl Iterator for LogCursor {
    type Item = Result<LogMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl std::fmt::Debug for LogCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCursor")
            .field("type_id", &self.type_id)
            .field("entity", &self.entity)
            .field("position", &self.next)
            .field("len", &self.records.len())
            .finish()
    }
}
