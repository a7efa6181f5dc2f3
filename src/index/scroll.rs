//! Server-side scroll cursors.
//!
//! A scroll cursor hands out a large result set in fixed-size batches
//! without re-running the query. Cursor state has a fixed time-to-live,
//! renewed on every fetch; a consumer that stalls longer than the TTL must
//! restart its query. Abandoning a cursor needs no explicit cancel — it
//! simply expires.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::Rng;
use serde_json::Value;

use crate::error::IndexError;

/// One hit as carried through scroll batches: (document key, record, raw score).
pub(crate) type RawHit = (String, Value, Option<f64>);

struct ScrollState {
    remaining: Vec<RawHit>,
    expires_at: Instant,
}

/// Store of live scroll cursors.
pub(crate) struct ScrollStore {
    cursors: DashMap<u64, ScrollState>,
    ttl: Duration,
    batch_size: usize,
}

impl ScrollStore {
    pub(crate) fn new(ttl: Duration, batch_size: usize) -> Self {
        Self {
            cursors: DashMap::new(),
            ttl,
            batch_size,
        }
    }

    /// Open a cursor over a fully-evaluated hit list and return the first
    /// batch together with the cursor handle.
    pub(crate) fn open(&self, mut hits: Vec<RawHit>) -> (u64, Vec<RawHit>) {
        self.evict_expired();
        let first: Vec<RawHit> = hits
            .drain(..hits.len().min(self.batch_size))
            .collect();
        let cursor = rand::thread_rng().r#gen::<u64>();
        self.cursors.insert(
            cursor,
            ScrollState {
                remaining: hits,
                expires_at: Instant::now() + self.ttl,
            },
        );
        (cursor, first)
    }

    /// Fetch the next batch, renewing the cursor's time-to-live.
    ///
    /// An empty batch means the cursor is exhausted and has been dropped.
    pub(crate) fn fetch(&self, cursor: u64) -> Result<Vec<RawHit>, IndexError> {
        let Some(mut state) = self.cursors.get_mut(&cursor) else {
            return Err(IndexError::ScrollExpired { cursor });
        };
        if state.expires_at < Instant::now() {
            drop(state);
            self.cursors.remove(&cursor);
            return Err(IndexError::ScrollExpired { cursor });
        }
        let take = state.remaining.len().min(self.batch_size);
        let batch: Vec<RawHit> = state.remaining.drain(..take).collect();
        state.expires_at = Instant::now() + self.ttl;
        let exhausted = state.remaining.is_empty() && batch.is_empty();
        drop(state);
        if exhausted {
            self.cursors.remove(&cursor);
        }
        Ok(batch)
    }

    /// Number of live cursors.
    pub(crate) fn live(&self) -> usize {
        self.cursors.len()
    }

    fn evict_expired(&self) {
        let now = Instant::now();
        self.cursors.retain(|_, state| state.expires_at >= now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(n: usize) -> RawHit {
        (format!("doc-{n:04}"), Value::Null, None)
    }

    #[test]
    fn batches_cover_all_hits_without_duplicates() {
        let store = ScrollStore::new(Duration::from_secs(60), 3);
        let (cursor, first) = store.open((0..8).map(hit).collect());
        assert_eq!(first.len(), 3);

        let mut seen: Vec<String> = first.into_iter().map(|(k, _, _)| k).collect();
        loop {
            let batch = store.fetch(cursor).unwrap();
            if batch.is_empty() {
                break;
            }
            seen.extend(batch.into_iter().map(|(k, _, _)| k));
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn expired_cursor_is_an_error() {
        let store = ScrollStore::new(Duration::from_millis(0), 3);
        let (cursor, _) = store.open((0..8).map(hit).collect());
        std::thread::sleep(Duration::from_millis(2));
        assert!(matches!(
            store.fetch(cursor),
            Err(IndexError::ScrollExpired { .. })
        ));
        assert_eq!(store.live(), 0);
    }

    #[test]
    fn unknown_cursor_is_an_error() {
        let store = ScrollStore::new(Duration::from_secs(60), 3);
        assert!(matches!(
            store.fetch(42),
            Err(IndexError::ScrollExpired { cursor: 42 })
        ));
    }
}
