//! Session store access.
//!
//! The validator talks to the store through the [`SessionStore`] trait, which
//! exposes one step of a cursor-based key scan plus a single-key fetch. The
//! lazy, non-restartable key sequence built on top of it lives in
//! [`KeyScan`]. Every store call made on behalf of a request goes through a
//! [`RequestScope`], which bounds it by the request deadline and aborts it on
//! cancellation.
//!
//! - [`RedisSessionStore`]: production backend (`SCAN` / `GET`).
//! - [`MemorySessionStore`]: in-process backend for tests and embedding.

mod memory;
mod redis_store;
mod scope;

pub use self::memory::{MemorySessionStore, glob_match};
pub use self::redis_store::RedisSessionStore;
pub use self::scope::RequestScope;

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{SessionToken, StoreKey};

/// Cursor value that starts a scan, and that the store returns when it is done.
pub const SCAN_START: u64 = 0;

/// One step of a cursor-based scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next step; [`SCAN_START`] means the scan is complete.
    pub next_cursor: u64,
    /// Keys matching the pattern in this step. May be empty even when the
    /// scan is not complete, and may repeat keys seen in earlier steps.
    pub keys: Vec<StoreKey>,
}

/// Read-only view of the store holding mirrored session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short backend name for logs (e.g. "redis").
    fn name(&self) -> &str;

    /// Run one scan step over keys matching a glob `pattern`.
    async fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        count: Option<usize>,
    ) -> Result<ScanPage, StoreError>;

    /// Fetch the value of `key`; `None` if the key no longer exists.
    async fn get(&self, key: &StoreKey) -> Result<Option<SessionToken>, StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Lazy sequence of keys matching a pattern.
///
/// Pages are requested one at a time as keys are consumed, so dropping the
/// scan early stops all further store traffic. Once the sequence is exhausted
/// or has failed it stays finished; a new scan must be created to start over.
pub struct KeyScan<'a> {
    store: &'a dyn SessionStore,
    scope: &'a RequestScope,
    pattern: &'a str,
    count: Option<usize>,
    cursor: u64,
    buffer: VecDeque<StoreKey>,
    pages: usize,
    finished: bool,
}

impl<'a> KeyScan<'a> {
    pub fn new(
        store: &'a dyn SessionStore,
        scope: &'a RequestScope,
        pattern: &'a str,
        count: Option<usize>,
    ) -> Self {
        Self {
            store,
            scope,
            pattern,
            count,
            cursor: SCAN_START,
            buffer: VecDeque::new(),
            pages: 0,
            finished: false,
        }
    }

    /// Next matching key, fetching another page from the store when needed.
    pub async fn next_key(&mut self) -> Result<Option<StoreKey>, StoreError> {
        loop {
            if let Some(key) = self.buffer.pop_front() {
                return Ok(Some(key));
            }
            if self.finished {
                return Ok(None);
            }

            let page = self
                .scope
                .run(self.store.scan_page(self.cursor, self.pattern, self.count))
                .await
                .inspect_err(|_| self.finished = true)?;

            self.pages += 1;
            self.cursor = page.next_cursor;
            self.finished = page.next_cursor == SCAN_START;
            self.buffer.extend(page.keys);
        }
    }

    /// Number of scan steps issued so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn is_finished(&self) -> bool {
        self.finished && self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn scope() -> RequestScope {
        RequestScope::new(Duration::from_secs(5), CancellationToken::new())
    }

    async fn collect(scan: &mut KeyScan<'_>) -> Vec<String> {
        let mut keys = Vec::new();
        while let Some(key) = scan.next_key().await.unwrap() {
            keys.push(key.into_inner());
        }
        keys
    }

    #[tokio::test]
    async fn test_key_scan_walks_all_pages() {
        let store = MemorySessionStore::from_records([
            ("wp-cookie-1", "a"),
            ("other-1", "x"),
            ("wp-cookie-2", "b"),
            ("wp-cookie-3", "c"),
            ("other-2", "y"),
        ])
        .with_page_size(2);
        let scope = scope();

        let mut scan = KeyScan::new(&store, &scope, "wp-cookie-*", None);
        let keys = collect(&mut scan).await;

        assert_eq!(keys, vec!["wp-cookie-1", "wp-cookie-2", "wp-cookie-3"]);
        assert_eq!(scan.pages(), 3);
        assert!(scan.is_finished());
    }

    #[tokio::test]
    async fn test_key_scan_stays_finished() {
        let store = MemorySessionStore::from_records([("wp-cookie-1", "a")]);
        let scope = scope();

        let mut scan = KeyScan::new(&store, &scope, "wp-cookie-*", None);
        assert_eq!(collect(&mut scan).await, vec!["wp-cookie-1"]);
        let pages = scan.pages();

        assert!(scan.next_key().await.unwrap().is_none());
        assert!(scan.next_key().await.unwrap().is_none());
        assert_eq!(scan.pages(), pages);
    }

    #[tokio::test]
    async fn test_key_scan_empty_store() {
        let store = MemorySessionStore::new();
        let scope = scope();

        let mut scan = KeyScan::new(&store, &scope, "wp-cookie-*", None);
        assert!(scan.next_key().await.unwrap().is_none());
        assert_eq!(scan.pages(), 1);
    }

    #[tokio::test]
    async fn test_key_scan_is_lazy() {
        let store = MemorySessionStore::from_records([
            ("wp-cookie-1", "a"),
            ("wp-cookie-2", "b"),
            ("wp-cookie-3", "c"),
        ])
        .with_page_size(1);
        let scope = scope();

        let mut scan = KeyScan::new(&store, &scope, "wp-cookie-*", None);
        assert_eq!(scan.pages(), 0);
        let first = scan.next_key().await.unwrap().unwrap();
        assert_eq!(first.as_str(), "wp-cookie-1");
        assert_eq!(scan.pages(), 1);
        assert!(!scan.is_finished());
    }

    #[tokio::test]
    async fn test_key_scan_cancelled() {
        let store = MemorySessionStore::from_records([("wp-cookie-1", "a")]);
        let cancel = CancellationToken::new();
        let scope = RequestScope::new(Duration::from_secs(5), cancel.clone());
        cancel.cancel();

        let mut scan = KeyScan::new(&store, &scope, "wp-cookie-*", None);
        let err = scan.next_key().await.unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
        assert!(scan.is_finished());
        assert!(scan.next_key().await.unwrap().is_none());
    }
}
