//! In-memory session store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{SCAN_START, ScanPage, SessionStore};
use crate::types::{SessionToken, StoreKey};

/// Keys examined per scan step when no count hint is given.
const DEFAULT_PAGE_SIZE: usize = 10;

/// Session store backed by an ordered map.
///
/// Scans walk the keys in order, `page_size` keys per step, and report only
/// those matching the pattern, so steps can come back empty just like Redis.
pub struct MemorySessionStore {
    records: RwLock<BTreeMap<String, String>>,
    page_size: usize,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Create a store pre-filled with `(key, value)` records.
    pub fn from_records<I, K, V>(records: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let records = records
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Self {
            records: RwLock::new(records),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Number of keys examined per scan step (at least one).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.records.write().await.insert(key.into(), value.into());
    }

    pub async fn remove(&self, key: &str) -> bool {
        self.records.write().await.remove(key).is_some()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn scan_page(
        &self,
        cursor: u64,
        pattern: &str,
        count: Option<usize>,
    ) -> Result<ScanPage, StoreError> {
        let records = self.records.read().await;
        let step = count.unwrap_or(self.page_size).max(1);
        let start = usize::try_from(cursor)
            .map_err(|_| StoreError::Protocol(format!("invalid scan cursor {}", cursor)))?;

        let keys = records
            .keys()
            .skip(start)
            .take(step)
            .filter(|key| glob_match(pattern, key))
            .map(|key| StoreKey::new(key.as_str()))
            .collect();

        let end = start.saturating_add(step);
        let next_cursor = if end >= records.len() {
            SCAN_START
        } else {
            end as u64
        };

        Ok(ScanPage { next_cursor, keys })
    }

    async fn get(&self, key: &StoreKey) -> Result<Option<SessionToken>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .get(key.as_str())
            .map(|value| SessionToken::new(value.as_str())))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Glob matching with Redis `MATCH` semantics for `*` (any run of characters)
/// and `?` (exactly one character). Every other character matches itself.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen and the text index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, tried)) => {
                    p = star + 1;
                    t = tried + 1;
                    backtrack = Some((star, tried + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
