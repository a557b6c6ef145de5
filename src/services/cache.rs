//! In-memory fingerprint cache with per-entry expiry.
//!
//! Memoizes expensive remote calls (scores, rewrites) keyed by a content
//! fingerprint. It is an accelerator only: a miss is always safe, and entries
//! older than the TTL are treated as absent and dropped on read.
//!
//! ## Key format
//!
//! `{operation}-{excerpt}-{options}` where `excerpt` is the first
//! [`DEFAULT_EXCERPT_CHARS`] characters of the whitespace-collapsed text and
//! `options` is the JSON encoding of whatever options change the output.
//! Two long texts sharing the same opening characters and options would
//! collide, so callers whose subject is rewritten in place (scores of
//! rewrites, rewrites themselves) put a [`content_digest`] of the full text
//! into `options`.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::text_processor::{collapse_whitespace, excerpt};

/// Entries live for 15 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_EXCERPT_CHARS: usize = 100;

pub const PREFIX_HUMANIZE: &str = "humanize";
pub const PREFIX_DETECT: &str = "detect";
pub const PREFIX_ANALYZE: &str = "analyze";
pub const PREFIX_OPTIMIZE: &str = "optimize";
pub const PREFIX_GENERATE: &str = "generate";
pub const PREFIX_TRANSLATE: &str = "translate";

/// Build a cache key from an operation prefix, the subject text and the options
/// that influence the result.
pub fn fingerprint<O: Serialize + ?Sized>(
    prefix: &str,
    text: &str,
    options: &O,
    excerpt_chars: usize,
) -> String {
    let options = serde_json::to_string(options).unwrap_or_default();
    format!("{}-{}-{}", prefix, excerpt(text, excerpt_chars), options)
}

/// `{chars}:{sha256 prefix}` of the whitespace-collapsed full text.
pub fn content_digest(text: &str) -> String {
    let normalized = collapse_whitespace(text);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let hash = hex::encode(hasher.finalize());
    format!("{}:{}", normalized.chars().count(), &hash[..16])
}

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: Instant,
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

/// Thread-safe TTL map. Cloning shares the underlying storage.
#[derive(Clone)]
pub struct FingerprintCache<T> {
    inner: Arc<CacheInner<T>>,
}

struct CacheInner<T> {
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl<T: Clone> Default for FingerprintCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<T: Clone> FingerprintCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: RwLock::new(HashMap::new()),
                ttl,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                expired: AtomicU64::new(0),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Stored value if present and younger than the TTL.
    pub fn get(&self, key: &str) -> Option<T> {
        {
            let entries = match self.inner.entries.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            match entries.get(key) {
                Some(entry) if entry.timestamp.elapsed() <= self.inner.ttl => {
                    self.inner.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("[CACHE] hit {}", short_key(key));
                    return Some(entry.data.clone());
                }
                Some(_) => {}
                None => {
                    self.inner.misses.fetch_add(1, Ordering::Relaxed);
                    debug!("[CACHE] miss {}", short_key(key));
                    return None;
                }
            }
        }

        // Expired: evict, re-checking in case a writer refreshed it meanwhile.
        let mut entries = match self.inner.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(entry) = entries.get(key) {
            if entry.timestamp.elapsed() <= self.inner.ttl {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.data.clone());
            }
            entries.remove(key);
        }
        self.inner.expired.fetch_add(1, Ordering::Relaxed);
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        debug!("[CACHE] expired {}", short_key(key));
        None
    }

    /// Store a value stamped with the current time, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: T) {
        let mut entries = match self.inner.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(
            key.into(),
            CacheEntry {
                data: value,
                timestamp: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &str) {
        let mut entries = match self.inner.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(key);
    }

    pub fn clear(&self) {
        let mut entries = match self.inner.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.clear();
    }

    /// Physically stored entries, stale ones included.
    pub fn len(&self) -> usize {
        match self.inner.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            expired: self.inner.expired.load(Ordering::Relaxed),
        }
    }
}

fn short_key(key: &str) -> String {
    key.chars().take(48).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic_and_normalized() {
        let a = fingerprint(PREFIX_DETECT, "Hello   world\n", &(), 100);
        let b = fingerprint(PREFIX_DETECT, " Hello world", &(), 100);
        assert_eq!(a, b);
        assert!(a.starts_with("detect-Hello world-"));
    }

    #[test]
    fn test_fingerprint_separates_options_and_prefixes() {
        let a = fingerprint(PREFIX_HUMANIZE, "text", &("standard", 95), 100);
        let b = fingerprint(PREFIX_HUMANIZE, "text", &("ultra", 95), 100);
        let c = fingerprint(PREFIX_OPTIMIZE, "text", &("standard", 95), 100);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_shares_prefix_beyond_excerpt() {
        let base = "x".repeat(120);
        let a = fingerprint(PREFIX_DETECT, &format!("{}A", base), &(), 100);
        let b = fingerprint(PREFIX_DETECT, &format!("{}B", base), &(), 100);
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_digest_separates_shared_openings() {
        let base = "x".repeat(120);
        let a = content_digest(&format!("{} tail one", base));
        let b = content_digest(&format!("{} tail two", base));
        assert_ne!(a, b);
        assert_eq!(content_digest("a  b\n c"), content_digest("a b c"));
        assert!(content_digest("abc").starts_with("3:"));
    }

    #[test]
    fn test_set_get_remove_clear() {
        let cache: FingerprintCache<i32> = FingerprintCache::default();
        assert_eq!(cache.get("k"), None);
        cache.set("k", 1);
        cache.set("k", 2);
        assert_eq!(cache.get("k"), Some(2));
        cache.remove("k");
        assert_eq!(cache.get("k"), None);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache: FingerprintCache<String> = FingerprintCache::new(Duration::from_secs(60));
        cache.set("k", "v".to_string());
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_clones_share_storage() {
        let cache: FingerprintCache<u8> = FingerprintCache::default();
        let other = cache.clone();
        other.set("shared", 7);
        assert_eq!(cache.get("shared"), Some(7));
    }
}
