//! Process-local backend
//!
//! Used when `CACHE_BACKEND=memory` and by tests. The availability switch lets
//! callers simulate an unreachable cache.

use crate::backend::CacheBackend;
use crate::{CacheError, CacheResult};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    #[inline]
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// DashMap-backed cache with Redis-like TTL semantics
#[derive(Clone)]
pub struct MemoryBackend {
    store: Arc<DashMap<String, MemoryEntry>>,
    available: Arc<AtomicBool>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Simulate the backend going away (`false`) or coming back (`true`).
    /// Data written before an outage survives it, as with a Redis restart
    /// that kept its snapshot.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Number of live entries, ignoring expired ones.
    pub fn len(&self) -> usize {
        self.store.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> CacheResult<()> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(CacheError::Unavailable)
        }
    }

    fn live(&self, key: &str) -> Option<MemoryEntry> {
        let entry = self.store.get(key)?.clone();
        if entry.is_expired() {
            self.store.remove(key);
            None
        } else {
            Some(entry)
        }
    }
}

#[async_trait::async_trait]
impl CacheBackend for MemoryBackend {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        Ok(self.live(key).map(|e| e.value))
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> CacheResult<()> {
        self.check()?;
        self.store.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        self.check()?;
        Ok(self
            .store
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }

    async fn scan_del(&self, pattern: &str) -> CacheResult<usize> {
        self.check()?;
        let matching: Vec<String> = self
            .store
            .iter()
            .filter(|e| !e.is_expired() && glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect();

        let mut deleted = 0;
        for key in matching {
            if self.store.remove(&key).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn incr(&self, key: &str, by: i64) -> CacheResult<i64> {
        self.check()?;
        // The entry guard holds the shard lock for the whole read-modify-write
        let mut entry = self.store.entry(key.to_string()).or_insert_with(|| MemoryEntry {
            value: "0".to_string(),
            expires_at: None,
        });
        if entry.is_expired() {
            entry.value = "0".to_string();
            entry.expires_at = None;
        }

        let current: i64 = entry.value.parse().map_err(|_| {
            CacheError::InvalidData(format!("value at {key} is not an integer"))
        })?;
        let value = current + by;
        entry.value = value.to_string();
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> CacheResult<bool> {
        self.check()?;
        if self.live(key).is_none() {
            return Ok(false);
        }
        if let Some(mut entry) = self.store.get_mut(key) {
            entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
            return Ok(true);
        }
        Ok(false)
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        self.check()?;
        Ok(match self.live(key) {
            None => -2,
            Some(MemoryEntry {
                expires_at: None, ..
            }) => -1,
            Some(MemoryEntry {
                expires_at: Some(at),
                ..
            }) => at.saturating_duration_since(Instant::now()).as_secs() as i64,
        })
    }
}

/// Redis-style glob matching: `*`, `?`, `[abc]`, `[a-z]`, `[^a]` and `\` escapes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    match_from(&p, &t)
}

fn match_from(p: &[char], t: &[char]) -> bool {
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() {
            match p[pi] {
                '*' => {
                    backtrack = Some((pi, ti));
                    pi += 1;
                    continue;
                }
                '?' => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, next)) = match_class(p, pi, t[ti]) {
                        if matched {
                            pi = next;
                            ti += 1;
                            continue;
                        }
                    }
                }
                '\\' if pi + 1 < p.len() => {
                    if p[pi + 1] == t[ti] {
                        pi += 2;
                        ti += 1;
                        continue;
                    }
                }
                c => {
                    if c == t[ti] {
                        pi += 1;
                        ti += 1;
                        continue;
                    }
                }
            }
        }

        match backtrack {
            Some((star_p, star_t)) => {
                pi = star_p + 1;
                ti = star_t + 1;
                backtrack = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}

/// Match `c` against the class starting at `p[start] == '['`.
/// Returns (matched, index after the closing bracket), or None if unterminated.
fn match_class(p: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = i < p.len() && p[i] == '^';
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < p.len() && p[i] != ']' {
        if p[i] == '\\' && i + 1 < p.len() {
            matched |= p[i + 1] == c;
            i += 2;
        } else if i + 2 < p.len() && p[i + 1] == '-' && p[i + 2] != ']' {
            matched |= p[i] <= c && c <= p[i + 2];
            i += 3;
        } else {
            matched |= p[i] == c;
            i += 1;
        }
    }

    if i >= p.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_star_and_question() {
        assert!(glob_match("v1:sources:*:603", "v1:sources:movie:603"));
        assert!(!glob_match("v1:sources:*:603", "v1:sources:movie:6030"));
        assert!(glob_match("v1:resp:/api/v1/users/u?/history*", "v1:resp:/api/v1/users/u1/history?limit=5"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("a*b", "a"));
    }

    #[test]
    fn test_glob_classes_and_escapes() {
        assert!(glob_match("key[0-9]", "key7"));
        assert!(!glob_match("key[^0-9]", "key7"));
        assert!(glob_match("a\\*b", "a*b"));
        assert!(!glob_match("a\\*b", "axxb"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let backend = MemoryBackend::new();
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let backend = backend.clone();
                tokio::spawn(async move {
                    for _ in 0..500 {
                        backend.incr("v1:provider:failures:alpha", 1).await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(backend.get("v1:provider:failures:alpha").await.unwrap().as_deref(), Some("4000"));
    }

    #[tokio::test]
    async fn test_ttl_semantics() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.ttl("missing").await.unwrap(), -2);

        backend.incr("counter", 1).await.unwrap();
        assert_eq!(backend.ttl("counter").await.unwrap(), -1);

        backend.set_ex("k", "v".into(), 60).await.unwrap();
        let ttl = backend.ttl("k").await.unwrap();
        assert!((59..=60).contains(&ttl));
    }

    #[tokio::test]
    async fn test_incr_keeps_expiry_and_rejects_text() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.incr("n", 2).await.unwrap(), 2);
        assert!(backend.expire("n", 30).await.unwrap());
        assert_eq!(backend.incr("n", 3).await.unwrap(), 5);
        assert!(backend.ttl("n").await.unwrap() > 0);

        backend.set_ex("text", "\"abc\"".into(), 30).await.unwrap();
        assert!(matches!(
            backend.incr("text", 1).await,
            Err(CacheError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_entries_are_invisible() {
        let backend = MemoryBackend::new();
        backend.set_ex("gone", "1".into(), 0).await.unwrap();
        assert_eq!(backend.get("gone").await.unwrap(), None);
        assert!(!backend.expire("gone", 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_unavailable_backend_errors() {
        let backend = MemoryBackend::new();
        backend.set_available(false);
        assert!(matches!(backend.get("k").await, Err(CacheError::Unavailable)));
        assert!(matches!(
            backend.set_ex("k", "v".into(), 10).await,
            Err(CacheError::Unavailable)
        ));
    }
}
