use crate::trie::{PathTrie, Verdict};
use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// Thread-safe verdict cache shared across request threads.
///
/// Wraps [`PathTrie`] in a readers-writer lock: lookups take the shared
/// lock and proceed in parallel, while puts, the expiry sweep, and reset
/// are exclusive. Every operation is in-memory and bounded by trie depth,
/// so hold times are short; `expire` walks the whole tree and briefly
/// stalls concurrent lookups, which is acceptable at its low-frequency
/// cadence.
///
/// All operations take an explicit `now` so callers (and tests) control
/// the clock. One instance per deployment, shared by `Arc`.
pub struct VerifyCache {
    trie: RwLock<PathTrie>,
}

impl VerifyCache {
    pub fn new() -> Self {
        Self {
            trie: RwLock::new(PathTrie::new()),
        }
    }

    /// Exact-match lookup under the shared lock. `None` means miss: the key
    /// was never stored, or its entry has expired at `now`.
    pub fn get(&self, key: &str, now: Instant) -> Option<Verdict> {
        self.trie.read().get(key, now)
    }

    /// Record a successful verification, trusted until `now + ttl`.
    pub fn put_positive(&self, key: &str, ttl: Duration, now: Instant) {
        self.trie.write().put(key, Verdict::Positive, ttl, now);
    }

    /// Record a failed verification, trusted until `now + ttl`.
    pub fn put_negative(&self, key: &str, ttl: Duration, now: Instant) {
        self.trie.write().put(key, Verdict::Negative, ttl, now);
    }

    /// Prune every entry expired at `now` and every subtree left vacant.
    /// Stop-the-world with respect to this cache instance.
    pub fn expire(&self, now: Instant) {
        self.trie.write().expire(now);
    }

    /// Discard all entries.
    pub fn reset(&self) {
        self.trie.write().reset();
    }

    /// Entries still live at `now`. Walks the whole tree; reporting only.
    pub fn live_entries(&self, now: Instant) -> usize {
        self.trie.read().live_entries(now)
    }

    #[cfg(test)]
    pub(crate) fn node_count(&self) -> usize {
        self.trie.read().node_count()
    }
}

impl Default for VerifyCache {
    fn default() -> Self {
        Self::new()
    }
}
