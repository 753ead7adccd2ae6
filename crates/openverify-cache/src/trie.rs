use crate::arena::{Arena, ROOT};
use std::time::{Duration, Instant};

/// Cached outcome of a verification probe: the target either served the
/// resource (`Positive`) or failed to (`Negative`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Positive,
    Negative,
}

/// A verdict plus the absolute instant at which it stops being trusted.
///
/// An entry whose expiry has been reached is logically absent, whether or
/// not a sweep has physically removed it yet.
#[derive(Clone, Copy, Debug)]
pub struct Entry {
    pub verdict: Verdict,
    pub expiry: Instant,
}

impl Entry {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expiry
    }
}

/// Path-segment trie mapping slash-delimited keys to TTL-scoped verdicts.
///
/// Every operation splits the key with the same rule: split on `/`, collapse
/// runs of separators, drop empty leading/trailing segments. `/a//b` and
/// `/a/b` therefore address the identical node, and a key with no segments
/// at all addresses the root node's own entry.
///
/// There is no prefix matching in either direction: a lookup returns only
/// the entry stored at the exact terminal node.
///
/// Not synchronized — [`crate::cache::VerifyCache`] wraps this in a
/// readers-writer lock.
pub struct PathTrie {
    arena: Arena,
}

impl PathTrie {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
        }
    }

    /// Canonical segmentation shared by lookups and inserts. Divergence here
    /// would cause silent lookup misses, so there is exactly one splitter.
    fn split_segments(key: &str) -> impl Iterator<Item = &str> {
        key.split('/').filter(|s| !s.is_empty())
    }

    /// Walk the trie without creating nodes. `None` if any segment is absent.
    fn traverse<'a>(&self, segments: impl Iterator<Item = &'a str>) -> Option<u32> {
        let mut index = ROOT;
        for seg in segments {
            index = *self.arena.get(index)?.children.get(seg)?;
        }
        Some(index)
    }

    /// Walk the trie, creating missing intermediate nodes.
    fn traverse_create<'a>(&mut self, segments: impl Iterator<Item = &'a str>) -> u32 {
        let mut index = ROOT;
        for seg in segments {
            let existing = self
                .arena
                .get(index)
                .and_then(|n| n.children.get(seg))
                .copied();
            index = match existing {
                Some(child) => child,
                None => {
                    let child = self.arena.alloc();
                    if let Some(node) = self.arena.get_mut(index) {
                        node.children.insert(seg.to_string(), child);
                    }
                    child
                }
            };
        }
        index
    }

    /// Exact-match lookup. `None` on a missing node, a missing entry, or an
    /// entry whose expiry has been reached at `now`. Never mutates; expired
    /// entries are left for `expire` to collect.
    pub fn get(&self, key: &str, now: Instant) -> Option<Verdict> {
        let index = self.traverse(Self::split_segments(key))?;
        let entry = self.arena.get(index)?.entry?;
        if entry.is_expired(now) {
            return None;
        }
        Some(entry.verdict)
    }

    /// Store `verdict` at `key`, expiring at `now + ttl`. Overwrites any
    /// existing entry at the terminal node; last write wins.
    pub fn put(&mut self, key: &str, verdict: Verdict, ttl: Duration, now: Instant) {
        let index = self.traverse_create(Self::split_segments(key));
        if let Some(node) = self.arena.get_mut(index) {
            node.entry = Some(Entry {
                verdict,
                expiry: now + ttl,
            });
        }
    }

    /// Full-tree post-order sweep: drop entries expired at `now`, then prune
    /// every subtree left with no entry and no children. The root is cleared
    /// but never removed.
    pub fn expire(&mut self, now: Instant) {
        self.expire_node(ROOT, now);
    }

    /// Returns true if the subtree rooted at `index` is vacant after the
    /// sweep, i.e. the parent should unlink and free it.
    fn expire_node(&mut self, index: u32, now: Instant) -> bool {
        if let Some(node) = self.arena.get_mut(index) {
            if node.entry.is_some_and(|e| e.is_expired(now)) {
                node.entry = None;
            }
        }

        // Snapshot the child list: the recursion needs &mut access to the
        // arena, so we cannot hold a borrow of this node's map across it.
        let children: Vec<(String, u32)> = match self.arena.get(index) {
            Some(node) => node
                .children
                .iter()
                .map(|(seg, &child)| (seg.clone(), child))
                .collect(),
            None => return true,
        };

        for (seg, child) in children {
            if self.expire_node(child, now) {
                if let Some(node) = self.arena.get_mut(index) {
                    node.children.remove(&seg);
                }
                self.arena.free(child);
            }
        }

        self.arena.get(index).map_or(true, |n| n.is_vacant())
    }

    /// Discard everything. The root survives, emptied.
    pub fn reset(&mut self) {
        self.arena.reset();
    }

    /// Count entries still live at `now`. Full-tree walk; used for
    /// reporting, not on any hot path.
    pub fn live_entries(&self, now: Instant) -> usize {
        self.count_live(ROOT, now)
    }

    fn count_live(&self, index: u32, now: Instant) -> usize {
        let Some(node) = self.arena.get(index) else {
            return 0;
        };
        let own = usize::from(node.entry.is_some_and(|e| !e.is_expired(now)));
        own + node
            .children
            .values()
            .map(|&child| self.count_live(child, now))
            .sum::<usize>()
    }

    /// Number of allocated trie nodes, root included. Exposed for tests.
    #[cfg(test)]
    pub(crate) fn node_count(&self) -> usize {
        self.arena.live_nodes()
    }
}

impl Default for PathTrie {
    fn default() -> Self {
        Self::new()
    }
}
