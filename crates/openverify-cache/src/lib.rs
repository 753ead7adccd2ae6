//! Verification cache for redirect targets.
//!
//! When a storage server redirects a client to another host, the client may
//! want to know whether the target actually serves the resource before
//! following the redirect. That check (open + boundary-byte read) is
//! expensive, so its outcome is memoized here: a path-segment trie keyed by
//! `host[:port]//path` maps each resource to a `Positive` or `Negative`
//! verdict with an absolute expiry instant.
//!
//! - [`key::make_cache_key`] builds the canonical key for a
//!   (path, host, port) triple.
//! - [`trie::PathTrie`] is the unsynchronized trie over an index-based
//!   [`arena::Arena`] of nodes.
//! - [`cache::VerifyCache`] wraps the trie in a readers-writer lock and is
//!   the type shared across request threads.
//! - [`sweeper::ExpirySweeper`] prunes expired entries on a fixed cadence
//!   from a background thread with a blocking, idempotent stop.
//!
//! Eviction is purely TTL-driven; there is no capacity bound and no LRU.
//! Nothing persists across restarts.

pub mod arena;
pub mod cache;
pub mod key;
pub mod sweeper;
pub mod trie;

pub use cache::VerifyCache;
pub use key::make_cache_key;
pub use sweeper::ExpirySweeper;
pub use trie::Verdict;
