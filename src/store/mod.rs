//! Key-value store access contract.
//!
//! The bucket store and the tenant→class mapping live in an external
//! key-value database with Redis-like semantics. Everything in this crate
//! talks to it through [`KeyValueStore`] so that the backing client can be
//! swapped without touching resolution or projection.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;

/// Operations the resolver, projector and admin tooling issue against the store.
///
/// Each call is independent; no operation sequence is transactional.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a string value. Missing or expired keys yield `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a string value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key, returning whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// List keys matching a glob pattern (`*` and `?` wildcards).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Add or re-score a member of a sorted set.
    async fn zadd(&self, set: &str, member: &str, score: f64) -> Result<()>;

    /// Members of a sorted set by rank, inclusive; negative indexes count from the end.
    async fn zrange(&self, set: &str, start: isize, stop: isize) -> Result<Vec<String>>;

    /// Remove members scored within `[min, max]`, returning how many were removed.
    async fn zremrangebyscore(&self, set: &str, min: f64, max: f64) -> Result<usize>;
}

/// Match `candidate` against a glob pattern supporting `*` and `?`.
pub(crate) fn glob_match(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();

    let (mut p, mut c) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while c < candidate.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == candidate[c]) {
            p += 1;
            c += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, c));
            p += 1;
        } else if let Some((star_p, star_c)) = backtrack {
            p = star_p + 1;
            c = star_c + 1;
            backtrack = Some((star_p, star_c + 1));
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }

    p == pattern.len()
}
