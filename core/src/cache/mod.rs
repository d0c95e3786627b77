//! Content-addressed cache of executor results.
//!
//! Keys are a SHA-256 digest of the tool id plus a canonical (sorted-key)
//! serialization of the tool parameters. Entries expire after their TTL and
//! the store is capacity bounded; when full, expired entries go first and then
//! the oldest-created ones.

mod key;
mod store;

pub use key::{canonicalize, make_key, CacheKey};
pub use store::{CacheEntry, CacheStats, ExecutionCache};
