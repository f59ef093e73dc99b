//! In-memory cache of domain data fetched for the logged-in user.
//!
//! `QueryCache` stores JSON snapshots of backend resources (projects, work
//! zones, materials, inventories, ...) keyed by `QueryKey`. Entries are
//! considered stale after 5 minutes, and the whole cache is evicted when the
//! session ends, since the next login may belong to someone else.

pub mod query;

pub use query::{CachedData, QueryCache, QueryKey};
