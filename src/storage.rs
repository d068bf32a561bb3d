//! Concurrent map constructors shared by the registries
//!
//! All name- and type-keyed tables use `DashMap` with `ahash`. The shard
//! count is scaled to the expected number of entries: the default DashMap
//! policy (num_cpus * 4 shards) is far more than a container with a few
//! dozen beans needs and makes container creation noticeably slower.

use ahash::RandomState;
use dashmap::{DashMap, DashSet};
use std::hash::Hash;

/// Map keyed by bean name (or alias).
pub type NameMap<V> = DashMap<String, V, RandomState>;

/// Set of bean names.
pub type NameSet = DashSet<String, RandomState>;

/// Shard count for an expected number of entries.
#[inline]
pub(crate) fn shard_amount(capacity: usize) -> usize {
    if capacity <= 16 {
        8
    } else if capacity <= 64 {
        16
    } else {
        32
    }
}

/// Empty map with the small-container shard policy.
#[inline]
pub fn map<K: Eq + Hash, V>() -> DashMap<K, V, RandomState> {
    map_with_capacity(0)
}

/// Map with pre-allocated capacity and scaled shards.
#[inline]
pub fn map_with_capacity<K: Eq + Hash, V>(capacity: usize) -> DashMap<K, V, RandomState> {
    DashMap::with_capacity_and_hasher_and_shard_amount(
        capacity,
        RandomState::new(),
        shard_amount(capacity),
    )
}

#[inline]
pub fn name_map<V>() -> NameMap<V> {
    map()
}

#[inline]
pub fn name_map_with_capacity<V>(capacity: usize) -> NameMap<V> {
    map_with_capacity(capacity)
}

#[inline]
pub fn name_set() -> NameSet {
    DashSet::with_hasher(RandomState::new())
}

/// Snapshot of a name map's keys.
///
/// Callers that go on to run user code must work from a snapshot: holding a
/// shard guard across a callback that touches the same map deadlocks.
pub fn keys<V>(map: &NameMap<V>) -> Vec<String> {
    map.iter().map(|r| r.key().clone()).collect()
}

/// Cloned value for `key`, releasing the shard guard before returning.
#[inline]
pub fn get_cloned<V: Clone>(map: &NameMap<V>, key: &str) -> Option<V> {
    map.get(key).map(|r| r.value().clone())
}
