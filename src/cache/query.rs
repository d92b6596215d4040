//! Read-through query cache with a stale time

use super::{CacheInvalidator, CacheKey};
use crate::config::{CacheConfig, Cluster};
use crate::market::{Market, Position};
use crate::telemetry::{self, CounterMetric};
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Cached read result
///
/// Markets are cached undecorated; time-derived fields are recomputed on
/// every read.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Markets(Vec<Market>),
    /// `None` records a confirmed absence
    Market(Option<Market>),
    Positions(Vec<Position>),
    Position(Position),
    Balance(Option<u64>),
}

/// Concurrent TTL cache keyed by [`CacheKey`]
pub struct QueryCache {
    entries: DashMap<CacheKey, (Instant, CachedValue)>,
    stale_time: Duration,
}

impl QueryCache {
    #[must_use]
    pub fn new(stale_time: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            stale_time,
        }
    }

    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.stale_time())
    }

    /// Fresh value for `key`, evicting it when stale
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let now = Instant::now();
        let fresh = {
            let entry = self.entries.get(key)?;
            let (stored, value) = entry.value();
            (now.duration_since(*stored) < self.stale_time).then(|| value.clone())
        };
        if fresh.is_none() {
            self.entries.remove(key);
        }
        fresh
    }

    pub fn insert(&self, key: CacheKey, value: CachedValue) {
        self.entries.insert(key, (Instant::now(), value));
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.get(key).is_some()
    }

    /// Drop every entry of one cluster
    pub fn clear_cluster(&self, cluster: Cluster) {
        self.entries.retain(|key, _| key.cluster() != cluster);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheInvalidator for QueryCache {
    fn invalidate(&self, keys: &[CacheKey]) {
        let mut dropped = 0u64;
        for key in keys {
            if self.entries.remove(key).is_some() {
                dropped += 1;
            }
        }
        tracing::debug!(requested = keys.len(), dropped, "Cache invalidated");
        telemetry::increment_by(CounterMetric::CacheInvalidations, dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::cache::InvalidationScope;

    fn market_key(cluster: Cluster, byte: u8) -> CacheKey {
        CacheKey::Market {
            cluster,
            market: Address::new([byte; 32]),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let key = CacheKey::Balance {
            cluster: Cluster::Devnet,
            account: Address::new([1; 32]),
        };
        assert!(cache.get(&key).is_none());
        cache.insert(key, CachedValue::Balance(Some(42)));
        assert_eq!(cache.get(&key), Some(CachedValue::Balance(Some(42))));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stale_entries_are_evicted() {
        let cache = QueryCache::new(Duration::ZERO);
        let key = market_key(Cluster::Devnet, 1);
        cache.insert(key, CachedValue::Market(None));
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidation_spares_unrelated_markets() {
        let cache = QueryCache::new(Duration::from_secs(60));
        let touched = market_key(Cluster::Devnet, 1);
        let unrelated = market_key(Cluster::Devnet, 2);
        let other_cluster = market_key(Cluster::MainnetBeta, 1);
        for key in [touched, unrelated, other_cluster] {
            cache.insert(key, CachedValue::Market(None));
        }

        let scope = InvalidationScope::new(Address::new([1; 32]), Address::new([7; 32]));
        cache.invalidate(&scope.keys(Cluster::Devnet));

        assert!(!cache.contains(&touched));
        assert!(cache.contains(&unrelated));
        assert!(cache.contains(&other_cluster));
    }

    #[test]
    fn test_clear_cluster() {
        let cache = QueryCache::new(Duration::from_secs(60));
        cache.insert(market_key(Cluster::Devnet, 1), CachedValue::Market(None));
        cache.insert(market_key(Cluster::Localnet, 1), CachedValue::Market(None));
        cache.clear_cluster(Cluster::Devnet);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&market_key(Cluster::Localnet, 1)));
    }
}
