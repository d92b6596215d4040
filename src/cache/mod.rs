//! Read cache keys and invalidation
//!
//! Every confirmed write names the reads it made stale through an
//! [`InvalidationScope`]. Keys are scoped by cluster so switching networks
//! never serves another network's data.

mod query;

pub use query::{CachedValue, QueryCache};

use crate::address::Address;
use crate::config::Cluster;

/// Identity of one cached read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Aggregate market list
    Markets { cluster: Cluster },
    Market { cluster: Cluster, market: Address },
    /// Aggregate positions of one owner
    Positions { cluster: Cluster, owner: Address },
    Position {
        cluster: Cluster,
        owner: Address,
        market: Address,
    },
    /// Token balance of one sub-account
    Balance { cluster: Cluster, account: Address },
}

impl CacheKey {
    pub fn cluster(&self) -> Cluster {
        match self {
            Self::Markets { cluster }
            | Self::Market { cluster, .. }
            | Self::Positions { cluster, .. }
            | Self::Position { cluster, .. }
            | Self::Balance { cluster, .. } => *cluster,
        }
    }
}

/// Reads made stale by one confirmed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationScope {
    pub market: Address,
    /// Identity that signed the write
    pub owner: Address,
    /// Sub-accounts whose balances moved
    pub touched: Vec<Address>,
}

impl InvalidationScope {
    pub fn new(market: Address, owner: Address) -> Self {
        Self {
            market,
            owner,
            touched: Vec::new(),
        }
    }

    pub fn touching(mut self, accounts: impl IntoIterator<Item = Address>) -> Self {
        for account in accounts {
            if !self.touched.contains(&account) {
                self.touched.push(account);
            }
        }
        self
    }

    /// Concrete keys to drop on `cluster`
    pub fn keys(&self, cluster: Cluster) -> Vec<CacheKey> {
        let mut keys = vec![
            CacheKey::Markets { cluster },
            CacheKey::Market {
                cluster,
                market: self.market,
            },
            CacheKey::Positions {
                cluster,
                owner: self.owner,
            },
            CacheKey::Position {
                cluster,
                owner: self.owner,
                market: self.market,
            },
        ];
        keys.extend(
            self.touched
                .iter()
                .map(|&account| CacheKey::Balance { cluster, account }),
        );
        keys
    }
}

/// Sink for invalidation requests
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, keys: &[CacheKey]);
}

/// Invalidator for callers without a cache
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl CacheInvalidator for NoCache {
    fn invalidate(&self, _keys: &[CacheKey]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_expands_to_exact_keys() {
        let market = Address::new([1; 32]);
        let owner = Address::new([2; 32]);
        let yes = Address::new([3; 32]);
        let asset = Address::new([4; 32]);
        let scope = InvalidationScope::new(market, owner).touching([yes, asset, yes]);

        let keys = scope.keys(Cluster::Devnet);
        assert_eq!(
            keys,
            vec![
                CacheKey::Markets {
                    cluster: Cluster::Devnet
                },
                CacheKey::Market {
                    cluster: Cluster::Devnet,
                    market
                },
                CacheKey::Positions {
                    cluster: Cluster::Devnet,
                    owner
                },
                CacheKey::Position {
                    cluster: Cluster::Devnet,
                    owner,
                    market
                },
                CacheKey::Balance {
                    cluster: Cluster::Devnet,
                    account: yes
                },
                CacheKey::Balance {
                    cluster: Cluster::Devnet,
                    account: asset
                },
            ]
        );
        assert!(keys.iter().all(|k| k.cluster() == Cluster::Devnet));
    }

    #[test]
    fn test_scope_never_names_other_markets() {
        let other = Address::new([9; 32]);
        let scope = InvalidationScope::new(Address::new([1; 32]), Address::new([2; 32]));
        assert!(!scope.keys(Cluster::Localnet).iter().any(|k| matches!(
            k,
            CacheKey::Market { market, .. } | CacheKey::Position { market, .. } if *market == other
        )));
    }
}
