use crate::utils::address::Pubkey;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Cached value with the time it was stored and how long it stays fresh.
#[derive(Clone, Debug)]
pub struct CacheItem<T> {
    pub data: T,
    pub timestamp: Instant,
    pub ttl: Duration,
}

impl<T> CacheItem<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self { data, timestamp: Instant::now(), ttl }
    }

    pub fn is_expired(&self) -> bool {
        self.timestamp.elapsed() > self.ttl
    }

    pub fn expires_at(&self) -> Instant {
        self.timestamp + self.ttl
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 { 0.0 } else { hits as f64 / total as f64 }
    }
}

/// Mint address -> USD price, each entry fresh for `ttl`. Expired entries are
/// treated as absent so the next read re-fetches.
#[derive(Debug)]
pub struct PriceCache {
    prices: DashMap<Pubkey, CacheItem<f64>>,
    pub stats: CacheStats,
    ttl: Duration,
    version: AtomicU64,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self { prices: DashMap::new(), stats: CacheStats::default(), ttl, version: AtomicU64::new(0) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh price for `mint`, if any.
    pub fn get(&self, mint: &Pubkey) -> Option<f64> {
        if let Some(item) = self.prices.get(mint) {
            if !item.is_expired() {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Some(item.data);
            }
        }
        // expired entries are dropped outside the read guard
        if self.prices.remove_if(mint, |_, item| item.is_expired()).is_some() {
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            self.version.fetch_add(1, Ordering::AcqRel);
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Fresh price without touching the hit/miss counters. Used by selectors.
    pub fn peek(&self, mint: &Pubkey) -> Option<f64> {
        self.prices.get(mint).filter(|item| !item.is_expired()).map(|item| item.data)
    }

    /// Fresh price and the instant it goes stale. Expiry does not bump
    /// `version`, so memoized readers must also honour the deadline.
    pub fn peek_with_expiry(&self, mint: &Pubkey) -> Option<(f64, Instant)> {
        self.prices.get(mint).filter(|item| !item.is_expired()).map(|item| (item.data, item.expires_at()))
    }

    pub fn set(&self, mint: Pubkey, price: f64) {
        self.prices.insert(mint, CacheItem::new(price, self.ttl));
        self.version.fetch_add(1, Ordering::AcqRel);
    }

    pub fn upsert<I: IntoIterator<Item = (Pubkey, f64)>>(&self, prices: I) {
        let mut changed = false;
        for (mint, price) in prices {
            self.prices.insert(mint, CacheItem::new(price, self.ttl));
            changed = true;
        }
        if changed {
            self.version.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn cleanup_expired(&self) {
        let before = self.prices.len();
        self.prices.retain(|_, item| !item.is_expired());
        let evicted = before.saturating_sub(self.prices.len());
        if evicted > 0 {
            self.stats.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
            self.version.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.prices.clear();
        self.version.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic_operations() {
        let cache = PriceCache::new(Duration::from_secs(60));
        let mint = Pubkey::new_from_array([7; 32]);

        assert!(cache.get(&mint).is_none());
        cache.set(mint, 1.25);
        assert_eq!(cache.get(&mint), Some(1.25));

        assert_eq!(cache.stats.hits.load(Ordering::Relaxed), 1);
        assert_eq!(cache.stats.misses.load(Ordering::Relaxed), 1);
        assert!((cache.stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_expired_entries_read_as_missing() {
        let cache = PriceCache::new(Duration::ZERO);
        let mint = Pubkey::new_from_array([1; 32]);
        cache.set(mint, 3.0);
        std::thread::sleep(Duration::from_millis(2));

        assert_eq!(cache.peek(&mint), None);
        assert_eq!(cache.get(&mint), None);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats.evictions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_peek_reports_expiry() {
        let cache = PriceCache::new(Duration::from_secs(60));
        let mint = Pubkey::new_from_array([4; 32]);
        assert!(cache.peek_with_expiry(&mint).is_none());

        cache.set(mint, 2.0);
        let (price, expires_at) = cache.peek_with_expiry(&mint).unwrap();
        assert_eq!(price, 2.0);
        assert!(expires_at > Instant::now() + Duration::from_secs(59));
    }

    #[test]
    fn test_version_tracks_writes() {
        let cache = PriceCache::new(Duration::from_secs(60));
        let v0 = cache.version();
        cache.upsert(vec![(Pubkey::new_from_array([1; 32]), 1.0), (Pubkey::new_from_array([2; 32]), 2.0)]);
        assert_eq!(cache.version(), v0 + 1);
        cache.upsert(Vec::new());
        assert_eq!(cache.version(), v0 + 1);
    }
}
