use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::product::ProductType;
use crate::sources::SlugKey;

pub const DEFAULT_SLUG_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for exercising expiry.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Ok(delta) = chrono::Duration::from_std(by) {
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub type SlugMap = Arc<HashMap<SlugKey, String>>;

struct CacheEntry {
    slugs: SlugMap,
    loaded_at: DateTime<Utc>,
}

/// Per-product-type cache of option filename slugs with a fixed time to live.
pub struct SlugCache {
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<ProductType, CacheEntry>>,
}

impl SlugCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(52));
        Self { ttl, clock, entries: RwLock::new(HashMap::new()) }
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    /// Fresh entry for the product type, if any. Expired entries are treated
    /// as absent and replaced on the next insert.
    pub fn get(&self, product_type: &ProductType) -> Option<SlugMap> {
        let now = self.clock.now();
        let entries = self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries
            .get(product_type)
            .filter(|entry| now.signed_duration_since(entry.loaded_at) < self.ttl)
            .map(|entry| Arc::clone(&entry.slugs))
    }

    pub fn insert(&self, product_type: ProductType, slugs: SlugMap) {
        let loaded_at = self.clock.now();
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(product_type, CacheEntry { slugs, loaded_at });
    }

    pub fn invalidate(&self, product_type: &ProductType) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.remove(product_type).is_some()
    }

    /// Drops every entry and returns the product types that were cached.
    pub fn clear(&self) -> Vec<ProductType> {
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut cleared: Vec<_> = entries.drain().map(|(product_type, _)| product_type).collect();
        cleared.sort();
        cleared
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use super::{ManualClock, SlugCache, DEFAULT_SLUG_CACHE_TTL};
    use crate::domain::product::ProductType;
    use crate::test_support::fixed_time;

    fn slugs() -> super::SlugMap {
        Arc::new(HashMap::from([(
            ("metal".to_string(), "white_gold".to_string()),
            "wg".to_string(),
        )]))
    }

    #[test]
    fn entries_expire_after_ttl() {
        let clock = Arc::new(ManualClock::new(fixed_time(0)));
        let cache = SlugCache::new(DEFAULT_SLUG_CACHE_TTL, clock.clone());
        cache.insert(ProductType::Necklace, slugs());

        clock.advance(Duration::from_secs(299));
        assert!(cache.get(&ProductType::Necklace).is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(&ProductType::Necklace).is_none());
    }

    #[test]
    fn entries_are_isolated_per_product_type() {
        let cache = SlugCache::with_system_clock(DEFAULT_SLUG_CACHE_TTL);
        cache.insert(ProductType::Necklace, slugs());

        assert!(cache.get(&ProductType::Bracelet).is_none());
        assert!(cache.invalidate(&ProductType::Necklace));
        assert!(!cache.invalidate(&ProductType::Necklace));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_reports_previously_cached_types() {
        let cache = SlugCache::with_system_clock(DEFAULT_SLUG_CACHE_TTL);
        cache.insert(ProductType::Ring, slugs());
        cache.insert(ProductType::Bracelet, slugs());

        assert_eq!(cache.clear(), vec![ProductType::Bracelet, ProductType::Ring]);
        assert!(cache.is_empty());
    }
}
