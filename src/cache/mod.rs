pub mod block_cache;
pub mod result_cache;

pub use block_cache::{block_key, format_unix_timestamp, BlockTimestampCache, BlockTimestampEntry};
pub use result_cache::{result_key, ResultCache};

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Time source for cache expiry and time-window resolution
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;

    /// Seconds since the Unix epoch
    fn unix_now(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    unix_origin: i64,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(unix_origin: i64) -> Self {
        Self {
            origin: Instant::now(),
            unix_origin,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }

    fn unix_now(&self) -> i64 {
        self.unix_origin + self.offset.lock().as_secs() as i64
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    inserts: u64,
    last_sweep: Instant,
}

/// Snapshot of a cache's counters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub name: String,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub hit_rate: f64,
}

/// String-keyed store whose entries expire a fixed time after insertion.
///
/// Expired entries are dropped when read. When a check period is set,
/// inserts also sweep every expired entry once that period has elapsed
/// since the last sweep.
#[derive(Debug)]
pub struct TtlCache<V> {
    name: String,
    ttl: Duration,
    check_period: Option<Duration>,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            name: name.to_string(),
            ttl,
            check_period: None,
            clock,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                inserts: 0,
                last_sweep: now,
            }),
        }
    }

    pub fn with_check_period(mut self, period: Duration) -> Self {
        self.check_period = Some(period);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let live = match state.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                state.entries.remove(key);
                None
            }
            None => None,
        };

        match live {
            Some(_) => state.hits += 1,
            None => state.misses += 1,
        }
        live
    }

    /// Reads without touching the hit/miss counters
    pub fn peek(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let state = self.state.lock();
        state
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: String, value: V) {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if let Some(period) = self.check_period {
            if now.duration_since(state.last_sweep) >= period {
                let removed = Self::sweep(&mut state, now);
                if removed > 0 {
                    log::debug!("Swept {} expired entries from {} cache", removed, self.name);
                }
            }
        }

        state.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
        state.inserts += 1;
    }

    /// Drops every expired entry and returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        Self::sweep(&mut state, now)
    }

    /// Stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let lookups = state.hits + state.misses;
        CacheStats {
            name: self.name.clone(),
            entries: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
            inserts: state.inserts,
            hit_rate: if lookups > 0 {
                state.hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }

    fn sweep(state: &mut CacheState<V>, now: Instant) -> usize {
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.expires_at > now);
        state.last_sweep = now;
        before - state.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_clock(ttl_secs: u64) -> (TtlCache<u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let cache = TtlCache::new("test", Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_get_and_expire() {
        let (cache, clock) = cache_with_clock(10);
        cache.insert("a".to_string(), 1);

        assert_eq!(cache.get("a"), Some(1));
        clock.advance(Duration::from_secs(9));
        assert_eq!(cache.get("a"), Some(1));
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("a"), None);
        // expired entry is dropped on read
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_hit_miss_counters() {
        let (cache, _clock) = cache_with_clock(10);
        cache.insert("a".to_string(), 1);

        cache.get("a");
        cache.get("a");
        cache.get("b");
        cache.peek("a");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_sweep_on_insert_after_check_period() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = TtlCache::new("blocks", Duration::from_secs(5), clock.clone())
            .with_check_period(Duration::from_secs(60));

        cache.insert("old".to_string(), 1);
        clock.advance(Duration::from_secs(30));
        cache.insert("mid".to_string(), 2);
        // check period not reached, expired entry still stored
        assert_eq!(cache.len(), 2);

        clock.advance(Duration::from_secs(30));
        cache.insert("new".to_string(), 3);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek("new"), Some(3));
    }

    #[test]
    fn test_overwrite_refreshes_expiry() {
        let (cache, clock) = cache_with_clock(10);
        cache.insert("a".to_string(), 1);
        clock.advance(Duration::from_secs(8));
        cache.insert("a".to_string(), 2);
        clock.advance(Duration::from_secs(8));

        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[test]
    fn test_manual_clock_unix_time() {
        let clock = ManualClock::new(1_000);
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.unix_now(), 1_090);
    }
}
