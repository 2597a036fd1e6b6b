//! Process-wide TTL caches with typed composite keys.
//!
//! Each cached entity kind gets its own `TtlCache`, and every key also
//! carries its `CacheKind`, so environmental, species and heatwave results
//! can never collide even if they were to share a store. Coordinates are
//! rounded to two decimals and kept as integer hundredths so keys hash
//! exactly.
//!
//! Expiry is enforced by `moka` at read time: an entry older than the TTL is
//! never returned.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::sync::Cache;

use crate::logging::{self, DataSource};
use crate::model::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Environmental,
    Species,
    Heatwave,
}

impl CacheKind {
    pub fn label(&self) -> &'static str {
        match self {
            CacheKind::Environmental => "environmental",
            CacheKind::Species => "species",
            CacheKind::Heatwave => "heatwave",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CacheKind,
    pub point_id: String,
    pub lat_centi: i64,
    pub lon_centi: i64,
    /// Kind-specific discriminator; the species radius in tenths of a km.
    pub aux: i64,
}

impl CacheKey {
    pub fn for_point(kind: CacheKind, point: &Point) -> Self {
        Self {
            kind,
            point_id: point.id().to_string(),
            lat_centi: to_centi(point.latitude()),
            lon_centi: to_centi(point.longitude()),
            aux: 0,
        }
    }

    pub fn species(point: &Point, radius_km: f64) -> Self {
        Self {
            aux: (radius_km * 10.0).round() as i64,
            ..Self::for_point(CacheKind::Species, point)
        }
    }
}

fn to_centi(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// Snapshot of cache effectiveness counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// TTL cache keyed by `CacheKey`.
pub struct TtlCache<V: Clone + Send + Sync + 'static> {
    cache: Cache<CacheKey, V>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let value = self.cache.get(key);
        self.record(key.kind, &key.point_id, value.is_some());
        value
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.cache.contains_key(key)
    }

    pub fn insert(&self, key: CacheKey, value: V) {
        self.cache.insert(key, value);
    }

    /// Returns the cached value, or computes, stores and returns it.
    ///
    /// Concurrent callers for the same key wait on a single computation.
    pub fn get_or_insert_with(&self, key: CacheKey, init: impl FnOnce() -> V) -> V {
        let (kind, point_id) = (key.kind, key.point_id.clone());
        let mut computed = false;
        let value = self.cache.get_with(key, || {
            computed = true;
            init()
        });
        self.record(kind, &point_id, !computed);
        value
    }

    fn record(&self, kind: CacheKind, point_id: &str, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        let outcome = if hit { "hit" } else { "miss" };
        logging::debug(DataSource::Cache, Some(point_id), &format!("{} {}", kind.label(), outcome));
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};
    use std::thread;

    /// Log sink shared with a test subscriber.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn point(id: &str, lat: f64, lon: f64) -> Point {
        Point::new(id, lat, lon).unwrap()
    }

    #[test]
    fn test_key_rounds_coordinates_to_two_decimals() {
        let a = CacheKey::for_point(CacheKind::Environmental, &point("gbr", -18.2861, 147.7001));
        let b = CacheKey::for_point(CacheKind::Environmental, &point("gbr", -18.2899, 147.6951));
        assert_eq!(a, b, "coordinates equal after rounding should share a key");
        assert_eq!(a.lat_centi, -1829);
        assert_eq!(a.lon_centi, 14770);
    }

    #[test]
    fn test_kinds_never_collide() {
        let p = point("gbr", -18.29, 147.70);
        assert_ne!(
            CacheKey::for_point(CacheKind::Environmental, &p),
            CacheKey::for_point(CacheKind::Heatwave, &p)
        );
    }

    #[test]
    fn test_species_key_includes_radius() {
        let p = point("gbr", -18.29, 147.70);
        assert_ne!(CacheKey::species(&p, 50.0), CacheKey::species(&p, 100.0));
        assert_eq!(CacheKey::species(&p, 50.0), CacheKey::species(&p, 50.0));
    }

    #[test]
    fn test_get_or_insert_with_computes_once() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60), 100);
        let key = CacheKey::for_point(CacheKind::Environmental, &point("p", 1.0, 1.0));
        let mut calls = 0;
        let first = cache.get_or_insert_with(key.clone(), || {
            calls += 1;
            7
        });
        let second = cache.get_or_insert_with(key.clone(), || {
            calls += 1;
            8
        });
        assert_eq!((first, second), (7, 7));
        assert_eq!(calls, 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_lookups_are_logged_under_cache_source() {
        let captured = Captured::default();
        let sink = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();

        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60), 100);
        let key = CacheKey::for_point(CacheKind::Environmental, &point("reef-7", 1.0, 1.0));
        tracing::subscriber::with_default(subscriber, || {
            cache.get_or_insert_with(key.clone(), || 1);
            cache.get_or_insert_with(key, || 2);
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("source=CACHE"), "missing CACHE tag in:\n{}", output);
        assert!(output.contains("reef-7"));
        assert!(output.contains("environmental miss"));
        assert!(output.contains("environmental hit"));
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_millis(50), 100);
        let key = CacheKey::for_point(CacheKind::Heatwave, &point("p", 1.0, 1.0));
        cache.insert(key.clone(), 1);
        assert_eq!(cache.get(&key), Some(1));
        thread::sleep(Duration::from_millis(120));
        assert_eq!(cache.get(&key), None, "expired entry must not be returned");
        assert!(!cache.contains(&key));
    }
}
