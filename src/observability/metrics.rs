//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only on process start
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

/// Metrics registry containing all engine counters
///
/// All counters use Relaxed ordering; exact cross-counter consistency is not
/// required.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Records successfully built
    records_constructed: AtomicU64,
    /// Constructor rejections
    construction_failures: AtomicU64,
    /// Record types created
    types_defined: AtomicU64,
    /// Fields copied into subtypes after declaration
    fields_propagated: AtomicU64,
    /// Union lookups served from the snapshot cache
    union_cache_hits: AtomicU64,
    /// Union lookups that computed a new snapshot entry
    union_cache_misses: AtomicU64,
    /// AST lookups that found a reclaimed type
    recycled_lookups: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_records_constructed(&self) {
        self.records_constructed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_construction_failures(&self) {
        self.construction_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_types_defined(&self) {
        self.types_defined.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `count` propagated fields
    pub fn add_fields_propagated(&self, count: u64) {
        self.fields_propagated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_union_cache_hits(&self) {
        self.union_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_union_cache_misses(&self) {
        self.union_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_recycled_lookups(&self) {
        self.recycled_lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        format!(
            r#"{{"records_constructed":{},"construction_failures":{},"types_defined":{},"fields_propagated":{},"union_cache_hits":{},"union_cache_misses":{},"recycled_lookups":{}}}"#,
            self.records_constructed.load(Ordering::Relaxed),
            self.construction_failures.load(Ordering::Relaxed),
            self.types_defined.load(Ordering::Relaxed),
            self.fields_propagated.load(Ordering::Relaxed),
            self.union_cache_hits.load(Ordering::Relaxed),
            self.union_cache_misses.load(Ordering::Relaxed),
            self.recycled_lookups.load(Ordering::Relaxed),
        )
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_constructed: self.records_constructed.load(Ordering::Relaxed),
            construction_failures: self.construction_failures.load(Ordering::Relaxed),
            types_defined: self.types_defined.load(Ordering::Relaxed),
            fields_propagated: self.fields_propagated.load(Ordering::Relaxed),
            union_cache_hits: self.union_cache_hits.load(Ordering::Relaxed),
            union_cache_misses: self.union_cache_misses.load(Ordering::Relaxed),
            recycled_lookups: self.recycled_lookups.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_constructed: u64,
    pub construction_failures: u64,
    pub types_defined: u64,
    pub fields_propagated: u64,
    pub union_cache_hits: u64,
    pub union_cache_misses: u64,
    pub recycled_lookups: u64,
}

/// Process-wide registry the engine reports into
pub fn metrics() -> &'static MetricsRegistry {
    static REGISTRY: OnceLock<MetricsRegistry> = OnceLock::new();
    REGISTRY.get_or_init(MetricsRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let registry = MetricsRegistry::new();
        let snapshot = registry.snapshot();

        assert_eq!(snapshot.records_constructed, 0);
        assert_eq!(snapshot.union_cache_hits, 0);
        assert_eq!(snapshot.recycled_lookups, 0);
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();

        registry.increment_records_constructed();
        registry.increment_records_constructed();
        registry.increment_construction_failures();
        registry.increment_types_defined();
        registry.add_fields_propagated(3);
        registry.increment_union_cache_hits();
        registry.increment_union_cache_misses();
        registry.increment_recycled_lookups();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.records_constructed, 2);
        assert_eq!(snapshot.construction_failures, 1);
        assert_eq!(snapshot.types_defined, 1);
        assert_eq!(snapshot.fields_propagated, 3);
        assert_eq!(snapshot.union_cache_hits, 1);
        assert_eq!(snapshot.union_cache_misses, 1);
        assert_eq!(snapshot.recycled_lookups, 1);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.add_fields_propagated(7);
        registry.increment_records_constructed();

        let parsed: serde_json::Value = serde_json::from_str(&registry.to_json()).unwrap();
        assert_eq!(parsed["fields_propagated"], 7);
        assert_eq!(parsed["records_constructed"], 1);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let reg = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    reg.increment_union_cache_hits();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().union_cache_hits, 1000);
    }
}
