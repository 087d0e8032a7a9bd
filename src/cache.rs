pub mod memory;
pub mod persistent;

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metrics::Metrics;
use memory::BoundedCache;
use persistent::PersistentCache;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
pub const WORKLOG_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_MEMORY_CAPACITY: usize = 500;
pub const DEFAULT_PERSISTENT_CAPACITY: usize = 5000;

/// Wall clock in milliseconds. Persisted entries outlive the process, so
/// freshness is measured against epoch time rather than `Instant`.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub value: Value,
    pub stored_at_millis: i64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now_millis: i64, ttl: Duration) -> bool {
        now_millis.saturating_sub(self.stored_at_millis) <= ttl.as_millis() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlClass {
    Default,
    /// Worklog resources: shorter TTL, never written to the persistent tier.
    Worklog,
}

impl TtlClass {
    pub fn for_url(url: &str) -> Self {
        let path = url.split('?').next().unwrap_or(url);
        if path.trim_end_matches('/').ends_with("/worklog") || path.contains("/worklog/") {
            TtlClass::Worklog
        } else {
            TtlClass::Default
        }
    }

    pub fn persists(self) -> bool {
        matches!(self, TtlClass::Default)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub default_ttl: Duration,
    pub worklog_ttl: Duration,
    pub memory_capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            worklog_ttl: WORKLOG_TTL,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl CacheSettings {
    pub fn ttl_for(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Default => self.default_ttl,
            TtlClass::Worklog => self.worklog_ttl,
        }
    }
}

pub fn get_cache_key(username: &str, url: &str) -> String {
    format!("GET:{}:{}", username, url)
}

/// Key for a cacheable POST; `canonical_body` must serialize identical
/// requests identically.
pub fn post_cache_key(username: &str, url: &str, canonical_body: &str) -> String {
    format!("POST:{}:{}:{}", username, url, canonical_body)
}

/// Where a cached lookup was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Memory,
    Persistent,
}

/// Two-tier response cache: a bounded in-memory map in front of an optional
/// persistent store. Persistent failures degrade to misses.
#[derive(Debug)]
pub struct ResponseCache {
    settings: CacheSettings,
    memory: Mutex<BoundedCache>,
    persistent: Option<Arc<PersistentCache>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl ResponseCache {
    pub fn new(settings: CacheSettings, metrics: Arc<Metrics>) -> Self {
        let memory = Mutex::new(BoundedCache::new(settings.memory_capacity));
        Self {
            settings,
            memory,
            persistent: None,
            clock: Arc::new(SystemClock),
            metrics,
        }
    }

    pub fn with_persistent(mut self, persistent: Arc<PersistentCache>) -> Self {
        self.persistent = Some(persistent);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn persistent(&self) -> Option<&Arc<PersistentCache>> {
        self.persistent.as_ref()
    }

    pub fn lookup(&self, key: &str, class: TtlClass) -> Option<(Value, CacheTier)> {
        let now = self.clock.now_millis();
        let ttl = self.settings.ttl_for(class);

        if let Some(entry) = self
            .memory
            .lock()
            .expect("memory cache mutex poisoned")
            .get(key)
        {
            if entry.is_fresh(now, ttl) {
                self.metrics.inc_memory_hit();
                return Some((entry.value.clone(), CacheTier::Memory));
            }
        }

        if class.persists() {
            if let Some(persistent) = &self.persistent {
                match persistent.get(key) {
                    Ok(Some(entry)) if entry.is_fresh(now, ttl) => {
                        let value = entry.value.clone();
                        self.insert_memory(key, entry);
                        self.metrics.inc_persistent_hit();
                        return Some((value, CacheTier::Persistent));
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!("persistent cache read failed for {}: {}", key, err);
                    }
                }
            }
        }

        self.metrics.inc_cache_miss();
        None
    }

    pub fn store(&self, key: &str, class: TtlClass, value: &Value) {
        let entry = CacheEntry {
            value: value.clone(),
            stored_at_millis: self.clock.now_millis(),
        };

        if class.persists() {
            if let Some(persistent) = &self.persistent {
                if let Err(err) = persistent.put(key, &entry) {
                    tracing::warn!("persistent cache write failed for {}: {}", key, err);
                }
            }
        }
        self.insert_memory(key, entry);
    }

    /// Drops `key` from both tiers.
    pub fn invalidate(&self, key: &str) {
        let removed = self
            .memory
            .lock()
            .expect("memory cache mutex poisoned")
            .remove(key)
            .is_some();

        if let Some(persistent) = &self.persistent {
            if let Err(err) = persistent.delete(key) {
                tracing::warn!("persistent cache delete failed for {}: {}", key, err);
            }
        }

        self.metrics.inc_invalidation();
        tracing::debug!("invalidated cache key {} (memory_hit={})", key, removed);
    }

    pub fn memory_entry(&self, key: &str) -> Option<CacheEntry> {
        self.memory
            .lock()
            .expect("memory cache mutex poisoned")
            .get(key)
            .cloned()
    }

    pub fn memory_len(&self) -> usize {
        self.memory
            .lock()
            .expect("memory cache mutex poisoned")
            .len()
    }

    fn insert_memory(&self, key: &str, entry: CacheEntry) {
        let evicted = self
            .memory
            .lock()
            .expect("memory cache mutex poisoned")
            .insert(key, entry);
        for key in evicted {
            tracing::debug!("evicted cache key {}", key);
        }
    }
}
