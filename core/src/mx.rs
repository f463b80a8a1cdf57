//! DNS MX resolution plus the bounded, process-local memo wrapped around it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::Resolver;
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

/// One MX record: a priority (lower = higher precedence) and the exchange
/// hostname, trailing dot already stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

/// An ordered MX record set for a domain, ascending by preference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MxRecordSet {
    pub records: Vec<MxRecord>,
}

impl MxRecordSet {
    /// The probe target: the lowest-preference (highest-priority) exchange.
    pub fn primary(&self) -> Option<&MxRecord> {
        self.records.first()
    }

    pub fn exchanges(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.exchange.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Resolves a domain's MX records, or reports their absence.
///
/// A trait so the verifier can run against a real DNS resolver in production
/// and a scripted one in tests.
#[async_trait]
pub trait MxResolver: Send + Sync {
    async fn resolve(&self, domain: &str) -> Option<MxRecordSet>;
}

/// The real resolver, backed by the system's configured nameservers via
/// `hickory-resolver`. Enforces an overall deadline rather than trusting the
/// resolver crate's own defaults.
pub struct HickoryMxResolver {
    deadline: Duration,
}

impl HickoryMxResolver {
    pub fn new(deadline: Duration) -> Self {
        HickoryMxResolver { deadline }
    }
}

impl Default for HickoryMxResolver {
    fn default() -> Self {
        HickoryMxResolver::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl MxResolver for HickoryMxResolver {
    async fn resolve(&self, domain: &str) -> Option<MxRecordSet> {
        let lookup = tokio::time::timeout(self.deadline, async {
            let resolver = Resolver::builder_tokio().ok()?.build();
            resolver.mx_lookup(domain).await.ok()
        })
        .await
        .ok()??;

        let mut records: Vec<MxRecord> = lookup
            .iter()
            .map(|mx| MxRecord {
                preference: mx.preference(),
                exchange: mx.exchange().to_string().trim_end_matches('.').to_string(),
            })
            .filter(|r| !r.exchange.is_empty())
            .collect();

        if records.is_empty() {
            return None;
        }

        records.sort_by_key(|r| r.preference);
        Some(MxRecordSet { records })
    }
}

/// Wraps any [`MxResolver`] with a bounded, LRU-evicted, process-local memo.
///
/// Caches both hits (`Some`) and misses (`None`) so a domain with no MX
/// doesn't get re-resolved on every call. Concurrent callers for the same
/// domain simply resolve independently rather than coalescing — the spec
/// permits either, and coalescing would add a second synchronization
/// primitive for no behavioral difference at this scale.
pub struct MemoizingMxResolver<R: MxResolver> {
    inner: R,
    memo: Mutex<LruCache<String, Option<Arc<MxRecordSet>>>>,
}

const DEFAULT_MEMO_CAPACITY: usize = 128;

impl<R: MxResolver> MemoizingMxResolver<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_MEMO_CAPACITY)
    }

    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        MemoizingMxResolver {
            inner,
            memo: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl<R: MxResolver> MxResolver for MemoizingMxResolver<R> {
    async fn resolve(&self, domain: &str) -> Option<MxRecordSet> {
        let key = domain.to_lowercase();

        if let Some(cached) = self.memo.lock().await.get(&key) {
            return cached.as_ref().map(|arc| (**arc).clone());
        }

        let resolved = self.inner.resolve(&key).await;
        let to_store = resolved.clone().map(Arc::new);
        self.memo.lock().await.put(key, to_store);
        resolved
    }
}
