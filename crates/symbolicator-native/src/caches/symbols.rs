//! The process-wide cache of symbol provider results.

use std::sync::Arc;

use symbolicator_service::config::SymbolCacheConfig;

use crate::interface::FrameTrust;
use crate::provider::SymbolRecord;

/// Identifies a provider lookup across events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolCacheKey {
    /// Stable identifier of the image, see [`CompleteObjectInfo::cache_id`].
    ///
    /// [`CompleteObjectInfo::cache_id`]: crate::interface::CompleteObjectInfo::cache_id
    pub image_id: Arc<str>,
    /// The load address of the image.
    ///
    /// Records carry absolute addresses, so an image loaded elsewhere resolves differently.
    pub image_addr: u64,
    /// The address passed to the provider, after adjustment.
    pub addr: u64,
    pub trust: FrameTrust,
}

/// Storage for provider results that may be shared by concurrent symbolication requests.
///
/// Caching is best-effort: a missing entry only means the provider has to be asked again.
pub trait SymbolCacheStore: Send + Sync {
    fn get(&self, key: &SymbolCacheKey) -> Option<Arc<[SymbolRecord]>>;

    fn set(&self, key: SymbolCacheKey, records: Arc<[SymbolRecord]>);
}

/// An in-memory [`SymbolCacheStore`] with bounded capacity and idle expiry.
#[derive(Clone)]
pub struct SymbolCache {
    inner: moka::sync::Cache<SymbolCacheKey, Arc<[SymbolRecord]>>,
}

impl std::fmt::Debug for SymbolCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolCache")
            .field("entry_count", &self.inner.entry_count())
            .finish()
    }
}

impl SymbolCache {
    /// Creates the cache, or `None` if it is disabled by a capacity of `0`.
    pub fn new(config: &SymbolCacheConfig) -> Option<Self> {
        if config.capacity == 0 {
            return None;
        }

        let mut builder = moka::sync::Cache::builder()
            .name("symbols")
            .max_capacity(config.capacity);
        if let Some(time_to_idle) = config.time_to_idle {
            builder = builder.time_to_idle(time_to_idle);
        }

        Some(Self {
            inner: builder.build(),
        })
    }
}

impl SymbolCacheStore for SymbolCache {
    fn get(&self, key: &SymbolCacheKey) -> Option<Arc<[SymbolRecord]>> {
        self.inner.get(key)
    }

    fn set(&self, key: SymbolCacheKey, records: Arc<[SymbolRecord]>) {
        self.inner.insert(key, records);
    }
}
