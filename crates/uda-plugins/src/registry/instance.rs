//! One registered plugin with its lifecycle and cache state.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use once_cell::sync::OnceCell;
use uda_protocol::{RequestModel, Value};

use crate::descriptor::{CachePolicy, PluginDescriptor};
use crate::plugin::{Plugin, PluginCall, PluginFailure, ResultSlot};

/// Results kept per caching plugin.
pub const DEFAULT_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(63);

/// Identifies a client session on the server for cache scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(pub u64);

type CacheKey = (SessionKey, RequestModel);

/// A registered plugin.
pub struct PluginInstance {
    descriptor: PluginDescriptor,
    plugin: Arc<dyn Plugin>,
    init: OnceCell<Result<(), PluginFailure>>,
    cache: Option<Mutex<LruCache<CacheKey, Value>>>,
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PluginInstance")
            .field("descriptor", &self.descriptor)
            .field("initialised", &self.init.get())
            .finish_non_exhaustive()
    }
}

impl PluginInstance {
    pub(crate) fn new(descriptor: PluginDescriptor, plugin: Arc<dyn Plugin>) -> Self {
        let cache = match descriptor.cache() {
            CachePolicy::Ok => Some(Mutex::new(LruCache::new(DEFAULT_CACHE_CAPACITY))),
            CachePolicy::None => None,
        };
        Self {
            descriptor,
            plugin,
            init: OnceCell::new(),
            cache,
        }
    }

    /// The plugin's descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    /// Runs `init` on first use; later calls return the remembered outcome.
    ///
    /// # Errors
    ///
    /// Returns the failure reported by the first `init`.
    pub fn ensure_initialised(&self) -> Result<(), PluginFailure> {
        self.init.get_or_init(|| self.plugin.init()).clone()
    }

    /// True once `init` has run and succeeded.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        matches!(self.init.get(), Some(Ok(())))
    }

    pub(crate) fn invoke(
        &self,
        call: &PluginCall,
        slot: &mut ResultSlot,
    ) -> Result<(), PluginFailure> {
        self.plugin.invoke(call, slot)
    }

    /// Calls the plugin's `reset` and drops its cached results.
    pub fn reset(&self) {
        self.plugin.reset();
        if let Some(mut cache) = self.lock_cache() {
            cache.clear();
        }
    }

    pub(crate) fn cached(&self, session: SessionKey, request: &RequestModel) -> Option<Value> {
        let mut cache = self.lock_cache()?;
        cache.get(&(session, request.clone())).cloned()
    }

    pub(crate) fn store(&self, session: SessionKey, request: &RequestModel, value: &Value) {
        if let Some(mut cache) = self.lock_cache() {
            cache.put((session, request.clone()), value.clone());
        }
    }

    /// Number of cached results.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.lock_cache().map_or(0, |cache| cache.len())
    }

    pub(crate) fn evict_session(&self, session: SessionKey) {
        let Some(mut cache) = self.lock_cache() else {
            return;
        };
        let stale: Vec<CacheKey> = cache
            .iter()
            .filter(|((owner, _), _)| *owner == session)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    fn lock_cache(&self) -> Option<MutexGuard<'_, LruCache<CacheKey, Value>>> {
        self.cache
            .as_ref()
            .map(|cache| cache.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
