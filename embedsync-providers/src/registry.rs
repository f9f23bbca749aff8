// Provider Registry
//
// Holds the fixed set of embed providers, indexed by id and by trusted
// origin. The origin index is the router's allow-list, so a duplicate
// origin is a configuration conflict and fails registration instead of
// silently shadowing an earlier provider.

use crate::error::RegistryError;
use crate::provider::EmbedProvider;
use crate::vendors::{videasy::Videasy, vidfast::VidFast, vidlink::VidLink};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct ProviderRegistry {
    by_id: HashMap<&'static str, Arc<dyn EmbedProvider>>,
    origin_to_id: HashMap<&'static str, &'static str>,
}

impl ProviderRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_id: HashMap::new(),
            origin_to_id: HashMap::new(),
        }
    }

    /// Registry preloaded with the builtin vendor set
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Arc::new(VidLink))?;
        registry.register(Arc::new(Videasy))?;
        registry.register(Arc::new(VidFast))?;
        Ok(registry)
    }

    /// Register a provider.
    ///
    /// Idempotent by id: re-registering an id replaces its entry and
    /// frees the origin it previously claimed. Claiming an origin held
    /// by a *different* id fails with [`RegistryError::OriginConflict`].
    pub fn register(&mut self, provider: Arc<dyn EmbedProvider>) -> Result<(), RegistryError> {
        let meta = provider.meta();
        if let Some(&existing) = self.origin_to_id.get(meta.trusted_origin) {
            if existing != meta.id {
                return Err(RegistryError::OriginConflict {
                    origin: meta.trusted_origin.to_string(),
                    existing: existing.to_string(),
                    incoming: meta.id.to_string(),
                });
            }
        }
        if let Some(previous) = self.by_id.insert(meta.id, Arc::clone(&provider)) {
            self.origin_to_id.remove(previous.meta().trusted_origin);
        }
        self.origin_to_id.insert(meta.trusted_origin, meta.id);
        Ok(())
    }

    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<Arc<dyn EmbedProvider>> {
        self.by_id.get(id).cloned()
    }

    #[must_use]
    pub fn get_by_origin(&self, origin: &str) -> Option<Arc<dyn EmbedProvider>> {
        self.origin_to_id
            .get(origin)
            .and_then(|id| self.by_id.get(id))
            .cloned()
    }

    /// Origins allowed to post messages into the router
    #[must_use]
    pub fn allowed_origins(&self) -> HashSet<&'static str> {
        self.origin_to_id.keys().copied().collect()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        self.by_id.keys().copied().collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
