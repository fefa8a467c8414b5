use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::core::{EavError, Result};
use crate::storage::{Filter, MemoryBackend};

use super::{EntityType, ENTITIES_TABLE};

#[derive(Default)]
struct RegistryCache {
    by_id: HashMap<u64, Arc<EntityType>>,
    code_to_id: HashMap<String, u64>,
    /// Explicit flat-mode configuration, process-wide per entity type.
    /// Overrides the persisted `is_flat_enabled` column when present.
    flat_overrides: HashMap<u64, bool>,
}

/// Resolves and caches entity-type metadata from the backing store.
///
/// The cache is unbounded and lives for the process; entity-type metadata is
/// effectively static at runtime and must be explicitly invalidated after a
/// structural change. Both key spaces (code and id) are populated together
/// under one lock, so `resolve_by_code` and `resolve_by_id` hand back the
/// same `Arc` once either has resolved. Population races are benign: both
/// writers resolve to identical metadata.
pub struct EntityRegistry {
    backend: Arc<MemoryBackend>,
    cache: RwLock<RegistryCache>,
}

impl EntityRegistry {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(RegistryCache::default()),
        }
    }

    pub async fn resolve_by_code(&self, code: &str) -> Result<Arc<EntityType>> {
        {
            let cache = self.cache.read().await;
            if let Some(id) = cache.code_to_id.get(code) {
                if let Some(entity) = cache.by_id.get(id) {
                    return Ok(Arc::clone(entity));
                }
            }
        }

        debug!(entity_code = code, "entity registry cache miss");
        let rows = self
            .backend
            .select(ENTITIES_TABLE, &Filter::eq("entity_code", code))
            .await?;
        let (id, row) = rows
            .into_iter()
            .next()
            .ok_or_else(|| EavError::ConfigurationMissing(code.to_string()))?;
        let entity = Arc::new(EntityType::from_row(id, &row)?);
        self.populate(Arc::clone(&entity)).await;
        Ok(entity)
    }

    pub async fn resolve_by_id(&self, id: u64) -> Result<Arc<EntityType>> {
        {
            let cache = self.cache.read().await;
            if let Some(entity) = cache.by_id.get(&id) {
                return Ok(Arc::clone(entity));
            }
        }

        debug!(entity_id = id, "entity registry cache miss");
        let row = self
            .backend
            .get(ENTITIES_TABLE, id)
            .await?
            .ok_or_else(|| EavError::ConfigurationMissing(format!("entity id {}", id)))?;
        let entity = Arc::new(EntityType::from_row(id, &row)?);
        self.populate(Arc::clone(&entity)).await;
        Ok(entity)
    }

    /// Both cache slots are filled in one critical section so the two key
    /// spaces can never disagree.
    async fn populate(&self, entity: Arc<EntityType>) {
        let mut cache = self.cache.write().await;
        cache
            .code_to_id
            .insert(entity.entity_code.clone(), entity.id);
        cache.by_id.entry(entity.id).or_insert(entity);
    }

    // ------------------------------------------------------------------
    // Table routing
    // ------------------------------------------------------------------

    /// Switch an entity type between the EAV route and the flat route.
    ///
    /// This is process-wide configuration: every subsequent read and write
    /// for the entity type follows the new route.
    pub async fn set_flat_mode(&self, entity_id: u64, enabled: bool) {
        debug!(entity_id, enabled, "set flat mode");
        self.cache
            .write()
            .await
            .flat_overrides
            .insert(entity_id, enabled);
    }

    pub async fn use_flat(&self, entity: &EntityType) -> bool {
        self.cache
            .read()
            .await
            .flat_overrides
            .get(&entity.id)
            .copied()
            .unwrap_or(entity.is_flat_enabled)
    }

    /// The table a read or write for this entity type targets: the base
    /// table, or its flat counterpart when flat mode is on.
    pub async fn table_name(&self, entity: &EntityType) -> String {
        if self.use_flat(entity).await {
            entity.flat_table()
        } else {
            entity.entity_table.clone()
        }
    }

    // ------------------------------------------------------------------
    // Invalidation
    // ------------------------------------------------------------------

    pub async fn invalidate(&self, code: &str) {
        let mut cache = self.cache.write().await;
        if let Some(id) = cache.code_to_id.remove(code) {
            cache.by_id.remove(&id);
        }
    }

    pub async fn invalidate_all(&self) {
        let mut cache = self.cache.write().await;
        cache.by_id.clear();
        cache.code_to_id.clear();
    }
}
