use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::core::{EavError, Result, Row, Value};
use crate::storage::{Filter, MemoryBackend};
use crate::validation::apply_rules;

use super::{AttributeDescriptor, EntityType, ATTRIBUTES_TABLE};

type DescriptorMap = BTreeMap<String, Arc<AttributeDescriptor>>;

/// Resolves attribute descriptors for an entity type, with per-entity-type
/// caching. The full declared set is loaded from the backing store on first
/// use and reused for every later `load`; schema is assumed stable for the
/// process lifetime, with an explicit invalidation hook for when it is not.
pub struct AttributeLoader {
    backend: Arc<MemoryBackend>,
    cache: RwLock<HashMap<u64, Arc<DescriptorMap>>>,
}

impl AttributeLoader {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve descriptors for the requested codes.
    ///
    /// `include_static = false` filters out attributes stored as physical
    /// main-table columns, leaving only EAV-routed ones. `strict` makes an
    /// unknown code an error; non-strict loads silently skip it, which is
    /// what partial dirty updates need. When the record's attribute-set id
    /// is known, descriptors belonging to a different set are excluded.
    pub async fn load(
        &self,
        entity: &EntityType,
        codes: &[String],
        include_static: bool,
        strict: bool,
        set_id: Option<u64>,
    ) -> Result<LoadedAttributes> {
        let declared = self.descriptors_for(entity).await?;

        let mut attributes = DescriptorMap::new();
        for code in codes {
            let descriptor = match declared.get(code) {
                Some(descriptor) => descriptor,
                None => {
                    if strict {
                        return Err(EavError::UnknownAttribute {
                            entity: entity.entity_code.clone(),
                            code: code.clone(),
                        });
                    }
                    continue;
                }
            };
            if !descriptor.applies_to_set(set_id) {
                continue;
            }
            if !include_static && descriptor.is_static {
                continue;
            }
            attributes.insert(code.clone(), Arc::clone(descriptor));
        }

        Ok(LoadedAttributes { attributes })
    }

    /// The full declared descriptor map for an entity type (cached).
    pub async fn descriptors_for(&self, entity: &EntityType) -> Result<Arc<DescriptorMap>> {
        {
            let cache = self.cache.read().await;
            if let Some(map) = cache.get(&entity.id) {
                return Ok(Arc::clone(map));
            }
        }

        debug!(entity_code = %entity.entity_code, "attribute metadata cache miss");
        let rows = self
            .backend
            .select(
                ATTRIBUTES_TABLE,
                &Filter::eq("entity_id", entity.id as i64),
            )
            .await?;

        let mut map = DescriptorMap::new();
        for (row_id, row) in rows {
            let descriptor = AttributeDescriptor::from_row(row_id, &row)?;
            map.insert(descriptor.attribute_code.clone(), Arc::new(descriptor));
        }

        let map = Arc::new(map);
        self.cache
            .write()
            .await
            .entry(entity.id)
            .or_insert_with(|| Arc::clone(&map));
        Ok(map)
    }

    /// Drop the cached descriptors for one entity type, forcing a reload on
    /// next use. Called after attribute registration.
    pub async fn invalidate(&self, entity_id: u64) {
        self.cache.write().await.remove(&entity_id);
    }
}

/// An ordered (by attribute code) mapping of resolved descriptors, the
/// working set of one save operation.
#[derive(Debug, Clone)]
pub struct LoadedAttributes {
    attributes: DescriptorMap,
}

impl LoadedAttributes {
    pub fn get(&self, code: &str) -> Option<&Arc<AttributeDescriptor>> {
        self.attributes.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<AttributeDescriptor>)> {
        self.attributes.iter()
    }

    pub fn codes(&self) -> impl Iterator<Item = &String> {
        self.attributes.keys()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Codes of the static-flagged descriptors: the physical columns of the
    /// main table, i.e. the non-EAV bucket of a write.
    pub fn main_table_codes(&self) -> Vec<String> {
        self.attributes
            .values()
            .filter(|descriptor| descriptor.is_static)
            .map(|descriptor| descriptor.attribute_code.clone())
            .collect()
    }

    /// Apply every descriptor's rules to the corresponding value,
    /// accumulating all violations so a caller can surface every failing
    /// field in one pass.
    pub fn validate(&self, values: &Row) -> Result<()> {
        let mut failures = Vec::new();
        for (code, descriptor) in &self.attributes {
            let value = values.get(code).unwrap_or(&Value::Null);
            failures.extend(apply_rules(code, descriptor.rules(), value));
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EavError::ValidationFailed(failures))
        }
    }
}
