use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::core::{EavError, Result, Row, Value};
use crate::metadata::{AttributeLoader, EntityRegistry, EntityType, LoadedAttributes};
use crate::storage::MemoryBackend;
use crate::transaction::Transaction;

use super::hooks::{HookChain, HookDecision, LifecycleHook, LifecyclePhase};
use super::record::{is_reserved, EntityRecord};
use super::values::AttributeValueStore;

/// How a save operation ended. A lifecycle veto is a normal outcome, not an
/// error: the operation was declined and nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The dirty set was empty; no transaction was opened.
    Unchanged,
    Vetoed {
        phase: LifecyclePhase,
        reason: String,
    },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

/// The attribute-aware save orchestrator.
///
/// Splits a record's fields into main-table columns and EAV-routed
/// attributes, sequences the writes inside one backing-store transaction and
/// fires the lifecycle phase chain around each step. When flat mode is
/// active for the entity type the whole-row path is taken instead and no
/// splitting occurs.
pub struct PersistenceEngine {
    backend: Arc<MemoryBackend>,
    registry: Arc<EntityRegistry>,
    loader: Arc<AttributeLoader>,
    values: AttributeValueStore,
    hooks: RwLock<HookChain>,
}

impl PersistenceEngine {
    pub fn new(
        backend: Arc<MemoryBackend>,
        registry: Arc<EntityRegistry>,
        loader: Arc<AttributeLoader>,
    ) -> Self {
        Self {
            values: AttributeValueStore::new(Arc::clone(&backend)),
            backend,
            registry,
            loader,
            hooks: RwLock::new(HookChain::new()),
        }
    }

    pub async fn register_hook(&self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.write().await.register(hook);
    }

    /// Save a record: insert when it has never been persisted, update
    /// otherwise. Flat-routed entity types bypass attribute splitting.
    #[instrument(skip_all, fields(entity = %record.entity_code()))]
    pub async fn save(&self, record: &mut EntityRecord) -> Result<SaveOutcome> {
        let entity = self.registry.resolve_by_code(record.entity_code()).await?;

        if self.registry.use_flat(&entity).await {
            return if record.exists() {
                self.update_flat(record, &entity).await
            } else {
                self.insert_flat(record, &entity).await
            };
        }

        if record.exists() {
            self.perform_update(record, &entity).await
        } else {
            self.perform_insert(record, &entity).await
        }
    }

    // ------------------------------------------------------------------
    // Insert path
    // ------------------------------------------------------------------

    async fn perform_insert(
        &self,
        record: &mut EntityRecord,
        entity: &EntityType,
    ) -> Result<SaveOutcome> {
        let table = self.registry.table_name(entity).await;
        self.assign_defaults(record, entity);
        self.touch_timestamps(record, &table, true).await?;

        // Classification and validation happen before the transaction opens;
        // a failure here leaves no trace in the store.
        let codes = attribute_codes(record);
        let loaded = self
            .loader
            .load(entity, &codes, true, true, record.attribute_set_id())
            .await?;
        loaded.validate(record.attributes())?;

        let prior_id = record.id();
        let prior_exists = record.exists();

        let mut txn = self.backend.begin().await;
        let outcome = self
            .insert_in_txn(&mut txn, record, entity, &table, &loaded)
            .await;

        match outcome {
            Ok(SaveOutcome::Saved) => {
                self.backend.commit(txn).await?;
                record.sync_persisted();
                debug!(id = record.id(), "record created");
                Ok(SaveOutcome::Saved)
            }
            Ok(vetoed) => {
                self.backend.rollback(txn).await?;
                record.reset_identity(prior_id, prior_exists);
                Ok(vetoed)
            }
            Err(err) => {
                self.backend.rollback(txn).await?;
                record.reset_identity(prior_id, prior_exists);
                Err(err)
            }
        }
    }

    async fn insert_in_txn(
        &self,
        txn: &mut Transaction,
        record: &mut EntityRecord,
        entity: &EntityType,
        table: &str,
        loaded: &LoadedAttributes,
    ) -> Result<SaveOutcome> {
        if let Some(vetoed) = self.gate(LifecyclePhase::Creating, record).await {
            return Ok(vetoed);
        }
        if let Some(vetoed) = self.gate(LifecyclePhase::CreatingMain, record).await {
            return Ok(vetoed);
        }

        let main_row = main_bucket(record, &loaded.main_table_codes());
        let entity_id = self.backend.insert(txn, table, main_row).await?;
        record.set_id(entity_id);
        record.mark_exists();
        self.notify(LifecyclePhase::CreatedMain, record).await;

        for (code, attribute) in loaded.iter() {
            if attribute.is_static {
                continue;
            }
            let value = record.get(code).cloned().unwrap_or(Value::Null);
            self.values
                .insert_attribute(txn, entity, attribute, &value, entity_id)
                .await?;
        }

        self.notify(LifecyclePhase::Created, record).await;
        Ok(SaveOutcome::Saved)
    }

    // ------------------------------------------------------------------
    // Update path
    // ------------------------------------------------------------------

    async fn perform_update(
        &self,
        record: &mut EntityRecord,
        entity: &EntityType,
    ) -> Result<SaveOutcome> {
        let entity_id = record
            .id()
            .ok_or_else(|| EavError::Storage("Update of a record without an id".into()))?;

        // The no-op check runs before the timestamp touch, so a clean record
        // never opens a transaction.
        if !record.is_dirty() {
            return Ok(SaveOutcome::Unchanged);
        }

        let table = self.registry.table_name(entity).await;
        self.touch_timestamps(record, &table, false).await?;
        let dirty = record.dirty();

        let codes: Vec<String> = dirty
            .keys()
            .filter(|code| !is_reserved(code))
            .cloned()
            .collect();
        let loaded = self
            .loader
            .load(entity, &codes, true, false, record.attribute_set_id())
            .await?;
        loaded.validate(&dirty)?;

        let mut txn = self.backend.begin().await;
        let outcome = self
            .update_in_txn(&mut txn, record, entity, &table, entity_id, &dirty, &loaded)
            .await;

        match outcome {
            Ok(SaveOutcome::Saved) => {
                self.backend.commit(txn).await?;
                record.sync_persisted();
                debug!(id = entity_id, "record updated");
                Ok(SaveOutcome::Saved)
            }
            Ok(vetoed) => {
                self.backend.rollback(txn).await?;
                Ok(vetoed)
            }
            Err(err) => {
                self.backend.rollback(txn).await?;
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn update_in_txn(
        &self,
        txn: &mut Transaction,
        record: &EntityRecord,
        entity: &EntityType,
        table: &str,
        entity_id: u64,
        dirty: &Row,
        loaded: &LoadedAttributes,
    ) -> Result<SaveOutcome> {
        if let Some(vetoed) = self.gate(LifecyclePhase::Updating, record).await {
            return Ok(vetoed);
        }
        if let Some(vetoed) = self.gate(LifecyclePhase::UpdatingMain, record).await {
            return Ok(vetoed);
        }

        let main_changes = main_subset(dirty, &loaded.main_table_codes());
        if !main_changes.is_empty() {
            self.backend.update(txn, table, entity_id, &main_changes).await?;
        }
        self.notify(LifecyclePhase::UpdatedMain, record).await;

        for (code, attribute) in loaded.iter() {
            if attribute.is_static {
                continue;
            }
            let value = dirty.get(code).cloned().unwrap_or(Value::Null);
            self.values
                .update_attribute(txn, entity, attribute, &value, entity_id)
                .await?;
        }

        // Fires exactly once, inside the transaction's success branch.
        self.notify(LifecyclePhase::Updated, record).await;
        Ok(SaveOutcome::Saved)
    }

    // ------------------------------------------------------------------
    // Flat route: plain whole-row writes, no attribute splitting
    // ------------------------------------------------------------------

    async fn insert_flat(
        &self,
        record: &mut EntityRecord,
        entity: &EntityType,
    ) -> Result<SaveOutcome> {
        let table = self.registry.table_name(entity).await;
        self.assign_defaults(record, entity);
        self.touch_timestamps(record, &table, true).await?;

        if let Some(vetoed) = self.gate(LifecyclePhase::Creating, record).await {
            return Ok(vetoed);
        }

        let mut txn = self.backend.begin().await;
        match self
            .backend
            .insert(&mut txn, &table, record.attributes().clone())
            .await
        {
            Ok(entity_id) => {
                self.backend.commit(txn).await?;
                record.set_id(entity_id);
                record.sync_persisted();
                self.notify(LifecyclePhase::Created, record).await;
                debug!(id = entity_id, table = %table, "flat record created");
                Ok(SaveOutcome::Saved)
            }
            Err(err) => {
                self.backend.rollback(txn).await?;
                Err(err)
            }
        }
    }

    async fn update_flat(
        &self,
        record: &mut EntityRecord,
        entity: &EntityType,
    ) -> Result<SaveOutcome> {
        let entity_id = record
            .id()
            .ok_or_else(|| EavError::Storage("Update of a record without an id".into()))?;
        if !record.is_dirty() {
            return Ok(SaveOutcome::Unchanged);
        }

        let table = self.registry.table_name(entity).await;
        self.touch_timestamps(record, &table, false).await?;

        if let Some(vetoed) = self.gate(LifecyclePhase::Updating, record).await {
            return Ok(vetoed);
        }

        let dirty = record.dirty();
        let mut txn = self.backend.begin().await;
        match self.backend.update(&mut txn, &table, entity_id, &dirty).await {
            Ok(()) => {
                self.backend.commit(txn).await?;
                record.sync_persisted();
                self.notify(LifecyclePhase::Updated, record).await;
                Ok(SaveOutcome::Saved)
            }
            Err(err) => {
                self.backend.rollback(txn).await?;
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Shared steps
    // ------------------------------------------------------------------

    /// Default attribute set and the shared entity-type id. A record that
    /// already carries an entity-type id keeps it: entity views share one
    /// physical identity space.
    fn assign_defaults(&self, record: &mut EntityRecord, entity: &EntityType) {
        if record.attribute_set_id().is_none() {
            record.set(
                "attribute_set_id",
                Value::Int(entity.default_attribute_set_id as i64),
            );
        }
        if record.entity_type_id().is_none() {
            record.set("entity_type_id", Value::Int(entity.id as i64));
        }
    }

    /// Maintain `created_at`/`updated_at` when the target table carries
    /// those columns.
    async fn touch_timestamps(
        &self,
        record: &mut EntityRecord,
        table: &str,
        creating: bool,
    ) -> Result<()> {
        if !self.backend.has_column(table, "updated_at").await? {
            return Ok(());
        }
        let now = Value::Datetime(Utc::now());
        if creating {
            record.set("created_at", now.clone());
        }
        record.set("updated_at", now);
        Ok(())
    }

    /// Fire a vetoable phase; an abort becomes a `Vetoed` outcome.
    async fn gate(&self, phase: LifecyclePhase, record: &EntityRecord) -> Option<SaveOutcome> {
        match self.hooks.read().await.fire(phase, record).await {
            HookDecision::Proceed => None,
            HookDecision::Abort(reason) => {
                debug!(%phase, %reason, "save vetoed");
                Some(SaveOutcome::Vetoed { phase, reason })
            }
        }
    }

    async fn notify(&self, phase: LifecyclePhase, record: &EntityRecord) {
        self.hooks.read().await.fire(phase, record).await;
    }
}

/// Codes of the record's declared attributes: everything except the
/// engine-managed main-table columns.
fn attribute_codes(record: &EntityRecord) -> Vec<String> {
    record
        .attributes()
        .keys()
        .filter(|code| !is_reserved(code))
        .cloned()
        .collect()
}

/// The main-table bucket of an insert: static attribute values plus the
/// engine-managed columns present on the record.
fn main_bucket(record: &EntityRecord, main_codes: &[String]) -> Row {
    record
        .attributes()
        .iter()
        .filter(|(code, _)| is_reserved(code) || main_codes.contains(code))
        .map(|(code, value)| (code.clone(), value.clone()))
        .collect()
}

/// The main-table subset of a dirty set.
fn main_subset(dirty: &Row, main_codes: &[String]) -> Row {
    dirty
        .iter()
        .filter(|(code, _)| is_reserved(code) || main_codes.contains(code))
        .map(|(code, value)| (code.clone(), value.clone()))
        .collect()
}
