use std::sync::Arc;

use tracing::debug;

use crate::core::{Column, ColumnType, EavError, Result, Value, ValueType};
use crate::engine::{EntityRecord, LifecycleHook, PersistenceEngine, SaveOutcome};
use crate::metadata::{
    AttributeLoader, AttributeSet, EntityRegistry, EntityType, ATTRIBUTES_TABLE,
    ATTRIBUTE_SETS_TABLE, ENTITIES_TABLE,
};
use crate::storage::{Filter, MemoryBackend, TableSchema};
use crate::validation::parse_rules;

/// Declaration of a new entity type: metadata row plus the physical layout
/// of its main table.
#[derive(Debug, Clone)]
pub struct EntityDefinition {
    pub entity_code: String,
    pub entity_name: String,
    pub entity_class: String,
    pub entity_table: String,
    pub entity_desc: Option<String>,
    pub static_columns: Vec<Column>,
    pub with_timestamps: bool,
    pub is_flat_enabled: bool,
    pub relation_entity_ids: Vec<u64>,
}

impl EntityDefinition {
    pub fn new(entity_code: impl Into<String>, entity_table: impl Into<String>) -> Self {
        let entity_code = entity_code.into();
        Self {
            entity_name: entity_code.clone(),
            entity_class: entity_code.clone(),
            entity_code,
            entity_table: entity_table.into(),
            entity_desc: None,
            static_columns: Vec::new(),
            with_timestamps: false,
            is_flat_enabled: false,
            relation_entity_ids: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.entity_name = name.into();
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.entity_class = class.into();
        self
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.entity_desc = Some(desc.into());
        self
    }

    /// Declare a physical main-table column backing a static attribute.
    pub fn column(mut self, column: Column) -> Self {
        self.static_columns.push(column);
        self
    }

    pub fn with_timestamps(mut self) -> Self {
        self.with_timestamps = true;
        self
    }

    pub fn flat_enabled(mut self) -> Self {
        self.is_flat_enabled = true;
        self
    }

    pub fn relations(mut self, ids: Vec<u64>) -> Self {
        self.relation_entity_ids = ids;
        self
    }
}

/// Declaration of one attribute of an entity type.
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    pub attribute_code: String,
    pub value_type: ValueType,
    pub is_static: bool,
    pub validation_rules: Option<String>,
    pub attribute_set_id: Option<u64>,
    pub frontend_label: Option<String>,
}

impl AttributeDefinition {
    pub fn new(attribute_code: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            attribute_code: attribute_code.into(),
            value_type,
            is_static: false,
            validation_rules: None,
            attribute_set_id: None,
            frontend_label: None,
        }
    }

    /// Mark the attribute as physically stored on the main table.
    pub fn static_storage(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn rules(mut self, expr: impl Into<String>) -> Self {
        self.validation_rules = Some(expr.into());
        self
    }

    pub fn in_set(mut self, set_id: u64) -> Self {
        self.attribute_set_id = Some(set_id);
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.frontend_label = Some(label.into());
        self
    }
}

/// Facade wiring the backing store, metadata services and the persistence
/// engine together, and owning schema installation.
pub struct EavDatabase {
    backend: Arc<MemoryBackend>,
    registry: Arc<EntityRegistry>,
    loader: Arc<AttributeLoader>,
    engine: PersistenceEngine,
}

impl EavDatabase {
    /// Create a database with the EAV metadata tables installed.
    pub async fn new() -> Result<Self> {
        let backend = Arc::new(MemoryBackend::new());
        Self::install(&backend).await?;

        let registry = Arc::new(EntityRegistry::new(Arc::clone(&backend)));
        let loader = Arc::new(AttributeLoader::new(Arc::clone(&backend)));
        let engine = PersistenceEngine::new(
            Arc::clone(&backend),
            Arc::clone(&registry),
            Arc::clone(&loader),
        );

        Ok(Self {
            backend,
            registry,
            loader,
            engine,
        })
    }

    async fn install(backend: &MemoryBackend) -> Result<()> {
        backend
            .create_table(TableSchema::new(
                ENTITIES_TABLE,
                vec![
                    Column::new("entity_code", ColumnType::Text).not_null().unique(),
                    Column::new("entity_name", ColumnType::Text).not_null().unique(),
                    Column::new("entity_class", ColumnType::Text).not_null(),
                    Column::new("entity_table", ColumnType::Text).not_null().unique(),
                    Column::new("default_attribute_set_id", ColumnType::Integer).not_null(),
                    Column::new("additional_attribute_table", ColumnType::Text),
                    Column::new("relation_entity_ids", ColumnType::Text),
                    Column::new("is_flat_enabled", ColumnType::Boolean),
                    Column::new("entity_desc", ColumnType::Text),
                ],
            ))
            .await?;

        backend
            .create_table(TableSchema::new(
                ATTRIBUTE_SETS_TABLE,
                vec![
                    Column::new("entity_id", ColumnType::Integer).not_null(),
                    Column::new("set_name", ColumnType::Text).not_null(),
                ],
            ))
            .await?;

        backend
            .create_table(TableSchema::new(
                ATTRIBUTES_TABLE,
                vec![
                    Column::new("entity_id", ColumnType::Integer).not_null(),
                    Column::new("attribute_code", ColumnType::Text).not_null(),
                    Column::new("value_type", ColumnType::Text).not_null(),
                    Column::new("is_static", ColumnType::Boolean),
                    Column::new("validation_rules", ColumnType::Text),
                    Column::new("attribute_set_id", ColumnType::Integer),
                    Column::new("frontend_label", ColumnType::Text),
                ],
            ))
            .await
    }

    // ------------------------------------------------------------------
    // Schema registration
    // ------------------------------------------------------------------

    /// Register an entity type: metadata row, default attribute set, main
    /// table and the five per-value-type tables.
    pub async fn register_entity(&self, definition: EntityDefinition) -> Result<Arc<EntityType>> {
        let existing = self
            .backend
            .select(
                ENTITIES_TABLE,
                &Filter::eq("entity_code", definition.entity_code.as_str()),
            )
            .await?;
        if !existing.is_empty() {
            return Err(EavError::ConstraintViolation(format!(
                "Entity type '{}' is already registered",
                definition.entity_code
            )));
        }

        // The entity row and its default set reference each other, so the
        // row is inserted with a placeholder and patched after the set
        // exists.
        let entity = EntityType {
            id: 0,
            entity_code: definition.entity_code.clone(),
            entity_name: definition.entity_name.clone(),
            entity_class: definition.entity_class.clone(),
            entity_table: definition.entity_table.clone(),
            default_attribute_set_id: 0,
            additional_attribute_table: None,
            relation_entity_ids: definition.relation_entity_ids.clone(),
            is_flat_enabled: definition.is_flat_enabled,
            entity_desc: definition.entity_desc.clone(),
        };
        let entity_id = self
            .backend
            .insert_autocommit(ENTITIES_TABLE, entity.to_row())
            .await?;

        let default_set = AttributeSet {
            id: 0,
            entity_id,
            set_name: "Default".into(),
        };
        let set_id = self
            .backend
            .insert_autocommit(ATTRIBUTE_SETS_TABLE, default_set.to_row())
            .await?;

        let mut patch = crate::core::Row::new();
        patch.insert(
            "default_attribute_set_id".into(),
            Value::Int(set_id as i64),
        );
        self.backend
            .update_autocommit(ENTITIES_TABLE, entity_id, &patch)
            .await?;

        self.create_entity_tables(&definition).await?;

        debug!(entity_code = %definition.entity_code, entity_id, "entity type registered");
        self.registry.resolve_by_id(entity_id).await
    }

    async fn create_entity_tables(&self, definition: &EntityDefinition) -> Result<()> {
        let mut columns = vec![
            Column::new("entity_type_id", ColumnType::Integer),
            Column::new("attribute_set_id", ColumnType::Integer),
        ];
        columns.extend(definition.static_columns.iter().cloned());
        if definition.with_timestamps {
            columns.push(Column::new("created_at", ColumnType::Datetime));
            columns.push(Column::new("updated_at", ColumnType::Datetime));
        }
        self.backend
            .create_table(TableSchema::new(definition.entity_table.clone(), columns))
            .await?;

        for value_type in ValueType::ALL {
            let table = format!(
                "{}_{}",
                definition.entity_table,
                value_type.table_suffix()
            );
            self.backend
                .create_table(TableSchema::new(
                    table,
                    vec![
                        Column::new("entity_id", ColumnType::Integer).not_null(),
                        Column::new("attribute_id", ColumnType::Integer).not_null(),
                        Column::new("value", value_type.column_type()),
                    ],
                ))
                .await?;
        }
        Ok(())
    }

    /// Declare an attribute for an entity type. A static attribute must be
    /// backed by an existing main-table column.
    pub async fn add_attribute(
        &self,
        entity_code: &str,
        definition: AttributeDefinition,
    ) -> Result<u64> {
        let entity = self.registry.resolve_by_code(entity_code).await?;

        let duplicate = self
            .backend
            .select(
                ATTRIBUTES_TABLE,
                &Filter::and(vec![
                    Filter::eq("entity_id", entity.id as i64),
                    Filter::eq("attribute_code", definition.attribute_code.as_str()),
                ]),
            )
            .await?;
        if !duplicate.is_empty() {
            return Err(EavError::ConstraintViolation(format!(
                "Attribute '{}' is already declared for entity type '{}'",
                definition.attribute_code, entity_code
            )));
        }

        if definition.is_static {
            let backed = self
                .backend
                .has_column(&entity.entity_table, &definition.attribute_code)
                .await?;
            if !backed {
                return Err(EavError::ColumnNotFound(
                    definition.attribute_code.clone(),
                    entity.entity_table.clone(),
                ));
            }
        }

        // Fail fast on malformed rule expressions instead of at first save.
        if let Some(expr) = &definition.validation_rules {
            parse_rules(expr)?;
        }

        let mut row = crate::core::Row::new();
        row.insert("entity_id".into(), Value::Int(entity.id as i64));
        row.insert(
            "attribute_code".into(),
            definition.attribute_code.as_str().into(),
        );
        row.insert(
            "value_type".into(),
            definition.value_type.table_suffix().into(),
        );
        row.insert("is_static".into(), Value::Bool(definition.is_static));
        row.insert(
            "validation_rules".into(),
            definition.validation_rules.clone().into(),
        );
        row.insert(
            "attribute_set_id".into(),
            definition.attribute_set_id.map(|id| id as i64).into(),
        );
        row.insert(
            "frontend_label".into(),
            definition.frontend_label.clone().into(),
        );
        let attribute_id = self.backend.insert_autocommit(ATTRIBUTES_TABLE, row).await?;

        self.loader.invalidate(entity.id).await;
        Ok(attribute_id)
    }

    pub async fn add_attribute_set(&self, entity_code: &str, set_name: &str) -> Result<u64> {
        let entity = self.registry.resolve_by_code(entity_code).await?;
        let set = AttributeSet {
            id: 0,
            entity_id: entity.id,
            set_name: set_name.into(),
        };
        self.backend
            .insert_autocommit(ATTRIBUTE_SETS_TABLE, set.to_row())
            .await
    }

    /// Materialize the flat counterpart of an entity type's main table: one
    /// physical column per declared attribute.
    pub async fn build_flat_table(&self, entity_code: &str) -> Result<()> {
        let entity = self.registry.resolve_by_code(entity_code).await?;
        let main_schema = self.backend.table_schema(&entity.entity_table).await?;
        let descriptors = self.loader.descriptors_for(&entity).await?;

        let mut columns = vec![
            Column::new("entity_type_id", ColumnType::Integer),
            Column::new("attribute_set_id", ColumnType::Integer),
        ];
        if main_schema.schema().has_column("created_at") {
            columns.push(Column::new("created_at", ColumnType::Datetime));
            columns.push(Column::new("updated_at", ColumnType::Datetime));
        }
        for descriptor in descriptors.values() {
            let column = match main_schema.schema().column(&descriptor.attribute_code) {
                // Static attributes keep their physical column definition.
                Some(column) => column.clone(),
                None => Column::new(
                    descriptor.attribute_code.clone(),
                    descriptor.value_type.column_type(),
                ),
            };
            columns.push(column);
        }

        self.backend
            .create_table(TableSchema::new(entity.flat_table(), columns))
            .await
    }

    // ------------------------------------------------------------------
    // Records
    // ------------------------------------------------------------------

    pub fn new_record(&self, entity_code: &str) -> EntityRecord {
        EntityRecord::new(entity_code)
    }

    pub async fn save(&self, record: &mut EntityRecord) -> Result<SaveOutcome> {
        self.engine.save(record).await
    }

    pub async fn register_hook(&self, hook: Arc<dyn LifecycleHook>) {
        self.engine.register_hook(hook).await;
    }

    /// Route all subsequent reads and writes for an entity type through the
    /// flat table (or back). Process-wide effect.
    pub async fn set_flat_mode(&self, entity_code: &str, enabled: bool) -> Result<()> {
        let entity = self.registry.resolve_by_code(entity_code).await?;
        self.registry.set_flat_mode(entity.id, enabled).await;
        Ok(())
    }

    /// Load a persisted record by id: the main row merged with its
    /// attribute-value rows, or the whole flat row when flat mode is on.
    pub async fn load_record(
        &self,
        entity_code: &str,
        entity_id: u64,
    ) -> Result<Option<EntityRecord>> {
        let entity = self.registry.resolve_by_code(entity_code).await?;
        let table = self.registry.table_name(&entity).await;

        let Some(main_row) = self.backend.get(&table, entity_id).await? else {
            return Ok(None);
        };

        let mut record = EntityRecord::new(entity_code);
        for (code, value) in &main_row {
            if !value.is_null() {
                record.set(code.clone(), value.clone());
            }
        }

        if !self.registry.use_flat(&entity).await {
            let descriptors = self.loader.descriptors_for(&entity).await?;
            for descriptor in descriptors.values() {
                if descriptor.is_static {
                    continue;
                }
                let rows = self
                    .backend
                    .select(
                        &entity.value_table(descriptor.value_type),
                        &Filter::and(vec![
                            Filter::eq("entity_id", entity_id as i64),
                            Filter::eq("attribute_id", descriptor.id as i64),
                        ]),
                    )
                    .await?;
                if let Some((_, row)) = rows.into_iter().next() {
                    if let Some(value) = row.get("value") {
                        record.set(descriptor.attribute_code.clone(), value.clone());
                    }
                }
            }
        }

        record.set_id(entity_id);
        record.sync_persisted();
        Ok(Some(record))
    }

    // ------------------------------------------------------------------
    // Service handles (mainly for tests and advanced wiring)
    // ------------------------------------------------------------------

    pub fn backend(&self) -> &Arc<MemoryBackend> {
        &self.backend
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    pub fn loader(&self) -> &Arc<AttributeLoader> {
        &self.loader
    }

    pub fn engine(&self) -> &PersistenceEngine {
        &self.engine
    }
}
