#![allow(dead_code)]

use eavdb::{
    AttributeDefinition, Column, ColumnType, EavDatabase, EntityDefinition, EntityRecord, Filter,
    ValueType,
};

/// A `product` entity type with static `name`/`sku` columns and dynamic
/// `color` (text) and `weight` (decimal) attributes.
pub async fn catalog_db() -> EavDatabase {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let db = EavDatabase::new().await.unwrap();

    db.register_entity(
        EntityDefinition::new("product", "products")
            .name("Product")
            .class("catalog::Product")
            .column(Column::new("name", ColumnType::Text).not_null())
            .column(Column::new("sku", ColumnType::Text).unique()),
    )
    .await
    .unwrap();

    db.add_attribute(
        "product",
        AttributeDefinition::new("name", ValueType::Varchar)
            .static_storage()
            .rules("required|max:255"),
    )
    .await
    .unwrap();
    db.add_attribute(
        "product",
        AttributeDefinition::new("sku", ValueType::Varchar).static_storage(),
    )
    .await
    .unwrap();
    db.add_attribute("product", AttributeDefinition::new("color", ValueType::Text))
        .await
        .unwrap();
    db.add_attribute(
        "product",
        AttributeDefinition::new("weight", ValueType::Decimal).rules("numeric|min:0"),
    )
    .await
    .unwrap();

    db
}

pub fn widget(db: &EavDatabase) -> EntityRecord {
    let mut record = db.new_record("product");
    record.set("name", "Widget").set("sku", "W-1").set("color", "red");
    record
}

/// Backing-store id of a declared attribute, for asserting on value rows.
pub async fn attribute_id(db: &EavDatabase, entity_code: &str, attribute_code: &str) -> u64 {
    let entity = db.registry().resolve_by_code(entity_code).await.unwrap();
    let rows = db
        .backend()
        .select(
            "eav_attributes",
            &Filter::and(vec![
                Filter::eq("entity_id", entity.id as i64),
                Filter::eq("attribute_code", attribute_code),
            ]),
        )
        .await
        .unwrap();
    rows.into_iter().next().expect("attribute declared").0
}
