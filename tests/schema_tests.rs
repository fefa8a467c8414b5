//! Schema registration tests: entity-type tables, attribute declarations
//! and the flat-table build.

mod common;

use eavdb::{AttributeDefinition, Column, ColumnType, EavError, EntityDefinition, ValueType};

#[tokio::test]
async fn register_entity_creates_the_main_and_value_tables() {
    let db = common::catalog_db().await;

    assert!(db.backend().table_exists("products").await);
    for suffix in ["varchar", "int", "decimal", "datetime", "text"] {
        let table = format!("products_{}", suffix);
        assert!(db.backend().table_exists(&table).await, "missing {}", table);
    }
}

#[tokio::test]
async fn value_tables_carry_the_linking_columns() {
    let db = common::catalog_db().await;

    assert!(db.backend().has_column("products_text", "entity_id").await.unwrap());
    assert!(db.backend().has_column("products_text", "attribute_id").await.unwrap());
    assert!(db.backend().has_column("products_text", "value").await.unwrap());
}

#[tokio::test]
async fn duplicate_entity_registration_is_rejected() {
    let db = common::catalog_db().await;

    let err = db
        .register_entity(EntityDefinition::new("product", "products2"))
        .await
        .unwrap_err();
    assert!(matches!(err, EavError::ConstraintViolation(_)));
}

#[tokio::test]
async fn duplicate_attribute_declaration_is_rejected() {
    let db = common::catalog_db().await;

    let err = db
        .add_attribute("product", AttributeDefinition::new("color", ValueType::Varchar))
        .await
        .unwrap_err();
    assert!(matches!(err, EavError::ConstraintViolation(_)));
}

#[tokio::test]
async fn static_attribute_requires_a_backing_column() {
    let db = common::catalog_db().await;

    let err = db
        .add_attribute(
            "product",
            AttributeDefinition::new("brand", ValueType::Varchar).static_storage(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EavError::ColumnNotFound(_, _)));
}

#[tokio::test]
async fn malformed_rule_expression_fails_at_declaration_time() {
    let db = common::catalog_db().await;

    let err = db
        .add_attribute(
            "product",
            AttributeDefinition::new("size", ValueType::Varchar).rules("required|frobnicate"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EavError::ConfigurationMissing(_)));
}

#[tokio::test]
async fn flat_table_mixes_physical_and_derived_columns() {
    let db = common::catalog_db().await;
    db.build_flat_table("product").await.unwrap();

    assert!(db.backend().table_exists("products_flat").await);
    for column in ["entity_type_id", "attribute_set_id", "name", "sku", "color", "weight"] {
        assert!(
            db.backend().has_column("products_flat", column).await.unwrap(),
            "missing column {}",
            column
        );
    }
}

#[tokio::test]
async fn timestamped_entity_gets_timestamp_columns_in_both_tables() {
    let db = eavdb::EavDatabase::new().await.unwrap();
    db.register_entity(
        EntityDefinition::new("order", "orders")
            .column(Column::new("total", ColumnType::Decimal))
            .with_timestamps(),
    )
    .await
    .unwrap();
    db.add_attribute(
        "order",
        AttributeDefinition::new("total", ValueType::Decimal).static_storage(),
    )
    .await
    .unwrap();

    assert!(db.backend().has_column("orders", "created_at").await.unwrap());

    db.build_flat_table("order").await.unwrap();
    assert!(db.backend().has_column("orders_flat", "updated_at").await.unwrap());
}
