//! Update-path tests: dirty tracking, the upsert semantics of value rows,
//! no-op detection and lifecycle ordering.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use eavdb::{
    AttributeValueStore, EntityRecord, Filter, FnHook, HookDecision, LifecyclePhase, SaveOutcome,
    Value,
};

async fn saved_widget(db: &eavdb::EavDatabase) -> EntityRecord {
    let mut record = common::widget(db);
    db.save(&mut record).await.unwrap();
    record
}

#[tokio::test]
async fn dynamic_only_update_leaves_the_main_row_alone() {
    let db = common::catalog_db().await;
    let record = saved_widget(&db).await;
    let id = record.id().unwrap();

    let mut loaded = db.load_record("product", id).await.unwrap().unwrap();
    loaded.set("color", "blue");
    let outcome = db.save(&mut loaded).await.unwrap();
    assert!(outcome.is_saved());

    // Still exactly one value row, updated in place.
    let rows = db
        .backend()
        .select("products_text", &Filter::eq("entity_id", id as i64))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1.get("value"), Some(&Value::Text("blue".into())));

    let main = db.backend().get("products", id).await.unwrap().unwrap();
    assert_eq!(main.get("name"), Some(&Value::Text("Widget".into())));
    assert_eq!(db.backend().row_count("products").await.unwrap(), 1);
}

#[tokio::test]
async fn static_only_update_touches_only_the_main_row() {
    let db = common::catalog_db().await;
    let record = saved_widget(&db).await;
    let id = record.id().unwrap();

    let mut loaded = db.load_record("product", id).await.unwrap().unwrap();
    loaded.set("name", "Widget Mk2");
    db.save(&mut loaded).await.unwrap();

    let main = db.backend().get("products", id).await.unwrap().unwrap();
    assert_eq!(main.get("name"), Some(&Value::Text("Widget Mk2".into())));

    let rows = db
        .backend()
        .select("products_text", &Filter::eq("entity_id", id as i64))
        .await
        .unwrap();
    assert_eq!(rows[0].1.get("value"), Some(&Value::Text("red".into())));
}

#[tokio::test]
async fn clean_record_save_is_a_no_op() {
    let db = common::catalog_db().await;
    let record = saved_widget(&db).await;

    let mut loaded = db
        .load_record("product", record.id().unwrap())
        .await
        .unwrap()
        .unwrap();
    let outcome = db.save(&mut loaded).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Unchanged);
}

#[tokio::test]
async fn setting_the_same_value_back_stays_clean() {
    let db = common::catalog_db().await;
    let record = saved_widget(&db).await;

    let mut loaded = db
        .load_record("product", record.id().unwrap())
        .await
        .unwrap()
        .unwrap();
    loaded.set("color", "red");
    let outcome = db.save(&mut loaded).await.unwrap();
    assert_eq!(outcome, SaveOutcome::Unchanged);
}

#[tokio::test]
async fn nulling_an_attribute_deletes_its_value_row() {
    let db = common::catalog_db().await;
    let record = saved_widget(&db).await;
    let id = record.id().unwrap();

    let mut loaded = db.load_record("product", id).await.unwrap().unwrap();
    loaded.set("color", Value::Null);
    db.save(&mut loaded).await.unwrap();

    assert_eq!(db.backend().row_count("products_text").await.unwrap(), 0);
}

#[tokio::test]
async fn update_inserts_a_value_row_that_did_not_exist_yet() {
    let db = common::catalog_db().await;
    let mut record = db.new_record("product");
    record.set("name", "Widget").set("sku", "W-1");
    db.save(&mut record).await.unwrap();
    assert_eq!(db.backend().row_count("products_decimal").await.unwrap(), 0);

    record.set("weight", 2.5f64);
    db.save(&mut record).await.unwrap();

    let rows = db
        .backend()
        .select(
            "products_decimal",
            &Filter::eq("entity_id", record.id().unwrap() as i64),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1.get("value"), Some(&Value::Decimal(2.5)));
}

#[tokio::test]
async fn upsert_twice_with_the_same_value_keeps_one_row() {
    let db = common::catalog_db().await;
    let record = saved_widget(&db).await;
    let id = record.id().unwrap();

    let entity = db.registry().resolve_by_code("product").await.unwrap();
    let loaded = db
        .loader()
        .load(&entity, &["color".to_string()], true, true, None)
        .await
        .unwrap();
    let color = loaded.get("color").unwrap();

    let store = AttributeValueStore::new(Arc::clone(db.backend()));
    for _ in 0..2 {
        let mut txn = db.backend().begin().await;
        store
            .update_attribute(&mut txn, &entity, color, &Value::Text("red".into()), id)
            .await
            .unwrap();
        db.backend().commit(txn).await.unwrap();
    }

    assert_eq!(db.backend().row_count("products_text").await.unwrap(), 1);
}

#[tokio::test]
async fn undeclared_code_is_ignored_on_update() {
    let db = common::catalog_db().await;
    let record = saved_widget(&db).await;
    let id = record.id().unwrap();

    let mut loaded = db.load_record("product", id).await.unwrap().unwrap();
    loaded.set("warranty", "2y");
    let outcome = db.save(&mut loaded).await.unwrap();
    assert!(outcome.is_saved());

    // The unknown code produced no writes of any kind.
    let main = db.backend().get("products", id).await.unwrap().unwrap();
    assert!(main.get("warranty").is_none());
    assert_eq!(db.backend().row_count("products_varchar").await.unwrap(), 0);
}

#[tokio::test]
async fn updated_phase_fires_exactly_once() {
    let db = common::catalog_db().await;
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    db.register_hook(Arc::new(FnHook(move |phase, _record: &EntityRecord| {
        if phase == LifecyclePhase::Updated {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        HookDecision::Proceed
    })))
    .await;

    let mut record = saved_widget(&db).await;
    record.set("color", "green");
    db.save(&mut record).await.unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn updating_veto_leaves_the_stored_value_untouched() {
    let db = common::catalog_db().await;
    let record = saved_widget(&db).await;
    let id = record.id().unwrap();

    db.register_hook(Arc::new(FnHook(|phase, _record: &EntityRecord| {
        if phase == LifecyclePhase::Updating {
            HookDecision::Abort("read only window".into())
        } else {
            HookDecision::Proceed
        }
    })))
    .await;

    let mut loaded = db.load_record("product", id).await.unwrap().unwrap();
    loaded.set("color", "blue");
    let outcome = db.save(&mut loaded).await.unwrap();
    assert!(matches!(
        outcome,
        SaveOutcome::Vetoed { phase: LifecyclePhase::Updating, .. }
    ));

    let rows = db
        .backend()
        .select("products_text", &Filter::eq("entity_id", id as i64))
        .await
        .unwrap();
    assert_eq!(rows[0].1.get("value"), Some(&Value::Text("red".into())));
}

#[tokio::test]
async fn past_tense_phases_cannot_veto() {
    let db = common::catalog_db().await;
    db.register_hook(Arc::new(FnHook(|phase, _record: &EntityRecord| {
        if phase == LifecyclePhase::Updated {
            HookDecision::Abort("too late".into())
        } else {
            HookDecision::Proceed
        }
    })))
    .await;

    let mut record = saved_widget(&db).await;
    record.set("color", "green");
    let outcome = db.save(&mut record).await.unwrap();
    assert!(outcome.is_saved());
}
