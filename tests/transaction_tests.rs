//! Backing-store transaction tests: undo-journal rollback and the single
//! writer gate.

use eavdb::{Column, ColumnType, Filter, MemoryBackend, Row, TableSchema, Value};

async fn backend_with_table() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend
        .create_table(TableSchema::new(
            "items",
            vec![
                Column::new("label", ColumnType::Text).not_null(),
                Column::new("qty", ColumnType::Integer),
            ],
        ))
        .await
        .unwrap();
    backend
}

fn item(label: &str, qty: i64) -> Row {
    let mut row = Row::new();
    row.insert("label".into(), label.into());
    row.insert("qty".into(), Value::Int(qty));
    row
}

#[tokio::test]
async fn rollback_undoes_inserts_updates_and_deletes() {
    let backend = backend_with_table().await;
    let kept = backend.insert_autocommit("items", item("kept", 1)).await.unwrap();

    let mut txn = backend.begin().await;
    backend.insert(&mut txn, "items", item("doomed", 2)).await.unwrap();
    let mut changes = Row::new();
    changes.insert("qty".into(), Value::Int(9));
    backend.update(&mut txn, "items", kept, &changes).await.unwrap();
    backend.delete(&mut txn, "items", kept).await.unwrap();
    backend.rollback(txn).await.unwrap();

    assert_eq!(backend.row_count("items").await.unwrap(), 1);
    let row = backend.get("items", kept).await.unwrap().unwrap();
    assert_eq!(row.get("qty"), Some(&Value::Int(1)));
}

#[tokio::test]
async fn commit_makes_journal_entries_permanent() {
    let backend = backend_with_table().await;

    let mut txn = backend.begin().await;
    let id = backend.insert(&mut txn, "items", item("bolt", 40)).await.unwrap();
    backend.commit(txn).await.unwrap();

    assert!(backend.get("items", id).await.unwrap().is_some());
}

#[tokio::test]
async fn rolled_back_insert_does_not_recycle_its_row_id() {
    let backend = backend_with_table().await;

    let mut txn = backend.begin().await;
    let first = backend.insert(&mut txn, "items", item("a", 1)).await.unwrap();
    backend.rollback(txn).await.unwrap();

    let second = backend.insert_autocommit("items", item("b", 2)).await.unwrap();
    assert!(second > first);
}

#[tokio::test]
async fn writer_gate_serializes_concurrent_transactions() {
    let backend = std::sync::Arc::new(backend_with_table().await);

    let mut handles = Vec::new();
    for n in 0..8i64 {
        let backend = std::sync::Arc::clone(&backend);
        handles.push(tokio::spawn(async move {
            let mut txn = backend.begin().await;
            backend
                .insert(&mut txn, "items", item(&format!("item-{}", n), n))
                .await
                .unwrap();
            backend.commit(txn).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(backend.row_count("items").await.unwrap(), 8);
    let all = backend.select("items", &Filter::All).await.unwrap();
    assert_eq!(all.len(), 8);
}

#[tokio::test]
async fn select_with_in_filter_matches_listed_values() {
    let backend = backend_with_table().await;
    backend.insert_autocommit("items", item("a", 1)).await.unwrap();
    backend.insert_autocommit("items", item("b", 2)).await.unwrap();
    backend.insert_autocommit("items", item("c", 3)).await.unwrap();

    let rows = backend
        .select(
            "items",
            &Filter::in_list("qty", vec![Value::Int(1), Value::Int(3)]),
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}
