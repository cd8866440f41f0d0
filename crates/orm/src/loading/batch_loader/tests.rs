use super::*;
use crate::model::Schema;
use crate::relationships::metadata::JoinColumns;
use crate::store::MemoryStore;
use serde_json::json;

fn schema() -> Arc<Schema> {
    let number = EntityType::builder("Number")
        .table("numbers")
        .primary_key(&["id"])
        .column("en")
        .deferred_column("es")
        .to_many("fruits", "Fruit", JoinColumns::simple("id", "number_id"))
        .build()
        .unwrap();
    let fruit = EntityType::builder("Fruit")
        .table("fruits")
        .primary_key(&["id"])
        .column("number_id")
        .column("en")
        .build()
        .unwrap();
    Schema::new().with(number).unwrap().with(fruit).unwrap().finish().unwrap()
}

/// Session holding `count` numbers, each with `es` unloaded
fn setup(count: i64) -> (Session, MemoryStore, Vec<InstanceId>) {
    let schema = schema();
    let mut store = MemoryStore::new(schema.clone());
    for i in 1..=count {
        store
            .insert("Number", json!({"id": i, "en": format!("n{}", i), "es": format!("es{}", i)}))
            .unwrap();
    }
    store
        .insert("Fruit", json!({"id": 11, "number_id": 1, "en": "apple"}))
        .unwrap();

    let mut session = Session::new(schema.clone());
    let plan = Arc::new(LoadNode::new(schema.entity("Number").unwrap()));
    let ids = store.select(&mut session, &plan).unwrap();
    store.reset_log();
    (session, store, ids)
}

fn keys(session: &Session, ids: &[InstanceId]) -> Vec<PrimaryKey> {
    ids.iter().map(|&id| session.key(id).unwrap().clone()).collect()
}

#[test]
fn test_batch_loader_defaults() {
    assert_eq!(BatchLoader::default().chunk_size(), 500);
    assert_eq!(BatchLoader::new(0).chunk_size(), 1);
}

#[test]
fn test_chunk_boundary() {
    let (mut session, mut store, ids) = setup(501);
    let entity = session.schema().entity("Number").unwrap();
    let keys = keys(&session, &ids);

    let result = BatchLoader::default()
        .load(&mut session, &mut store, &entity, &keys, "es", None)
        .unwrap();

    assert_eq!(result.query_count, 2);
    assert_eq!(result.record_count, 501);
    assert_eq!(store.log().count(), 2);
    assert!(ids.iter().all(|&id| session.is_loaded(id, "es")));
}

#[test]
fn test_small_chunks() {
    let (mut session, mut store, ids) = setup(5);
    let entity = session.schema().entity("Number").unwrap();
    let keys = keys(&session, &ids);

    let result = BatchLoader::new(2)
        .load(&mut session, &mut store, &entity, &keys, "es", None)
        .unwrap();

    assert_eq!(result.query_count, 3);
    assert_eq!(store.log().count(), 3);
}

#[test]
fn test_failure_keeps_earlier_chunks() {
    let (mut session, mut store, ids) = setup(5);
    let entity = session.schema().entity("Number").unwrap();
    let keys = keys(&session, &ids);
    store.fail_on_query(2);

    let err = BatchLoader::new(2)
        .load(&mut session, &mut store, &entity, &keys, "es", None)
        .unwrap_err();

    assert!(err.is_store_failure());
    assert_eq!(store.log().count(), 2);
    assert!(session.is_loaded(ids[0], "es"));
    assert!(session.is_loaded(ids[1], "es"));
    assert!(ids[2..].iter().all(|&id| !session.is_loaded(id, "es")));
}

#[test]
fn test_empty_key_list_issues_no_query() {
    let (mut session, mut store, _) = setup(2);
    let entity = session.schema().entity("Number").unwrap();

    let result = BatchLoader::default()
        .load(&mut session, &mut store, &entity, &[], "es", None)
        .unwrap();

    assert_eq!(result, BatchLoadResult::default());
    assert_eq!(store.log().count(), 0);
}

#[test]
fn test_relationship_load_with_default_nested_plan() {
    let (mut session, mut store, ids) = setup(3);
    let entity = session.schema().entity("Number").unwrap();
    let keys = keys(&session, &ids);

    let result = BatchLoader::default()
        .load(&mut session, &mut store, &entity, &keys, "fruits", None)
        .unwrap();

    assert_eq!(result.query_count, 1);
    assert_eq!(result.record_count, 3);
    let fruits = session.committed_value(ids[0], "fruits").unwrap().as_many().unwrap().to_vec();
    assert_eq!(fruits.len(), 1);
    assert!(session.is_loaded(fruits[0], "en"));
}

#[test]
fn test_bulk_load_attribute() {
    let (mut session, mut store, ids) = setup(3);
    session.set_committed(ids[0], "es", json!("uno").into()).unwrap();

    let result = bulk_load_attribute(&mut session, &mut store, "Number", &ids, "es").unwrap();

    assert_eq!(result.query_count, 1);
    assert_eq!(result.record_count, 2);
    // The already loaded value is kept
    assert_eq!(
        session.committed_value(ids[0], "es"),
        Some(&AttributeValue::Scalar(json!("uno")))
    );

    let pending = session
        .add("Number", json!({"en": "new"}).as_object().cloned().unwrap())
        .unwrap();
    assert!(matches!(
        bulk_load_attribute(&mut session, &mut store, "Number", &[pending], "es"),
        Err(LoadError::NotPersistent { .. })
    ));
    assert!(bulk_load_attribute(&mut session, &mut store, "Number", &ids, "label").is_err());
}
