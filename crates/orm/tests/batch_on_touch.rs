mod common;

use common::Fixture;
use elif_batchload::{
    batch_on_touch, default_columns, defer, joined, load_only, raise_on_touch,
    raise_on_touch_relationships, AttributeValue, BatchOptions, InstanceId, KeyValue, LoadError,
    LoadState, LoaderConfigBuilder, LoadingStrategy, PrimaryKey, Query, Row, StoreError,
};
use serde_json::json;

fn numbers(f: &mut Fixture, load: elif_batchload::Load) -> Vec<InstanceId> {
    let ids = Query::new(&f.schema, "Number")
        .and_then(|query| query.options(load))
        .and_then(|query| query.all(&mut f.session, &mut f.store))
        .expect("numbers query");
    f.queries();
    ids
}

fn fruits(f: &mut Fixture, load: elif_batchload::Load) -> Vec<InstanceId> {
    let ids = Query::new(&f.schema, "Fruit")
        .and_then(|query| query.options(load))
        .and_then(|query| query.all(&mut f.session, &mut f.store))
        .expect("fruits query");
    f.queries();
    ids
}

fn batch_all() -> elif_batchload::Load {
    load_only(["id"]).batch_on_touch(["*"], BatchOptions::default())
}

#[test]
fn test_lazy_columns_without_batching() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, load_only(["id"]));

    assert_eq!(f.names(&ids), vec![json!("one"), json!("two"), json!("three"), json!("four")]);
    assert_eq!(f.queries(), ids.len());
}

#[test]
fn test_one_touch_loads_column_for_all_siblings() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, batch_all());
    // A pending instance is never part of a batch
    f.session.add("Number", Row::new()).unwrap();

    assert!(f.none_loaded(&ids, "en"));
    assert_eq!(f.queries(), 0);

    assert_eq!(f.scalar(ids[0], "en"), json!("one"));
    assert_eq!(f.queries(), 1);
    assert!(f.all_loaded(&ids, "en"));
    assert!(f.none_loaded(&ids, "es"));

    assert_eq!(f.names(&ids), vec![json!("one"), json!("two"), json!("three"), json!("four")]);
    assert_eq!(f.queries(), 0);
}

#[test]
fn test_batch_query_shape() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, batch_all());

    f.scalar(ids[0], "es");
    assert_eq!(
        f.store.log().last(),
        Some("SELECT (numbers.id) AS pk, numbers.es FROM numbers WHERE (numbers.id) IN (($1), ($2), ($3), ($4))")
    );
}

#[test]
fn test_modified_values_are_not_overwritten() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, batch_all());

    f.session.set(ids[0], "en", json!("wun").into()).unwrap();
    assert_eq!(f.queries(), 0);

    assert_eq!(f.scalar(ids[1], "en"), json!("two"));
    assert_eq!(f.queries(), 1);

    assert_eq!(f.scalar(ids[0], "en"), json!("wun"));
    let state = f.session.instance(ids[0]).unwrap();
    assert_eq!(state.modified("en"), Some(&AttributeValue::Scalar(json!("wun"))));
    assert_eq!(state.committed("en"), Some(&AttributeValue::Scalar(json!("one"))));
    assert_eq!(f.queries(), 0);
}

#[test]
fn test_already_loaded_values_are_not_fetched_again() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, batch_all());
    f.session.set_committed(ids[1], "en", json!("TWO").into()).unwrap();

    assert_eq!(f.scalar(ids[0], "en"), json!("one"));
    assert_eq!(
        f.store.log().last(),
        Some("SELECT (numbers.id) AS pk, numbers.en FROM numbers WHERE (numbers.id) IN (($1), ($2), ($3))")
    );
    assert_eq!(f.scalar(ids[1], "en"), json!("TWO"));
}

#[test]
fn test_expired_instances_are_refreshed_individually() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, batch_all());
    f.session.add("Number", Row::new()).unwrap();

    f.session.expire_all();

    assert_eq!(f.scalar(ids[0], "en"), json!("one"));
    assert_eq!(f.queries(), 1);
    assert!(f.session.is_loaded(ids[0], "en"));
    assert!(f.none_loaded(&ids[1..], "en"));
    assert!(f.session.instance(ids[1]).unwrap().is_expired());
}

#[test]
fn test_single_expired_instance_is_left_out_of_the_batch() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, batch_all());
    f.session.expire(ids[1]).unwrap();

    assert_eq!(f.scalar(ids[0], "en"), json!("one"));
    assert_eq!(f.queries(), 1);
    assert!(!f.session.is_loaded(ids[1], "en"));

    assert_eq!(f.scalar(ids[1], "en"), json!("two"));
    assert_eq!(f.queries(), 1);
}

#[test]
fn test_edit_on_expired_instance_is_read_back() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, batch_all());
    f.session.expire(ids[0]).unwrap();

    f.session.set(ids[0], "en", json!("EDITED").into()).unwrap();
    assert_eq!(f.scalar(ids[0], "en"), json!("EDITED"));
    assert_eq!(f.scalar(ids[0], "en"), json!("EDITED"));
    assert_eq!(f.queries(), 0);

    // Touching another attribute refreshes the baseline underneath the edit
    assert_eq!(f.scalar(ids[0], "es"), json!("uno"));
    assert_eq!(f.queries(), 1);
    assert_eq!(f.scalar(ids[0], "en"), json!("EDITED"));
    let state = f.session.instance(ids[0]).unwrap();
    assert_eq!(state.committed("en"), Some(&AttributeValue::Scalar(json!("one"))));
}

#[test]
fn test_single_instance_batch() {
    let mut f = Fixture::new();
    let one = Query::new(&f.schema, "Number")
        .and_then(|query| query.options(batch_all()))
        .and_then(|query| query.first(&mut f.session, &mut f.store))
        .unwrap()
        .unwrap();
    f.queries();

    assert_eq!(f.scalar(one, "en"), json!("one"));
    assert_eq!(f.queries(), 1);
}

#[test]
fn test_scalar_relationship() {
    let mut f = Fixture::new();
    let ids = fruits(&mut f, default_columns().batch_on_touch(["*"], BatchOptions::default()));
    f.session.add("Number", Row::new()).unwrap();

    assert!(f.none_loaded(&ids, "number"));

    let one = f.one(ids[0], "number").unwrap();
    assert_eq!(f.scalar(one, "en"), json!("one"));
    assert_eq!(f.queries(), 1);
    assert!(f.all_loaded(&ids, "number"));

    let names: Vec<_> = ids
        .clone()
        .into_iter()
        .map(|id| f.one(id, "number").map(|number| f.scalar(number, "en")))
        .collect();
    assert_eq!(
        names,
        vec![
            Some(json!("one")),
            Some(json!("one")),
            Some(json!("two")),
            Some(json!("two")),
            Some(json!("three")),
            Some(json!("three")),
            None,
        ]
    );
    assert_eq!(f.queries(), 0);

    // Both apples and oranges point at the same Number instance
    assert_eq!(f.one(ids[0], "number"), f.one(ids[1], "number"));
}

#[test]
fn test_list_relationship() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, default_columns().batch_on_touch(["*"], BatchOptions::default()));

    let fruits = f.many(ids[0], "fruits");
    assert_eq!(f.names(&fruits), vec![json!("apple"), json!("orange")]);
    assert_eq!(f.queries(), 1);
    assert!(f.all_loaded(&ids, "fruits"));

    let mut all = Vec::new();
    for &id in &ids {
        let fruits = f.many(id, "fruits");
        all.push(f.names(&fruits));
    }
    assert_eq!(
        all,
        vec![
            vec![json!("apple"), json!("orange")],
            vec![json!("grape"), json!("plum")],
            vec![json!("cherry"), json!("strawberry")],
            vec![],
        ]
    );
    assert_eq!(f.queries(), 0);
}

#[test]
fn test_keyed_relationship() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, default_columns().batch_on_touch(["*"], BatchOptions::default()));

    let fruits = match f.session.get(ids[0], "fruits_map", &mut f.store).unwrap() {
        AttributeValue::Keyed(fruits) => fruits,
        other => panic!("expected keyed value, got {:?}", other),
    };
    assert_eq!(f.queries(), 1);
    assert!(f.all_loaded(&ids, "fruits_map"));

    let keys: Vec<_> = fruits.keys().cloned().collect();
    assert_eq!(keys, vec![KeyValue::from("apple"), KeyValue::from("orange")]);
    let apple = fruits[&KeyValue::from("apple")];
    assert_eq!(f.scalar(apple, "en"), json!("apple"));

    // The stored value is the ordered sequence the keyed view is built from
    assert!(f.session.committed_value(ids[0], "fruits_map").unwrap().as_many().is_some());

    let four = f.session.get(ids[3], "fruits_map", &mut f.store).unwrap();
    assert_eq!(four.as_keyed().map(|fruits| fruits.len()), Some(0));
    assert_eq!(f.queries(), 0);
}

#[test]
fn test_raise_on_touch() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, load_only(["id"]).raise_on_touch(["*"]));

    for _ in 0..2 {
        let err = f.session.get(ids[0], "en", &mut f.store).unwrap_err();
        assert!(matches!(
            err,
            LoadError::LazyLoadForbidden { ref entity, ref attribute }
                if entity == "Number" && attribute == "en"
        ));
    }
    assert_eq!(f.session.load_state(ids[0], "en").unwrap(), LoadState::Errored);
    assert_eq!(
        f.session.loader(ids[0], "en").map(|loader| loader.strategy),
        Some(LoadingStrategy::RaiseOnTouch)
    );

    let err = f.session.get(ids[0], "fruits", &mut f.store).unwrap_err();
    assert_eq!(err.to_string(), "Number.fruits is not available due to raise-on-touch");
    assert_eq!(f.queries(), 0);

    // The primary key is always loaded
    assert_eq!(f.scalar(ids[0], "id"), json!(1));
}

#[test]
fn test_raise_on_touch_for_relationships_only() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, defer(["en"]).raise_on_touch_relationships(["*"]));

    assert_eq!(f.scalar(ids[0], "en"), json!("one"));
    assert!(f.session.get(ids[0], "fruits", &mut f.store).is_err());
    assert!(f.session.get(ids[0], "fruits_map", &mut f.store).is_err());
}

#[test]
fn test_raise_on_touch_named_relationship() {
    let mut f = Fixture::new();
    let ids = fruits(&mut f, raise_on_touch_relationships(["number"]));
    assert!(matches!(
        f.session.get(ids[0], "number", &mut f.store),
        Err(LoadError::LazyLoadForbidden { .. })
    ));

    let ids = numbers(&mut f, raise_on_touch(["es"]));
    assert_eq!(f.scalar(ids[0], "en"), json!("one"));
}

#[test]
fn test_store_failure_mid_sequence() {
    let config = LoaderConfigBuilder::testing().chunk_size(2).build().unwrap();
    let mut f = Fixture::with_config(config);
    let ids = numbers(&mut f, batch_all());
    f.store.fail_on_query(2);

    let err = f.session.get(ids[0], "en", &mut f.store).unwrap_err();
    assert!(matches!(err, LoadError::Store(StoreError::Query { .. })));
    assert_eq!(f.queries(), 2);
    assert!(f.all_loaded(&ids[..2], "en"));
    assert!(f.none_loaded(&ids[2..], "en"));

    // The loader is still registered; the next touch loads the rest
    assert_eq!(f.scalar(ids[2], "en"), json!("three"));
    assert_eq!(f.queries(), 1);
    assert!(f.all_loaded(&ids, "en"));
}

#[test]
fn test_failed_touch_is_marked_errored_and_retried() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, batch_all());
    f.store.fail_on_query(1);

    assert!(f.session.get(ids[0], "en", &mut f.store).is_err());
    assert_eq!(f.session.load_state(ids[0], "en").unwrap(), LoadState::Errored);

    assert_eq!(f.scalar(ids[0], "en"), json!("one"));
    assert_eq!(f.session.load_state(ids[0], "en").unwrap(), LoadState::Loaded);
}

#[test]
fn test_loaded_then_modified_survives_sibling_batch() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, batch_all());
    f.session.set_committed(ids[2], "en", json!("THREE").into()).unwrap();
    f.session.set(ids[2], "en", json!("tres!").into()).unwrap();

    assert_eq!(f.scalar(ids[0], "en"), json!("one"));
    assert_eq!(
        f.store.log().last(),
        Some("SELECT (numbers.id) AS pk, numbers.en FROM numbers WHERE (numbers.id) IN (($1), ($2), ($3))")
    );
    assert_eq!(f.queries(), 1);

    assert_eq!(f.scalar(ids[2], "en"), json!("tres!"));
    let state = f.session.instance(ids[2]).unwrap();
    assert_eq!(state.committed("en"), Some(&AttributeValue::Scalar(json!("THREE"))));
    assert_eq!(f.queries(), 0);
}

fn seed_numbers_up_to(f: &mut Fixture, last: i64) {
    for id in 5..=last {
        f.store
            .insert("Number", json!({"id": id, "en": format!("n{}", id)}))
            .unwrap();
    }
}

#[test]
fn test_touch_splits_501_siblings_into_two_queries() {
    let mut f = Fixture::new();
    seed_numbers_up_to(&mut f, 501);
    let ids = numbers(&mut f, batch_all());
    assert_eq!(ids.len(), 501);

    assert_eq!(f.scalar(ids[0], "en"), json!("one"));
    assert_eq!(f.queries(), 2);
    assert!(f.all_loaded(&ids, "en"));
}

#[test]
fn test_touch_loads_500_siblings_in_one_query() {
    let mut f = Fixture::new();
    seed_numbers_up_to(&mut f, 500);
    let ids = numbers(&mut f, batch_all());
    assert_eq!(ids.len(), 500);

    assert_eq!(f.scalar(ids[499], "en"), json!("n500"));
    assert_eq!(f.queries(), 1);
    assert!(f.all_loaded(&ids, "en"));
}

#[test]
fn test_chunked_batches() {
    let config = LoaderConfigBuilder::new().chunk_size(3).build().unwrap();
    let mut f = Fixture::with_config(config);
    let ids = numbers(&mut f, batch_all());

    assert_eq!(f.scalar(ids[3], "en"), json!("four"));
    assert_eq!(f.queries(), 2);
    assert!(f.all_loaded(&ids, "en"));
}

#[test]
fn test_deleted_row() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, batch_all());
    f.store.delete("Number", &PrimaryKey::from(2));

    let err = f.session.get(ids[1], "en", &mut f.store).unwrap_err();
    assert!(matches!(err, LoadError::ObjectDeleted { ref entity, .. } if entity == "Number"));
    assert!(f.session.is_loaded(ids[0], "en"));
    assert_eq!(f.scalar(ids[0], "en"), json!("one"));
}

#[test]
fn test_safeguard_batches_plain_lazy_loads() {
    let config = LoaderConfigBuilder::production().build().unwrap();
    let mut f = Fixture::with_config(config);
    let ids = numbers(&mut f, load_only(["id"]));

    assert_eq!(f.scalar(ids[0], "en"), json!("one"));
    assert_eq!(f.queries(), 1);
    assert!(f.all_loaded(&ids, "en"));

    let fruits = f.many(ids[0], "fruits");
    assert_eq!(f.names(&fruits), vec![json!("apple"), json!("orange")]);
    assert_eq!(f.queries(), 1);
    assert!(f.all_loaded(&ids, "fruits"));
}

#[test]
fn test_safeguard_enabled_on_session() {
    let mut f = Fixture::new();
    let ids = fruits(&mut f, default_columns());
    f.session.enable_safeguard();

    f.one(ids[0], "number");
    assert_eq!(f.queries(), 1);
    assert!(f.all_loaded(&ids, "number"));
}

#[test]
fn test_pending_instances() {
    let mut f = Fixture::new();
    let values = json!({"en": "five"}).as_object().cloned().unwrap();
    let five = f.session.add("Number", values).unwrap();

    assert_eq!(f.scalar(five, "en"), json!("five"));
    assert_eq!(f.scalar(five, "es"), json!(null));
    assert!(f.many(five, "fruits").is_empty());
    assert_eq!(f.queries(), 0);
}

#[test]
fn test_unknown_attribute_fails_at_declaration() {
    let f = Fixture::new();
    let query = Query::new(&f.schema, "Number").unwrap();

    let err = query
        .clone()
        .options(batch_on_touch(["label"], BatchOptions::default()))
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::UnknownAttribute { ref entity, ref attribute }
            if entity == "Number" && attribute == "label"
    ));

    assert!(query.clone().options(joined("label")).is_err());
    assert!(query.clone().options(load_only(["fruits"])).is_err());
    assert!(matches!(
        Query::new(&f.schema, "Apple"),
        Err(LoadError::UnknownEntity { .. })
    ));
}

#[test]
fn test_unknown_attribute_at_touch() {
    let mut f = Fixture::new();
    let ids = numbers(&mut f, batch_all());
    assert!(matches!(
        f.session.get(ids[0], "label", &mut f.store),
        Err(LoadError::UnknownAttribute { .. })
    ));
}
