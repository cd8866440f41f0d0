//! Shared fixtures: three Numbers with two Fruits each, one Number without
//! Fruits and one Fruit without a Number

#![allow(dead_code)]

use std::sync::Arc;

use elif_batchload::{
    AttributeValue, EntityType, InstanceId, JoinColumns, LoaderConfig, MemoryStore, Schema, Session,
    Value,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn schema() -> Arc<Schema> {
    let number = EntityType::builder("Number")
        .table("numbers")
        .primary_key(&["id"])
        .column("en")
        .column("es")
        .column("no")
        .to_many("fruits", "Fruit", JoinColumns::simple("id", "number_id"))
        .keyed("fruits_map", "Fruit", JoinColumns::simple("id", "number_id"), "en")
        .build()
        .expect("Number entity type");

    let fruit = EntityType::builder("Fruit")
        .table("fruits")
        .primary_key(&["id"])
        .column("number_id")
        .column("en")
        .column("es")
        .column("no")
        .to_one("number", "Number", JoinColumns::simple("number_id", "id"))
        .build()
        .expect("Fruit entity type");

    Schema::new()
        .with(number)
        .and_then(|schema| schema.with(fruit))
        .and_then(Schema::finish)
        .expect("valid schema")
}

pub fn store(schema: &Arc<Schema>) -> MemoryStore {
    let mut store = MemoryStore::new(schema.clone());
    store
        .insert_many(
            "Number",
            vec![
                json!({"id": 1, "en": "one", "es": "uno", "no": "en"}),
                json!({"id": 2, "en": "two", "es": "dos", "no": "to"}),
                json!({"id": 3, "en": "three", "es": "tres", "no": "tre"}),
                json!({"id": 4, "en": "four", "es": "cuatro", "no": "fire"}),
            ],
        )
        .expect("numbers");
    store
        .insert_many(
            "Fruit",
            vec![
                json!({"id": 11, "number_id": 1, "en": "apple", "es": "manzana", "no": "manzana"}),
                json!({"id": 12, "number_id": 1, "en": "orange", "es": "naranja", "no": "oransje"}),
                json!({"id": 21, "number_id": 2, "en": "grape", "es": "uva", "no": "drue"}),
                json!({"id": 22, "number_id": 2, "en": "plum", "es": "ciruela", "no": "plomme"}),
                json!({"id": 31, "number_id": 3, "en": "cherry", "es": "cereza", "no": "kirsebær"}),
                json!({"id": 32, "number_id": 3, "en": "strawberry", "es": "fresa", "no": "jordbær"}),
                json!({"id": 40, "number_id": null, "en": "tomato", "es": "tomate", "no": "tomat"}),
            ],
        )
        .expect("fruits");
    store
}

pub struct Fixture {
    pub schema: Arc<Schema>,
    pub session: Session,
    pub store: MemoryStore,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(LoaderConfig::default())
    }

    pub fn with_config(config: LoaderConfig) -> Self {
        init_tracing();
        let schema = schema();
        let store = store(&schema);
        let session = Session::with_config(schema.clone(), config).expect("valid config");
        Self { schema, session, store }
    }

    /// Number of store queries since the last call
    pub fn queries(&mut self) -> usize {
        let count = self.store.log().count();
        self.store.reset_log();
        count
    }

    pub fn scalar(&mut self, id: InstanceId, attribute: &str) -> Value {
        self.session
            .get_scalar(id, attribute, &mut self.store)
            .expect("scalar attribute")
    }

    pub fn one(&mut self, id: InstanceId, attribute: &str) -> Option<InstanceId> {
        match self.session.get(id, attribute, &mut self.store).expect("to-one attribute") {
            AttributeValue::One(related) => related,
            other => panic!("expected a to-one value, got {:?}", other),
        }
    }

    pub fn many(&mut self, id: InstanceId, attribute: &str) -> Vec<InstanceId> {
        match self.session.get(id, attribute, &mut self.store).expect("to-many attribute") {
            AttributeValue::Many(related) => related,
            other => panic!("expected a to-many value, got {:?}", other),
        }
    }

    /// `en` of every instance, in order
    pub fn names(&mut self, ids: &[InstanceId]) -> Vec<Value> {
        ids.iter().map(|&id| self.scalar(id, "en")).collect()
    }

    pub fn all_loaded(&self, ids: &[InstanceId], attribute: &str) -> bool {
        ids.iter().all(|&id| self.session.is_loaded(id, attribute))
    }

    pub fn none_loaded(&self, ids: &[InstanceId], attribute: &str) -> bool {
        ids.iter().all(|&id| !self.session.is_loaded(id, attribute))
    }
}
