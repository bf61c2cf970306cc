#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use bson::Document as BsonDocument;
use docrecord::{
    backend::{RowStream, StoreBackend},
    memory::InMemoryStore,
    prelude::*,
};

// ============================================================================
// Models
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Test {
    pub note: Option<String>,
    pub veto_save: bool,
    pub veto_find: bool,
    pub events: Vec<&'static str>,
}

impl Model for Test {
    fn type_name() -> &'static str {
        "Test"
    }

    fn collection_name() -> &'static str {
        "tests"
    }

    fn descriptor() -> Descriptor<Self> {
        Descriptor::<Self>::new()
            .virtual_field(
                "note",
                |test| test.note.clone().into(),
                |test, value| test.note = value.as_str().map(str::to_string),
            )
            .getter("shout", |document| {
                document
                    .get("a")
                    .and_then(|value| value.as_str().map(str::to_uppercase))
                    .map(Value::from)
            })
            .relation("details", Relation::many("TestDetail", "test_id"))
            .relation("owner", Relation::one("TestDetail", "_id").on("owner_id"))
            .validator("even", |_, _, value, _| {
                value
                    .as_bson()
                    .and_then(|value| value.as_i32())
                    .is_some_and(|number| number % 2 == 0)
            })
    }

    fn rules() -> Vec<Rule> {
        vec![Rule::new("a", "required")]
    }

    fn before_find(&mut self, _ctx: &mut HookContext<'_>) -> bool {
        self.events.push("beforeFind");
        !self.veto_find
    }

    fn before_save(&mut self, _ctx: &mut HookContext<'_>) -> bool {
        self.events.push("beforeSave");
        !self.veto_save
    }

    fn after_save(&mut self, _ctx: &mut HookContext<'_>) {
        self.events.push("afterSave");
    }

    fn after_validate(&mut self, _ctx: &mut HookContext<'_>, valid: bool) {
        self.events.push(if valid { "valid" } else { "invalid" });
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestDetail;

impl Model for TestDetail {
    fn type_name() -> &'static str {
        "TestDetail"
    }

    fn collection_name() -> &'static str {
        "test_details"
    }

    fn rules() -> Vec<Rule> {
        vec![Rule::new("name", "required").message("Detail needs a name.")]
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestEmbed;

impl Model for TestEmbed {
    fn type_name() -> &'static str {
        "TestEmbed"
    }

    fn collection_name() -> &'static str {
        "test_embeds"
    }

    fn rules() -> Vec<Rule> {
        vec![
            Rule::new("detail", "embedOne").class("TestDetail"),
            Rule::new("details", "embedMany").class("TestDetail"),
            Rule::new("address", "embedOne").rules(vec![
                Rule::new("city", "required"),
                Rule::new("zip", "number"),
            ]),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct Stamped;

impl Model for Stamped {
    fn type_name() -> &'static str {
        "Stamped"
    }

    fn collection_name() -> &'static str {
        "stamped"
    }

    fn behaviours() -> Vec<BehaviourSpec> {
        vec![BehaviourSpec::new("timestamp")]
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Counts every backend call before handing it to an in-memory store.
#[derive(Debug, Clone, Default)]
pub struct CountingStore {
    inner: InMemoryStore,
    calls: Arc<AtomicUsize>,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StoreBackend for CountingStore {
    async fn find_one(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<Option<BsonDocument>> {
        self.tick();
        self.inner.find_one(collection, filter).await
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<RowStream> {
        self.tick();
        self.inner.find(collection, query).await
    }

    async fn count(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.tick();
        self.inner.count(collection, filter).await
    }

    async fn insert(
        &self,
        collection: &str,
        key: &str,
        document: BsonDocument,
        concern: WriteConcern,
    ) -> DocumentStoreResult<()> {
        self.tick();
        self.inner.insert(collection, key, document, concern).await
    }

    async fn save(
        &self,
        collection: &str,
        key: &str,
        document: BsonDocument,
        concern: WriteConcern,
    ) -> DocumentStoreResult<()> {
        self.tick();
        self.inner.save(collection, key, document, concern).await
    }

    async fn update(
        &self,
        collection: &str,
        filter: Option<Expr>,
        update: Update,
        concern: WriteConcern,
    ) -> DocumentStoreResult<u64> {
        self.tick();
        self.inner.update(collection, filter, update, concern).await
    }

    async fn remove(&self, collection: &str, filter: Option<Expr>, concern: WriteConcern) -> DocumentStoreResult<u64> {
        self.tick();
        self.inner.remove(collection, filter, concern).await
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        self.tick();
        self.inner.drop_collection(collection).await
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Stage>) -> DocumentStoreResult<Vec<BsonDocument>> {
        self.tick();
        self.inner.aggregate(collection, pipeline).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn database_with(store: CountingStore) -> Database {
    Database::builder(store)
        .register::<Test>()
        .register::<TestDetail>()
        .register::<TestEmbed>()
        .register::<Stamped>()
        .build()
        .expect("test database builds")
}

pub fn database() -> Database {
    database_with(CountingStore::default())
}

/// Stores `rows` straight through the backend, bypassing documents.
pub async fn seed(database: &Database, collection: &str, rows: Vec<BsonDocument>) {
    for row in rows {
        database
            .collection(collection)
            .insert(row, WriteConcern::inherit())
            .await
            .expect("seed row");
    }
}
