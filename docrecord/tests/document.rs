mod support;

use bson::{Bson, doc, oid::ObjectId};
use docrecord::prelude::*;
use support::{CountingStore, Stamped, Test, database, database_with, seed};

// ============================================================================
// Attribute access
// ============================================================================

#[tokio::test]
async fn test_set_then_get_round_trips() {
    let db = database();
    let mut document = Document::<Test>::new(&db).unwrap();

    document.set("a", "x");
    document.set("count", 3);

    assert_eq!(document.get("a"), Some(Value::from("x")));
    assert_eq!(document.get("count"), Some(Value::from(3)));
    assert!(document.has("a"));
    assert!(!document.has("missing"));

    document.unset("count");
    assert_eq!(document.get("count"), None);
}

#[tokio::test]
async fn test_virtual_fields_stay_out_of_the_payload() {
    let db = database();
    let mut document = Document::<Test>::new(&db).unwrap();

    document.set("a", "x");
    document.set("note", "scratch");

    assert_eq!(document.model().note.as_deref(), Some("scratch"));
    assert!(!document.document().contains_key("note"));
    assert!(document.attributes().contains_key("note"));
    assert_eq!(document.raw_document(), doc! { "a": "x" });
}

#[tokio::test]
async fn test_getter_reads_through_the_document() {
    let db = database();
    let mut document = Document::<Test>::new(&db).unwrap();
    document.set("a", "quiet");

    assert_eq!(document.get("shout"), Some(Value::from("QUIET")));
}

#[tokio::test]
async fn test_raw_document_flattens_nested_documents() {
    let db = database();
    let mut nested = Document::<Test>::new(&db).unwrap();
    nested.set("a", "inner");
    nested.set("note", "not persisted");

    let mut document = Document::<Test>::new(&db).unwrap();
    document.set("a", "outer");
    document.set("child", Value::embedded(Box::new(nested.clone())));
    document.set("children", vec![Value::embedded(Box::new(nested))]);

    assert_eq!(
        document.raw_document(),
        doc! {
            "a": "outer",
            "child": { "a": "inner" },
            "children": [{ "a": "inner" }],
        }
    );
    assert_eq!(document.to_json().unwrap()["child"]["a"], "inner");
}

#[tokio::test]
async fn test_assign_filters_and_casts() {
    let db = database();
    let mut document = Document::<Test>::new(&db).unwrap();

    document.assign(doc! { "a": "42", "z": "not whitelisted" }, None).unwrap();
    assert_eq!(document.get("a"), Some(Value::Bson(Bson::Int32(42))));
    assert!(!document.has("z"));

    let rules = vec![Rule::new("a, b", "safe")];
    document.assign(doc! { "a": "12345678901" }, Some(&rules)).unwrap();
    assert_eq!(document.get("a"), Some(Value::Bson(Bson::Int64(12_345_678_901))));
    assert_eq!(document.get("b"), Some(Value::null()));
    assert!(!document.has("b"));
}

#[tokio::test]
async fn test_assign_respects_scenarios() {
    let db = database();
    let mut document = Document::<Test>::new(&db).unwrap();
    let rules = vec![Rule::new("a", "safe"), Rule::new("locked", "safe").on("update")];

    document.assign(doc! { "a": "x", "locked": "y" }, Some(&rules)).unwrap();

    assert!(document.has("a"));
    assert!(!document.has("locked"));
}

#[tokio::test]
async fn test_unregistered_types_cannot_be_constructed() {
    #[derive(Debug, Clone, Default)]
    struct Ghost;

    impl Model for Ghost {
        fn type_name() -> &'static str {
            "Ghost"
        }

        fn collection_name() -> &'static str {
            "ghosts"
        }
    }

    let db = database();
    assert!(!db.is_registered::<Ghost>());
    assert!(matches!(
        Document::<Ghost>::new(&db),
        Err(DocumentStoreError::UnregisteredType(_))
    ));
}

#[tokio::test]
async fn test_build_rejects_unknown_relation_targets() {
    #[derive(Debug, Clone, Default)]
    struct Orphan;

    impl Model for Orphan {
        fn type_name() -> &'static str {
            "Orphan"
        }

        fn collection_name() -> &'static str {
            "orphans"
        }

        fn descriptor() -> Descriptor<Self> {
            Descriptor::<Self>::new().relation("parent", Relation::one("Nobody", "_id"))
        }
    }

    let result = Database::builder(CountingStore::default()).register::<Orphan>().build();
    assert!(matches!(result, Err(DocumentStoreError::Configuration(_))));
}

#[tokio::test]
async fn test_type_names_resolve_without_namespace() {
    let db = database();

    assert_eq!(db.resolve("app::models::Test").map(|entry| entry.collection()), Some("tests"));
    assert_eq!(db.resolve("App\\Test").map(|entry| entry.name()), Some("Test"));
    assert!(db.resolve("Unknown").is_none());

    let instance = db.select("Test", None).unwrap().unwrap();
    assert!(instance.is_new_record());
    assert_eq!(instance.current_scenario(), SCENARIO_INSERT);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn test_insert_assigns_a_primary_key_and_switches_scenario() {
    let db = database();
    let mut document = Document::<Test>::new(&db).unwrap();
    document.set("a", "x");

    assert!(document.is_new());
    assert_eq!(document.scenario(), SCENARIO_INSERT);
    assert!(document.insert(WriteConcern::inherit()).await.unwrap());

    assert!(!document.is_new());
    assert_eq!(document.scenario(), SCENARIO_UPDATE);
    assert!(matches!(document.primary_key(), Some(Bson::ObjectId(_))));
    assert_eq!(document.model().events, vec!["beforeSave", "afterSave"]);

    // Stored documents are never inserted twice.
    assert!(!document.insert(WriteConcern::inherit()).await.unwrap());
    assert_eq!(document.count(None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_before_save_veto_skips_the_backend() {
    let store = CountingStore::default();
    let db = database_with(store.clone());
    let mut document = Document::<Test>::new(&db).unwrap();
    document.set("a", "x");
    document.model_mut().veto_save = true;

    let calls = store.calls();
    assert!(!document.insert(WriteConcern::inherit()).await.unwrap());
    assert!(!document.save(false, WriteConcern::inherit()).await.unwrap());

    assert_eq!(store.calls(), calls);
    assert!(document.is_new());
    assert!(document.primary_key().is_none());
}

#[tokio::test]
async fn test_failed_validation_aborts_save() {
    let store = CountingStore::default();
    let db = database_with(store.clone());
    let mut document = Document::<Test>::new(&db).unwrap();

    let calls = store.calls();
    assert!(!document.save(true, WriteConcern::inherit()).await.unwrap());

    assert_eq!(store.calls(), calls);
    assert_eq!(document.first_error(Some("a")), Some("The a field is invalid."));
}

#[tokio::test]
async fn test_save_upserts_and_keeps_the_primary_key() {
    let db = database();
    let mut document = Document::<Test>::new(&db).unwrap();
    document.set("a", "x");
    assert!(document.save(true, WriteConcern::inherit()).await.unwrap());

    let id = document.primary_key();
    document.set("_id", Bson::ObjectId(ObjectId::new()));
    assert_eq!(document.primary_key(), id);

    document.set("a", "y");
    assert!(document.save(true, WriteConcern::inherit()).await.unwrap());
    assert_eq!(document.count(None).await.unwrap(), 1);

    let stored = Document::<Test>::load(&db, Some(Filter::eq("_id", id.unwrap())))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("a"), Some(Value::from("y")));
}

#[tokio::test]
async fn test_custom_primary_key_addresses_rows() {
    #[derive(Debug, Clone, Default)]
    struct Coded;

    impl Model for Coded {
        fn type_name() -> &'static str {
            "Coded"
        }

        fn collection_name() -> &'static str {
            "codes"
        }

        fn primary_key() -> &'static str {
            "code"
        }
    }

    let db = Database::builder(CountingStore::default()).register::<Coded>().build().unwrap();
    let mut document = Document::<Coded>::new(&db).unwrap();
    document.set("code", "abc");
    document.set("n", 1);
    assert!(document.insert(WriteConcern::inherit()).await.unwrap());

    document.set("n", 2);
    assert!(document.save(false, WriteConcern::inherit()).await.unwrap());
    assert_eq!(document.count(None).await.unwrap(), 1);

    let mut loaded = Document::<Coded>::new(&db).unwrap();
    assert!(loaded.find_by_id("abc").await.unwrap().is_some());
    assert_eq!(loaded.get("n"), Some(Value::from(2)));
}

#[tokio::test]
async fn test_find_one_loads_into_the_instance() {
    let db = database();
    seed(&db, "tests", vec![doc! { "_id": 1, "a": "x" }, doc! { "_id": 2, "a": "y" }]).await;

    let mut document = Document::<Test>::new(&db).unwrap();
    document.set("stale", true);
    document.set("note", "stale note");
    assert!(document.find_one(Some(Filter::eq("a", "y"))).await.unwrap().is_some());
    assert!(document.model().note.is_none());

    assert_eq!(document.primary_key(), Some(Bson::Int32(2)));
    assert!(!document.has("stale"));
    assert!(!document.is_new());
    assert_eq!(document.scenario(), SCENARIO_UPDATE);

    assert!(document.find_one(Some(Filter::eq("a", "nope"))).await.unwrap().is_none());
    assert_eq!(document.primary_key(), Some(Bson::Int32(2)));
}

#[tokio::test]
async fn test_before_find_veto() {
    let store = CountingStore::default();
    let db = database_with(store.clone());
    seed(&db, "tests", vec![doc! { "_id": 1, "a": "x" }]).await;

    let mut document = Document::<Test>::new(&db).unwrap();
    document.model_mut().veto_find = true;

    let calls = store.calls();
    assert!(document.find_by_id(1).await.unwrap().is_none());
    assert!(!document.find(None).await.unwrap().valid().await.unwrap());
    assert_eq!(store.calls(), calls);
}

#[tokio::test]
async fn test_remove_and_refresh() {
    let db = database();
    let mut document = Document::<Test>::new(&db).unwrap();
    document.set("a", "x");
    document.insert(WriteConcern::inherit()).await.unwrap();

    let id = document.primary_key().unwrap();
    let matched = document
        .update(Some(Filter::eq("_id", id)), Update::new().set("a", "changed"), WriteConcern::inherit())
        .await
        .unwrap();
    assert_eq!(matched, 1);

    assert!(document.refresh().await.unwrap());
    assert_eq!(document.get("a"), Some(Value::from("changed")));

    assert!(document.remove(WriteConcern::inherit()).await.unwrap());
    assert_eq!(document.count(None).await.unwrap(), 0);
    assert!(!document.refresh().await.unwrap());
}

#[tokio::test]
async fn test_remove_without_primary_key() {
    let db = database();
    let mut document = Document::<Test>::new(&db).unwrap();

    assert!(!document.remove(WriteConcern::inherit()).await.unwrap());
}

#[tokio::test]
async fn test_search_matches_every_term() {
    let db = database();
    seed(
        &db,
        "tests",
        vec![
            doc! { "_id": 1, "title": "The Rust Book", "body": "ownership" },
            doc! { "_id": 2, "title": "Rust in Action", "body": "a practical book" },
            doc! { "_id": 3, "title": "Python Tricks", "body": "a book" },
        ],
    )
    .await;

    let mut document = Document::<Test>::new(&db).unwrap();
    let rows = document
        .search(&["title", "body"], "rust BOOK", None)
        .await
        .unwrap()
        .to_vec()
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);

    let rows = document
        .search(&["title"], "rust", Some(Filter::eq("_id", 2)))
        .await
        .unwrap()
        .to_vec()
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

// ============================================================================
// Behaviours
// ============================================================================

#[tokio::test]
async fn test_timestamp_behaviour() {
    let db = database();
    let mut document = Document::<Stamped>::new(&db).unwrap();

    assert!(document.behaviour::<Timestamp>().is_some());
    assert!(document.save(false, WriteConcern::inherit()).await.unwrap());
    assert!(document.has("created"));
    assert!(!document.has("updated"));

    assert!(document.save(false, WriteConcern::inherit()).await.unwrap());
    assert!(document.has("updated"));

    let timestamp = document.behaviour::<Timestamp>().unwrap();
    assert_eq!(timestamp.ago(bson::DateTime::now()), "just now");
}

#[tokio::test]
async fn test_behaviours_run_but_only_the_model_vetoes() {
    let db = database();
    let mut document = Document::<Test>::new(&db).unwrap();
    document.attach_behaviour("timestamp", &doc! {}).unwrap();
    document.set("a", "x");
    document.model_mut().veto_save = true;

    assert!(!document.insert(WriteConcern::inherit()).await.unwrap());
    assert!(document.has("created"));
    assert!(document.is_new());

    document.model_mut().veto_save = false;
    assert!(document.insert(WriteConcern::inherit()).await.unwrap());
    assert!(!document.is_new());
}

#[tokio::test]
async fn test_attach_and_detach_behaviours() {
    let db = database();
    let mut document = Document::<Test>::new(&db).unwrap();

    assert!(document.attach_behaviour("timestamp", &doc! { "created": "born" }).unwrap());
    assert!(!document.attach_behaviour("timestamp", &doc! {}).unwrap());
    assert_eq!(document.behaviour::<Timestamp>().map(Timestamp::created_field), Some("born"));
    assert!(matches!(
        document.attach_behaviour("unknown", &doc! {}),
        Err(DocumentStoreError::Configuration(_))
    ));

    document.set("a", "x");
    document.insert(WriteConcern::inherit()).await.unwrap();
    assert!(document.has("born"));

    assert!(document.detach_behaviour("timestamp"));
    assert!(document.behaviour::<Timestamp>().is_none());
}
