mod support;

use bson::{Bson, doc};
use docrecord::{memory::InMemoryStore, prelude::*};
use support::{Test, TestDetail, TestEmbed, database, seed};

#[derive(Default)]
struct MinWords {
    min: usize,
}

#[async_trait]
impl Validator for MinWords {
    fn configure(&mut self, params: &Params) -> DocumentStoreResult<()> {
        self.min = params.number("min").map_or(1, |min| min as usize);
        Ok(())
    }

    async fn validate(&self, _owner: &dyn AnyDocument, _field: &str, value: &Value) -> DocumentStoreResult<bool> {
        Ok(value
            .as_str()
            .is_some_and(|text| text.split_whitespace().count() >= self.min))
    }
}

#[derive(Debug, Clone, Default)]
struct Lowercase;

impl Behaviour for Lowercase {
    fn validate(&self, validator: &str, _field: &str, value: &Value, _params: &Params) -> Option<bool> {
        (validator == "lowercase").then(|| value.as_str().is_some_and(|text| text == text.to_lowercase()))
    }
}

fn extended_database() -> Database {
    Database::builder(InMemoryStore::new())
        .register::<Test>()
        .register::<TestDetail>()
        .register::<TestEmbed>()
        .validator::<MinWords>("minWords")
        .behaviour::<Lowercase>("lowercase")
        .build()
        .unwrap()
}

// ============================================================================
// Rules and messages
// ============================================================================

#[tokio::test]
async fn test_validate_replaces_previous_errors() {
    let db = database();
    let mut test = Document::<Test>::new(&db).unwrap();

    assert!(!test.validate().await.unwrap());
    assert!(test.is_validated());
    assert!(!test.is_valid());
    assert_eq!(test.first_error(Some("a")), Some("The a field is invalid."));

    test.set("a", "filled");
    assert!(test.validate().await.unwrap());
    assert!(test.is_valid());
    assert!(test.errors().is_empty());
    assert_eq!(test.model().events, vec!["invalid", "valid"]);
}

#[tokio::test]
async fn test_multi_field_rule_reports_globally() {
    let db = database();
    let mut test = Document::<Test>::new(&db).unwrap();

    let rules = vec![Rule::new("x, y", "required")];
    assert!(!test.validate_with(None, Some(rules)).await.unwrap());
    assert_eq!(test.first_error(None), Some("The x, y fields are invalid."));

    let rules = vec![Rule::new("x, y", "required").label("Coordinates")];
    assert!(!test.validate_with(None, Some(rules)).await.unwrap());
    assert_eq!(test.first_error(None), Some("The Coordinates fields are invalid."));

    let rules = vec![Rule::new("x", "required").message("Give me an x.")];
    assert!(!test.validate_with(None, Some(rules)).await.unwrap());
    assert_eq!(test.field_errors("x"), ["Give me an x."]);
}

#[tokio::test]
async fn test_validate_with_assigns_data_first() {
    let db = database();
    let mut test = Document::<Test>::new(&db).unwrap();

    let rules = vec![Rule::new("age", "number").param("min", 18)];
    let valid = test
        .validate_with(Some(doc! { "age": "31", "ignored": true }.into()), Some(rules.clone()))
        .await
        .unwrap();

    assert!(valid);
    assert_eq!(test.get("age"), Some(Value::from(31)));
    assert!(!test.has("ignored"));

    assert!(!test.validate_with(Some(doc! { "age": "12" }.into()), Some(rules.clone())).await.unwrap());
    assert!(!test.validate_with(Some(doc! { "age": "old" }.into()), Some(rules)).await.unwrap());
}

#[tokio::test]
async fn test_scenario_filters_rules() {
    let db = database();
    let rules = vec![Rule::new("a", "required").on("insert")];

    let mut updating = Document::<Test>::with_scenario(&db, SCENARIO_UPDATE).unwrap();
    assert!(updating.validate_with(None, Some(rules.clone())).await.unwrap());

    let mut inserting = Document::<Test>::new(&db).unwrap();
    assert!(!inserting.validate_with(None, Some(rules)).await.unwrap());
}

// ============================================================================
// Built-in validators
// ============================================================================

#[tokio::test]
async fn test_compare_against_other_field() {
    let db = database();
    let rules = vec![
        Rule::new("d", "compare").param("field", "e").param("operator", ">"),
        Rule::new("e", "safe"),
    ];

    let mut test = Document::<Test>::new(&db).unwrap();
    assert!(test.validate_with(Some(doc! { "d": 5, "e": 3 }.into()), Some(rules.clone())).await.unwrap());
    assert!(!test.validate_with(Some(doc! { "d": 1, "e": 3 }.into()), Some(rules)).await.unwrap());
    assert_eq!(test.first_error(Some("d")), Some("The d field is invalid."));
}

#[tokio::test]
async fn test_in_and_nin() {
    let db = database();
    let rules = vec![
        Rule::new("color", "in").param("range", vec!["red", "green"]),
        Rule::new("shade", "nin").param("range", vec!["dark"]),
    ];
    let mut test = Document::<Test>::new(&db).unwrap();

    assert!(test
        .validate_with(Some(doc! { "color": "red", "shade": "light" }.into()), Some(rules.clone()))
        .await
        .unwrap());

    assert!(!test
        .validate_with(Some(doc! { "color": "blue", "shade": "dark" }.into()), Some(rules))
        .await
        .unwrap());
    assert!(test.first_error(Some("color")).is_some());
    assert!(test.first_error(Some("shade")).is_some());
}

#[tokio::test]
async fn test_allow_empty_short_circuits() {
    let db = database();
    let mut test = Document::<Test>::new(&db).unwrap();

    let lenient = vec![Rule::new("email", "email")];
    assert!(test.validate_with(None, Some(lenient)).await.unwrap());

    let strict = vec![Rule::new("email", "email").param("allowEmpty", false)];
    assert!(!test.validate_with(None, Some(strict)).await.unwrap());
}

#[tokio::test]
async fn test_obj_exist() {
    let db = database();
    seed(&db, "test_details", vec![doc! { "_id": 1, "name": "first" }]).await;

    let rules = vec![Rule::new("owner_id", "objExist").param("class", "TestDetail").param("field", "_id")];
    let mut test = Document::<Test>::new(&db).unwrap();

    assert!(test.validate_with(Some(doc! { "owner_id": 1 }.into()), Some(rules.clone())).await.unwrap());
    assert!(!test.validate_with(Some(doc! { "owner_id": 2 }.into()), Some(rules)).await.unwrap());

    let absent = vec![
        Rule::new("owner_id", "objExist")
            .param("class", "TestDetail")
            .param("field", "_id")
            .param("notExist", true),
    ];
    assert!(test.validate_with(Some(doc! { "owner_id": 2 }.into()), Some(absent)).await.unwrap());
}

// ============================================================================
// Validator resolution
// ============================================================================

#[tokio::test]
async fn test_model_validator() {
    let db = database();
    let rules = vec![Rule::new("n", "even")];
    let mut test = Document::<Test>::new(&db).unwrap();

    assert!(test.validate_with(Some(doc! { "n": 4 }.into()), Some(rules.clone())).await.unwrap());
    assert!(!test.validate_with(Some(doc! { "n": 3 }.into()), Some(rules)).await.unwrap());
}

#[tokio::test]
async fn test_registered_validator_is_configured_per_rule() {
    let db = extended_database();
    let mut test = Document::<Test>::new(&db).unwrap();
    test.set("title", "a short title");

    let rules = vec![Rule::new("title", "minWords").param("min", 3)];
    assert!(test.validate_with(None, Some(rules)).await.unwrap());

    let rules = vec![Rule::new("title", "minWords").param("min", 4)];
    assert!(!test.validate_with(None, Some(rules)).await.unwrap());
}

#[tokio::test]
async fn test_behaviour_validator() {
    let db = extended_database();
    let mut test = Document::<Test>::new(&db).unwrap();
    let rules = vec![Rule::new("slug", "lowercase")];
    test.set("slug", "Mixed");

    // Unresolvable until the behaviour is attached.
    let outcome = test.validate_with(None, Some(rules.clone())).await;
    assert!(matches!(outcome, Err(DocumentStoreError::Configuration(_))));

    assert!(test.attach_behaviour("lowercase", &Params::new()).unwrap());
    assert!(!test.validate_with(None, Some(rules.clone())).await.unwrap());

    test.set("slug", "lower");
    assert!(test.validate_with(None, Some(rules)).await.unwrap());
}

#[tokio::test]
async fn test_unknown_validator_is_an_error() {
    let db = database();
    let mut test = Document::<Test>::new(&db).unwrap();
    test.set("a", "x");

    let outcome = test.validate_with(None, Some(vec![Rule::new("a", "noSuchValidator")])).await;
    assert!(matches!(outcome, Err(DocumentStoreError::Configuration(_))));
}

// ============================================================================
// Embedded documents
// ============================================================================

#[tokio::test]
async fn test_embed_one_class_nests_errors() {
    let db = database();
    let mut embed = Document::<TestEmbed>::new(&db).unwrap();
    embed
        .assign(doc! { "detail": { "note": "no name" }, "address": { "city": "Oslo" } }, None)
        .unwrap();
    assert!(matches!(embed.get("detail"), Some(Value::Embedded(_))));

    assert!(!embed.validate().await.unwrap());
    let nested = embed.errors().nested("detail").unwrap();
    assert_eq!(nested.first("name"), Some("Detail needs a name."));
    assert!(embed.errors().first("detail").is_none());

    // The instance is written back as its raw payload.
    assert!(matches!(embed.get("detail"), Some(Value::Bson(Bson::Document(_)))));
}

#[tokio::test]
async fn test_embed_one_rejects_scalars() {
    let db = database();
    let mut embed = Document::<TestEmbed>::new(&db).unwrap();
    embed
        .assign(doc! { "detail": "oops", "address": { "city": "Oslo" } }, None)
        .unwrap();

    assert!(!embed.validate().await.unwrap());
    let detail = embed.errors().nested("detail").unwrap();
    assert_eq!(detail.first(ErrorMap::GLOBAL), Some("The detail field must be a document."));
    assert_eq!(embed.get("detail"), Some(Value::from("oops")));
}

#[tokio::test]
async fn test_embed_many_nests_errors_by_index() {
    let db = database();
    let mut embed = Document::<TestEmbed>::new(&db).unwrap();
    embed
        .assign(
            doc! {
                "details": [{ "name": "kept" }, { "note": "no name" }],
                "address": { "city": "Oslo" },
            },
            None,
        )
        .unwrap();

    assert!(!embed.validate().await.unwrap());
    let details = embed.errors().nested("details").unwrap();
    assert!(details.get("0").is_none());
    assert_eq!(details.nested("1").unwrap().first("name"), Some("Detail needs a name."));
}

#[tokio::test]
async fn test_embed_many_requires_a_list() {
    let db = database();
    let mut embed = Document::<TestEmbed>::new(&db).unwrap();
    embed.set("details", "not a list");
    embed.set("address", doc! { "city": "Oslo" });

    assert!(!embed.validate().await.unwrap());
    let details = embed.errors().nested("details").unwrap();
    assert_eq!(details.first(ErrorMap::GLOBAL), Some("The details field must be a list."));
}

#[tokio::test]
async fn test_nested_rules_filter_and_validate() {
    let db = database();
    let mut embed = Document::<TestEmbed>::new(&db).unwrap();
    embed
        .assign(doc! { "address": { "city": "", "zip": "abc", "extra": 1 } }, None)
        .unwrap();

    assert_eq!(
        embed.get("address"),
        Some(Value::from(doc! { "city": "", "zip": "abc" }))
    );

    assert!(!embed.validate().await.unwrap());
    let address = embed.errors().nested("address").unwrap();
    assert_eq!(address.first("city"), Some("The city field is invalid."));
    assert_eq!(address.first("zip"), Some("The zip field is invalid."));
}

#[tokio::test]
async fn test_embedded_instance_is_written_back() {
    let db = database();
    let mut detail = db.select("TestDetail", None).unwrap().unwrap();
    detail.set_value("name", Value::from("named"));

    let mut embed = Document::<TestEmbed>::new(&db).unwrap();
    embed.set("detail", detail);
    embed.set("address", doc! { "city": "Oslo", "zip": 1234 });

    assert!(embed.validate().await.unwrap());
    match embed.get("detail") {
        Some(Value::Bson(Bson::Document(raw))) => assert_eq!(raw.get_str("name").unwrap(), "named"),
        other => panic!("expected a raw detail, got {other:?}"),
    }
}
