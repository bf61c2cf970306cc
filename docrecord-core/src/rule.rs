//! Declarative validation rules and the error map they produce.
//!
//! A [`Rule`] names one or more fields, the validator to run on them, an optional set of
//! scenarios it is limited to, an optional override message and an open parameter bag.
//! Rules are usually declared in code with the builder methods:
//!
//! ```ignore
//! Rule::new("username, email", "required").on("insert").message("Fill in your account details");
//! Rule::new("age", "number").param("min", 18).param("integerOnly", true);
//! Rule::new("address", "embedOne").rules(vec![Rule::new("city", "required")]);
//! ```
//!
//! They can also be read from a bson descriptor such as
//! `{ "0": "username", "1": "string", "min": 3, "on": "insert" }`.

use bson::{Bson, Document as BsonDocument};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Open bag of validator-specific options.
pub type Params = BsonDocument;

/// Keys of a rule descriptor that are not validator parameters.
const RESERVED_KEYS: &[&str] = &["0", "1", "2", "fields", "validator", "class", "on", "message", "label", "rules"];

/// Splits a comma-or-whitespace separated list, dropping empty entries.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Which embedded-document validator a rule uses, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedKind {
    One,
    Many,
}

/// A declarative validation rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    scope: Vec<String>,
    validator: String,
    on: Option<Vec<String>>,
    message: Option<String>,
    label: Option<String>,
    class: Option<String>,
    rules: Option<Vec<Rule>>,
    params: Params,
}

impl Rule {
    /// Creates a rule for the comma-or-whitespace separated `fields`.
    pub fn new(fields: &str, validator: impl Into<String>) -> Self {
        Rule {
            scope: split_list(fields),
            validator: validator.into(),
            on: None,
            message: None,
            label: None,
            class: None,
            rules: None,
            params: Params::new(),
        }
    }

    /// Adds a validator parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Limits the rule to the listed scenarios.
    pub fn on(mut self, scenarios: &str) -> Self {
        self.on = Some(split_list(scenarios));
        self
    }

    /// Overrides the error reported when the rule fails.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Names the registered document type used for `embedOne`/`embedMany` fields.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Nested rules applied to an `embedOne`/`embedMany` field.
    pub fn rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    pub fn validator(&self) -> &str {
        &self.validator
    }

    pub fn scenarios(&self) -> Option<&[String]> {
        self.on.as_deref()
    }

    pub fn override_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn embed_class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn nested_rules(&self) -> Option<&[Rule]> {
        self.rules.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Returns true when the rule has no scenario filter or lists `scenario`.
    pub fn applies_to(&self, scenario: &str) -> bool {
        self.on
            .as_ref()
            .is_none_or(|scenarios| scenarios.iter().any(|s| s == scenario))
    }

    pub fn embed_kind(&self) -> Option<EmbedKind> {
        match self.validator.as_str() {
            "embedOne" => Some(EmbedKind::One),
            "embedMany" => Some(EmbedKind::Many),
            _ => None,
        }
    }

    /// The message reported when the rule fails: the override if present, otherwise a
    /// sentence naming the label or the fields.
    pub fn failure_message(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }

        let subject = self.label.clone().unwrap_or_else(|| self.scope.join(", "));
        match self.scope.len() {
            1 => format!("The {subject} field is invalid."),
            _ => format!("The {subject} fields are invalid."),
        }
    }
}

impl TryFrom<&BsonDocument> for Rule {
    type Error = DocumentStoreError;

    fn try_from(descriptor: &BsonDocument) -> DocumentStoreResult<Self> {
        let text = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| descriptor.get(*key))
                .map(|value| match value {
                    Bson::String(text) => Ok(text.clone()),
                    Bson::Array(items) => items
                        .iter()
                        .map(|item| item.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                        .map(|items| items.join(","))
                        .ok_or_else(|| DocumentStoreError::configuration(format!(
                            "rule key {} must hold strings", keys[0],
                        ))),
                    other => Err(DocumentStoreError::configuration(format!(
                        "rule key {} must be a string, got {other}", keys[0],
                    ))),
                })
                .transpose()
        };

        let fields = text(&["0", "fields"])?
            .ok_or_else(|| DocumentStoreError::configuration("rule descriptor has no fields"))?;
        let validator = text(&["1", "validator"])?
            .ok_or_else(|| DocumentStoreError::configuration(format!("rule for {fields} has no validator")))?;

        let mut rule = Rule::new(&fields, validator);
        if rule.scope.is_empty() {
            return Err(DocumentStoreError::configuration("rule descriptor has an empty field list"));
        }

        if let Some(scenarios) = text(&["on"])? {
            rule = rule.on(&scenarios);
        }
        if let Some(message) = text(&["message"])? {
            rule = rule.message(message);
        }
        if let Some(label) = text(&["label"])? {
            rule = rule.label(label);
        }
        if let Some(class) = text(&["2", "class"])? {
            rule = rule.class(class);
        }

        if let Some(nested) = descriptor.get("rules") {
            let nested = nested
                .as_array()
                .ok_or_else(|| DocumentStoreError::configuration(format!("nested rules for {fields} must be a list")))?
                .iter()
                .map(|item| match item {
                    Bson::Document(descriptor) => Rule::try_from(descriptor),
                    _ => Err(DocumentStoreError::configuration(format!(
                        "nested rule for {fields} must be a mapping",
                    ))),
                })
                .collect::<DocumentStoreResult<Vec<_>>>()?;
            rule = rule.rules(nested);
        }

        for (key, value) in descriptor {
            if !RESERVED_KEYS.contains(&key.as_str()) {
                rule.params.insert(key.clone(), value.clone());
            }
        }

        Ok(rule)
    }
}

/// Typed accessors over a [`Params`] bag.
pub trait ParamsExt {
    /// Reads a boolean flag; numbers are truthy when non-zero.
    fn flag(&self, key: &str, default: bool) -> bool;
    /// Reads any numeric value (or numeric string) as `f64`.
    fn number(&self, key: &str) -> Option<f64>;
    fn text(&self, key: &str) -> Option<&str>;
    fn list(&self, key: &str) -> Option<&Vec<Bson>>;
}

impl ParamsExt for Params {
    fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Bson::Boolean(value)) => *value,
            Some(Bson::Int32(value)) => *value != 0,
            Some(Bson::Int64(value)) => *value != 0,
            Some(Bson::Null) | None => default,
            Some(_) => default,
        }
    }

    fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(bson_number)
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Bson::as_str)
    }

    fn list(&self, key: &str) -> Option<&Vec<Bson>> {
        self.get(key).and_then(Bson::as_array)
    }
}

/// Reads numbers, and strings that parse as numbers, as `f64`.
pub fn bson_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(value) => Some(f64::from(*value)),
        Bson::Int64(value) => Some(*value as f64),
        Bson::Double(value) => Some(*value),
        Bson::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Errors recorded against one field: its own messages plus errors of nested fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldErrors {
    pub messages: Vec<String>,
    pub nested: ErrorMap,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.nested.is_empty()
    }
}

/// Field name to [`FieldErrors`], in the order errors were first recorded.
///
/// Merging never overwrites: message lists concatenate and nested maps merge key by key,
/// recursively. Because each entry keeps its messages and its nested map apart, a list can
/// never collide with a mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorMap {
    entries: Vec<(String, FieldErrors)>,
}

impl ErrorMap {
    /// Key for errors that belong to no single field.
    pub const GLOBAL: &'static str = "global";

    pub fn new() -> Self {
        ErrorMap::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldErrors> {
        self.entries
            .iter()
            .find(|(key, _)| key == field)
            .map(|(_, errors)| errors)
    }

    /// Messages recorded directly against `field`.
    pub fn messages(&self, field: &str) -> &[String] {
        self.get(field)
            .map(|errors| errors.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Errors of the fields nested under `field`.
    pub fn nested(&self, field: &str) -> Option<&ErrorMap> {
        self.get(field)
            .map(|errors| &errors.nested)
            .filter(|nested| !nested.is_empty())
    }

    /// The first message recorded against `field`.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.messages(field).first().map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldErrors)> {
        self.entries.iter().map(|(key, errors)| (key.as_str(), errors))
    }

    fn entry(&mut self, field: &str) -> &mut FieldErrors {
        let position = match self.entries.iter().position(|(key, _)| key == field) {
            Some(position) => position,
            None => {
                self.entries.push((field.to_string(), FieldErrors::default()));
                self.entries.len() - 1
            }
        };

        &mut self.entries[position].1
    }

    /// Appends a message to `field`.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.entry(field).messages.push(message.into());
    }

    /// Merges `errors` under `field`. Empty maps are ignored.
    pub fn nest(&mut self, field: &str, errors: ErrorMap) {
        if !errors.is_empty() {
            self.entry(field).nested.merge(errors);
        }
    }

    /// Merges `other` into this map.
    pub fn merge(&mut self, other: ErrorMap) {
        for (field, errors) in other.entries {
            if errors.is_empty() {
                continue;
            }

            let entry = self.entry(&field);
            entry.messages.extend(errors.messages);
            entry.nested.merge(errors.nested);
        }
    }

    /// Renders the map as plain bson: a field with only messages maps to the message list,
    /// a field with nested errors maps to a document holding the nested map and, when
    /// present, its own messages under `messages`.
    pub fn to_bson(&self) -> BsonDocument {
        self.entries
            .iter()
            .map(|(field, errors)| {
                let messages = Bson::Array(errors.messages.iter().cloned().map(Bson::String).collect());
                let value = if errors.nested.is_empty() {
                    messages
                } else {
                    let mut nested = errors.nested.to_bson();
                    if !errors.messages.is_empty() {
                        nested.insert("messages", messages);
                    }
                    Bson::Document(nested)
                };
                (field.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_scope_splitting() {
        assert_eq!(Rule::new("a, b ,c d", "required").scope(), &["a", "b", "c", "d"]);
        assert_eq!(Rule::new("  name ", "required").scope(), &["name"]);
    }

    #[test]
    fn test_scenario_filter() {
        let rule = Rule::new("name", "required").on("insert, update");

        assert!(rule.applies_to("insert"));
        assert!(rule.applies_to("update"));
        assert!(!rule.applies_to("search"));
        assert!(Rule::new("name", "required").applies_to("anything"));
    }

    #[test]
    fn test_descriptor_positional() {
        let rule = Rule::try_from(&doc! {
            "0": "username, email",
            "1": "string",
            "min": 3,
            "on": "insert",
            "message": "Too short",
        })
        .unwrap();

        assert_eq!(rule.scope(), &["username", "email"]);
        assert_eq!(rule.validator(), "string");
        assert_eq!(rule.scenarios(), Some(&["insert".to_string()][..]));
        assert_eq!(rule.override_message(), Some("Too short"));
        assert_eq!(rule.params(), &doc! { "min": 3 });
    }

    #[test]
    fn test_descriptor_nested_rules() {
        let rule = Rule::try_from(&doc! {
            "fields": "address",
            "validator": "embedOne",
            "rules": [ { "0": "city", "1": "required" } ],
        })
        .unwrap();

        assert_eq!(rule.embed_kind(), Some(EmbedKind::One));
        assert_eq!(rule.nested_rules().map(<[Rule]>::len), Some(1));
        assert!(rule.params().is_empty());
    }

    #[test]
    fn test_descriptor_class_position() {
        let rule = Rule::try_from(&doc! { "0": "items", "1": "embedMany", "2": "testEmbed" }).unwrap();

        assert_eq!(rule.embed_class(), Some("testEmbed"));
    }

    #[test]
    fn test_malformed_descriptors() {
        assert!(matches!(
            Rule::try_from(&doc! { "1": "required" }),
            Err(DocumentStoreError::Configuration(_))
        ));
        assert!(matches!(
            Rule::try_from(&doc! { "0": "name" }),
            Err(DocumentStoreError::Configuration(_))
        ));
        assert!(matches!(
            Rule::try_from(&doc! { "0": 5, "1": "required" }),
            Err(DocumentStoreError::Configuration(_))
        ));
        assert!(matches!(
            Rule::try_from(&doc! { "0": "a", "1": "embedOne", "rules": "city" }),
            Err(DocumentStoreError::Configuration(_))
        ));
    }

    #[test]
    fn test_default_failure_message() {
        assert_eq!(Rule::new("name", "required").failure_message(), "The name field is invalid.");
        assert_eq!(
            Rule::new("a b", "required").failure_message(),
            "The a, b fields are invalid."
        );
        assert_eq!(
            Rule::new("name", "required").label("Name").message("Needed").failure_message(),
            "Needed"
        );
    }

    #[test]
    fn test_params_accessors() {
        let params = doc! { "allowEmpty": false, "strict": 1, "min": "3", "range": ["a"] };

        assert!(!params.flag("allowEmpty", true));
        assert!(params.flag("strict", false));
        assert!(params.flag("missing", true));
        assert_eq!(params.number("min"), Some(3.0));
        assert_eq!(params.list("range").map(Vec::len), Some(1));
    }

    // ============================================================================
    // Error merge
    // ============================================================================

    #[test]
    fn test_merge_concatenates_messages() {
        let mut left = ErrorMap::new();
        left.add("name", "first");
        let mut right = ErrorMap::new();
        right.add("name", "second");
        right.add(ErrorMap::GLOBAL, "global");

        left.merge(right);

        assert_eq!(left.messages("name"), &["first", "second"]);
        assert_eq!(left.first(ErrorMap::GLOBAL), Some("global"));
        assert_eq!(left.fields().collect::<Vec<_>>(), vec!["name", "global"]);
    }

    #[test]
    fn test_merge_recurses_into_nested_maps() {
        let mut inner_a = ErrorMap::new();
        inner_a.add("city", "required");
        let mut inner_b = ErrorMap::new();
        inner_b.add("city", "too short");
        inner_b.add("zip", "invalid");

        let mut left = ErrorMap::new();
        left.nest("address", inner_a);
        let mut right = ErrorMap::new();
        right.nest("address", inner_b);
        right.add("address", "check the address");

        left.merge(right);

        let nested = left.nested("address").unwrap();
        assert_eq!(nested.messages("city"), &["required", "too short"]);
        assert_eq!(nested.messages("zip"), &["invalid"]);
        assert_eq!(left.messages("address"), &["check the address"]);
    }

    #[test]
    fn test_messages_and_nested_never_collide() {
        let mut nested = ErrorMap::new();
        nested.add("0", "bad item");

        let mut left = ErrorMap::new();
        left.add("items", "list message");
        let mut right = ErrorMap::new();
        right.nest("items", nested);

        left.merge(right);

        let entry = left.get("items").unwrap();
        assert_eq!(entry.messages, vec!["list message".to_string()]);
        assert_eq!(entry.nested.messages("0"), &["bad item"]);
    }

    #[test]
    fn test_empty_entries_are_skipped() {
        let mut map = ErrorMap::new();
        map.nest("address", ErrorMap::new());
        map.merge(ErrorMap::new());

        assert!(map.is_empty());
    }

    #[test]
    fn test_to_bson() {
        let mut nested = ErrorMap::new();
        nested.add("city", "required");
        let mut map = ErrorMap::new();
        map.add("name", "required");
        map.nest("address", nested);
        map.add("address", "bad");

        assert_eq!(
            map.to_bson(),
            doc! {
                "name": ["required"],
                "address": { "city": ["required"], "messages": ["bad"] },
            }
        );
    }
}
