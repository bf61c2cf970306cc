use bson::Bson;

use super::Document;
use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    rule::{EmbedKind, Rule},
    schema::Model,
    value::{AttributeStore, Value},
};

impl<M: Model> Document<M> {
    /// Mass-assigns `data`, keeping only the fields named by a rule active in the current
    /// scenario.
    ///
    /// Uses the document's own rules unless `rules` is given. Digit-only strings become
    /// integers, embedded fields are filtered through their nested rules or turned into
    /// instances of their class, and whitelisted fields missing from `data` are set to null.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an embedded rule has neither nested rules nor a
    /// resolvable class.
    pub fn assign(&mut self, data: impl Into<AttributeStore>, rules: Option<&[Rule]>) -> DocumentStoreResult<()> {
        let data = data.into();
        let own_rules;
        let rules = match rules {
            Some(rules) => rules,
            None => {
                own_rules = self.rules();
                &own_rules
            }
        };

        let current = self.attributes();
        let filtered = self.filter_assignment(&data, rules, &current)?;
        self.set_attributes(filtered);
        Ok(())
    }

    fn filter_assignment(
        &self,
        data: &AttributeStore,
        rules: &[Rule],
        current: &AttributeStore,
    ) -> DocumentStoreResult<AttributeStore> {
        let mut assigned = AttributeStore::new();

        for rule in rules.iter().filter(|rule| rule.applies_to(&self.scenario)) {
            for field in rule.scope() {
                if assigned.contains_key(field) {
                    continue;
                }

                let value = match (data.get(field), rule.embed_kind()) {
                    (Some(incoming), Some(kind)) if !incoming.is_empty(false) => {
                        self.assign_embedded(kind, rule, field, incoming, current.get(field))?
                    }
                    (Some(incoming), _) => cast_digits(incoming.clone()),
                    (None, _) => Value::null(),
                };
                assigned.set(field.as_str(), value);
            }
        }

        Ok(assigned)
    }

    fn assign_embedded(
        &self,
        kind: EmbedKind,
        rule: &Rule,
        field: &str,
        incoming: &Value,
        existing: Option<&Value>,
    ) -> DocumentStoreResult<Value> {
        match kind {
            EmbedKind::One => self.assign_embedded_one(rule, field, incoming, existing),
            EmbedKind::Many => {
                // Validation reports anything that is not a list.
                let Some(items) = list_items(incoming) else {
                    return Ok(incoming.clone());
                };
                let existing = existing.and_then(list_items).unwrap_or_default();

                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| {
                        self.assign_embedded_one(rule, &format!("{field}.{index}"), item, existing.get(index))
                    })
                    .collect::<DocumentStoreResult<Vec<_>>>()
                    .map(Value::List)
            }
        }
    }

    fn assign_embedded_one(
        &self,
        rule: &Rule,
        path: &str,
        incoming: &Value,
        existing: Option<&Value>,
    ) -> DocumentStoreResult<Value> {
        if !matches!(incoming, Value::Embedded(_) | Value::Bson(Bson::Document(_))) {
            return Ok(incoming.clone());
        }

        if let Some(rules) = rule.nested_rules() {
            let current = existing.map(as_store).unwrap_or_default();
            let filtered = self.filter_assignment(&as_store(incoming), rules, &current)?;
            return Ok(Value::Bson(Bson::Document(filtered.to_raw())));
        }

        if let Value::Embedded(_) = incoming {
            return Ok(incoming.clone());
        }

        if let Some(Value::Embedded(document)) = existing {
            let mut document = document.clone();
            document.assign_data(as_store(incoming))?;
            return Ok(Value::Embedded(document));
        }

        let Some(class) = rule.embed_class() else {
            return Err(DocumentStoreError::configuration(format!(
                "embedded field {path} of {} needs nested rules or a class",
                M::type_name()
            )));
        };
        let mut document = self.database.select(class, None)?.ok_or_else(|| {
            DocumentStoreError::configuration(format!(
                "embedded field {path} of {} names unknown type {class}",
                M::type_name()
            ))
        })?;

        if let Some(Value::Bson(Bson::Document(stored))) = existing {
            document.hydrate(stored.clone());
        }
        document.assign_data(as_store(incoming))?;

        Ok(Value::Embedded(document))
    }
}

/// Casts a string of ASCII digits to the smallest integer type holding it.
fn cast_digits(value: Value) -> Value {
    let Value::Bson(Bson::String(text)) = &value else {
        return value;
    };
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return value;
    }

    match text.parse::<i64>() {
        Ok(number) => match i32::try_from(number) {
            Ok(small) => Value::Bson(Bson::Int32(small)),
            Err(_) => Value::Bson(Bson::Int64(number)),
        },
        Err(_) => value,
    }
}

fn as_store(value: &Value) -> AttributeStore {
    match value {
        Value::Embedded(document) => document.payload(),
        Value::Bson(Bson::Document(map)) => AttributeStore::from(map.clone()),
        _ => AttributeStore::new(),
    }
}

fn list_items(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::List(items) => Some(items.clone()),
        Value::Bson(Bson::Array(items)) => Some(items.iter().cloned().map(Value::Bson).collect()),
        _ => None,
    }
}
