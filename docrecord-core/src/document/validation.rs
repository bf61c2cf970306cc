use bson::Bson;
use futures::{FutureExt, future::BoxFuture};

use super::Document;
use crate::{
    behaviour::Event,
    error::{DocumentStoreError, DocumentStoreResult},
    rule::{EmbedKind, ErrorMap, Rule},
    schema::Model,
    validator::{ValidationContext, builtin},
    value::{AttributeStore, Value},
};

impl<M: Model> Document<M> {
    /// Validates the document against its rules for the current scenario.
    ///
    /// Returns `Ok(false)` when a rule fails or `beforeValidate` vetoes; the failures are
    /// available through [`Document::errors`]. Unresolvable validators and malformed
    /// embedded rules are errors, never validation failures.
    pub async fn validate(&mut self) -> DocumentStoreResult<bool> {
        self.validate_with(None, None).await
    }

    /// Validates after mass-assigning `data`, against `rules` instead of the document's own
    /// when given.
    pub async fn validate_with(
        &mut self,
        data: Option<AttributeStore>,
        rules: Option<Vec<Rule>>,
    ) -> DocumentStoreResult<bool> {
        self.errors = ErrorMap::new();
        if !self.fire(Event::BeforeValidate) {
            return Ok(false);
        }

        if let Some(data) = data {
            self.assign(data, rules.as_deref())?;
        }
        let rules = rules.unwrap_or_else(|| self.rules());

        let mut payload = self.document();
        let mut written = Vec::new();
        let errors = self.check_rules(&rules, &mut payload, &mut written).await?;

        // Embedded documents come back as their raw payloads.
        for field in written {
            if let Some(value) = payload.unset(&field) {
                self.set(&field, value);
            }
        }

        let valid = errors.is_empty();
        self.errors = errors;
        self.validated = true;
        self.valid = Some(valid);
        self.fire(Event::AfterValidate);

        Ok(valid)
    }

    /// Checks `rules` against `payload`, recording in `written` every field whose embedded
    /// documents were replaced by their raw payload.
    fn check_rules<'a>(
        &'a self,
        rules: &'a [Rule],
        payload: &'a mut AttributeStore,
        written: &'a mut Vec<String>,
    ) -> BoxFuture<'a, DocumentStoreResult<ErrorMap>> {
        async move {
            let mut errors = ErrorMap::new();
            for rule in rules {
                errors.merge(self.check_rule(rule, payload, written).await?);
            }
            Ok(errors)
        }
        .boxed()
    }

    async fn check_rule(
        &self,
        rule: &Rule,
        payload: &mut AttributeStore,
        written: &mut Vec<String>,
    ) -> DocumentStoreResult<ErrorMap> {
        let mut errors = ErrorMap::new();
        if !rule.applies_to(&self.scenario) {
            return Ok(errors);
        }

        let mut valid = true;
        for field in rule.scope() {
            match rule.embed_kind() {
                Some(kind) => {
                    let nested = self.check_embedded(kind, rule, field, payload, written).await?;
                    if !nested.is_empty() {
                        valid = false;
                        errors.nest(field, nested);
                    }
                }
                None => {
                    let value = payload.get(field).cloned().unwrap_or_default();
                    if !self.run_validator(rule, field, &value).await? {
                        valid = false;
                    }
                }
            }
        }

        if !valid {
            // Embedded failures already carry their nested messages.
            let message = match rule.embed_kind() {
                Some(_) => rule.override_message().map(str::to_string),
                None => Some(rule.failure_message()),
            };
            if let Some(message) = message {
                let key = match rule.scope() {
                    [field] => field.as_str(),
                    _ => ErrorMap::GLOBAL,
                };
                errors.add(key, message);
            }
        }

        Ok(errors)
    }

    async fn run_validator(&self, rule: &Rule, field: &str, value: &Value) -> DocumentStoreResult<bool> {
        let name = rule.validator();
        let params = rule.params();

        let ctx = ValidationContext::new(self, &self.database);
        if let Some(outcome) = builtin::run(name, &ctx, field, value, params).await? {
            return Ok(outcome);
        }

        if let Some(mut validator) = self.database.create_validator(name) {
            validator.configure(params)?;
            return validator.validate(self, field, value).await;
        }

        if let Some(validator) = self.descriptor.model_validator(name) {
            return Ok(validator(self, field, value, params));
        }

        if let Some(outcome) = self
            .behaviours
            .iter()
            .find_map(|behaviour| behaviour.validate(name, field, value, params))
        {
            return Ok(outcome);
        }

        Err(DocumentStoreError::configuration(format!(
            "validator {name} for {field} of {} cannot be resolved",
            M::type_name()
        )))
    }

    async fn check_embedded(
        &self,
        kind: EmbedKind,
        rule: &Rule,
        field: &str,
        payload: &mut AttributeStore,
        written: &mut Vec<String>,
    ) -> DocumentStoreResult<ErrorMap> {
        let current = payload.get(field).cloned().unwrap_or_default();

        match kind {
            EmbedKind::One => {
                let mut value = current;
                let (errors, changed) = self.check_embedded_value(rule, field, &mut value).await?;
                if changed {
                    payload.set(field, value);
                    written.push(field.to_string());
                }
                Ok(errors)
            }
            EmbedKind::Many => {
                let mut items = match current {
                    Value::List(items) => items,
                    Value::Bson(Bson::Array(items)) => items.into_iter().map(Value::Bson).collect(),
                    value if value.is_empty(false) => Vec::new(),
                    _ => {
                        let mut errors = ErrorMap::new();
                        errors.add(ErrorMap::GLOBAL, format!("The {field} field must be a list."));
                        return Ok(errors);
                    }
                };

                let mut errors = ErrorMap::new();
                let mut changed = false;
                for (index, item) in items.iter_mut().enumerate() {
                    let path = format!("{field}.{index}");
                    let (item_errors, item_changed) = self.check_embedded_value(rule, &path, item).await?;
                    errors.nest(&index.to_string(), item_errors);
                    changed |= item_changed;
                }

                if changed {
                    payload.set(field, Value::List(items));
                    written.push(field.to_string());
                }
                Ok(errors)
            }
        }
    }

    /// Validates one embedded value. Returns its errors and whether `value` was rewritten.
    async fn check_embedded_value(
        &self,
        rule: &Rule,
        path: &str,
        value: &mut Value,
    ) -> DocumentStoreResult<(ErrorMap, bool)> {
        if let Some(rules) = rule.nested_rules() {
            let mut nested = match &*value {
                Value::Embedded(document) => document.payload(),
                Value::Bson(Bson::Document(map)) => AttributeStore::from(map.clone()),
                _ => AttributeStore::new(),
            };
            let mut nested_written = Vec::new();
            let errors = self.check_rules(rules, &mut nested, &mut nested_written).await?;

            let changed = !nested_written.is_empty();
            if changed {
                match value {
                    Value::Embedded(document) => {
                        for field in nested_written {
                            if let Some(rewritten) = nested.unset(&field) {
                                document.set_value(&field, rewritten);
                            }
                        }
                    }
                    _ => *value = Value::Bson(Bson::Document(nested.to_raw())),
                }
            }
            return Ok((errors, changed));
        }

        if let Value::Embedded(document) = value {
            document.validate_any().await?;
            let errors = document.validation_errors().clone();
            let raw = document.to_raw();
            *value = Value::Bson(Bson::Document(raw));
            return Ok((errors, true));
        }

        if value.is_empty(false) {
            return Ok((ErrorMap::new(), false));
        }

        let Some(class) = rule.embed_class() else {
            return Err(DocumentStoreError::configuration(format!(
                "embedded field {path} of {} needs nested rules or a class",
                M::type_name()
            )));
        };
        let Value::Bson(Bson::Document(map)) = &*value else {
            let mut errors = ErrorMap::new();
            errors.add(ErrorMap::GLOBAL, format!("The {path} field must be a document."));
            return Ok((errors, false));
        };

        let mut instance = self.database.select(class, None)?.ok_or_else(|| {
            DocumentStoreError::configuration(format!(
                "embedded field {path} of {} names unknown type {class}",
                M::type_name()
            ))
        })?;
        instance.hydrate(map.clone());
        instance.validate_any().await?;

        Ok((instance.validation_errors().clone(), false))
    }
}
