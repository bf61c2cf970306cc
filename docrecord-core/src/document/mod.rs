//! The document: one mapped record.
//!
//! A [`Document<M>`] combines the typed model struct `M`, the schema-less attribute store,
//! attached behaviours, validation state and a cache of resolved relations. Field access goes
//! through [`Document::get`] and [`Document::set`], which route a name to a computed accessor,
//! a structural field of `M`, a relation, or the attribute store, in that order.
//!
//! The operations are split by concern:
//!
//! - persistence (`find_one`, `find`, `insert`, `save`, `remove`, ...)
//! - validation (`validate`, `validate_with`)
//! - mass assignment (`assign`)
//! - relations (`relation`, `with`)
//!
//! [`AnyDocument`] is the type-erased view used wherever the concrete type is only known at
//! runtime: embedded documents, cursor rows and relation results.

use std::{any::Any, collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};

use crate::{
    behaviour::{Behaviour, Behaviours, Event, HookContext},
    collection::Collection,
    database::Database,
    error::{DocumentStoreError, DocumentStoreResult},
    rule::{ErrorMap, Params, Rule},
    schema::{Accessor, Descriptor, FieldKind, Model, dispatch_model},
    value::{AttributeStore, Value},
};

mod assign;
mod persistence;
mod relation;
mod validation;

pub use relation::Related;

/// Scenario of documents that have never been stored.
pub const SCENARIO_INSERT: &str = "insert";
/// Scenario of loaded or stored documents.
pub const SCENARIO_UPDATE: &str = "update";

/// Type-erased access to a document of any registered type.
#[async_trait]
pub trait AnyDocument: Send + Sync {
    fn document_type(&self) -> &'static str;

    fn document_collection(&self) -> &'static str;

    fn primary_key_value(&self) -> Option<Bson>;

    /// Reads a field through the same routing as [`Document::get`].
    fn value(&self, name: &str) -> Option<Value>;

    fn set_value(&mut self, name: &str, value: Value);

    /// Sets every field of a stored row.
    fn hydrate(&mut self, row: BsonDocument);

    /// Mass-assigns `data` through the document's own rules.
    fn assign_data(&mut self, data: AttributeStore) -> DocumentStoreResult<()>;

    /// The persistable payload, nested documents still in place.
    fn payload(&self) -> AttributeStore;

    /// The persistable payload with nested documents flattened.
    fn to_raw(&self) -> BsonDocument;

    fn validation_errors(&self) -> &ErrorMap;

    fn current_scenario(&self) -> &str;

    fn is_new_record(&self) -> bool;

    /// Marks the document as loaded from storage.
    fn mark_loaded(&mut self);

    /// Fires a lifecycle event; returns false when a `before*` handler vetoes.
    fn dispatch(&mut self, event: Event) -> bool;

    async fn validate_any(&mut self) -> DocumentStoreResult<bool>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn clone_box(&self) -> Box<dyn AnyDocument>;
}

impl dyn AnyDocument + '_ {
    pub fn downcast_ref<M: Model>(&self) -> Option<&Document<M>> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<M: Model>(&mut self) -> Option<&mut Document<M>> {
        self.as_any_mut().downcast_mut()
    }

    pub fn downcast<M: Model>(self: Box<Self>) -> Option<Box<Document<M>>> {
        self.into_any().downcast().ok()
    }
}

impl Clone for Box<dyn AnyDocument> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A document of type `M`.
#[derive(Clone)]
pub struct Document<M: Model> {
    model: M,
    descriptor: Arc<Descriptor<M>>,
    database: Database,
    attributes: AttributeStore,
    relations: HashMap<String, Related>,
    behaviours: Behaviours,
    attached_rules: Vec<Rule>,
    scenario: String,
    is_new: bool,
    errors: ErrorMap,
    validated: bool,
    valid: Option<bool>,
}

impl<M: Model> Document<M> {
    /// Constructs a new document in the `insert` scenario.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnregisteredType`] if `M` was never registered, or a
    /// configuration error if a declared behaviour cannot be attached.
    pub fn new(database: &Database) -> DocumentStoreResult<Self> {
        Self::with_scenario(database, SCENARIO_INSERT)
    }

    pub fn with_scenario(database: &Database, scenario: &str) -> DocumentStoreResult<Self> {
        let mut document = Document {
            model: M::default(),
            descriptor: database.descriptor::<M>()?,
            database: database.clone(),
            attributes: AttributeStore::new(),
            relations: HashMap::new(),
            behaviours: Behaviours::default(),
            attached_rules: Vec::new(),
            scenario: scenario.to_string(),
            is_new: true,
            errors: ErrorMap::new(),
            validated: false,
            valid: None,
        };

        document.attach_declared_behaviours()?;
        document.fire(Event::AfterConstruct);

        Ok(document)
    }

    fn attach_declared_behaviours(&mut self) -> DocumentStoreResult<()> {
        for spec in M::behaviours() {
            self.attach_behaviour(&spec.name, &spec.params)?;
        }
        Ok(())
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// The collection documents of this type are stored in.
    pub fn collection(&self) -> Collection {
        self.database.collection(M::collection_name()).keyed_by(M::primary_key())
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn set_scenario(&mut self, scenario: impl Into<String>) {
        self.scenario = scenario.into();
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn set_is_new(&mut self, is_new: bool) {
        self.is_new = is_new;
    }

    pub(crate) fn set_loaded(&mut self) {
        self.is_new = false;
        self.scenario = SCENARIO_UPDATE.to_string();
    }

    /// Sends `event` to the attached behaviours, then to the model.
    ///
    /// Only the model's own `before*` hook decides whether the operation proceeds.
    pub(crate) fn fire(&mut self, event: Event) -> bool {
        let mut ctx = HookContext::new(
            &mut self.attributes,
            &self.scenario,
            self.is_new,
            self.valid,
            M::collection_name(),
        );

        self.behaviours.notify(event, &mut ctx);
        let proceed = dispatch_model(&mut self.model, event, &mut ctx);

        if event.is_gate() && !proceed {
            tracing::debug!(document = M::type_name(), %event, "lifecycle event vetoed");
        }
        proceed
    }

    /// Reads a field.
    ///
    /// Relation names return the cached result, if the relation was resolved before.
    pub fn get(&self, name: &str) -> Option<Value> {
        match self.descriptor.resolve(name) {
            FieldKind::Accessor(accessor) => (accessor.get)(self),
            FieldKind::Structural(field) => Some((field.get)(&self.model)),
            FieldKind::Relation(_) => self.relations.get(name).and_then(Related::to_value),
            FieldKind::Dynamic => self.attributes.get(name).cloned(),
        }
    }

    /// Writes a field.
    ///
    /// A stored document keeps its primary key: writing a different one is ignored.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let descriptor = Arc::clone(&self.descriptor);

        if let Some(Accessor { set: Some(set), .. }) = descriptor.accessor_named(name) {
            set(self, value);
            return;
        }
        if let Some(field) = descriptor.structural(name) {
            (field.set)(&mut self.model, value);
            return;
        }
        if descriptor.relation_named(name).is_some() {
            self.relations.insert(name.to_string(), Related::from(value));
            return;
        }

        if name == M::primary_key()
            && !self.is_new
            && let Some(existing) = self.primary_key()
            && existing != value.to_raw()
        {
            tracing::warn!(document = M::type_name(), "ignoring primary key rewrite of a stored document");
            return;
        }

        self.attributes.set(name, value);
    }

    /// Removes a field. Structural fields are reset to null.
    pub fn unset(&mut self, name: &str) {
        if let Some(field) = self.descriptor.structural(name) {
            (field.set)(&mut self.model, Value::null());
        } else if self.descriptor.relation_named(name).is_some() {
            self.relations.remove(name);
        } else {
            self.attributes.unset(name);
        }
    }

    /// Returns true when the field holds a non-null value.
    pub fn has(&self, name: &str) -> bool {
        match self.descriptor.resolve(name) {
            FieldKind::Relation(_) => self.relations.contains_key(name),
            _ => self.get(name).is_some_and(|value| !value.is_null()),
        }
    }

    /// Sets every entry of `data` through [`Document::set`], without filtering.
    pub fn set_attributes(&mut self, data: impl Into<AttributeStore>) {
        for (name, value) in data.into() {
            self.set(&name, value);
        }
    }

    pub fn primary_key(&self) -> Option<Bson> {
        self.get(M::primary_key())
            .map(Value::into_raw)
            .filter(|id| !matches!(id, Bson::Null | Bson::Undefined))
    }

    /// The persistable payload: attributes plus non-virtual structural fields.
    pub fn document(&self) -> AttributeStore {
        let mut payload = self.attributes.clone();
        for (name, field) in self.descriptor.structural_fields() {
            if !field.is_virtual {
                payload.set(name, (field.get)(&self.model));
            }
        }
        payload
    }

    /// The persistable payload plus virtual fields.
    pub fn attributes(&self) -> AttributeStore {
        let mut attributes = self.document();
        for (name, field) in self.descriptor.structural_fields() {
            if field.is_virtual {
                attributes.set(name, (field.get)(&self.model));
            }
        }
        attributes
    }

    /// The persistable payload with nested documents flattened into plain mappings.
    pub fn raw_document(&self) -> BsonDocument {
        self.document().to_raw()
    }

    pub fn to_json(&self) -> DocumentStoreResult<serde_json::Value> {
        Ok(serde_json::to_value(self.raw_document())?)
    }

    /// Forgets all field values, cached relations and validation state, and re-attaches the
    /// declared behaviours.
    pub fn clean(&mut self) -> DocumentStoreResult<()> {
        self.model = M::default();
        self.attributes.clear();
        self.relations.clear();
        self.errors = ErrorMap::new();
        self.validated = false;
        self.valid = None;
        self.behaviours.clear();

        self.attach_declared_behaviours()
    }

    pub fn behaviours(&self) -> &Behaviours {
        &self.behaviours
    }

    /// Attaches the behaviour registered as `name`.
    ///
    /// Returns `Ok(false)` if a behaviour is already attached under that name.
    pub fn attach_behaviour(&mut self, name: &str, params: &Params) -> DocumentStoreResult<bool> {
        if self.behaviours.contains(name) {
            return Ok(false);
        }

        let mut behaviour = self.database.create_behaviour(name).ok_or_else(|| {
            DocumentStoreError::configuration(format!(
                "{} attaches unknown behaviour {name}",
                M::type_name()
            ))
        })?;
        behaviour.configure(params)?;

        Ok(self.behaviours.attach(name, behaviour))
    }

    pub fn detach_behaviour(&mut self, name: &str) -> bool {
        self.behaviours.detach(name).is_some()
    }

    /// The attached behaviour of type `B`, to reach its own methods.
    pub fn behaviour<B: Behaviour + 'static>(&self) -> Option<&B> {
        self.behaviours.get::<B>()
    }

    pub fn behaviour_mut<B: Behaviour + 'static>(&mut self) -> Option<&mut B> {
        self.behaviours.get_mut::<B>()
    }

    /// The static rules of `M` followed by the rules attached to this instance.
    pub fn rules(&self) -> Vec<Rule> {
        let mut rules = M::rules();
        rules.extend(self.attached_rules.iter().cloned());
        rules
    }

    pub fn attach_rule(&mut self, rule: Rule) {
        self.attached_rules.push(rule);
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors.messages(field)
    }

    /// The first message for `field`, or for the global entry when `field` is `None`.
    pub fn first_error(&self, field: Option<&str>) -> Option<&str> {
        self.errors.first(field.unwrap_or(ErrorMap::GLOBAL))
    }

    /// Records a message against `field`, or against the global entry.
    pub fn add_error(&mut self, message: impl Into<String>, field: Option<&str>) {
        self.errors.add(field.unwrap_or(ErrorMap::GLOBAL), message);
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// The outcome of the last validation; false if none ran.
    pub fn is_valid(&self) -> bool {
        self.valid.unwrap_or(false)
    }
}

impl<M: Model + fmt::Debug> fmt::Debug for Document<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("type", &M::type_name())
            .field("model", &self.model)
            .field("attributes", &self.attributes)
            .field("scenario", &self.scenario)
            .field("is_new", &self.is_new)
            .finish()
    }
}

#[async_trait]
impl<M: Model> AnyDocument for Document<M> {
    fn document_type(&self) -> &'static str {
        M::type_name()
    }

    fn document_collection(&self) -> &'static str {
        M::collection_name()
    }

    fn primary_key_value(&self) -> Option<Bson> {
        self.primary_key()
    }

    fn value(&self, name: &str) -> Option<Value> {
        self.get(name)
    }

    fn set_value(&mut self, name: &str, value: Value) {
        self.set(name, value);
    }

    fn hydrate(&mut self, row: BsonDocument) {
        self.set_attributes(row);
    }

    fn assign_data(&mut self, data: AttributeStore) -> DocumentStoreResult<()> {
        self.assign(data, None)
    }

    fn payload(&self) -> AttributeStore {
        self.document()
    }

    fn to_raw(&self) -> BsonDocument {
        self.raw_document()
    }

    fn validation_errors(&self) -> &ErrorMap {
        &self.errors
    }

    fn current_scenario(&self) -> &str {
        &self.scenario
    }

    fn is_new_record(&self) -> bool {
        self.is_new
    }

    fn mark_loaded(&mut self) {
        self.set_loaded();
    }

    fn dispatch(&mut self, event: Event) -> bool {
        self.fire(event)
    }

    async fn validate_any(&mut self) -> DocumentStoreResult<bool> {
        self.validate().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_box(&self) -> Box<dyn AnyDocument> {
        Box::new(self.clone())
    }
}
