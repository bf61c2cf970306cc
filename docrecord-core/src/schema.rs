//! Document type definitions.
//!
//! A document type is a plain Rust struct implementing [`Model`]. The struct holds the
//! fields declared in code (structural and virtual fields); everything else a stored row
//! contains lives in the document's schema-less attribute store.
//!
//! Each type describes itself once through a [`Descriptor`]: the registry of accessors,
//! structural fields, relations and type-specific validators consulted by attribute
//! access and validation. Descriptors are built when the type is registered with the
//! [`DatabaseBuilder`](crate::database::DatabaseBuilder), never per access.
//!
//! ```ignore
//! #[derive(Debug, Clone, Default)]
//! struct User {
//!     last_event: Option<String>,
//! }
//!
//! impl Model for User {
//!     fn type_name() -> &'static str { "user" }
//!     fn collection_name() -> &'static str { "users" }
//!
//!     fn descriptor() -> Descriptor<Self> {
//!         Descriptor::<Self>::new()
//!             .virtual_field("lastEvent", |user| user.last_event.clone().into(), |user, value| {
//!                 user.last_event = value.as_str().map(str::to_string);
//!             })
//!             .relation("posts", Relation::many("post", "user_id"))
//!     }
//!
//!     fn rules() -> Vec<Rule> {
//!         vec![Rule::new("username", "required")]
//!     }
//! }
//! ```

use std::collections::HashMap;

use bson::Bson;

use crate::{
    behaviour::{Event, HookContext},
    document::Document,
    query::Expr,
    rule::{Params, Rule},
    value::Value,
};

/// A document type mapped to a collection.
///
/// Lifecycle hooks default to no-ops; `before_*` hooks return `true` to let the operation
/// proceed and `false` to veto it.
pub trait Model: Clone + Default + Send + Sync + 'static {
    /// Short name the type is registered and resolved under.
    fn type_name() -> &'static str;

    /// The collection rows of this type are stored in.
    fn collection_name() -> &'static str;

    /// Primary key field.
    fn primary_key() -> &'static str {
        "_id"
    }

    /// Accessors, structural fields, relations and validators of this type.
    fn descriptor() -> Descriptor<Self> {
        Descriptor::new()
    }

    /// Statically declared validation rules.
    fn rules() -> Vec<Rule> {
        Vec::new()
    }

    /// Behaviours attached on construction, by registered name.
    fn behaviours() -> Vec<BehaviourSpec> {
        Vec::new()
    }

    fn after_construct(&mut self, _ctx: &mut HookContext<'_>) {}

    fn before_find(&mut self, _ctx: &mut HookContext<'_>) -> bool {
        true
    }

    fn after_find(&mut self, _ctx: &mut HookContext<'_>) {}

    fn before_validate(&mut self, _ctx: &mut HookContext<'_>) -> bool {
        true
    }

    fn after_validate(&mut self, _ctx: &mut HookContext<'_>, _valid: bool) {}

    fn before_save(&mut self, _ctx: &mut HookContext<'_>) -> bool {
        true
    }

    fn after_save(&mut self, _ctx: &mut HookContext<'_>) {}

    fn before_delete(&mut self, _ctx: &mut HookContext<'_>) -> bool {
        true
    }

    fn after_delete(&mut self, _ctx: &mut HookContext<'_>) {}
}

pub(crate) fn dispatch_model<M: Model>(model: &mut M, event: Event, ctx: &mut HookContext<'_>) -> bool {
    match event {
        Event::AfterConstruct => {
            model.after_construct(ctx);
            true
        }
        Event::BeforeFind => model.before_find(ctx),
        Event::AfterFind => {
            model.after_find(ctx);
            true
        }
        Event::BeforeValidate => model.before_validate(ctx),
        Event::AfterValidate => {
            let valid = ctx.valid().unwrap_or(false);
            model.after_validate(ctx, valid);
            true
        }
        Event::BeforeSave => model.before_save(ctx),
        Event::AfterSave => {
            model.after_save(ctx);
            true
        }
        Event::BeforeDelete => model.before_delete(ctx),
        Event::AfterDelete => {
            model.after_delete(ctx);
            true
        }
    }
}

/// A behaviour a type attaches on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviourSpec {
    pub name: String,
    pub params: Params,
}

impl BehaviourSpec {
    pub fn new(name: impl Into<String>) -> Self {
        BehaviourSpec { name: name.into(), params: Params::new() }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl From<&str> for BehaviourSpec {
    fn from(name: &str) -> Self {
        BehaviourSpec::new(name)
    }
}

/// Whether a relation yields one document or a cursor of documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    One,
    Many,
}

/// How to find documents related to this one.
///
/// The target's `foreign_key` is matched against this document's `local_key`
/// (the primary key unless [`Relation::on`] names another field). A list-valued local key
/// matches any of its entries; a `{ "$ref": .., "$id": .. }` reference is followed directly.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    kind: RelationKind,
    target: String,
    foreign_key: String,
    local_key: Option<String>,
    condition: Option<Expr>,
}

impl Relation {
    pub fn one(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::new(RelationKind::One, target, foreign_key)
    }

    pub fn many(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation::new(RelationKind::Many, target, foreign_key)
    }

    fn new(kind: RelationKind, target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Relation {
            kind,
            target: target.into(),
            foreign_key: foreign_key.into(),
            local_key: None,
            condition: None,
        }
    }

    /// Reads the local key from `field` instead of the primary key.
    pub fn on(mut self, field: impl Into<String>) -> Self {
        self.local_key = Some(field.into());
        self
    }

    /// Adds a condition every related document must also satisfy.
    pub fn filter(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn local_key(&self) -> Option<&str> {
        self.local_key.as_deref()
    }

    pub fn condition(&self) -> Option<&Expr> {
        self.condition.as_ref()
    }
}

/// Computed accessor: reads (and optionally writes) a field through the whole document.
pub struct Accessor<M: Model> {
    pub get: fn(&Document<M>) -> Option<Value>,
    pub set: Option<fn(&mut Document<M>, Value)>,
}

/// A field stored on the model struct itself.
pub struct StructuralField<M> {
    pub get: fn(&M) -> Value,
    pub set: fn(&mut M, Value),
    /// Virtual fields are computed state, never persisted.
    pub is_virtual: bool,
}

/// Validator function declared by the type itself.
pub type ModelValidator<M> = fn(&Document<M>, &str, &Value, &Params) -> bool;

/// The kind a field name resolves to, in lookup order.
pub enum FieldKind<'a, M: Model> {
    Accessor(&'a Accessor<M>),
    Structural(&'a StructuralField<M>),
    Relation(&'a Relation),
    Dynamic,
}

/// Field registry of a document type.
pub struct Descriptor<M: Model> {
    accessors: HashMap<String, Accessor<M>>,
    fields: Vec<(String, StructuralField<M>)>,
    relations: Vec<(String, Relation)>,
    validators: HashMap<String, ModelValidator<M>>,
}

impl<M: Model> Default for Descriptor<M> {
    fn default() -> Self {
        Descriptor {
            accessors: HashMap::new(),
            fields: Vec::new(),
            relations: Vec::new(),
            validators: HashMap::new(),
        }
    }
}

impl<M: Model> Descriptor<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a read-only computed field.
    pub fn getter(mut self, name: impl Into<String>, get: fn(&Document<M>) -> Option<Value>) -> Self {
        self.accessors.insert(name.into(), Accessor { get, set: None });
        self
    }

    /// Registers a computed field with a setter.
    pub fn accessor(
        mut self,
        name: impl Into<String>,
        get: fn(&Document<M>) -> Option<Value>,
        set: fn(&mut Document<M>, Value),
    ) -> Self {
        self.accessors.insert(name.into(), Accessor { get, set: Some(set) });
        self
    }

    /// Registers a persisted field held on the model struct.
    pub fn field(mut self, name: impl Into<String>, get: fn(&M) -> Value, set: fn(&mut M, Value)) -> Self {
        self.fields.push((name.into(), StructuralField { get, set, is_virtual: false }));
        self
    }

    /// Registers a computed field held on the model struct and excluded from persistence.
    pub fn virtual_field(mut self, name: impl Into<String>, get: fn(&M) -> Value, set: fn(&mut M, Value)) -> Self {
        self.fields.push((name.into(), StructuralField { get, set, is_virtual: true }));
        self
    }

    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.push((name.into(), relation));
        self
    }

    /// Registers a validator callable by name from this type's rules.
    pub fn validator(mut self, name: impl Into<String>, validator: ModelValidator<M>) -> Self {
        self.validators.insert(name.into(), validator);
        self
    }

    /// Resolves `name` through accessors, structural fields and relations, in that order.
    pub fn resolve(&self, name: &str) -> FieldKind<'_, M> {
        if let Some(accessor) = self.accessors.get(name) {
            return FieldKind::Accessor(accessor);
        }
        if let Some(field) = self.structural(name) {
            return FieldKind::Structural(field);
        }
        if let Some(relation) = self.relation_named(name) {
            return FieldKind::Relation(relation);
        }
        FieldKind::Dynamic
    }

    pub fn accessor_named(&self, name: &str) -> Option<&Accessor<M>> {
        self.accessors.get(name)
    }

    pub fn structural(&self, name: &str) -> Option<&StructuralField<M>> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, field)| field)
    }

    pub fn relation_named(&self, name: &str) -> Option<&Relation> {
        self.relations
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, relation)| relation)
    }

    pub fn structural_fields(&self) -> impl Iterator<Item = (&str, &StructuralField<M>)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.relations.iter().map(|(name, relation)| (name.as_str(), relation))
    }

    pub fn model_validator(&self, name: &str) -> Option<ModelValidator<M>> {
        self.validators.get(name).copied()
    }
}
