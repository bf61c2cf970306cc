//! Attachable lifecycle behaviours.
//!
//! A [`Behaviour`] receives the same lifecycle events as the document it is attached to.
//! Behaviours are registered by name on the [`DatabaseBuilder`](crate::database::DatabaseBuilder),
//! declared per document type through [`Model::behaviours`](crate::schema::Model::behaviours),
//! and attached when a document is constructed, in declaration order.
//!
//! Extra capabilities are exposed statically: callers reach a behaviour's own methods with
//! [`Document::behaviour`](crate::document::Document::behaviour), and a behaviour can
//! contribute named validators through [`Behaviour::validate`].

use std::{any::Any, fmt};

use bson::{Bson, DateTime};

use crate::{
    error::DocumentStoreResult,
    rule::{Params, ParamsExt},
    value::{AttributeStore, Value},
};

/// The lifecycle transition points of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    AfterConstruct,
    BeforeFind,
    AfterFind,
    BeforeValidate,
    AfterValidate,
    BeforeSave,
    AfterSave,
    BeforeDelete,
    AfterDelete,
}

impl Event {
    pub fn name(self) -> &'static str {
        match self {
            Event::AfterConstruct => "afterConstruct",
            Event::BeforeFind => "beforeFind",
            Event::AfterFind => "afterFind",
            Event::BeforeValidate => "beforeValidate",
            Event::AfterValidate => "afterValidate",
            Event::BeforeSave => "beforeSave",
            Event::AfterSave => "afterSave",
            Event::BeforeDelete => "beforeDelete",
            Event::AfterDelete => "afterDelete",
        }
    }

    /// Returns true for the `before*` events, whose handlers can veto the operation.
    pub fn is_gate(self) -> bool {
        matches!(
            self,
            Event::BeforeFind | Event::BeforeValidate | Event::BeforeSave | Event::BeforeDelete
        )
    }

    pub(crate) fn notify(self, behaviour: &mut dyn Behaviour, ctx: &mut HookContext<'_>) {
        match self {
            Event::AfterConstruct => behaviour.after_construct(ctx),
            Event::BeforeFind => behaviour.before_find(ctx),
            Event::AfterFind => behaviour.after_find(ctx),
            Event::BeforeValidate => behaviour.before_validate(ctx),
            Event::AfterValidate => behaviour.after_validate(ctx),
            Event::BeforeSave => behaviour.before_save(ctx),
            Event::AfterSave => behaviour.after_save(ctx),
            Event::BeforeDelete => behaviour.before_delete(ctx),
            Event::AfterDelete => behaviour.after_delete(ctx),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The owning document's state, handed to every lifecycle handler.
pub struct HookContext<'a> {
    /// The document's schema-less attributes.
    pub attributes: &'a mut AttributeStore,
    scenario: &'a str,
    is_new: bool,
    valid: Option<bool>,
    collection: &'static str,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(
        attributes: &'a mut AttributeStore,
        scenario: &'a str,
        is_new: bool,
        valid: Option<bool>,
        collection: &'static str,
    ) -> Self {
        HookContext { attributes, scenario, is_new, valid, collection }
    }

    pub fn scenario(&self) -> &str {
        self.scenario
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// The outcome of the last validation; set during `afterValidate`.
    pub fn valid(&self) -> Option<bool> {
        self.valid
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }
}

/// Cloning and downcasting support for boxed behaviours.
///
/// Implemented automatically for every `Behaviour + Clone`.
pub trait BehaviourBox: Send + Sync {
    fn clone_box(&self) -> Box<dyn Behaviour>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<B: Behaviour + Clone + 'static> BehaviourBox for B {
    fn clone_box(&self) -> Box<dyn Behaviour> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A pluggable object receiving a document's lifecycle events.
///
/// Every hook defaults to a no-op. Hooks run for their side effects only; vetoing an
/// operation is left to the document's own [`Model`](crate::schema::Model) hooks.
pub trait Behaviour: BehaviourBox {
    /// Applies the options given when the behaviour is attached.
    fn configure(&mut self, params: &Params) -> DocumentStoreResult<()> {
        let _ = params;
        Ok(())
    }

    fn after_construct(&mut self, _ctx: &mut HookContext<'_>) {}

    fn before_find(&mut self, _ctx: &mut HookContext<'_>) {}

    fn after_find(&mut self, _ctx: &mut HookContext<'_>) {}

    fn before_validate(&mut self, _ctx: &mut HookContext<'_>) {}

    fn after_validate(&mut self, _ctx: &mut HookContext<'_>) {}

    fn before_save(&mut self, _ctx: &mut HookContext<'_>) {}

    fn after_save(&mut self, _ctx: &mut HookContext<'_>) {}

    fn before_delete(&mut self, _ctx: &mut HookContext<'_>) {}

    fn after_delete(&mut self, _ctx: &mut HookContext<'_>) {}

    /// Runs the validator named `validator` if this behaviour provides it.
    ///
    /// Returns `None` when the name is not one of this behaviour's validators.
    fn validate(&self, validator: &str, field: &str, value: &Value, params: &Params) -> Option<bool> {
        let _ = (validator, field, value, params);
        None
    }
}

impl Clone for Box<dyn Behaviour> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Behaviours attached to one document, in attachment order.
#[derive(Clone, Default)]
pub struct Behaviours {
    attached: Vec<(String, Box<dyn Behaviour>)>,
}

impl Behaviours {
    /// Attaches `behaviour` under `name`. Returns false, leaving the existing behaviour in
    /// place, if the name is already attached.
    pub fn attach(&mut self, name: impl Into<String>, behaviour: Box<dyn Behaviour>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }

        self.attached.push((name, behaviour));
        true
    }

    pub fn detach(&mut self, name: &str) -> Option<Box<dyn Behaviour>> {
        let position = self.attached.iter().position(|(key, _)| key == name)?;

        Some(self.attached.remove(position).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.attached.iter().any(|(key, _)| key == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attached.iter().map(|(key, _)| key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }

    pub fn clear(&mut self) {
        self.attached.clear();
    }

    /// The first attached behaviour of type `B`.
    pub fn get<B: Behaviour + 'static>(&self) -> Option<&B> {
        self.attached
            .iter()
            .find_map(|(_, behaviour)| behaviour.as_any().downcast_ref::<B>())
    }

    pub fn get_mut<B: Behaviour + 'static>(&mut self) -> Option<&mut B> {
        self.attached
            .iter_mut()
            .find_map(|(_, behaviour)| behaviour.as_any_mut().downcast_mut::<B>())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &dyn Behaviour> {
        self.attached.iter().map(|(_, behaviour)| behaviour.as_ref())
    }

    /// Sends `event` to every behaviour in attachment order.
    pub(crate) fn notify(&mut self, event: Event, ctx: &mut HookContext<'_>) {
        for (name, behaviour) in self.attached.iter_mut() {
            tracing::trace!(behaviour = %name, %event, "notifying behaviour");
            event.notify(behaviour.as_mut(), ctx);
        }
    }
}

impl fmt::Debug for Behaviours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Stamps `created` on first save and `updated` on every later save.
///
/// Options: `created` and `updated` rename the two fields.
#[derive(Debug, Clone)]
pub struct Timestamp {
    created: String,
    updated: String,
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp {
            created: "created".to_string(),
            updated: "updated".to_string(),
        }
    }
}

impl Timestamp {
    /// Describes how long ago `time` was, e.g. `"5 minutes ago"`.
    pub fn ago(&self, time: DateTime) -> String {
        let elapsed = (DateTime::now().timestamp_millis() - time.timestamp_millis()) / 1000;

        match elapsed {
            i64::MIN..60 => "just now".to_string(),
            60..3_600 => plural(elapsed / 60, "minute"),
            3_600..86_400 => plural(elapsed / 3_600, "hour"),
            86_400..2_592_000 => plural(elapsed / 86_400, "day"),
            _ => match chrono::DateTime::from_timestamp_millis(time.timestamp_millis()) {
                Some(time) => time.format("%d/%m/%Y").to_string(),
                None => plural(elapsed / 86_400, "day"),
            },
        }
    }

    pub fn created_field(&self) -> &str {
        &self.created
    }

    pub fn updated_field(&self) -> &str {
        &self.updated
    }
}

fn plural(count: i64, unit: &str) -> String {
    match count {
        1 => format!("1 {unit} ago"),
        _ => format!("{count} {unit}s ago"),
    }
}

impl Behaviour for Timestamp {
    fn configure(&mut self, params: &Params) -> DocumentStoreResult<()> {
        if let Some(created) = params.text("created") {
            self.created = created.to_string();
        }
        if let Some(updated) = params.text("updated") {
            self.updated = updated.to_string();
        }
        Ok(())
    }

    fn before_save(&mut self, ctx: &mut HookContext<'_>) {
        let now = Bson::DateTime(DateTime::now());

        if ctx.is_new() {
            if !ctx.attributes.has(&self.created) {
                ctx.attributes.set(self.created.clone(), now);
            }
        } else {
            ctx.attributes.set(self.updated.clone(), now);
        }
    }
}
