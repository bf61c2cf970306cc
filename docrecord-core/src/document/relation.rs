use std::fmt;

use bson::{Bson, Document as BsonDocument};

use super::{AnyDocument, Document};
use crate::{
    cursor::Cursor,
    database::TypeEntry,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Filter, Query},
    schema::{Model, RelationKind},
    value::Value,
};

/// The resolved result of a relation.
#[derive(Clone)]
pub enum Related {
    /// Nothing matched.
    None,
    /// A single related document.
    One(Box<dyn AnyDocument>),
    /// Documents assigned by hand.
    List(Vec<Box<dyn AnyDocument>>),
    /// A cursor over the related documents.
    Many(Cursor),
}

impl Related {
    pub fn is_none(&self) -> bool {
        matches!(self, Related::None)
    }

    pub fn as_one(&self) -> Option<&dyn AnyDocument> {
        match self {
            Related::One(document) => Some(document.as_ref()),
            _ => None,
        }
    }

    /// The single related document as its concrete type.
    pub fn one_as<M: Model>(&self) -> Option<&Document<M>> {
        self.as_one().and_then(|document| document.downcast_ref::<M>())
    }

    pub fn as_cursor_mut(&mut self) -> Option<&mut Cursor> {
        match self {
            Related::Many(cursor) => Some(cursor),
            _ => None,
        }
    }

    /// Collects every related document, draining a cursor if needed.
    pub async fn into_documents(self) -> DocumentStoreResult<Vec<Box<dyn AnyDocument>>> {
        match self {
            Related::None => Ok(Vec::new()),
            Related::One(document) => Ok(vec![document]),
            Related::List(documents) => Ok(documents),
            Related::Many(cursor) => Ok(cursor
                .to_vec()
                .await?
                .into_iter()
                .filter_map(|row| match row {
                    crate::cursor::Row::Document(document) => Some(document),
                    crate::cursor::Row::Raw(_) => None,
                })
                .collect()),
        }
    }

    pub(crate) fn to_value(&self) -> Option<Value> {
        match self {
            Related::None => Some(Value::null()),
            Related::One(document) => Some(Value::Embedded(document.clone())),
            Related::List(documents) => Some(Value::List(
                documents.iter().cloned().map(Value::Embedded).collect(),
            )),
            Related::Many(_) => None,
        }
    }
}

impl From<Value> for Related {
    fn from(value: Value) -> Self {
        match value {
            Value::Embedded(document) => Related::One(document),
            Value::List(items) => Related::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Embedded(document) => Some(document),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::Bson(Bson::Null) => Related::None,
            Value::Bson(_) => {
                tracing::warn!("only documents can be assigned to a relation");
                Related::None
            }
        }
    }
}

impl fmt::Debug for Related {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Related::None => f.write_str("None"),
            Related::One(document) => f.debug_tuple("One").field(&document.to_raw()).finish(),
            Related::List(documents) => f
                .debug_tuple("List")
                .field(&documents.iter().map(|document| document.to_raw()).collect::<Vec<_>>())
                .finish(),
            Related::Many(cursor) => f.debug_tuple("Many").field(cursor).finish(),
        }
    }
}

fn is_reference(value: &BsonDocument) -> bool {
    value.contains_key("$ref") && value.contains_key("$id")
}

impl<M: Model> Document<M> {
    /// Resolves the relation `name`, caching the result for the lifetime of this instance.
    ///
    /// Returns `Ok(None)` when `M` declares no such relation.
    pub async fn relation(&mut self, name: &str) -> DocumentStoreResult<Option<&mut Related>> {
        if self.descriptor.relation_named(name).is_none() {
            return Ok(None);
        }

        if !self.relations.contains_key(name) {
            let related = self.with(name, None).await?;
            self.relations.insert(name.to_string(), related);
        }
        Ok(self.relations.get_mut(name))
    }

    /// The cached result of `name`, if it was resolved or assigned.
    pub fn cached_relation(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn set_related(&mut self, name: &str, related: Related) {
        self.relations.insert(name.to_string(), related);
    }

    /// Forgets every cached relation.
    pub fn clean_relations(&mut self) {
        self.relations.clear();
    }

    /// Resolves the relation `name` without touching the cache.
    ///
    /// `extra` is combined with the relation's own condition. A missing local key resolves
    /// to [`Related::None`] without querying.
    pub async fn with(&self, name: &str, extra: Option<Expr>) -> DocumentStoreResult<Related> {
        let Some(relation) = self.descriptor.relation_named(name) else {
            return Ok(Related::None);
        };
        let target = self.database.resolve(relation.target()).cloned().ok_or_else(|| {
            DocumentStoreError::configuration(format!(
                "relation {name} of {} targets unknown type {}",
                M::type_name(),
                relation.target()
            ))
        })?;

        let local = match relation.local_key() {
            Some(field) => self.get(field).map(Value::into_raw),
            None => self.primary_key(),
        };
        let condition = match local {
            None | Some(Bson::Null) => return Ok(Related::None),
            Some(Bson::Document(reference)) if is_reference(&reference) => {
                return self.follow_reference(&reference, &target).await;
            }
            Some(Bson::Array(values)) => Filter::any_of(relation.foreign_key(), values),
            Some(value) => Filter::eq(relation.foreign_key(), value),
        };
        let condition = [relation.condition().cloned(), extra]
            .into_iter()
            .flatten()
            .fold(condition, Expr::and);

        let collection = self.database.collection(target.collection());
        match relation.kind() {
            RelationKind::One => match collection.find_one(Some(condition)).await? {
                Some(row) => Ok(target
                    .materialize(&self.database, row)?
                    .map_or(Related::None, Related::One)),
                None => Ok(Related::None),
            },
            RelationKind::Many => Ok(Related::Many(
                collection
                    .find(Query::filtered(Some(condition)))
                    .bind(target, self.database.clone()),
            )),
        }
    }

    async fn follow_reference(&self, reference: &BsonDocument, target: &TypeEntry) -> DocumentStoreResult<Related> {
        let (Some(collection), Some(id)) = (
            reference.get("$ref").and_then(Bson::as_str),
            reference.get("$id"),
        ) else {
            return Ok(Related::None);
        };

        let row = self
            .database
            .collection(collection)
            .find_one(Some(Filter::eq("_id", id.clone())))
            .await?;

        match row {
            Some(row) => Ok(target
                .materialize(&self.database, row)?
                .map_or(Related::None, Related::One)),
            None => Ok(Related::None),
        }
    }
}
