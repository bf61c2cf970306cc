use bson::{Bson, oid::ObjectId};

use super::Document;
use crate::{
    behaviour::Event,
    config::WriteConcern,
    cursor::Cursor,
    error::DocumentStoreResult,
    query::{Expr, Filter, Query, Stage, Update, conjoin},
    schema::Model,
    value::Value,
};

impl<M: Model> Document<M> {
    /// Loads the first matching row into this instance.
    ///
    /// On a match the document is cleaned and refilled from the row, stops being new and
    /// moves to the `update` scenario. Returns `Ok(None)` when nothing matched or
    /// `beforeFind` vetoed, leaving the instance untouched.
    pub async fn find_one(&mut self, filter: Option<Expr>) -> DocumentStoreResult<Option<&mut Self>> {
        if !self.fire(Event::BeforeFind) {
            return Ok(None);
        }
        let Some(row) = self.collection().find_one(filter).await? else {
            return Ok(None);
        };

        self.clean()?;
        self.set_loaded();
        self.set_attributes(row);
        self.fire(Event::AfterFind);

        Ok(Some(self))
    }

    /// Loads the document with primary key `id` into this instance.
    pub async fn find_by_id(&mut self, id: impl Into<Bson>) -> DocumentStoreResult<Option<&mut Self>> {
        self.find_one(Some(Filter::eq(M::primary_key(), id))).await
    }

    /// Loads the first matching row into a fresh instance.
    pub async fn load(database: &crate::database::Database, filter: Option<Expr>) -> DocumentStoreResult<Option<Self>> {
        let mut document = Self::new(database)?;
        let found = document.find_one(filter).await?.is_some();

        Ok(found.then_some(document))
    }

    /// Returns a cursor of documents of this type matching `filter`.
    ///
    /// A `beforeFind` veto yields an empty cursor.
    pub async fn find(&mut self, filter: Option<Expr>) -> DocumentStoreResult<Cursor> {
        if !self.fire(Event::BeforeFind) {
            return Ok(Cursor::empty());
        }

        let entry = self.database.entry::<M>()?;
        let cursor = self
            .collection()
            .find(Query::filtered(filter))
            .bind(entry, self.database.clone());

        self.fire(Event::AfterFind);
        Ok(cursor)
    }

    /// Finds documents where every whitespace separated term of `term` occurs, ignoring
    /// case, in at least one of `fields`.
    pub async fn search(&mut self, fields: &[&str], term: &str, extra: Option<Expr>) -> DocumentStoreResult<Cursor> {
        let clauses: Vec<Expr> = term
            .split_whitespace()
            .map(|word| Filter::or(fields.iter().map(|field| Filter::contains(*field, word))))
            .collect();
        let matcher = (!clauses.is_empty() && !fields.is_empty()).then(|| Filter::and(clauses));

        self.find(conjoin(matcher, extra)).await
    }

    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.collection().count(filter).await
    }

    fn ensure_primary_key(&mut self) {
        if self.primary_key().is_none() {
            self.set(M::primary_key(), Value::Bson(Bson::ObjectId(ObjectId::new())));
        }
    }

    /// Inserts this document as a new row.
    ///
    /// Returns `Ok(false)` without touching storage if the document was already stored or
    /// `beforeSave` vetoes. A missing primary key is generated.
    pub async fn insert(&mut self, concern: WriteConcern) -> DocumentStoreResult<bool> {
        if !self.is_new {
            tracing::warn!(document = M::type_name(), "insert called on a stored document");
            return Ok(false);
        }
        if !self.fire(Event::BeforeSave) {
            return Ok(false);
        }

        self.ensure_primary_key();
        self.collection().insert(self.raw_document(), concern).await?;

        self.fire(Event::AfterSave);
        self.set_loaded();
        Ok(true)
    }

    /// Stores this document, inserting it or replacing the stored row.
    ///
    /// With `run_validation`, a failed validation aborts the save with `Ok(false)`.
    pub async fn save(&mut self, run_validation: bool, concern: WriteConcern) -> DocumentStoreResult<bool> {
        if run_validation && !self.validate().await? {
            return Ok(false);
        }
        if !self.fire(Event::BeforeSave) {
            return Ok(false);
        }

        // The payload is read only now, after every beforeSave mutation.
        self.ensure_primary_key();
        self.collection().save(self.raw_document(), concern).await?;

        self.fire(Event::AfterSave);
        self.set_loaded();
        Ok(true)
    }

    /// Deletes the stored row of this document.
    pub async fn remove(&mut self, concern: WriteConcern) -> DocumentStoreResult<bool> {
        if !self.fire(Event::BeforeDelete) {
            return Ok(false);
        }
        let Some(id) = self.primary_key() else {
            tracing::warn!(document = M::type_name(), "remove called without a primary key");
            return Ok(false);
        };

        self.collection()
            .remove(Some(Filter::eq(M::primary_key(), id)), concern)
            .await?;

        self.fire(Event::AfterDelete);
        Ok(true)
    }

    /// Drops the whole collection of this type.
    pub async fn drop_collection(&self) -> DocumentStoreResult<bool> {
        self.collection().drop().await?;
        Ok(true)
    }

    /// Applies `update` to every matching row of this type's collection. No lifecycle events
    /// are fired.
    pub async fn update(&self, filter: Option<Expr>, update: Update, concern: WriteConcern) -> DocumentStoreResult<u64> {
        self.collection().update(filter, update, concern).await
    }

    /// Runs an aggregation pipeline over this type's collection.
    pub async fn aggregate(&self, pipeline: Vec<Stage>) -> DocumentStoreResult<Cursor> {
        self.collection().aggregate(pipeline).await
    }

    /// Reloads this document from storage by primary key.
    ///
    /// Returns `Ok(false)` when the document has no primary key or its row is gone.
    pub async fn refresh(&mut self) -> DocumentStoreResult<bool> {
        let Some(id) = self.primary_key() else {
            return Ok(false);
        };
        let Some(row) = self
            .collection()
            .find_one(Some(Filter::eq(M::primary_key(), id)))
            .await?
        else {
            return Ok(false);
        };

        self.clean()?;
        self.set_loaded();
        self.set_attributes(row);
        Ok(true)
    }
}
