//! Named collection handles.
//!
//! A [`Collection`] is the boundary between documents and the storage backend: every
//! document operation ends up here, addressed by collection name, with write options
//! already merged over the database default.
//!
//! # Example
//!
//! ```ignore
//! let users = database.collection("users");
//! users.insert(doc! { "_id": 1, "name": "Alice" }, WriteConcern::inherit()).await?;
//!
//! let mut cursor = users.find(Query::filtered(Some(Filter::eq("name", "Alice"))));
//! while cursor.valid().await? {
//!     println!("{:?}", cursor.current()?);
//!     cursor.next().await?;
//! }
//! ```

use bson::Document as BsonDocument;

use crate::{
    config::WriteConcern,
    cursor::Cursor,
    database::Database,
    error::DocumentStoreResult,
    query::{Expr, Query, Stage, Update},
};

/// A named collection of the database.
#[derive(Debug, Clone)]
pub struct Collection {
    name: String,
    key: String,
    database: Database,
}

impl Collection {
    pub(crate) fn new(name: String, database: Database) -> Self {
        Self { name, key: "_id".to_string(), database }
    }

    /// Addresses rows by `key` instead of `_id` when inserting and saving.
    pub fn keyed_by(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The primary key field rows are written under.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn concern(&self, concern: WriteConcern) -> WriteConcern {
        concern.merged_with(&self.database.default_write_concern())
    }

    /// Returns the first row matching `filter`.
    pub async fn find_one(&self, filter: Option<Expr>) -> DocumentStoreResult<Option<BsonDocument>> {
        tracing::trace!(collection = %self.name, "find one");
        self.database.backend().find_one(&self.name, filter).await
    }

    /// Returns a lazy server cursor over the rows selected by `query`.
    ///
    /// Nothing is sent to the backend until the cursor is first read.
    pub fn find(&self, query: Query) -> Cursor {
        Cursor::server(self.clone(), query)
    }

    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.database.backend().count(&self.name, filter).await
    }

    /// Inserts a new row.
    ///
    /// # Arguments
    ///
    /// * `document` - The raw row; it must carry its primary key
    /// * `concern` - Write options; unset fields come from the database default
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`](crate::error::DocumentStoreError) if the operation fails.
    pub async fn insert(&self, document: BsonDocument, concern: WriteConcern) -> DocumentStoreResult<()> {
        tracing::trace!(collection = %self.name, "insert");
        self.database
            .backend()
            .insert(&self.name, &self.key, document, self.concern(concern))
            .await
    }

    /// Inserts the row or replaces the stored row with the same primary key.
    pub async fn save(&self, document: BsonDocument, concern: WriteConcern) -> DocumentStoreResult<()> {
        tracing::trace!(collection = %self.name, "save");
        self.database
            .backend()
            .save(&self.name, &self.key, document, self.concern(concern))
            .await
    }

    /// Applies `update` to every row matching `filter` and returns how many matched.
    pub async fn update(
        &self,
        filter: Option<Expr>,
        update: Update,
        concern: WriteConcern,
    ) -> DocumentStoreResult<u64> {
        self.database
            .backend()
            .update(&self.name, filter, update, self.concern(concern))
            .await
    }

    /// Deletes every row matching `filter` and returns how many were deleted.
    pub async fn remove(&self, filter: Option<Expr>, concern: WriteConcern) -> DocumentStoreResult<u64> {
        tracing::trace!(collection = %self.name, "remove");
        self.database
            .backend()
            .remove(&self.name, filter, self.concern(concern))
            .await
    }

    /// Drops the whole collection.
    pub async fn drop(&self) -> DocumentStoreResult<()> {
        tracing::debug!(collection = %self.name, "dropping collection");
        self.database.backend().drop_collection(&self.name).await
    }

    /// Runs an aggregation pipeline; the output is held in an in-memory cursor.
    pub async fn aggregate(&self, pipeline: Vec<Stage>) -> DocumentStoreResult<Cursor> {
        let rows = self.database.backend().aggregate(&self.name, pipeline).await?;
        Ok(Cursor::from_rows(rows))
    }
}
