//! Storage backend abstraction.
//!
//! Documents never talk to a driver directly. Every persistence call goes through the
//! [`StoreBackend`] trait, addressed by collection name and expressed with the
//! backend-neutral [`Query`](crate::query::Query) types. Implementations live in the
//! `docrecord-memory` and `docrecord-mongodb` crates.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The storage operations a document needs
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docrecord::backend::{StoreBackend, StoreBackendBuilder};
//! use docrecord::config::WriteConcern;
//! use docrecord::memory::InMemoryStore;
//! use bson::doc;
//!
//! let backend = InMemoryStore::builder().build().await?;
//! backend.insert("users", "_id", doc! { "_id": 1, "name": "Alice" }, WriteConcern::acknowledged()).await?;
//! ```

use async_trait::async_trait;
use bson::Document as BsonDocument;
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::{
    config::WriteConcern,
    error::DocumentStoreResult,
    query::{Expr, Query, Stage, Update},
};

/// Stream of raw rows produced by [`StoreBackend::find`].
pub type RowStream = BoxStream<'static, DocumentStoreResult<BsonDocument>>;

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single backend is shared by every document
/// and cursor created from the same [`Database`](crate::database::Database).
///
/// # Error Handling
///
/// Driver failures are reported as [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend)
/// and are handed to the caller unchanged. Backends never retry.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the first row matching `filter`, or `None`.
    ///
    /// # Arguments
    ///
    /// * `collection` - The collection to search
    /// * `filter` - The condition to match; `None` matches every row
    async fn find_one(
        &self,
        collection: &str,
        filter: Option<Expr>,
    ) -> DocumentStoreResult<Option<BsonDocument>>;

    /// Opens a stream over the rows selected by `query`.
    ///
    /// The stream owns everything it needs, so it may outlive the borrow of `self`.
    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<RowStream>;

    /// Counts the rows matching `filter`, ignoring skip and limit.
    async fn count(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<u64>;

    /// Inserts a new row whose primary key is stored under `key`.
    ///
    /// # Returns
    ///
    /// Returns a [`DocumentStoreError::DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists)
    /// if the backend can detect a duplicate primary key.
    async fn insert(
        &self,
        collection: &str,
        key: &str,
        document: BsonDocument,
        concern: WriteConcern,
    ) -> DocumentStoreResult<()>;

    /// Inserts the row or replaces the stored row with the same value under `key`.
    async fn save(
        &self,
        collection: &str,
        key: &str,
        document: BsonDocument,
        concern: WriteConcern,
    ) -> DocumentStoreResult<()>;

    /// Applies `update` to every row matching `filter`.
    ///
    /// # Returns
    ///
    /// The number of rows matched.
    async fn update(
        &self,
        collection: &str,
        filter: Option<Expr>,
        update: Update,
        concern: WriteConcern,
    ) -> DocumentStoreResult<u64>;

    /// Deletes every row matching `filter`.
    ///
    /// # Returns
    ///
    /// The number of rows deleted.
    async fn remove(
        &self,
        collection: &str,
        filter: Option<Expr>,
        concern: WriteConcern,
    ) -> DocumentStoreResult<u64>;

    /// Drops the whole collection. Dropping a missing collection is not an error.
    ///
    /// # Warning
    ///
    /// This operation is irreversible.
    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()>;

    /// Runs an aggregation pipeline and collects its output.
    async fn aggregate(
        &self,
        collection: &str,
        pipeline: Vec<Stage>,
    ) -> DocumentStoreResult<Vec<BsonDocument>>;

    /// The durability options used when a write does not specify its own.
    fn default_write_concern(&self) -> WriteConcern {
        WriteConcern::acknowledged()
    }

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Trait for building a store backend.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
