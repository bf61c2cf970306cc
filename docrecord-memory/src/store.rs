//! In-memory storage implementation for document stores.
//!
//! Collections are ordered lists of BSON rows behind an async-aware read-write lock. Rows keep
//! their insertion order, which is the natural order of an unsorted query.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument};
use futures::stream;
use mea::rwlock::RwLock;

use docrecord_core::{
    backend::{RowStream, StoreBackend, StoreBackendBuilder},
    config::WriteConcern,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, Stage, Update},
};

use crate::evaluator::{DocumentEvaluator, compare_rows};

type StoreMap = HashMap<String, Vec<BsonDocument>>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing it to be
/// shared across async tasks. Clones share the same data.
///
/// Queries scan the whole collection; there are no indexes. Write concerns are accepted and
/// ignored since every write is immediately visible.
///
/// # Example
///
/// ```ignore
/// use docrecord_memory::InMemoryStore;
/// use docrecord_core::{backend::StoreBackend, config::WriteConcern};
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert("users", "_id", doc! { "_id": 1, "name": "Alice" }, WriteConcern::inherit()).await?;
/// assert_eq!(store.count("users", None).await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> rows in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the matching rows of `collection` in natural order.
    async fn select(&self, collection: &str, filter: Option<&Expr>) -> DocumentStoreResult<Vec<BsonDocument>> {
        let store = self.store.read().await;
        let Some(rows) = store.get(collection) else {
            return Ok(Vec::new());
        };

        let mut selected = Vec::new();
        for row in rows {
            if DocumentEvaluator::matches(row, filter)? {
                selected.push(row.clone());
            }
        }
        Ok(selected)
    }
}

fn primary_key(document: &BsonDocument, collection: &str, key: &str) -> DocumentStoreResult<Bson> {
    document.get(key).cloned().ok_or_else(|| {
        DocumentStoreError::InvalidDocument(format!("row for collection {collection} has no {key}"))
    })
}

fn apply_update(row: &mut BsonDocument, update: &Update) {
    for (field, value) in &update.set {
        row.insert(field.clone(), value.clone());
    }
    for field in &update.unset {
        row.remove(field);
    }
}

fn project(row: BsonDocument, fields: &[String]) -> BsonDocument {
    row.into_iter()
        .filter(|(key, _)| key == "_id" || fields.iter().any(|field| field == key))
        .collect()
}

/// Runs `pipeline` over `rows` stage by stage.
pub(crate) fn run_pipeline(mut rows: Vec<BsonDocument>, pipeline: &[Stage]) -> DocumentStoreResult<Vec<BsonDocument>> {
    for stage in pipeline {
        rows = match stage {
            Stage::Match(expr) => {
                let mut kept = Vec::with_capacity(rows.len());
                for row in rows {
                    if DocumentEvaluator::new(&row).evaluate(expr)? {
                        kept.push(row);
                    }
                }
                kept
            }
            Stage::Sort(sort) => {
                rows.sort_by(|left, right| compare_rows(left, right, sort));
                rows
            }
            Stage::Skip(count) => rows.into_iter().skip(*count).collect(),
            Stage::Limit(count) => rows.into_iter().take(*count).collect(),
            Stage::Project(fields) => rows.into_iter().map(|row| project(row, fields)).collect(),
        };
    }
    Ok(rows)
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_one(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<Option<BsonDocument>> {
        let store = self.store.read().await;
        let Some(rows) = store.get(collection) else {
            return Ok(None);
        };

        for row in rows {
            if DocumentEvaluator::matches(row, filter.as_ref())? {
                return Ok(Some(row.clone()));
            }
        }
        Ok(None)
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<RowStream> {
        let mut rows = self.select(collection, query.filter.as_ref()).await?;

        if let Some(sort) = query.sort.as_ref().filter(|sort| !sort.is_empty()) {
            rows.sort_by(|left, right| compare_rows(left, right, sort));
        }
        let rows: Vec<_> = rows
            .into_iter()
            .skip(query.skip.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(Ok)
            .collect();

        tracing::trace!(collection, rows = rows.len(), "in-memory query");
        Ok(Box::pin(stream::iter(rows)))
    }

    async fn count(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        Ok(self.select(collection, filter.as_ref()).await?.len() as u64)
    }

    async fn insert(
        &self,
        collection: &str,
        key: &str,
        document: BsonDocument,
        _concern: WriteConcern,
    ) -> DocumentStoreResult<()> {
        let id = primary_key(&document, collection, key)?;
        let mut store = self.store.write().await;
        let rows = store.entry(collection.to_string()).or_default();

        if rows.iter().any(|row| row.get(key) == Some(&id)) {
            return Err(DocumentStoreError::DocumentAlreadyExists(
                id.to_string(),
                collection.to_string(),
            ));
        }

        rows.push(document);
        Ok(())
    }

    async fn save(
        &self,
        collection: &str,
        key: &str,
        document: BsonDocument,
        _concern: WriteConcern,
    ) -> DocumentStoreResult<()> {
        let id = primary_key(&document, collection, key)?;
        let mut store = self.store.write().await;
        let rows = store.entry(collection.to_string()).or_default();

        match rows.iter_mut().find(|row| row.get(key) == Some(&id)) {
            Some(row) => *row = document,
            None => rows.push(document),
        }
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        filter: Option<Expr>,
        update: Update,
        _concern: WriteConcern,
    ) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(rows) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut matched = 0;
        for row in rows.iter_mut() {
            if DocumentEvaluator::matches(row, filter.as_ref())? {
                apply_update(row, &update);
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn remove(&self, collection: &str, filter: Option<Expr>, _concern: WriteConcern) -> DocumentStoreResult<u64> {
        let mut store = self.store.write().await;
        let Some(rows) = store.get_mut(collection) else {
            return Ok(0);
        };

        let mut kept = Vec::with_capacity(rows.len());
        let mut removed = 0;
        for row in rows.iter() {
            if DocumentEvaluator::matches(row, filter.as_ref())? {
                removed += 1;
            } else {
                kept.push(row.clone());
            }
        }
        *rows = kept;

        Ok(removed)
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        self.store.write().await.remove(collection);
        Ok(())
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Stage>) -> DocumentStoreResult<Vec<BsonDocument>> {
        let rows = self.select(collection, None).await?;
        run_pipeline(rows, &pipeline)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new, empty [`InMemoryStore`].
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
