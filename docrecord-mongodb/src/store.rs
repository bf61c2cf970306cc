use async_trait::async_trait;
use bson::{Document, doc};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{Acknowledgment as MongoAcknowledgment, ClientOptions, WriteConcern as MongoWriteConcern},
};

use docrecord_core::{
    backend::{RowStream, StoreBackend, StoreBackendBuilder},
    config::{Acknowledgment, WriteConcern},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Query, Stage, Update},
};

use crate::query::MongoQueryTranslator;

const DUPLICATE_KEY: i32 = 11000;

fn backend_error(error: MongoError) -> DocumentStoreError {
    tracing::debug!(%error, "mongodb operation failed");
    DocumentStoreError::Backend(error.to_string())
}

fn write_concern(concern: &WriteConcern) -> MongoWriteConcern {
    let mut converted = MongoWriteConcern::default();
    converted.w = concern.w.as_ref().map(|w| match w {
        Acknowledgment::Nodes(nodes) => MongoAcknowledgment::Nodes(*nodes),
        Acknowledgment::Majority => MongoAcknowledgment::Majority,
        Acknowledgment::Custom(tag) => MongoAcknowledgment::Custom(tag.clone()),
    });
    converted.journal = concern.journal;
    converted
}

#[derive(Debug)]
pub struct MongoDbStore {
    client: Client,
    database: String,
    default_concern: WriteConcern,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self {
            client,
            database,
            default_concern: WriteConcern::acknowledged(),
        }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client.database(&self.database).collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find_one(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(MongoQueryTranslator::filter(filter.as_ref())?)
            .await
            .map_err(backend_error)
    }

    async fn find(&self, collection: &str, query: Query) -> DocumentStoreResult<RowStream> {
        let handle = self.get_collection(collection);
        let mut find = handle.find(MongoQueryTranslator::filter(query.filter.as_ref())?);

        if let Some(sort) = query.sort.as_ref().filter(|sort| !sort.is_empty()) {
            find = find.sort(MongoQueryTranslator::sort(sort));
        }
        if let Some(skip) = query.skip {
            find = find.skip(skip as u64);
        }
        if let Some(limit) = query.limit {
            find = find.limit(limit as i64);
        }

        let cursor = find.await.map_err(backend_error)?;
        Ok(cursor.map_err(backend_error).boxed())
    }

    async fn count(&self, collection: &str, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::filter(filter.as_ref())?)
            .await
            .map_err(backend_error)
    }

    async fn insert(
        &self,
        collection: &str,
        key: &str,
        document: Document,
        concern: WriteConcern,
    ) -> DocumentStoreResult<()> {
        let id = document.get(key).map(ToString::to_string).unwrap_or_default();

        match self
            .get_collection(collection)
            .insert_one(document)
            .write_concern(write_concern(&concern))
            .await
        {
            Ok(_) => Ok(()),
            Err(error) => match *error.kind {
                ErrorKind::Write(WriteFailure::WriteError(ref failure)) if failure.code == DUPLICATE_KEY => Err(
                    DocumentStoreError::DocumentAlreadyExists(id, collection.to_string()),
                ),
                _ => Err(backend_error(error)),
            },
        }
    }

    async fn save(
        &self,
        collection: &str,
        key: &str,
        document: Document,
        concern: WriteConcern,
    ) -> DocumentStoreResult<()> {
        let id = document.get(key).cloned().ok_or_else(|| {
            DocumentStoreError::InvalidDocument(format!("row for collection {collection} has no {key}"))
        })?;

        self.get_collection(collection)
            .replace_one(doc! { key: id }, document)
            .upsert(true)
            .write_concern(write_concern(&concern))
            .await
            .map_err(backend_error)?;

        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        filter: Option<Expr>,
        update: Update,
        concern: WriteConcern,
    ) -> DocumentStoreResult<u64> {
        let filter = MongoQueryTranslator::filter(filter.as_ref())?;
        if update.is_empty() {
            return self.get_collection(collection).count_documents(filter).await.map_err(backend_error);
        }

        let mut changes = Document::new();
        if !update.set.is_empty() {
            changes.insert("$set", update.set);
        }
        if !update.unset.is_empty() {
            changes.insert(
                "$unset",
                update.unset.into_iter().map(|field| (field, bson::Bson::from(""))).collect::<Document>(),
            );
        }

        Ok(self
            .get_collection(collection)
            .update_many(filter, changes)
            .write_concern(write_concern(&concern))
            .await
            .map_err(backend_error)?
            .matched_count)
    }

    async fn remove(&self, collection: &str, filter: Option<Expr>, concern: WriteConcern) -> DocumentStoreResult<u64> {
        Ok(self
            .get_collection(collection)
            .delete_many(MongoQueryTranslator::filter(filter.as_ref())?)
            .write_concern(write_concern(&concern))
            .await
            .map_err(backend_error)?
            .deleted_count)
    }

    async fn drop_collection(&self, collection: &str) -> DocumentStoreResult<()> {
        self.get_collection(collection).drop().await.map_err(backend_error)
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Stage>) -> DocumentStoreResult<Vec<Document>> {
        let pipeline = pipeline
            .iter()
            .map(MongoQueryTranslator::stage)
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        self.get_collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(backend_error)?
            .try_collect()
            .await
            .map_err(backend_error)
    }

    fn default_write_concern(&self) -> WriteConcern {
        self.default_concern.clone()
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
    write_concern: Option<WriteConcern>,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            write_concern: None,
        }
    }

    /// Durability options used by writes that do not set their own.
    pub fn write_concern(mut self, concern: WriteConcern) -> Self {
        self.write_concern = Some(concern);
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        let mut store = MongoDbStore::new(client, self.database);
        if let Some(concern) = self.write_concern {
            store.default_concern = concern.merged_with(&WriteConcern::acknowledged());
        }
        Ok(store)
    }
}
