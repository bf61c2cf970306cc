//! The database handle and its type registry.
//!
//! A [`Database`] ties a storage backend to everything documents need to resolve at
//! runtime: registered document types (looked up by name for relations, embedded classes
//! and `objExist`), class validators and behaviours. It is built once with a
//! [`DatabaseBuilder`] and cloned cheaply into every document and cursor.
//!
//! # Example
//!
//! ```ignore
//! let database = Database::builder(InMemoryStore::builder().build().await?)
//!     .register::<User>()
//!     .register::<Post>()
//!     .validator::<Slug>("slug")
//!     .build()?;
//!
//! let mut user = database.model::<User>()?;
//! ```

use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use bson::Document as BsonDocument;

use crate::{
    backend::StoreBackend,
    behaviour::{Behaviour, Timestamp},
    collection::Collection,
    config::{DatabaseOptions, WriteConcern},
    document::{AnyDocument, Document},
    error::{DocumentStoreError, DocumentStoreResult},
    schema::{Descriptor, Model},
    validator::{self, Validator, ValidatorFactory},
};

type BehaviourFactory = fn() -> Box<dyn Behaviour>;
type Constructor = fn(&Database, &str) -> DocumentStoreResult<Box<dyn AnyDocument>>;

fn behaviour_factory<B: Behaviour + Default + Clone + 'static>() -> Box<dyn Behaviour> {
    Box::new(B::default())
}

fn construct<M: Model>(database: &Database, scenario: &str) -> DocumentStoreResult<Box<dyn AnyDocument>> {
    Ok(Box::new(Document::<M>::with_scenario(database, scenario)?))
}

/// Strips a `::` or `\` namespace prefix from a type name.
pub fn short_name(name: &str) -> &str {
    let name = name.rsplit("::").next().unwrap_or(name);
    name.rsplit('\\').next().unwrap_or(name)
}

/// A registered document type, resolvable by name.
#[derive(Clone)]
pub struct TypeEntry {
    name: &'static str,
    collection: &'static str,
    construct: Constructor,
    relation_targets: Vec<String>,
    behaviours: Vec<String>,
}

impl TypeEntry {
    fn of<M: Model>() -> Self {
        let descriptor = M::descriptor();
        TypeEntry {
            name: M::type_name(),
            collection: M::collection_name(),
            construct: construct::<M>,
            relation_targets: descriptor
                .relations()
                .map(|(_, relation)| relation.target().to_string())
                .collect(),
            behaviours: M::behaviours().into_iter().map(|spec| spec.name).collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    /// Constructs a fresh instance in `scenario`.
    pub fn construct(&self, database: &Database, scenario: &str) -> DocumentStoreResult<Box<dyn AnyDocument>> {
        (self.construct)(database, scenario)
    }

    /// Turns a stored row into a loaded instance, firing the find hooks.
    ///
    /// Returns `None` when `beforeFind` vetoes.
    pub fn materialize(
        &self,
        database: &Database,
        row: BsonDocument,
    ) -> DocumentStoreResult<Option<Box<dyn AnyDocument>>> {
        let mut document = self.construct(database, crate::document::SCENARIO_UPDATE)?;
        document.mark_loaded();

        if !document.dispatch(crate::behaviour::Event::BeforeFind) {
            return Ok(None);
        }
        document.hydrate(row);
        document.dispatch(crate::behaviour::Event::AfterFind);

        Ok(Some(document))
    }
}

impl fmt::Debug for TypeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeEntry")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .finish()
    }
}

struct DatabaseInner {
    backend: Arc<dyn StoreBackend>,
    options: DatabaseOptions,
    descriptors: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    types: HashMap<String, TypeEntry>,
    validators: HashMap<String, ValidatorFactory>,
    behaviours: HashMap<String, BehaviourFactory>,
}

/// A storage backend plus the registry of document types, validators and behaviours.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    pub fn builder(backend: impl StoreBackend + 'static) -> DatabaseBuilder {
        DatabaseBuilder::new(backend)
    }

    pub fn backend(&self) -> &dyn StoreBackend {
        self.inner.backend.as_ref()
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.inner.options
    }

    /// The write concern used when a write leaves options unset: the configured one, else
    /// the backend's.
    pub fn default_write_concern(&self) -> WriteConcern {
        self.inner
            .options
            .write_concern
            .clone()
            .unwrap_or_else(|| self.inner.backend.default_write_concern())
    }

    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection::new(name.into(), self.clone())
    }

    /// Looks up a registered type by name, ignoring any namespace prefix.
    pub fn resolve(&self, name: &str) -> Option<&TypeEntry> {
        self.inner.types.get(short_name(name))
    }

    /// Constructs a type-erased instance of the type registered as `name`.
    ///
    /// Returns `Ok(None)` when no such type is registered.
    pub fn select(&self, name: &str, scenario: Option<&str>) -> DocumentStoreResult<Option<Box<dyn AnyDocument>>> {
        self.resolve(name)
            .map(|entry| entry.construct(self, scenario.unwrap_or(crate::document::SCENARIO_INSERT)))
            .transpose()
    }

    /// Constructs a new document of type `M`.
    pub fn model<M: Model>(&self) -> DocumentStoreResult<Document<M>> {
        Document::new(self)
    }

    pub fn is_registered<M: Model>(&self) -> bool {
        self.inner.descriptors.contains_key(&TypeId::of::<M>())
    }

    pub(crate) fn descriptor<M: Model>(&self) -> DocumentStoreResult<Arc<Descriptor<M>>> {
        self.inner
            .descriptors
            .get(&TypeId::of::<M>())
            .cloned()
            .and_then(|descriptor| descriptor.downcast::<Descriptor<M>>().ok())
            .ok_or_else(|| {
                tracing::error!(document = M::type_name(), "document type is not registered");
                DocumentStoreError::UnregisteredType(M::type_name().to_string())
            })
    }

    pub(crate) fn entry<M: Model>(&self) -> DocumentStoreResult<TypeEntry> {
        self.inner
            .types
            .get(M::type_name())
            .cloned()
            .ok_or_else(|| DocumentStoreError::UnregisteredType(M::type_name().to_string()))
    }

    pub(crate) fn create_validator(&self, name: &str) -> Option<Box<dyn Validator>> {
        self.inner
            .validators
            .get(short_name(name))
            .map(|factory| factory())
    }

    pub(crate) fn create_behaviour(&self, name: &str) -> Option<Box<dyn Behaviour>> {
        self.inner
            .behaviours
            .get(short_name(name))
            .map(|factory| factory())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.inner.types.keys().map(String::as_str).collect();
        types.sort_unstable();

        f.debug_struct("Database")
            .field("backend", &self.inner.backend)
            .field("types", &types)
            .finish()
    }
}

/// One-time registration of everything a [`Database`] resolves by name.
pub struct DatabaseBuilder {
    backend: Arc<dyn StoreBackend>,
    options: DatabaseOptions,
    descriptors: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    types: HashMap<String, TypeEntry>,
    validators: HashMap<String, ValidatorFactory>,
    behaviours: HashMap<String, BehaviourFactory>,
}

impl DatabaseBuilder {
    /// Starts a builder over `backend`, with the built-in behaviours registered.
    pub fn new(backend: impl StoreBackend + 'static) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    /// Starts a builder over a backend shared with other databases.
    pub fn from_shared(backend: Arc<dyn StoreBackend>) -> Self {
        DatabaseBuilder {
            backend,
            options: DatabaseOptions::default(),
            descriptors: HashMap::new(),
            types: HashMap::new(),
            validators: HashMap::new(),
            behaviours: HashMap::new(),
        }
        .behaviour::<Timestamp>("timestamp")
    }

    pub fn options(mut self, options: DatabaseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn write_concern(mut self, concern: WriteConcern) -> Self {
        self.options.write_concern = Some(concern);
        self
    }

    /// Registers the document type `M`, building its descriptor.
    pub fn register<M: Model>(mut self) -> Self {
        let descriptor: Arc<dyn Any + Send + Sync> = Arc::new(M::descriptor());
        self.descriptors.insert(TypeId::of::<M>(), descriptor);
        self.types.insert(M::type_name().to_string(), TypeEntry::of::<M>());
        self
    }

    /// Registers a class validator rules can name.
    pub fn validator<V: Validator + Default + 'static>(mut self, name: impl Into<String>) -> Self {
        self.validators.insert(name.into(), validator::factory::<V>);
        self
    }

    /// Registers a behaviour document types can attach by name.
    pub fn behaviour<B: Behaviour + Default + Clone + 'static>(mut self, name: impl Into<String>) -> Self {
        self.behaviours.insert(name.into(), behaviour_factory::<B>);
        self
    }

    /// Checks every relation target and declared behaviour, then builds the database.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError::Configuration`] naming the first unknown relation
    /// target or behaviour.
    pub fn build(self) -> DocumentStoreResult<Database> {
        for entry in self.types.values() {
            if let Some(target) = entry
                .relation_targets
                .iter()
                .find(|target| !self.types.contains_key(short_name(target)))
            {
                return Err(DocumentStoreError::configuration(format!(
                    "{} declares a relation to unregistered type {target}",
                    entry.name
                )));
            }
            if let Some(behaviour) = entry
                .behaviours
                .iter()
                .find(|name| !self.behaviours.contains_key(short_name(name)))
            {
                return Err(DocumentStoreError::configuration(format!(
                    "{} attaches unknown behaviour {behaviour}",
                    entry.name
                )));
            }
        }

        tracing::debug!(types = self.types.len(), "database registry built");

        Ok(Database {
            inner: Arc::new(DatabaseInner {
                backend: self.backend,
                options: self.options,
                descriptors: self.descriptors,
                types: self.types,
                validators: self.validators,
                behaviours: self.behaviours,
            }),
        })
    }
}
