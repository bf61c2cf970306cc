//! Main docrecord crate: active-record style documents over pluggable document stores.
//!
//! This crate is the primary entry point for users of the docrecord framework. It re-exports
//! the core types from `docrecord-core` and gives access to the storage backends.
//!
//! # Features
//!
//! - **Typed documents with dynamic attributes** - Declare fields in a struct, keep everything
//!   else in a schema-less attribute store
//! - **Declarative validation** - Rules naming built-in, registered or type-local validators,
//!   scenarios and recursive rules for embedded documents
//! - **Lifecycle events and behaviours** - `before*` hooks that can veto an operation
//! - **Relations** - Lazily resolved one/many relations returning documents or cursors
//! - **Multiple backends** - In-memory and MongoDB storage behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docrecord::{prelude::*, memory::InMemoryStore};
//!
//! #[derive(Debug, Clone, Default)]
//! pub struct User;
//!
//! impl Model for User {
//!     fn type_name() -> &'static str { "User" }
//!     fn collection_name() -> &'static str { "users" }
//!
//!     fn rules() -> Vec<Rule> {
//!         vec![
//!             Rule::new("name", "required"),
//!             Rule::new("age", "number").param("integerOnly", true).param("min", 18),
//!         ]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let database = Database::builder(InMemoryStore::new())
//!         .register::<User>()
//!         .build()?;
//!
//!     let mut user = Document::<User>::new(&database)?;
//!     user.assign(doc! { "name": "Alice", "age": "31" }, None)?;
//!
//!     if !user.save(true, WriteConcern::inherit()).await? {
//!         println!("invalid user: {:?}", user.errors());
//!     }
//!
//!     let mut adults = user.find(Some(Filter::gte("age", 18))).await?;
//!     while adults.valid().await? {
//!         println!("{:?}", adults.current_as::<User>()?);
//!         adults.next().await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - `mongodb` - Persistent MongoDB backend (requires the `mongodb` feature)

pub mod prelude;

pub use docrecord_core::{
    backend, behaviour, collection, config, cursor, database, document, error, query, rule, schema, validator, value,
};

pub use docrecord_core::{database::Database, document::Document};

// Re-exported so implementors of `Validator` need no direct dependency.
pub use async_trait::async_trait;
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docrecord_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docrecord_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
