//! In-memory document storage backend for docrecord.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Full query support** - Filters with dotted paths, multi-key sorting, skip and limit
//! - **Aggregation** - Match, sort, skip, limit and project pipeline stages
//!
//! # Quick Start
//!
//! ```ignore
//! use docrecord::{Database, Document, memory::InMemoryStore};
//! use docrecord::backend::StoreBackendBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let database = Database::builder(backend).register::<User>().build()?;
//!
//!     let mut user = Document::<User>::new(&database)?;
//!     user.set("name", "Alice");
//!     user.insert(Default::default()).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrecord_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
