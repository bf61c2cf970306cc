//! MongoDB backend implementation for docrecord.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait. Filters,
//! sorts and aggregation stages are translated to MongoDB's native syntax, and documents are
//! stored as they are with their own `_id`.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docrecord = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Write concerns** - Per-write durability options mapped onto the driver's
//! - **Server cursors** - `find` streams rows straight from the driver cursor
//!
//! # Example
//!
//! ```ignore
//! use docrecord::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrecord_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
