//! An active-record style document mapping and validation layer for document databases.
//!
//! This crate is the core of the docrecord project and provides:
//!
//! - **Documents** ([`document`]) - Typed records with a schema-less attribute store, lifecycle
//!   events, persistence and relations
//! - **Schemas** ([`schema`]) - The [`schema::Model`] trait and field/relation descriptors
//! - **Rules and validators** ([`rule`], [`validator`]) - Declarative rules, the built-in
//!   validator set and pluggable class validators
//! - **Behaviours** ([`behaviour`]) - Attachable lifecycle listeners
//! - **Cursors** ([`cursor`]) - Server-backed and in-memory result iteration
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Query and filtering API** ([`query`]) - Type-safe query construction and filtering
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use docrecord_core::{database::Database, document::Document, rule::Rule, schema::Model};
//!
//! #[derive(Debug, Clone, Default)]
//! struct User;
//!
//! impl Model for User {
//!     fn type_name() -> &'static str {
//!         "User"
//!     }
//!
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//!
//!     fn rules() -> Vec<Rule> {
//!         vec![Rule::new("name", "required"), Rule::new("email", "email")]
//!     }
//! }
//!
//! let database = Database::builder(backend).register::<User>().build()?;
//! let mut user = Document::<User>::new(&database)?;
//! user.set("name", "Ada");
//! user.save(true, Default::default()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrecord_core;

pub mod backend;
pub mod behaviour;
pub mod collection;
pub mod config;
pub mod cursor;
pub mod database;
pub mod document;
pub mod error;
pub mod query;
pub mod rule;
pub mod schema;
pub mod validator;
pub mod value;
