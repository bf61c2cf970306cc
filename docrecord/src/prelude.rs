//! Convenient re-exports of commonly used types from docrecord.
//!
//! ```ignore
//! use docrecord::prelude::*;
//! ```
//!
//! This provides access to:
//! - Documents, models and descriptors
//! - Rules, validators and behaviours
//! - Cursors, collections and store backends
//! - Query construction and filtering
//! - Error types

pub use docrecord_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    behaviour::{Behaviour, Event, HookContext, Timestamp},
    collection::Collection,
    config::{Acknowledgment, DatabaseOptions, WriteConcern},
    cursor::{Cursor, Row},
    database::{Database, DatabaseBuilder},
    document::{AnyDocument, Document, Related, SCENARIO_INSERT, SCENARIO_UPDATE},
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection, Stage, Update},
    rule::{ErrorMap, Params, ParamsExt, Rule},
    schema::{BehaviourSpec, Descriptor, Model, Relation},
    validator::Validator,
    value::{AttributeStore, Value},
};

pub use async_trait::async_trait;
pub use bson::doc;
