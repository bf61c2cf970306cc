//! Query construction for the storage backends.
//!
//! Documents never build backend-specific query syntax. Conditions are expressed with
//! [`Expr`] trees (usually through [`Filter`]), wrapped in a [`Query`] with sort, skip and
//! limit directives, and each backend translates them with a [`QueryVisitor`].
//!
//! ```ignore
//! use docrecord::query::{Query, Filter, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("name", "Sam").and(Filter::gt("age", 18)))
//!     .sort("created", SortDirection::Desc)
//!     .skip(10)
//!     .limit(5)
//!     .build();
//! ```
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - String: `starts_with`, `ends_with`, `contains`, `not_contains`
//! - Existence: `exists`, `not_exists`
//! - Membership: `any_of`, `none_of`
//! - Logical: `and`, `or`

use bson::{Bson, Document as BsonDocument};

use crate::error::DocumentStoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Ordered list of sort keys; earlier keys take precedence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sort {
    pub keys: Vec<(String, SortDirection)>,
}

impl Sort {
    pub fn new() -> Self {
        Sort::default()
    }

    /// Starts a sort on a single key.
    pub fn by(field: impl Into<String>, direction: SortDirection) -> Self {
        Sort::new().then(field, direction)
    }

    /// Appends a tie-breaking key.
    pub fn then(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// How a [`Expr::Field`] condition compares a stored value with its operand.
///
/// Ordering operators compare like-typed values only. `Contains` matches substrings
/// case-insensitively on strings and elements on arrays; `AnyOf`/`NoneOf` take a list
/// operand and also match when an array field shares an element with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    AnyOf,
    NoneOf,
}

/// A condition tree evaluated against stored rows.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// Matches when the field is present (`true`) or absent (`false`).
    Present { field: String, present: bool },
    /// Compares a field, addressed by a dotted path, with `value`.
    Field { field: String, op: FieldOp, value: Bson },
}

impl Expr {
    pub fn field(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Self {
        Expr::Field {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// ANDs `other` onto this expression, flattening into an existing conjunction.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut all) => {
                all.push(other);
                Expr::And(all)
            }
            single => Expr::And(vec![single, other]),
        }
    }

    /// ORs `other` onto this expression, flattening into an existing disjunction.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut any) => {
                any.push(other);
                Expr::Or(any)
            }
            single => Expr::Or(vec![single, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Builds an AND of equality checks from a plain mapping such as `{ name: "x", age: 3 }`.
    ///
    /// Returns `None` for an empty mapping.
    pub fn from_equalities(conditions: &BsonDocument) -> Option<Expr> {
        let mut exprs = conditions
            .iter()
            .map(|(field, value)| Filter::eq(field.as_str(), value.clone()))
            .collect::<Vec<_>>();

        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Expr::And(exprs)),
        }
    }
}

/// Joins two optional conditions with AND.
pub fn conjoin(left: Option<Expr>, right: Option<Expr>) -> Option<Expr> {
    match (left, right) {
        (Some(left), Some(right)) => Some(left.and(right)),
        (left, None) => left,
        (None, right) => right,
    }
}

/// A structured query: filter plus sort, skip and limit directives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Sort specification for results.
    pub sort: Option<Sort>,
    /// Number of documents to skip.
    pub skip: Option<usize>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl Query {
    /// Creates a new empty query with no filters or limits.
    pub fn new() -> Self {
        Query::default()
    }

    /// Creates a query with only a filter.
    pub fn filtered(filter: Option<Expr>) -> Self {
        Query { filter, ..Query::default() }
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }
}

/// Shorthand constructors for [`Expr`] conditions.
pub struct Filter;

macro_rules! field_filters {
    ($($(#[$meta:meta])* $name:ident => $op:ident),* $(,)?) => {
        impl Filter {
            $(
                $(#[$meta])*
                pub fn $name(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
                    Expr::field(field, FieldOp::$op, value)
                }
            )*
        }
    };
}

field_filters! {
    eq => Eq,
    ne => Ne,
    gt => Gt,
    gte => Gte,
    lt => Lt,
    lte => Lte,
    starts_with => StartsWith,
    ends_with => EndsWith,
    /// Case-insensitive substring match on strings, element match on arrays.
    contains => Contains,
    not_contains => NotContains,
    /// `value` should be a list; scalars are treated as a one-element list.
    any_of => AnyOf,
    none_of => NoneOf,
}

impl Filter {
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Present { field: field.into(), present: true }
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Present { field: field.into(), present: false }
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder::default()
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.query.skip = Some(skip);
        self
    }

    /// Adds a sort key after any keys already present.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort = Some(self.query.sort.take().unwrap_or_default().then(field, direction));
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Partial modification applied by [`StoreBackend::update`](crate::backend::StoreBackend::update).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    /// Fields to overwrite.
    pub set: BsonDocument,
    /// Fields to remove.
    pub unset: Vec<String>,
}

impl Update {
    pub fn new() -> Self {
        Update::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

/// One stage of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep rows matching the expression.
    Match(Expr),
    /// Order rows.
    Sort(Sort),
    /// Drop the first `n` rows.
    Skip(usize),
    /// Keep at most `n` rows.
    Limit(usize),
    /// Keep only the named fields (plus `_id`).
    Project(Vec<String>),
}

/// Translates an [`Expr`] tree into a backend's own representation.
///
/// Backends implement one method per node kind; [`QueryVisitor::visit_expr`] dispatches.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_present(&mut self, field: &str, present: bool) -> Result<Self::Output, Self::Error>;
    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(inner) => self.visit_not(inner),
            Expr::Present { field, present } => self.visit_present(field, *present),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}
