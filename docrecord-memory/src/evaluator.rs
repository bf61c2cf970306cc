//! Query expression evaluation for in-memory document filtering.
//!
//! Rows are plain BSON documents. Field names may be dotted paths into nested mappings, and a
//! scalar comparison against an array field matches when any element matches.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document as BsonDocument, datetime::DateTime, oid::ObjectId};

use docrecord_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection},
};

/// Comparable view of a BSON value. Every number is widened to `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(map) => Comparable::Map(
                map.iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Looks up a dotted `path` inside `document`.
pub(crate) fn lookup<'a>(document: &'a BsonDocument, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(map) => map.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Orders two rows by `sort`. Missing fields sort first; incomparable values tie.
pub(crate) fn compare_rows(left: &BsonDocument, right: &BsonDocument, sort: &Sort) -> Ordering {
    for (field, direction) in &sort.keys {
        let a = lookup(left, field).map(Comparable::from).unwrap_or(Comparable::Null);
        let b = lookup(right, field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match (&a, &b) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Null, _) => Ordering::Less,
            (_, Comparable::Null) => Ordering::Greater,
            _ => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        };
        let ordering = match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a BsonDocument,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a BsonDocument) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Returns true when `document` matches `filter`; no filter matches everything.
    pub fn matches(document: &BsonDocument, filter: Option<&Expr>) -> DocumentStoreResult<bool> {
        match filter {
            Some(expr) => DocumentEvaluator::new(document).evaluate(expr),
            None => Ok(true),
        }
    }
}

fn contains_text(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Array fields match when any element matches.
fn any_element(field: &Comparable<'_>, test: impl Fn(&Comparable<'_>) -> bool) -> bool {
    match field {
        Comparable::Array(items) => items.iter().any(&test) || test(field),
        _ => test(field),
    }
}

fn is_member(field: &Comparable<'_>, values: &Comparable<'_>) -> bool {
    match values {
        Comparable::Array(values) => values
            .iter()
            .any(|value| any_element(field, |item| item == value)),
        value => any_element(field, |item| item == value),
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_present(&mut self, field: &str, present: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == present)
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let target = Comparable::from(value);
        let Some(field_value) = lookup(self.document, field) else {
            // A missing field equals null and is outside every set.
            return Ok(match op {
                FieldOp::Eq => target == Comparable::Null,
                FieldOp::Ne | FieldOp::NotContains | FieldOp::NoneOf => target != Comparable::Null,
                _ => false,
            });
        };
        let current = Comparable::from(field_value);

        let matched = match op {
            FieldOp::Eq => any_element(&current, |item| item == &target),
            FieldOp::Ne => !any_element(&current, |item| item == &target),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => any_element(&current, |item| {
                match item.partial_cmp(&target) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering.is_gt(),
                        FieldOp::Gte => ordering.is_ge(),
                        FieldOp::Lt => ordering.is_lt(),
                        _ => ordering.is_le(),
                    },
                    None => false,
                }
            }),
            FieldOp::Contains | FieldOp::NotContains => {
                let found = match (&current, &target) {
                    (Comparable::String(left), Comparable::String(right)) => contains_text(left, right),
                    (Comparable::Array(items), _) => items.iter().any(|item| item == &target),
                    _ => false,
                };
                found == (op == FieldOp::Contains)
            }
            FieldOp::StartsWith => match (&current, &target) {
                (Comparable::String(left), Comparable::String(right)) => left.starts_with(right),
                _ => false,
            },
            FieldOp::EndsWith => match (&current, &target) {
                (Comparable::String(left), Comparable::String(right)) => left.ends_with(right),
                _ => false,
            },
            FieldOp::AnyOf => is_member(&current, &target),
            FieldOp::NoneOf => !is_member(&current, &target),
        };

        Ok(matched)
    }
}
