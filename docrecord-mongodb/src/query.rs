//! Query translation from docrecord expressions to MongoDB query syntax.

use bson::{Bson, Document, doc};

use docrecord_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, QueryVisitor, Sort, SortDirection, Stage},
};

/// Translates docrecord query expressions into MongoDB filter documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// The filter document for `filter`; no filter matches everything.
    pub fn filter(filter: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    pub fn sort(sort: &Sort) -> Document {
        sort.keys
            .iter()
            .map(|(field, direction)| {
                let order = match direction {
                    SortDirection::Asc => 1,
                    SortDirection::Desc => -1,
                };
                (field.clone(), Bson::Int32(order))
            })
            .collect()
    }

    pub fn stage(stage: &Stage) -> Result<Document, DocumentStoreError> {
        Ok(match stage {
            Stage::Match(expr) => doc! { "$match": MongoQueryTranslator.visit_expr(expr)? },
            Stage::Sort(sort) => doc! { "$sort": Self::sort(sort) },
            Stage::Skip(count) => doc! { "$skip": *count as i64 },
            Stage::Limit(count) => doc! { "$limit": *count as i64 },
            Stage::Project(fields) => doc! {
                "$project": fields
                    .iter()
                    .map(|field| (field.clone(), Bson::Int32(1)))
                    .collect::<Document>(),
            },
        })
    }
}

fn text_pattern(op: FieldOp, value: &Bson) -> Result<String, DocumentStoreError> {
    let Bson::String(text) = value else {
        return Err(DocumentStoreError::Backend(format!(
            "{op:?} operator requires a string value"
        )));
    };
    let text = regex::escape(text);

    Ok(match op {
        FieldOp::StartsWith => format!("^{text}"),
        FieldOp::EndsWith => format!("{text}$"),
        _ => text,
    })
}

fn as_list(value: &Bson) -> Bson {
    match value {
        Bson::Array(_) => value.clone(),
        other => Bson::Array(vec![other.clone()]),
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    // `$not` only applies to operator expressions; `$nor` negates a whole filter.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_present(&mut self, field: &str, present: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": present },
        })
    }

    fn visit_field(&mut self, field: &str, op: FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(_) => doc! { "$regex": text_pattern(op, value)?, "$options": "i" },
                    other => doc! { "$elemMatch": { "$eq": other } },
                },
                FieldOp::NotContains => match value {
                    Bson::String(_) => doc! {
                        "$not": { "$regex": text_pattern(op, value)?, "$options": "i" },
                    },
                    other => doc! { "$ne": other },
                },
                FieldOp::StartsWith | FieldOp::EndsWith => doc! { "$regex": text_pattern(op, value)? },
                FieldOp::AnyOf => doc! { "$in": as_list(value) },
                FieldOp::NoneOf => doc! { "$nin": as_list(value) },
            }
        })
    }
}
