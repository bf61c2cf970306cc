//! Field validators.
//!
//! A rule names its validator by string. Names are resolved in a fixed order: the
//! [built-in set](builtin), class validators registered on the
//! [`DatabaseBuilder`](crate::database::DatabaseBuilder), validator functions declared by the
//! document type, and finally validators exposed by attached behaviours.
//!
//! Class validators implement [`Validator`]. A fresh instance is created for every rule
//! evaluation, configured with the rule's parameters and handed the owning document.

use async_trait::async_trait;

use crate::{document::AnyDocument, error::DocumentStoreResult, rule::Params, value::Value};

pub mod builtin;

pub use builtin::ValidationContext;

/// A named, reusable validator.
///
/// # Examples
///
/// ```ignore
/// #[derive(Default)]
/// struct Slug;
///
/// #[async_trait]
/// impl Validator for Slug {
///     async fn validate(&self, _owner: &dyn AnyDocument, _field: &str, value: &Value) -> DocumentStoreResult<bool> {
///         Ok(value.as_str().is_some_and(|slug| slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')))
///     }
/// }
/// ```
#[async_trait]
pub trait Validator: Send + Sync {
    /// Receives the rule's parameter bag before validation.
    fn configure(&mut self, params: &Params) -> DocumentStoreResult<()> {
        let _ = params;
        Ok(())
    }

    /// Checks `value` of `field` on `owner`.
    async fn validate(&self, owner: &dyn AnyDocument, field: &str, value: &Value) -> DocumentStoreResult<bool>;
}

/// Constructs a fresh validator instance.
pub(crate) type ValidatorFactory = fn() -> Box<dyn Validator>;

pub(crate) fn factory<V: Validator + Default + 'static>() -> Box<dyn Validator> {
    Box::new(V::default())
}
