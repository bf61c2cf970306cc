//! The built-in validator set.
//!
//! Every built-in except `required`, `boolean` and `safe` honours the shared `allowEmpty`
//! parameter (default `true`): an empty value (null, an empty list or mapping, an empty
//! string, or a blank string when `trim` is set) short-circuits to valid, or to invalid when
//! `allowEmpty` is `false`.
//!
//! Patterns may be written bare (`^[a-z]+$`) or with delimiters and flags (`/^[a-z]+$/i`).

use std::cmp::Ordering;

use bson::{Bson, Document as BsonDocument};
use chrono::{NaiveDate, Utc};
use regex::{Regex, RegexBuilder};

use crate::{
    database::Database,
    document::AnyDocument,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Filter},
    rule::{Params, ParamsExt, bson_number},
    value::Value,
};

/// Names of the built-in validators.
pub const BUILTIN: &[&str] = &[
    "required",
    "boolean",
    "string",
    "objExist",
    "in",
    "nin",
    "regex",
    "compare",
    "number",
    "url",
    "file",
    "tokenized",
    "email",
    "safe",
    "date",
];

const INT_PATTERN: &str = r"^\s*[+-]?\d+\s*$";
const NUM_PATTERN: &str = r"^\s*[-+]?[0-9]*\.?[0-9]+([eE][-+]?[0-9]+)?\s*$";
const TOKEN_DELIMITER: &str = r"\s*,\s*";
const URL_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9+.\-]*://(?:[^@/?#]*@)?[^:/?#]+";
const EMAIL_PATTERN: &str = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$";

const DELIMITERS: &[char] = &['/', '#', '~', '!', '@', '%', '|'];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN.contains(&name)
}

/// What a built-in validator may consult besides the value itself.
pub struct ValidationContext<'a> {
    owner: &'a dyn AnyDocument,
    database: &'a Database,
}

impl<'a> ValidationContext<'a> {
    pub fn new(owner: &'a dyn AnyDocument, database: &'a Database) -> Self {
        ValidationContext { owner, database }
    }

    /// The document being validated.
    pub fn owner(&self) -> &'a dyn AnyDocument {
        self.owner
    }

    pub fn database(&self) -> &'a Database {
        self.database
    }
}

/// Runs the built-in validator `name`.
///
/// Returns `Ok(None)` when `name` is not a built-in, so the caller can keep resolving.
pub async fn run(
    name: &str,
    ctx: &ValidationContext<'_>,
    field: &str,
    value: &Value,
    params: &Params,
) -> DocumentStoreResult<Option<bool>> {
    let outcome = match name {
        "required" => required(value),
        "boolean" => boolean(value, params),
        "string" => string(value, params),
        "objExist" => obj_exist(ctx, field, value, params).await?,
        "in" => in_range(value, params),
        "nin" => not_in_range(value, params),
        "regex" => regex(value, params)?,
        "compare" => compare(ctx, value, params)?,
        "number" => number(value, params)?,
        "url" => url(value, params)?,
        "file" => file(value, params)?,
        "tokenized" => tokenized(value, params)?,
        "email" => email(value, params)?,
        "safe" => true,
        "date" => date(value, params)?,
        _ => return Ok(None),
    };

    Ok(Some(outcome))
}

fn empty_gate(value: &Value, params: &Params) -> Option<bool> {
    value
        .is_empty(params.flag("trim", false))
        .then(|| params.flag("allowEmpty", true))
}

fn required(value: &Value) -> bool {
    !value.is_empty(false)
}

fn boolean(value: &Value, params: &Params) -> bool {
    if params.flag("allowNull", false) && value.is_empty(false) {
        return true;
    }

    let true_value = params.get("trueValue").cloned().unwrap_or(Bson::Int32(1));
    let false_value = params.get("falseValue").cloned().unwrap_or(Bson::Int32(0));
    let raw = value.to_raw();

    strict_eq(&raw, &true_value) || strict_eq(&raw, &false_value) || !truthy(&raw)
}

fn string(value: &Value, params: &Params) -> bool {
    if let Some(outcome) = empty_gate(value, params) {
        return outcome;
    }
    let Some(text) = value.as_str() else {
        return false;
    };

    // Character length only when an encoding is named, byte length otherwise.
    let length = if params.text("encoding").is_some() {
        text.chars().count()
    } else {
        text.len()
    } as f64;

    if params.number("min").is_some_and(|min| min != 0.0 && min > length) {
        return false;
    }
    if params.number("max").is_some_and(|max| max != 0.0 && max < length) {
        return false;
    }
    params.number("is").is_none_or(|is| is == length)
}

async fn obj_exist(
    ctx: &ValidationContext<'_>,
    field: &str,
    value: &Value,
    params: &Params,
) -> DocumentStoreResult<bool> {
    if let Some(outcome) = empty_gate(value, params) {
        return Ok(outcome);
    }

    let class = params
        .text("class")
        .ok_or_else(|| DocumentStoreError::configuration(format!("objExist on {field} needs a class")))?;
    let entry = ctx.database.resolve(class).ok_or_else(|| {
        DocumentStoreError::configuration(format!("objExist on {field} names unknown type {class}"))
    })?;

    let lookup = params.text("field").unwrap_or(field);
    let mut filter = Filter::eq(lookup, value.to_raw());
    if let Some(Bson::Document(condition)) = params.get("condition")
        && let Some(extra) = Expr::from_equalities(condition)
    {
        filter = filter.and(extra);
    }

    let found = ctx
        .database
        .collection(entry.collection())
        .find_one(Some(filter))
        .await?
        .is_some();

    Ok(found != params.flag("notExist", false))
}

fn in_range(value: &Value, params: &Params) -> bool {
    if let Some(outcome) = empty_gate(value, params) {
        return outcome;
    }
    range_contains(value, params)
}

fn not_in_range(value: &Value, params: &Params) -> bool {
    if let Some(outcome) = empty_gate(value, params) {
        return outcome;
    }
    !range_contains(value, params)
}

fn range_contains(value: &Value, params: &Params) -> bool {
    let raw = value.to_raw();
    params
        .list("range")
        .is_some_and(|range| range.iter().any(|candidate| loose_eq(candidate, &raw)))
}

fn regex(value: &Value, params: &Params) -> DocumentStoreResult<bool> {
    if let Some(outcome) = empty_gate(value, params) {
        return Ok(outcome);
    }

    let pattern = params
        .text("pattern")
        .ok_or_else(|| DocumentStoreError::configuration("regex validator needs a pattern"))?;
    let pattern = compile_pattern(pattern)?;
    let Some(text) = scalar_text(value) else {
        return Ok(false);
    };

    let matched = pattern.is_match(&text);
    Ok(matched != params.flag("nin", false))
}

fn compare(ctx: &ValidationContext<'_>, value: &Value, params: &Params) -> DocumentStoreResult<bool> {
    if let Some(outcome) = empty_gate(value, params) {
        return Ok(outcome);
    }

    let with = match params.text("field") {
        Some(other) => ctx
            .owner
            .value(other)
            .map(|value| value.to_raw())
            .unwrap_or(Bson::Null),
        None => params.get("with").cloned().unwrap_or(Bson::Boolean(true)),
    };
    let raw = value.to_raw();

    let outcome = match params.text("operator").unwrap_or("=") {
        "=" | "==" => loose_eq(&raw, &with),
        "!=" => !loose_eq(&raw, &with),
        ">=" => matches!(loose_cmp(&raw, &with), Some(Ordering::Greater | Ordering::Equal)),
        ">" => matches!(loose_cmp(&raw, &with), Some(Ordering::Greater)),
        "<=" => matches!(loose_cmp(&raw, &with), Some(Ordering::Less | Ordering::Equal)),
        "<" => matches!(loose_cmp(&raw, &with), Some(Ordering::Less)),
        other => {
            return Err(DocumentStoreError::configuration(format!(
                "unknown compare operator {other}"
            )));
        }
    };

    Ok(outcome)
}

fn number(value: &Value, params: &Params) -> DocumentStoreResult<bool> {
    if let Some(outcome) = empty_gate(value, params) {
        return Ok(outcome);
    }
    let Some(text) = scalar_text(value) else {
        return Ok(false);
    };

    let pattern = if params.flag("integerOnly", true) {
        params.text("intPattern").unwrap_or(INT_PATTERN)
    } else {
        params.text("numPattern").unwrap_or(NUM_PATTERN)
    };
    if !compile_pattern(pattern)?.is_match(&text) {
        return Ok(false);
    }

    let Ok(number) = text.trim().parse::<f64>() else {
        return Ok(true);
    };
    if params.number("min").is_some_and(|min| min != 0.0 && number < min) {
        return Ok(false);
    }
    if params.number("max").is_some_and(|max| max != 0.0 && number > max) {
        return Ok(false);
    }
    Ok(true)
}

fn url(value: &Value, params: &Params) -> DocumentStoreResult<bool> {
    if let Some(outcome) = empty_gate(value, params) {
        return Ok(outcome);
    }
    let Some(text) = value.as_str() else {
        return Ok(false);
    };

    Ok(compile_pattern(URL_PATTERN)?.is_match(text.trim()))
}

fn file(value: &Value, params: &Params) -> DocumentStoreResult<bool> {
    if let Some(outcome) = empty_gate(value, params) {
        return Ok(outcome);
    }
    let Some(Bson::Document(upload)) = value.as_bson() else {
        return Ok(false);
    };

    // Upload result code 0 is the only success.
    if upload.get("error").and_then(bson_number) != Some(0.0) {
        return Ok(false);
    }

    if let Some(extensions) = params.list("ext") {
        let name = upload_text(upload, "name");
        let extension = name.rsplit_once('.').map(|(_, extension)| extension).unwrap_or("");
        if !extensions.iter().any(|allowed| allowed.as_str() == Some(extension)) {
            return Ok(false);
        }
    }

    if let Some(Bson::Document(bounds)) = params.get("size") {
        let size = upload.get("size").and_then(bson_number).unwrap_or(0.0);
        if let Some(at_least) = bounds.get("gt").and_then(bson_number) {
            if size < at_least {
                return Ok(false);
            }
        } else if let Some(at_most) = bounds.get("lt").and_then(bson_number)
            && size > at_most
        {
            return Ok(false);
        }
    }

    if let Some(kind) = params.text("type") {
        let pattern = RegexBuilder::new(kind)
            .case_insensitive(true)
            .build()
            .map_err(|err| DocumentStoreError::configuration(format!("invalid file type pattern {kind}: {err}")))?;
        if !pattern.is_match(upload_text(upload, "type")) {
            return Ok(false);
        }
    }

    Ok(true)
}

fn upload_text<'a>(upload: &'a BsonDocument, key: &str) -> &'a str {
    upload.get(key).and_then(Bson::as_str).unwrap_or("")
}

fn tokenized(value: &Value, params: &Params) -> DocumentStoreResult<bool> {
    if let Some(outcome) = empty_gate(value, params) {
        return Ok(outcome);
    }
    let Some(text) = value.as_str() else {
        return Ok(false);
    };

    let delimiter = compile_pattern(params.text("del").unwrap_or(TOKEN_DELIMITER))?;
    let tokens = delimiter.split(text).count() as f64;

    Ok(params.number("max").is_none_or(|max| tokens <= max))
}

fn email(value: &Value, params: &Params) -> DocumentStoreResult<bool> {
    if let Some(outcome) = empty_gate(value, params) {
        return Ok(outcome);
    }
    let Some(text) = value.as_str() else {
        return Ok(false);
    };
    let Some((local, _)) = text.rsplit_once('@') else {
        return Ok(false);
    };
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Ok(false);
    }

    Ok(compile_pattern(EMAIL_PATTERN)?.is_match(text))
}

fn date(value: &Value, params: &Params) -> DocumentStoreResult<bool> {
    if let Some(outcome) = empty_gate(value, params) {
        return Ok(outcome);
    }
    let Some(text) = value.as_str() else {
        return Ok(false);
    };

    let tokens: Vec<&str> = text
        .split(|c: char| c == '-' || c == '/' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect();
    let &[first, second, third] = tokens.as_slice() else {
        return Ok(false);
    };

    let (day, month, year) = match params.text("format").unwrap_or("d/m/yyyy") {
        "d/m/yyyy" => (first, second, third),
        "m/d/yyyy" => (second, first, third),
        "yyyy/m/d" => (third, second, first),
        other => {
            return Err(DocumentStoreError::configuration(format!(
                "unsupported date format {other}"
            )));
        }
    };
    if year.len() != 4 {
        return Ok(false);
    }

    let parsed = match (year.parse::<i32>(), month.parse::<u32>(), day.parse::<u32>()) {
        (Ok(year), Ok(month), Ok(day)) => NaiveDate::from_ymd_opt(year, month, day),
        _ => None,
    };

    Ok(parsed.is_some_and(|date| date <= Utc::now().date_naive()))
}

/// Compiles a bare or delimited (`/body/flags`) pattern.
pub fn compile_pattern(pattern: &str) -> DocumentStoreResult<Regex> {
    let (body, flags) = split_delimited(pattern).unwrap_or((pattern, ""));

    RegexBuilder::new(body)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()
        .map_err(|err| DocumentStoreError::configuration(format!("invalid pattern {pattern}: {err}")))
}

fn split_delimited(pattern: &str) -> Option<(&str, &str)> {
    let delimiter = pattern.chars().next().filter(|c| DELIMITERS.contains(c))?;
    let end = pattern.rfind(delimiter).filter(|end| *end > 0)?;
    let flags = &pattern[end + delimiter.len_utf8()..];

    flags
        .chars()
        .all(|c| c.is_ascii_alphabetic())
        .then(|| (&pattern[delimiter.len_utf8()..end], flags))
}

/// Text form of a scalar value as pattern validators see it.
fn scalar_text(value: &Value) -> Option<String> {
    match value.as_bson()? {
        Bson::String(text) => Some(text.clone()),
        Bson::Int32(number) => Some(number.to_string()),
        Bson::Int64(number) => Some(number.to_string()),
        Bson::Double(number) => Some(number.to_string()),
        Bson::Boolean(true) => Some("1".to_string()),
        Bson::Boolean(false) => Some(String::new()),
        _ => None,
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Null | Bson::Undefined => false,
        Bson::Boolean(flag) => *flag,
        Bson::Int32(number) => *number != 0,
        Bson::Int64(number) => *number != 0,
        Bson::Double(number) => *number != 0.0,
        Bson::String(text) => !text.is_empty() && text != "0",
        Bson::Array(items) => !items.is_empty(),
        Bson::Document(map) => !map.is_empty(),
        _ => true,
    }
}

fn is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

/// Identity comparison; numbers of different widths compare by value.
fn strict_eq(left: &Bson, right: &Bson) -> bool {
    if is_number(left) && is_number(right) {
        return bson_number(left) == bson_number(right);
    }
    left == right
}

/// Loose equality: booleans compare by truthiness, null equals empty values, and numbers
/// or numeric strings compare by value.
pub fn loose_eq(left: &Bson, right: &Bson) -> bool {
    match (left, right) {
        (Bson::Boolean(_), _) | (_, Bson::Boolean(_)) => truthy(left) == truthy(right),
        (Bson::Null, Bson::String(text)) | (Bson::String(text), Bson::Null) => text.is_empty(),
        (Bson::Null, other) | (other, Bson::Null) => !truthy(other),
        _ => match (bson_number(left), bson_number(right)) {
            (Some(left), Some(right)) => left == right,
            _ => left == right,
        },
    }
}

/// Loose ordering: numerically when both sides read as numbers, otherwise strings and
/// datetimes compare with their natural order.
pub fn loose_cmp(left: &Bson, right: &Bson) -> Option<Ordering> {
    match (bson_number(left), bson_number(right)) {
        (Some(left), Some(right)) => left.partial_cmp(&right),
        _ => match (left, right) {
            (Bson::String(left), Bson::String(right)) => Some(left.cmp(right)),
            (Bson::DateTime(left), Bson::DateTime(right)) => {
                Some(left.timestamp_millis().cmp(&right.timestamp_millis()))
            }
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn text(value: &str) -> Value {
        Value::from(value)
    }

    // ============================================
    // Emptiness
    // ============================================

    #[test]
    fn test_required_rejects_empty_values() {
        assert!(required(&text("x")));
        assert!(!required(&text("")));
        assert!(!required(&Value::null()));
        assert!(!required(&Value::from(Bson::Array(vec![]))));
        assert!(required(&Value::from(0)));
    }

    #[test]
    fn test_allow_empty_short_circuits() {
        let params = doc! { "range": ["a"] };
        assert!(in_range(&text(""), &params));

        let strict = doc! { "range": ["a"], "allowEmpty": false };
        assert!(!in_range(&text(""), &strict));

        let trimmed = doc! { "min": 3, "trim": true, "allowEmpty": false };
        assert!(!string(&text("   "), &trimmed));
    }

    // ============================================
    // Membership and comparison
    // ============================================

    #[test]
    fn test_in_and_nin_are_complements() {
        let params = doc! { "range": ["d"] };

        assert!(in_range(&text("d"), &params));
        assert!(!in_range(&text("e"), &params));
        assert!(!not_in_range(&text("d"), &params));
        assert!(not_in_range(&text("e"), &params));
    }

    #[test]
    fn test_in_uses_loose_equality() {
        let params = doc! { "range": [1, 2, 3] };

        assert!(in_range(&text("2"), &params));
        assert!(!in_range(&text("4"), &params));
    }

    #[test]
    fn test_loose_equality() {
        assert!(loose_eq(&Bson::String("1".into()), &Bson::Int32(1)));
        assert!(loose_eq(&Bson::Int64(5), &Bson::Double(5.0)));
        assert!(loose_eq(&Bson::Null, &Bson::String(String::new())));
        assert!(loose_eq(&Bson::Boolean(true), &Bson::String("yes".into())));
        assert!(!loose_eq(&Bson::String("abc".into()), &Bson::Int32(0)));
        assert!(!loose_eq(&Bson::String("d".into()), &Bson::String("e".into())));
    }

    #[test]
    fn test_loose_ordering() {
        assert_eq!(loose_cmp(&Bson::Int32(3), &Bson::String("10".into())), Some(Ordering::Less));
        assert_eq!(
            loose_cmp(&Bson::String("b".into()), &Bson::String("a".into())),
            Some(Ordering::Greater)
        );
        assert_eq!(loose_cmp(&Bson::Null, &Bson::Document(doc! {})), None);
    }

    // ============================================
    // Strings and patterns
    // ============================================

    #[test]
    fn test_string_length_bounds() {
        let params = doc! { "min": 2, "max": 4 };

        assert!(string(&text("abc"), &params));
        assert!(!string(&text("a"), &params));
        assert!(!string(&text("abcde"), &params));
        assert!(!string(&Value::from(42), &params));
    }

    #[test]
    fn test_string_counts_characters_with_encoding() {
        let bytes = doc! { "max": 3 };
        let chars = doc! { "max": 3, "encoding": "UTF-8" };

        assert!(!string(&text("été"), &bytes));
        assert!(string(&text("été"), &chars));
    }

    #[test]
    fn test_regex_with_delimiters_and_flags() {
        let params = doc! { "pattern": "/^[a-z]+$/i" };
        assert!(regex(&text("Hello"), &params).unwrap());
        assert!(!regex(&text("Hello1"), &params).unwrap());

        let inverted = doc! { "pattern": "^[0-9]+$", "nin": true };
        assert!(regex(&text("abc"), &inverted).unwrap());
        assert!(!regex(&text("123"), &inverted).unwrap());
    }

    #[test]
    fn test_regex_without_pattern_is_configuration_error() {
        let err = regex(&text("abc"), &doc! {}).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Configuration(_)));
    }

    #[test]
    fn test_split_delimited_leaves_bare_patterns() {
        assert_eq!(split_delimited("/abc/i"), Some(("abc", "i")));
        assert_eq!(split_delimited("#a/b#"), Some(("a/b", "")));
        assert_eq!(split_delimited("^abc$"), None);
        assert_eq!(split_delimited("/"), None);
    }

    #[test]
    fn test_tokenized_bounds_token_count() {
        let params = doc! { "max": 3 };

        assert!(tokenized(&text("a, b,c"), &params).unwrap());
        assert!(!tokenized(&text("a, b, c, d"), &params).unwrap());
    }

    // ============================================
    // Numbers and booleans
    // ============================================

    #[test]
    fn test_number_integer_only_by_default() {
        let params = doc! {};

        assert!(number(&text(" 42 "), &params).unwrap());
        assert!(number(&Value::from(7), &params).unwrap());
        assert!(!number(&text("4.2"), &params).unwrap());
        assert!(number(&text("4.2"), &doc! { "integerOnly": false }).unwrap());
        assert!(!number(&text("abc"), &doc! { "integerOnly": false }).unwrap());
    }

    #[test]
    fn test_number_bounds() {
        let params = doc! { "min": 10, "max": 20 };

        assert!(number(&text("15"), &params).unwrap());
        assert!(!number(&text("5"), &params).unwrap());
        assert!(!number(&text("25"), &params).unwrap());
    }

    #[test]
    fn test_boolean_sentinels() {
        let params = doc! {};

        assert!(boolean(&Value::from(1), &params));
        assert!(boolean(&Value::from(0), &params));
        assert!(boolean(&Value::from(false), &params));
        assert!(!boolean(&Value::from(2), &params));
        assert!(!boolean(&text("yes"), &params));
        assert!(boolean(&text("yes"), &doc! { "trueValue": "yes" }));
    }

    // ============================================
    // Formats
    // ============================================

    #[test]
    fn test_url_requires_scheme_and_host() {
        let params = doc! {};

        assert!(url(&text("https://example.com/path?q=1"), &params).unwrap());
        assert!(url(&text("ftp://user@files.example.com:21"), &params).unwrap());
        assert!(!url(&text("example.com"), &params).unwrap());
        assert!(!url(&text("mailto:someone@example.com"), &params).unwrap());
    }

    #[test]
    fn test_email_syntax() {
        let params = doc! {};

        assert!(email(&text("sam@example.com"), &params).unwrap());
        assert!(email(&text("first.last+tag@mail.example.org"), &params).unwrap());
        assert!(!email(&text("sam@localhost"), &params).unwrap());
        assert!(!email(&text("sam..x@example.com"), &params).unwrap());
        assert!(!email(&text("not an email"), &params).unwrap());
    }

    #[test]
    fn test_date_formats_and_future_dates() {
        assert!(date(&text("25/12/2001"), &doc! {}).unwrap());
        assert!(date(&text("12-25-2001"), &doc! { "format": "m/d/yyyy" }).unwrap());
        assert!(date(&text("2001 12 25"), &doc! { "format": "yyyy/m/d" }).unwrap());
        assert!(!date(&text("31/02/2001"), &doc! {}).unwrap());
        assert!(!date(&text("25/12/01"), &doc! {}).unwrap());
        assert!(!date(&text("1/1/9999"), &doc! {}).unwrap());
    }

    #[test]
    fn test_file_checks_upload() {
        let upload = Value::from(doc! { "error": 0, "name": "avatar.png", "size": 2048, "type": "image/png" });

        assert!(file(&upload, &doc! { "ext": ["png", "jpg"] }).unwrap());
        assert!(!file(&upload, &doc! { "ext": ["gif"] }).unwrap());
        assert!(file(&upload, &doc! { "size": { "gt": 1024 } }).unwrap());
        assert!(!file(&upload, &doc! { "size": { "lt": 1024 } }).unwrap());
        assert!(file(&upload, &doc! { "type": "^image/" }).unwrap());
        assert!(!file(&upload, &doc! { "type": "^video/" }).unwrap());

        let failed = Value::from(doc! { "error": 4, "name": "avatar.png" });
        assert!(!file(&failed, &doc! {}).unwrap());
    }

    #[test]
    fn test_builtin_names() {
        assert!(is_builtin("objExist"));
        assert!(is_builtin("safe"));
        assert!(!is_builtin("embedOne"));
    }
}
