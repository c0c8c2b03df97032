//! Schema engine behind the validation adapter.
//!
//! A request schema is a Rust type implementing [`RequestSchema`]. Its
//! `read` function pulls every field through a [`FieldReader`], which applies
//! the field's rules, records at most one issue per field, and coerces
//! string-typed query and path values into numbers where the schema asks for
//! them. Issues use stable codes (`invalid_type`, `too_small`, `too_big`,
//! `invalid_string`) and dotted field paths.

use std::num::FpCategory;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Number, Value};
use url::Url;
use uuid::Uuid;

use crate::domain::FieldIssue;

/// Message recorded for a missing required field.
pub const REQUIRED_MESSAGE: &str = "Required";

/// Input location a schema validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// JSON request body.
    Body,
    /// Query string.
    Query,
    /// Path parameters.
    Params,
}

impl Source {
    /// Prefix used in issue field paths.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Query => "query",
            Self::Params => "params",
        }
    }

    /// Whether raw values arrive as strings and may be coerced.
    const fn coerces(self) -> bool {
        !matches!(self, Self::Body)
    }
}

/// Validation issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCode {
    /// Missing value or value of the wrong JSON type.
    InvalidType,
    /// Below a length or numeric minimum.
    TooSmall,
    /// Above a length or numeric maximum.
    TooBig,
    /// String failed a format check.
    InvalidString,
}

impl IssueCode {
    /// Stable wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidType => "invalid_type",
            Self::TooSmall => "too_small",
            Self::TooBig => "too_big",
            Self::InvalidString => "invalid_string",
        }
    }
}

/// Rule applied to a string field. Each rule carries its failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringRule {
    /// At least this many characters.
    MinLen(usize, &'static str),
    /// At most this many characters.
    MaxLen(usize, &'static str),
    /// Email address.
    Email(&'static str),
    /// Absolute URL.
    Url(&'static str),
    /// Hyphenated UUID.
    Uuid(&'static str),
}

impl StringRule {
    fn check(self, value: &str) -> Result<(), (IssueCode, &'static str)> {
        let length = value.chars().count();
        match self {
            Self::MinLen(min, message) if length < min => Err((IssueCode::TooSmall, message)),
            Self::MaxLen(max, message) if length > max => Err((IssueCode::TooBig, message)),
            Self::Email(message) if !is_email(value) => Err((IssueCode::InvalidString, message)),
            Self::Url(message) if Url::parse(value).is_err() => {
                Err((IssueCode::InvalidString, message))
            }
            Self::Uuid(message) if !is_hyphenated_uuid(value) => {
                Err((IssueCode::InvalidString, message))
            }
            _ => Ok(()),
        }
    }
}

/// Rule applied to an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntRule {
    /// Inclusive lower bound.
    Min(i64, &'static str),
    /// Inclusive upper bound.
    Max(i64, &'static str),
}

impl IntRule {
    fn check(self, value: i64) -> Result<(), (IssueCode, &'static str)> {
        match self {
            Self::Min(min, message) if value < min => Err((IssueCode::TooSmall, message)),
            Self::Max(max, message) if value > max => Err((IssueCode::TooBig, message)),
            _ => Ok(()),
        }
    }
}

static EMAIL_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn email_regex() -> Option<&'static Regex> {
    EMAIL_RE
        .get_or_init(|| {
            // Leading dots and consecutive dots are rejected separately.
            let pattern = r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$";
            Regex::new(pattern).ok()
        })
        .as_ref()
}

fn is_email(value: &str) -> bool {
    !value.starts_with('.')
        && !value.contains("..")
        && email_regex().is_some_and(|re| re.is_match(value))
}

fn is_hyphenated_uuid(value: &str) -> bool {
    value.len() == 36
        && value.chars().filter(|c| *c == '-').count() == 4
        && Uuid::try_parse(value).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberIssue {
    NotANumber,
    Fractional,
    OutOfRange,
}

impl NumberIssue {
    const fn code(self) -> IssueCode {
        match self {
            Self::NotANumber | Self::Fractional => IssueCode::InvalidType,
            Self::OutOfRange => IssueCode::TooBig,
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::NotANumber => "Expected number, received nan",
            Self::Fractional => "Expected integer, received float",
            Self::OutOfRange => "Number is out of range",
        }
    }
}

/// Integer value of a float without a fractional part, such as `30.0` or
/// `1e3`.
fn integral(number: f64) -> Result<i64, NumberIssue> {
    if !number.is_finite() {
        return Err(NumberIssue::NotANumber);
    }
    if number.fract().classify() != FpCategory::Zero {
        return Err(NumberIssue::Fractional);
    }
    format!("{number:.0}")
        .parse::<i64>()
        .map_err(|_| NumberIssue::OutOfRange)
}

/// Integer carried by a JSON number.
fn json_int(number: &Number) -> Result<i64, NumberIssue> {
    if let Some(value) = number.as_i64() {
        return Ok(value);
    }
    if number.is_u64() {
        return Err(NumberIssue::OutOfRange);
    }
    number.as_f64().map_or(Err(NumberIssue::NotANumber), integral)
}

/// Coerce a query or path string into an integer. Blank input reads as zero.
fn coerce_int(text: &str) -> Result<i64, NumberIssue> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value);
    }
    trimmed
        .parse::<f64>()
        .map_or(Err(NumberIssue::NotANumber), integral)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Reads fields out of one input object and collects issues.
///
/// Field paths are relative; the source prefix is added by [`parse_source`].
#[derive(Debug)]
pub struct FieldReader<'a> {
    fields: &'a Map<String, Value>,
    coerce: bool,
    issues: Vec<FieldIssue>,
}

impl<'a> FieldReader<'a> {
    fn new(fields: &'a Map<String, Value>, coerce: bool) -> Self {
        Self {
            fields,
            coerce,
            issues: Vec::new(),
        }
    }

    fn record(&mut self, field: &str, code: IssueCode, message: impl Into<String>) {
        self.issues.push(FieldIssue::new(field, message, code.as_str()));
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        self.fields.get(field)
    }

    fn check_string(&mut self, field: &str, raw: &Value, rules: &[StringRule]) -> Option<String> {
        let Value::String(value) = raw else {
            self.record(
                field,
                IssueCode::InvalidType,
                format!("Expected string, received {}", type_name(raw)),
            );
            return None;
        };
        match rules.iter().try_for_each(|rule| rule.check(value)) {
            Ok(()) => Some(value.clone()),
            Err((code, message)) => {
                self.record(field, code, message);
                None
            }
        }
    }

    fn check_int(&mut self, field: &str, raw: &Value, rules: &[IntRule]) -> Option<i64> {
        let parsed = match raw {
            Value::Number(number) => json_int(number),
            Value::String(text) if self.coerce => coerce_int(text),
            other => {
                self.record(
                    field,
                    IssueCode::InvalidType,
                    format!("Expected number, received {}", type_name(other)),
                );
                return None;
            }
        };
        let value = match parsed {
            Ok(value) => value,
            Err(issue) => {
                self.record(field, issue.code(), issue.message());
                return None;
            }
        };
        match rules.iter().try_for_each(|rule| rule.check(value)) {
            Ok(()) => Some(value),
            Err((code, message)) => {
                self.record(field, code, message);
                None
            }
        }
    }

    /// Required string field.
    pub fn string(&mut self, field: &str, rules: &[StringRule]) -> Option<String> {
        match self.present(field) {
            Some(raw) => self.check_string(field, raw, rules),
            None => {
                self.record(field, IssueCode::InvalidType, REQUIRED_MESSAGE);
                None
            }
        }
    }

    /// Optional string field. The outer `None` signals a failed rule.
    pub fn optional_string(
        &mut self,
        field: &str,
        rules: &[StringRule],
    ) -> Option<Option<String>> {
        match self.present(field) {
            Some(raw) => self.check_string(field, raw, rules).map(Some),
            None => Some(None),
        }
    }

    /// Required integer field.
    pub fn integer(&mut self, field: &str, rules: &[IntRule]) -> Option<i64> {
        match self.present(field) {
            Some(raw) => self.check_int(field, raw, rules),
            None => {
                self.record(field, IssueCode::InvalidType, REQUIRED_MESSAGE);
                None
            }
        }
    }

    /// Integer field replaced by `default` when absent.
    pub fn integer_or(&mut self, field: &str, default: i64, rules: &[IntRule]) -> Option<i64> {
        match self.present(field) {
            Some(raw) => self.check_int(field, raw, rules),
            None => Some(default),
        }
    }

    /// Record a custom issue, for cross-field checks.
    pub fn reject(&mut self, field: &str, code: IssueCode, message: impl Into<String>) {
        self.record(field, code, message);
    }
}

/// A typed view of one request input source.
pub trait RequestSchema: Sized {
    /// Whether the schema inspects its source at all.
    const PRESENT: bool = true;

    /// Read every field, returning `None` when any issue was recorded.
    fn read(reader: &mut FieldReader<'_>) -> Option<Self>;

    /// Validate raw input from `source`.
    ///
    /// # Errors
    /// Returns every issue found, with field paths prefixed by the source.
    fn parse(source: Source, input: &Value) -> Result<Self, Vec<FieldIssue>> {
        parse_source(source, input)
    }
}

/// Absent schema: any input is accepted untouched.
impl RequestSchema for () {
    const PRESENT: bool = false;

    fn read(_reader: &mut FieldReader<'_>) -> Option<Self> {
        Some(())
    }

    fn parse(_source: Source, _input: &Value) -> Result<Self, Vec<FieldIssue>> {
        Ok(())
    }
}

/// Run schema `T` over `input`.
///
/// # Errors
/// Returns the collected issues with `source.` prefixed field paths. A
/// non-object input yields a single issue on the bare source name.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use sitescope_backend::inbound::http::validation::{Source, parse_source};
/// use sitescope_backend::inbound::http::demo_users::UserIdParams;
///
/// let issues = parse_source::<UserIdParams>(Source::Params, &json!({"id": "nope"}))
///     .expect_err("not a UUID");
/// assert_eq!(issues[0].field, "params.id");
/// ```
pub fn parse_source<T: RequestSchema>(source: Source, input: &Value) -> Result<T, Vec<FieldIssue>> {
    let prefix = source.prefix();
    let Value::Object(fields) = input else {
        let received = type_name(input);
        let message = if input.is_null() {
            REQUIRED_MESSAGE.to_owned()
        } else {
            format!("Expected object, received {received}")
        };
        return Err(vec![FieldIssue::new(
            prefix,
            message,
            IssueCode::InvalidType.as_str(),
        )]);
    };

    let mut reader = FieldReader::new(fields, source.coerces());
    let parsed = T::read(&mut reader);
    match (parsed, reader.issues.is_empty()) {
        (Some(value), true) => Ok(value),
        (_, false) => Err(reader
            .issues
            .into_iter()
            .map(|issue| FieldIssue {
                field: format!("{prefix}.{}", issue.field),
                ..issue
            })
            .collect()),
        (None, true) => Err(vec![FieldIssue::new(
            prefix,
            "Invalid input",
            IssueCode::InvalidType.as_str(),
        )]),
    }
}

/// Page-based pagination query shared by listing routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// One-based page number.
    pub page: u32,
    /// Items per page.
    pub limit: u32,
}

impl Pagination {
    /// Page used when the client sends none.
    pub const DEFAULT_PAGE: u32 = 1;
    /// Page size used when the client sends none.
    pub const DEFAULT_LIMIT: u32 = 10;
    /// Largest accepted page number.
    pub const MAX_PAGE: u32 = u32::MAX;
    /// Largest accepted page size.
    pub const MAX_LIMIT: u32 = 100;

    /// Read `page` and `limit` from a query reader.
    pub fn read_from(reader: &mut FieldReader<'_>) -> Option<Self> {
        let page = reader.integer_or(
            "page",
            i64::from(Self::DEFAULT_PAGE),
            &[
                IntRule::Min(1, "Page must be positive"),
                IntRule::Max(i64::from(Self::MAX_PAGE), "Page is too large"),
            ],
        );
        let limit = reader.integer_or(
            "limit",
            i64::from(Self::DEFAULT_LIMIT),
            &[
                IntRule::Min(1, "Number must be greater than or equal to 1"),
                IntRule::Max(i64::from(Self::MAX_LIMIT), "Limit must be between 1-100"),
            ],
        );
        Some(Self {
            page: u32::try_from(page?).ok()?,
            limit: u32::try_from(limit?).ok()?,
        })
    }

    /// Number of pages needed for `total` items.
    #[must_use]
    pub const fn total_pages(self, total: u32) -> u32 {
        total.div_ceil(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: Self::DEFAULT_PAGE,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

impl RequestSchema for Pagination {
    fn read(reader: &mut FieldReader<'_>) -> Option<Self> {
        Self::read_from(reader)
    }
}

#[cfg(test)]
mod tests {
    //! Rule, coercion and aggregation behaviour of the schema engine.
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[derive(Debug)]
    struct Sample {
        name: String,
        count: i64,
        site: Option<String>,
    }

    impl RequestSchema for Sample {
        fn read(reader: &mut FieldReader<'_>) -> Option<Self> {
            let name = reader.string(
                "name",
                &[StringRule::MinLen(1, "Name is required"), StringRule::MaxLen(5, "Name too long")],
            );
            let count = reader.integer("count", &[IntRule::Min(1, "Too few"), IntRule::Max(9, "Too many")]);
            let site = reader.optional_string("site", &[StringRule::Url("Invalid URL format")]);
            Some(Self {
                name: name?,
                count: count?,
                site: site?,
            })
        }
    }

    fn issue_pairs(issues: &[FieldIssue]) -> Vec<(&str, &str, &str)> {
        issues
            .iter()
            .map(|issue| (issue.field.as_str(), issue.message.as_str(), issue.code.as_str()))
            .collect()
    }

    #[rstest]
    fn valid_body_parses() {
        let sample = parse_source::<Sample>(Source::Body, &json!({"name": "abc", "count": 3}))
            .expect("valid input");
        assert_eq!(sample.name, "abc");
        assert_eq!(sample.count, 3);
        assert!(sample.site.is_none());
    }

    #[rstest]
    fn every_failing_field_is_reported_once() {
        let issues = parse_source::<Sample>(
            Source::Body,
            &json!({"name": "", "count": 12, "site": "nope"}),
        )
        .expect_err("invalid input");
        assert_eq!(
            issue_pairs(&issues),
            vec![
                ("body.name", "Name is required", "too_small"),
                ("body.count", "Too many", "too_big"),
                ("body.site", "Invalid URL format", "invalid_string"),
            ]
        );
    }

    #[rstest]
    fn missing_fields_are_required() {
        let issues = parse_source::<Sample>(Source::Body, &json!({})).expect_err("empty body");
        assert_eq!(
            issue_pairs(&issues),
            vec![
                ("body.name", "Required", "invalid_type"),
                ("body.count", "Required", "invalid_type"),
            ]
        );
    }

    #[rstest]
    #[case(json!({"name": 7, "count": 1}), "body.name", "Expected string, received number")]
    #[case(json!({"name": "a", "count": "2"}), "body.count", "Expected number, received string")]
    #[case(json!({"name": "a", "count": 1.5}), "body.count", "Expected integer, received float")]
    fn body_values_are_not_coerced(
        #[case] input: Value,
        #[case] field: &str,
        #[case] message: &str,
    ) {
        let issues = parse_source::<Sample>(Source::Body, &input).expect_err("wrong type");
        assert_eq!(issue_pairs(&issues), vec![(field, message, "invalid_type")]);
    }

    #[rstest]
    #[case(json!(3.0), 3)]
    #[case(json!(1e0), 1)]
    fn integral_floats_are_integers(#[case] count: Value, #[case] expected: i64) {
        let input = json!({"name": "abc", "count": count});
        let sample = parse_source::<Sample>(Source::Body, &input).expect("integral float");
        assert_eq!(sample.count, expected);
    }

    #[rstest]
    #[case("1e3", Ok(1000))]
    #[case(" 30.0 ", Ok(30))]
    #[case("2.5", Err(NumberIssue::Fractional))]
    #[case("abc", Err(NumberIssue::NotANumber))]
    #[case("inf", Err(NumberIssue::NotANumber))]
    #[case("99999999999999999999", Err(NumberIssue::OutOfRange))]
    fn strings_coerce_to_integers(#[case] text: &str, #[case] expected: Result<i64, NumberIssue>) {
        assert_eq!(coerce_int(text), expected);
    }

    #[rstest]
    fn oversized_json_integers_are_out_of_range() {
        let input = json!({"name": "abc", "count": u64::MAX});
        let issues = parse_source::<Sample>(Source::Body, &input).expect_err("too big");
        assert_eq!(
            issue_pairs(&issues),
            vec![("body.count", "Number is out of range", "too_big")]
        );
    }

    #[rstest]
    fn query_strings_are_coerced() {
        let sample = parse_source::<Sample>(Source::Query, &json!({"name": "abc", "count": "4"}))
            .expect("coerced");
        assert_eq!(sample.count, 4);
    }

    #[rstest]
    fn non_numeric_query_value_is_nan() {
        let issues = parse_source::<Sample>(Source::Query, &json!({"name": "abc", "count": "x"}))
            .expect_err("not a number");
        assert_eq!(
            issue_pairs(&issues),
            vec![("query.count", "Expected number, received nan", "invalid_type")]
        );
    }

    #[rstest]
    #[case(json!(null), "Required")]
    #[case(json!([1, 2]), "Expected object, received array")]
    fn non_object_input_is_reported_on_source(#[case] input: Value, #[case] message: &str) {
        let issues = parse_source::<Sample>(Source::Body, &input).expect_err("not an object");
        assert_eq!(issue_pairs(&issues), vec![("body", message, "invalid_type")]);
    }

    #[rstest]
    fn unit_schema_accepts_anything() {
        assert!(<() as RequestSchema>::parse(Source::Body, &json!(null)).is_ok());
    }

    #[rstest]
    #[case("jane@example.com", true)]
    #[case("first.last+tag@sub.example.org", true)]
    #[case("not-an-email", false)]
    #[case(".lead@example.com", false)]
    #[case("a..b@example.com", false)]
    #[case("a@example", false)]
    fn email_format(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(is_email(value), valid);
    }

    #[rstest]
    #[case("3fa85f64-5717-4562-b3fc-2c963f66afa6", true)]
    #[case("3fa85f6457174562b3fc2c963f66afa6", false)]
    #[case("not-a-uuid", false)]
    fn uuid_format(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(is_hyphenated_uuid(value), valid);
    }

    #[rstest]
    #[case(json!({}), 1, 10)]
    #[case(json!({"page": "3", "limit": "25"}), 3, 25)]
    fn pagination_defaults_and_coerces(
        #[case] input: Value,
        #[case] page: u32,
        #[case] limit: u32,
    ) {
        let parsed = parse_source::<Pagination>(Source::Query, &input).expect("valid pagination");
        assert_eq!(parsed, Pagination { page, limit });
    }

    #[rstest]
    #[case(json!({"page": "0"}), "query.page", "Page must be positive")]
    #[case(json!({"limit": "101"}), "query.limit", "Limit must be between 1-100")]
    #[case(json!({"page": "99999999999"}), "query.page", "Page is too large")]
    fn pagination_bounds(#[case] input: Value, #[case] field: &str, #[case] message: &str) {
        let issues = parse_source::<Pagination>(Source::Query, &input).expect_err("out of range");
        assert_eq!(issues[0].field, field);
        assert_eq!(issues[0].message, message);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(2, 1)]
    #[case(25, 3)]
    fn total_pages_rounds_up(#[case] total: u32, #[case] pages: u32) {
        assert_eq!(Pagination::default().total_pages(total), pages);
    }
}
