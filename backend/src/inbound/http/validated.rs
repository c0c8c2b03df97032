//! Validation Adapter.
//!
//! [`Validated`] is an extractor that runs up to three schemas (body, query,
//! path parameters) before the handler is invoked. Every failure from every
//! source is collected, in body → query → params order, into a single
//! `Validation` error. On success the handler receives the coerced values in
//! place of the raw input.
//!
//! ```ignore
//! async fn create(input: Validated<CreateUserBody>) -> ApiResult<HttpResponse> {
//!     let body = input.body;
//!     ...
//! }
//! ```

use std::collections::HashMap;

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest, web};
use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::{Map, Value};

use super::classifier::from_framework_error;
use super::validation::{RequestSchema, Source};
use crate::domain::{Error, FieldIssue};

/// Summary message of an aggregated validation failure.
pub const VALIDATION_FAILED_MESSAGE: &str = "Request validation failed";

/// Coerced request input. Use `()` for a source without a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated<B = (), Q = (), P = ()> {
    /// Validated JSON body.
    pub body: B,
    /// Validated query string.
    pub query: Q,
    /// Validated path parameters.
    pub params: P,
}

impl<B, Q, P> Validated<B, Q, P> {
    /// Split into `(body, query, params)`.
    pub fn into_parts(self) -> (B, Q, P) {
        (self.body, self.query, self.params)
    }
}

fn parse_body(bytes: &[u8]) -> Result<Value, Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|_| Error::bad_request("Malformed JSON body"))
}

fn query_object(request: &HttpRequest) -> Result<Value, Error> {
    let pairs = web::Query::<HashMap<String, String>>::from_query(request.query_string())
        .map_err(|_| Error::bad_request("Malformed query string"))?
        .into_inner();
    Ok(Value::Object(
        pairs
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect::<Map<_, _>>(),
    ))
}

fn params_object(request: &HttpRequest) -> Value {
    Value::Object(
        request
            .match_info()
            .iter()
            .map(|(key, value)| (key.to_owned(), Value::String(value.to_owned())))
            .collect::<Map<_, _>>(),
    )
}

fn check<T: RequestSchema>(
    source: Source,
    input: &Value,
    issues: &mut Vec<FieldIssue>,
) -> Option<T> {
    match T::parse(source, input) {
        Ok(value) => Some(value),
        Err(found) => {
            issues.extend(found);
            None
        }
    }
}

impl<B, Q, P> FromRequest for Validated<B, Q, P>
where
    B: RequestSchema + 'static,
    Q: RequestSchema + 'static,
    P: RequestSchema + 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let request = req.clone();
        let body_bytes = B::PRESENT.then(|| web::Bytes::from_request(req, payload));

        async move {
            let body_input = match body_bytes {
                Some(pending) => {
                    let bytes = pending.await.map_err(|err| from_framework_error(&err))?;
                    parse_body(&bytes)?
                }
                None => Value::Null,
            };
            let query_input = if Q::PRESENT {
                query_object(&request)?
            } else {
                Value::Null
            };
            let params_input = params_object(&request);

            let mut issues = Vec::new();
            let checked = (
                check::<B>(Source::Body, &body_input, &mut issues),
                check::<Q>(Source::Query, &query_input, &mut issues),
                check::<P>(Source::Params, &params_input, &mut issues),
            );

            match checked {
                (Some(body), Some(query), Some(params)) if issues.is_empty() => Ok(Self {
                    body,
                    query,
                    params,
                }),
                _ => Err(Error::validation(VALIDATION_FAILED_MESSAGE, issues)),
            }
        }
        .boxed_local()
    }
}
