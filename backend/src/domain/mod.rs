//! Domain primitives and services.
//!
//! Purpose: keep the failure taxonomy, request correlation state, health
//! aggregation and demo records free of HTTP concerns. Inbound adapters map
//! these types onto responses.
//!
//! Public surface:
//! - Error (alias to `error::Error`): closed failure taxonomy raised by handlers.
//! - ErrorCategory: canonical category reported to clients.
//! - RequestContext / RequestId: per-request correlation state.
//! - HealthService: aggregates the health collaborator port.

pub mod error;
pub mod health;
pub mod ports;
pub mod request_context;
pub mod user;

pub use self::error::{Error, ErrorCategory, FieldIssue, PersistenceFailure};
pub use self::health::{HealthReport, HealthService, HealthStatus};
pub use self::request_context::{
    RequestContext, RequestId, UNKNOWN_CLIENT, resolve_client_ip,
};
pub use self::user::{DemoUser, NewUser};

/// Convenient result alias for fallible domain and handler code.
///
/// # Examples
/// ```
/// use sitescope_backend::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<()> {
///     Err(Error::forbidden("nope"))
/// }
/// assert!(handler().is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
