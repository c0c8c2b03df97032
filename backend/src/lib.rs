//! SiteScope HTTP API library.
//!
//! Uniform response envelopes, request validation, error classification,
//! request logging and per-client rate admission on top of actix-web.

pub mod config;
pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;
pub mod telemetry;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
