//! OpenAPI documentation configuration.
//!
//! This module defines the [`ApiDoc`] struct which generates the OpenAPI
//! specification for the REST API. It registers:
//!
//! - **Paths**: every route of the inbound HTTP layer (root, health, demo)
//! - **Schemas**: the envelope contracts ([`ErrorBody`], [`FieldIssue`]) and
//!   the payloads each route returns
//!
//! The generated specification is served by Swagger UI in debug builds.

use utoipa::OpenApi;

use crate::domain::ports::{ConnectionState, ConnectionStatus, MemoryUsage};
use crate::domain::{DemoUser, FieldIssue, HealthReport, HealthStatus};
use crate::inbound::http::demo_users::{CreateUserBody, PageInfo, UserPage};
use crate::inbound::http::envelope::ErrorBody;
use crate::inbound::http::health::LivenessBody;
use crate::inbound::http::root::Welcome;

/// OpenAPI document for the REST API.
/// Swagger UI is enabled in debug builds only.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SiteScope API",
        description = "Health probes and demo user routes behind uniform response envelopes.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    paths(
        crate::inbound::http::root::welcome,
        crate::inbound::http::health::liveness,
        crate::inbound::http::health::detailed,
        crate::inbound::http::demo_users::create_user,
        crate::inbound::http::demo_users::get_user,
        crate::inbound::http::demo_users::list_users,
    ),
    components(schemas(
        ErrorBody,
        FieldIssue,
        Welcome,
        LivenessBody,
        HealthReport,
        HealthStatus,
        ConnectionState,
        ConnectionStatus,
        MemoryUsage,
        CreateUserBody,
        DemoUser,
        UserPage,
        PageInfo,
    )),
    tags(
        (name = "root", description = "API entry point"),
        (name = "health", description = "Endpoints for health checks"),
        (name = "demo", description = "Demo user routes showing request validation")
    )
)]
pub struct ApiDoc;
