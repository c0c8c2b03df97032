//! Welcome endpoint and the fallback for unmatched routes.

use actix_web::{HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ApiResult;
use super::envelope;
use super::state::API_VERSION;
use crate::domain::Error;

/// Payload of the welcome endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Welcome {
    /// Greeting.
    #[schema(example = "Welcome to SiteScope API")]
    pub message: String,
    /// Service version.
    #[schema(example = "1.0.0")]
    pub version: String,
}

/// Welcome envelope.
#[utoipa::path(
    get,
    path = "/",
    tags = ["root"],
    responses((status = 200, description = "Welcome message"))
)]
pub async fn welcome() -> HttpResponse {
    envelope::ok(
        Welcome {
            message: "Welcome to SiteScope API".to_owned(),
            version: API_VERSION.to_owned(),
        },
        None,
    )
}

/// Default service: every unmatched route is a classified 404.
pub async fn not_found(req: HttpRequest) -> ApiResult<HttpResponse> {
    Err(Error::not_found(format!(
        "Route {} {} not found",
        req.method(),
        req.path()
    )))
}
