//! Health endpoints: a liveness summary for load balancers and a detailed
//! aggregate. Both consult the health collaborator and answer 503 when it is
//! unreachable. Document endpoints in OpenAPI via Utoipa.

use actix_web::http::{StatusCode, header};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::envelope::{self, ErrorBody, timestamp_now};
use super::state::{API_VERSION, HttpState};
use crate::domain::HealthReport;

/// Static liveness payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LivenessBody {
    /// Always `OK` while the process answers.
    #[schema(example = "OK")]
    pub status: String,
    /// Human-readable note.
    #[schema(example = "SiteScope API is running")]
    pub message: String,
    /// ISO-8601 time of the answer.
    pub timestamp: String,
    /// Service version.
    #[schema(example = "1.0.0")]
    pub version: String,
}

fn unhealthy() -> HttpResponse {
    envelope::failure(
        StatusCode::SERVICE_UNAVAILABLE,
        "Application is unhealthy",
        "Health check failed",
    )
}

/// Liveness probe. Returns 200 with a short summary while the collaborator
/// answers and 503 otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tags = ["health"],
    responses(
        (status = 200, description = "Server is alive", body = LivenessBody),
        (status = 503, description = "Application is unhealthy")
    )
)]
pub async fn liveness(state: web::Data<HttpState>) -> HttpResponse {
    if !state.health.perform_health_check().await.is_healthy() {
        return unhealthy();
    }
    HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .json(LivenessBody {
            status: "OK".to_owned(),
            message: "SiteScope API is running".to_owned(),
            timestamp: timestamp_now(),
            version: API_VERSION.to_owned(),
        })
}

/// Detailed health. Returns 200 with the report when the backing store
/// answers and 503 otherwise.
#[utoipa::path(
    get,
    path = "/health/detailed",
    tags = ["health"],
    responses(
        (status = 200, description = "Application is healthy", body = HealthReport),
        (status = 429, description = "Too many requests", body = ErrorBody),
        (status = 503, description = "Application is unhealthy")
    )
)]
pub async fn detailed(state: web::Data<HttpState>) -> HttpResponse {
    let report = state.health.perform_health_check().await;
    if report.is_healthy() {
        envelope::ok(report, Some("Application is healthy"))
    } else {
        unhealthy()
    }
}
