//! Demo user endpoints showing request validation.
//!
//! ```text
//! POST /api/demo/users {"name":"John Doe","email":"john@example.com","age":30}
//! GET  /api/demo/users/3fa85f64-5717-4562-b3fc-2c963f66afa6
//! GET  /api/demo/users?page=1&limit=10&search=ali
//! ```
//!
//! Nothing is persisted. Created users are echoed back and lookups answer
//! from fixtures.

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::envelope::{self, ErrorBody};
use super::state::HttpState;
use super::validated::Validated;
use super::validation::{FieldReader, IntRule, Pagination, RequestSchema, StringRule};
use crate::domain::{DemoUser, NewUser};

/// Body of `POST /api/demo/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "name": "John Doe",
    "email": "john@example.com",
    "age": 30,
    "website": "https://johndoe.com"
}))]
pub struct CreateUserBody {
    /// Full name, 1 to 100 characters.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Age in years, 18 to 120.
    pub age: u8,
    /// Optional personal website.
    pub website: Option<String>,
}

impl RequestSchema for CreateUserBody {
    fn read(reader: &mut FieldReader<'_>) -> Option<Self> {
        let name = reader.string(
            "name",
            &[
                StringRule::MinLen(1, "Name is required"),
                StringRule::MaxLen(100, "Name too long"),
            ],
        );
        let email = reader.string("email", &[StringRule::Email("Invalid email format")]);
        let age = reader.integer(
            "age",
            &[
                IntRule::Min(18, "Must be at least 18"),
                IntRule::Max(120, "Invalid age"),
            ],
        );
        let website = reader.optional_string("website", &[StringRule::Url("Invalid URL format")]);
        Some(Self {
            name: name?,
            email: email?,
            age: u8::try_from(age?).ok()?,
            website: website?,
        })
    }
}

impl From<CreateUserBody> for NewUser {
    fn from(body: CreateUserBody) -> Self {
        Self {
            name: body.name,
            email: body.email,
            age: body.age,
            website: body.website,
        }
    }
}

/// Path parameters of `GET /api/demo/users/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct UserIdParams {
    /// User UUID.
    pub id: Uuid,
}

impl RequestSchema for UserIdParams {
    fn read(reader: &mut FieldReader<'_>) -> Option<Self> {
        let id = reader.string("id", &[StringRule::Uuid("Invalid user ID format")])?;
        Uuid::try_parse(&id).ok().map(|id| Self { id })
    }
}

/// Query of `GET /api/demo/users`.
#[derive(Debug, Clone, PartialEq, Eq, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// One-based page number, default 1.
    #[param(minimum = 1, default = 1)]
    pub page: u32,
    /// Items per page, 1 to 100, default 10.
    #[param(minimum = 1, maximum = 100, default = 10)]
    pub limit: u32,
    /// Case-insensitive name filter.
    pub search: Option<String>,
}

impl ListUsersQuery {
    const fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

impl RequestSchema for ListUsersQuery {
    fn read(reader: &mut FieldReader<'_>) -> Option<Self> {
        let pagination = Pagination::read_from(reader);
        let search = reader.optional_string("search", &[]);
        let Pagination { page, limit } = pagination?;
        Some(Self {
            page,
            limit,
            search: search?,
        })
    }
}

/// Page metadata of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Current page.
    pub page: u32,
    /// Items per page.
    pub limit: u32,
    /// Matching items.
    pub total: u32,
    /// Pages needed for `total` items.
    pub total_pages: u32,
}

/// Payload of the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserPage {
    /// Users on this page.
    pub users: Vec<DemoUser>,
    /// Page metadata.
    pub pagination: PageInfo,
}

/// Create a demo user.
#[utoipa::path(
    post,
    path = "/api/demo/users",
    request_body = CreateUserBody,
    responses(
        (status = 201, description = "User created successfully", body = DemoUser),
        (status = 400, description = "Malformed JSON body", body = ErrorBody),
        (status = 422, description = "Validation failed", body = ErrorBody),
        (status = 429, description = "Too many creation requests", body = ErrorBody)
    ),
    tags = ["demo"],
    operation_id = "createDemoUser"
)]
pub async fn create_user(
    state: web::Data<HttpState>,
    input: Validated<CreateUserBody>,
) -> HttpResponse {
    let user = DemoUser::create(input.body.into(), state.clock.utc());
    envelope::created(user, Some("User created successfully"))
}

/// Fetch a demo user by identifier.
#[utoipa::path(
    get,
    path = "/api/demo/users/{id}",
    params(UserIdParams),
    responses(
        (status = 200, description = "User retrieved successfully", body = DemoUser),
        (status = 422, description = "Validation failed", body = ErrorBody)
    ),
    tags = ["demo"],
    operation_id = "getDemoUser"
)]
pub async fn get_user(input: Validated<(), (), UserIdParams>) -> HttpResponse {
    envelope::ok(
        DemoUser::fixture(input.params.id),
        Some("User retrieved successfully"),
    )
}

/// List demo users with pagination.
#[utoipa::path(
    get,
    path = "/api/demo/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users retrieved successfully", body = UserPage),
        (status = 422, description = "Validation failed", body = ErrorBody)
    ),
    tags = ["demo"],
    operation_id = "listDemoUsers"
)]
pub async fn list_users(input: Validated<(), ListUsersQuery>) -> HttpResponse {
    let query = input.query;
    let pagination = query.pagination();
    let users = DemoUser::directory(query.search.as_deref());
    let total = u32::try_from(users.len()).unwrap_or(u32::MAX);
    let page = UserPage {
        users,
        pagination: PageInfo {
            page: pagination.page,
            limit: pagination.limit,
            total,
            total_pages: pagination.total_pages(total),
        },
    };
    envelope::ok(page, Some("Users retrieved successfully"))
}
