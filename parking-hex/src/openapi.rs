//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use parking_types::domain::{ActivityId, Authority, Currency, ParkingStatus, PlanId, UserId};
use parking_types::dto::{
    ActivityPageResponse, ActivityQuery, ActivityResponse, AuthenticateRequest,
    CreateSaleRequest, CreateUserRequest, LogRequest, PageQuery, PasswordUpdateRequest,
    PlanResponse, SaleActivityResponse, SaleQuery, StartParkingRequest, SubscribeResponse,
    SubscribeStatus, TokenResponse, UpdateAccountRequest, UpdateActivityRequest, UserResponse,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};

// Documentation stubs; the real handlers are generic and live in `inbound::handlers`.

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// Register a new account
///
/// Returns every plan the email is eligible for. Zero-charge plans are
/// subscribed automatically.
#[utoipa::path(
    post,
    path = "/api/{version}/register",
    tag = "auth",
    params(("version" = String, Path, description = "API version, e.g. v1")),
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Registered; eligible plans", body = Vec<PlanResponse>),
        (status = 400, description = "Rejected with code 1001-1004, or invalid input",
            example = json!({"error": "username is already in use!", "code": 1001}))
    )
)]
async fn register() {}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/{version}/authenticate",
    tag = "auth",
    params(("version" = String, Path, description = "API version")),
    request_body = AuthenticateRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
async fn authenticate() {}

/// Current account with its latest parking activity
#[utoipa::path(
    get,
    path = "/api/{version}/account",
    tag = "account",
    params(("version" = String, Path, description = "API version")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Account details", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
async fn get_account() {}

/// Update name and region (requires ROLE_USER)
#[utoipa::path(
    post,
    path = "/api/{version}/account",
    tag = "account",
    params(("version" = String, Path, description = "API version")),
    request_body = UpdateAccountRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated"),
        (status = 403, description = "Missing ROLE_USER")
    )
)]
async fn update_account() {}

#[utoipa::path(
    post,
    path = "/api/{version}/account/change_password",
    tag = "account",
    params(("version" = String, Path, description = "API version")),
    request_body = PasswordUpdateRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Password missing or out of bounds")
    )
)]
async fn change_password() {}

/// Store the client's recent event log (last 40 events)
#[utoipa::path(
    post,
    path = "/api/{version}/logMessage",
    tag = "account",
    params(("version" = String, Path, description = "API version")),
    request_body = LogRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Saved"),
        (status = 400, description = "Failed to save", example = json!({"error": "Failed to save log message", "code": -1}))
    )
)]
async fn log_message() {}

#[utoipa::path(
    get,
    path = "/api/{version}/plans",
    tag = "plans",
    params(("version" = String, Path, description = "API version")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Eligible plans", body = Vec<PlanResponse>)
    )
)]
async fn list_plans() {}

/// Subscribe to a plan through the payment provider
#[utoipa::path(
    post,
    path = "/api/{version}/plans/{id}/subscribe",
    tag = "plans",
    params(
        ("version" = String, Path, description = "API version"),
        ("id" = PlanId, Path, description = "Plan ID (UUID)")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscribed or already subscribed", body = SubscribeResponse),
        (status = 400, description = "Payment provider failure"),
        (status = 404, description = "Plan not found")
    )
)]
async fn subscribe_plan() {}

#[utoipa::path(
    get,
    path = "/api/{version}/activities",
    tag = "activities",
    params(("version" = String, Path, description = "API version"), PageQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Newest-first page of the caller's activities", body = ActivityPageResponse)
    )
)]
async fn list_activities() {}

#[utoipa::path(
    post,
    path = "/api/{version}/activities",
    tag = "activities",
    params(("version" = String, Path, description = "API version")),
    request_body = StartParkingRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Parking started", body = ActivityResponse)
    )
)]
async fn start_parking() {}

/// Search activities (requires ROLE_ADMIN)
#[utoipa::path(
    get,
    path = "/api/{version}/activities/search",
    tag = "activities",
    params(("version" = String, Path, description = "API version"), ActivityQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Matching activities", body = Vec<ActivityResponse>),
        (status = 400, description = "No search criteria"),
        (status = 403, description = "Missing ROLE_ADMIN")
    )
)]
async fn search_activities() {}

#[utoipa::path(
    post,
    path = "/api/{version}/activities/{id}/exit",
    tag = "activities",
    params(
        ("version" = String, Path, description = "API version"),
        ("id" = ActivityId, Path, description = "Activity ID (UUID)")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Exited", body = ActivityResponse),
        (status = 403, description = "Not the holder"),
        (status = 404, description = "Activity not found")
    )
)]
async fn exit_parking() {}

/// Set status, gate response or exception flag (requires ROLE_ADMIN)
#[utoipa::path(
    post,
    path = "/api/{version}/activities/{id}/status",
    tag = "activities",
    params(
        ("version" = String, Path, description = "API version"),
        ("id" = ActivityId, Path, description = "Activity ID (UUID)")
    ),
    request_body = UpdateActivityRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated", body = ActivityResponse),
        (status = 403, description = "Missing ROLE_ADMIN"),
        (status = 404, description = "Activity not found")
    )
)]
async fn update_activity() {}

#[utoipa::path(
    get,
    path = "/api/{version}/sales",
    tag = "sales",
    params(("version" = String, Path, description = "API version"), SaleQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Filtered sale activities", body = Vec<SaleActivityResponse>),
        (status = 403, description = "Date range without ROLE_ADMIN")
    )
)]
async fn list_sales() {}

#[utoipa::path(
    post,
    path = "/api/{version}/sales",
    tag = "sales",
    params(("version" = String, Path, description = "API version")),
    request_body = CreateSaleRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Sale recorded", body = SaleActivityResponse),
        (status = 404, description = "Plan not found")
    )
)]
async fn create_sale() {}

/// OpenAPI documentation for the Parking API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Parking Service API",
        version = "1.0.0",
        description = "Parking lot backend: accounts, plan subscriptions, parking sessions and sales.\n\n## Authentication\n\nRegister, then call `/api/v1/authenticate` for a token and send it in the `Authorization` header:\n\n```\nAuthorization: Bearer <token>\n```",
        license(name = "MIT"),
    ),
    paths(
        health,
        register,
        authenticate,
        get_account,
        update_account,
        change_password,
        log_message,
        list_plans,
        subscribe_plan,
        list_activities,
        start_parking,
        search_activities,
        exit_parking,
        update_activity,
        list_sales,
        create_sale,
    ),
    components(
        schemas(
            CreateUserRequest,
            AuthenticateRequest,
            TokenResponse,
            UpdateAccountRequest,
            PasswordUpdateRequest,
            LogRequest,
            UserResponse,
            PlanResponse,
            SubscribeResponse,
            SubscribeStatus,
            ActivityResponse,
            ActivityPageResponse,
            StartParkingRequest,
            UpdateActivityRequest,
            CreateSaleRequest,
            SaleActivityResponse,
            ParkingStatus,
            Authority,
            Currency,
            UserId,
            PlanId,
            ActivityId,
        )
    ),

    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and token issuance"),
        (name = "account", description = "Current user profile and logs"),
        (name = "plans", description = "Eligible plans and subscriptions"),
        (name = "activities", description = "Parking sessions"),
        (name = "sales", description = "Billed parking activity"),
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for Bearer token authentication.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
