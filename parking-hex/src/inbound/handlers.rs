//! HTTP request handlers.
//!
//! Every route lives under `/api/{version}/`; the version segment is
//! accepted but not interpreted.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use parking_types::{
    ActivityId, ActivityQuery, AppError, AuthenticateRequest, CreateSaleRequest,
    CreateUserRequest, LogRequest, PageQuery, ParkingRepository, PasswordUpdateRequest,
    PaymentGateway, PlanId, SaleQuery, StartParkingRequest, UpdateAccountRequest,
    UpdateActivityRequest,
};

use super::auth::CurrentUser;
use crate::ParkingService;

/// Application state shared across handlers.
pub struct AppState<R: ParkingRepository, P: PaymentGateway> {
    pub service: ParkingService<R, P>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        let (status, code) = match &self.0 {
            AppError::Rejected(code) => (StatusCode::BAD_REQUEST, code.code()),
            AppError::BadRequest(_) | AppError::PaymentProvider(_) => {
                (StatusCode::BAD_REQUEST, 400)
            }
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, 401),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, 403),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, 404),
            AppError::Internal(_) => {
                tracing::error!(error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, 500)
            }
        };

        let body = serde_json::json!({
            "error": message,
            "code": code
        });

        (status, Json(body)).into_response()
    }
}

fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(AppError::BadRequest(format!("Invalid {} ID", what))))
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Registration & authentication (public)
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, req), fields(login = %req.email))]
pub async fn register<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Path(_version): Path<String>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let plans = state.service.register(req).await?;
    Ok(Json(plans))
}

#[tracing::instrument(skip(state, req), fields(login = %req.email))]
pub async fn authenticate<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Path(_version): Path<String>,
    Json(req): Json<AuthenticateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state.service.authenticate(req).await?;
    Ok(Json(token))
}

// ─────────────────────────────────────────────────────────────────────────────
// Account
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_account<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.service.get_account(&user).await?;
    Ok(Json(account))
}

#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn update_account<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.update_account(&user, req).await?;
    Ok(StatusCode::OK)
}

#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn change_password<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<PasswordUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.change_password(&user, req).await?;
    Ok(StatusCode::OK)
}

#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn log_message<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<LogRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.service.save_log(&user, req).await?;
    Ok(StatusCode::OK)
}

// ─────────────────────────────────────────────────────────────────────────────
// Plans
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_plans<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let plans = state.service.eligible_plans(&user).await?;
    Ok(Json(plans))
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.id, plan_id = %id))]
pub async fn subscribe_plan<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((_version, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let plan_id: PlanId = parse_id(&id, "plan")?;
    let resp = state.service.subscribe_plan(&user, plan_id).await?;
    Ok(Json(resp))
}

// ─────────────────────────────────────────────────────────────────────────────
// Parking activities
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_activities<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.service.list_activities(&user, query).await?;
    Ok(Json(page))
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.id, lot_id = req.lot_id))]
pub async fn start_parking<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<StartParkingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let activity = state.service.start_parking(&user, req).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.id, activity_id = %id))]
pub async fn exit_parking<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((_version, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let activity_id: ActivityId = parse_id(&id, "activity")?;
    let activity = state.service.exit_parking(&user, activity_id).await?;
    Ok(Json(activity))
}

#[tracing::instrument(skip(state, user, req), fields(user_id = %user.id, activity_id = %id))]
pub async fn update_activity<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((_version, id)): Path<(String, String)>,
    Json(req): Json<UpdateActivityRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let activity_id: ActivityId = parse_id(&id, "activity")?;
    let activity = state
        .service
        .update_activity(&user, activity_id, req)
        .await?;
    Ok(Json(activity))
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn search_activities<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<ActivityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let activities = state.service.search_activities(&user, query).await?;
    Ok(Json(activities))
}

// ─────────────────────────────────────────────────────────────────────────────
// Sales
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_sales<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<SaleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let sales = state.service.list_sales(&user, query).await?;
    Ok(Json(sales))
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.id, plan_id = %req.plan_id))]
pub async fn create_sale<R: ParkingRepository, P: PaymentGateway>(
    State(state): State<Arc<AppState<R, P>>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<CreateSaleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let sale = state.service.create_sale(&user, req).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}
