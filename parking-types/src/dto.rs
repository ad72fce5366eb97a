//! Data Transfer Objects (DTOs) for requests and responses.
//!
//! Field names go over the wire in camelCase, the format existing mobile
//! clients already speak.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    ActivityId, Currency, Page, ParkingActivity, ParkingPlan, ParkingSaleActivity, ParkingStatus,
    PlanId, SaleActivityId, SaleFilter, User, UserId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Registration & authentication DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to register a new account.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    /// Email address, also used as the login
    #[schema(example = "driver@example.com")]
    pub email: String,
    #[schema(example = "s3cret-pass")]
    pub password: String,
    #[schema(example = "4165550100")]
    pub mobile_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "CABC123")]
    pub license_plate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Card token from the payment provider's client library
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_token: Option<String>,
}

/// Email/password credentials.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticateRequest {
    #[schema(example = "driver@example.com")]
    pub email: String,
    pub password: String,
}

/// Bearer token issued on authentication (shown only once).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Account DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PasswordUpdateRequest {
    #[serde(default)]
    pub password: Option<String>,
}

/// Client-side events to record; only the last 40 are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogRequest {
    #[serde(default)]
    pub log_event: Option<Vec<String>>,
}

/// The current user, with the latest parking session when one exists.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub login: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile_number: String,
    pub license_plate: Option<String>,
    pub region: Option<String>,
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parking_status: Option<ActivityResponse>,
}

impl UserResponse {
    pub fn from_user(user: &User, latest: Option<&ParkingActivity>) -> Self {
        Self {
            id: user.id,
            login: user.login.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            mobile_number: user.mobile_number.clone(),
            license_plate: user.license_plate.clone(),
            region: user.region.clone(),
            roles: user.role_names(),
            parking_status: latest.map(ActivityResponse::from),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plan DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub plan_id: PlanId,
    #[schema(example = "Monthly Reserved")]
    pub plan_name: String,
    pub lot_id: i64,
    /// Charge in cents
    #[schema(example = 12000)]
    pub unit_charge_amount: i64,
    pub currency: Currency,
    pub subscribed: bool,
}

impl PlanResponse {
    pub fn from_plan(plan: &ParkingPlan, subscribed: bool) -> Self {
        Self {
            plan_id: plan.id,
            plan_name: plan.plan_name.clone(),
            lot_id: plan.lot_id,
            unit_charge_amount: plan.unit_charge_amount.amount(),
            currency: plan.unit_charge_amount.currency(),
            subscribed,
        }
    }
}

/// Result of a subscription attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscribeStatus {
    AlreadySubscribed,
    Subscribed,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeResponse {
    pub status: SubscribeStatus,
    /// Provider subscription id, present when a subscription was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[schema(example = "Already Subscribed")]
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Parking activity DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub id: ActivityId,
    pub holder: UserId,
    pub lot_id: i64,
    pub status: ParkingStatus,
    pub created_at: DateTime<Utc>,
    pub exit_datetime: Option<DateTime<Utc>>,
    pub exception_flag: Option<String>,
    pub gate_response: Option<String>,
}

impl From<&ParkingActivity> for ActivityResponse {
    fn from(a: &ParkingActivity) -> Self {
        Self {
            id: a.id,
            holder: a.holder,
            lot_id: a.lot_id,
            status: a.status,
            created_at: a.created_at,
            exit_datetime: a.exit_datetime,
            exception_flag: a.exception_flag.clone(),
            gate_response: a.gate_response.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPageResponse {
    pub items: Vec<ActivityResponse>,
    pub page: u32,
    pub size: u32,
    pub total: i64,
}

impl From<Page<ParkingActivity>> for ActivityPageResponse {
    fn from(p: Page<ParkingActivity>) -> Self {
        Self {
            items: p.items.iter().map(ActivityResponse::from).collect(),
            page: p.page,
            size: p.size,
            total: p.total,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartParkingRequest {
    #[schema(example = 12)]
    pub lot_id: i64,
}

/// Direct field update on an activity; absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityRequest {
    #[serde(default)]
    pub status: Option<ParkingStatus>,
    #[serde(default)]
    pub gate_response: Option<String>,
    #[serde(default)]
    pub exception_flag: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// Zero-based page number
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// Criteria for searching activities. The first matching shape wins:
/// `lot_id`; `status` with a time range; `status`; a time range.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    pub lot_id: Option<i64>,
    pub status: Option<ParkingStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sale activity DTOs
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub plan_id: PlanId,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SaleQuery {
    #[serde(default)]
    pub sale: bool,
    #[serde(default)]
    pub record: bool,
    #[serde(default, alias = "in_flight")]
    pub in_flight: bool,
    /// Range bounds (exclusive); listing across users needs `ROLE_ADMIN`.
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl From<SaleQuery> for SaleFilter {
    fn from(q: SaleQuery) -> Self {
        SaleFilter {
            sale: q.sale,
            record: q.record,
            in_flight: q.in_flight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleActivityResponse {
    pub id: SaleActivityId,
    pub lot_id: i64,
    pub holder: UserId,
    pub plan_id: PlanId,
    pub plan_name: String,
    pub plan_subscription_date: Option<DateTime<Utc>>,
    pub plan_expiry_date: Option<DateTime<Utc>>,
    /// Amounts in cents
    pub charge_amount: Option<i64>,
    pub service_amount: Option<i64>,
    pub net_amount: Option<i64>,
    pub currency: Option<Currency>,
    pub payment_profile_id: Option<String>,
    pub entry_datetime: Option<DateTime<Utc>>,
    pub exit_datetime: Option<DateTime<Utc>>,
    pub parking_status: Option<ParkingStatus>,
    pub exception_flag: Option<String>,
    pub invoice_id: Option<String>,
}

impl From<&ParkingSaleActivity> for SaleActivityResponse {
    fn from(a: &ParkingSaleActivity) -> Self {
        Self {
            id: a.id,
            lot_id: a.lot_id,
            holder: a.holder,
            plan_id: a.plan_id,
            plan_name: a.plan_name.clone(),
            plan_subscription_date: a.plan_subscription_date,
            plan_expiry_date: a.plan_expiry_date,
            charge_amount: a.charge_amount.map(|m| m.amount()),
            service_amount: a.service_amount.map(|m| m.amount()),
            net_amount: a.net_amount.map(|m| m.amount()),
            currency: a.charge_amount.map(|m| m.currency()),
            payment_profile_id: a.payment_profile_id.clone(),
            entry_datetime: a.entry_datetime,
            exit_datetime: a.exit_datetime,
            parking_status: a.parking_status,
            exception_flag: a.exception_flag.clone(),
            invoice_id: a.invoice_id.clone(),
        }
    }
}
