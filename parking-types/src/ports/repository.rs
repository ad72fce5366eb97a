//! Repository port trait.
//!
//! This is the primary port in our hexagonal architecture.
//! Adapters (Postgres, SQLite, in-memory mocks) implement this trait.

use chrono::{DateTime, Utc};

use crate::domain::{
    AccessToken, ActivityId, ExceptionLog, Page, ParkingActivity, ParkingPlan,
    ParkingSaleActivity, ParkingStatus, PlanEligibleUser, PlanId, PlanSubscription, User, UserId,
};
use crate::error::RepoError;

/// The repository port for everything the parking service persists.
///
/// Operations that touch more than one row (creating a user with its
/// subscriptions, recording a subscription, recording an exit) MUST be atomic.
#[async_trait::async_trait]
pub trait ParkingRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Users & access tokens
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inserts a user together with the subscriptions it starts with,
    /// flipping `subscribed` on each matching eligibility row, in one transaction.
    ///
    /// Fails with `Conflict` on a duplicate login or mobile number and with
    /// `NotFound` when a subscription has no eligibility row. Nothing is
    /// stored on failure.
    async fn create_user(
        &self,
        user: User,
        subscriptions: Vec<PlanSubscription>,
    ) -> Result<User, RepoError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError>;

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, RepoError>;

    async fn find_user_by_mobile_number(&self, mobile: &str) -> Result<Option<User>, RepoError>;

    /// Updates the editable profile fields. `NotFound` if the user is gone.
    async fn update_user_information(
        &self,
        id: UserId,
        first_name: Option<String>,
        last_name: Option<String>,
        region: Option<String>,
    ) -> Result<(), RepoError>;

    async fn update_password_hash(&self, id: UserId, password_hash: &str)
    -> Result<(), RepoError>;

    async fn create_access_token(&self, token: AccessToken) -> Result<(), RepoError>;

    /// Resolves a token hash to its user and stamps `last_used_at`.
    async fn find_user_by_token_hash(&self, token_hash: &str) -> Result<Option<User>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Plans, eligibility & subscriptions
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_plan(&self, plan: ParkingPlan) -> Result<ParkingPlan, RepoError>;

    async fn get_plan(&self, id: PlanId) -> Result<Option<ParkingPlan>, RepoError>;

    async fn create_eligibility(
        &self,
        eligibility: PlanEligibleUser,
    ) -> Result<PlanEligibleUser, RepoError>;

    async fn eligibility_for_email(&self, email: &str) -> Result<Vec<PlanEligibleUser>, RepoError>;

    /// Stores the subscription and flips `subscribed` on the eligibility row
    /// for `(user_email, subscription.plan_id)` in one transaction.
    ///
    /// Returns `NotFound` (and stores nothing) when no such eligibility row exists.
    async fn record_subscription(
        &self,
        subscription: PlanSubscription,
        user_email: &str,
    ) -> Result<PlanSubscription, RepoError>;

    async fn find_subscription(
        &self,
        user_id: UserId,
        plan_id: PlanId,
    ) -> Result<Option<PlanSubscription>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Parking activities
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_activity(&self, activity: ParkingActivity)
    -> Result<ParkingActivity, RepoError>;

    async fn get_activity(&self, id: ActivityId) -> Result<Option<ParkingActivity>, RepoError>;

    /// Activities created strictly between `start` and `end`.
    async fn activities_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ParkingActivity>, RepoError>;

    async fn activities_between_for_user(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        user_id: UserId,
    ) -> Result<Vec<ParkingActivity>, RepoError>;

    async fn activities_by_status(
        &self,
        status: ParkingStatus,
    ) -> Result<Vec<ParkingActivity>, RepoError>;

    async fn activities_by_status_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: ParkingStatus,
    ) -> Result<Vec<ParkingActivity>, RepoError>;

    async fn activities_for_user(&self, user_id: UserId)
    -> Result<Vec<ParkingActivity>, RepoError>;

    async fn activity_for_user_with_status(
        &self,
        user_id: UserId,
        status: ParkingStatus,
    ) -> Result<Option<ParkingActivity>, RepoError>;

    async fn activities_for_lot(&self, lot_id: i64) -> Result<Vec<ParkingActivity>, RepoError>;

    /// Newest-first page of a user's activities. `page` is zero-based.
    async fn activities_page_for_user(
        &self,
        user_id: UserId,
        page: u32,
        size: u32,
    ) -> Result<Page<ParkingActivity>, RepoError>;

    async fn latest_activity_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<ParkingActivity>, RepoError>;

    // Unguarded single-field updates; each returns `NotFound` for an unknown id.

    async fn set_activity_status(
        &self,
        id: ActivityId,
        status: ParkingStatus,
    ) -> Result<(), RepoError>;

    async fn set_gate_response(&self, id: ActivityId, gate_response: &str)
    -> Result<(), RepoError>;

    async fn set_exit_time(&self, id: ActivityId, exit: DateTime<Utc>) -> Result<(), RepoError>;

    async fn set_exception_flag(&self, id: ActivityId, flag: &str) -> Result<(), RepoError>;

    /// Sets the exit time and `EXITED` in a single update. `NotFound` for an unknown id.
    async fn record_exit(&self, id: ActivityId, exit: DateTime<Utc>) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Sale activities, exception logs & runtime config
    // ─────────────────────────────────────────────────────────────────────────────

    async fn create_sale_activity(
        &self,
        activity: ParkingSaleActivity,
    ) -> Result<ParkingSaleActivity, RepoError>;

    async fn sale_activities_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ParkingSaleActivity>, RepoError>;

    async fn sale_activities_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ParkingSaleActivity>, RepoError>;

    async fn create_exception_log(&self, log: ExceptionLog) -> Result<ExceptionLog, RepoError>;

    async fn get_config_value(&self, key: &str) -> Result<Option<String>, RepoError>;

    async fn set_config_value(&self, key: &str, value: &str) -> Result<(), RepoError>;
}
