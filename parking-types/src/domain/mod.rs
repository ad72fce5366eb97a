//! Domain models for the parking service.

pub mod access_token;
pub mod activity;
pub mod exception_log;
pub mod ids;
pub mod money;
pub mod plan;
pub mod sale;
pub mod user;

pub use access_token::AccessToken;
pub use activity::{Page, ParkingActivity, ParkingStatus};
pub use exception_log::{ExceptionLog, MAX_LOG_EVENTS};
pub use ids::{
    AccessTokenId, ActivityId, EligibilityId, ExceptionLogId, PlanId, SaleActivityId,
    SubscriptionId, UserId,
};
pub use money::{Currency, Money};
pub use plan::{ParkingPlan, PlanEligibleUser, PlanSubscription};
pub use sale::{ParkingSaleActivity, SaleFilter, filter_sale_activities};
pub use user::{Authority, User, validate_email, validate_password};
