//! UUID-backed identifier newtypes.
//!
//! Every entity gets its own id type so a `PlanId` can never be passed where a
//! `UserId` is expected. The boilerplate is generated by `entity_id!`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

macro_rules! entity_id {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
            #[serde(transparent)]
            #[schema(value_type = String, format = Uuid)]
            pub struct $name(Uuid);

            impl $name {
                /// Creates a new random id.
                pub fn new() -> Self {
                    Self(Uuid::new_v4())
                }

                /// Wraps an existing UUID.
                pub fn from_uuid(uuid: Uuid) -> Self {
                    Self(uuid)
                }

                /// Returns the underlying UUID.
                pub fn as_uuid(&self) -> &Uuid {
                    &self.0
                }

                /// Returns the UUID value.
                pub fn into_uuid(self) -> Uuid {
                    self.0
                }
            }

            impl Default for $name {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl std::str::FromStr for $name {
                type Err = uuid::Error;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Ok(Self(Uuid::parse_str(s)?))
                }
            }
        )+
    };
}

entity_id! {
    /// Unique identifier for a User.
    UserId,
    /// Unique identifier for a ParkingPlan.
    PlanId,
    /// Unique identifier for a ParkingActivity.
    ActivityId,
    /// Unique identifier for a ParkingSaleActivity.
    SaleActivityId,
    /// Unique identifier for a PlanEligibleUser record.
    EligibilityId,
    /// Unique identifier for a PlanSubscription.
    SubscriptionId,
    /// Unique identifier for an ExceptionLog.
    ExceptionLogId,
    /// Unique identifier for an AccessToken.
    AccessTokenId,
}
