//! Sale activity: a parking record carrying billing fields.

use chrono::{DateTime, Utc};

use super::activity::ParkingStatus;
use super::ids::{PlanId, SaleActivityId, UserId};
use super::money::Money;

#[derive(Debug, Clone)]
pub struct ParkingSaleActivity {
    pub id: SaleActivityId,
    pub holder: UserId,
    pub lot_id: i64,
    pub plan_id: PlanId,
    pub plan_name: String,
    pub user_email: String,
    pub user_phone_number: String,
    pub user_license_plate: Option<String>,
    pub plan_subscription_date: Option<DateTime<Utc>>,
    pub plan_expiry_date: Option<DateTime<Utc>>,
    pub charge_amount: Option<Money>,
    pub service_amount: Option<Money>,
    pub net_amount: Option<Money>,
    pub payment_profile_id: Option<String>,
    pub entry_datetime: Option<DateTime<Utc>>,
    pub exit_datetime: Option<DateTime<Utc>>,
    pub parking_status: Option<ParkingStatus>,
    pub exception_flag: Option<String>,
    pub invoice_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ParkingSaleActivity {
    /// Vehicle has entered and not yet left.
    pub fn is_in_flight(&self) -> bool {
        self.entry_datetime.is_some() && self.exit_datetime.is_none()
    }

    fn is_charged(&self) -> bool {
        self.charge_amount.is_some_and(|m| m.amount() > 0)
    }
}

/// Selection flags for [`filter_sale_activities`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaleFilter {
    pub sale: bool,
    pub record: bool,
    pub in_flight: bool,
}

impl SaleFilter {
    pub fn matches(&self, activity: &ParkingSaleActivity) -> bool {
        if self.in_flight {
            return activity.is_in_flight();
        }
        match (self.sale, self.record) {
            (true, true) => activity.entry_datetime.is_some() && activity.charge_amount.is_some(),
            (true, false) => activity.is_charged(),
            (false, true) => activity.entry_datetime.is_some(),
            (false, false) => true,
        }
    }
}

/// Keeps the activities matching `filter`, preserving input order.
///
/// `in_flight` overrides the other two flags. Non-matching entries are
/// skipped; the input does not need to be sorted or grouped.
pub fn filter_sale_activities(
    activities: Vec<ParkingSaleActivity>,
    filter: SaleFilter,
) -> Vec<ParkingSaleActivity> {
    activities
        .into_iter()
        .filter(|a| filter.matches(a))
        .collect()
}
