//! Parking plans, plan eligibility and subscriptions.

use chrono::{DateTime, Utc};

use super::ids::{EligibilityId, PlanId, SubscriptionId, UserId};
use super::money::Money;

/// A subscribable pricing tier for one lot.
#[derive(Debug, Clone)]
pub struct ParkingPlan {
    pub id: PlanId,
    pub plan_name: String,
    pub lot_id: i64,
    pub unit_charge_amount: Money,
    pub created_at: DateTime<Utc>,
}

impl ParkingPlan {
    /// Free plans are subscribed automatically at registration.
    pub fn is_free(&self) -> bool {
        self.unit_charge_amount.is_zero()
    }

    /// Identifier of this plan at the payment provider.
    pub fn provider_plan_id(&self) -> String {
        self.id.to_string()
    }
}

/// Grants an email address the right to subscribe to one plan.
#[derive(Debug, Clone)]
pub struct PlanEligibleUser {
    pub id: EligibilityId,
    pub user_email: String,
    pub plan_id: PlanId,
    pub subscribed: bool,
}

impl PlanEligibleUser {
    pub fn new(user_email: impl Into<String>, plan_id: PlanId) -> Self {
        Self {
            id: EligibilityId::new(),
            user_email: user_email.into(),
            plan_id,
            subscribed: false,
        }
    }
}

/// A user's subscription to a plan.
///
/// `provider_subscription_id` is absent for free plans, which never reach
/// the payment provider.
#[derive(Debug, Clone)]
pub struct PlanSubscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub provider_subscription_id: Option<String>,
    pub plan_start_date: DateTime<Utc>,
    pub plan_charge_amount: Money,
    pub payment_profile_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PlanSubscription {
    /// Subscription to a free plan, created without the payment provider.
    pub fn automatic(user_id: UserId, plan: &ParkingPlan) -> Self {
        let now = Utc::now();
        Self {
            id: SubscriptionId::new(),
            user_id,
            plan_id: plan.id,
            provider_subscription_id: None,
            plan_start_date: now,
            plan_charge_amount: plan.unit_charge_amount,
            payment_profile_id: None,
            created_at: now,
        }
    }

    /// Subscription backed by a provider subscription.
    pub fn with_provider(
        user_id: UserId,
        plan: &ParkingPlan,
        provider_subscription_id: String,
        payment_profile_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SubscriptionId::new(),
            user_id,
            plan_id: plan.id,
            provider_subscription_id: Some(provider_subscription_id),
            plan_start_date: now,
            plan_charge_amount: plan.unit_charge_amount,
            payment_profile_id,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;

    fn plan(charge: i64) -> ParkingPlan {
        ParkingPlan {
            id: PlanId::new(),
            plan_name: "Monthly".into(),
            lot_id: 7,
            unit_charge_amount: Money::new(charge, Currency::CAD).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_free_plan_threshold() {
        assert!(plan(0).is_free());
        assert!(!plan(1).is_free());
    }

    #[test]
    fn test_automatic_subscription_has_no_provider_id() {
        let p = plan(0);
        let sub = PlanSubscription::automatic(UserId::new(), &p);
        assert_eq!(sub.plan_id, p.id);
        assert!(sub.provider_subscription_id.is_none());
        assert!(sub.plan_charge_amount.is_zero());
    }

    #[test]
    fn test_new_eligibility_is_unsubscribed() {
        let e = PlanEligibleUser::new("a@b.co", PlanId::new());
        assert!(!e.subscribed);
    }
}
