//! Shared database row types with feature-gated column representations.
//!
//! SQLite stores ids and timestamps as TEXT and booleans as INTEGER;
//! PostgreSQL uses native UUID, TIMESTAMPTZ and BOOLEAN columns. The
//! [`repr`] module hides that difference from the row structs.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use parking_types::{
    ActivityId, Authority, Currency, EligibilityId, ExceptionLog, ExceptionLogId,
    Money, ParkingActivity, ParkingPlan, ParkingSaleActivity, ParkingStatus, PlanEligibleUser,
    PlanId, PlanSubscription, RepoError, SaleActivityId, SubscriptionId, User, UserId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Column representations
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(all(feature = "sqlite", not(feature = "postgres")))]
pub mod repr {
    use super::*;

    pub type Id = String;
    pub type Time = String;
    pub type Flag = i64;

    pub fn id(v: Id) -> Result<Uuid, RepoError> {
        Uuid::parse_str(&v).map_err(|e| RepoError::Database(e.to_string()))
    }

    pub fn time(v: Time) -> Result<DateTime<Utc>, RepoError> {
        DateTime::parse_from_rfc3339(&v)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepoError::Database(e.to_string()))
    }

    pub fn flag(v: Flag) -> bool {
        v != 0
    }

    /// Fixed-width RFC 3339 so that TEXT comparison orders chronologically.
    pub fn to_time(dt: DateTime<Utc>) -> Time {
        dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }
}

#[cfg(feature = "postgres")]
pub mod repr {
    use super::*;

    pub type Id = Uuid;
    pub type Time = DateTime<Utc>;
    pub type Flag = bool;

    pub fn id(v: Id) -> Result<Uuid, RepoError> {
        Ok(v)
    }

    pub fn time(v: Time) -> Result<DateTime<Utc>, RepoError> {
        Ok(v)
    }

    pub fn flag(v: Flag) -> bool {
        v
    }

    pub fn to_time(dt: DateTime<Utc>) -> Time {
        dt
    }
}

fn opt_time(v: Option<repr::Time>) -> Result<Option<DateTime<Utc>>, RepoError> {
    v.map(repr::time).transpose()
}

// ─────────────────────────────────────────────────────────────────────────────
// Error mapping & parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Maps a driver error, surfacing unique-constraint hits as `Conflict`.
pub fn db_err(err: sqlx::Error) -> RepoError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::Conflict(db.message().to_string())
        }
        _ => RepoError::Database(err.to_string()),
    }
}

pub fn parse_currency(s: &str) -> Result<Currency, RepoError> {
    s.parse().map_err(RepoError::Domain)
}

pub fn parse_status(s: &str) -> Result<ParkingStatus, RepoError> {
    s.parse().map_err(RepoError::Domain)
}

/// Authorities are persisted as a comma-separated list of role names.
pub fn join_authorities(authorities: &[Authority]) -> String {
    authorities
        .iter()
        .map(|a| a.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn parse_authorities(s: &str) -> Result<Vec<Authority>, RepoError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().map_err(RepoError::Domain))
        .collect()
}

fn money(amount: i64, currency: Currency) -> Result<Money, RepoError> {
    Money::new(amount, currency).map_err(RepoError::Domain)
}

// ─────────────────────────────────────────────────────────────────────────────
// Row structs
// ─────────────────────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "id, login, password_hash, first_name, last_name, mobile_number, \
     license_plate, payment_token, region, authorities, created_at";

#[derive(FromRow)]
pub struct DbUser {
    pub id: repr::Id,
    pub login: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mobile_number: String,
    pub license_plate: Option<String>,
    pub payment_token: Option<String>,
    pub region: Option<String>,
    pub authorities: String,
    pub created_at: repr::Time,
}

impl DbUser {
    pub fn into_domain(self) -> Result<User, RepoError> {
        Ok(User {
            id: UserId::from_uuid(repr::id(self.id)?),
            login: self.login,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            mobile_number: self.mobile_number,
            license_plate: self.license_plate,
            payment_token: self.payment_token,
            region: self.region,
            authorities: parse_authorities(&self.authorities)?,
            created_at: repr::time(self.created_at)?,
        })
    }
}

pub const PLAN_COLUMNS: &str = "id, plan_name, lot_id, unit_charge_amount, currency, created_at";

#[derive(FromRow)]
pub struct DbPlan {
    pub id: repr::Id,
    pub plan_name: String,
    pub lot_id: i64,
    pub unit_charge_amount: i64,
    pub currency: String,
    pub created_at: repr::Time,
}

impl DbPlan {
    pub fn into_domain(self) -> Result<ParkingPlan, RepoError> {
        let currency = parse_currency(&self.currency)?;
        Ok(ParkingPlan {
            id: PlanId::from_uuid(repr::id(self.id)?),
            plan_name: self.plan_name,
            lot_id: self.lot_id,
            unit_charge_amount: money(self.unit_charge_amount, currency)?,
            created_at: repr::time(self.created_at)?,
        })
    }
}

#[derive(FromRow)]
pub struct DbEligibility {
    pub id: repr::Id,
    pub user_email: String,
    pub plan_id: repr::Id,
    pub subscribed: repr::Flag,
}

impl DbEligibility {
    pub fn into_domain(self) -> Result<PlanEligibleUser, RepoError> {
        Ok(PlanEligibleUser {
            id: EligibilityId::from_uuid(repr::id(self.id)?),
            user_email: self.user_email,
            plan_id: PlanId::from_uuid(repr::id(self.plan_id)?),
            subscribed: repr::flag(self.subscribed),
        })
    }
}

pub const SUBSCRIPTION_COLUMNS: &str = "id, user_id, plan_id, provider_subscription_id, \
     plan_start_date, plan_charge_amount, currency, payment_profile_id, created_at";

#[derive(FromRow)]
pub struct DbSubscription {
    pub id: repr::Id,
    pub user_id: repr::Id,
    pub plan_id: repr::Id,
    pub provider_subscription_id: Option<String>,
    pub plan_start_date: repr::Time,
    pub plan_charge_amount: i64,
    pub currency: String,
    pub payment_profile_id: Option<String>,
    pub created_at: repr::Time,
}

impl DbSubscription {
    pub fn into_domain(self) -> Result<PlanSubscription, RepoError> {
        let currency = parse_currency(&self.currency)?;
        Ok(PlanSubscription {
            id: SubscriptionId::from_uuid(repr::id(self.id)?),
            user_id: UserId::from_uuid(repr::id(self.user_id)?),
            plan_id: PlanId::from_uuid(repr::id(self.plan_id)?),
            provider_subscription_id: self.provider_subscription_id,
            plan_start_date: repr::time(self.plan_start_date)?,
            plan_charge_amount: money(self.plan_charge_amount, currency)?,
            payment_profile_id: self.payment_profile_id,
            created_at: repr::time(self.created_at)?,
        })
    }
}

pub const ACTIVITY_COLUMNS: &str = "id, holder_id, lot_id, parking_status, created_at, \
     exit_datetime, exception_flag, gate_response";

#[derive(FromRow)]
pub struct DbActivity {
    pub id: repr::Id,
    pub holder_id: repr::Id,
    pub lot_id: i64,
    pub parking_status: String,
    pub created_at: repr::Time,
    pub exit_datetime: Option<repr::Time>,
    pub exception_flag: Option<String>,
    pub gate_response: Option<String>,
}

impl DbActivity {
    pub fn into_domain(self) -> Result<ParkingActivity, RepoError> {
        Ok(ParkingActivity {
            id: ActivityId::from_uuid(repr::id(self.id)?),
            holder: UserId::from_uuid(repr::id(self.holder_id)?),
            lot_id: self.lot_id,
            status: parse_status(&self.parking_status)?,
            created_at: repr::time(self.created_at)?,
            exit_datetime: opt_time(self.exit_datetime)?,
            exception_flag: self.exception_flag,
            gate_response: self.gate_response,
        })
    }
}

pub const SALE_COLUMNS: &str = "id, holder_id, lot_id, plan_id, plan_name, user_email, \
     user_phone_number, user_license_plate, plan_subscription_date, plan_expiry_date, \
     charge_amount, service_amount, net_amount, currency, payment_profile_id, entry_datetime, \
     exit_datetime, parking_status, exception_flag, invoice_id, created_at";

#[derive(FromRow)]
pub struct DbSaleActivity {
    pub id: repr::Id,
    pub holder_id: repr::Id,
    pub lot_id: i64,
    pub plan_id: repr::Id,
    pub plan_name: String,
    pub user_email: String,
    pub user_phone_number: String,
    pub user_license_plate: Option<String>,
    pub plan_subscription_date: Option<repr::Time>,
    pub plan_expiry_date: Option<repr::Time>,
    pub charge_amount: Option<i64>,
    pub service_amount: Option<i64>,
    pub net_amount: Option<i64>,
    pub currency: Option<String>,
    pub payment_profile_id: Option<String>,
    pub entry_datetime: Option<repr::Time>,
    pub exit_datetime: Option<repr::Time>,
    pub parking_status: Option<String>,
    pub exception_flag: Option<String>,
    pub invoice_id: Option<String>,
    pub created_at: repr::Time,
}

impl DbSaleActivity {
    pub fn into_domain(self) -> Result<ParkingSaleActivity, RepoError> {
        let currency = match self.currency.as_deref() {
            Some(code) => parse_currency(code)?,
            None => Currency::default(),
        };
        let amount = |v: Option<i64>| v.map(|a| money(a, currency)).transpose();

        Ok(ParkingSaleActivity {
            id: SaleActivityId::from_uuid(repr::id(self.id)?),
            holder: UserId::from_uuid(repr::id(self.holder_id)?),
            lot_id: self.lot_id,
            plan_id: PlanId::from_uuid(repr::id(self.plan_id)?),
            plan_name: self.plan_name,
            user_email: self.user_email,
            user_phone_number: self.user_phone_number,
            user_license_plate: self.user_license_plate,
            plan_subscription_date: opt_time(self.plan_subscription_date)?,
            plan_expiry_date: opt_time(self.plan_expiry_date)?,
            charge_amount: amount(self.charge_amount)?,
            service_amount: amount(self.service_amount)?,
            net_amount: amount(self.net_amount)?,
            payment_profile_id: self.payment_profile_id,
            entry_datetime: opt_time(self.entry_datetime)?,
            exit_datetime: opt_time(self.exit_datetime)?,
            parking_status: self
                .parking_status
                .as_deref()
                .map(parse_status)
                .transpose()?,
            exception_flag: self.exception_flag,
            invoice_id: self.invoice_id,
            created_at: repr::time(self.created_at)?,
        })
    }
}

#[derive(FromRow)]
pub struct DbExceptionLog {
    pub id: repr::Id,
    pub holder_id: repr::Id,
    pub log_message: String,
    pub created_at: repr::Time,
}

impl DbExceptionLog {
    pub fn into_domain(self) -> Result<ExceptionLog, RepoError> {
        Ok(ExceptionLog {
            id: ExceptionLogId::from_uuid(repr::id(self.id)?),
            holder: UserId::from_uuid(repr::id(self.holder_id)?),
            log_message: self.log_message,
            created_at: repr::time(self.created_at)?,
        })
    }
}

/// Count row for paging queries.
#[derive(FromRow)]
pub struct DbCount {
    pub total: i64,
}

#[derive(FromRow)]
pub struct DbConfigValue {
    pub config_value: String,
}

