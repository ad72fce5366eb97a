//! SQLite repository adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use sqlx::sqlite::SqliteConnectOptions;
use std::str::FromStr;

use parking_types::{
    AccessToken, ActivityId, ExceptionLog, Page, ParkingActivity, ParkingPlan,
    ParkingRepository, ParkingSaleActivity, ParkingStatus, PlanEligibleUser, PlanId,
    PlanSubscription, RepoError, User, UserId,
};

use crate::types::{
    ACTIVITY_COLUMNS, DbActivity, DbConfigValue, DbCount, DbEligibility, DbPlan, DbSaleActivity,
    DbSubscription, DbUser, PLAN_COLUMNS, SALE_COLUMNS, SUBSCRIPTION_COLUMNS, USER_COLUMNS,
    db_err, join_authorities,
};

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

/// Fixed-width RFC 3339 so that TEXT comparison orders chronologically.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Flips the eligibility flag for `(user_email, plan)` and stores the
/// subscription. `NotFound` when no eligibility row matches; the caller's
/// transaction is then dropped, which rolls it back.
async fn subscribe_in_tx(
    conn: &mut SqliteConnection,
    subscription: &PlanSubscription,
    user_email: &str,
) -> Result<(), RepoError> {
    let flagged = sqlx::query(
        r#"UPDATE plan_eligible_users SET subscribed = 1 WHERE user_email = ? AND plan_id = ?"#,
    )
    .bind(user_email)
    .bind(subscription.plan_id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    if flagged.rows_affected() == 0 {
        return Err(RepoError::NotFound);
    }

    sqlx::query(
        r#"INSERT INTO plan_subscriptions (id, user_id, plan_id, provider_subscription_id,
                                           plan_start_date, plan_charge_amount, currency,
                                           payment_profile_id, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(subscription.id.to_string())
    .bind(subscription.user_id.to_string())
    .bind(subscription.plan_id.to_string())
    .bind(&subscription.provider_subscription_id)
    .bind(ts(subscription.plan_start_date))
    .bind(subscription.plan_charge_amount.amount())
    .bind(subscription.plan_charge_amount.currency().to_string())
    .bind(&subscription.payment_profile_id)
    .bind(ts(subscription.created_at))
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    Ok(())
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(options).await?;

        let repo = Self { pool };
        repo.create_schema().await?;
        Ok(repo)
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the database schema (idempotent).
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        let ddl = include_str!("../migrations/0001_create_tables.sql");
        for statement in ddl.split(';') {
            let stmt = statement.trim();
            if !stmt.is_empty() {
                sqlx::query(stmt).execute(&self.pool).await.map_err(db_err)?;
            }
        }
        tracing::debug!("sqlite schema ready");
        Ok(())
    }

    async fn fetch_activities(
        &self,
        filter: &str,
        binds: Vec<String>,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        let sql = format!(
            "SELECT {} FROM parking_activities WHERE {} ORDER BY created_at DESC",
            ACTIVITY_COLUMNS, filter
        );
        let mut query = sqlx::query_as::<_, DbActivity>(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.into_iter().map(DbActivity::into_domain).collect()
    }

    async fn update_activity_field(
        &self,
        id: ActivityId,
        column: &str,
        value: String,
    ) -> Result<(), RepoError> {
        let sql = format!("UPDATE parking_activities SET {} = ? WHERE id = ?", column);
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ParkingRepository for SqliteRepo {
    async fn create_user(
        &self,
        user: User,
        subscriptions: Vec<PlanSubscription>,
    ) -> Result<User, RepoError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO users (id, login, password_hash, first_name, last_name, mobile_number,
                                  license_plate, payment_token, region, authorities, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user.id.to_string())
        .bind(&user.login)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.mobile_number)
        .bind(&user.license_plate)
        .bind(&user.payment_token)
        .bind(&user.region)
        .bind(join_authorities(&user.authorities))
        .bind(ts(user.created_at))
        .execute(&mut *db_tx)
        .await
        .map_err(db_err)?;

        for subscription in &subscriptions {
            subscribe_in_tx(&mut *db_tx, subscription, &user.login).await?;
        }

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(user)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE login = ?", USER_COLUMNS);
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn find_user_by_mobile_number(&self, mobile: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE mobile_number = ?", USER_COLUMNS);
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(mobile)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn update_user_information(
        &self,
        id: UserId,
        first_name: Option<String>,
        last_name: Option<String>,
        region: Option<String>,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE users SET first_name = ?, last_name = ?, region = ? WHERE id = ?"#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(region)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(r#"UPDATE users SET password_hash = ? WHERE id = ?"#)
            .bind(password_hash)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn create_access_token(&self, token: AccessToken) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO access_tokens (id, user_id, token_hash, created_at, last_used_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(token.id.to_string())
        .bind(token.user_id.to_string())
        .bind(&token.token_hash)
        .bind(ts(token.created_at))
        .bind(token.last_used_at.map(ts))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn find_user_by_token_hash(&self, token_hash: &str) -> Result<Option<User>, RepoError> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = (SELECT user_id FROM access_tokens WHERE token_hash = ?)",
            USER_COLUMNS
        );
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query(r#"UPDATE access_tokens SET last_used_at = ? WHERE token_hash = ?"#)
            .bind(ts(Utc::now()))
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        row.into_domain().map(Some)
    }

    async fn create_plan(&self, plan: ParkingPlan) -> Result<ParkingPlan, RepoError> {
        sqlx::query(
            r#"INSERT INTO parking_plans (id, plan_name, lot_id, unit_charge_amount, currency, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(plan.id.to_string())
        .bind(&plan.plan_name)
        .bind(plan.lot_id)
        .bind(plan.unit_charge_amount.amount())
        .bind(plan.unit_charge_amount.currency().to_string())
        .bind(ts(plan.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(plan)
    }

    async fn get_plan(&self, id: PlanId) -> Result<Option<ParkingPlan>, RepoError> {
        let sql = format!("SELECT {} FROM parking_plans WHERE id = ?", PLAN_COLUMNS);
        let row: Option<DbPlan> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbPlan::into_domain).transpose()
    }

    async fn create_eligibility(
        &self,
        eligibility: PlanEligibleUser,
    ) -> Result<PlanEligibleUser, RepoError> {
        sqlx::query(
            r#"INSERT INTO plan_eligible_users (id, user_email, plan_id, subscribed) VALUES (?, ?, ?, ?)"#,
        )
        .bind(eligibility.id.to_string())
        .bind(&eligibility.user_email)
        .bind(eligibility.plan_id.to_string())
        .bind(eligibility.subscribed as i64)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(eligibility)
    }

    async fn eligibility_for_email(&self, email: &str) -> Result<Vec<PlanEligibleUser>, RepoError> {
        let rows: Vec<DbEligibility> = sqlx::query_as(
            r#"SELECT e.id, e.user_email, e.plan_id, e.subscribed
               FROM plan_eligible_users e
               JOIN parking_plans p ON p.id = e.plan_id
               WHERE e.user_email = ?
               ORDER BY p.created_at"#,
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DbEligibility::into_domain).collect()
    }

    async fn record_subscription(
        &self,
        subscription: PlanSubscription,
        user_email: &str,
    ) -> Result<PlanSubscription, RepoError> {
        let mut db_tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        subscribe_in_tx(&mut *db_tx, &subscription, user_email).await?;

        db_tx
            .commit()
            .await
            .map_err(|e| RepoError::Transaction(e.to_string()))?;

        Ok(subscription)
    }

    async fn find_subscription(
        &self,
        user_id: UserId,
        plan_id: PlanId,
    ) -> Result<Option<PlanSubscription>, RepoError> {
        let sql = format!(
            "SELECT {} FROM plan_subscriptions WHERE user_id = ? AND plan_id = ? \
             ORDER BY created_at DESC LIMIT 1",
            SUBSCRIPTION_COLUMNS
        );
        let row: Option<DbSubscription> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .bind(plan_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbSubscription::into_domain).transpose()
    }

    async fn create_activity(
        &self,
        activity: ParkingActivity,
    ) -> Result<ParkingActivity, RepoError> {
        sqlx::query(
            r#"INSERT INTO parking_activities (id, holder_id, lot_id, parking_status, created_at,
                                               exit_datetime, exception_flag, gate_response)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(activity.id.to_string())
        .bind(activity.holder.to_string())
        .bind(activity.lot_id)
        .bind(activity.status.as_ref())
        .bind(ts(activity.created_at))
        .bind(activity.exit_datetime.map(ts))
        .bind(&activity.exception_flag)
        .bind(&activity.gate_response)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(activity)
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Option<ParkingActivity>, RepoError> {
        Ok(self
            .fetch_activities("id = ?", vec![id.to_string()])
            .await?
            .into_iter()
            .next())
    }

    async fn activities_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        self.fetch_activities(
            "created_at > ? AND created_at < ?",
            vec![ts(start), ts(end)],
        )
        .await
    }

    async fn activities_between_for_user(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        user_id: UserId,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        self.fetch_activities(
            "created_at > ? AND created_at < ? AND holder_id = ?",
            vec![ts(start), ts(end), user_id.to_string()],
        )
        .await
    }

    async fn activities_by_status(
        &self,
        status: ParkingStatus,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        self.fetch_activities("parking_status = ?", vec![status.to_string()])
            .await
    }

    async fn activities_by_status_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: ParkingStatus,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        self.fetch_activities(
            "created_at > ? AND created_at < ? AND parking_status = ?",
            vec![ts(start), ts(end), status.to_string()],
        )
        .await
    }

    async fn activities_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        self.fetch_activities("holder_id = ?", vec![user_id.to_string()])
            .await
    }

    async fn activity_for_user_with_status(
        &self,
        user_id: UserId,
        status: ParkingStatus,
    ) -> Result<Option<ParkingActivity>, RepoError> {
        Ok(self
            .fetch_activities(
                "holder_id = ? AND parking_status = ?",
                vec![user_id.to_string(), status.to_string()],
            )
            .await?
            .into_iter()
            .next())
    }

    async fn activities_for_lot(&self, lot_id: i64) -> Result<Vec<ParkingActivity>, RepoError> {
        self.fetch_activities("lot_id = ?", vec![lot_id.to_string()])
            .await
    }

    async fn activities_page_for_user(
        &self,
        user_id: UserId,
        page: u32,
        size: u32,
    ) -> Result<Page<ParkingActivity>, RepoError> {
        let count: DbCount = sqlx::query_as(
            r#"SELECT COUNT(*) AS total FROM parking_activities WHERE holder_id = ?"#,
        )
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let sql = format!(
            "SELECT {} FROM parking_activities WHERE holder_id = ? \
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
            ACTIVITY_COLUMNS
        );
        let rows: Vec<DbActivity> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .bind(i64::from(size))
            .bind(i64::from(page) * i64::from(size))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(DbActivity::into_domain)
                .collect::<Result<_, _>>()?,
            page,
            size,
            total: count.total,
        })
    }

    async fn latest_activity_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<ParkingActivity>, RepoError> {
        Ok(self
            .fetch_activities("holder_id = ?", vec![user_id.to_string()])
            .await?
            .into_iter()
            .next())
    }

    async fn set_activity_status(
        &self,
        id: ActivityId,
        status: ParkingStatus,
    ) -> Result<(), RepoError> {
        self.update_activity_field(id, "parking_status", status.to_string())
            .await
    }

    async fn set_gate_response(
        &self,
        id: ActivityId,
        gate_response: &str,
    ) -> Result<(), RepoError> {
        self.update_activity_field(id, "gate_response", gate_response.to_string())
            .await
    }

    async fn set_exit_time(&self, id: ActivityId, exit: DateTime<Utc>) -> Result<(), RepoError> {
        self.update_activity_field(id, "exit_datetime", ts(exit))
            .await
    }

    async fn set_exception_flag(&self, id: ActivityId, flag: &str) -> Result<(), RepoError> {
        self.update_activity_field(id, "exception_flag", flag.to_string())
            .await
    }

    async fn record_exit(&self, id: ActivityId, exit: DateTime<Utc>) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE parking_activities SET exit_datetime = ?, parking_status = ? WHERE id = ?"#,
        )
        .bind(ts(exit))
        .bind(ParkingStatus::Exited.to_string())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn create_sale_activity(
        &self,
        activity: ParkingSaleActivity,
    ) -> Result<ParkingSaleActivity, RepoError> {
        let currency = activity
            .charge_amount
            .or(activity.service_amount)
            .or(activity.net_amount)
            .map(|m| m.currency().to_string());

        sqlx::query(
            r#"INSERT INTO parking_sale_activities (id, holder_id, lot_id, plan_id, plan_name,
                   user_email, user_phone_number, user_license_plate, plan_subscription_date,
                   plan_expiry_date, charge_amount, service_amount, net_amount, currency,
                   payment_profile_id, entry_datetime, exit_datetime, parking_status,
                   exception_flag, invoice_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(activity.id.to_string())
        .bind(activity.holder.to_string())
        .bind(activity.lot_id)
        .bind(activity.plan_id.to_string())
        .bind(&activity.plan_name)
        .bind(&activity.user_email)
        .bind(&activity.user_phone_number)
        .bind(&activity.user_license_plate)
        .bind(activity.plan_subscription_date.map(ts))
        .bind(activity.plan_expiry_date.map(ts))
        .bind(activity.charge_amount.map(|m| m.amount()))
        .bind(activity.service_amount.map(|m| m.amount()))
        .bind(activity.net_amount.map(|m| m.amount()))
        .bind(currency)
        .bind(&activity.payment_profile_id)
        .bind(activity.entry_datetime.map(ts))
        .bind(activity.exit_datetime.map(ts))
        .bind(activity.parking_status.map(|s| s.to_string()))
        .bind(&activity.exception_flag)
        .bind(&activity.invoice_id)
        .bind(ts(activity.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(activity)
    }

    async fn sale_activities_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ParkingSaleActivity>, RepoError> {
        let sql = format!(
            "SELECT {} FROM parking_sale_activities WHERE created_at > ? AND created_at < ? \
             ORDER BY created_at DESC",
            SALE_COLUMNS
        );
        let rows: Vec<DbSaleActivity> = sqlx::query_as(&sql)
            .bind(ts(start))
            .bind(ts(end))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(DbSaleActivity::into_domain).collect()
    }

    async fn sale_activities_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ParkingSaleActivity>, RepoError> {
        let sql = format!(
            "SELECT {} FROM parking_sale_activities WHERE holder_id = ? ORDER BY created_at DESC",
            SALE_COLUMNS
        );
        let rows: Vec<DbSaleActivity> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(DbSaleActivity::into_domain).collect()
    }

    async fn create_exception_log(&self, log: ExceptionLog) -> Result<ExceptionLog, RepoError> {
        sqlx::query(
            r#"INSERT INTO exception_logs (id, holder_id, log_message, created_at) VALUES (?, ?, ?, ?)"#,
        )
        .bind(log.id.to_string())
        .bind(log.holder.to_string())
        .bind(&log.log_message)
        .bind(ts(log.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(log)
    }

    async fn get_config_value(&self, key: &str) -> Result<Option<String>, RepoError> {
        let row: Option<DbConfigValue> =
            sqlx::query_as(r#"SELECT config_value FROM app_config WHERE config_key = ?"#)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(row.map(|r| r.config_value))
    }

    async fn set_config_value(&self, key: &str, value: &str) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO app_config (config_key, config_value, updated_at) VALUES (?, ?, ?)
               ON CONFLICT(config_key) DO UPDATE SET config_value = excluded.config_value,
                                                     updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
