//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

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
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    tracing::debug!(migration = name, "migration applied");
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_tables_pg.sql"),
        "0001",
    )
    .await
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_activities(
        &self,
        query: sqlx::query::QueryAs<'_, sqlx::Postgres, DbActivity, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.into_iter().map(DbActivity::into_domain).collect()
    }

    fn check_updated(result: sqlx::postgres::PgQueryResult) -> Result<(), RepoError> {
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

/// Flips the eligibility flag for `(user_email, plan)` and stores the
/// subscription. `NotFound` when no eligibility row matches; the caller's
/// transaction is then dropped, which rolls it back.
async fn subscribe_in_tx(
    conn: &mut PgConnection,
    subscription: &PlanSubscription,
    user_email: &str,
) -> Result<(), RepoError> {
    let flagged = sqlx::query(
        r#"UPDATE plan_eligible_users SET subscribed = TRUE WHERE user_email = $1 AND plan_id = $2"#,
    )
    .bind(user_email)
    .bind(subscription.plan_id.into_uuid())
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
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
    )
    .bind(subscription.id.into_uuid())
    .bind(subscription.user_id.into_uuid())
    .bind(subscription.plan_id.into_uuid())
    .bind(&subscription.provider_subscription_id)
    .bind(subscription.plan_start_date)
    .bind(subscription.plan_charge_amount.amount())
    .bind(subscription.plan_charge_amount.currency().to_string())
    .bind(&subscription.payment_profile_id)
    .bind(subscription.created_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    Ok(())
}

fn activity_sql(filter: &str) -> String {
    format!(
        "SELECT {} FROM parking_activities WHERE {} ORDER BY created_at DESC",
        ACTIVITY_COLUMNS, filter
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ParkingRepository for PostgresRepo {
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
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"#,
        )
        .bind(user.id.into_uuid())
        .bind(&user.login)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.mobile_number)
        .bind(&user.license_plate)
        .bind(&user.payment_token)
        .bind(&user.region)
        .bind(join_authorities(&user.authorities))
        .bind(user.created_at)
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
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE login = $1", USER_COLUMNS);
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn find_user_by_mobile_number(&self, mobile: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE mobile_number = $1", USER_COLUMNS);
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
            r#"UPDATE users SET first_name = $1, last_name = $2, region = $3 WHERE id = $4"#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(region)
        .bind(id.into_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Self::check_updated(result)
    }

    async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(r#"UPDATE users SET password_hash = $1 WHERE id = $2"#)
            .bind(password_hash)
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Self::check_updated(result)
    }

    async fn create_access_token(&self, token: AccessToken) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO access_tokens (id, user_id, token_hash, created_at, last_used_at)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(token.id.into_uuid())
        .bind(token.user_id.into_uuid())
        .bind(&token.token_hash)
        .bind(token.created_at)
        .bind(token.last_used_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn find_user_by_token_hash(&self, token_hash: &str) -> Result<Option<User>, RepoError> {
        // Stamp and resolve in one round trip.
        let sql = format!(
            "WITH touched AS (
                 UPDATE access_tokens SET last_used_at = NOW()
                 WHERE token_hash = $1
                 RETURNING user_id
             )
             SELECT {} FROM users WHERE id = (SELECT user_id FROM touched)",
            USER_COLUMNS
        );
        let row: Option<DbUser> = sqlx::query_as(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(DbUser::into_domain).transpose()
    }

    async fn create_plan(&self, plan: ParkingPlan) -> Result<ParkingPlan, RepoError> {
        sqlx::query(
            r#"INSERT INTO parking_plans (id, plan_name, lot_id, unit_charge_amount, currency, created_at)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(plan.id.into_uuid())
        .bind(&plan.plan_name)
        .bind(plan.lot_id)
        .bind(plan.unit_charge_amount.amount())
        .bind(plan.unit_charge_amount.currency().to_string())
        .bind(plan.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(plan)
    }

    async fn get_plan(&self, id: PlanId) -> Result<Option<ParkingPlan>, RepoError> {
        let sql = format!("SELECT {} FROM parking_plans WHERE id = $1", PLAN_COLUMNS);
        let row: Option<DbPlan> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
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
            r#"INSERT INTO plan_eligible_users (id, user_email, plan_id, subscribed) VALUES ($1, $2, $3, $4)"#,
        )
        .bind(eligibility.id.into_uuid())
        .bind(&eligibility.user_email)
        .bind(eligibility.plan_id.into_uuid())
        .bind(eligibility.subscribed)
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
               WHERE e.user_email = $1
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
            "SELECT {} FROM plan_subscriptions WHERE user_id = $1 AND plan_id = $2 \
             ORDER BY created_at DESC LIMIT 1",
            SUBSCRIPTION_COLUMNS
        );
        let row: Option<DbSubscription> = sqlx::query_as(&sql)
            .bind(user_id.into_uuid())
            .bind(plan_id.into_uuid())
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
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(activity.id.into_uuid())
        .bind(activity.holder.into_uuid())
        .bind(activity.lot_id)
        .bind(activity.status.to_string())
        .bind(activity.created_at)
        .bind(activity.exit_datetime)
        .bind(&activity.exception_flag)
        .bind(&activity.gate_response)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(activity)
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Option<ParkingActivity>, RepoError> {
        let sql = activity_sql("id = $1");
        Ok(self
            .fetch_activities(sqlx::query_as(&sql).bind(id.into_uuid()))
            .await?
            .into_iter()
            .next())
    }

    async fn activities_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        let sql = activity_sql("created_at > $1 AND created_at < $2");
        self.fetch_activities(sqlx::query_as(&sql).bind(start).bind(end))
            .await
    }

    async fn activities_between_for_user(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        user_id: UserId,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        let sql = activity_sql("created_at > $1 AND created_at < $2 AND holder_id = $3");
        self.fetch_activities(
            sqlx::query_as(&sql)
                .bind(start)
                .bind(end)
                .bind(user_id.into_uuid()),
        )
        .await
    }

    async fn activities_by_status(
        &self,
        status: ParkingStatus,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        let sql = activity_sql("parking_status = $1");
        self.fetch_activities(sqlx::query_as(&sql).bind(status.to_string()))
            .await
    }

    async fn activities_by_status_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: ParkingStatus,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        let sql = activity_sql("created_at > $1 AND created_at < $2 AND parking_status = $3");
        self.fetch_activities(
            sqlx::query_as(&sql)
                .bind(start)
                .bind(end)
                .bind(status.to_string()),
        )
        .await
    }

    async fn activities_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ParkingActivity>, RepoError> {
        let sql = activity_sql("holder_id = $1");
        self.fetch_activities(sqlx::query_as(&sql).bind(user_id.into_uuid()))
            .await
    }

    async fn activity_for_user_with_status(
        &self,
        user_id: UserId,
        status: ParkingStatus,
    ) -> Result<Option<ParkingActivity>, RepoError> {
        let sql = activity_sql("holder_id = $1 AND parking_status = $2");
        Ok(self
            .fetch_activities(
                sqlx::query_as(&sql)
                    .bind(user_id.into_uuid())
                    .bind(status.to_string()),
            )
            .await?
            .into_iter()
            .next())
    }

    async fn activities_for_lot(&self, lot_id: i64) -> Result<Vec<ParkingActivity>, RepoError> {
        let sql = activity_sql("lot_id = $1");
        self.fetch_activities(sqlx::query_as(&sql).bind(lot_id))
            .await
    }

    async fn activities_page_for_user(
        &self,
        user_id: UserId,
        page: u32,
        size: u32,
    ) -> Result<Page<ParkingActivity>, RepoError> {
        let count: DbCount = sqlx::query_as(
            r#"SELECT COUNT(*) AS total FROM parking_activities WHERE holder_id = $1"#,
        )
        .bind(user_id.into_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        let sql = format!(
            "SELECT {} FROM parking_activities WHERE holder_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            ACTIVITY_COLUMNS
        );
        let items = self
            .fetch_activities(
                sqlx::query_as(&sql)
                    .bind(user_id.into_uuid())
                    .bind(i64::from(size))
                    .bind(i64::from(page) * i64::from(size)),
            )
            .await?;

        Ok(Page {
            items,
            page,
            size,
            total: count.total,
        })
    }

    async fn latest_activity_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<ParkingActivity>, RepoError> {
        let sql = format!("{} LIMIT 1", activity_sql("holder_id = $1"));
        Ok(self
            .fetch_activities(sqlx::query_as(&sql).bind(user_id.into_uuid()))
            .await?
            .into_iter()
            .next())
    }

    async fn set_activity_status(
        &self,
        id: ActivityId,
        status: ParkingStatus,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(r#"UPDATE parking_activities SET parking_status = $1 WHERE id = $2"#)
            .bind(status.to_string())
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Self::check_updated(result)
    }

    async fn set_gate_response(
        &self,
        id: ActivityId,
        gate_response: &str,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(r#"UPDATE parking_activities SET gate_response = $1 WHERE id = $2"#)
            .bind(gate_response)
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Self::check_updated(result)
    }

    async fn set_exit_time(&self, id: ActivityId, exit: DateTime<Utc>) -> Result<(), RepoError> {
        let result = sqlx::query(r#"UPDATE parking_activities SET exit_datetime = $1 WHERE id = $2"#)
            .bind(exit)
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Self::check_updated(result)
    }

    async fn set_exception_flag(&self, id: ActivityId, flag: &str) -> Result<(), RepoError> {
        let result =
            sqlx::query(r#"UPDATE parking_activities SET exception_flag = $1 WHERE id = $2"#)
                .bind(flag)
                .bind(id.into_uuid())
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        Self::check_updated(result)
    }

    async fn record_exit(&self, id: ActivityId, exit: DateTime<Utc>) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"UPDATE parking_activities SET exit_datetime = $1, parking_status = $2 WHERE id = $3"#,
        )
        .bind(exit)
        .bind(ParkingStatus::Exited.to_string())
        .bind(id.into_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Self::check_updated(result)
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
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                       $17, $18, $19, $20, $21)"#,
        )
        .bind(activity.id.into_uuid())
        .bind(activity.holder.into_uuid())
        .bind(activity.lot_id)
        .bind(activity.plan_id.into_uuid())
        .bind(&activity.plan_name)
        .bind(&activity.user_email)
        .bind(&activity.user_phone_number)
        .bind(&activity.user_license_plate)
        .bind(activity.plan_subscription_date)
        .bind(activity.plan_expiry_date)
        .bind(activity.charge_amount.map(|m| m.amount()))
        .bind(activity.service_amount.map(|m| m.amount()))
        .bind(activity.net_amount.map(|m| m.amount()))
        .bind(currency)
        .bind(&activity.payment_profile_id)
        .bind(activity.entry_datetime)
        .bind(activity.exit_datetime)
        .bind(activity.parking_status.map(|s| s.to_string()))
        .bind(&activity.exception_flag)
        .bind(&activity.invoice_id)
        .bind(activity.created_at)
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
            "SELECT {} FROM parking_sale_activities WHERE created_at > $1 AND created_at < $2 \
             ORDER BY created_at DESC",
            SALE_COLUMNS
        );
        let rows: Vec<DbSaleActivity> = sqlx::query_as(&sql)
            .bind(start)
            .bind(end)
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
            "SELECT {} FROM parking_sale_activities WHERE holder_id = $1 ORDER BY created_at DESC",
            SALE_COLUMNS
        );
        let rows: Vec<DbSaleActivity> = sqlx::query_as(&sql)
            .bind(user_id.into_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(DbSaleActivity::into_domain).collect()
    }

    async fn create_exception_log(&self, log: ExceptionLog) -> Result<ExceptionLog, RepoError> {
        sqlx::query(
            r#"INSERT INTO exception_logs (id, holder_id, log_message, created_at) VALUES ($1, $2, $3, $4)"#,
        )
        .bind(log.id.into_uuid())
        .bind(log.holder.into_uuid())
        .bind(&log.log_message)
        .bind(log.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(log)
    }

    async fn get_config_value(&self, key: &str) -> Result<Option<String>, RepoError> {
        let row: Option<DbConfigValue> =
            sqlx::query_as(r#"SELECT config_value FROM app_config WHERE config_key = $1"#)
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(row.map(|r| r.config_value))
    }

    async fn set_config_value(&self, key: &str, value: &str) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO app_config (config_key, config_value, updated_at) VALUES ($1, $2, NOW())
               ON CONFLICT (config_key) DO UPDATE SET config_value = EXCLUDED.config_value,
                                                      updated_at = EXCLUDED.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
