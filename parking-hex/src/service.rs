//! Parking Application Service
//!
//! Orchestrates domain operations through the repository and payment ports.
//! Contains NO infrastructure logic - pure business orchestration.

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use parking_repo::security;
use parking_types::{
    AccessToken, ActivityId, ActivityPageResponse, ActivityQuery, ActivityResponse,
    AppError, Authority, AuthenticateRequest, CreateSaleRequest, CreateUserRequest, ErrorCode,
    ExceptionLog, LogRequest, PageQuery, ParkingActivity, ParkingPlan, ParkingRepository,
    ParkingSaleActivity, ParkingStatus, PasswordUpdateRequest, PaymentGateway, PlanId,
    PlanResponse, PlanSubscription, RepoError, SaleActivityId, SaleActivityResponse, SaleQuery,
    StartParkingRequest, SubscribeResponse, SubscribeStatus, TokenResponse,
    UpdateAccountRequest, UpdateActivityRequest, User, UserId, UserResponse,
    filter_sale_activities, validate_email, validate_password,
};

/// Runtime flag read from `app_config` before contacting the provider at signup.
pub const STRIPE_ENABLED_KEY: &str = "STRIPE_ENABLED";

/// How many recent provider invoices are scanned when attaching an invoice to a sale.
pub const INVOICE_LOOKUP_LIMIT: u32 = 3;

/// Service fee in basis points (10%).
pub const DEFAULT_SERVICE_FEE_BPS: u32 = 1000;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

const ALREADY_SUBSCRIBED: &str = "Already Subscribed";
const CUSTOMER_LOOKUP_FAILED: &str = "Failed at retrieving customer information";
const SUBSCRIBE_FAILED: &str = "Subscribe Failed";
const SUBSCRIBE_UNEXPECTED: &str = "Failed unexpected";
const PASSWORD_LENGTH_MESSAGE: &str = "Password must be between 5 and 50 characters";

/// Application service for parking operations.
///
/// Generic over the repository and the payment gateway; both adapters are
/// injected at compile time so tests can swap in in-memory doubles.
pub struct ParkingService<R: ParkingRepository, P: PaymentGateway> {
    repo: R,
    payments: P,
    fee_bps: u32,
}

fn require(user: &User, authority: Authority) -> Result<(), AppError> {
    if user.has_authority(authority) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!("{} required", authority)))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

impl<R: ParkingRepository, P: PaymentGateway> ParkingService<R, P> {
    /// Creates a new service with the default service fee.
    pub fn new(repo: R, payments: P) -> Self {
        Self {
            repo,
            payments,
            fee_bps: DEFAULT_SERVICE_FEE_BPS,
        }
    }

    /// Overrides the service fee taken from each charge, in basis points.
    pub fn with_service_fee(mut self, fee_bps: u32) -> Self {
        self.fee_bps = fee_bps;
        self
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn payments(&self) -> &P {
        &self.payments
    }

    pub fn service_fee_bps(&self) -> u32 {
        self.fee_bps
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Registration & authentication
    // ─────────────────────────────────────────────────────────────────────────────

    /// Reads the provider flag; anything but an explicit truthy value is off.
    pub async fn stripe_enabled(&self) -> Result<bool, AppError> {
        Ok(self
            .repo
            .get_config_value(STRIPE_ENABLED_KEY)
            .await?
            .is_some_and(|v| parse_flag(&v)))
    }

    /// Registers a user and returns every plan the email is eligible for.
    ///
    /// Duplicate checks and request validation run before the provider is
    /// contacted. The user and its free-plan subscriptions are stored in one
    /// repository transaction.
    #[instrument(skip(self, req), fields(login = %req.email))]
    pub async fn register(&self, req: CreateUserRequest) -> Result<Vec<PlanResponse>, AppError> {
        if self.repo.find_user_by_login(&req.email).await?.is_some() {
            return Err(AppError::Rejected(ErrorCode::RegisterUsernameTaken));
        }
        if self
            .repo
            .find_user_by_mobile_number(&req.mobile_number)
            .await?
            .is_some()
        {
            return Err(AppError::Rejected(ErrorCode::RegisterPhoneNumTaken));
        }

        let eligibility = self.repo.eligibility_for_email(&req.email).await?;
        if eligibility.is_empty() {
            return Err(AppError::Rejected(ErrorCode::RegisterPlanNotFound));
        }

        validate_email(&req.email)?;
        validate_password(&req.password)?;
        if req.mobile_number.trim().is_empty() {
            return Err(AppError::BadRequest("Mobile number is required".into()));
        }

        let payment_token = if self.stripe_enabled().await? {
            info!("payment provider enabled, creating customer during registration");
            match self
                .payments
                .create_customer(&req.email, req.card_token.as_deref())
                .await
            {
                Ok(customer) => Some(customer.id),
                Err(e) => {
                    error!(error = %e, "provider customer creation failed");
                    return Err(AppError::Rejected(ErrorCode::RegisterStripeFailed));
                }
            }
        } else {
            info!("payment provider disabled, registering without payment info");
            None
        };

        let password_hash =
            security::hash_password(&req.password).map_err(AppError::Internal)?;
        let user_id = UserId::new();

        let mut plans = Vec::with_capacity(eligibility.len());
        let mut automatic = Vec::new();
        for entry in eligibility {
            let Some(plan) = self.repo.get_plan(entry.plan_id).await? else {
                warn!(plan_id = %entry.plan_id, "eligible plan no longer exists");
                continue;
            };

            let subscribed = if entry.subscribed {
                true
            } else if plan.is_free() {
                automatic.push(PlanSubscription::automatic(user_id, &plan));
                true
            } else {
                false
            };
            plans.push(PlanResponse::from_plan(&plan, subscribed));
        }

        let user = self
            .repo
            .create_user(
                User {
                    id: user_id,
                    login: req.email,
                    password_hash,
                    first_name: req.first_name,
                    last_name: req.last_name,
                    mobile_number: req.mobile_number,
                    license_plate: req.license_plate,
                    payment_token,
                    region: req.region,
                    authorities: vec![Authority::User],
                    created_at: Utc::now(),
                },
                automatic,
            )
            .await?;

        info!(user_id = %user.id, plans = plans.len(), "user registered");
        Ok(plans)
    }

    /// Exchanges credentials for a new opaque bearer token.
    #[instrument(skip(self, req), fields(login = %req.email))]
    pub async fn authenticate(&self, req: AuthenticateRequest) -> Result<TokenResponse, AppError> {
        let invalid = || AppError::Unauthorized("Invalid email or password".into());

        let user = self
            .repo
            .find_user_by_login(&req.email)
            .await?
            .ok_or_else(invalid)?;

        let matches = security::verify_password(&req.password, &user.password_hash)
            .map_err(AppError::Internal)?;
        if !matches {
            return Err(invalid());
        }

        let raw = security::generate_access_token();
        self.repo
            .create_access_token(AccessToken::new(
                user.id,
                security::hash_access_token(&raw),
            ))
            .await?;

        Ok(TokenResponse {
            access_token: raw,
            token_type: "Bearer".into(),
        })
    }

    /// Resolves a raw bearer token to its user.
    pub async fn resolve_token(&self, raw: &str) -> Result<Option<User>, AppError> {
        let hash = security::hash_access_token(raw);
        Ok(self.repo.find_user_by_token_hash(&hash).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Account
    // ─────────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn get_account(&self, user: &User) -> Result<UserResponse, AppError> {
        let latest = self.repo.latest_activity_for_user(user.id).await?;
        if latest.is_none() {
            warn!("no parking activity recorded for user");
        }
        Ok(UserResponse::from_user(user, latest.as_ref()))
    }

    #[instrument(skip(self, user, req), fields(user_id = %user.id))]
    pub async fn update_account(
        &self,
        user: &User,
        req: UpdateAccountRequest,
    ) -> Result<(), AppError> {
        require(user, Authority::User)?;
        self.repo
            .update_user_information(user.id, req.first_name, req.last_name, req.region)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, user, req), fields(user_id = %user.id))]
    pub async fn change_password(
        &self,
        user: &User,
        req: PasswordUpdateRequest,
    ) -> Result<(), AppError> {
        let password = req
            .password
            .filter(|p| validate_password(p).is_ok())
            .ok_or_else(|| AppError::BadRequest(PASSWORD_LENGTH_MESSAGE.into()))?;

        let hash = security::hash_password(&password).map_err(AppError::Internal)?;
        self.repo.update_password_hash(user.id, &hash).await?;
        Ok(())
    }

    /// Stores the tail of the client's event log. Every failure surfaces as
    /// the fixed `LogMessageFailed` rejection.
    #[instrument(skip(self, user, req), fields(user_id = %user.id))]
    pub async fn save_log(&self, user: &User, req: LogRequest) -> Result<(), AppError> {
        let events = req.log_event.unwrap_or_default();
        let log = ExceptionLog::from_events(user.id, &events);

        if let Err(e) = self.repo.create_exception_log(log).await {
            error!(error = %e, "failed to save client log");
            return Err(AppError::Rejected(ErrorCode::LogMessageFailed));
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Plans & subscriptions
    // ─────────────────────────────────────────────────────────────────────────────

    /// Plans the user's email may subscribe to, with their subscribed flag.
    pub async fn eligible_plans(&self, user: &User) -> Result<Vec<PlanResponse>, AppError> {
        let eligibility = self.repo.eligibility_for_email(&user.login).await?;
        let mut plans = Vec::with_capacity(eligibility.len());
        for entry in eligibility {
            if let Some(plan) = self.repo.get_plan(entry.plan_id).await? {
                plans.push(PlanResponse::from_plan(&plan, entry.subscribed));
            }
        }
        Ok(plans)
    }

    /// Subscribes to a zero-charge plan without contacting the provider.
    pub async fn auto_subscribe(
        &self,
        user: &User,
        plan: &ParkingPlan,
    ) -> Result<PlanSubscription, AppError> {
        let subscription = self
            .repo
            .record_subscription(PlanSubscription::automatic(user.id, plan), &user.login)
            .await?;
        info!(user_id = %user.id, plan_id = %plan.id, "auto-subscribed to free plan");
        Ok(subscription)
    }

    /// Subscribes the user to a plan. Charged plans go through the payment
    /// provider; free plans take the automatic path.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn subscribe_plan(
        &self,
        user: &User,
        plan_id: PlanId,
    ) -> Result<SubscribeResponse, AppError> {
        let plan = self
            .repo
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Plan {}", plan_id)))?;

        let already = self
            .repo
            .eligibility_for_email(&user.login)
            .await?
            .iter()
            .any(|e| e.plan_id == plan_id && e.subscribed);
        if already {
            return Ok(SubscribeResponse {
                status: SubscribeStatus::AlreadySubscribed,
                subscription_id: None,
                message: ALREADY_SUBSCRIBED.into(),
            });
        }

        if plan.is_free() {
            self.auto_subscribe(user, &plan).await?;
            return Ok(SubscribeResponse {
                status: SubscribeStatus::Subscribed,
                subscription_id: None,
                message: "Subscribed".into(),
            });
        }

        let customer_id = user.payment_token.as_deref().ok_or_else(|| {
            warn!("user has no payment profile");
            AppError::PaymentProvider(CUSTOMER_LOOKUP_FAILED.into())
        })?;
        let customer = self
            .payments
            .retrieve_customer(customer_id)
            .await
            .map_err(|e| {
                error!(error = %e, "provider customer lookup failed");
                AppError::PaymentProvider(CUSTOMER_LOOKUP_FAILED.into())
            })?;

        let provider_sub = self
            .payments
            .create_subscription(&customer.id, &plan.provider_plan_id())
            .await
            .map_err(|e| {
                error!(error = %e, "provider subscription failed");
                AppError::PaymentProvider(SUBSCRIBE_FAILED.into())
            })?;

        let subscription = PlanSubscription::with_provider(
            user.id,
            &plan,
            provider_sub.id.clone(),
            Some(customer.id),
        );
        match self.repo.record_subscription(subscription, &user.login).await {
            Ok(_) => {}
            Err(RepoError::NotFound) => {
                // The provider subscription exists but nothing local references it.
                error!(
                    provider_subscription_id = %provider_sub.id,
                    "no eligibility record to mark subscribed"
                );
                return Err(AppError::Internal(SUBSCRIBE_UNEXPECTED.into()));
            }
            Err(e) => {
                error!(
                    provider_subscription_id = %provider_sub.id,
                    error = %e,
                    "failed to record provider subscription"
                );
                return Err(e.into());
            }
        }

        info!(provider_subscription_id = %provider_sub.id, "subscribed");
        Ok(SubscribeResponse {
            status: SubscribeStatus::Subscribed,
            subscription_id: Some(provider_sub.id),
            message: "Subscribed".into(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Sale activities
    // ─────────────────────────────────────────────────────────────────────────────

    /// Records a sale for a paid subscription, splitting the charge into
    /// service fee and net amount and attaching the matching provider invoice.
    #[instrument(skip(self, user, subscription), fields(user_id = %user.id))]
    pub async fn create_sale_activity_with_subscription(
        &self,
        user: &User,
        subscription: &PlanSubscription,
    ) -> Result<ParkingSaleActivity, AppError> {
        let plan = self
            .repo
            .get_plan(subscription.plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Plan {}", subscription.plan_id)))?;

        let charge = subscription.plan_charge_amount;
        let (service, net) = charge.split_fee(self.fee_bps);
        let invoice_id = self.find_invoice(user, subscription).await;

        let sale = ParkingSaleActivity {
            id: SaleActivityId::new(),
            holder: user.id,
            lot_id: plan.lot_id,
            plan_id: plan.id,
            plan_name: plan.plan_name,
            user_email: user.login.clone(),
            user_phone_number: user.mobile_number.clone(),
            user_license_plate: user.license_plate.clone(),
            plan_subscription_date: Some(subscription.plan_start_date),
            plan_expiry_date: None,
            charge_amount: Some(charge),
            service_amount: Some(service),
            net_amount: Some(net),
            payment_profile_id: subscription.payment_profile_id.clone(),
            entry_datetime: None,
            exit_datetime: None,
            parking_status: None,
            exception_flag: None,
            invoice_id,
            created_at: Utc::now(),
        };

        Ok(self.repo.create_sale_activity(sale).await?)
    }

    /// First of the latest invoices whose subscription matches; lookup failures are ignored.
    async fn find_invoice(&self, user: &User, subscription: &PlanSubscription) -> Option<String> {
        let customer_id = user.payment_token.as_deref()?;
        let provider_sub_id = subscription.provider_subscription_id.as_deref()?;

        match self
            .payments
            .list_invoices(customer_id, INVOICE_LOOKUP_LIMIT)
            .await
        {
            Ok(invoices) => invoices
                .into_iter()
                .find(|invoice| invoice.subscription.as_deref() == Some(provider_sub_id))
                .map(|invoice| invoice.id),
            Err(e) => {
                warn!(error = %e, "invoice lookup failed, recording sale without invoice");
                None
            }
        }
    }

    /// Records a free entry for a plan holder: zero charge, entered now, parked.
    #[instrument(skip(self, user, plan), fields(user_id = %user.id, plan_id = %plan.id))]
    pub async fn create_sale_activity_for_plan_user(
        &self,
        user: &User,
        plan: &ParkingPlan,
    ) -> Result<ParkingSaleActivity, AppError> {
        let zero = parking_types::Money::zero(plan.unit_charge_amount.currency());
        let now = Utc::now();

        let sale = ParkingSaleActivity {
            id: SaleActivityId::new(),
            holder: user.id,
            lot_id: plan.lot_id,
            plan_id: plan.id,
            plan_name: plan.plan_name.clone(),
            user_email: user.login.clone(),
            user_phone_number: user.mobile_number.clone(),
            user_license_plate: user.license_plate.clone(),
            plan_subscription_date: None,
            plan_expiry_date: None,
            charge_amount: Some(zero),
            service_amount: Some(zero),
            net_amount: Some(zero),
            payment_profile_id: None,
            entry_datetime: Some(now),
            exit_datetime: None,
            parking_status: Some(ParkingStatus::Parked),
            exception_flag: None,
            invoice_id: None,
            created_at: now,
        };

        Ok(self.repo.create_sale_activity(sale).await?)
    }

    /// Picks the subscription path when the user holds a charged subscription
    /// to the plan, the free-entry path otherwise.
    pub async fn create_sale(
        &self,
        user: &User,
        req: CreateSaleRequest,
    ) -> Result<SaleActivityResponse, AppError> {
        let plan = self
            .repo
            .get_plan(req.plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Plan {}", req.plan_id)))?;

        let sale = match self.repo.find_subscription(user.id, plan.id).await? {
            Some(sub) if !sub.plan_charge_amount.is_zero() => {
                self.create_sale_activity_with_subscription(user, &sub)
                    .await?
            }
            _ => self.create_sale_activity_for_plan_user(user, &plan).await?,
        };
        Ok(SaleActivityResponse::from(&sale))
    }

    pub async fn find_sale_activities_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ParkingSaleActivity>, AppError> {
        Ok(self.repo.sale_activities_between(start, end).await?)
    }

    /// Sales where the vehicle entered and has not left yet.
    pub async fn find_in_flight_sale_activities(
        &self,
        user: &User,
    ) -> Result<Vec<ParkingSaleActivity>, AppError> {
        let all = self.repo.sale_activities_for_user(user.id).await?;
        Ok(all.into_iter().filter(|a| a.is_in_flight()).collect())
    }

    /// Lists sales, filtered by the query flags. A `from`/`to` range lists
    /// every user's sales and needs `ROLE_ADMIN`; otherwise the caller's own.
    pub async fn list_sales(
        &self,
        user: &User,
        query: SaleQuery,
    ) -> Result<Vec<SaleActivityResponse>, AppError> {
        let activities = match (query.from, query.to) {
            (Some(start), Some(end)) => {
                require(user, Authority::Admin)?;
                self.find_sale_activities_between(start, end).await?
            }
            (None, None) => self.repo.sale_activities_for_user(user.id).await?,
            _ => {
                return Err(AppError::BadRequest(
                    "Both from and to are required for a date range".into(),
                ));
            }
        };

        Ok(filter_sale_activities(activities, query.into())
            .iter()
            .map(SaleActivityResponse::from)
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Parking activities
    // ─────────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self, user), fields(user_id = %user.id, lot_id = req.lot_id))]
    pub async fn start_parking(
        &self,
        user: &User,
        req: StartParkingRequest,
    ) -> Result<ActivityResponse, AppError> {
        let activity = self
            .repo
            .create_activity(ParkingActivity::enter(user.id, req.lot_id))
            .await?;
        Ok(ActivityResponse::from(&activity))
    }

    /// Stamps the exit time and marks the activity `EXITED`. Only the holder
    /// or an admin may close an activity.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn exit_parking(
        &self,
        user: &User,
        id: ActivityId,
    ) -> Result<ActivityResponse, AppError> {
        let activity = self.get_activity(id).await?;
        if activity.holder != user.id && !user.has_authority(Authority::Admin) {
            return Err(AppError::Forbidden("Not the activity holder".into()));
        }

        self.repo.record_exit(id, Utc::now()).await?;

        let updated = self.get_activity(id).await?;
        Ok(ActivityResponse::from(&updated))
    }

    pub async fn list_activities(
        &self,
        user: &User,
        query: PageQuery,
    ) -> Result<ActivityPageResponse, AppError> {
        let page = query.page.unwrap_or(0);
        let size = query
            .size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let result = self
            .repo
            .activities_page_for_user(user.id, page, size)
            .await?;
        Ok(ActivityPageResponse::from(result))
    }

    pub async fn set_activity_status(
        &self,
        user: &User,
        id: ActivityId,
        status: ParkingStatus,
    ) -> Result<(), AppError> {
        require(user, Authority::Admin)?;
        Ok(self.repo.set_activity_status(id, status).await?)
    }

    pub async fn set_gate_response(
        &self,
        user: &User,
        id: ActivityId,
        gate_response: &str,
    ) -> Result<(), AppError> {
        require(user, Authority::Admin)?;
        Ok(self.repo.set_gate_response(id, gate_response).await?)
    }

    pub async fn set_exception_flag(
        &self,
        user: &User,
        id: ActivityId,
        flag: &str,
    ) -> Result<(), AppError> {
        require(user, Authority::Admin)?;
        Ok(self.repo.set_exception_flag(id, flag).await?)
    }

    /// Applies whichever fields the request carries (admin only).
    #[instrument(skip(self, user, req), fields(user_id = %user.id))]
    pub async fn update_activity(
        &self,
        user: &User,
        id: ActivityId,
        req: UpdateActivityRequest,
    ) -> Result<ActivityResponse, AppError> {
        require(user, Authority::Admin)?;
        if req.status.is_none() && req.gate_response.is_none() && req.exception_flag.is_none() {
            return Err(AppError::BadRequest("Nothing to update".into()));
        }

        if let Some(status) = req.status {
            self.set_activity_status(user, id, status).await?;
        }
        if let Some(gate) = req.gate_response.as_deref() {
            self.set_gate_response(user, id, gate).await?;
        }
        if let Some(flag) = req.exception_flag.as_deref() {
            self.set_exception_flag(user, id, flag).await?;
        }

        let updated = self.get_activity(id).await?;
        Ok(ActivityResponse::from(&updated))
    }

    /// Admin search. The first matching criteria shape wins: lot; status
    /// within a range; status; range.
    pub async fn search_activities(
        &self,
        user: &User,
        query: ActivityQuery,
    ) -> Result<Vec<ActivityResponse>, AppError> {
        require(user, Authority::Admin)?;

        let range = query.from.zip(query.to);
        let activities = match (query.lot_id, query.status, range) {
            (Some(lot_id), _, _) => self.repo.activities_for_lot(lot_id).await?,
            (None, Some(status), Some((start, end))) => {
                self.repo
                    .activities_by_status_between(start, end, status)
                    .await?
            }
            (None, Some(status), None) => self.repo.activities_by_status(status).await?,
            (None, None, Some((start, end))) => self.repo.activities_between(start, end).await?,
            (None, None, None) => {
                return Err(AppError::BadRequest(
                    "Provide lotId, status, or a from/to range".into(),
                ));
            }
        };

        Ok(activities.iter().map(ActivityResponse::from).collect())
    }

    async fn get_activity(&self, id: ActivityId) -> Result<ParkingActivity, AppError> {
        self.repo
            .get_activity(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {}", id)))
    }
}
