//! ParkingService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use parking_types::{
        AccessToken, ActivityId, ActivityQuery, AppError, AuthenticateRequest, Authority,
        CreateSaleRequest, CreateUserRequest, Currency, ErrorCode, ExceptionLog, LogRequest, Money,
        Page, ParkingActivity, ParkingPlan, ParkingRepository, ParkingSaleActivity, ParkingStatus,
        PasswordUpdateRequest, PaymentError, PaymentGateway, PlanEligibleUser, PlanId,
        PlanSubscription, ProviderCustomer, ProviderInvoice, ProviderSubscription, RepoError,
        SaleQuery, StartParkingRequest, SubscribeStatus, UpdateAccountRequest, User, UserId,
    };

    use crate::ParkingService;
    use crate::service::STRIPE_ENABLED_KEY;

    #[derive(Default)]
    struct State {
        users: Vec<User>,
        tokens: Vec<AccessToken>,
        plans: Vec<ParkingPlan>,
        eligibility: Vec<PlanEligibleUser>,
        subscriptions: Vec<PlanSubscription>,
        activities: Vec<ParkingActivity>,
        sales: Vec<ParkingSaleActivity>,
        logs: Vec<ExceptionLog>,
        config: Vec<(String, String)>,
    }

    /// Simple in-memory repository for testing the service layer.
    #[derive(Default)]
    pub struct MockRepo {
        state: Mutex<State>,
        fail_logs: bool,
        fail_subscriptions: bool,
    }

    impl MockRepo {
        pub fn new() -> Self {
            Self::default()
        }

        fn failing_logs() -> Self {
            Self {
                fail_logs: true,
                ..Self::default()
            }
        }

        fn failing_subscriptions() -> Self {
            Self {
                fail_subscriptions: true,
                ..Self::default()
            }
        }

        /// Flags the eligibility row and stores the subscription.
        fn subscribe(
            &self,
            state: &mut State,
            subscription: &PlanSubscription,
            user_email: &str,
        ) -> Result<(), RepoError> {
            if self.fail_subscriptions {
                return Err(RepoError::Database("disk full".into()));
            }
            let entry = state
                .eligibility
                .iter_mut()
                .find(|e| e.user_email == user_email && e.plan_id == subscription.plan_id)
                .ok_or(RepoError::NotFound)?;
            entry.subscribed = true;
            state.subscriptions.push(subscription.clone());
            Ok(())
        }

        fn sorted_newest_first(mut items: Vec<ParkingActivity>) -> Vec<ParkingActivity> {
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            items
        }

        fn update_activity(
            &self,
            id: ActivityId,
            apply: impl FnOnce(&mut ParkingActivity),
        ) -> Result<(), RepoError> {
            let mut state = self.state.lock().unwrap();
            let activity = state
                .activities
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or(RepoError::NotFound)?;
            apply(activity);
            Ok(())
        }
    }

    #[async_trait]
    impl ParkingRepository for MockRepo {
        async fn create_user(
            &self,
            user: User,
            subscriptions: Vec<PlanSubscription>,
        ) -> Result<User, RepoError> {
            let mut state = self.state.lock().unwrap();
            if state
                .users
                .iter()
                .any(|u| u.login == user.login || u.mobile_number == user.mobile_number)
            {
                return Err(RepoError::Conflict("duplicate user".into()));
            }

            // Work on a copy so a failed subscription leaves nothing behind.
            let mut staged = State {
                eligibility: state.eligibility.clone(),
                subscriptions: state.subscriptions.clone(),
                ..State::default()
            };
            for subscription in &subscriptions {
                self.subscribe(&mut staged, subscription, &user.login)?;
            }
            state.eligibility = staged.eligibility;
            state.subscriptions = staged.subscriptions;
            state.users.push(user.clone());
            Ok(user)
        }

        async fn get_user(&self, id: UserId) -> Result<Option<User>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state.users.iter().find(|u| u.id == id).cloned())
        }

        async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state.users.iter().find(|u| u.login == login).cloned())
        }

        async fn find_user_by_mobile_number(
            &self,
            mobile: &str,
        ) -> Result<Option<User>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .users
                .iter()
                .find(|u| u.mobile_number == mobile)
                .cloned())
        }

        async fn update_user_information(
            &self,
            id: UserId,
            first_name: Option<String>,
            last_name: Option<String>,
            region: Option<String>,
        ) -> Result<(), RepoError> {
            let mut state = self.state.lock().unwrap();
            let user = state
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or(RepoError::NotFound)?;
            user.first_name = first_name;
            user.last_name = last_name;
            user.region = region;
            Ok(())
        }

        async fn update_password_hash(
            &self,
            id: UserId,
            password_hash: &str,
        ) -> Result<(), RepoError> {
            let mut state = self.state.lock().unwrap();
            let user = state
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or(RepoError::NotFound)?;
            user.password_hash = password_hash.to_string();
            Ok(())
        }

        async fn create_access_token(&self, token: AccessToken) -> Result<(), RepoError> {
            self.state.lock().unwrap().tokens.push(token);
            Ok(())
        }

        async fn find_user_by_token_hash(
            &self,
            token_hash: &str,
        ) -> Result<Option<User>, RepoError> {
            let state = self.state.lock().unwrap();
            let Some(token) = state.tokens.iter().find(|t| t.token_hash == token_hash) else {
                return Ok(None);
            };
            Ok(state.users.iter().find(|u| u.id == token.user_id).cloned())
        }

        async fn create_plan(&self, plan: ParkingPlan) -> Result<ParkingPlan, RepoError> {
            self.state.lock().unwrap().plans.push(plan.clone());
            Ok(plan)
        }

        async fn get_plan(&self, id: PlanId) -> Result<Option<ParkingPlan>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state.plans.iter().find(|p| p.id == id).cloned())
        }

        async fn create_eligibility(
            &self,
            eligibility: PlanEligibleUser,
        ) -> Result<PlanEligibleUser, RepoError> {
            self.state
                .lock()
                .unwrap()
                .eligibility
                .push(eligibility.clone());
            Ok(eligibility)
        }

        async fn eligibility_for_email(
            &self,
            email: &str,
        ) -> Result<Vec<PlanEligibleUser>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .eligibility
                .iter()
                .filter(|e| e.user_email == email)
                .cloned()
                .collect())
        }

        async fn record_subscription(
            &self,
            subscription: PlanSubscription,
            user_email: &str,
        ) -> Result<PlanSubscription, RepoError> {
            let mut state = self.state.lock().unwrap();
            self.subscribe(&mut state, &subscription, user_email)?;
            Ok(subscription)
        }

        async fn find_subscription(
            &self,
            user_id: UserId,
            plan_id: PlanId,
        ) -> Result<Option<PlanSubscription>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .subscriptions
                .iter()
                .find(|s| s.user_id == user_id && s.plan_id == plan_id)
                .cloned())
        }

        async fn create_activity(
            &self,
            activity: ParkingActivity,
        ) -> Result<ParkingActivity, RepoError> {
            self.state
                .lock()
                .unwrap()
                .activities
                .push(activity.clone());
            Ok(activity)
        }

        async fn get_activity(&self, id: ActivityId) -> Result<Option<ParkingActivity>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state.activities.iter().find(|a| a.id == id).cloned())
        }

        async fn activities_between(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<ParkingActivity>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(Self::sorted_newest_first(
                state
                    .activities
                    .iter()
                    .filter(|a| a.created_at > start && a.created_at < end)
                    .cloned()
                    .collect(),
            ))
        }

        async fn activities_between_for_user(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            user_id: UserId,
        ) -> Result<Vec<ParkingActivity>, RepoError> {
            Ok(self
                .activities_between(start, end)
                .await?
                .into_iter()
                .filter(|a| a.holder == user_id)
                .collect())
        }

        async fn activities_by_status(
            &self,
            status: ParkingStatus,
        ) -> Result<Vec<ParkingActivity>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(Self::sorted_newest_first(
                state
                    .activities
                    .iter()
                    .filter(|a| a.status == status)
                    .cloned()
                    .collect(),
            ))
        }

        async fn activities_by_status_between(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            status: ParkingStatus,
        ) -> Result<Vec<ParkingActivity>, RepoError> {
            Ok(self
                .activities_between(start, end)
                .await?
                .into_iter()
                .filter(|a| a.status == status)
                .collect())
        }

        async fn activities_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Vec<ParkingActivity>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(Self::sorted_newest_first(
                state
                    .activities
                    .iter()
                    .filter(|a| a.holder == user_id)
                    .cloned()
                    .collect(),
            ))
        }

        async fn activity_for_user_with_status(
            &self,
            user_id: UserId,
            status: ParkingStatus,
        ) -> Result<Option<ParkingActivity>, RepoError> {
            Ok(self
                .activities_for_user(user_id)
                .await?
                .into_iter()
                .find(|a| a.status == status))
        }

        async fn activities_for_lot(
            &self,
            lot_id: i64,
        ) -> Result<Vec<ParkingActivity>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(Self::sorted_newest_first(
                state
                    .activities
                    .iter()
                    .filter(|a| a.lot_id == lot_id)
                    .cloned()
                    .collect(),
            ))
        }

        async fn activities_page_for_user(
            &self,
            user_id: UserId,
            page: u32,
            size: u32,
        ) -> Result<Page<ParkingActivity>, RepoError> {
            let all = self.activities_for_user(user_id).await?;
            let total = all.len() as i64;
            let items = all
                .into_iter()
                .skip((page * size) as usize)
                .take(size as usize)
                .collect();
            Ok(Page {
                items,
                page,
                size,
                total,
            })
        }

        async fn latest_activity_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Option<ParkingActivity>, RepoError> {
            Ok(self.activities_for_user(user_id).await?.into_iter().next())
        }

        async fn set_activity_status(
            &self,
            id: ActivityId,
            status: ParkingStatus,
        ) -> Result<(), RepoError> {
            self.update_activity(id, |a| a.status = status)
        }

        async fn set_gate_response(
            &self,
            id: ActivityId,
            gate_response: &str,
        ) -> Result<(), RepoError> {
            self.update_activity(id, |a| a.gate_response = Some(gate_response.to_string()))
        }

        async fn set_exit_time(
            &self,
            id: ActivityId,
            exit: DateTime<Utc>,
        ) -> Result<(), RepoError> {
            self.update_activity(id, |a| a.exit_datetime = Some(exit))
        }

        async fn set_exception_flag(&self, id: ActivityId, flag: &str) -> Result<(), RepoError> {
            self.update_activity(id, |a| a.exception_flag = Some(flag.to_string()))
        }

        async fn record_exit(
            &self,
            id: ActivityId,
            exit: DateTime<Utc>,
        ) -> Result<(), RepoError> {
            self.update_activity(id, |a| {
                a.exit_datetime = Some(exit);
                a.status = ParkingStatus::Exited;
            })
        }

        async fn create_sale_activity(
            &self,
            activity: ParkingSaleActivity,
        ) -> Result<ParkingSaleActivity, RepoError> {
            self.state.lock().unwrap().sales.push(activity.clone());
            Ok(activity)
        }

        async fn sale_activities_between(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<ParkingSaleActivity>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .sales
                .iter()
                .filter(|s| s.created_at > start && s.created_at < end)
                .cloned()
                .collect())
        }

        async fn sale_activities_for_user(
            &self,
            user_id: UserId,
        ) -> Result<Vec<ParkingSaleActivity>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .sales
                .iter()
                .filter(|s| s.holder == user_id)
                .cloned()
                .collect())
        }

        async fn create_exception_log(&self, log: ExceptionLog) -> Result<ExceptionLog, RepoError> {
            if self.fail_logs {
                return Err(RepoError::Database("disk full".into()));
            }
            self.state.lock().unwrap().logs.push(log.clone());
            Ok(log)
        }

        async fn get_config_value(&self, key: &str) -> Result<Option<String>, RepoError> {
            let state = self.state.lock().unwrap();
            Ok(state
                .config
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone()))
        }

        async fn set_config_value(&self, key: &str, value: &str) -> Result<(), RepoError> {
            let mut state = self.state.lock().unwrap();
            state.config.retain(|(k, _)| k != key);
            state.config.push((key.to_string(), value.to_string()));
            Ok(())
        }
    }

    /// Payment gateway double that counts calls and can be told to fail.
    #[derive(Default)]
    pub struct MockGateway {
        pub customer_calls: AtomicUsize,
        pub subscription_calls: AtomicUsize,
        pub invoice_calls: AtomicUsize,
        fail_customer: bool,
        fail_subscription: bool,
        fail_invoices: bool,
        invoices: Vec<ProviderInvoice>,
    }

    impl MockGateway {
        fn calls(&self) -> usize {
            self.customer_calls.load(Ordering::SeqCst)
                + self.subscription_calls.load(Ordering::SeqCst)
                + self.invoice_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn create_customer(
            &self,
            _email: &str,
            _card_token: Option<&str>,
        ) -> Result<ProviderCustomer, PaymentError> {
            self.customer_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_customer {
                return Err(PaymentError::Rejected("card declined".into()));
            }
            Ok(ProviderCustomer { id: "cus_1".into() })
        }

        async fn retrieve_customer(
            &self,
            customer_id: &str,
        ) -> Result<ProviderCustomer, PaymentError> {
            self.customer_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ProviderCustomer {
                id: customer_id.to_string(),
            })
        }

        async fn create_subscription(
            &self,
            _customer_id: &str,
            _plan_id: &str,
        ) -> Result<ProviderSubscription, PaymentError> {
            self.subscription_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_subscription {
                return Err(PaymentError::Unavailable("timeout".into()));
            }
            Ok(ProviderSubscription { id: "sub_1".into() })
        }

        async fn list_invoices(
            &self,
            _customer_id: &str,
            limit: u32,
        ) -> Result<Vec<ProviderInvoice>, PaymentError> {
            self.invoice_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_invoices {
                return Err(PaymentError::Unavailable("timeout".into()));
            }
            Ok(self.invoices.iter().take(limit as usize).cloned().collect())
        }
    }

    type TestService = ParkingService<MockRepo, MockGateway>;

    fn service() -> TestService {
        ParkingService::new(MockRepo::new(), MockGateway::default())
    }

    fn signup(email: &str, mobile: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            password: "secret123".to_string(),
            mobile_number: mobile.to_string(),
            first_name: Some("Ada".into()),
            last_name: None,
            license_plate: Some("ABC123".into()),
            region: None,
            card_token: Some("tok_visa".into()),
        }
    }

    fn plan(charge: i64) -> ParkingPlan {
        ParkingPlan {
            id: PlanId::new(),
            plan_name: format!("Plan {}", charge),
            lot_id: 7,
            unit_charge_amount: Money::new(charge, Currency::CAD).unwrap(),
            created_at: Utc::now(),
        }
    }

    async fn eligible_plan(service: &TestService, email: &str, charge: i64) -> ParkingPlan {
        let plan = service.repo().create_plan(plan(charge)).await.unwrap();
        service
            .repo()
            .create_eligibility(PlanEligibleUser::new(email, plan.id))
            .await
            .unwrap();
        plan
    }

    async fn enable_stripe(service: &TestService) {
        service
            .repo()
            .set_config_value(STRIPE_ENABLED_KEY, "true")
            .await
            .unwrap();
    }

    async fn registered(service: &TestService, email: &str) -> User {
        service.register(signup(email, "5550100")).await.unwrap();
        service
            .repo()
            .find_user_by_login(email)
            .await
            .unwrap()
            .unwrap()
    }

    fn admin() -> User {
        User {
            id: UserId::new(),
            login: "admin@example.com".into(),
            password_hash: String::new(),
            first_name: None,
            last_name: None,
            mobile_number: "5550199".into(),
            license_plate: None,
            payment_token: None,
            region: None,
            authorities: vec![Authority::User, Authority::Admin],
            created_at: Utc::now(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_register_duplicate_login_is_rejected() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 0).await;
        service
            .register(signup("driver@example.com", "5550100"))
            .await
            .unwrap();

        let result = service
            .register(signup("driver@example.com", "5550111"))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Rejected(ErrorCode::RegisterUsernameTaken))
        ));
    }

    #[tokio::test]
    async fn test_register_duplicate_mobile_is_rejected() {
        let service = service();
        eligible_plan(&service, "a@example.com", 0).await;
        eligible_plan(&service, "b@example.com", 0).await;
        service
            .register(signup("a@example.com", "5550100"))
            .await
            .unwrap();

        let result = service.register(signup("b@example.com", "5550100")).await;

        assert!(matches!(
            result,
            Err(AppError::Rejected(ErrorCode::RegisterPhoneNumTaken))
        ));
        assert!(
            service
                .repo()
                .find_user_by_login("b@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_register_without_eligibility_is_rejected() {
        let service = service();

        let result = service
            .register(signup("driver@example.com", "5550100"))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Rejected(ErrorCode::RegisterPlanNotFound))
        ));
        assert_eq!(service.payments().calls(), 0);
    }

    #[tokio::test]
    async fn test_register_provider_failure_creates_no_user() {
        let service = ParkingService::new(
            MockRepo::new(),
            MockGateway {
                fail_customer: true,
                ..MockGateway::default()
            },
        );
        eligible_plan(&service, "driver@example.com", 1500).await;
        enable_stripe(&service).await;

        let result = service
            .register(signup("driver@example.com", "5550100"))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Rejected(ErrorCode::RegisterStripeFailed))
        ));
        assert!(
            service
                .repo()
                .find_user_by_login("driver@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_register_with_stripe_disabled_skips_provider() {
        let service = service();
        let free = eligible_plan(&service, "driver@example.com", 0).await;
        let paid = eligible_plan(&service, "driver@example.com", 1500).await;

        let plans = service
            .register(signup("driver@example.com", "5550100"))
            .await
            .unwrap();

        assert_eq!(plans.len(), 2);
        assert_eq!(service.payments().calls(), 0);
        let free_dto = plans.iter().find(|p| p.plan_id == free.id).unwrap();
        let paid_dto = plans.iter().find(|p| p.plan_id == paid.id).unwrap();
        assert!(free_dto.subscribed);
        assert!(!paid_dto.subscribed);

        let user = service
            .repo()
            .find_user_by_login("driver@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(user.payment_token.is_none());
        assert_eq!(user.authorities, vec![Authority::User]);
        assert_ne!(user.password_hash, "secret123");
    }

    #[tokio::test]
    async fn test_register_with_stripe_enabled_stores_customer() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 1500).await;
        enable_stripe(&service).await;

        let user = registered(&service, "driver@example.com").await;

        assert_eq!(user.payment_token.as_deref(), Some("cus_1"));
        assert_eq!(service.payments().customer_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_register_short_password_is_bad_request() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 0).await;

        let mut req = signup("driver@example.com", "5550100");
        req.password = "abc".into();
        let result = service.register(req).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_register_login_and_mobile_taken_reports_login() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 0).await;
        service
            .register(signup("driver@example.com", "5550100"))
            .await
            .unwrap();

        let result = service
            .register(signup("driver@example.com", "5550100"))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Rejected(ErrorCode::RegisterUsernameTaken))
        ));
    }

    #[tokio::test]
    async fn test_register_invalid_request_never_reaches_provider() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 1500).await;
        enable_stripe(&service).await;

        let mut req = signup("driver@example.com", "5550100");
        req.password = "abc".into();
        let result = service.register(req).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(service.payments().customer_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_register_subscription_failure_leaves_no_user() {
        let service = ParkingService::new(MockRepo::failing_subscriptions(), MockGateway::default());
        eligible_plan(&service, "driver@example.com", 0).await;

        let result = service
            .register(signup("driver@example.com", "5550100"))
            .await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert!(
            service
                .repo()
                .find_user_by_login("driver@example.com")
                .await
                .unwrap()
                .is_none()
        );
        let eligibility = service
            .repo()
            .eligibility_for_email("driver@example.com")
            .await
            .unwrap();
        assert!(eligibility.iter().all(|e| !e.subscribed));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Authentication & account
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_authenticate_issues_resolvable_token() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 0).await;
        let user = registered(&service, "driver@example.com").await;

        let token = service
            .authenticate(AuthenticateRequest {
                email: "driver@example.com".into(),
                password: "secret123".into(),
            })
            .await
            .unwrap();

        assert_eq!(token.token_type, "Bearer");
        let resolved = service
            .resolve_token(&token.access_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, user.id);
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password_is_unauthorized() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 0).await;
        registered(&service, "driver@example.com").await;

        let result = service
            .authenticate(AuthenticateRequest {
                email: "driver@example.com".into(),
                password: "wrong-password".into(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_update_account_requires_user_role() {
        let service = service();
        let mut user = admin();
        user.authorities = vec![Authority::Admin];

        let result = service
            .update_account(&user, UpdateAccountRequest::default())
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_change_password_rejects_missing_or_short() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 0).await;
        let user = registered(&service, "driver@example.com").await;

        let missing = service
            .change_password(&user, PasswordUpdateRequest { password: None })
            .await;
        let short = service
            .change_password(
                &user,
                PasswordUpdateRequest {
                    password: Some("abc".into()),
                },
            )
            .await;

        assert!(matches!(missing, Err(AppError::BadRequest(_))));
        assert!(matches!(short, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_save_log_failure_maps_to_fixed_code() {
        let service = ParkingService::new(MockRepo::failing_logs(), MockGateway::default());

        let result = service
            .save_log(
                &admin(),
                LogRequest {
                    log_event: Some(vec!["crash".into()]),
                },
            )
            .await;

        assert!(matches!(
            result,
            Err(AppError::Rejected(ErrorCode::LogMessageFailed))
        ));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_subscribe_already_subscribed_skips_provider() {
        let service = service();
        let free = eligible_plan(&service, "driver@example.com", 0).await;
        let user = registered(&service, "driver@example.com").await;

        let resp = service.subscribe_plan(&user, free.id).await.unwrap();

        assert_eq!(resp.status, SubscribeStatus::AlreadySubscribed);
        assert_eq!(resp.message, "Already Subscribed");
        assert_eq!(service.payments().calls(), 0);
    }

    #[tokio::test]
    async fn test_subscribe_without_payment_profile_fails() {
        let service = service();
        let paid = eligible_plan(&service, "driver@example.com", 1500).await;
        let user = registered(&service, "driver@example.com").await;

        let result = service.subscribe_plan(&user, paid.id).await;

        assert!(matches!(result, Err(AppError::PaymentProvider(_))));
        assert_eq!(service.payments().subscription_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_subscribe_records_subscription() {
        let service = service();
        let paid = eligible_plan(&service, "driver@example.com", 1500).await;
        enable_stripe(&service).await;
        let user = registered(&service, "driver@example.com").await;

        let resp = service.subscribe_plan(&user, paid.id).await.unwrap();

        assert_eq!(resp.status, SubscribeStatus::Subscribed);
        assert_eq!(resp.subscription_id.as_deref(), Some("sub_1"));
        let stored = service
            .repo()
            .find_subscription(user.id, paid.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.provider_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(stored.payment_profile_id.as_deref(), Some("cus_1"));
        let plans = service.eligible_plans(&user).await.unwrap();
        assert!(plans.iter().all(|p| p.subscribed));
    }

    #[tokio::test]
    async fn test_subscribe_provider_failure_stores_nothing() {
        let service = ParkingService::new(
            MockRepo::new(),
            MockGateway {
                fail_subscription: true,
                ..MockGateway::default()
            },
        );
        let paid = eligible_plan(&service, "driver@example.com", 1500).await;
        enable_stripe(&service).await;
        let user = registered(&service, "driver@example.com").await;

        let result = service.subscribe_plan(&user, paid.id).await;

        assert!(matches!(result, Err(AppError::PaymentProvider(msg)) if msg == "Subscribe Failed"));
        assert!(
            service
                .repo()
                .find_subscription(user.id, paid.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_subscribe_free_plan_skips_provider() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 1500).await;
        let user = registered(&service, "driver@example.com").await;
        let free = eligible_plan(&service, "driver@example.com", 0).await;

        let resp = service.subscribe_plan(&user, free.id).await.unwrap();

        assert_eq!(resp.status, SubscribeStatus::Subscribed);
        assert!(resp.subscription_id.is_none());
        assert_eq!(service.payments().calls(), 0);
        let stored = service
            .repo()
            .find_subscription(user.id, free.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.provider_subscription_id.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_unknown_plan_is_not_found() {
        let service = service();
        let result = service.subscribe_plan(&admin(), PlanId::new()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Sales
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_sale_with_subscription_splits_fee_and_attaches_invoice() {
        let service = ParkingService::new(
            MockRepo::new(),
            MockGateway {
                invoices: vec![
                    ProviderInvoice {
                        id: "in_other".into(),
                        subscription: Some("sub_other".into()),
                    },
                    ProviderInvoice {
                        id: "in_1".into(),
                        subscription: Some("sub_1".into()),
                    },
                ],
                ..MockGateway::default()
            },
        );
        let paid = eligible_plan(&service, "driver@example.com", 1000).await;
        enable_stripe(&service).await;
        let user = registered(&service, "driver@example.com").await;
        service.subscribe_plan(&user, paid.id).await.unwrap();

        let sale = service
            .create_sale(&user, CreateSaleRequest { plan_id: paid.id })
            .await
            .unwrap();

        assert_eq!(sale.charge_amount, Some(1000));
        assert_eq!(sale.service_amount, Some(100));
        assert_eq!(sale.net_amount, Some(900));
        assert_eq!(sale.invoice_id.as_deref(), Some("in_1"));
        assert_eq!(sale.payment_profile_id.as_deref(), Some("cus_1"));
        assert!(sale.entry_datetime.is_none());
    }

    #[tokio::test]
    async fn test_sale_invoice_lookup_failure_is_ignored() {
        let service = ParkingService::new(
            MockRepo::new(),
            MockGateway {
                fail_invoices: true,
                ..MockGateway::default()
            },
        )
        .with_service_fee(500);
        let paid = eligible_plan(&service, "driver@example.com", 1000).await;
        enable_stripe(&service).await;
        let user = registered(&service, "driver@example.com").await;
        service.subscribe_plan(&user, paid.id).await.unwrap();

        let sale = service
            .create_sale(&user, CreateSaleRequest { plan_id: paid.id })
            .await
            .unwrap();

        assert!(sale.invoice_id.is_none());
        assert_eq!(sale.service_amount, Some(50));
        assert_eq!(sale.net_amount, Some(950));
    }

    #[tokio::test]
    async fn test_sale_for_plan_user_is_free_entry() {
        let service = service();
        let free = eligible_plan(&service, "driver@example.com", 0).await;
        let user = registered(&service, "driver@example.com").await;

        let sale = service
            .create_sale(&user, CreateSaleRequest { plan_id: free.id })
            .await
            .unwrap();

        assert_eq!(sale.charge_amount, Some(0));
        assert_eq!(sale.parking_status, Some(ParkingStatus::Parked));
        assert!(sale.entry_datetime.is_some());
        assert_eq!(service.payments().invoice_calls.load(Ordering::SeqCst), 0);

        let in_flight = service.find_in_flight_sale_activities(&user).await.unwrap();
        assert_eq!(in_flight.len(), 1);
    }

    #[tokio::test]
    async fn test_list_sales_range_requires_admin() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 0).await;
        let user = registered(&service, "driver@example.com").await;
        let query = SaleQuery {
            from: Some(Utc::now() - chrono::Duration::hours(1)),
            to: Some(Utc::now()),
            ..SaleQuery::default()
        };

        let as_user = service.list_sales(&user, query).await;
        let as_admin = service.list_sales(&admin(), query).await;

        assert!(matches!(as_user, Err(AppError::Forbidden(_))));
        assert!(as_admin.is_ok());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Activities
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_exit_parking_by_holder_marks_exited() {
        let service = service();
        let driver = admin();
        let started = service
            .start_parking(&driver, StartParkingRequest { lot_id: 7 })
            .await
            .unwrap();

        let exited = service.exit_parking(&driver, started.id).await.unwrap();

        assert_eq!(exited.status, ParkingStatus::Exited);
        assert!(exited.exit_datetime.is_some());
    }

    #[tokio::test]
    async fn test_exit_parking_by_stranger_is_forbidden() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 0).await;
        let driver = registered(&service, "driver@example.com").await;
        let started = service
            .start_parking(&admin(), StartParkingRequest { lot_id: 7 })
            .await
            .unwrap();

        let result = service.exit_parking(&driver, started.id).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_search_activities_requires_criteria_and_admin() {
        let service = service();
        eligible_plan(&service, "driver@example.com", 0).await;
        let driver = registered(&service, "driver@example.com").await;
        service
            .start_parking(&driver, StartParkingRequest { lot_id: 9 })
            .await
            .unwrap();

        let forbidden = service
            .search_activities(
                &driver,
                ActivityQuery {
                    lot_id: Some(9),
                    ..ActivityQuery::default()
                },
            )
            .await;
        let empty = service
            .search_activities(&admin(), ActivityQuery::default())
            .await;
        let by_lot = service
            .search_activities(
                &admin(),
                ActivityQuery {
                    lot_id: Some(9),
                    status: Some(ParkingStatus::Exited),
                    ..ActivityQuery::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(forbidden, Err(AppError::Forbidden(_))));
        assert!(matches!(empty, Err(AppError::BadRequest(_))));
        // lot criteria wins over status
        assert_eq!(by_lot.len(), 1);
    }

    #[tokio::test]
    async fn test_list_activities_clamps_page_size() {
        let service = service();
        let driver = admin();
        for _ in 0..3 {
            service
                .start_parking(&driver, StartParkingRequest { lot_id: 7 })
                .await
                .unwrap();
        }

        let page = service
            .list_activities(
                &driver,
                parking_types::PageQuery {
                    page: Some(0),
                    size: Some(0),
                },
            )
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 3);
    }
}
