//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use parking_types::{
        AccessToken, ActivityId, Authority, Currency, ExceptionLog, Money, ParkingActivity,
        ParkingPlan, ParkingRepository, ParkingSaleActivity, ParkingStatus, PlanEligibleUser,
        PlanId, PlanSubscription, RepoError, SaleActivityId, User, UserId,
    };

    use crate::SqliteRepo;
    use crate::security::hash_access_token;

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:").await.unwrap()
    }

    fn user(login: &str, mobile: &str) -> User {
        User {
            id: UserId::new(),
            login: login.to_string(),
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
            mobile_number: mobile.to_string(),
            license_plate: Some("ABC123".to_string()),
            payment_token: None,
            region: None,
            authorities: vec![Authority::User],
            created_at: Utc::now(),
        }
    }

    fn plan(charge: i64) -> ParkingPlan {
        ParkingPlan {
            id: PlanId::new(),
            plan_name: "Monthly".to_string(),
            lot_id: 7,
            unit_charge_amount: Money::new(charge, Currency::CAD).unwrap(),
            created_at: Utc::now(),
        }
    }

    fn activity_at(holder: UserId, minutes_ago: i64, status: ParkingStatus) -> ParkingActivity {
        ParkingActivity {
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            status,
            ..ParkingActivity::enter(holder, 7)
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_repo().await;
        let created = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();

        let fetched = repo.get_user(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.login, "driver@example.com");
        assert_eq!(fetched.authorities, vec![Authority::User]);
        assert_eq!(fetched.license_plate.as_deref(), Some("ABC123"));
    }

    #[tokio::test]
    async fn test_find_user_by_login_and_mobile() {
        let repo = setup_repo().await;
        repo.create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();

        assert!(
            repo.find_user_by_login("driver@example.com")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            repo.find_user_by_mobile_number("5550100")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            repo.find_user_by_login("other@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_duplicate_mobile_is_conflict() {
        let repo = setup_repo().await;
        repo.create_user(user("a@example.com", "5550100"), Vec::new())
            .await
            .unwrap();

        let err = repo
            .create_user(user("b@example.com", "5550100"), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_user_information() {
        let repo = setup_repo().await;
        let created = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();

        repo.update_user_information(
            created.id,
            Some("Ada".into()),
            Some("Lovelace".into()),
            Some("ON".into()),
        )
        .await
        .unwrap();

        let fetched = repo.get_user(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.first_name.as_deref(), Some("Ada"));
        assert_eq!(fetched.region.as_deref(), Some("ON"));
    }

    #[tokio::test]
    async fn test_update_unknown_user_is_not_found() {
        let repo = setup_repo().await;
        let err = repo
            .update_password_hash(UserId::new(), "new")
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn test_token_lookup_resolves_user() {
        let repo = setup_repo().await;
        let created = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();
        let hash = hash_access_token("pk_test");
        repo.create_access_token(AccessToken::new(created.id, hash.clone()))
            .await
            .unwrap();

        let found = repo.find_user_by_token_hash(&hash).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(
            repo.find_user_by_token_hash("unknown")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_record_subscription_flips_eligibility() {
        let repo = setup_repo().await;
        let driver = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();
        let plan = repo.create_plan(plan(1500)).await.unwrap();
        repo.create_eligibility(PlanEligibleUser::new("driver@example.com", plan.id))
            .await
            .unwrap();

        let sub = PlanSubscription::with_provider(driver.id, &plan, "sub_1".into(), None);
        repo.record_subscription(sub, "driver@example.com")
            .await
            .unwrap();

        let eligibility = repo
            .eligibility_for_email("driver@example.com")
            .await
            .unwrap();
        assert_eq!(eligibility.len(), 1);
        assert!(eligibility[0].subscribed);

        let stored = repo
            .find_subscription(driver.id, plan.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.provider_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(stored.plan_charge_amount.amount(), 1500);
    }

    #[tokio::test]
    async fn test_record_subscription_without_eligibility_stores_nothing() {
        let repo = setup_repo().await;
        let driver = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();
        let plan = repo.create_plan(plan(0)).await.unwrap();

        let err = repo
            .record_subscription(
                PlanSubscription::automatic(driver.id, &plan),
                "driver@example.com",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound));
        assert!(
            repo.find_subscription(driver.id, plan.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_create_user_with_subscriptions_is_atomic() {
        let repo = setup_repo().await;
        let free = repo.create_plan(plan(0)).await.unwrap();
        let unlisted = repo.create_plan(plan(0)).await.unwrap();
        repo.create_eligibility(PlanEligibleUser::new("driver@example.com", free.id))
            .await
            .unwrap();

        let driver = user("driver@example.com", "5550100");
        let err = repo
            .create_user(
                driver.clone(),
                vec![
                    PlanSubscription::automatic(driver.id, &free),
                    PlanSubscription::automatic(driver.id, &unlisted),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, RepoError::NotFound));
        assert!(repo.get_user(driver.id).await.unwrap().is_none());
        assert!(
            repo.find_subscription(driver.id, free.id)
                .await
                .unwrap()
                .is_none()
        );
        let eligibility = repo
            .eligibility_for_email("driver@example.com")
            .await
            .unwrap();
        assert!(!eligibility[0].subscribed);

        repo.create_user(
            driver.clone(),
            vec![PlanSubscription::automatic(driver.id, &free)],
        )
        .await
        .unwrap();

        let eligibility = repo
            .eligibility_for_email("driver@example.com")
            .await
            .unwrap();
        assert!(eligibility[0].subscribed);
        assert!(
            repo.find_subscription(driver.id, free.id)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_between_excludes_both_bounds() {
        let repo = setup_repo().await;
        let driver = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();
        let start = Utc::now() - Duration::minutes(30);
        let end = start + Duration::minutes(20);

        let mut inside = None;
        for created_at in [start, start + Duration::minutes(10), end] {
            let stored = repo
                .create_activity(ParkingActivity {
                    created_at,
                    ..ParkingActivity::enter(driver.id, 7)
                })
                .await
                .unwrap();
            if created_at > start && created_at < end {
                inside = Some(stored.id);
            }
        }

        let window = repo.activities_between(start, end).await.unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(Some(window[0].id), inside);

        let for_user = repo
            .activities_between_for_user(start, end, driver.id)
            .await
            .unwrap();
        assert_eq!(for_user.len(), 1);

        let parked = repo
            .activities_by_status_between(start, end, ParkingStatus::Parked)
            .await
            .unwrap();
        assert_eq!(parked.len(), 1);
    }

    #[tokio::test]
    async fn test_activity_queries() {
        let repo = setup_repo().await;
        let driver = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();

        let old = repo
            .create_activity(activity_at(driver.id, 120, ParkingStatus::Exited))
            .await
            .unwrap();
        let recent = repo
            .create_activity(activity_at(driver.id, 5, ParkingStatus::Parked))
            .await
            .unwrap();

        let latest = repo
            .latest_activity_for_user(driver.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, recent.id);

        let window = repo
            .activities_between(Utc::now() - Duration::minutes(60), Utc::now())
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].id, recent.id);

        let exited = repo
            .activities_by_status(ParkingStatus::Exited)
            .await
            .unwrap();
        assert_eq!(exited.len(), 1);
        assert_eq!(exited[0].id, old.id);

        let parked = repo
            .activity_for_user_with_status(driver.id, ParkingStatus::Parked)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parked.id, recent.id);

        assert_eq!(repo.activities_for_lot(7).await.unwrap().len(), 2);
        assert!(repo.activities_for_lot(8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activity_paging() {
        let repo = setup_repo().await;
        let driver = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();
        for minutes in 1..=5 {
            repo.create_activity(activity_at(driver.id, minutes, ParkingStatus::Exited))
                .await
                .unwrap();
        }

        let first = repo
            .activities_page_for_user(driver.id, 0, 2)
            .await
            .unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.items.len(), 2);

        let last = repo
            .activities_page_for_user(driver.id, 2, 2)
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
    }

    #[tokio::test]
    async fn test_activity_field_updates() {
        let repo = setup_repo().await;
        let driver = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();
        let activity = repo
            .create_activity(ParkingActivity::enter(driver.id, 7))
            .await
            .unwrap();

        repo.set_activity_status(activity.id, ParkingStatus::PendingExit)
            .await
            .unwrap();
        repo.set_gate_response(activity.id, "OPEN").await.unwrap();
        repo.set_exception_flag(activity.id, "NO_EXIT_SCAN")
            .await
            .unwrap();
        repo.set_exit_time(activity.id, Utc::now()).await.unwrap();

        let fetched = repo.get_activity(activity.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ParkingStatus::PendingExit);
        assert_eq!(fetched.gate_response.as_deref(), Some("OPEN"));
        assert_eq!(fetched.exception_flag.as_deref(), Some("NO_EXIT_SCAN"));
        assert!(fetched.exit_datetime.is_some());

        let err = repo
            .set_activity_status(ActivityId::new(), ParkingStatus::Exited)
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn test_record_exit_sets_time_and_status_together() {
        let repo = setup_repo().await;
        let driver = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();
        let activity = repo
            .create_activity(ParkingActivity::enter(driver.id, 7))
            .await
            .unwrap();

        repo.record_exit(activity.id, Utc::now()).await.unwrap();

        let fetched = repo.get_activity(activity.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ParkingStatus::Exited);
        assert!(fetched.exit_datetime.is_some());

        let err = repo
            .record_exit(ActivityId::new(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn test_sale_activity_round_trip() {
        let repo = setup_repo().await;
        let driver = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();
        let now = Utc::now();
        let charge = Money::new(1000, Currency::USD).unwrap();
        let (service, net) = charge.split_fee(1000);

        let sale = ParkingSaleActivity {
            id: SaleActivityId::new(),
            holder: driver.id,
            lot_id: 7,
            plan_id: PlanId::new(),
            plan_name: "Monthly".into(),
            user_email: driver.login.clone(),
            user_phone_number: driver.mobile_number.clone(),
            user_license_plate: driver.license_plate.clone(),
            plan_subscription_date: Some(now),
            plan_expiry_date: None,
            charge_amount: Some(charge),
            service_amount: Some(service),
            net_amount: Some(net),
            payment_profile_id: Some("cus_1".into()),
            entry_datetime: None,
            exit_datetime: None,
            parking_status: None,
            exception_flag: None,
            invoice_id: Some("in_1".into()),
            created_at: now,
        };
        repo.create_sale_activity(sale).await.unwrap();

        let stored = repo.sale_activities_for_user(driver.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].charge_amount, Some(charge));
        assert_eq!(stored[0].service_amount.map(|m| m.amount()), Some(100));
        assert_eq!(stored[0].net_amount.map(|m| m.currency()), Some(Currency::USD));
        assert_eq!(stored[0].invoice_id.as_deref(), Some("in_1"));

        let window = repo
            .sale_activities_between(now - Duration::seconds(1), now + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
    }

    #[tokio::test]
    async fn test_exception_log_and_config() {
        let repo = setup_repo().await;
        let driver = repo
            .create_user(user("driver@example.com", "5550100"), Vec::new())
            .await
            .unwrap();

        let log = ExceptionLog::from_events(driver.id, &["boom".to_string()]);
        let stored = repo.create_exception_log(log).await.unwrap();
        assert_eq!(stored.log_message, "boom\n");

        assert!(
            repo.get_config_value("STRIPE_ENABLED")
                .await
                .unwrap()
                .is_none()
        );
        repo.set_config_value("STRIPE_ENABLED", "true")
            .await
            .unwrap();
        repo.set_config_value("STRIPE_ENABLED", "false")
            .await
            .unwrap();
        assert_eq!(
            repo.get_config_value("STRIPE_ENABLED")
                .await
                .unwrap()
                .as_deref(),
            Some("false")
        );
    }
}
