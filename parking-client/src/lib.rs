//! # Parking Client SDK
//!
//! A typed Rust client for the Parking API.

use parking_types::{
    ActivityId, ActivityPageResponse, ActivityQuery, ActivityResponse, AuthenticateRequest,
    CreateSaleRequest, CreateUserRequest, LogRequest, PageQuery, PasswordUpdateRequest, PlanId,
    PlanResponse, SaleActivityResponse, SaleQuery, StartParkingRequest, SubscribeResponse,
    TokenResponse, UpdateAccountRequest, UpdateActivityRequest, UserResponse,
};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const DEFAULT_API_VERSION: &str = "v1";

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// `code` carries the API's fixed error code (1001-1004, -1) when present.
    #[error("API error: {status} - {message}")]
    Api {
        status: u16,
        code: Option<i64>,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parking API client.
pub struct ParkingClient {
    base_url: String,
    api_version: String,
    token: Option<String>,
    http: Client,
}

impl ParkingClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token: None,
            http: Client::new(),
        }
    }

    /// Sets the bearer token for authentication.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Registers an account and returns the eligible plans.
    pub async fn register(&self, req: &CreateUserRequest) -> Result<Vec<PlanResponse>, ClientError> {
        self.post("register", req).await
    }

    /// Exchanges credentials for a token. Does not store it on the client.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<TokenResponse, ClientError> {
        let req = AuthenticateRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post("authenticate", &req).await
    }

    pub async fn account(&self) -> Result<UserResponse, ClientError> {
        self.get("account", &()).await
    }

    pub async fn update_account(&self, req: &UpdateAccountRequest) -> Result<(), ClientError> {
        self.post_empty("account", req).await
    }

    pub async fn change_password(&self, password: &str) -> Result<(), ClientError> {
        let req = PasswordUpdateRequest {
            password: Some(password.to_string()),
        };
        self.post_empty("account/change_password", &req).await
    }

    pub async fn log_message(&self, events: Vec<String>) -> Result<(), ClientError> {
        let req = LogRequest {
            log_event: Some(events),
        };
        self.post_empty("logMessage", &req).await
    }

    pub async fn plans(&self) -> Result<Vec<PlanResponse>, ClientError> {
        self.get("plans", &()).await
    }

    pub async fn subscribe(&self, plan_id: PlanId) -> Result<SubscribeResponse, ClientError> {
        self.post(&format!("plans/{}/subscribe", plan_id), &()).await
    }

    pub async fn activities(&self, query: &PageQuery) -> Result<ActivityPageResponse, ClientError> {
        self.get("activities", query).await
    }

    pub async fn start_parking(&self, lot_id: i64) -> Result<ActivityResponse, ClientError> {
        self.post("activities", &StartParkingRequest { lot_id })
            .await
    }

    pub async fn exit_parking(&self, id: ActivityId) -> Result<ActivityResponse, ClientError> {
        self.post(&format!("activities/{}/exit", id), &()).await
    }

    /// Admin: set status, gate response or exception flag.
    pub async fn update_activity(
        &self,
        id: ActivityId,
        req: &UpdateActivityRequest,
    ) -> Result<ActivityResponse, ClientError> {
        self.post(&format!("activities/{}/status", id), req).await
    }

    /// Admin: search activities.
    pub async fn search_activities(
        &self,
        query: &ActivityQuery,
    ) -> Result<Vec<ActivityResponse>, ClientError> {
        self.get("activities/search", query).await
    }

    pub async fn sales(&self, query: &SaleQuery) -> Result<Vec<SaleActivityResponse>, ClientError> {
        self.get("sales", query).await
    }

    pub async fn create_sale(&self, plan_id: PlanId) -> Result<SaleActivityResponse, ClientError> {
        self.post("sales", &CreateSaleRequest { plan_id }).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, self.api_version, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, ClientError> {
        let req = self.authorize(self.http.get(self.url(path)).query(query));
        let resp = Self::check(req.send().await?).await?;
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let req = self.authorize(self.http.post(self.url(path)).json(body));
        let resp = Self::check(req.send().await?).await?;
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_empty<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), ClientError> {
        let req = self.authorize(self.http.post(self.url(path)).json(body));
        Self::check(req.send().await?).await?;
        Ok(())
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<serde_json::Value>(&body).ok();
        let code = parsed
            .as_ref()
            .and_then(|v| v.get("code"))
            .and_then(|c| c.as_i64());
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or(body);
        Err(ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }
}
