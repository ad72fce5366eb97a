//! # Parking Stripe
//!
//! Minimal Stripe client built on reqwest, implementing the `PaymentGateway` port.
//! Only the four calls the parking service needs are exposed: customer
//! creation and lookup, subscription creation, and invoice listing.

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{error, instrument};

use parking_types::{
    PaymentError, PaymentGateway, ProviderCustomer, ProviderInvoice, ProviderSubscription,
};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeCustomer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeSubscription {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeInvoice {
    id: String,
    subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeList<T> {
    data: Vec<T>,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_api_base(secret_key, DEFAULT_API_BASE)
    }

    /// Points the client at a different host (test doubles, proxies).
    pub fn with_api_base(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds `{api_base}/v1/{segments..}`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Result<Url, PaymentError> {
        let invalid = || PaymentError::Unavailable(format!("invalid api base {}", self.api_base));
        let mut url = Url::parse(&self.api_base).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push("v1")
            .extend(segments);
        Ok(url)
    }

    fn get(&self, segments: &[&str]) -> Result<reqwest::RequestBuilder, PaymentError> {
        Ok(self
            .http
            .get(self.url(segments)?)
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key)))
    }

    fn post_form(
        &self,
        segments: &[&str],
        body: &[(&str, String)],
    ) -> Result<reqwest::RequestBuilder, PaymentError> {
        Ok(self
            .http
            .post(self.url(segments)?)
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body))
    }

    async fn send<T: serde::de::DeserializeOwned>(
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T, PaymentError> {
        let resp = request
            .send()
            .await
            .map_err(|e| PaymentError::Unavailable(format!("{}: {}", context, e)))?;
        let resp = Self::ensure_success(resp, context).await?;
        resp.json()
            .await
            .map_err(|e| PaymentError::InvalidResponse(format!("{}: {}", context, e)))
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, PaymentError> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);
        let message = details
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_else(|| format!("status {}", status));

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            response_body = %body,
            context = %context,
            "stripe api request failed"
        );

        if status.is_server_error() {
            Err(PaymentError::Unavailable(format!("{}: {}", context, message)))
        } else {
            Err(PaymentError::Rejected(format!("{}: {}", context, message)))
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self, card_token))]
    async fn create_customer(
        &self,
        email: &str,
        card_token: Option<&str>,
    ) -> Result<ProviderCustomer, PaymentError> {
        // https://stripe.com/docs/api/customers/create
        let mut body = vec![("email", email.to_string())];
        if let Some(token) = card_token {
            body.push(("source", token.to_string()));
        }

        let customer: StripeCustomer =
            Self::send(self.post_form(&["customers"], &body)?, "create customer").await?;
        Ok(ProviderCustomer { id: customer.id })
    }

    #[instrument(skip(self))]
    async fn retrieve_customer(&self, customer_id: &str) -> Result<ProviderCustomer, PaymentError> {
        let customer: StripeCustomer =
            Self::send(self.get(&["customers", customer_id])?, "retrieve customer").await?;
        Ok(ProviderCustomer { id: customer.id })
    }

    #[instrument(skip(self))]
    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
    ) -> Result<ProviderSubscription, PaymentError> {
        // https://stripe.com/docs/api/subscriptions/create
        let body = [
            ("customer", customer_id.to_string()),
            ("items[0][plan]", plan_id.to_string()),
        ];

        let sub: StripeSubscription =
            Self::send(self.post_form(&["subscriptions"], &body)?, "create subscription").await?;
        Ok(ProviderSubscription { id: sub.id })
    }

    #[instrument(skip(self))]
    async fn list_invoices(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<ProviderInvoice>, PaymentError> {
        let request = self.get(&["invoices"])?.query(&[
            ("customer", customer_id.to_string()),
            ("limit", limit.to_string()),
        ]);

        let list: StripeList<StripeInvoice> = Self::send(request, "list invoices").await?;
        Ok(list
            .data
            .into_iter()
            .map(|invoice| ProviderInvoice {
                id: invoice.id,
                subscription: invoice.subscription,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client() -> (MockServer, StripeClient) {
        let server = MockServer::start().await;
        let client = StripeClient::with_api_base("sk_test_123", server.uri());
        (server, client)
    }

    #[tokio::test]
    async fn test_create_customer_sends_email_and_source() {
        let (server, client) = client().await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(body_string_contains("email=driver%40example.com"))
            .and(body_string_contains("source=tok_visa"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "cus_1", "email": "driver@example.com"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let customer = client
            .create_customer("driver@example.com", Some("tok_visa"))
            .await
            .unwrap();
        assert_eq!(customer.id, "cus_1");
    }

    #[tokio::test]
    async fn test_create_subscription_posts_plan_item() {
        let (server, client) = client().await;
        Mock::given(method("POST"))
            .and(path("/v1/subscriptions"))
            .and(body_string_contains("customer=cus_1"))
            .and(body_string_contains("items%5B0%5D%5Bplan%5D=plan_9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"id": "sub_1", "customer": "cus_1", "status": "active"}),
            ))
            .mount(&server)
            .await;

        let sub = client.create_subscription("cus_1", "plan_9").await.unwrap();
        assert_eq!(sub.id, "sub_1");
    }

    #[tokio::test]
    async fn test_list_invoices_passes_customer_and_limit() {
        let (server, client) = client().await;
        Mock::given(method("GET"))
            .and(path("/v1/invoices"))
            .and(query_param("customer", "cus_1"))
            .and(query_param("limit", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    {"id": "in_2", "subscription": "sub_other"},
                    {"id": "in_1", "subscription": "sub_1"},
                    {"id": "in_0", "subscription": null}
                ]
            })))
            .mount(&server)
            .await;

        let invoices = client.list_invoices("cus_1", 3).await.unwrap();
        assert_eq!(invoices.len(), 3);
        assert_eq!(invoices[1].subscription.as_deref(), Some("sub_1"));
        assert!(invoices[2].subscription.is_none());
    }

    #[tokio::test]
    async fn test_client_error_is_rejected() {
        let (server, client) = client().await;
        Mock::given(method("GET"))
            .and(path("/v1/customers/cus_missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"type": "invalid_request_error", "message": "No such customer"}
            })))
            .mount(&server)
            .await;

        let err = client.retrieve_customer("cus_missing").await.unwrap_err();
        assert!(matches!(err, PaymentError::Rejected(msg) if msg.contains("No such customer")));
    }

    #[tokio::test]
    async fn test_retrieve_customer_encodes_id() {
        let (server, client) = client().await;
        Mock::given(method("GET"))
            .and(path("/v1/customers/cus%2F..%2Fcharges"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cus_1"})))
            .expect(1)
            .mount(&server)
            .await;

        let customer = client.retrieve_customer("cus/../charges").await.unwrap();
        assert_eq!(customer.id, "cus_1");
    }

    #[tokio::test]
    async fn test_api_base_with_path_prefix() {
        let server = MockServer::start().await;
        let client = StripeClient::with_api_base("sk_test_123", format!("{}/stripe/", server.uri()));
        Mock::given(method("GET"))
            .and(path("/stripe/v1/customers/cus_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cus_1"})))
            .expect(1)
            .mount(&server)
            .await;

        client.retrieve_customer("cus_1").await.unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let (server, client) = client().await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client
            .create_customer("driver@example.com", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Unavailable(_)));
    }
}
