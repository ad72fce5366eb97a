//! Payment provider port.
//!
//! The application only needs four calls from the provider: customer
//! creation and lookup, subscription creation, and recent invoices. Every
//! call is keyed by the customer id stored on the user.

/// Error type for payment provider operations.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider rejected the request: {0}")]
    Rejected(String),

    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected payment provider response: {0}")]
    InvalidResponse(String),
}

/// A customer record at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCustomer {
    pub id: String,
}

/// A subscription created at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSubscription {
    pub id: String,
}

/// An invoice issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInvoice {
    pub id: String,
    pub subscription: Option<String>,
}

/// Port trait for the hosted payment provider.
#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    /// Registers a customer; `card_token` attaches a payment source when present.
    async fn create_customer(
        &self,
        email: &str,
        card_token: Option<&str>,
    ) -> Result<ProviderCustomer, PaymentError>;

    async fn retrieve_customer(&self, customer_id: &str) -> Result<ProviderCustomer, PaymentError>;

    /// Subscribes a customer to a provider-side plan.
    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
    ) -> Result<ProviderSubscription, PaymentError>;

    /// Lists the most recent invoices for a customer, newest first.
    async fn list_invoices(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<ProviderInvoice>, PaymentError>;
}
