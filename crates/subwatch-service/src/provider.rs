//! Payment provider port.
//!
//! Everything subwatch needs from the payment provider goes through
//! [`PaymentProvider`]. The service holds it as `Arc<dyn PaymentProvider>`, so
//! tests swap in a fake and production wires up [`crate::StripeClient`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use serde::Serialize;

use subwatch_core::{
    BillingEvent, CustomerId, Metadata, PaymentStatus, SubscriptionId, SubscriptionStatus,
};

/// Errors from payment provider calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider returned an error.
    #[error("provider API error: {error_type} - {message}")]
    Api {
        /// Error type.
        error_type: String,
        /// Error message.
        message: String,
        /// Error code.
        code: Option<String>,
    },

    /// The requested object doesn't exist (or was deleted).
    #[error("{object} not found: {id}")]
    NotFound {
        /// Object kind.
        object: &'static str,
        /// Requested id.
        id: String,
    },

    /// The provider answered with something we can't use.
    #[error("unexpected provider response: {0}")]
    UnexpectedResponse(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Webhook signature header missing.
    #[error("missing webhook signature")]
    MissingSignature,

    /// Invalid webhook signature.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// Webhook payload can't be decoded.
    #[error("malformed webhook payload: {0}")]
    MalformedEvent(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ProviderError {
    /// Whether the error means the inbound webhook itself is bad.
    #[must_use]
    pub fn is_rejected_webhook(&self) -> bool {
        matches!(
            self,
            Self::MissingSignature | Self::InvalidSignature | Self::MalformedEvent(_)
        )
    }
}

/// A provider customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCustomer {
    /// Provider customer id.
    pub id: CustomerId,
    /// Customer email.
    pub email: Option<String>,
    /// Customer metadata.
    pub metadata: Metadata,
}

/// A provider subscription, as listed for a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSubscription {
    /// Subscription id.
    pub id: SubscriptionId,
    /// Provider status.
    pub status: SubscriptionStatus,
    /// Whether it ends at the close of the current period.
    pub cancel_at_period_end: bool,
    /// End of the current period.
    pub current_period_end: Option<DateTime<Utc>>,
}

/// Parameters for a subscription checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Customer paying for the subscription.
    pub customer_id: CustomerId,
    /// Provider price id of the plan.
    pub price_id: String,
    /// Coupon to apply.
    pub coupon_id: Option<String>,
    /// Trial length.
    pub trial_period_days: Option<u32>,
    /// Redirect after payment.
    pub success_url: String,
    /// Redirect when the customer backs out.
    pub cancel_url: String,
}

/// A created checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Session id.
    pub id: String,
    /// Hosted checkout URL.
    pub url: Option<String>,
}

/// A scheduled cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationScheduled {
    /// The subscription being cancelled.
    pub subscription_id: SubscriptionId,
    /// When the subscription ends.
    pub cancel_at: DateTime<Utc>,
}

/// A verified, not yet decoded, provider webhook event.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEvent {
    /// Event id.
    pub id: String,
    /// Provider event type (e.g. `invoice.payment_failed`).
    pub kind: String,
    /// Creation time (Unix seconds).
    pub created: i64,
    /// The object the event is about.
    pub object: serde_json::Value,
}

/// Port for the payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Find the first customer with this email.
    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ProviderCustomer>, ProviderError>;

    /// Create a customer with this email.
    async fn create_customer(&self, email: &str) -> Result<ProviderCustomer, ProviderError>;

    /// Fetch a customer by id.
    async fn retrieve_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<ProviderCustomer, ProviderError>;

    /// Write metadata keys on a customer. Keys not in `metadata` are left alone.
    async fn update_customer_metadata(
        &self,
        customer_id: &CustomerId,
        metadata: &Metadata,
    ) -> Result<ProviderCustomer, ProviderError>;

    /// Subscriptions of a customer, newest first.
    async fn list_subscriptions(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<ProviderSubscription>, ProviderError>;

    /// Schedule cancellation at the end of the current period.
    async fn cancel_subscription_at_period_end(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<CancellationScheduled, ProviderError>;

    /// Create a hosted checkout session in subscription mode.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ProviderError>;

    /// Payment status of an invoice.
    async fn invoice_payment_status(&self, invoice_id: &str)
        -> Result<PaymentStatus, ProviderError>;

    /// Verify a webhook signature and parse the envelope.
    fn verify_webhook(
        &self,
        payload: &str,
        signature: Option<&str>,
    ) -> Result<ProviderEvent, ProviderError>;

    /// Reduce a verified event to a [`BillingEvent`].
    async fn decode_event(&self, event: &ProviderEvent) -> Result<BillingEvent, ProviderError>;
}
