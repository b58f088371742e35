//! Stripe API types.
//!
//! Only the fields subwatch reads are modelled; Stripe sends many more.

use serde::Deserialize;

use subwatch_core::Metadata;

/// Stripe customer object.
#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    /// Stripe customer ID.
    pub id: String,
    /// Customer email.
    #[serde(default)]
    pub email: Option<String>,
    /// Metadata attached to the customer.
    #[serde(default)]
    pub metadata: Metadata,
    /// Set on the stub Stripe returns for a deleted customer.
    #[serde(default)]
    pub deleted: bool,
}

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID.
    pub id: String,
    /// Checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
}

/// Stripe subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    /// Subscription ID.
    pub id: String,
    /// Subscription status.
    #[serde(default)]
    pub status: Option<String>,
    /// Whether the subscription ends at period end.
    #[serde(default)]
    pub cancel_at_period_end: bool,
    /// Scheduled cancellation (Unix).
    #[serde(default)]
    pub cancel_at: Option<i64>,
    /// End of the current period (Unix).
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Stripe invoice object.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    /// Invoice status (draft, open, paid, uncollectible, void).
    #[serde(default)]
    pub status: Option<String>,
    /// Payment intent, as an ID or expanded object.
    #[serde(default)]
    pub payment_intent: Option<serde_json::Value>,
}

/// Stripe list response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "invoice.payment_failed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// Created timestamp (Unix).
    #[serde(default)]
    pub created: i64,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}
