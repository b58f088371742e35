//! Billing events.
//!
//! A [`BillingEvent`] is a provider webhook already reduced to what the
//! reconciler needs. Decoding from the provider's wire format happens in the
//! service crate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{CustomerId, SubscriptionId};

/// Provider subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Awaiting the first payment.
    Incomplete,
    /// First payment never completed.
    IncompleteExpired,
    /// In a trial period.
    Trialing,
    /// Active and in good standing (as far as the provider's status goes).
    Active,
    /// Latest renewal payment failed.
    PastDue,
    /// Canceled.
    Canceled,
    /// Unpaid after retries.
    Unpaid,
    /// Paused.
    Paused,
    /// Anything this build doesn't know about.
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// Parse a provider status string. Unknown values map to [`Self::Unknown`].
    #[must_use]
    pub fn parse(status: &str) -> Self {
        match status {
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            "canceled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "paused" => Self::Paused,
            _ => Self::Unknown,
        }
    }
}

/// Payment status of a subscription's latest invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// The invoice is paid.
    Succeeded,
    /// A payment is in flight.
    Processing,
    /// The payment failed or the invoice can't be collected.
    Failed,
    /// No invoice, or a state we don't classify.
    Unknown,
}

impl PaymentStatus {
    /// Classify a payment-intent status.
    #[must_use]
    pub fn from_payment_intent(status: &str) -> Self {
        match status {
            "succeeded" => Self::Succeeded,
            "processing" => Self::Processing,
            "requires_payment_method" | "canceled" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Classify an invoice, preferring its own status when it is decisive.
    #[must_use]
    pub fn from_invoice(invoice_status: Option<&str>, intent_status: Option<&str>) -> Self {
        match invoice_status {
            Some("paid") => Self::Succeeded,
            Some("uncollectible" | "void") => Self::Failed,
            _ => intent_status.map_or(Self::Unknown, Self::from_payment_intent),
        }
    }

    /// Whether the payment went through.
    #[must_use]
    pub fn is_succeeded(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// A decoded billing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    /// An invoice payment failed.
    PaymentFailed {
        /// Affected customer.
        customer_id: CustomerId,
    },

    /// An invoice payment for a subscription succeeded.
    PaymentSucceeded {
        /// Affected customer.
        customer_id: CustomerId,
        /// The paid subscription.
        subscription_id: SubscriptionId,
    },

    /// A subscription ended.
    SubscriptionDeleted {
        /// Affected customer.
        customer_id: CustomerId,
        /// The deleted subscription.
        subscription_id: SubscriptionId,
    },

    /// A subscription changed.
    SubscriptionUpdated {
        /// Affected customer.
        customer_id: CustomerId,
        /// The changed subscription.
        subscription_id: SubscriptionId,
        /// New subscription status.
        status: SubscriptionStatus,
        /// Payment status of the latest invoice.
        payment_status: PaymentStatus,
    },

    /// Any other event kind. Acknowledged, never applied.
    Unrecognized {
        /// Provider event type.
        kind: String,
    },
}

impl BillingEvent {
    /// The customer the event is about, if any.
    #[must_use]
    pub fn customer_id(&self) -> Option<&CustomerId> {
        match self {
            Self::PaymentFailed { customer_id }
            | Self::PaymentSucceeded { customer_id, .. }
            | Self::SubscriptionDeleted { customer_id, .. }
            | Self::SubscriptionUpdated { customer_id, .. } => Some(customer_id),
            Self::Unrecognized { .. } => None,
        }
    }

    /// Short kind name for logs.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::PaymentFailed { .. } => "payment-failed",
            Self::PaymentSucceeded { .. } => "payment-succeeded",
            Self::SubscriptionDeleted { .. } => "subscription-deleted",
            Self::SubscriptionUpdated { .. } => "subscription-updated",
            Self::Unrecognized { kind } => kind,
        }
    }
}

impl fmt::Display for BillingEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.customer_id() {
            Some(customer_id) => write!(f, "{} ({customer_id})", self.kind()),
            None => f.write_str(self.kind()),
        }
    }
}
