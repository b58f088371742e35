//! Decoding Stripe webhook objects into billing events.

use serde_json::Value;

use subwatch_core::{BillingEvent, CustomerId, PaymentStatus, SubscriptionId, SubscriptionStatus};

use crate::provider::ProviderEvent;

/// Invoice payment failed.
pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";

/// Invoice payment succeeded.
pub const INVOICE_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";

/// Subscription deleted.
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// Subscription updated.
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";

/// A subscription's `latest_invoice` field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatestInvoice<'a> {
    /// Not present.
    Missing,
    /// Only the invoice ID; needs a lookup.
    Id(&'a str),
    /// Expanded invoice object.
    Expanded(&'a Value),
}

impl<'a> LatestInvoice<'a> {
    /// Read `latest_invoice` from a subscription object.
    #[must_use]
    pub fn of(subscription: &'a Value) -> Self {
        match subscription.get("latest_invoice") {
            Some(Value::String(id)) => Self::Id(id),
            Some(invoice @ Value::Object(_)) => Self::Expanded(invoice),
            _ => Self::Missing,
        }
    }
}

/// Payment status of an expanded invoice object.
#[must_use]
pub fn invoice_payment_status(invoice: &Value) -> PaymentStatus {
    let intent_status = invoice
        .get("payment_intent")
        .and_then(|pi| pi.get("status"))
        .and_then(Value::as_str);

    PaymentStatus::from_invoice(
        invoice.get("status").and_then(Value::as_str),
        intent_status,
    )
}

/// Status of a subscription object.
#[must_use]
pub fn subscription_status(subscription: &Value) -> SubscriptionStatus {
    subscription
        .get("status")
        .and_then(Value::as_str)
        .map_or(SubscriptionStatus::Unknown, SubscriptionStatus::parse)
}

/// Build the billing event for a Stripe event.
///
/// `payment_status` is only read for subscription updates; callers derive it
/// from the subscription's latest invoice. Recognized events missing the ids
/// they need come back as [`BillingEvent::Unrecognized`].
#[must_use]
pub fn billing_event(event: &ProviderEvent, payment_status: PaymentStatus) -> BillingEvent {
    let object = &event.object;

    let decoded = match event.kind.as_str() {
        INVOICE_PAYMENT_FAILED => {
            customer_id(object).map(|customer_id| BillingEvent::PaymentFailed { customer_id })
        }
        INVOICE_PAYMENT_SUCCEEDED => customer_id(object)
            .zip(invoice_subscription_id(object))
            .map(|(customer_id, subscription_id)| BillingEvent::PaymentSucceeded {
                customer_id,
                subscription_id,
            }),
        SUBSCRIPTION_DELETED => customer_id(object).zip(object_id(object)).map(
            |(customer_id, subscription_id)| BillingEvent::SubscriptionDeleted {
                customer_id,
                subscription_id,
            },
        ),
        SUBSCRIPTION_UPDATED => customer_id(object).zip(object_id(object)).map(
            |(customer_id, subscription_id)| BillingEvent::SubscriptionUpdated {
                customer_id,
                subscription_id,
                status: subscription_status(object),
                payment_status,
            },
        ),
        _ => {
            return BillingEvent::Unrecognized {
                kind: event.kind.clone(),
            }
        }
    };

    decoded.unwrap_or_else(|| {
        tracing::warn!(
            event_id = %event.id,
            event_type = %event.kind,
            "Stripe event is missing customer or subscription id, ignoring"
        );
        BillingEvent::Unrecognized {
            kind: event.kind.clone(),
        }
    })
}

/// `customer` as an ID or expanded object.
fn customer_id(object: &Value) -> Option<CustomerId> {
    let raw = match object.get("customer")? {
        Value::String(id) => id.as_str(),
        expanded => expanded.get("id")?.as_str()?,
    };
    raw.parse().ok()
}

fn object_id(object: &Value) -> Option<SubscriptionId> {
    object.get("id")?.as_str()?.parse().ok()
}

/// Invoices carry the subscription at the top level on older API versions and
/// under `parent.subscription_details` on newer ones.
fn invoice_subscription_id(invoice: &Value) -> Option<SubscriptionId> {
    invoice
        .get("subscription")
        .and_then(Value::as_str)
        .or_else(|| {
            invoice
                .get("parent")?
                .get("subscription_details")?
                .get("subscription")?
                .as_str()
        })
        .and_then(|id| id.parse().ok())
}
