//! Subscription operations on top of the payment provider.
//!
//! [`SubscriptionService`] owns the provider handle and checkout options. It
//! keeps no state of its own: each call reads from the provider, and webhook
//! handling is a read-reconcile-write against the customer's metadata.

use std::sync::Arc;

use subwatch_core::{
    reconcile, BillingEvent, CustomerId, CustomerSubscriptionRecord, ProviderAction,
    Reconciliation, SubscriptionId, SubscriptionOptions,
};

use crate::provider::{
    CancellationScheduled, CheckoutRequest, PaymentProvider, ProviderError, ProviderEvent,
    ProviderSubscription,
};

/// Errors from subscription operations.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// A coupon was supplied but coupons are disabled.
    #[error("coupons are not enabled for this service")]
    CouponNotAllowed,

    /// The provider created a session without a URL.
    #[error("provider returned no checkout URL")]
    MissingCheckoutUrl,

    /// Provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// A created subscription checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkout {
    /// Session id.
    pub session_id: String,
    /// Where to send the customer.
    pub url: String,
}

/// Subscription operations.
pub struct SubscriptionService {
    provider: Arc<dyn PaymentProvider>,
    options: SubscriptionOptions,
    success_url: String,
    cancel_url: String,
}

impl SubscriptionService {
    /// Create a service over `provider`.
    #[must_use]
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        options: SubscriptionOptions,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            options,
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    /// Find or create the customer for `email` and return its record.
    ///
    /// Uninitialized metadata is set to the default record before returning.
    /// Malformed metadata is overwritten with the default too.
    pub async fn lookup_customer(
        &self,
        email: &str,
    ) -> Result<CustomerSubscriptionRecord, SubscriptionError> {
        let customer = match self.provider.find_customer_by_email(email).await? {
            Some(customer) => customer,
            None => {
                tracing::info!("No customer for email, creating one");
                self.provider.create_customer(email).await?
            }
        };

        match CustomerSubscriptionRecord::from_metadata(customer.id.clone(), &customer.metadata) {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => {
                tracing::info!(customer_id = %customer.id, "Initializing subscription metadata");
            }
            Err(e) => {
                tracing::warn!(
                    customer_id = %customer.id,
                    error = %e,
                    "Malformed subscription metadata, resetting to default"
                );
            }
        }

        let record = CustomerSubscriptionRecord::unsubscribed(customer.id);
        self.provider
            .update_customer_metadata(record.customer_id(), &record.to_metadata())
            .await?;

        Ok(record)
    }

    /// The customer's subscriptions as the provider reports them.
    pub async fn subscriptions(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<ProviderSubscription>, SubscriptionError> {
        Ok(self.provider.list_subscriptions(customer_id).await?)
    }

    /// Schedule cancellation at period end.
    ///
    /// Metadata is left alone; the provider's follow-up webhooks update it.
    pub async fn cancel_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<CancellationScheduled, SubscriptionError> {
        let scheduled = self
            .provider
            .cancel_subscription_at_period_end(subscription_id)
            .await?;

        tracing::info!(
            subscription_id = %subscription_id,
            cancel_at = %scheduled.cancel_at,
            "Subscription cancellation requested"
        );

        Ok(scheduled)
    }

    /// Create a subscription checkout session.
    pub async fn create_checkout(
        &self,
        customer_id: CustomerId,
        price_id: String,
        coupon_id: Option<String>,
    ) -> Result<Checkout, SubscriptionError> {
        if coupon_id.is_some() && !self.options.allow_coupon {
            return Err(SubscriptionError::CouponNotAllowed);
        }

        let request = CheckoutRequest {
            customer_id,
            price_id,
            coupon_id,
            trial_period_days: self.options.effective_trial_days(),
            success_url: self.success_url.clone(),
            cancel_url: self.cancel_url.clone(),
        };

        let session = self.provider.create_checkout_session(&request).await?;
        let url = session.url.ok_or(SubscriptionError::MissingCheckoutUrl)?;

        tracing::info!(
            customer_id = %request.customer_id,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(Checkout {
            session_id: session.id,
            url,
        })
    }

    /// Verify an inbound webhook.
    pub fn verify_webhook(
        &self,
        payload: &str,
        signature: Option<&str>,
    ) -> Result<ProviderEvent, ProviderError> {
        self.provider.verify_webhook(payload, signature)
    }

    /// Decode and apply a verified webhook event.
    pub async fn handle_event(
        &self,
        event: &ProviderEvent,
    ) -> Result<Option<Reconciliation>, SubscriptionError> {
        let billing_event = self.provider.decode_event(event).await?;
        Ok(self.apply(&billing_event).await?)
    }

    /// Apply a billing event to the affected customer's record.
    ///
    /// Returns `None` for events not tied to a customer. The provider action,
    /// if any, runs before the write; if it fails nothing is written.
    pub async fn apply(
        &self,
        event: &BillingEvent,
    ) -> Result<Option<Reconciliation>, ProviderError> {
        let Some(customer_id) = event.customer_id() else {
            tracing::debug!(event_type = %event.kind(), "Ignoring billing event");
            return Ok(None);
        };

        let current = self.current_record(customer_id).await?;
        let result = reconcile(event, &current);

        if !result.replaced {
            tracing::debug!(
                customer_id = %customer_id,
                event_type = %event.kind(),
                "Billing event leaves record unchanged"
            );
            return Ok(Some(result));
        }

        if let Some(ProviderAction::CancelAtPeriodEnd { subscription_id }) = &result.action {
            tracing::warn!(
                customer_id = %customer_id,
                subscription_id = %subscription_id,
                "Active subscription without successful payment, cancelling at period end"
            );
            self.provider
                .cancel_subscription_at_period_end(subscription_id)
                .await?;
        }

        self.provider
            .update_customer_metadata(customer_id, &result.record.to_metadata())
            .await?;

        tracing::info!(
            customer_id = %customer_id,
            event_type = %event.kind(),
            is_subscribed = %result.record.is_subscribed(),
            active_plan = %result.record.active_plan(),
            subscription_id = ?result.record.subscription_id(),
            "Subscription record replaced"
        );

        Ok(Some(result))
    }

    /// The customer's stored record, treating missing or malformed metadata as
    /// the default record.
    pub async fn current_record(
        &self,
        customer_id: &CustomerId,
    ) -> Result<CustomerSubscriptionRecord, ProviderError> {
        let customer = self.provider.retrieve_customer(customer_id).await?;

        match CustomerSubscriptionRecord::from_metadata(customer.id.clone(), &customer.metadata) {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Ok(CustomerSubscriptionRecord::unsubscribed(customer.id)),
            Err(e) => {
                tracing::warn!(
                    customer_id = %customer.id,
                    error = %e,
                    "Malformed subscription metadata, treating as default"
                );
                Ok(CustomerSubscriptionRecord::unsubscribed(customer.id))
            }
        }
    }
}

impl std::fmt::Debug for SubscriptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionService")
            .field("options", &self.options)
            .field("success_url", &self.success_url)
            .field("cancel_url", &self.cancel_url)
            .finish_non_exhaustive()
    }
}
