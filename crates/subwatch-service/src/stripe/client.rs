//! Stripe API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;

use subwatch_core::{
    BillingEvent, CustomerId, Metadata, PaymentStatus, SubscriptionId, SubscriptionStatus,
};

use super::events::{self, LatestInvoice};
use super::types::{
    CheckoutSession, Customer, Invoice, StripeErrorResponse, StripeList, Subscription,
    WebhookEvent,
};
use crate::crypto::{constant_time_eq, hmac_sha256_hex};
use crate::provider::{
    self, CancellationScheduled, CheckoutRequest, PaymentProvider, ProviderCustomer,
    ProviderError, ProviderEvent, ProviderSubscription,
};

/// Page size when listing a customer's subscriptions.
const SUBSCRIPTION_PAGE_SIZE: &str = "10";

/// Age limit for webhook signatures, matching Stripe's libraries.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_key: String,
    webhook_secret: Option<String>,
    base_url: String,
}

impl StripeClient {
    /// Stripe API base URL.
    pub const BASE_URL: &'static str = "https://api.stripe.com/v1";

    /// Create a new Stripe client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Stripe secret API key (`sk_test_...` or `sk_live_...`)
    /// * `webhook_secret` - Optional webhook signing secret (whsec_...)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        webhook_secret: Option<String>,
    ) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, webhook_secret, Self::BASE_URL)
    }

    /// Create a client against a different API base (mock servers, proxies).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(
        api_key: impl Into<String>,
        webhook_secret: Option<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            webhook_secret,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Whether a webhook secret is configured.
    #[must_use]
    pub fn verifies_webhooks(&self) -> bool {
        self.webhook_secret.is_some()
    }

    /// Check a `Stripe-Signature` header against `payload` at time `now`.
    ///
    /// # Arguments
    ///
    /// * `payload` - Raw request body
    /// * `signature` - Value of the `Stripe-Signature` header
    /// * `now` - Current Unix time
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidSignature`] if no `v1` signature
    /// matches or the timestamp is older than the tolerance.
    pub fn verify_signature(
        &self,
        payload: &str,
        signature: &str,
        now: i64,
    ) -> Result<(), ProviderError> {
        let secret = self
            .webhook_secret
            .as_ref()
            .ok_or_else(|| ProviderError::Configuration("Webhook secret not configured".into()))?;

        // Format: t=timestamp,v1=signature,v1=signature2,...
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature.split(',') {
            let mut kv = part.trim().splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some("t"), Some(ts)) => timestamp = Some(ts),
                (Some("v1"), Some(sig)) => signatures.push(sig),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(ProviderError::InvalidSignature)?;
        let issued_at: i64 = timestamp
            .parse()
            .map_err(|_| ProviderError::InvalidSignature)?;

        if signatures.is_empty() {
            return Err(ProviderError::InvalidSignature);
        }

        let expected = hmac_sha256_hex(secret, &format!("{timestamp}.{payload}"));

        if !signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
            return Err(ProviderError::InvalidSignature);
        }

        if issued_at < now - WEBHOOK_TOLERANCE_SECS {
            tracing::warn!(
                issued_at = %issued_at,
                now = %now,
                "Stripe webhook signature outside tolerance"
            );
            return Err(ProviderError::InvalidSignature);
        }

        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<StripeErrorResponse, _> = response.json().await;

        match error_body {
            Ok(stripe_error) => Err(ProviderError::Api {
                error_type: stripe_error.error.error_type,
                message: stripe_error.error.message,
                code: stripe_error.error.code,
            }),
            Err(_) => Err(ProviderError::Api {
                error_type: "unknown".to_string(),
                message: format!("HTTP {status}"),
                code: None,
            }),
        }
    }

    async fn fetch_invoice(&self, invoice_id: &str) -> Result<Invoice, ProviderError> {
        let response = self
            .client
            .get(self.url(&format!("invoices/{invoice_id}")))
            .basic_auth(&self.api_key, Option::<&str>::None)
            // payment_intent is only an id unless expanded
            .query(&[("expand[]", "payment_intent")])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound {
                object: "invoice",
                id: invoice_id.to_string(),
            });
        }

        self.handle_response(response).await
    }

    /// Payment status for a subscription-updated event, derived from the
    /// latest invoice. Only needed when the subscription is active.
    async fn latest_payment_status(
        &self,
        subscription: &serde_json::Value,
    ) -> Result<PaymentStatus, ProviderError> {
        if events::subscription_status(subscription) != SubscriptionStatus::Active {
            return Ok(PaymentStatus::Unknown);
        }

        match LatestInvoice::of(subscription) {
            LatestInvoice::Missing => Ok(PaymentStatus::Unknown),
            LatestInvoice::Expanded(invoice) => Ok(events::invoice_payment_status(invoice)),
            LatestInvoice::Id(invoice_id) => self.invoice_payment_status(invoice_id).await,
        }
    }
}

fn into_provider_customer(customer: Customer) -> Result<ProviderCustomer, ProviderError> {
    if customer.deleted {
        return Err(ProviderError::NotFound {
            object: "customer",
            id: customer.id,
        });
    }

    let id = customer
        .id
        .parse()
        .map_err(|e| ProviderError::UnexpectedResponse(format!("customer id: {e}")))?;

    Ok(ProviderCustomer {
        id,
        email: customer.email,
        metadata: customer.metadata,
    })
}

fn into_provider_subscription(
    subscription: Subscription,
) -> Result<ProviderSubscription, ProviderError> {
    let id = subscription
        .id
        .parse()
        .map_err(|e| ProviderError::UnexpectedResponse(format!("subscription id: {e}")))?;

    Ok(ProviderSubscription {
        id,
        status: subscription
            .status
            .as_deref()
            .map_or(SubscriptionStatus::Unknown, SubscriptionStatus::parse),
        cancel_at_period_end: subscription.cancel_at_period_end,
        current_period_end: subscription
            .current_period_end
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
    })
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ProviderCustomer>, ProviderError> {
        let response = self
            .client
            .get(self.url("customers"))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;

        let list: StripeList<Customer> = self.handle_response(response).await?;

        list.data
            .into_iter()
            .next()
            .map(into_provider_customer)
            .transpose()
    }

    async fn create_customer(&self, email: &str) -> Result<ProviderCustomer, ProviderError> {
        let response = self
            .client
            .post(self.url("customers"))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&[("email", email)])
            .send()
            .await?;

        let customer: Customer = self.handle_response(response).await?;

        tracing::info!(customer_id = %customer.id, "Stripe customer created");

        into_provider_customer(customer)
    }

    async fn retrieve_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<ProviderCustomer, ProviderError> {
        let response = self
            .client
            .get(self.url(&format!("customers/{customer_id}")))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound {
                object: "customer",
                id: customer_id.to_string(),
            });
        }

        let customer: Customer = self.handle_response(response).await?;
        into_provider_customer(customer)
    }

    async fn update_customer_metadata(
        &self,
        customer_id: &CustomerId,
        metadata: &Metadata,
    ) -> Result<ProviderCustomer, ProviderError> {
        let mut params: Vec<(String, &str)> = metadata
            .iter()
            .map(|(key, value)| (format!("metadata[{key}]"), value.as_str()))
            .collect();
        params.sort();

        let response = self
            .client
            .post(self.url(&format!("customers/{customer_id}")))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        let customer: Customer = self.handle_response(response).await?;
        into_provider_customer(customer)
    }

    async fn list_subscriptions(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<ProviderSubscription>, ProviderError> {
        let response = self
            .client
            .get(self.url("subscriptions"))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .query(&[
                ("customer", customer_id.as_str()),
                ("limit", SUBSCRIPTION_PAGE_SIZE),
            ])
            .send()
            .await?;

        let list: StripeList<Subscription> = self.handle_response(response).await?;

        if list.has_more {
            tracing::debug!(
                customer_id = %customer_id,
                "Customer has more subscriptions than one page, returning the first"
            );
        }

        list.data
            .into_iter()
            .map(into_provider_subscription)
            .collect()
    }

    async fn cancel_subscription_at_period_end(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<CancellationScheduled, ProviderError> {
        let response = self
            .client
            .post(self.url(&format!("subscriptions/{subscription_id}")))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&[("cancel_at_period_end", "true")])
            .send()
            .await?;

        let subscription: Subscription = self.handle_response(response).await?;

        let cancel_at = subscription
            .cancel_at
            .or(subscription.current_period_end)
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .ok_or_else(|| {
                ProviderError::UnexpectedResponse(format!(
                    "subscription {} has no cancellation date",
                    subscription.id
                ))
            })?;

        tracing::info!(
            subscription_id = %subscription_id,
            cancel_at = %cancel_at,
            cancel_at_period_end = %subscription.cancel_at_period_end,
            "Stripe subscription scheduled for cancellation"
        );

        Ok(CancellationScheduled {
            subscription_id: subscription_id.clone(),
            cancel_at,
        })
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<provider::CheckoutSession, ProviderError> {
        let mut params = vec![
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price]", request.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("customer", request.customer_id.to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
        ];

        if let Some(days) = request.trial_period_days {
            params.push(("subscription_data[trial_period_days]", days.to_string()));
        }
        if let Some(coupon) = &request.coupon_id {
            params.push(("discounts[0][coupon]", coupon.clone()));
        }

        tracing::debug!(
            customer_id = %request.customer_id,
            price_id = %request.price_id,
            trial_period_days = ?request.trial_period_days,
            coupon = ?request.coupon_id,
            "Creating Stripe checkout session"
        );

        let response = self
            .client
            .post(self.url("checkout/sessions"))
            .basic_auth(&self.api_key, Option::<&str>::None)
            .form(&params)
            .send()
            .await?;

        let session: CheckoutSession = self.handle_response(response).await?;

        Ok(provider::CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn invoice_payment_status(
        &self,
        invoice_id: &str,
    ) -> Result<PaymentStatus, ProviderError> {
        let invoice = self.fetch_invoice(invoice_id).await?;

        let intent_status = invoice
            .payment_intent
            .as_ref()
            .and_then(|pi| pi.get("status"))
            .and_then(serde_json::Value::as_str);

        Ok(PaymentStatus::from_invoice(
            invoice.status.as_deref(),
            intent_status,
        ))
    }

    fn verify_webhook(
        &self,
        payload: &str,
        signature: Option<&str>,
    ) -> Result<ProviderEvent, ProviderError> {
        if self.verifies_webhooks() {
            let signature = signature.ok_or(ProviderError::MissingSignature)?;
            self.verify_signature(payload, signature, Utc::now().timestamp())?;
        } else {
            // No webhook_secret configured - development mode
            tracing::warn!("Stripe webhook_secret not configured - skipping signature verification");
        }

        let event: WebhookEvent = serde_json::from_str(payload)
            .map_err(|e| ProviderError::MalformedEvent(e.to_string()))?;

        Ok(ProviderEvent {
            id: event.id,
            kind: event.event_type,
            created: event.created,
            object: event.data.object,
        })
    }

    async fn decode_event(&self, event: &ProviderEvent) -> Result<BillingEvent, ProviderError> {
        let payment_status = if event.kind == events::SUBSCRIPTION_UPDATED {
            self.latest_payment_status(&event.object).await?
        } else {
            PaymentStatus::Unknown
        };

        Ok(events::billing_event(event, payment_status))
    }
}
