//! Common test utilities for subwatch integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use subwatch_core::{
    BillingEvent, CustomerId, Metadata, PaymentStatus, SubscriptionId, SubscriptionOptions,
    SubscriptionStatus,
};
use subwatch_service::stripe::events;
use subwatch_service::{
    create_router, AppState, CancellationScheduled, CheckoutRequest, CheckoutSession,
    PaymentProvider, ProviderCustomer, ProviderError, ProviderEvent, ProviderSubscription,
    ServiceConfig,
};

/// Signature header value the fake provider accepts.
pub const VALID_SIGNATURE: &str = "t=1,v1=valid";

/// Period end reported for every cancellation.
pub const PERIOD_END: i64 = 1_735_689_600;

/// Calls the fake provider has received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateCustomer(String),
    UpdateMetadata(CustomerId, Metadata),
    Cancel(SubscriptionId),
    Checkout(CheckoutRequest),
}

#[derive(Default)]
struct Inner {
    customers: HashMap<String, ProviderCustomer>,
    invoices: HashMap<String, PaymentStatus>,
    subscriptions: HashMap<String, Vec<ProviderSubscription>>,
    calls: Vec<Call>,
    next_id: u32,
    fail_cancel: bool,
    fail_updates: bool,
}

/// In-memory payment provider.
#[derive(Clone, Default)]
pub struct FakeProvider {
    inner: Arc<Mutex<Inner>>,
    require_signature: bool,
}

impl FakeProvider {
    /// A provider that checks webhook signatures.
    pub fn new() -> Self {
        Self {
            inner: Arc::default(),
            require_signature: true,
        }
    }

    /// A provider with no webhook secret.
    pub fn unsigned() -> Self {
        Self::default()
    }

    /// Add a customer and return its id.
    pub fn insert_customer(&self, id: &str, email: &str, metadata: &[(&str, &str)]) -> CustomerId {
        let customer_id: CustomerId = id.parse().unwrap();
        let customer = ProviderCustomer {
            id: customer_id.clone(),
            email: Some(email.to_string()),
            metadata: metadata
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        };
        self.inner
            .lock()
            .unwrap()
            .customers
            .insert(id.to_string(), customer);
        customer_id
    }

    /// Set an invoice's payment status.
    pub fn insert_invoice(&self, id: &str, status: PaymentStatus) {
        self.inner
            .lock()
            .unwrap()
            .invoices
            .insert(id.to_string(), status);
    }

    /// Attach a subscription to a customer.
    pub fn insert_subscription(&self, customer_id: &str, id: &str, status: SubscriptionStatus) {
        self.inner
            .lock()
            .unwrap()
            .subscriptions
            .entry(customer_id.to_string())
            .or_default()
            .push(ProviderSubscription {
                id: id.parse().unwrap(),
                status,
                cancel_at_period_end: false,
                current_period_end: DateTime::<Utc>::from_timestamp(PERIOD_END, 0),
            });
    }

    /// Current metadata of a customer.
    pub fn metadata(&self, id: &str) -> Metadata {
        self.inner.lock().unwrap().customers[id].metadata.clone()
    }

    /// Number of customers.
    pub fn customer_count(&self) -> usize {
        self.inner.lock().unwrap().customers.len()
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Make cancellations fail.
    pub fn fail_cancellations(&self) {
        self.inner.lock().unwrap().fail_cancel = true;
    }

    /// Make metadata writes fail.
    pub fn fail_updates(&self) {
        self.inner.lock().unwrap().fail_updates = true;
    }

    fn outage() -> ProviderError {
        ProviderError::Api {
            error_type: "api_error".into(),
            message: "provider unavailable".into(),
            code: None,
        }
    }

    fn not_found(id: &str) -> ProviderError {
        ProviderError::NotFound {
            object: "customer",
            id: id.to_string(),
        }
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ProviderCustomer>, ProviderError> {
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<_> = inner
            .customers
            .values()
            .filter(|c| c.email.as_deref() == Some(email))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(matches.into_iter().next())
    }

    async fn create_customer(&self, email: &str) -> Result<ProviderCustomer, ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = format!("cus_new{}", inner.next_id);
        let customer = ProviderCustomer {
            id: id.parse().unwrap(),
            email: Some(email.to_string()),
            metadata: Metadata::new(),
        };
        inner.customers.insert(id, customer.clone());
        inner.calls.push(Call::CreateCustomer(email.to_string()));
        Ok(customer)
    }

    async fn retrieve_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<ProviderCustomer, ProviderError> {
        self.inner
            .lock()
            .unwrap()
            .customers
            .get(customer_id.as_str())
            .cloned()
            .ok_or_else(|| Self::not_found(customer_id.as_str()))
    }

    async fn update_customer_metadata(
        &self,
        customer_id: &CustomerId,
        metadata: &Metadata,
    ) -> Result<ProviderCustomer, ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_updates {
            return Err(Self::outage());
        }
        inner
            .calls
            .push(Call::UpdateMetadata(customer_id.clone(), metadata.clone()));
        let customer = inner
            .customers
            .get_mut(customer_id.as_str())
            .ok_or_else(|| Self::not_found(customer_id.as_str()))?;
        customer.metadata.extend(metadata.clone());
        Ok(customer.clone())
    }

    async fn list_subscriptions(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<ProviderSubscription>, ProviderError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .subscriptions
            .get(customer_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn cancel_subscription_at_period_end(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<CancellationScheduled, ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_cancel {
            return Err(Self::outage());
        }
        inner.calls.push(Call::Cancel(subscription_id.clone()));
        Ok(CancellationScheduled {
            subscription_id: subscription_id.clone(),
            cancel_at: DateTime::<Utc>::from_timestamp(PERIOD_END, 0).unwrap(),
        })
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, ProviderError> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .push(Call::Checkout(request.clone()));
        Ok(CheckoutSession {
            id: "cs_test_1".into(),
            url: Some("https://checkout.test/cs_test_1".into()),
        })
    }

    async fn invoice_payment_status(
        &self,
        invoice_id: &str,
    ) -> Result<PaymentStatus, ProviderError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .invoices
            .get(invoice_id)
            .copied()
            .unwrap_or(PaymentStatus::Unknown))
    }

    fn verify_webhook(
        &self,
        payload: &str,
        signature: Option<&str>,
    ) -> Result<ProviderEvent, ProviderError> {
        if self.require_signature {
            match signature {
                None => return Err(ProviderError::MissingSignature),
                Some(VALID_SIGNATURE) => {}
                Some(_) => return Err(ProviderError::InvalidSignature),
            }
        }

        let value: Value = serde_json::from_str(payload)
            .map_err(|e| ProviderError::MalformedEvent(e.to_string()))?;

        Ok(ProviderEvent {
            id: value["id"].as_str().unwrap_or_default().to_string(),
            kind: value["type"].as_str().unwrap_or_default().to_string(),
            created: value["created"].as_i64().unwrap_or_default(),
            object: value["data"]["object"].clone(),
        })
    }

    async fn decode_event(&self, event: &ProviderEvent) -> Result<BillingEvent, ProviderError> {
        let payment_status = match events::LatestInvoice::of(&event.object) {
            events::LatestInvoice::Missing => PaymentStatus::Unknown,
            events::LatestInvoice::Expanded(invoice) => events::invoice_payment_status(invoice),
            events::LatestInvoice::Id(id) => self.invoice_payment_status(id).await?,
        };
        Ok(events::billing_event(event, payment_status))
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The provider behind the server.
    pub provider: FakeProvider,
}

impl TestHarness {
    /// Harness with signed webhooks and default options.
    pub fn new() -> Self {
        Self::with(FakeProvider::new(), SubscriptionOptions::default())
    }

    /// Harness around a given provider and options.
    pub fn with(provider: FakeProvider, options: SubscriptionOptions) -> Self {
        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            subscription_options: options,
            ..ServiceConfig::default()
        };

        let state = AppState::with_provider(config, Arc::new(provider.clone()));
        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, provider }
    }

    /// Harness with no provider configured.
    pub fn unconfigured() -> TestServer {
        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            ..ServiceConfig::default()
        };
        TestServer::new(create_router(AppState::new(config))).expect("Failed to create test server")
    }

    /// Post a webhook with the accepted signature.
    pub async fn send_webhook(&self, payload: &Value) -> axum_test::TestResponse {
        self.server
            .post("/webhook")
            .add_header(
                axum::http::HeaderName::from_static("stripe-signature"),
                axum::http::HeaderValue::from_static(VALID_SIGNATURE),
            )
            .text(payload.to_string())
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// A Stripe-shaped event envelope.
pub fn event(kind: &str, object: Value) -> Value {
    json!({
        "id": "evt_test",
        "object": "event",
        "type": kind,
        "created": 1_700_000_000,
        "data": { "object": object }
    })
}
