//! Application state.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::provider::PaymentProvider;
use crate::stripe::StripeClient;
use crate::subscriptions::SubscriptionService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: ServiceConfig,

    /// Subscription operations (absent when no provider is configured).
    pub subscriptions: Option<Arc<SubscriptionService>>,
}

impl AppState {
    /// Create application state, wiring Stripe up if it is configured.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        let provider = config.stripe_api_key.as_ref().and_then(|key| {
            match StripeClient::with_base_url(
                key,
                config.stripe_webhook_secret.clone(),
                &config.stripe_api_base,
            ) {
                Ok(client) => {
                    tracing::info!(
                        webhook_verification = %client.verifies_webhooks(),
                        "Stripe integration enabled"
                    );
                    Some(Arc::new(client) as Arc<dyn PaymentProvider>)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create Stripe client");
                    None
                }
            }
        });

        if provider.is_none() {
            tracing::warn!("Stripe not configured - subscription endpoints will not be available");
        }

        Self::build(config, provider)
    }

    /// Create application state around an existing provider.
    #[must_use]
    pub fn with_provider(config: ServiceConfig, provider: Arc<dyn PaymentProvider>) -> Self {
        Self::build(config, Some(provider))
    }

    fn build(config: ServiceConfig, provider: Option<Arc<dyn PaymentProvider>>) -> Self {
        let subscriptions = provider.map(|provider| {
            Arc::new(SubscriptionService::new(
                provider,
                config.subscription_options,
                config.checkout_success_url.clone(),
                config.checkout_cancel_url.clone(),
            ))
        });

        Self {
            config,
            subscriptions,
        }
    }

    /// Check if a payment provider is configured.
    #[must_use]
    pub fn has_provider(&self) -> bool {
        self.subscriptions.is_some()
    }

    /// The subscription service, or an error response if Stripe is missing.
    pub fn require_subscriptions(&self) -> Result<&SubscriptionService, ApiError> {
        self.subscriptions
            .as_deref()
            .ok_or_else(|| ApiError::Unavailable("Stripe not configured".into()))
    }
}
