//! Subscription handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use subwatch_core::{CustomerId, CustomerSubscriptionRecord, SubscriptionId};

use crate::error::ApiError;
use crate::provider::ProviderSubscription;
use crate::state::AppState;

/// Create subscription request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    /// Provider customer ID.
    #[serde(default)]
    pub customer_id: String,
    /// Provider price ID.
    #[serde(default)]
    pub price_id: String,
    /// Optional coupon.
    #[serde(default)]
    pub coupon_id: Option<String>,
}

/// Create subscription response.
#[derive(Debug, Serialize)]
pub struct CreateSubscriptionResponse {
    /// Always true on success.
    pub success: bool,
    /// Checkout URL.
    pub url: String,
}

/// Start a subscription checkout.
pub async fn create_subscription(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> Result<Json<CreateSubscriptionResponse>, ApiError> {
    let service = state.require_subscriptions()?;

    let customer_id: CustomerId = body
        .customer_id
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid customerId: {e}")))?;

    let price_id = body.price_id.trim();
    if price_id.is_empty() {
        return Err(ApiError::BadRequest("priceId is required".into()));
    }

    let coupon_id = body
        .coupon_id
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let checkout = service
        .create_checkout(customer_id, price_id.to_string(), coupon_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create checkout session");
            ApiError::from(e)
        })?;

    Ok(Json(CreateSubscriptionResponse {
        success: true,
        url: checkout.url,
    }))
}

/// Get subscription request.
#[derive(Debug, Deserialize)]
pub struct GetSubscriptionRequest {
    /// Customer email.
    #[serde(default)]
    pub email: String,
}

/// Get subscription response: the stored record plus the provider's view.
#[derive(Debug, Serialize)]
pub struct GetSubscriptionResponse {
    /// Record kept in customer metadata.
    #[serde(flatten)]
    pub record: CustomerSubscriptionRecord,
    /// Subscriptions the provider lists for the customer.
    pub subscriptions: Vec<ProviderSubscription>,
}

/// Look up (or create) the customer for an email and return its record.
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GetSubscriptionRequest>,
) -> Result<Json<GetSubscriptionResponse>, ApiError> {
    let service = state.require_subscriptions()?;

    let email = body.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("A valid email is required".into()));
    }

    let record = service.lookup_customer(email).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to retrieve subscription data");
        ApiError::from(e)
    })?;

    let subscriptions = service
        .subscriptions(record.customer_id())
        .await
        .map_err(|e| {
            tracing::error!(
                customer_id = %record.customer_id(),
                error = %e,
                "Failed to list subscriptions"
            );
            ApiError::from(e)
        })?;

    Ok(Json(GetSubscriptionResponse {
        record,
        subscriptions,
    }))
}

/// Cancel subscription request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSubscriptionRequest {
    /// Provider subscription ID.
    #[serde(default)]
    pub subscription_id: String,
}

/// Cancel subscription response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSubscriptionResponse {
    /// The subscription.
    pub subscription_id: SubscriptionId,
    /// When it ends.
    pub cancel_at: DateTime<Utc>,
}

/// Schedule a subscription to cancel at period end.
pub async fn cancel_subscription(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CancelSubscriptionRequest>,
) -> Result<Json<CancelSubscriptionResponse>, ApiError> {
    let service = state.require_subscriptions()?;

    let subscription_id: SubscriptionId = body
        .subscription_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Subscription ID is required".into()))?;

    let scheduled = service
        .cancel_subscription(&subscription_id)
        .await
        .map_err(|e| {
            tracing::error!(
                subscription_id = %subscription_id,
                error = %e,
                "Failed to cancel subscription"
            );
            ApiError::from(e)
        })?;

    Ok(Json(CancelSubscriptionResponse {
        subscription_id: scheduled.subscription_id,
        cancel_at: scheduled.cancel_at,
    }))
}
