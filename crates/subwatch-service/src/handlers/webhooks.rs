//! Webhook handler for provider billing events.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was received.
    pub received: bool,
}

/// Handle provider webhooks.
///
/// Bad signatures and unparseable payloads get a 400 and are not processed.
/// Provider failures while applying the event are returned as errors so the
/// sender redelivers; nothing is retried here.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let service = state.require_subscriptions()?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    let event = service.verify_webhook(&body, signature).map_err(|e| {
        tracing::warn!(error = %e, "Rejected webhook");
        ApiError::BadRequest(e.to_string())
    })?;

    tracing::info!(
        event_type = %event.kind,
        event_id = %event.id,
        created = %event.created,
        "Received webhook"
    );

    let outcome = service.handle_event(&event).await.map_err(|e| {
        tracing::error!(
            event_type = %event.kind,
            event_id = %event.id,
            error = %e,
            "Failed to apply webhook"
        );
        ApiError::from(e)
    })?;

    if outcome.is_none() {
        tracing::debug!(event_type = %event.kind, "Unhandled webhook event");
    }

    Ok(Json(WebhookResponse { received: true }))
}
