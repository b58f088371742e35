//! Subwatch HTTP API Service.
//!
//! Keeps a customer's subscription state, stored as metadata on the
//! payment provider's customer object, in step with billing events:
//!
//! - Customer lookup and subscription record retrieval
//! - Checkout session creation for new subscriptions
//! - Cancellation at period end
//! - Signed provider webhooks reconciled into the record
//!
//! The provider sits behind [`PaymentProvider`]; [`StripeClient`] is the
//! production adapter.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for consistency

pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod provider;
pub mod routes;
pub mod state;
pub mod stripe;
pub mod subscriptions;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use provider::{
    CancellationScheduled, CheckoutRequest, CheckoutSession, PaymentProvider, ProviderCustomer,
    ProviderError, ProviderEvent, ProviderSubscription,
};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::StripeClient;
pub use subscriptions::{Checkout, SubscriptionError, SubscriptionService};
