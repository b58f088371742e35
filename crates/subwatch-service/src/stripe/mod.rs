//! Stripe adapter for the payment provider port.
//!
//! Stripe handles:
//! - Customer lookup and metadata (the subscription record store)
//! - Subscription checkout and cancellation
//! - Webhook signing and event delivery

pub mod client;
pub mod events;
pub mod types;

pub use client::{StripeClient, WEBHOOK_TOLERANCE_SECS};
