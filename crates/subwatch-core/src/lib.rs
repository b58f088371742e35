//! Core types and reconciliation for subwatch.
//!
//! This crate provides the domain types shared by the subwatch service:
//!
//! - **Identifiers**: `CustomerId`, `SubscriptionId`
//! - **Records**: `CustomerSubscriptionRecord`, `Plan`, metadata encoding
//! - **Events**: `BillingEvent`, `SubscriptionStatus`, `PaymentStatus`
//! - **Reconciliation**: `reconcile`, `Reconciliation`, `ProviderAction`
//! - **Options**: `SubscriptionOptions`
//!
//! Nothing here performs I/O. The payment provider's customer metadata is the
//! system of record; the service crate reads it, calls [`reconcile`], and
//! writes the result back.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod customer;
pub mod error;
pub mod event;
pub mod ids;
pub mod options;
pub mod reconcile;

pub use customer::{
    CustomerSubscriptionRecord, Metadata, Plan, META_ACTIVE_PLAN, META_IS_SUBSCRIBED,
    META_SUBSCRIPTION_ID,
};
pub use error::{CoreError, Result};
pub use event::{BillingEvent, PaymentStatus, SubscriptionStatus};
pub use ids::{CustomerId, IdError, SubscriptionId};
pub use options::SubscriptionOptions;
pub use reconcile::{reconcile, ProviderAction, Reconciliation};
