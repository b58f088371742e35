//! Error types for subwatch.

use crate::ids::IdError;

/// Result type for subwatch domain operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in subwatch domain operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A metadata field holds a value we can't interpret.
    #[error("malformed metadata field {field}: {value:?}")]
    MalformedMetadata {
        /// Metadata key.
        field: &'static str,
        /// The offending value.
        value: String,
    },

    /// A subscribed record without a subscription id.
    #[error("subscribed record for customer {customer_id} has no subscription id")]
    MissingSubscriptionId {
        /// The customer whose metadata is inconsistent.
        customer_id: String,
    },

    /// Unknown plan name.
    #[error("unknown plan: {0}")]
    UnknownPlan(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}
