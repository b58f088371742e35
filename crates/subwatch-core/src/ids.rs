//! Identifier types for subwatch.
//!
//! Customer and subscription identifiers are issued by the payment provider
//! and are opaque to us. The newtypes exist so the two can't be swapped at a
//! call site, and so an empty identifier never makes it past the edge.
//!
//! # Macro-based ID Types
//!
//! The `provider_id_type!` macro reduces boilerplate for string identifier
//! types, keeping serialization, parsing and display consistent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Macro to define a provider-issued identifier type with standard trait implementations.
///
/// This macro generates a newtype wrapper around `String` with implementations for:
/// - `Clone`, `PartialEq`, `Eq`, `Hash`
/// - `Serialize`, `Deserialize` (as string)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`
/// - `AsRef<str>`
///
/// # Example
///
/// ```ignore
/// provider_id_type!(MyId, "A custom identifier type.");
/// let parsed: MyId = "abc_123".parse().unwrap();
/// ```
macro_rules! provider_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create an identifier, rejecting empty or whitespace-bearing input.
            ///
            /// # Errors
            ///
            /// Returns [`IdError`] if the value is empty or contains whitespace.
            pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(IdError::Empty);
                }
                if value.chars().any(char::is_whitespace) {
                    return Err(IdError::Whitespace(value));
                }
                Ok(Self(value))
            }

            /// Return the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

provider_id_type!(
    CustomerId,
    "A payment-provider customer identifier (e.g. `cus_...`).\n\nPrimary key of a subscription record."
);
provider_id_type!(
    SubscriptionId,
    "A payment-provider subscription identifier (e.g. `sub_...`)."
);

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is empty.
    #[error("identifier is empty")]
    Empty,

    /// The input contains whitespace.
    #[error("identifier contains whitespace: {0:?}")]
    Whitespace(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customer_id_parses() {
        let id = CustomerId::from_str("cus_123").unwrap();
        assert_eq!(id.as_str(), "cus_123");
        assert_eq!(id.to_string(), "cus_123");
    }

    #[test]
    fn empty_id_rejected() {
        assert_eq!(CustomerId::new(""), Err(IdError::Empty));
        assert_eq!(SubscriptionId::from_str(""), Err(IdError::Empty));
    }

    #[test]
    fn whitespace_id_rejected() {
        assert!(matches!(
            SubscriptionId::new("sub 1"),
            Err(IdError::Whitespace(_))
        ));
    }

    #[test]
    fn subscription_id_serde_json() {
        let id = SubscriptionId::new("sub_abc").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sub_abc\"");
        let parsed: SubscriptionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn deserializing_empty_id_fails() {
        assert!(serde_json::from_str::<CustomerId>("\"\"").is_err());
    }
}
