//! Customer subscription records.
//!
//! A [`CustomerSubscriptionRecord`] is the denormalized view of a customer's
//! subscription that lives in the provider's customer metadata. The provider
//! store is the system of record; this module only defines the shape and how
//! it maps to and from string metadata.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{CustomerId, SubscriptionId};

// ============================================================================
// Metadata keys
// ============================================================================

/// Metadata key holding `"true"` / `"false"`.
pub const META_IS_SUBSCRIBED: &str = "isSubscribed";

/// Metadata key holding the plan name.
pub const META_ACTIVE_PLAN: &str = "activePlan";

/// Metadata key holding the subscription id (empty when unsubscribed).
pub const META_SUBSCRIPTION_ID: &str = "subscriptionId";

/// Provider customer metadata: a flat string map.
pub type Metadata = HashMap<String, String>;

/// Available plans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// No paid plan.
    #[default]
    Free,

    /// Monthly paid subscription.
    Monthly,
}

impl Plan {
    /// The wire name of the plan.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "free" => Ok(Self::Free),
            "monthly" => Ok(Self::Monthly),
            other => Err(CoreError::UnknownPlan(other.to_string())),
        }
    }
}

/// Subscription state of one provider customer.
///
/// Fields are private so that `is_subscribed == false` always comes with the
/// free plan and no subscription id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSubscriptionRecord {
    customer_id: CustomerId,
    is_subscribed: bool,
    active_plan: Plan,
    subscription_id: Option<SubscriptionId>,
}

impl CustomerSubscriptionRecord {
    /// The default record: not subscribed, free plan, no subscription.
    #[must_use]
    pub fn unsubscribed(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            is_subscribed: false,
            active_plan: Plan::Free,
            subscription_id: None,
        }
    }

    /// A subscribed record on `plan`.
    #[must_use]
    pub fn subscribed(customer_id: CustomerId, plan: Plan, subscription_id: SubscriptionId) -> Self {
        Self {
            customer_id,
            is_subscribed: true,
            active_plan: plan,
            subscription_id: Some(subscription_id),
        }
    }

    /// The customer this record belongs to.
    #[must_use]
    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    /// Whether the customer has a paid subscription.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.is_subscribed
    }

    /// The active plan.
    #[must_use]
    pub fn active_plan(&self) -> Plan {
        self.active_plan
    }

    /// The provider subscription id, present iff subscribed.
    #[must_use]
    pub fn subscription_id(&self) -> Option<&SubscriptionId> {
        self.subscription_id.as_ref()
    }

    /// Encode as provider metadata.
    ///
    /// The subscription id is always written, as an empty string when absent,
    /// so a full replace clears any id left by an earlier subscription.
    #[must_use]
    pub fn to_metadata(&self) -> Metadata {
        let mut metadata = Metadata::with_capacity(3);
        metadata.insert(
            META_IS_SUBSCRIBED.to_string(),
            self.is_subscribed.to_string(),
        );
        metadata.insert(
            META_ACTIVE_PLAN.to_string(),
            self.active_plan.as_str().to_string(),
        );
        metadata.insert(
            META_SUBSCRIPTION_ID.to_string(),
            self.subscription_id
                .as_ref()
                .map(|id| id.as_str().to_string())
                .unwrap_or_default(),
        );
        metadata
    }

    /// Decode from provider metadata.
    ///
    /// Returns `Ok(None)` when the metadata was never initialized. An
    /// unsubscribed flag always yields the default record, whatever the other
    /// keys hold.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] when the flag or plan can't be parsed, or a
    /// subscribed record has no subscription id.
    pub fn from_metadata(customer_id: CustomerId, metadata: &Metadata) -> Result<Option<Self>> {
        let Some(flag) = metadata.get(META_IS_SUBSCRIBED) else {
            return Ok(None);
        };

        let is_subscribed = match flag.as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(CoreError::MalformedMetadata {
                    field: META_IS_SUBSCRIBED,
                    value: other.to_string(),
                })
            }
        };

        if !is_subscribed {
            return Ok(Some(Self::unsubscribed(customer_id)));
        }

        let plan = metadata
            .get(META_ACTIVE_PLAN)
            .map_or(Ok(Plan::Monthly), |p| p.parse())?;

        let subscription_id = metadata
            .get(META_SUBSCRIPTION_ID)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::MissingSubscriptionId {
                customer_id: customer_id.to_string(),
            })?
            .parse::<SubscriptionId>()?;

        Ok(Some(Self::subscribed(customer_id, plan, subscription_id)))
    }
}
