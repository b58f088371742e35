//! Checkout options.

use serde::{Deserialize, Serialize};

/// Optional behaviors applied when creating a subscription checkout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOptions {
    /// Free trial length passed to the provider, if any.
    pub trial_period_days: Option<u32>,

    /// Whether callers may attach a coupon to the checkout.
    pub allow_coupon: bool,
}

impl SubscriptionOptions {
    /// Trial days to send, dropping a zero-length trial.
    #[must_use]
    pub fn effective_trial_days(&self) -> Option<u32> {
        self.trial_period_days.filter(|days| *days > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_day_trial_is_no_trial() {
        let options = SubscriptionOptions {
            trial_period_days: Some(0),
            allow_coupon: false,
        };
        assert_eq!(options.effective_trial_days(), None);
    }

    #[test]
    fn default_has_no_trial_and_no_coupon() {
        let options = SubscriptionOptions::default();
        assert_eq!(options.effective_trial_days(), None);
        assert!(!options.allow_coupon);
    }
}
