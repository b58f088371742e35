//! Subscription state reconciliation.
//!
//! Maps a billing event and the customer's current record onto the record to
//! persist. Every applied event replaces the whole record; nothing is merged,
//! so applying an event twice gives the same result as applying it once.
//! Ordering is not checked: a late event overwrites whatever is stored.

use crate::customer::{CustomerSubscriptionRecord, Plan};
use crate::event::{BillingEvent, SubscriptionStatus};
use crate::ids::SubscriptionId;

/// A provider call the caller must make before persisting the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderAction {
    /// Schedule cancellation of the subscription at the end of its period.
    CancelAtPeriodEnd {
        /// Subscription to cancel.
        subscription_id: SubscriptionId,
    },
}

/// Result of reconciling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The record to persist (equal to the input on a no-op).
    pub record: CustomerSubscriptionRecord,

    /// Whether the event replaces the stored record.
    pub replaced: bool,

    /// Side effect to run first, if any.
    pub action: Option<ProviderAction>,
}

impl Reconciliation {
    fn unchanged(current: &CustomerSubscriptionRecord) -> Self {
        Self {
            record: current.clone(),
            replaced: false,
            action: None,
        }
    }

    fn replace(record: CustomerSubscriptionRecord) -> Self {
        Self {
            record,
            replaced: true,
            action: None,
        }
    }
}

/// Reconcile `event` against `current`.
///
/// Pure and total. The caller loads `current` for the event's customer and,
/// when [`Reconciliation::replaced`] is set, runs the action (if any) and then
/// writes the record back in full.
#[must_use]
pub fn reconcile(event: &BillingEvent, current: &CustomerSubscriptionRecord) -> Reconciliation {
    match event {
        BillingEvent::PaymentFailed { customer_id }
        | BillingEvent::SubscriptionDeleted { customer_id, .. } => Reconciliation::replace(
            CustomerSubscriptionRecord::unsubscribed(customer_id.clone()),
        ),

        BillingEvent::PaymentSucceeded {
            customer_id,
            subscription_id,
        } => Reconciliation::replace(CustomerSubscriptionRecord::subscribed(
            customer_id.clone(),
            Plan::Monthly,
            subscription_id.clone(),
        )),

        BillingEvent::SubscriptionUpdated {
            customer_id,
            subscription_id,
            status: SubscriptionStatus::Active,
            payment_status,
        } if !payment_status.is_succeeded() => Reconciliation {
            record: CustomerSubscriptionRecord::unsubscribed(customer_id.clone()),
            replaced: true,
            action: Some(ProviderAction::CancelAtPeriodEnd {
                subscription_id: subscription_id.clone(),
            }),
        },

        BillingEvent::SubscriptionUpdated { .. } | BillingEvent::Unrecognized { .. } => {
            Reconciliation::unchanged(current)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::PaymentStatus;
    use crate::ids::CustomerId;

    fn cus() -> CustomerId {
        CustomerId::new("cus_1").unwrap()
    }

    fn sub(id: &str) -> SubscriptionId {
        SubscriptionId::new(id).unwrap()
    }

    fn records() -> Vec<CustomerSubscriptionRecord> {
        vec![
            CustomerSubscriptionRecord::unsubscribed(cus()),
            CustomerSubscriptionRecord::subscribed(cus(), Plan::Monthly, sub("sub_old")),
        ]
    }

    fn updated(status: SubscriptionStatus, payment_status: PaymentStatus) -> BillingEvent {
        BillingEvent::SubscriptionUpdated {
            customer_id: cus(),
            subscription_id: sub("sub_123"),
            status,
            payment_status,
        }
    }

    fn events() -> Vec<BillingEvent> {
        vec![
            BillingEvent::PaymentFailed { customer_id: cus() },
            BillingEvent::PaymentSucceeded {
                customer_id: cus(),
                subscription_id: sub("sub_123"),
            },
            BillingEvent::SubscriptionDeleted {
                customer_id: cus(),
                subscription_id: sub("sub_123"),
            },
            updated(SubscriptionStatus::Active, PaymentStatus::Succeeded),
            updated(SubscriptionStatus::Active, PaymentStatus::Failed),
            updated(SubscriptionStatus::Active, PaymentStatus::Unknown),
            updated(SubscriptionStatus::PastDue, PaymentStatus::Failed),
            BillingEvent::Unrecognized {
                kind: "charge.refunded".into(),
            },
        ]
    }

    #[test]
    fn payment_succeeded_subscribes_monthly() {
        let event = BillingEvent::PaymentSucceeded {
            customer_id: cus(),
            subscription_id: sub("sub_123"),
        };
        for current in records() {
            let result = reconcile(&event, &current);
            assert!(result.replaced);
            assert!(result.action.is_none());
            assert!(result.record.is_subscribed());
            assert_eq!(result.record.active_plan(), Plan::Monthly);
            assert_eq!(result.record.subscription_id(), Some(&sub("sub_123")));
        }
    }

    #[test]
    fn payment_failed_and_deleted_reset_to_default() {
        let resets = [
            BillingEvent::PaymentFailed { customer_id: cus() },
            BillingEvent::SubscriptionDeleted {
                customer_id: cus(),
                subscription_id: sub("sub_old"),
            },
        ];
        for event in &resets {
            for current in records() {
                let result = reconcile(event, &current);
                assert!(result.replaced);
                assert!(result.action.is_none());
                assert_eq!(
                    result.record,
                    CustomerSubscriptionRecord::unsubscribed(cus())
                );
            }
        }
    }

    #[test]
    fn active_update_with_paid_invoice_is_noop() {
        let event = updated(SubscriptionStatus::Active, PaymentStatus::Succeeded);
        for current in records() {
            let result = reconcile(&event, &current);
            assert!(!result.replaced);
            assert!(result.action.is_none());
            assert_eq!(result.record, current);
        }
    }

    #[test]
    fn active_update_with_failed_payment_cancels() {
        let event = updated(SubscriptionStatus::Active, PaymentStatus::Failed);
        let current = CustomerSubscriptionRecord::subscribed(cus(), Plan::Monthly, sub("sub_123"));

        let result = reconcile(&event, &current);

        assert!(result.replaced);
        assert_eq!(result.record, CustomerSubscriptionRecord::unsubscribed(cus()));
        assert_eq!(
            result.action,
            Some(ProviderAction::CancelAtPeriodEnd {
                subscription_id: sub("sub_123")
            })
        );
    }

    #[test]
    fn non_active_update_is_noop() {
        let event = updated(SubscriptionStatus::PastDue, PaymentStatus::Failed);
        for current in records() {
            let result = reconcile(&event, &current);
            assert!(!result.replaced);
            assert_eq!(result.record, current);
        }
    }

    #[test]
    fn unrecognized_is_noop() {
        let event = BillingEvent::Unrecognized {
            kind: "customer.created".into(),
        };
        for current in records() {
            let result = reconcile(&event, &current);
            assert!(!result.replaced);
            assert!(result.action.is_none());
            assert_eq!(result.record, current);
        }
    }

    #[test]
    fn reconcile_is_idempotent() {
        for event in events() {
            for current in records() {
                let once = reconcile(&event, &current).record;
                let twice = reconcile(&event, &once).record;
                assert_eq!(once, twice, "event {event} not idempotent");
            }
        }
    }

    #[test]
    fn reachable_records_keep_invariant() {
        for event in events() {
            for current in records() {
                let record = reconcile(&event, &current).record;
                if !record.is_subscribed() {
                    assert_eq!(record.active_plan(), Plan::Free);
                    assert!(record.subscription_id().is_none());
                }
            }
        }
    }
}
