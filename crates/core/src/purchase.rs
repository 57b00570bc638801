//! Purchase workflow phases.

use std::fmt;

use crate::{
    models::{BuyerDetails, SlotId},
    payment::Order,
};

/// Identifies one real-path purchase attempt. Collaborator results carry it
/// back so that results for an abandoned attempt can be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the current purchase stands.
///
/// Real path: `Idle -> AwaitingOrder -> AwaitingPayment -> Settled`.
/// Simulate path: `Idle -> Settled`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PurchasePhase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Waiting on the order service.
    AwaitingOrder {
        /// Attempt tag.
        attempt: AttemptId,
        /// Slot being bought.
        slot_id: SlotId,
        /// Validated form data.
        buyer: BuyerDetails,
    },
    /// Waiting on the payment collaborator; no timeout applies.
    AwaitingPayment {
        /// Attempt tag.
        attempt: AttemptId,
        /// Slot being bought.
        slot_id: SlotId,
        /// Validated form data.
        buyer: BuyerDetails,
        /// Order handed to the checkout.
        order: Order,
    },
    /// Sale applied.
    Settled {
        /// Slot that was sold.
        slot_id: SlotId,
    },
}

impl PurchasePhase {
    /// True while a collaborator call is outstanding; gates submission.
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            PurchasePhase::AwaitingOrder { .. } | PurchasePhase::AwaitingPayment { .. }
        )
    }

    /// Attempt currently in flight.
    pub fn attempt(&self) -> Option<AttemptId> {
        match self {
            PurchasePhase::AwaitingOrder { attempt, .. }
            | PurchasePhase::AwaitingPayment { attempt, .. } => Some(*attempt),
            PurchasePhase::Idle | PurchasePhase::Settled { .. } => None,
        }
    }

    /// Short label for logs and the status line.
    pub fn label(&self) -> &'static str {
        match self {
            PurchasePhase::Idle => "idle",
            PurchasePhase::AwaitingOrder { .. } => "creating order",
            PurchasePhase::AwaitingPayment { .. } => "awaiting payment",
            PurchasePhase::Settled { .. } => "settled",
        }
    }
}
