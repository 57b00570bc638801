//! Domain errors raised by storefront transitions.

use thiserror::Error;

use crate::models::SlotId;

/// Result alias for storefront transitions.
pub type StoreResult<T> = std::result::Result<T, StorefrontError>;

/// Every way a storefront operation can be rejected.
///
/// None of these are fatal: the state machine recovers locally and
/// surfaces [`StorefrontError::user_message`] as a transient notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorefrontError {
    /// The slot id does not exist in the grid.
    #[error("slot #{0} does not exist")]
    NotFound(SlotId),
    /// A sale was applied to a slot that is already sold.
    #[error("slot #{0} is already sold")]
    InvalidTransition(SlotId),
    /// The buyer tried to open the purchase dialog on a sold slot.
    #[error("slot #{0} has already been sold")]
    SlotAlreadySold(SlotId),
    /// The order collaborator rejected or failed.
    #[error("order creation failed: {0}")]
    OrderCreationFailed(String),
    /// The buyer closed the checkout without paying.
    #[error("payment cancelled by buyer")]
    PaymentCancelled,
    /// The payment collaborator could not be opened.
    #[error("payment failed: {0}")]
    PaymentFailed(String),
    /// The purchase form was submitted without a company name.
    #[error("company name is required")]
    MissingCompanyName,
    /// A purchase attempt is already waiting on a collaborator.
    #[error("a purchase is already in progress")]
    PurchaseInProgress,
    /// Submission without an open purchase dialog.
    #[error("no slot selected")]
    NoSelection,
}

impl StorefrontError {
    /// Banner text shown to the buyer.
    pub fn user_message(&self) -> String {
        match self {
            StorefrontError::NotFound(id) => format!("Slot #{id} does not exist."),
            StorefrontError::InvalidTransition(_) | StorefrontError::SlotAlreadySold(_) => {
                "This slot has already been sold.".to_string()
            }
            StorefrontError::OrderCreationFailed(_) | StorefrontError::PaymentFailed(_) => {
                "Payment failed or cancelled.".to_string()
            }
            StorefrontError::PaymentCancelled => "Payment cancelled.".to_string(),
            StorefrontError::MissingCompanyName => "Company name is required.".to_string(),
            StorefrontError::PurchaseInProgress => {
                "A purchase is already in progress.".to_string()
            }
            StorefrontError::NoSelection => "Select an available slot first.".to_string(),
        }
    }
}
