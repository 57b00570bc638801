//! Shared domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row-major index of a slot in the grid.
pub type SlotId = usize;

/// Sale details recorded when a slot is settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    /// Company that bought the slot.
    pub owner: String,
    /// Logo shown in the slot, if the buyer supplied one.
    pub logo_url: Option<String>,
    /// When the sale was applied.
    pub sold_at: DateTime<Utc>,
}

/// Lifecycle of a slot. Only `Available -> Sold` is ever applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotStatus {
    /// Open for purchase.
    Available,
    /// Settled; carries the owner data so it cannot exist without it.
    Sold(Sale),
}

/// One purchasable advertising cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    id: SlotId,
    price: u64,
    status: SlotStatus,
}

impl Slot {
    /// Fresh, available slot.
    pub fn new(id: SlotId, price: u64) -> Self {
        Self {
            id,
            price,
            status: SlotStatus::Available,
        }
    }

    /// Immutable slot identifier.
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Price in major currency units.
    pub fn price(&self) -> u64 {
        self.price
    }

    /// Current lifecycle state.
    pub fn status(&self) -> &SlotStatus {
        &self.status
    }

    /// Whether the slot has been settled.
    pub fn is_sold(&self) -> bool {
        matches!(self.status, SlotStatus::Sold(_))
    }

    /// Owning company, present only once sold.
    pub fn owner(&self) -> Option<&str> {
        match &self.status {
            SlotStatus::Sold(sale) => Some(sale.owner.as_str()),
            SlotStatus::Available => None,
        }
    }

    /// Logo URL, present only once sold and supplied.
    pub fn logo_url(&self) -> Option<&str> {
        match &self.status {
            SlotStatus::Sold(sale) => sale.logo_url.as_deref(),
            SlotStatus::Available => None,
        }
    }

    /// Sale record, present only once sold.
    pub fn sale(&self) -> Option<&Sale> {
        match &self.status {
            SlotStatus::Sold(sale) => Some(sale),
            SlotStatus::Available => None,
        }
    }

    pub(crate) fn settle(&mut self, sale: Sale) {
        self.status = SlotStatus::Sold(sale);
    }
}

/// Validated buyer metadata taken from the purchase form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerDetails {
    /// Trimmed, non-empty company name.
    pub company_name: String,
    /// Logo URL, `None` when left blank.
    pub logo_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_follows_status() {
        let mut slot = Slot::new(2, 700);
        assert!(!slot.is_sold());
        assert_eq!(slot.owner(), None);
        assert_eq!(slot.logo_url(), None);

        slot.settle(Sale {
            owner: "Acme".to_string(),
            logo_url: None,
            sold_at: Utc::now(),
        });
        assert!(slot.is_sold());
        assert_eq!(slot.owner(), Some("Acme"));
        assert_eq!(slot.price(), 700);
    }
}
