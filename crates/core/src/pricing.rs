//! Slot pricing and display formatting.

use crate::{config::PricingConfig, models::SlotId};

/// Price tiers repeat every this many slots.
pub const PRICE_TIERS: usize = 5;

/// Minor units per major unit for order amounts.
pub const MINOR_UNITS: u64 = 100;

/// Tiered price schedule plus the currency used to display it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pricing {
    base: u64,
    increment: u64,
    currency: String,
    symbol: String,
}

impl Pricing {
    /// Build a schedule from raw values.
    pub fn new(
        base: u64,
        increment: u64,
        currency: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            base,
            increment,
            currency: currency.into(),
            symbol: symbol.into(),
        }
    }

    /// Price of a slot in major units: `base + (id mod 5) * increment`,
    /// saturating at `u64::MAX`.
    pub fn price_for(&self, id: SlotId) -> u64 {
        ((id % PRICE_TIERS) as u64)
            .checked_mul(self.increment)
            .and_then(|step| step.checked_add(self.base))
            .unwrap_or(u64::MAX)
    }

    /// Highest price in the schedule, or `None` if it does not fit in `u64`.
    pub fn max_price(&self) -> Option<u64> {
        (PRICE_TIERS as u64 - 1)
            .checked_mul(self.increment)?
            .checked_add(self.base)
    }

    /// ISO currency code sent to the collaborators.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Format a major-unit amount for display, e.g. `₹800`.
    pub fn format(&self, amount: u64) -> String {
        format!("{}{}", self.symbol, amount)
    }
}

impl From<&PricingConfig> for Pricing {
    fn from(config: &PricingConfig) -> Self {
        Pricing::new(
            config.base,
            config.increment,
            config.currency.clone(),
            config.symbol.clone(),
        )
    }
}

impl Default for Pricing {
    fn default() -> Self {
        Pricing::from(&PricingConfig::default())
    }
}

/// Convert a major-unit amount to minor units, or `None` on overflow.
pub fn to_minor_units(amount: u64) -> Option<u64> {
    amount.checked_mul(MINOR_UNITS)
}
