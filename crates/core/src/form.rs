//! Purchase form data.

use serde::{Deserialize, Serialize};

use crate::{
    error::{StoreResult, StorefrontError},
    models::BuyerDetails,
    pricing::Pricing,
};

/// Buyer input collected by the purchase dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseForm {
    /// Required company name.
    pub company_name: String,
    /// Optional logo URL, not validated beyond being text.
    pub logo_url: String,
    /// Settle without the payment collaborators.
    pub simulate: bool,
}

impl PurchaseForm {
    /// Empty form with the simulate toggle preset.
    pub fn new(simulate: bool) -> Self {
        Self {
            simulate,
            ..Self::default()
        }
    }

    /// Trim the inputs and reject a blank company name.
    pub fn validate(&self) -> StoreResult<BuyerDetails> {
        let company_name = self.company_name.trim();
        if company_name.is_empty() {
            return Err(StorefrontError::MissingCompanyName);
        }
        let logo_url = Some(self.logo_url.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(BuyerDetails {
            company_name: company_name.to_string(),
            logo_url,
        })
    }

    /// Caption of the submit control for a slot at `price`.
    pub fn submit_label(&self, pricing: &Pricing, price: u64) -> String {
        if self.simulate {
            "Simulate Buy".to_string()
        } else {
            format!("Pay {}", pricing.format(price))
        }
    }
}
