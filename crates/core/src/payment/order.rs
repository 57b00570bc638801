use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::pricing::to_minor_units;

/// Order handed back by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Opaque reference passed on to the payment collaborator.
    pub reference: String,
    /// Amount in minor currency units.
    pub amount_minor: u64,
    /// ISO currency code.
    pub currency: String,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
}

/// Creates orders for a purchase amount.
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Create an order for `amount_major` (major currency units).
    async fn create_order(&self, amount_major: u64) -> Result<Order>;
}

/// Stand-in for the backend order API: waits a fixed latency and returns a
/// fake order reference. Fails only when the amount does not fit in minor
/// units.
#[derive(Debug, Clone)]
pub struct SimulatedOrderGateway {
    latency: Duration,
    currency: String,
}

impl SimulatedOrderGateway {
    /// Build a gateway answering after `latency` in `currency`.
    pub fn new(latency: Duration, currency: impl Into<String>) -> Self {
        Self {
            latency,
            currency: currency.into(),
        }
    }
}

#[async_trait]
impl OrderGateway for SimulatedOrderGateway {
    async fn create_order(&self, amount_major: u64) -> Result<Order> {
        tokio::time::sleep(self.latency).await;
        let amount_minor = to_minor_units(amount_major)
            .with_context(|| format!("amount {amount_major} is too large for an order"))?;
        let token = Uuid::new_v4().simple().to_string();
        let order = Order {
            reference: format!("order_fake_{}", &token[..8]),
            amount_minor,
            currency: self.currency.clone(),
            created_at: Utc::now(),
        };
        info!(reference = %order.reference, amount = order.amount_minor, "Simulated order created");
        Ok(order)
    }
}
