use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use super::order::Order;
use crate::models::{BuyerDetails, SlotId};

/// Buyer data pre-filled in the checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prefill {
    /// Buyer name, taken from the company name.
    pub name: String,
}

/// Everything the payment collaborator needs to open a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Merchant public key.
    pub key_id: String,
    /// Amount in minor units, as returned by the order service.
    pub amount_minor: u64,
    /// ISO currency code.
    pub currency: String,
    /// Merchant display name.
    pub merchant_name: String,
    /// Line shown to the buyer, e.g. `Buy pixel slot #3`.
    pub description: String,
    /// Order reference from the order service.
    pub order_reference: String,
    /// Buyer pre-fill data.
    pub prefill: Prefill,
    /// Free-form notes; always carries `slot_id`.
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutRequest {
    /// Assemble a request for `slot_id` from its order and buyer.
    pub fn new(
        key_id: impl Into<String>,
        merchant_name: impl Into<String>,
        slot_id: SlotId,
        order: &Order,
        buyer: &BuyerDetails,
    ) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert("slot_id".to_string(), slot_id.to_string());
        Self {
            key_id: key_id.into(),
            amount_minor: order.amount_minor,
            currency: order.currency.clone(),
            merchant_name: merchant_name.into(),
            description: format!("Buy pixel slot #{slot_id}"),
            order_reference: order.reference.clone(),
            prefill: Prefill {
                name: buyer.company_name.clone(),
            },
            metadata,
        }
    }
}

/// How the buyer left the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOutcome {
    /// The collaborator reported a successful payment.
    Success,
    /// The buyer closed the checkout.
    Dismissed,
}

/// Opens a checkout and resolves once the buyer pays or dismisses it.
///
/// No timeout is applied by callers: the wait lasts as long as the
/// collaborator keeps the checkout open.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Present `request` to the buyer. `Err` means the checkout could not be
    /// opened at all.
    async fn open(&self, request: CheckoutRequest) -> Result<PaymentOutcome>;
}

/// Checkout request awaiting an answer from the user interface.
#[derive(Debug)]
pub struct CheckoutPrompt {
    /// What to show.
    pub request: CheckoutRequest,
    respond: oneshot::Sender<PaymentOutcome>,
}

impl CheckoutPrompt {
    /// Answer the prompt, waking the waiting gateway.
    pub fn resolve(self, outcome: PaymentOutcome) {
        if self.respond.send(outcome).is_err() {
            warn!(order = %self.request.order_reference, "Checkout answered after caller left");
        }
    }
}

/// Payment gateway backed by a dialog in the frontend.
///
/// `open` forwards each request over a channel and waits for the frontend
/// to call [`CheckoutPrompt::resolve`].
#[derive(Debug, Clone)]
pub struct InteractiveCheckout {
    prompts: mpsc::Sender<CheckoutPrompt>,
}

impl InteractiveCheckout {
    /// Build the gateway and the receiver the frontend drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CheckoutPrompt>) {
        let (prompts, receiver) = mpsc::channel(capacity);
        (Self { prompts }, receiver)
    }
}

#[async_trait]
impl PaymentGateway for InteractiveCheckout {
    async fn open(&self, request: CheckoutRequest) -> Result<PaymentOutcome> {
        let (respond, answer) = oneshot::channel();
        let order = request.order_reference.clone();
        self.prompts
            .send(CheckoutPrompt { request, respond })
            .await
            .context("checkout dialog is unavailable")?;
        info!(%order, "Checkout opened");
        match answer.await {
            Ok(outcome) => Ok(outcome),
            Err(_) => {
                warn!(%order, "Checkout dropped without an answer; treating as dismissed");
                Ok(PaymentOutcome::Dismissed)
            }
        }
    }
}

/// Deterministic gateway that answers every request with a preset outcome
/// and records what it was asked.
#[derive(Debug)]
pub struct ScriptedCheckout {
    outcome: Result<PaymentOutcome, String>,
    requests: Mutex<Vec<CheckoutRequest>>,
}

impl ScriptedCheckout {
    /// Always answer `outcome`.
    pub fn answering(outcome: PaymentOutcome) -> Self {
        Self {
            outcome: Ok(outcome),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always fail to open with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(reason.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CheckoutRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedCheckout {
    async fn open(&self, request: CheckoutRequest) -> Result<PaymentOutcome> {
        self.requests.lock().push(request);
        self.outcome.clone().map_err(anyhow::Error::msg)
    }
}
