//! Executes transition effects on tokio tasks and feeds the results back as
//! [`StoreEvent`]s.

use std::{future::Future, sync::Arc};

use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::{
    error::StorefrontError,
    form::PurchaseForm,
    models::SlotId,
    notification::ExpiryTimer,
    payment::{OrderGateway, PaymentGateway},
    state::{Effect, StoreEvent, Storefront, Transition},
};

/// Capacity of the event channel between effects and the state owner.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Runs effects against the injected collaborators.
pub struct EffectRunner {
    orders: Arc<dyn OrderGateway>,
    payments: Arc<dyn PaymentGateway>,
    events: mpsc::Sender<StoreEvent>,
    expiry: ExpiryTimer,
}

impl EffectRunner {
    /// Build a runner and the receiver its results arrive on.
    pub fn new(
        orders: Arc<dyn OrderGateway>,
        payments: Arc<dyn PaymentGateway>,
    ) -> (Self, mpsc::Receiver<StoreEvent>) {
        let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let runner = Self {
            orders,
            payments,
            events,
            expiry: ExpiryTimer::default(),
        };
        (runner, receiver)
    }

    /// Start every effect. Must be called from within a tokio runtime.
    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.run_one(effect);
        }
    }

    fn run_one(&mut self, effect: Effect) {
        match effect {
            Effect::ScheduleExpiry { generation, ttl } => {
                self.expiry
                    .schedule(generation, ttl, self.events.clone(), StoreEvent::expired);
            }
            Effect::CreateOrder {
                attempt,
                amount_major,
            } => {
                let orders = Arc::clone(&self.orders);
                let events = self.events.clone();
                tokio::spawn(async move {
                    let result =
                        guarded(async move { orders.create_order(amount_major).await })
                            .await
                            .map_err(StorefrontError::OrderCreationFailed);
                    send(&events, StoreEvent::OrderCreated { attempt, result }).await;
                });
            }
            Effect::OpenCheckout { attempt, request } => {
                if let Ok(payload) = serde_json::to_string(&request) {
                    debug!(%attempt, %payload, "Opening checkout");
                }
                let payments = Arc::clone(&self.payments);
                let events = self.events.clone();
                tokio::spawn(async move {
                    // No timeout: the collaborator decides how long the buyer may take.
                    let result = guarded(async move { payments.open(request).await })
                        .await
                        .map_err(StorefrontError::PaymentFailed);
                    send(&events, StoreEvent::PaymentFinished { attempt, result }).await;
                });
            }
        }
    }
}

/// Run a collaborator call on its own task so that a panic inside it still
/// yields an error result instead of silence.
async fn guarded<T, F>(call: F) -> Result<T, String>
where
    T: Send + 'static,
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    match tokio::spawn(call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(join_err) => {
            error!(%join_err, "Collaborator task aborted");
            Err(format!("collaborator task failed: {join_err}"))
        }
    }
}

async fn send(events: &mpsc::Sender<StoreEvent>, event: StoreEvent) {
    if events.send(event).await.is_err() {
        warn!("Storefront event receiver closed; dropping result");
    }
}

/// Owns the current [`Storefront`] and applies transitions to it, running
/// their effects as it goes. Frontends call the operation methods and feed
/// everything received from the event channel into [`Controller::handle_event`].
pub struct Controller {
    state: Storefront,
    runner: EffectRunner,
}

impl Controller {
    /// Wire a state to its collaborators.
    pub fn new(
        state: Storefront,
        orders: Arc<dyn OrderGateway>,
        payments: Arc<dyn PaymentGateway>,
    ) -> (Self, mpsc::Receiver<StoreEvent>) {
        let (runner, events) = EffectRunner::new(orders, payments);
        (Self { state, runner }, events)
    }

    /// Current state snapshot.
    pub fn state(&self) -> &Storefront {
        &self.state
    }

    /// See [`Storefront::select`].
    pub fn select(&mut self, slot_id: SlotId) -> Result<(), StorefrontError> {
        let transition = self.state.select(slot_id);
        self.commit(transition)
    }

    /// See [`Storefront::dismiss`].
    pub fn dismiss(&mut self) {
        let transition = self.state.dismiss();
        let _ = self.commit(transition);
    }

    /// See [`Storefront::submit`].
    pub fn submit(&mut self, form: &PurchaseForm) -> Result<(), StorefrontError> {
        let transition = self.state.submit(form);
        self.commit(transition)
    }

    /// Show a banner through the regular expiry machinery.
    pub fn notify(&mut self, message: impl Into<String>) {
        let ttl = self.state.settings().notice_ttl;
        let transition = self.state.notify(message, ttl);
        let _ = self.commit(transition);
    }

    /// Apply an event produced by an earlier effect.
    pub fn handle_event(&mut self, event: StoreEvent) -> Result<(), StorefrontError> {
        let transition = self.state.apply(event);
        self.commit(transition)
    }

    fn commit(&mut self, transition: Transition) -> Result<(), StorefrontError> {
        let Transition {
            state,
            effects,
            error,
        } = transition;
        self.state = state;
        self.runner.run(effects);
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
