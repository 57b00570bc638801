//! Application state and its transitions.
//!
//! Every operation borrows the current [`Storefront`] and returns a
//! [`Transition`]: the next state, the side effects the runtime must perform
//! and, when the operation was refused, the reason.

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    error::StorefrontError,
    form::PurchaseForm,
    models::{Slot, SlotId},
    notification::Notification,
    payment::{CheckoutRequest, Order, PaymentOutcome},
    pricing::Pricing,
    purchase::{AttemptId, PurchasePhase},
    selection::Modal,
    store::SlotStore,
};

const SIMULATED_NOTICE: &str = "Simulated purchase complete (dev mode).";
const SUCCESS_NOTICE: &str = "Payment successful - slot purchased!";

/// Fixed settings shared by every state snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorefrontSettings {
    /// Price schedule.
    pub pricing: Pricing,
    /// Merchant key passed to the checkout.
    pub key_id: String,
    /// Merchant name shown in the checkout.
    pub merchant_name: String,
    /// Lifetime of ordinary banners.
    pub notice_ttl: Duration,
    /// Lifetime of the payment success banner.
    pub success_ttl: Duration,
}

impl From<&AppConfig> for StorefrontSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            pricing: Pricing::from(&config.pricing),
            key_id: config.checkout.key_id.clone(),
            merchant_name: config.checkout.merchant_name.clone(),
            notice_ttl: config.notifications.ttl(),
            success_ttl: config.notifications.success_ttl(),
        }
    }
}

impl Default for StorefrontSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Clear banner `generation` after `ttl`, replacing any pending expiry.
    ScheduleExpiry {
        /// Banner generation to clear.
        generation: u64,
        /// Delay before clearing.
        ttl: Duration,
    },
    /// Ask the order service for an order.
    CreateOrder {
        /// Attempt tag.
        attempt: AttemptId,
        /// Price in major units.
        amount_major: u64,
    },
    /// Open the payment collaborator.
    OpenCheckout {
        /// Attempt tag.
        attempt: AttemptId,
        /// Checkout parameters.
        request: CheckoutRequest,
    },
}

/// Result of an effect, fed back into [`Storefront::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The order service answered.
    OrderCreated {
        /// Attempt tag.
        attempt: AttemptId,
        /// Order or the failure reason.
        result: Result<Order, StorefrontError>,
    },
    /// The payment collaborator answered.
    PaymentFinished {
        /// Attempt tag.
        attempt: AttemptId,
        /// Outcome or the failure reason.
        result: Result<PaymentOutcome, StorefrontError>,
    },
    /// A banner lifetime elapsed.
    NotificationExpired {
        /// Banner generation the timer was scheduled for.
        generation: u64,
    },
}

impl StoreEvent {
    /// Constructor usable as a plain `fn` pointer for the expiry timer.
    pub fn expired(generation: u64) -> Self {
        StoreEvent::NotificationExpired { generation }
    }
}

/// Next state plus what must happen because of it.
#[derive(Debug)]
#[must_use]
pub struct Transition {
    /// State after the operation.
    pub state: Storefront,
    /// Effects for the runtime, in order.
    pub effects: Vec<Effect>,
    /// Why the operation was refused, if it was.
    pub error: Option<StorefrontError>,
}

impl Transition {
    fn new(state: Storefront) -> Self {
        Self {
            state,
            effects: Vec::new(),
            error: None,
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Chain another operation on the resulting state, keeping both effect
    /// lists and the first error.
    fn then(self, step: impl FnOnce(&Storefront) -> Transition) -> Self {
        let next = step(&self.state);
        let mut effects = self.effects;
        effects.extend(next.effects);
        Self {
            state: next.state,
            effects,
            error: self.error.or(next.error),
        }
    }
}

/// Complete storefront state: slots, dialog, workflow and banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storefront {
    slots: SlotStore,
    modal: Modal,
    purchase: PurchasePhase,
    notification: Notification,
    next_attempt: u64,
    settings: Arc<StorefrontSettings>,
}

impl Storefront {
    /// Fresh grid of `rows * cols` available slots priced by `settings`.
    pub fn new(rows: usize, cols: usize, settings: StorefrontSettings) -> Self {
        let slots = SlotStore::initialize(rows, cols, |id| settings.pricing.price_for(id));
        Self {
            slots,
            modal: Modal::Closed,
            purchase: PurchasePhase::Idle,
            notification: Notification::default(),
            next_attempt: 1,
            settings: Arc::new(settings),
        }
    }

    /// Build the initial state from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.grid.rows,
            config.grid.cols,
            StorefrontSettings::from(config),
        )
    }

    /// Slot collection.
    pub fn slots(&self) -> &SlotStore {
        &self.slots
    }

    /// Dialog state.
    pub fn modal(&self) -> Modal {
        self.modal
    }

    /// Selected slot, if the dialog is open.
    pub fn selected(&self) -> Option<&Slot> {
        self.modal
            .selected()
            .and_then(|id| self.slots.get(id).ok())
    }

    /// Workflow phase.
    pub fn purchase(&self) -> &PurchasePhase {
        &self.purchase
    }

    /// True while an order or payment is outstanding.
    pub fn is_loading(&self) -> bool {
        self.purchase.is_loading()
    }

    /// Banner state.
    pub fn notification(&self) -> &Notification {
        &self.notification
    }

    /// Shared settings.
    pub fn settings(&self) -> &StorefrontSettings {
        &self.settings
    }

    /// Price schedule.
    pub fn pricing(&self) -> &Pricing {
        &self.settings.pricing
    }

    /// Show `message` for `ttl`, replacing any current banner.
    pub fn notify(&self, message: impl Into<String>, ttl: Duration) -> Transition {
        let mut next = self.clone();
        next.notification = self.notification.notify(message);
        let generation = next.notification.generation();
        Transition::new(next).with_effect(Effect::ScheduleExpiry { generation, ttl })
    }

    /// Clear the banner if `generation` is still current.
    pub fn expire_notification(&self, generation: u64) -> Transition {
        let mut next = self.clone();
        next.notification = self.notification.expire(generation);
        Transition::new(next)
    }

    /// Open the purchase dialog on `slot_id`.
    ///
    /// A sold slot raises a banner and leaves the dialog and selection as
    /// they were.
    pub fn select(&self, slot_id: SlotId) -> Transition {
        let slot = match self.slots.get(slot_id) {
            Ok(slot) => slot,
            Err(err) => return self.reject(err),
        };
        if self.purchase.is_loading() {
            return self.reject(StorefrontError::PurchaseInProgress);
        }
        if slot.is_sold() {
            return self.reject(StorefrontError::SlotAlreadySold(slot_id));
        }

        let mut next = self.clone();
        next.modal = Modal::Open { slot_id };
        next.purchase = PurchasePhase::Idle;
        debug!(slot_id, price = slot.price(), "Purchase dialog opened");
        Transition::new(next)
    }

    /// Close the dialog and drop the selection. An attempt still waiting on
    /// the order service is abandoned; its late result will be ignored.
    pub fn dismiss(&self) -> Transition {
        let mut next = self.clone();
        if let Some(attempt) = self.purchase.attempt() {
            warn!(%attempt, phase = self.purchase.label(), "Purchase abandoned by dismissal");
        }
        next.modal = Modal::Closed;
        next.purchase = PurchasePhase::Idle;
        Transition::new(next)
    }

    /// Submit the purchase form for the selected slot.
    pub fn submit(&self, form: &PurchaseForm) -> Transition {
        let Some(slot_id) = self.modal.selected() else {
            return self.reject(StorefrontError::NoSelection);
        };
        if self.purchase.is_loading() {
            return self.reject(StorefrontError::PurchaseInProgress);
        }
        let buyer = match form.validate() {
            Ok(buyer) => buyer,
            Err(err) => return self.reject(err),
        };
        let slot = match self.slots.get(slot_id) {
            Ok(slot) => slot,
            Err(err) => return self.reject(err),
        };
        if slot.is_sold() {
            return self.reject(StorefrontError::InvalidTransition(slot_id));
        }

        if form.simulate {
            let slots = match self.slots.mark_sold(slot_id, &buyer) {
                Ok(slots) => slots,
                Err(err) => return self.reject(err),
            };
            let mut next = self.clone();
            next.slots = slots;
            next.purchase = PurchasePhase::Settled { slot_id };
            next.modal = Modal::Closed;
            info!(slot_id, owner = %buyer.company_name, "Simulated purchase settled");
            let ttl = self.settings.notice_ttl;
            return Transition::new(next).then(|state| state.notify(SIMULATED_NOTICE, ttl));
        }

        let attempt = AttemptId(self.next_attempt);
        let amount_major = slot.price();
        let mut next = self.clone();
        next.next_attempt += 1;
        next.purchase = PurchasePhase::AwaitingOrder {
            attempt,
            slot_id,
            buyer,
        };
        info!(%attempt, slot_id, amount_major, "Creating order");
        Transition::new(next).with_effect(Effect::CreateOrder {
            attempt,
            amount_major,
        })
    }

    /// Handle the order service's answer for `attempt`.
    pub fn order_created(
        &self,
        attempt: AttemptId,
        result: Result<Order, StorefrontError>,
    ) -> Transition {
        let (slot_id, buyer) = match &self.purchase {
            PurchasePhase::AwaitingOrder {
                attempt: current,
                slot_id,
                buyer,
            } if *current == attempt => (*slot_id, buyer.clone()),
            _ => return self.ignore_stale(attempt),
        };

        let mut next = self.clone();
        match result {
            Ok(order) => {
                let request = CheckoutRequest::new(
                    self.settings.key_id.clone(),
                    self.settings.merchant_name.clone(),
                    slot_id,
                    &order,
                    &buyer,
                );
                info!(%attempt, reference = %order.reference, "Order created; opening checkout");
                next.purchase = PurchasePhase::AwaitingPayment {
                    attempt,
                    slot_id,
                    buyer,
                    order,
                };
                Transition::new(next).with_effect(Effect::OpenCheckout { attempt, request })
            }
            Err(err) => {
                warn!(%attempt, %err, "Order creation failed");
                next.purchase = PurchasePhase::Idle;
                next.reject(err)
            }
        }
    }

    /// Handle the payment collaborator's answer for `attempt`.
    pub fn payment_finished(
        &self,
        attempt: AttemptId,
        result: Result<PaymentOutcome, StorefrontError>,
    ) -> Transition {
        let (slot_id, buyer) = match &self.purchase {
            PurchasePhase::AwaitingPayment {
                attempt: current,
                slot_id,
                buyer,
                ..
            } if *current == attempt => (*slot_id, buyer.clone()),
            _ => return self.ignore_stale(attempt),
        };

        let mut next = self.clone();
        next.purchase = PurchasePhase::Idle;
        match result {
            Ok(PaymentOutcome::Success) => match self.slots.mark_sold(slot_id, &buyer) {
                Ok(slots) => {
                    next.slots = slots;
                    next.purchase = PurchasePhase::Settled { slot_id };
                    next.modal = Modal::Closed;
                    info!(%attempt, slot_id, owner = %buyer.company_name, "Payment settled");
                    let ttl = self.settings.success_ttl;
                    Transition::new(next).then(|state| state.notify(SUCCESS_NOTICE, ttl))
                }
                Err(err) => next.reject(err),
            },
            Ok(PaymentOutcome::Dismissed) => {
                info!(%attempt, slot_id, "Checkout dismissed");
                next.reject(StorefrontError::PaymentCancelled)
            }
            Err(err) => {
                warn!(%attempt, %err, "Checkout failed");
                next.reject(err)
            }
        }
    }

    /// Dispatch a runtime event to its transition.
    pub fn apply(&self, event: StoreEvent) -> Transition {
        match event {
            StoreEvent::OrderCreated { attempt, result } => self.order_created(attempt, result),
            StoreEvent::PaymentFinished { attempt, result } => {
                self.payment_finished(attempt, result)
            }
            StoreEvent::NotificationExpired { generation } => self.expire_notification(generation),
        }
    }

    fn reject(&self, error: StorefrontError) -> Transition {
        debug!(%error, "Operation rejected");
        let mut transition = self.notify(error.user_message(), self.settings.notice_ttl);
        transition.error = Some(error);
        transition
    }

    fn ignore_stale(&self, attempt: AttemptId) -> Transition {
        debug!(%attempt, phase = self.purchase.label(), "Ignoring result for inactive attempt");
        Transition::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn storefront() -> Storefront {
        Storefront::new(2, 5, StorefrontSettings::default())
    }

    fn form(simulate: bool) -> PurchaseForm {
        PurchaseForm {
            company_name: "Acme".to_string(),
            logo_url: "http://x/l.png".to_string(),
            simulate,
        }
    }

    fn order() -> Order {
        Order {
            reference: "order_fake_0000abcd".to_string(),
            amount_minor: 80_000,
            currency: "INR".to_string(),
            created_at: Utc::now(),
        }
    }

    fn invariant_holds(state: &Storefront) -> bool {
        let owners_match = state
            .slots()
            .slots()
            .iter()
            .all(|slot| slot.is_sold() == slot.owner().is_some());
        let modal_has_selection = !state.modal().is_visible() || state.selected().is_some();
        owners_match && modal_has_selection
    }

    /// Select slot 3 and submit the real path up to the checkout.
    fn awaiting_payment() -> (Storefront, AttemptId) {
        let state = storefront().select(3).state;
        let submitted = state.submit(&form(false));
        let attempt = match submitted.effects.as_slice() {
            [Effect::CreateOrder { attempt, .. }] => *attempt,
            other => panic!("unexpected effects {other:?}"),
        };
        let opened = submitted.state.order_created(attempt, Ok(order()));
        (opened.state, attempt)
    }

    #[test]
    fn simulate_purchase_settles_selected_slot() {
        let selected = storefront().select(3);
        assert!(selected.error.is_none());
        assert_eq!(selected.state.modal(), Modal::Open { slot_id: 3 });

        let done = selected.state.submit(&form(true));
        let state = &done.state;
        let slot = state.slots().get(3).expect("slot 3 exists");
        assert!(slot.is_sold());
        assert_eq!(slot.owner(), Some("Acme"));
        assert_eq!(slot.logo_url(), Some("http://x/l.png"));
        assert_eq!(slot.price(), 800);
        assert_eq!(state.modal(), Modal::Closed);
        assert_eq!(state.notification().message(), Some(SIMULATED_NOTICE));
        assert!(matches!(
            done.effects.as_slice(),
            [Effect::ScheduleExpiry { .. }]
        ));
        assert!(!state.is_loading());
        assert!(invariant_holds(state));
    }

    #[test]
    fn selecting_sold_slot_changes_nothing_but_banner() {
        let sold = storefront().select(3).state.submit(&form(true)).state;
        let reopened = sold.select(1).state;

        let attempt = reopened.select(3);
        assert_eq!(attempt.error, Some(StorefrontError::SlotAlreadySold(3)));
        assert_eq!(attempt.state.modal(), Modal::Open { slot_id: 1 });
        assert_eq!(
            attempt.state.notification().message(),
            Some("This slot has already been sold.")
        );
        assert_eq!(attempt.state.slots(), reopened.slots());
    }

    #[test]
    fn unknown_slot_is_reported() {
        let attempt = storefront().select(42);
        assert_eq!(attempt.error, Some(StorefrontError::NotFound(42)));
        assert_eq!(attempt.state.modal(), Modal::Closed);
    }

    #[test]
    fn dismiss_clears_selection() {
        let state = storefront().select(2).state.dismiss().state;
        assert_eq!(state.modal(), Modal::Closed);
        assert!(state.selected().is_none());
        assert!(invariant_holds(&state));
    }

    #[test]
    fn blank_company_keeps_dialog_open() {
        let state = storefront().select(2).state;
        let mut blank = form(true);
        blank.company_name.clear();
        let rejected = state.submit(&blank);
        assert_eq!(rejected.error, Some(StorefrontError::MissingCompanyName));
        assert_eq!(rejected.state.modal(), Modal::Open { slot_id: 2 });
        assert_eq!(rejected.state.slots().sold_count(), 0);
    }

    #[test]
    fn submit_without_selection_is_rejected() {
        let rejected = storefront().submit(&form(true));
        assert_eq!(rejected.error, Some(StorefrontError::NoSelection));
    }

    #[test]
    fn real_path_requests_order_then_checkout() {
        let state = storefront().select(3).state;
        let submitted = state.submit(&form(false));
        assert!(submitted.state.is_loading());
        let attempt = match submitted.effects.as_slice() {
            [Effect::CreateOrder {
                attempt,
                amount_major,
            }] => {
                assert_eq!(*amount_major, 800);
                *attempt
            }
            other => panic!("unexpected effects {other:?}"),
        };

        let opened = submitted.state.order_created(attempt, Ok(order()));
        assert!(opened.state.is_loading());
        match opened.effects.as_slice() {
            [Effect::OpenCheckout { request, .. }] => {
                assert_eq!(request.amount_minor, 80_000);
                assert_eq!(request.prefill.name, "Acme");
                assert_eq!(request.description, "Buy pixel slot #3");
                assert_eq!(request.merchant_name, "Bestinindia");
            }
            other => panic!("unexpected effects {other:?}"),
        }
    }

    #[test]
    fn loading_gates_resubmission() {
        let (state, _) = awaiting_payment();
        let again = state.submit(&form(false));
        assert_eq!(again.error, Some(StorefrontError::PurchaseInProgress));
        assert!(!again
            .effects
            .iter()
            .any(|effect| matches!(effect, Effect::CreateOrder { .. })));
    }

    #[test]
    fn payment_success_settles_once() {
        let (state, attempt) = awaiting_payment();
        let paid = state.payment_finished(attempt, Ok(PaymentOutcome::Success));
        let state = &paid.state;
        assert_eq!(state.slots().get(3).map(|slot| slot.owner()), Ok(Some("Acme")));
        assert_eq!(state.slots().sold_count(), 1);
        assert_eq!(state.modal(), Modal::Closed);
        assert!(!state.is_loading());
        assert_eq!(state.notification().message(), Some(SUCCESS_NOTICE));
        assert!(matches!(
            paid.effects.as_slice(),
            [Effect::ScheduleExpiry { ttl, .. }] if *ttl == Duration::from_millis(4000)
        ));

        let replay = state.payment_finished(attempt, Ok(PaymentOutcome::Success));
        assert_eq!(replay.state.slots(), state.slots());
        assert!(replay.effects.is_empty());
    }

    #[test]
    fn payment_dismissal_returns_to_idle() {
        let (state, attempt) = awaiting_payment();
        let dismissed = state.payment_finished(attempt, Ok(PaymentOutcome::Dismissed));
        let state = &dismissed.state;
        assert_eq!(dismissed.error, Some(StorefrontError::PaymentCancelled));
        assert!(!state.slots().get(3).map(Slot::is_sold).unwrap_or(true));
        assert!(!state.is_loading());
        assert_eq!(state.purchase(), &PurchasePhase::Idle);
        assert_eq!(state.modal(), Modal::Open { slot_id: 3 });
        assert_ne!(state.notification().message(), Some(SUCCESS_NOTICE));
        assert!(invariant_holds(state));
    }

    #[test]
    fn order_failure_leaves_store_untouched() {
        let state = storefront().select(4).state;
        let submitted = state.submit(&form(false));
        let attempt = submitted.state.purchase().attempt().expect("attempt in flight");
        let failed = submitted.state.order_created(
            attempt,
            Err(StorefrontError::OrderCreationFailed("timeout".into())),
        );
        assert!(!failed.state.is_loading());
        assert_eq!(failed.state.slots().sold_count(), 0);
        assert_eq!(
            failed.state.notification().message(),
            Some("Payment failed or cancelled.")
        );
    }

    #[test]
    fn late_order_after_dismiss_is_ignored() {
        let submitted = storefront().select(4).state.submit(&form(false));
        let attempt = submitted.state.purchase().attempt().expect("attempt in flight");
        let closed = submitted.state.dismiss().state;

        let late = closed.order_created(attempt, Ok(order()));
        assert!(late.effects.is_empty());
        assert_eq!(late.state, closed);
    }

    #[test]
    fn select_is_refused_while_loading() {
        let (state, _) = awaiting_payment();
        let attempt = state.select(0);
        assert_eq!(attempt.error, Some(StorefrontError::PurchaseInProgress));
        assert_eq!(attempt.state.modal(), Modal::Open { slot_id: 3 });
    }

    #[test]
    fn apply_routes_expiry() {
        let noticed = storefront().notify("hello", Duration::from_secs(1)).state;
        let generation = noticed.notification().generation();
        let cleared = noticed.apply(StoreEvent::expired(generation)).state;
        assert_eq!(cleared.notification().message(), None);
    }
}
