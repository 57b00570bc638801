use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use async_trait::async_trait;
use pixelmart_core::{
    Controller, InteractiveCheckout, Modal, Order, OrderGateway, PaymentOutcome, Pricing,
    PurchaseForm, ScriptedCheckout, SimulatedOrderGateway, StoreEvent, Storefront,
    StorefrontError, StorefrontSettings,
};
use tokio::{sync::mpsc::Receiver, time::Instant};

const ORDER_LATENCY: Duration = Duration::from_millis(600);

struct RejectingOrders;

#[async_trait]
impl OrderGateway for RejectingOrders {
    async fn create_order(&self, _amount_major: u64) -> Result<Order> {
        bail!("order service unavailable")
    }
}

struct PanickingOrders;

#[async_trait]
impl OrderGateway for PanickingOrders {
    async fn create_order(&self, amount_major: u64) -> Result<Order> {
        panic!("order backend crashed while pricing {amount_major}");
    }
}

fn storefront() -> Storefront {
    Storefront::new(12, 24, StorefrontSettings::default())
}

fn simulated_orders() -> Arc<SimulatedOrderGateway> {
    Arc::new(SimulatedOrderGateway::new(ORDER_LATENCY, "INR"))
}

fn acme(simulate: bool) -> PurchaseForm {
    PurchaseForm {
        company_name: "Acme".to_string(),
        logo_url: "http://x/l.png".to_string(),
        simulate,
    }
}

/// Feed events back until no collaborator call is outstanding.
async fn settle(
    controller: &mut Controller,
    events: &mut Receiver<StoreEvent>,
) -> Vec<Result<(), StorefrontError>> {
    let mut outcomes = Vec::new();
    while controller.state().is_loading() {
        let event = events.recv().await.expect("effect runner alive");
        outcomes.push(controller.handle_event(event));
    }
    outcomes
}

fn owners_match_status(state: &Storefront) -> bool {
    state
        .slots()
        .slots()
        .iter()
        .all(|slot| slot.is_sold() == slot.owner().is_some())
}

#[tokio::test(start_paused = true)]
async fn real_purchase_settles_after_payment() -> Result<()> {
    let payments = Arc::new(ScriptedCheckout::answering(PaymentOutcome::Success));
    let (mut controller, mut events) =
        Controller::new(storefront(), simulated_orders(), payments.clone());

    controller.select(3)?;
    controller.submit(&acme(false))?;
    assert!(controller.state().is_loading());

    let started = Instant::now();
    let outcomes = settle(&mut controller, &mut events).await;
    assert!(started.elapsed() >= ORDER_LATENCY);
    assert!(outcomes.iter().all(Result::is_ok));

    let state = controller.state();
    let slot = state.slots().get(3)?;
    assert_eq!(slot.owner(), Some("Acme"));
    assert_eq!(slot.logo_url(), Some("http://x/l.png"));
    assert_eq!(state.slots().sold_count(), 1);
    assert_eq!(state.modal(), Modal::Closed);
    assert!(!state.is_loading());
    assert_eq!(
        state.notification().message(),
        Some("Payment successful - slot purchased!")
    );
    assert!(owners_match_status(state));

    let requests = payments.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].amount_minor, 80_000);
    assert_eq!(requests[0].currency, "INR");
    assert!(requests[0].order_reference.starts_with("order_fake_"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn dismissed_checkout_leaves_slot_available() -> Result<()> {
    let payments = Arc::new(ScriptedCheckout::answering(PaymentOutcome::Dismissed));
    let (mut controller, mut events) =
        Controller::new(storefront(), simulated_orders(), payments);

    controller.select(3)?;
    controller.submit(&acme(false))?;
    let outcomes = settle(&mut controller, &mut events).await;
    assert_eq!(
        outcomes.last(),
        Some(&Err(StorefrontError::PaymentCancelled))
    );

    let state = controller.state();
    assert!(!state.slots().get(3)?.is_sold());
    assert!(!state.is_loading());
    assert_eq!(state.modal(), Modal::Open { slot_id: 3 });
    assert_ne!(
        state.notification().message(),
        Some("Payment successful - slot purchased!")
    );

    // The dialog is still open, so the buyer can try again.
    controller.submit(&acme(false))?;
    assert!(controller.state().is_loading());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rejected_order_reports_failure() -> Result<()> {
    let payments = Arc::new(ScriptedCheckout::answering(PaymentOutcome::Success));
    let (mut controller, mut events) =
        Controller::new(storefront(), Arc::new(RejectingOrders), payments.clone());

    controller.select(7)?;
    controller.submit(&acme(false))?;
    let outcomes = settle(&mut controller, &mut events).await;

    assert!(matches!(
        outcomes.as_slice(),
        [Err(StorefrontError::OrderCreationFailed(reason))] if reason.contains("unavailable")
    ));
    let state = controller.state();
    assert_eq!(state.slots().sold_count(), 0);
    assert_eq!(
        state.notification().message(),
        Some("Payment failed or cancelled.")
    );
    assert!(payments.requests().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn crashed_order_service_unblocks_the_workflow() -> Result<()> {
    let payments = Arc::new(ScriptedCheckout::answering(PaymentOutcome::Success));
    let (mut controller, mut events) =
        Controller::new(storefront(), Arc::new(PanickingOrders), payments.clone());

    controller.select(4)?;
    controller.submit(&acme(false))?;
    let outcomes = settle(&mut controller, &mut events).await;

    assert!(matches!(
        outcomes.as_slice(),
        [Err(StorefrontError::OrderCreationFailed(_))]
    ));
    let state = controller.state();
    assert!(!state.is_loading());
    assert!(!state.slots().get(4)?.is_sold());
    assert_eq!(
        state.notification().message(),
        Some("Payment failed or cancelled.")
    );
    assert!(payments.requests().is_empty());

    // The buyer can try again once the failure is reported.
    controller.submit(&acme(false))?;
    assert!(controller.state().is_loading());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn oversized_price_fails_instead_of_hanging() -> Result<()> {
    let settings = StorefrontSettings {
        pricing: Pricing::new(u64::MAX / 50, 0, "INR", "₹"),
        ..StorefrontSettings::default()
    };
    let payments = Arc::new(ScriptedCheckout::answering(PaymentOutcome::Success));
    let (mut controller, mut events) = Controller::new(
        Storefront::new(1, 5, settings),
        simulated_orders(),
        payments,
    );

    controller.select(0)?;
    controller.submit(&acme(false))?;
    let outcomes = settle(&mut controller, &mut events).await;

    assert!(matches!(
        outcomes.as_slice(),
        [Err(StorefrontError::OrderCreationFailed(reason))] if reason.contains("too large")
    ));
    assert!(!controller.state().is_loading());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn checkout_that_cannot_open_is_a_failure() -> Result<()> {
    let payments = Arc::new(ScriptedCheckout::failing("sdk not loaded"));
    let (mut controller, mut events) =
        Controller::new(storefront(), simulated_orders(), payments);

    controller.select(0)?;
    controller.submit(&acme(false))?;
    let outcomes = settle(&mut controller, &mut events).await;

    assert!(matches!(
        outcomes.last(),
        Some(Err(StorefrontError::PaymentFailed(_)))
    ));
    assert!(!controller.state().slots().get(0)?.is_sold());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn simulated_purchase_banner_expires() -> Result<()> {
    let payments = Arc::new(ScriptedCheckout::answering(PaymentOutcome::Success));
    let (mut controller, mut events) =
        Controller::new(storefront(), simulated_orders(), payments.clone());

    controller.select(3)?;
    controller.submit(&acme(true))?;
    let state = controller.state();
    assert_eq!(state.slots().get(3)?.price(), 800);
    assert_eq!(state.modal(), Modal::Closed);
    assert_eq!(
        state.notification().message(),
        Some("Simulated purchase complete (dev mode).")
    );
    assert!(payments.requests().is_empty());

    let started = Instant::now();
    let event = events.recv().await.expect("expiry fires");
    assert!(started.elapsed() >= Duration::from_millis(3000));
    controller.handle_event(event)?;
    assert_eq!(controller.state().notification().message(), None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn newer_notification_survives_replaced_timer() -> Result<()> {
    let payments = Arc::new(ScriptedCheckout::answering(PaymentOutcome::Success));
    let (mut controller, mut events) =
        Controller::new(storefront(), simulated_orders(), payments);
    let started = Instant::now();

    controller.notify("A");
    tokio::time::advance(Duration::from_millis(1000)).await;
    controller.notify("B");

    tokio::time::advance(Duration::from_millis(2500)).await;
    tokio::task::yield_now().await;
    assert!(events.try_recv().is_err());
    assert_eq!(controller.state().notification().message(), Some("B"));

    let event = events.recv().await.expect("expiry for B");
    assert!(started.elapsed() <= Duration::from_millis(4001));
    controller.handle_event(event)?;
    assert_eq!(controller.state().notification().message(), None);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn sold_slot_cannot_be_reselected() -> Result<()> {
    let payments = Arc::new(ScriptedCheckout::answering(PaymentOutcome::Success));
    let (mut controller, _events) = Controller::new(storefront(), simulated_orders(), payments);

    controller.select(5)?;
    controller.submit(&acme(true))?;
    assert_eq!(
        controller.select(5),
        Err(StorefrontError::SlotAlreadySold(5))
    );
    assert_eq!(controller.state().modal(), Modal::Closed);
    assert_eq!(
        controller.state().notification().message(),
        Some("This slot has already been sold.")
    );
    Ok(())
}

#[tokio::test]
async fn interactive_checkout_round_trip() -> Result<()> {
    let (payments, mut prompts) = InteractiveCheckout::channel(1);
    let orders = Arc::new(SimulatedOrderGateway::new(Duration::from_millis(1), "INR"));
    let (mut controller, mut events) = Controller::new(storefront(), orders, Arc::new(payments));

    let frontend = tokio::spawn(async move {
        let prompt = prompts.recv().await.expect("checkout prompt");
        let description = prompt.request.description.clone();
        prompt.resolve(PaymentOutcome::Success);
        description
    });

    controller.select(9)?;
    controller.submit(&acme(false))?;
    settle(&mut controller, &mut events).await;

    assert_eq!(frontend.await?, "Buy pixel slot #9");
    assert_eq!(controller.state().slots().get(9)?.owner(), Some("Acme"));
    Ok(())
}
