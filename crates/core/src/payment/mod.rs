//! Order and payment collaborators.
//!
//! Both are opaque capabilities injected into the effect runner, so the
//! terminal checkout and the scripted test double are interchangeable.

/// Checkout request, outcome and payment gateways.
pub mod checkout;
/// Order creation gateways.
pub mod order;

pub use checkout::{
    CheckoutPrompt, CheckoutRequest, InteractiveCheckout, PaymentGateway, PaymentOutcome,
    Prefill, ScriptedCheckout,
};
pub use order::{Order, OrderGateway, SimulatedOrderGateway};
