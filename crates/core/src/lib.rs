#![warn(clippy::all, missing_docs)]

//! Core domain logic for the PixelMart storefront.
//!
//! This crate hosts the slot model, the purchase state machine,
//! configuration handling, and the order/payment collaborators
//! used by the terminal UI and any future frontends.

pub mod config;
pub mod error;
pub mod form;
pub mod models;
pub mod notification;
pub mod payment;
pub mod pricing;
pub mod purchase;
pub mod runtime;
pub mod selection;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use error::{StoreResult, StorefrontError};
pub use form::PurchaseForm;
pub use models::{BuyerDetails, Sale, Slot, SlotId, SlotStatus};
pub use payment::{
    CheckoutPrompt, CheckoutRequest, InteractiveCheckout, Order, OrderGateway, PaymentGateway,
    PaymentOutcome, ScriptedCheckout, SimulatedOrderGateway,
};
pub use pricing::Pricing;
pub use purchase::{AttemptId, PurchasePhase};
pub use runtime::{Controller, EffectRunner};
pub use selection::Modal;
pub use state::{Effect, StoreEvent, Storefront, StorefrontSettings, Transition};
pub use store::SlotStore;
