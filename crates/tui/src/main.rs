mod app;

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    sync::Arc,
};

use pixelmart_core::{
    config::{self, AppConfig},
    Controller, InteractiveCheckout, SimulatedOrderGateway, Storefront,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Only one checkout can be open at a time.
const CHECKOUT_QUEUE: usize = 1;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    info!(
        rows = config.grid.rows,
        cols = config.grid.cols,
        merchant = %config.checkout.merchant_name,
        "Starting storefront"
    );

    let storefront = Storefront::from_config(&config);
    let orders = Arc::new(SimulatedOrderGateway::new(
        config.checkout.order_latency(),
        storefront.pricing().currency(),
    ));
    let (payments, prompts) = InteractiveCheckout::channel(CHECKOUT_QUEUE);
    let (controller, events) = Controller::new(storefront, orders, Arc::new(payments));

    let mut app = app::StorefrontApp::new(config, controller);
    app.attach_channels(events, prompts);
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("pixelmart.log");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal belongs to the UI, so logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
