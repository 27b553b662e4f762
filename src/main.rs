use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod application;
mod config;
mod domain;
mod metrics;
mod outbox;
mod persistence;
mod utils;

use application::{AddItem, OrderService, ProductCreate, ProductService, ProductUpdate};
use config::AppConfig;
use metrics::Metrics;
use persistence::{InMemoryStore, SqliteStore, UnitOfWorkFactory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_inventory=debug"))
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        database_url = %config.database_url,
        metrics_port = config.metrics_port,
        retry_attempts = config.retry_attempts,
        "Starting order inventory demo"
    );

    // === 1. Initialize Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);

    // Metrics server runs on its own actix system in a background thread
    let registry = metrics.registry().clone();
    let port = config.metrics_port;
    std::thread::spawn(move || {
        let result = actix_web::rt::System::new()
            .block_on(metrics::start_metrics_server(registry, port));
        if let Err(e) = result {
            tracing::error!(error = %e, "Metrics server error");
        }
    });

    // === 2. Open the store ===
    if config.uses_memory_store() {
        tracing::info!("Using in-memory store");
        run_demo(Arc::new(InMemoryStore::new()), metrics, &config).await
    } else {
        let store = SqliteStore::connect(&config.database_url).await?;
        run_demo(Arc::new(store), metrics, &config).await
    }
}

async fn run_demo<F: UnitOfWorkFactory>(
    store: Arc<F>,
    metrics: Arc<Metrics>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let products = ProductService::new(store.clone(), metrics.clone(), config.retry_config());
    let orders = OrderService::new(store.clone(), metrics.clone(), config.retry_config());

    // === 3. Stock the catalogue ===
    let widget = products
        .create_product(&ProductCreate {
            name: "Widget".to_string(),
            price: 10.0,
            quantity: 5,
        })
        .await?;
    let gadget = products
        .create_product(&ProductCreate {
            name: "Gadget".to_string(),
            price: 24.5,
            quantity: 3,
        })
        .await?;
    let widget_id = widget.id.ok_or_else(|| anyhow::anyhow!("widget was not assigned an id"))?;
    let gadget_id = gadget.id.ok_or_else(|| anyhow::anyhow!("gadget was not assigned an id"))?;

    let repriced = ProductUpdate {
        price: Some(12.0),
        ..ProductUpdate::default()
    };
    products.update_product(widget_id, &repriced).await?;

    // === 4. Order lifecycle: add, reject, confirm ===
    let order = orders.create_order(1).await?;
    let order_id = order.id.ok_or_else(|| anyhow::anyhow!("order was not assigned an id"))?;

    orders.add_item(order_id, AddItem { product_id: widget_id, quantity: 2 }).await?;
    orders.add_item(order_id, AddItem { product_id: gadget_id, quantity: 1 }).await?;

    match orders.add_item(order_id, AddItem { product_id: widget_id, quantity: 10 }).await {
        Ok(_) => tracing::warn!("Over-stock add was unexpectedly accepted"),
        Err(e) => tracing::info!(error = %e, "Over-stock add rejected as expected"),
    }

    let confirmed = orders.confirm_order(order_id).await?;
    tracing::info!(
        order_id,
        status = %confirmed.status,
        total_amount = confirmed.total_amount,
        items = confirmed.items_count,
        "Order confirmed"
    );

    // === 5. Second order, cancelled with stock restoration ===
    let second = orders.create_order(2).await?;
    let second_id = second.id.ok_or_else(|| anyhow::anyhow!("order was not assigned an id"))?;
    orders.add_item(second_id, AddItem { product_id: gadget_id, quantity: 2 }).await?;
    let reserved = products.get_product(gadget_id).await?;
    tracing::info!(stock = reserved.quantity, "Gadget stock after reservation");

    orders.cancel_order(second_id).await?;
    let restored = products.get_product(gadget_id).await?;
    tracing::info!(stock = restored.quantity, "Gadget stock after cancellation");

    orders.deliver_order(order_id).await?;

    // === 6. Show what the outbox captured ===
    for message in store.outbox(100).await? {
        tracing::info!(
            aggregate_type = %message.aggregate_type,
            aggregate_id = message.aggregate_id,
            event_type = %message.event_type,
            correlation_id = %message.correlation_id,
            "Outbox entry"
        );
    }

    for view in products.list_products(0, 10).await? {
        tracing::info!(product_id = ?view.id, name = %view.name, quantity = view.quantity, "Final stock");
    }

    tracing::info!("Demo complete");

    Ok(())
}
