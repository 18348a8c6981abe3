//! Shared test utilities for the back office.
//!
//! This module provides common helper functions for setting up test databases,
//! creating catalog and warehouse fixtures with sensible defaults, and fakes for
//! the WhatsApp transport and the AI provider.

use crate::{
    config::SkuSettings,
    core::{
        ai::{ChatProvider, CompletionRequest, CompletionResponse, Usage},
        category,
        inventory::{self, MovementInput, MovementType},
        product::{self, ProductInput},
        warehouse,
        whatsapp::MessageTransport,
    },
    entities,
    errors::{Error, Result},
};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::sync::{Mutex, PoisonError};
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output through the test harness; safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test category without a description.
pub async fn create_test_category(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::category::Model> {
    category::create_category(db, name.to_string(), None).await
}

/// Creates a test product with sensible defaults.
///
/// # Defaults
/// * `sku`: generated from the name
/// * `product_type`: "stockable"
/// * `price`: 1000.0
/// * `min_stock`: 0.0
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::product::Model> {
    product::create_product(
        db,
        &SkuSettings::default(),
        ProductInput {
            name: name.to_string(),
            price: 1000.0,
            ..Default::default()
        },
    )
    .await
}

/// Creates a test product with a fixed SKU.
pub async fn create_product_with_sku(
    db: &DatabaseConnection,
    name: &str,
    sku: &str,
) -> Result<entities::product::Model> {
    product::create_product(
        db,
        &SkuSettings::default(),
        ProductInput {
            name: name.to_string(),
            sku: Some(sku.to_string()),
            price: 1000.0,
            ..Default::default()
        },
    )
    .await
}

/// Creates a test product with a reorder threshold.
pub async fn create_product_with_min_stock(
    db: &DatabaseConnection,
    name: &str,
    min_stock: f64,
) -> Result<entities::product::Model> {
    product::create_product(
        db,
        &SkuSettings::default(),
        ProductInput {
            name: name.to_string(),
            price: 1000.0,
            min_stock,
            ..Default::default()
        },
    )
    .await
}

/// Creates an active test warehouse without a location.
pub async fn create_test_warehouse(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::warehouse::Model> {
    warehouse::create_warehouse(db, name.to_string(), None).await
}

/// Sets up a warehouse ("Bodega Central") and a product ("Toalla").
///
/// When `quantity` is positive the stock is loaded with a single entry
/// movement, so the movement history holds exactly one row.
/// Returns (db, warehouse, product).
pub async fn setup_with_stock(
    quantity: f64,
) -> Result<(
    DatabaseConnection,
    entities::warehouse::Model,
    entities::product::Model,
)> {
    let db = setup_test_db().await?;
    let warehouse = create_test_warehouse(&db, "Bodega Central").await?;
    let product = create_test_product(&db, "Toalla").await?;

    if quantity > 0.0 {
        inventory::create_movement(
            &db,
            MovementInput {
                product_id: product.id,
                from_warehouse_id: None,
                to_warehouse_id: Some(warehouse.id),
                movement_type: MovementType::Entry,
                quantity,
                reason: Some("Stock inicial".to_string()),
                notes: None,
                user_id: Some("test_user".to_string()),
            },
        )
        .await?;
    }

    Ok((db, warehouse, product))
}

/// Transport that records every message instead of sending it.
#[derive(Debug)]
pub struct RecordingTransport {
    connected: bool,
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingTransport {
    /// A transport that accepts sends.
    pub fn connected() -> Self {
        Self {
            connected: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A transport that reports itself offline and rejects sends.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// (to, body) pairs sent so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<String> {
        if !self.connected {
            return Err(Error::TransportUnavailable {
                message: "test transport is offline".to_string(),
            });
        }
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        sent.push((to.to_string(), body.to_string()));
        Ok(format!("wamid.test.{}", sent.len()))
    }
}

/// AI provider returning a scripted answer and recording every request.
#[derive(Debug)]
pub struct MockProvider {
    reply: std::result::Result<(String, Usage), String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    /// Answers every request with `text` and the given token counts.
    pub fn replying(text: &str, input_tokens: i64, output_tokens: i64) -> Self {
        Self {
            reply: Ok((
                text.to_string(),
                Usage {
                    input_tokens,
                    output_tokens,
                },
            )),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails every request with [`Error::Ai`].
    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn is_configured(&self) -> bool {
        self.reply.is_ok()
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        match &self.reply {
            Ok((text, usage)) => Ok(CompletionResponse {
                text: text.clone(),
                model: request.model.clone(),
                usage: Some(*usage),
            }),
            Err(message) => Err(Error::Ai {
                message: message.clone(),
            }),
        }
    }
}
