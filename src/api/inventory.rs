//! Warehouse, stock and inventory movement endpoints.

use super::{ApiResult, AppState, Paging, ok_json};
use crate::{
    core::{
        Page,
        inventory::{
            self, GroupedTransfer, MovementFilters, MovementInput, MovementStats, MovementView,
            MultiTransferInput,
        },
        warehouse::{self, InventorySummary, StockLine, WarehouseUpdate},
    },
    entities,
    errors::Error,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, put},
};
use chrono::Utc;
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/warehouses", get(list_warehouses).post(create_warehouse))
        .route("/warehouses/:id", put(update_warehouse))
        .route("/warehouses/:id/stock", get(warehouse_stock))
        .route("/warehouses/:id/low-stock", get(low_stock))
        .route(
            "/inventory/movements",
            get(list_movements).post(create_movement),
        )
        .route("/inventory/movements/:id", get(get_movement))
        .route(
            "/inventory/transfers",
            get(list_transfers).post(create_transfer),
        )
        .route("/inventory/stats", get(stats))
        .route("/inventory/summary", get(summary))
        .route("/inventory/available", get(available))
}

async fn list_warehouses(State(state): State<AppState>) -> ApiResult<Vec<entities::warehouse::Model>> {
    ok_json(warehouse::get_all_active_warehouses(&state.db).await)
}

#[derive(Debug, Deserialize)]
struct WarehouseBody {
    name: String,
    location: Option<String>,
}

async fn create_warehouse(
    State(state): State<AppState>,
    Json(body): Json<WarehouseBody>,
) -> ApiResult<entities::warehouse::Model> {
    ok_json(warehouse::create_warehouse(&state.db, body.name, body.location).await)
}

async fn update_warehouse(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<WarehouseUpdate>,
) -> ApiResult<entities::warehouse::Model> {
    ok_json(warehouse::update_warehouse(&state.db, id, update).await)
}

async fn existing_warehouse(state: &AppState, id: i64) -> crate::errors::Result<()> {
    warehouse::get_warehouse_by_id(&state.db, id)
        .await?
        .ok_or(Error::WarehouseNotFound {
            name: id.to_string(),
        })
        .map(|_| ())
}

async fn warehouse_stock(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<StockLine>> {
    existing_warehouse(&state, id).await?;
    ok_json(warehouse::get_stock_for_warehouse(&state.db, id).await)
}

async fn low_stock(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<StockLine>> {
    existing_warehouse(&state, id).await?;
    ok_json(warehouse::get_low_stock_products(&state.db, id).await)
}

async fn list_movements(
    State(state): State<AppState>,
    Query(paging): Query<Paging>,
    Query(filters): Query<MovementFilters>,
) -> ApiResult<Page<MovementView>> {
    ok_json(inventory::list_movements(&state.db, &filters, paging.page, paging.limit).await)
}

async fn create_movement(
    State(state): State<AppState>,
    Json(input): Json<MovementInput>,
) -> ApiResult<MovementView> {
    let movement = inventory::create_movement(&state.db, input).await?;
    ok_json(inventory::get_movement(&state.db, movement.id).await)
}

async fn get_movement(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<MovementView> {
    ok_json(inventory::get_movement(&state.db, id).await)
}

async fn list_transfers(
    State(state): State<AppState>,
    Query(paging): Query<Paging>,
) -> ApiResult<Page<GroupedTransfer>> {
    ok_json(inventory::get_grouped_transfers(&state.db, paging.page, paging.limit).await)
}

async fn create_transfer(
    State(state): State<AppState>,
    Json(input): Json<MultiTransferInput>,
) -> ApiResult<Vec<entities::inventory_movement::Model>> {
    ok_json(inventory::create_multi_transfer(&state.db, input).await)
}

async fn stats(State(state): State<AppState>) -> ApiResult<MovementStats> {
    ok_json(inventory::get_movement_stats(&state.db, Utc::now()).await)
}

async fn summary(State(state): State<AppState>) -> ApiResult<InventorySummary> {
    ok_json(warehouse::get_inventory_summary(&state.db).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailableQuery {
    warehouse_id: Option<i64>,
}

async fn available(
    State(state): State<AppState>,
    Query(query): Query<AvailableQuery>,
) -> ApiResult<Vec<StockLine>> {
    ok_json(inventory::get_products_for_movement(&state.db, query.warehouse_id).await)
}
