//! Product and category endpoints.

use super::{ApiError, ApiResult, AppState, ok_json};
use crate::{
    core::{
        category,
        product::{self, ProductInput, ProductUpdate},
        sku::{self, SkuRequest},
    },
    entities,
    errors::Error,
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/sku-preview", post(sku_preview))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/categories", get(list_categories).post(create_category))
}

#[derive(Debug, Deserialize)]
struct ProductQuery {
    /// Partial name or SKU
    search: Option<String>,
    /// Exact SKU
    sku: Option<String>,
}

/// `GET /products` lists active products, `?sku=` looks one up and `?search=`
/// returns matching names.
async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<serde_json::Value> {
    let value = if let Some(sku) = query.sku {
        let product = product::get_product_by_sku(&state.db, &sku)
            .await?
            .ok_or(Error::ProductNotFound { name: sku })?;
        serde_json::json!([product])
    } else if let Some(search) = query.search {
        serde_json::json!(product::suggest_product_names(&state.db, &search).await?)
    } else {
        serde_json::json!(product::get_all_active_products(&state.db).await?)
    };
    ok_json(Ok(value))
}

async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> ApiResult<entities::product::Model> {
    ok_json(product::create_product(&state.db, &state.settings.sku, input).await)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductDetail {
    #[serde(flatten)]
    product: entities::product::Model,
    stock: Vec<crate::core::warehouse::StockLine>,
}

async fn get_product(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<ProductDetail> {
    let product = product::get_product_by_id(&state.db, id)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or(Error::ProductNotFound {
            name: id.to_string(),
        })?;
    let stock = crate::core::warehouse::get_stock_for_product(&state.db, id).await?;
    ok_json(Ok(ProductDetail { product, stock }))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<ProductUpdate>,
) -> ApiResult<entities::product::Model> {
    ok_json(product::update_product(&state.db, id, update).await)
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<entities::product::Model> {
    ok_json(product::delete_product(&state.db, id).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SkuPreviewBody {
    name: String,
    brand: Option<String>,
    category_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SkuPreview {
    sku: String,
}

/// Shows the SKU a new product would get, without reserving it.
async fn sku_preview(
    State(state): State<AppState>,
    Json(body): Json<SkuPreviewBody>,
) -> Result<Json<super::ApiResponse<SkuPreview>>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(Error::validation("Product name cannot be empty").into());
    }
    let request = SkuRequest {
        name: &body.name,
        brand: body.brand.as_deref(),
        category_id: body.category_id,
    };
    let base = sku::preview_sku(&*state.db, &request, &state.settings.sku).await?;
    let sku = sku::ensure_unique_sku(&*state.db, &base, None).await?;
    ok_json(Ok(SkuPreview { sku }))
}

async fn list_categories(State(state): State<AppState>) -> ApiResult<Vec<entities::category::Model>> {
    ok_json(category::get_all_active_categories(&state.db).await)
}

#[derive(Debug, Deserialize)]
struct CategoryBody {
    name: String,
    description: Option<String>,
}

async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CategoryBody>,
) -> ApiResult<entities::category::Model> {
    ok_json(category::create_category(&state.db, body.name, body.description).await)
}
