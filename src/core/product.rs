//! Product business logic - Handles the product catalog.
//!
//! Products are the items the hotel stocks, sells or consumes. Each one has a
//! unique SKU, either entered by staff or generated from its name, brand and
//! category (see [`super::sku`]). Deleting a product is a soft delete so that
//! stock rows and movement history keep pointing at it.

use crate::{
    config::SkuSettings,
    core::{
        nullable,
        sku::{self, SkuRequest},
    },
    entities::{Category, Product, product},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};
use serde::Deserialize;
use tracing::info;

/// Allowed values for `product_type`.
pub const PRODUCT_TYPES: &[&str] = &["stockable", "consumable", "service", "combo"];

/// Maximum number of names returned by [`suggest_product_names`].
const MAX_SUGGESTIONS: usize = 25;

/// Fields for a new product.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    /// Display name
    pub name: String,
    /// SKU to use instead of a generated one
    #[serde(default)]
    pub sku: Option<String>,
    /// Optional brand
    #[serde(default)]
    pub brand: Option<String>,
    /// Optional category
    #[serde(default)]
    pub category_id: Option<i64>,
    /// One of [`PRODUCT_TYPES`], defaults to `stockable`
    #[serde(default)]
    pub product_type: Option<String>,
    /// Unit price
    #[serde(default)]
    pub price: f64,
    /// Reorder threshold
    #[serde(default)]
    pub min_stock: f64,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update of a product; `None` leaves a field unchanged.
///
/// `brand`, `category_id` and `description` take `Some(None)` (JSON `null`)
/// to clear the value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    /// New name
    pub name: Option<String>,
    /// New SKU
    pub sku: Option<String>,
    /// New brand
    #[serde(default, deserialize_with = "nullable")]
    pub brand: Option<Option<String>>,
    /// New category
    #[serde(default, deserialize_with = "nullable")]
    pub category_id: Option<Option<i64>>,
    /// New product type
    pub product_type: Option<String>,
    /// New price
    pub price: Option<f64>,
    /// New reorder threshold
    pub min_stock: Option<f64>,
    /// New description
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Product name cannot be empty"));
    }
    Ok(name.to_string())
}

fn validate_price(price: f64) -> Result<f64> {
    if !price.is_finite() || price < 0.0 {
        return Err(Error::InvalidAmount { amount: price });
    }
    Ok(price)
}

fn validate_min_stock(min_stock: f64) -> Result<f64> {
    if !min_stock.is_finite() || min_stock < 0.0 {
        return Err(Error::InvalidQuantity {
            quantity: min_stock,
        });
    }
    Ok(min_stock)
}

fn validate_product_type(product_type: &str) -> Result<String> {
    let normalized = product_type.trim().to_lowercase();
    if PRODUCT_TYPES.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(Error::validation(format!(
            "Invalid product type '{product_type}', expected one of: {}",
            PRODUCT_TYPES.join(", ")
        )))
    }
}

/// Trims and uppercases a staff-entered SKU; blank means "generate one".
fn normalize_sku(sku: Option<&str>) -> Option<String> {
    sku.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty())
}

async fn ensure_category_exists(db: &DatabaseConnection, category_id: Option<i64>) -> Result<()> {
    if let Some(id) = category_id {
        let exists = Category::find_by_id(id)
            .one(db)
            .await?
            .is_some_and(|c| !c.is_deleted);
        if !exists {
            return Err(Error::CategoryNotFound {
                name: id.to_string(),
            });
        }
    }
    Ok(())
}

/// Retrieves all active (non-deleted) products, ordered alphabetically by name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_active_products(db: &DatabaseConnection) -> Result<Vec<product::Model>> {
    Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .order_by_asc(product::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds an active product by exact name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_product_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<product::Model>> {
    Product::find()
        .filter(product::Column::Name.eq(name))
        .filter(product::Column::IsDeleted.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds an active product by SKU (case-insensitive input).
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_product_by_sku(
    db: &DatabaseConnection,
    sku: &str,
) -> Result<Option<product::Model>> {
    Product::find()
        .filter(product::Column::Sku.eq(sku.trim().to_uppercase()))
        .filter(product::Column::IsDeleted.eq(false))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a product by ID, including deleted ones.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_product_by_id(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Option<product::Model>> {
    Product::find_by_id(product_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Active product names containing `partial`, case-insensitively, for autocomplete.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn suggest_product_names(db: &DatabaseConnection, partial: &str) -> Result<Vec<String>> {
    let needle = partial.to_lowercase();
    Ok(get_all_active_products(db)
        .await?
        .into_iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&needle) || p.sku.to_lowercase().contains(&needle)
        })
        .map(|p| p.name)
        .take(MAX_SUGGESTIONS)
        .collect())
}

/// Creates a product, generating a SKU when none is supplied.
///
/// A supplied SKU is trimmed and uppercased and must not be in use. A
/// generated SKU is made unique with a numeric suffix if it collides with a
/// manually entered one.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - The price or minimum stock is negative or not finite
/// - The product type is not one of [`PRODUCT_TYPES`]
/// - The category does not exist
/// - The supplied SKU is already used by another product
/// - A database operation fails
pub async fn create_product(
    db: &DatabaseConnection,
    sku_settings: &SkuSettings,
    input: ProductInput,
) -> Result<product::Model> {
    let name = validate_name(&input.name)?;
    let price = validate_price(input.price)?;
    let min_stock = validate_min_stock(input.min_stock)?;
    let product_type = validate_product_type(input.product_type.as_deref().unwrap_or("stockable"))?;
    let brand = input
        .brand
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty());

    ensure_category_exists(db, input.category_id).await?;

    let sku = if let Some(sku) = normalize_sku(input.sku.as_deref()) {
        if !sku::is_sku_unique(db, &sku, None).await? {
            return Err(Error::DuplicateSku { sku });
        }
        sku
    } else {
        let request = SkuRequest {
            name: &name,
            brand: brand.as_deref(),
            category_id: input.category_id,
        };
        let generated = sku::generate_sku(db, &request, sku_settings).await;
        sku::ensure_unique_sku(db, &generated, None).await?
    };

    let now = chrono::Utc::now().naive_utc();
    let product = product::ActiveModel {
        name: Set(name),
        sku: Set(sku),
        brand: Set(brand),
        category_id: Set(input.category_id),
        product_type: Set(product_type),
        price: Set(price),
        min_stock: Set(min_stock),
        description: Set(input.description),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created product {} ({})", product.name, product.sku);
    Ok(product)
}

/// Applies a partial update to an active product.
///
/// # Errors
/// Returns an error if:
/// - Any supplied field fails the same validation as [`create_product`]
/// - The new SKU is used by a different product
/// - The product does not exist or is deleted
/// - The database update fails
pub async fn update_product(
    db: &DatabaseConnection,
    product_id: i64,
    update: ProductUpdate,
) -> Result<product::Model> {
    let name = update.name.as_deref().map(validate_name).transpose()?;
    let price = update.price.map(validate_price).transpose()?;
    let min_stock = update.min_stock.map(validate_min_stock).transpose()?;
    let product_type = update
        .product_type
        .as_deref()
        .map(validate_product_type)
        .transpose()?;

    let existing = Product::find_by_id(product_id)
        .one(db)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or_else(|| Error::ProductNotFound {
            name: product_id.to_string(),
        })?;

    if let Some(category_id) = update.category_id {
        ensure_category_exists(db, category_id).await?;
    }

    let mut product: product::ActiveModel = existing.into();

    if let Some(sku) = normalize_sku(update.sku.as_deref()) {
        if !sku::is_sku_unique(db, &sku, Some(product_id)).await? {
            return Err(Error::DuplicateSku { sku });
        }
        product.sku = Set(sku);
    }
    if let Some(name) = name {
        product.name = Set(name);
    }
    if let Some(price) = price {
        product.price = Set(price);
    }
    if let Some(min_stock) = min_stock {
        product.min_stock = Set(min_stock);
    }
    if let Some(product_type) = product_type {
        product.product_type = Set(product_type);
    }
    if let Some(category_id) = update.category_id {
        product.category_id = Set(category_id);
    }
    if let Some(brand) = update.brand {
        product.brand = Set(brand.map(|b| b.trim().to_string()).filter(|b| !b.is_empty()));
    }
    if let Some(description) = update.description {
        product.description = Set(description.filter(|d| !d.trim().is_empty()));
    }
    product.updated_at = Set(chrono::Utc::now().naive_utc());

    product.update(db).await.map_err(Into::into)
}

/// Soft deletes a product, preserving its stock rows and movement history.
///
/// # Errors
/// Returns an error if:
/// - The product does not exist or is already deleted
/// - The database update fails
pub async fn delete_product(db: &DatabaseConnection, product_id: i64) -> Result<product::Model> {
    let mut product: product::ActiveModel = Product::find_by_id(product_id)
        .one(db)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or_else(|| Error::ProductNotFound {
            name: product_id.to_string(),
        })?
        .into();

    product.is_deleted = Set(true);
    product.updated_at = Set(chrono::Utc::now().naive_utc());

    product.update(db).await.map_err(Into::into)
}
