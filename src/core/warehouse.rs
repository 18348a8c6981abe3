//! Warehouse business logic - Warehouses and the stock they hold.
//!
//! Stock lives in `warehouse_products`, one row per (warehouse, product).
//! All quantity changes go through [`adjust_stock_atomic`] or [`set_stock`],
//! which the inventory module calls inside its database transactions.

use crate::{
    core::nullable,
    entities::{Product, Warehouse, WarehouseProduct, product, warehouse, warehouse_product},
    errors::{Error, Result},
};
use sea_orm::{
    QueryOrder, Set,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// One product's stock in one warehouse, joined with names for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLine {
    /// Warehouse ID
    pub warehouse_id: i64,
    /// Warehouse name
    pub warehouse_name: String,
    /// Product ID
    pub product_id: i64,
    /// Product name
    pub product_name: String,
    /// Product SKU
    pub sku: String,
    /// Units on hand
    pub quantity: f64,
    /// Product reorder threshold
    pub min_stock: f64,
}

/// Partial update of a warehouse; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseUpdate {
    /// New name
    pub name: Option<String>,
    /// New location; `Some(None)` clears it
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
}

/// Counts and value of everything on hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    /// Products that are not deleted
    pub total_products: u64,
    /// Active warehouses
    pub active_warehouses: u64,
    /// Products with units on hand in some active warehouse
    pub products_with_stock: u64,
    /// Products with no units anywhere
    pub products_without_stock: u64,
    /// Stock lines below their product's `min_stock`
    pub low_stock_count: u64,
    /// Sum of price times quantity, rounded to cents
    pub total_value: f64,
}

/// Creates an active warehouse.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - The database insert fails (including a duplicate name)
pub async fn create_warehouse(
    db: &DatabaseConnection,
    name: String,
    location: Option<String>,
) -> Result<warehouse::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Warehouse name cannot be empty"));
    }

    let warehouse = warehouse::ActiveModel {
        name: Set(name.to_string()),
        location: Set(location.filter(|l| !l.trim().is_empty())),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!("Created warehouse {}", warehouse.name);
    Ok(warehouse)
}

/// Renames a warehouse or changes its location.
///
/// # Errors
/// Returns an error if:
/// - The new name is empty or whitespace-only
/// - The warehouse does not exist
/// - The database update fails (including a duplicate name)
pub async fn update_warehouse(
    db: &DatabaseConnection,
    warehouse_id: i64,
    update: WarehouseUpdate,
) -> Result<warehouse::Model> {
    let name = match update.name.as_deref().map(str::trim) {
        Some("") => return Err(Error::validation("Warehouse name cannot be empty")),
        other => other.map(ToString::to_string),
    };

    let mut warehouse: warehouse::ActiveModel = Warehouse::find_by_id(warehouse_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::WarehouseNotFound {
            name: warehouse_id.to_string(),
        })?
        .into();

    if let Some(name) = name {
        warehouse.name = Set(name);
    }
    if let Some(location) = update.location {
        warehouse.location = Set(location.filter(|l| !l.trim().is_empty()));
    }

    let warehouse = warehouse.update(db).await?;
    info!("Updated warehouse {}", warehouse.name);
    Ok(warehouse)
}

/// Creates each named warehouse that does not exist yet. Used at start-up.
///
/// # Errors
/// Returns an error if a database operation fails.
pub async fn ensure_warehouses(
    db: &DatabaseConnection,
    seeds: &[crate::config::settings::WarehouseSeed],
) -> Result<usize> {
    let mut created = 0;
    for seed in seeds {
        if get_warehouse_by_name(db, &seed.name).await?.is_none() {
            create_warehouse(db, seed.name.clone(), seed.location.clone()).await?;
            created += 1;
        }
    }
    Ok(created)
}

/// Retrieves a warehouse by ID, active or not.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_warehouse_by_id(
    db: &DatabaseConnection,
    warehouse_id: i64,
) -> Result<Option<warehouse::Model>> {
    Warehouse::find_by_id(warehouse_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds a warehouse by exact name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_warehouse_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<warehouse::Model>> {
    Warehouse::find()
        .filter(warehouse::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All active warehouses, alphabetically.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_active_warehouses(db: &DatabaseConnection) -> Result<Vec<warehouse::Model>> {
    Warehouse::find()
        .filter(warehouse::Column::IsActive.eq(true))
        .order_by_asc(warehouse::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Marks a warehouse inactive. Its stock rows are kept.
///
/// # Errors
/// Returns an error if:
/// - The warehouse does not exist or is already inactive
/// - The database update fails
pub async fn deactivate_warehouse(
    db: &DatabaseConnection,
    warehouse_id: i64,
) -> Result<warehouse::Model> {
    let mut warehouse: warehouse::ActiveModel = Warehouse::find_by_id(warehouse_id)
        .one(db)
        .await?
        .filter(|w| w.is_active)
        .ok_or_else(|| Error::WarehouseNotFound {
            name: warehouse_id.to_string(),
        })?
        .into();

    warehouse.is_active = Set(false);
    warehouse.update(db).await.map_err(Into::into)
}

async fn find_stock_row<C>(
    conn: &C,
    warehouse_id: i64,
    product_id: i64,
) -> Result<Option<warehouse_product::Model>>
where
    C: ConnectionTrait,
{
    WarehouseProduct::find()
        .filter(warehouse_product::Column::WarehouseId.eq(warehouse_id))
        .filter(warehouse_product::Column::ProductId.eq(product_id))
        .one(conn)
        .await
        .map_err(Into::into)
}

/// Units of a product on hand in a warehouse; 0 when there is no stock row.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_stock<C>(conn: &C, warehouse_id: i64, product_id: i64) -> Result<f64>
where
    C: ConnectionTrait,
{
    Ok(find_stock_row(conn, warehouse_id, product_id)
        .await?
        .map_or(0.0, |row| row.quantity))
}

/// Inserts an empty stock row for the pair unless one already exists.
///
/// Relies on the unique (warehouse, product) index, so concurrent first
/// entries for a new pair still end up sharing a single row.
async fn ensure_stock_row<C>(conn: &C, warehouse_id: i64, product_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let row = warehouse_product::ActiveModel {
        warehouse_id: Set(warehouse_id),
        product_id: Set(product_id),
        quantity: Set(0.0),
        updated_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    WarehouseProduct::insert(row)
        .on_conflict(
            OnConflict::columns([
                warehouse_product::Column::WarehouseId,
                warehouse_product::Column::ProductId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

/// Adds `delta` units (negative to remove) and returns the new quantity.
///
/// Removals are a single conditional `UPDATE ... WHERE quantity >= n`, so two
/// concurrent removals can never push the row below zero. Additions create
/// the stock row when it does not exist.
///
/// # Errors
/// Returns an error if:
/// - `delta` is not finite
/// - A removal exceeds the units on hand ([`Error::InsufficientStock`])
/// - A database operation fails
pub async fn adjust_stock_atomic<C>(
    conn: &C,
    warehouse_id: i64,
    product_id: i64,
    delta: f64,
) -> Result<f64>
where
    C: ConnectionTrait,
{
    if !delta.is_finite() {
        return Err(Error::InvalidQuantity { quantity: delta });
    }

    let requested = -delta;
    if delta >= 0.0 {
        ensure_stock_row(conn, warehouse_id, product_id).await?;
    }

    let mut update = WarehouseProduct::update_many()
        .col_expr(
            warehouse_product::Column::Quantity,
            Expr::col(warehouse_product::Column::Quantity).add(delta),
        )
        .col_expr(
            warehouse_product::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(warehouse_product::Column::WarehouseId.eq(warehouse_id))
        .filter(warehouse_product::Column::ProductId.eq(product_id));
    if delta < 0.0 {
        update = update.filter(warehouse_product::Column::Quantity.gte(requested));
    }
    let result = update.exec(conn).await?;

    if result.rows_affected == 0 {
        let available = get_stock(conn, warehouse_id, product_id).await?;
        return Err(Error::InsufficientStock {
            available,
            requested,
        });
    }

    let quantity = get_stock(conn, warehouse_id, product_id).await?;
    debug!("Stock of product {product_id} in warehouse {warehouse_id} is now {quantity}");
    Ok(quantity)
}

/// Overwrites the stock count, creating the row when needed.
///
/// # Errors
/// Returns an error if the quantity is negative or not finite, or a database
/// operation fails.
pub async fn set_stock<C>(conn: &C, warehouse_id: i64, product_id: i64, quantity: f64) -> Result<f64>
where
    C: ConnectionTrait,
{
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(Error::InvalidQuantity { quantity });
    }

    ensure_stock_row(conn, warehouse_id, product_id).await?;
    WarehouseProduct::update_many()
        .col_expr(warehouse_product::Column::Quantity, Expr::value(quantity))
        .col_expr(
            warehouse_product::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(warehouse_product::Column::WarehouseId.eq(warehouse_id))
        .filter(warehouse_product::Column::ProductId.eq(product_id))
        .exec(conn)
        .await?;
    Ok(quantity)
}

/// Joins stock rows with product and warehouse names, skipping deleted products.
pub(crate) async fn stock_lines(
    db: &DatabaseConnection,
    rows: Vec<(warehouse_product::Model, Option<product::Model>)>,
) -> Result<Vec<StockLine>> {
    let warehouses: HashMap<i64, String> = Warehouse::find()
        .all(db)
        .await?
        .into_iter()
        .map(|w| (w.id, w.name))
        .collect();

    let mut lines: Vec<StockLine> = rows
        .into_iter()
        .filter_map(|(row, product)| {
            let product = product.filter(|p| !p.is_deleted)?;
            Some(StockLine {
                warehouse_id: row.warehouse_id,
                warehouse_name: warehouses.get(&row.warehouse_id).cloned().unwrap_or_default(),
                product_id: product.id,
                product_name: product.name,
                sku: product.sku,
                quantity: row.quantity,
                min_stock: product.min_stock,
            })
        })
        .collect();

    lines.sort_by(|a, b| {
        a.warehouse_name
            .cmp(&b.warehouse_name)
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
    Ok(lines)
}

/// Stock of every active product in a warehouse, by product name.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_stock_for_warehouse(
    db: &DatabaseConnection,
    warehouse_id: i64,
) -> Result<Vec<StockLine>> {
    let rows = WarehouseProduct::find()
        .filter(warehouse_product::Column::WarehouseId.eq(warehouse_id))
        .find_also_related(Product)
        .all(db)
        .await?;
    stock_lines(db, rows).await
}

/// Stock of one product across all warehouses.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_stock_for_product(
    db: &DatabaseConnection,
    product_id: i64,
) -> Result<Vec<StockLine>> {
    let rows = WarehouseProduct::find()
        .filter(warehouse_product::Column::ProductId.eq(product_id))
        .find_also_related(Product)
        .all(db)
        .await?;
    stock_lines(db, rows).await
}

/// Stock lines in a warehouse whose quantity is below the product's `min_stock`.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_low_stock_products(
    db: &DatabaseConnection,
    warehouse_id: i64,
) -> Result<Vec<StockLine>> {
    Ok(get_stock_for_warehouse(db, warehouse_id)
        .await?
        .into_iter()
        .filter(|line| line.quantity < line.min_stock)
        .collect())
}

/// Inventory-wide totals for dashboards.
///
/// Only stock in active warehouses counts; deleted products are ignored.
///
/// # Errors
/// Returns an error if a database query fails.
pub async fn get_inventory_summary(db: &DatabaseConnection) -> Result<InventorySummary> {
    let total_products = Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .count(db)
        .await?;
    let active: Vec<i64> = get_all_active_warehouses(db)
        .await?
        .into_iter()
        .map(|w| w.id)
        .collect();

    let rows = WarehouseProduct::find()
        .filter(warehouse_product::Column::WarehouseId.is_in(active.clone()))
        .find_also_related(Product)
        .all(db)
        .await?;

    let mut stocked = std::collections::HashSet::new();
    let mut low_stock_count = 0;
    let mut total_value = 0.0;
    for (row, product) in rows {
        let Some(product) = product.filter(|p| !p.is_deleted) else {
            continue;
        };
        if row.quantity > 0.0 {
            stocked.insert(product.id);
            total_value += product.price * row.quantity;
        }
        if row.quantity < product.min_stock {
            low_stock_count += 1;
        }
    }

    let products_with_stock = stocked.len() as u64;
    Ok(InventorySummary {
        total_products,
        active_warehouses: active.len() as u64,
        products_with_stock,
        products_without_stock: total_products.saturating_sub(products_with_stock),
        low_stock_count,
        total_value: (total_value * 100.0).round() / 100.0,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::config::settings::WarehouseSeed;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_warehouse_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_warehouse(&db, String::new(), None).await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_warehouses_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let seeds = vec![
            WarehouseSeed {
                name: "Bodega Central".to_string(),
                location: None,
            },
            WarehouseSeed {
                name: "Spa".to_string(),
                location: Some("Piso 2".to_string()),
            },
        ];

        assert_eq!(ensure_warehouses(&db, &seeds).await?, 2);
        assert_eq!(ensure_warehouses(&db, &seeds).await?, 0);

        let warehouses = get_all_active_warehouses(&db).await?;
        assert_eq!(warehouses.len(), 2);
        assert_eq!(warehouses[1].location.as_deref(), Some("Piso 2"));

        Ok(())
    }

    #[tokio::test]
    async fn test_deactivate_warehouse() -> Result<()> {
        let db = setup_test_db().await?;
        let warehouse = create_test_warehouse(&db, "Bar").await?;

        let inactive = deactivate_warehouse(&db, warehouse.id).await?;
        assert!(!inactive.is_active);
        assert!(get_all_active_warehouses(&db).await?.is_empty());

        let again = deactivate_warehouse(&db, warehouse.id).await;
        assert!(matches!(again.unwrap_err(), Error::WarehouseNotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_warehouse() -> Result<()> {
        let db = setup_test_db().await?;
        let warehouse = create_warehouse(&db, "Bodega".to_string(), Some("Subterráneo".to_string())).await?;

        let renamed = update_warehouse(
            &db,
            warehouse.id,
            WarehouseUpdate {
                name: Some("  Bodega Central ".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(renamed.name, "Bodega Central");
        assert_eq!(renamed.location.as_deref(), Some("Subterráneo"));

        let moved = update_warehouse(
            &db,
            warehouse.id,
            WarehouseUpdate {
                location: Some(None),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(moved.location, None);

        let blank = update_warehouse(
            &db,
            warehouse.id,
            WarehouseUpdate {
                name: Some(" ".to_string()),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(blank.unwrap_err(), Error::Validation { .. }));

        let missing = update_warehouse(&db, 999, WarehouseUpdate::default()).await;
        assert!(matches!(missing.unwrap_err(), Error::WarehouseNotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_inventory_summary() -> Result<()> {
        let db = setup_test_db().await?;
        let central = create_test_warehouse(&db, "Bodega Central").await?;
        let closed = create_test_warehouse(&db, "Bodega Antigua").await?;
        let towels = create_product_with_min_stock(&db, "Toalla", 10.0).await?;
        let robes = create_product_with_min_stock(&db, "Bata", 1.0).await?;
        create_test_product(&db, "Sandalias").await?;

        adjust_stock_atomic(&db, central.id, towels.id, 4.0).await?;
        adjust_stock_atomic(&db, central.id, robes.id, 2.0).await?;
        adjust_stock_atomic(&db, closed.id, robes.id, 50.0).await?;
        deactivate_warehouse(&db, closed.id).await?;

        let summary = get_inventory_summary(&db).await?;
        assert_eq!(summary.total_products, 3);
        assert_eq!(summary.active_warehouses, 1);
        assert_eq!(summary.products_with_stock, 2);
        assert_eq!(summary.products_without_stock, 1);
        assert_eq!(summary.low_stock_count, 1);
        assert_eq!(
            summary.total_value,
            towels.price * 4.0 + robes.price * 2.0
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_get_stock_defaults_to_zero() -> Result<()> {
        let (db, warehouse, product) = setup_with_stock(0.0).await?;
        assert_eq!(get_stock(&db, warehouse.id, product.id).await?, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_stock_creates_and_updates_row() -> Result<()> {
        let (db, warehouse, product) = setup_with_stock(0.0).await?;

        assert_eq!(
            adjust_stock_atomic(&db, warehouse.id, product.id, 5.0).await?,
            5.0
        );
        assert_eq!(
            adjust_stock_atomic(&db, warehouse.id, product.id, 2.5).await?,
            7.5
        );
        assert_eq!(
            adjust_stock_atomic(&db, warehouse.id, product.id, -7.5).await?,
            0.0
        );

        let rows = get_stock_for_warehouse(&db, warehouse.id).await?;
        assert_eq!(rows.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_first_entries_share_one_row() -> Result<()> {
        let (db, warehouse, product) = setup_with_stock(0.0).await?;

        let (a, b) = tokio::join!(
            adjust_stock_atomic(&db, warehouse.id, product.id, 5.0),
            adjust_stock_atomic(&db, warehouse.id, product.id, 5.0),
        );
        a?;
        b?;

        let rows = WarehouseProduct::find()
            .filter(warehouse_product::Column::WarehouseId.eq(warehouse.id))
            .filter(warehouse_product::Column::ProductId.eq(product.id))
            .all(&db)
            .await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 10.0);

        assert_eq!(
            adjust_stock_atomic(&db, warehouse.id, product.id, -5.0).await?,
            5.0
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_stock_rejects_overdraw() -> Result<()> {
        let (db, warehouse, product) = setup_with_stock(3.0).await?;

        let result = adjust_stock_atomic(&db, warehouse.id, product.id, -5.0).await;
        match result.unwrap_err() {
            Error::InsufficientStock {
                available,
                requested,
            } => {
                assert_eq!(available, 3.0);
                assert_eq!(requested, 5.0);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Unchanged
        assert_eq!(get_stock(&db, warehouse.id, product.id).await?, 3.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_set_stock_overwrites() -> Result<()> {
        let (db, warehouse, product) = setup_with_stock(8.0).await?;

        set_stock(&db, warehouse.id, product.id, 2.0).await?;
        assert_eq!(get_stock(&db, warehouse.id, product.id).await?, 2.0);

        let result = set_stock(&db, warehouse.id, product.id, -1.0).await;
        assert!(matches!(result.unwrap_err(), Error::InvalidQuantity { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_low_stock_and_product_view() -> Result<()> {
        let db = setup_test_db().await?;
        let central = create_test_warehouse(&db, "Bodega Central").await?;
        let spa = create_test_warehouse(&db, "Spa").await?;
        let towels = create_product_with_min_stock(&db, "Toalla", 10.0).await?;
        let robes = create_product_with_min_stock(&db, "Bata", 2.0).await?;

        adjust_stock_atomic(&db, central.id, towels.id, 4.0).await?;
        adjust_stock_atomic(&db, central.id, robes.id, 6.0).await?;
        adjust_stock_atomic(&db, spa.id, towels.id, 12.0).await?;

        let low = get_low_stock_products(&db, central.id).await?;
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_name, "Toalla");
        assert_eq!(low[0].warehouse_name, "Bodega Central");

        let towel_stock = get_stock_for_product(&db, towels.id).await?;
        let per_warehouse: Vec<_> = towel_stock
            .iter()
            .map(|l| (l.warehouse_name.as_str(), l.quantity))
            .collect();
        assert_eq!(per_warehouse, vec![("Bodega Central", 4.0), ("Spa", 12.0)]);

        Ok(())
    }
}
