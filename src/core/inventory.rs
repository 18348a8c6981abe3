//! Inventory business logic - Records stock movements between warehouses.
//!
//! Every stock change is an [`inventory_movement`] row plus one or two
//! `warehouse_products` updates. Both are written inside one database
//! transaction, and removals use the conditional update in
//! [`warehouse::adjust_stock_atomic`], so stock never goes below zero even
//! when two exits race for the last units.

use crate::{
    core::{Page, normalize_paging, page_offset, warehouse},
    entities::{
        InventoryMovement, Product, Warehouse, WarehouseProduct, inventory_movement, product,
        warehouse_product,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, PaginatorTrait, QueryOrder, QuerySelect, Set,
    TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

/// Products listed by [`get_movement_stats`].
const TOP_PRODUCTS: u64 = 10;
/// Window used for the "moved recently" statistic.
const RECENT_DAYS: i64 = 30;

/// Kind of stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// From one warehouse to another
    #[serde(alias = "TRANSFER", alias = "transferencia")]
    Transfer,
    /// Stock received into a warehouse
    #[serde(alias = "ENTRADA", alias = "entrada")]
    Entry,
    /// Stock leaving a warehouse (consumption, sale, loss)
    #[serde(alias = "SALIDA", alias = "salida")]
    Exit,
    /// Physical count overriding the stored quantity
    #[serde(alias = "AJUSTE", alias = "ajuste")]
    Adjustment,
}

impl MovementType {
    /// Value stored in `inventory_movements.movement_type`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Entry => "entry",
            Self::Exit => "exit",
            Self::Adjustment => "adjustment",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MovementType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "transfer" | "transferencia" => Ok(Self::Transfer),
            "entry" | "entrada" => Ok(Self::Entry),
            "exit" | "salida" => Ok(Self::Exit),
            "adjustment" | "ajuste" => Ok(Self::Adjustment),
            other => Err(Error::validation(format!("Unknown movement type '{other}'"))),
        }
    }
}

/// A single-product movement request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementInput {
    /// Product moved
    pub product_id: i64,
    /// Source warehouse, required for exits and transfers
    #[serde(default)]
    pub from_warehouse_id: Option<i64>,
    /// Destination warehouse, required for entries, transfers and adjustments
    #[serde(default)]
    pub to_warehouse_id: Option<i64>,
    /// Kind of movement
    pub movement_type: MovementType,
    /// Units moved; for adjustments the counted quantity
    pub quantity: f64,
    /// Why the movement happened
    #[serde(default)]
    pub reason: Option<String>,
    /// Free-text notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Staff member recording the movement
    #[serde(default)]
    pub user_id: Option<String>,
}

/// One product line of a multi-product transfer.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLine {
    /// Product moved
    pub product_id: i64,
    /// Units moved
    pub quantity: f64,
}

/// Several products moved together from one warehouse to another.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTransferInput {
    /// Source warehouse
    pub from_warehouse_id: i64,
    /// Destination warehouse
    pub to_warehouse_id: i64,
    /// Why the products were moved (required)
    pub reason: String,
    /// Free-text notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Staff member recording the transfer
    #[serde(default)]
    pub user_id: Option<String>,
    /// Products and quantities
    pub products: Vec<TransferLine>,
}

/// Filters for [`list_movements`]; `None` means "any".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementFilters {
    /// Only this product
    pub product_id: Option<i64>,
    /// Movements touching this warehouse as source or destination
    pub warehouse_id: Option<i64>,
    /// Only this source warehouse
    pub from_warehouse_id: Option<i64>,
    /// Only this destination warehouse
    pub to_warehouse_id: Option<i64>,
    /// Only this kind of movement
    pub movement_type: Option<MovementType>,
    /// Created at or after
    pub start_date: Option<DateTime<Utc>>,
    /// Created at or before
    pub end_date: Option<DateTime<Utc>>,
    /// Recorded by this user
    pub user_id: Option<String>,
}

/// A movement with product and warehouse names resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementView {
    /// The stored movement
    #[serde(flatten)]
    pub movement: inventory_movement::Model,
    /// Product name, empty if the product row is gone
    pub product_name: String,
    /// Product SKU
    pub product_sku: String,
    /// Source warehouse name
    pub from_warehouse_name: Option<String>,
    /// Destination warehouse name
    pub to_warehouse_name: Option<String>,
}

/// One product line inside a [`GroupedTransfer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferredProduct {
    /// Product name
    pub name: String,
    /// Units moved
    pub quantity: f64,
}

/// All movements of one multi-product transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedTransfer {
    /// Shared batch identifier
    pub batch_id: String,
    /// Source warehouse name
    pub from_warehouse: String,
    /// Destination warehouse name
    pub to_warehouse: String,
    /// Transfer reason
    pub reason: Option<String>,
    /// When the transfer was recorded
    pub created_at: DateTime<Utc>,
    /// Who recorded it
    pub user: Option<String>,
    /// Product lines
    pub products: Vec<TransferredProduct>,
    /// Number of product lines
    pub product_count: usize,
    /// Sum of all quantities
    pub total_quantity: f64,
}

/// Total quantity moved for one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMovementTotal {
    /// Product ID
    pub product_id: i64,
    /// Product name
    pub product_name: String,
    /// Sum of movement quantities
    pub total_quantity: f64,
}

/// Aggregate movement statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementStats {
    /// All movements ever recorded
    pub total_movements: i64,
    /// Movements per type (`transfer`, `entry`, ...)
    pub by_type: BTreeMap<String, i64>,
    /// Units moved in the last 30 days
    pub last_month_quantity: f64,
    /// Most moved products, largest first
    pub top_products: Vec<ProductMovementTotal>,
}

fn validate_quantity(quantity: f64, allow_zero: bool) -> Result<()> {
    let too_small = if allow_zero {
        quantity < 0.0
    } else {
        quantity <= 0.0
    };
    if !quantity.is_finite() || too_small {
        return Err(Error::InvalidQuantity { quantity });
    }
    Ok(())
}

/// Checks the quantity and which warehouses the movement type needs.
fn validate_movement(input: &MovementInput) -> Result<()> {
    validate_quantity(
        input.quantity,
        input.movement_type == MovementType::Adjustment,
    )?;

    match (
        input.movement_type,
        input.from_warehouse_id,
        input.to_warehouse_id,
    ) {
        (MovementType::Transfer, Some(from), Some(to)) if from == to => Err(Error::validation(
            "Source and destination warehouses must be different",
        )),
        (MovementType::Transfer, Some(_), Some(_))
        | (MovementType::Entry | MovementType::Adjustment, _, Some(_))
        | (MovementType::Exit, Some(_), _) => Ok(()),
        (MovementType::Transfer, _, _) => Err(Error::validation(
            "Transfers require a source and a destination warehouse",
        )),
        (MovementType::Entry, _, None) => {
            Err(Error::validation("Entries require a destination warehouse"))
        }
        (MovementType::Adjustment, _, None) => {
            Err(Error::validation("Adjustments require the counted warehouse"))
        }
        (MovementType::Exit, None, _) => Err(Error::validation("Exits require a source warehouse")),
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn require_product(txn: &DatabaseTransaction, product_id: i64) -> Result<product::Model> {
    Product::find_by_id(product_id)
        .one(txn)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or_else(|| Error::ProductNotFound {
            name: product_id.to_string(),
        })
}

async fn require_active_warehouse(txn: &DatabaseTransaction, warehouse_id: i64) -> Result<()> {
    let active = Warehouse::find_by_id(warehouse_id)
        .one(txn)
        .await?
        .is_some_and(|w| w.is_active);
    if active {
        Ok(())
    } else {
        Err(Error::WarehouseNotFound {
            name: warehouse_id.to_string(),
        })
    }
}

/// Records a movement and applies it to stock, atomically.
///
/// # Errors
/// Returns an error if:
/// - The quantity is not finite, or not positive (adjustments accept zero)
/// - The warehouses required by the movement type are missing or equal
/// - The product is missing or deleted, or a warehouse is missing or inactive
/// - An exit or transfer asks for more than the source holds
/// - A database operation fails
///
/// On any error nothing is written.
#[instrument(skip(db), fields(movement_type = %input.movement_type))]
pub async fn create_movement(
    db: &DatabaseConnection,
    input: MovementInput,
) -> Result<inventory_movement::Model> {
    validate_movement(&input)?;

    let txn = db.begin().await?;

    require_product(&txn, input.product_id).await?;
    for warehouse_id in [input.from_warehouse_id, input.to_warehouse_id]
        .into_iter()
        .flatten()
    {
        require_active_warehouse(&txn, warehouse_id).await?;
    }

    let (from, to) = (input.from_warehouse_id, input.to_warehouse_id);
    match (input.movement_type, from, to) {
        (MovementType::Transfer, Some(from), Some(to)) => {
            warehouse::adjust_stock_atomic(&txn, from, input.product_id, -input.quantity).await?;
            warehouse::adjust_stock_atomic(&txn, to, input.product_id, input.quantity).await?;
        }
        (MovementType::Entry, _, Some(to)) => {
            warehouse::adjust_stock_atomic(&txn, to, input.product_id, input.quantity).await?;
        }
        (MovementType::Exit, Some(from), _) => {
            warehouse::adjust_stock_atomic(&txn, from, input.product_id, -input.quantity).await?;
        }
        (MovementType::Adjustment, _, Some(to)) => {
            warehouse::set_stock(&txn, to, input.product_id, input.quantity).await?;
        }
        _ => return Err(Error::validation("Movement is missing a warehouse")),
    }

    // Transfers and adjustments record only the warehouses they touch.
    let (from, to) = match input.movement_type {
        MovementType::Entry | MovementType::Adjustment => (None, to),
        MovementType::Exit => (from, None),
        MovementType::Transfer => (from, to),
    };

    let movement = inventory_movement::ActiveModel {
        product_id: Set(input.product_id),
        from_warehouse_id: Set(from),
        to_warehouse_id: Set(to),
        movement_type: Set(input.movement_type.as_str().to_string()),
        quantity: Set(input.quantity),
        reason: Set(clean_text(input.reason)),
        notes: Set(clean_text(input.notes)),
        batch_id: Set(None),
        user_id: Set(clean_text(input.user_id)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
        "Recorded {} of {} units of product {}",
        movement.movement_type, movement.quantity, movement.product_id
    );
    Ok(movement)
}

/// Moves several products between two warehouses as one batch.
///
/// Every line is validated, and every product's stock is checked, before
/// anything is written. All movements share a freshly generated `batch_id`.
///
/// # Errors
/// Returns an error if:
/// - The warehouses are equal, missing or inactive
/// - The reason is blank or the product list is empty
/// - Any quantity is not positive, or any product is missing
/// - Any product lacks stock at the source (quantities of repeated lines are summed)
/// - A database operation fails
///
/// On any error nothing is written.
#[instrument(skip(db, input), fields(lines = input.products.len()))]
pub async fn create_multi_transfer(
    db: &DatabaseConnection,
    input: MultiTransferInput,
) -> Result<Vec<inventory_movement::Model>> {
    if input.from_warehouse_id == input.to_warehouse_id {
        return Err(Error::validation(
            "Source and destination warehouses must be different",
        ));
    }
    let reason = clean_text(Some(input.reason))
        .ok_or_else(|| Error::validation("A reason is required for transfers"))?;
    if input.products.is_empty() {
        return Err(Error::validation("At least one product is required"));
    }
    for line in &input.products {
        validate_quantity(line.quantity, false)?;
    }

    let txn = db.begin().await?;

    require_active_warehouse(&txn, input.from_warehouse_id).await?;
    require_active_warehouse(&txn, input.to_warehouse_id).await?;

    let mut requested: BTreeMap<i64, f64> = BTreeMap::new();
    for line in &input.products {
        *requested.entry(line.product_id).or_default() += line.quantity;
    }
    for (&product_id, &quantity) in &requested {
        let product = require_product(&txn, product_id).await?;
        let available = warehouse::get_stock(&txn, input.from_warehouse_id, product_id).await?;
        if available < quantity {
            debug!("Transfer rejected: not enough {} in source warehouse", product.name);
            return Err(Error::InsufficientStock {
                available,
                requested: quantity,
            });
        }
    }

    let batch_id = uuid::Uuid::new_v4().to_string();
    let notes = clean_text(input.notes);
    let user_id = clean_text(input.user_id);
    let now = Utc::now();
    let mut movements = Vec::with_capacity(input.products.len());

    for line in &input.products {
        warehouse::adjust_stock_atomic(
            &txn,
            input.from_warehouse_id,
            line.product_id,
            -line.quantity,
        )
        .await?;
        warehouse::adjust_stock_atomic(&txn, input.to_warehouse_id, line.product_id, line.quantity)
            .await?;

        let movement = inventory_movement::ActiveModel {
            product_id: Set(line.product_id),
            from_warehouse_id: Set(Some(input.from_warehouse_id)),
            to_warehouse_id: Set(Some(input.to_warehouse_id)),
            movement_type: Set(MovementType::Transfer.as_str().to_string()),
            quantity: Set(line.quantity),
            reason: Set(Some(reason.clone())),
            notes: Set(notes.clone()),
            batch_id: Set(Some(batch_id.clone())),
            user_id: Set(user_id.clone()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        movements.push(movement);
    }

    txn.commit().await?;

    info!(
        "Transferred {} product lines in batch {batch_id}",
        movements.len()
    );
    Ok(movements)
}

async fn name_maps(db: &DatabaseConnection) -> Result<(HashMap<i64, product::Model>, HashMap<i64, String>)> {
    let products = Product::find()
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();
    let warehouses = Warehouse::find()
        .all(db)
        .await?
        .into_iter()
        .map(|w| (w.id, w.name))
        .collect();
    Ok((products, warehouses))
}

fn to_view(
    movement: inventory_movement::Model,
    products: &HashMap<i64, product::Model>,
    warehouses: &HashMap<i64, String>,
) -> MovementView {
    let product = products.get(&movement.product_id);
    MovementView {
        product_name: product.map(|p| p.name.clone()).unwrap_or_default(),
        product_sku: product.map(|p| p.sku.clone()).unwrap_or_default(),
        from_warehouse_name: movement
            .from_warehouse_id
            .and_then(|id| warehouses.get(&id).cloned()),
        to_warehouse_name: movement
            .to_warehouse_id
            .and_then(|id| warehouses.get(&id).cloned()),
        movement,
    }
}

/// Retrieves one movement with names resolved.
///
/// # Errors
/// Returns [`Error::MovementNotFound`] if no such movement exists, or an error
/// if a database query fails.
pub async fn get_movement(db: &DatabaseConnection, movement_id: i64) -> Result<MovementView> {
    let movement = InventoryMovement::find_by_id(movement_id)
        .one(db)
        .await?
        .ok_or(Error::MovementNotFound { id: movement_id })?;
    let (products, warehouses) = name_maps(db).await?;
    Ok(to_view(movement, &products, &warehouses))
}

/// Lists movements matching `filters`, newest first, one page at a time.
///
/// # Errors
/// Returns an error if a database query fails.
pub async fn list_movements(
    db: &DatabaseConnection,
    filters: &MovementFilters,
    page: u64,
    limit: u64,
) -> Result<Page<MovementView>> {
    let (page, limit) = normalize_paging(page, limit);

    let mut condition = Condition::all();
    if let Some(product_id) = filters.product_id {
        condition = condition.add(inventory_movement::Column::ProductId.eq(product_id));
    }
    if let Some(warehouse_id) = filters.warehouse_id {
        condition = condition.add(
            Condition::any()
                .add(inventory_movement::Column::FromWarehouseId.eq(warehouse_id))
                .add(inventory_movement::Column::ToWarehouseId.eq(warehouse_id)),
        );
    }
    if let Some(from) = filters.from_warehouse_id {
        condition = condition.add(inventory_movement::Column::FromWarehouseId.eq(from));
    }
    if let Some(to) = filters.to_warehouse_id {
        condition = condition.add(inventory_movement::Column::ToWarehouseId.eq(to));
    }
    if let Some(movement_type) = filters.movement_type {
        condition = condition.add(inventory_movement::Column::MovementType.eq(movement_type.as_str()));
    }
    if let Some(start) = filters.start_date {
        condition = condition.add(inventory_movement::Column::CreatedAt.gte(start));
    }
    if let Some(end) = filters.end_date {
        condition = condition.add(inventory_movement::Column::CreatedAt.lte(end));
    }
    if let Some(user_id) = &filters.user_id {
        condition = condition.add(inventory_movement::Column::UserId.eq(user_id.as_str()));
    }

    let query = InventoryMovement::find().filter(condition);
    let total = query.clone().count(db).await?;
    let movements = query
        .order_by_desc(inventory_movement::Column::CreatedAt)
        .order_by_desc(inventory_movement::Column::Id)
        .offset(page_offset(page, limit))
        .limit(limit)
        .all(db)
        .await?;

    let (products, warehouses) = name_maps(db).await?;
    let items = movements
        .into_iter()
        .map(|m| to_view(m, &products, &warehouses))
        .collect();

    Ok(Page::new(items, page, limit, total))
}

/// Multi-product transfers grouped by batch, newest first, paginated in memory.
///
/// # Errors
/// Returns an error if a database query fails.
pub async fn get_grouped_transfers(
    db: &DatabaseConnection,
    page: u64,
    limit: u64,
) -> Result<Page<GroupedTransfer>> {
    let movements = InventoryMovement::find()
        .filter(inventory_movement::Column::BatchId.is_not_null())
        .filter(inventory_movement::Column::MovementType.eq(MovementType::Transfer.as_str()))
        .order_by_desc(inventory_movement::Column::CreatedAt)
        .order_by_asc(inventory_movement::Column::Id)
        .all(db)
        .await?;
    let (products, warehouses) = name_maps(db).await?;
    let warehouse_name = |id: Option<i64>| {
        id.and_then(|id| warehouses.get(&id).cloned())
            .unwrap_or_default()
    };

    let mut groups: Vec<GroupedTransfer> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for movement in movements {
        let Some(batch_id) = movement.batch_id.clone() else {
            continue;
        };
        let line = TransferredProduct {
            name: products
                .get(&movement.product_id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
            quantity: movement.quantity,
        };

        if let Some(&i) = index.get(&batch_id) {
            let group = &mut groups[i];
            group.total_quantity += line.quantity;
            group.products.push(line);
            group.product_count = group.products.len();
        } else {
            index.insert(batch_id.clone(), groups.len());
            groups.push(GroupedTransfer {
                batch_id,
                from_warehouse: warehouse_name(movement.from_warehouse_id),
                to_warehouse: warehouse_name(movement.to_warehouse_id),
                reason: movement.reason,
                created_at: movement.created_at,
                user: movement.user_id,
                total_quantity: line.quantity,
                products: vec![line],
                product_count: 1,
            });
        }
    }

    Ok(Page::from_vec(groups, page, limit))
}

/// Movement counts per type, units moved in the last 30 days, and the 10 most moved products.
///
/// # Errors
/// Returns an error if a database query fails.
pub async fn get_movement_stats(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<MovementStats> {
    let counts: Vec<(String, i64)> = InventoryMovement::find()
        .select_only()
        .column(inventory_movement::Column::MovementType)
        .column_as(Expr::col(inventory_movement::Column::Id).count(), "count")
        .group_by(inventory_movement::Column::MovementType)
        .into_tuple()
        .all(db)
        .await?;
    let by_type: BTreeMap<String, i64> = counts.into_iter().collect();
    let total_movements = by_type.values().sum();

    let last_month_quantity: Option<Option<f64>> = InventoryMovement::find()
        .select_only()
        .column_as(Expr::col(inventory_movement::Column::Quantity).sum(), "total")
        .filter(inventory_movement::Column::CreatedAt.gte(now - Duration::days(RECENT_DAYS)))
        .into_tuple()
        .one(db)
        .await?;

    let totals: Vec<(i64, f64)> = InventoryMovement::find()
        .select_only()
        .column(inventory_movement::Column::ProductId)
        .column_as(Expr::col(inventory_movement::Column::Quantity).sum(), "total")
        .group_by(inventory_movement::Column::ProductId)
        .order_by(Expr::col(inventory_movement::Column::Quantity).sum(), sea_orm::Order::Desc)
        .limit(TOP_PRODUCTS)
        .into_tuple()
        .all(db)
        .await?;

    let product_ids: Vec<i64> = totals.iter().map(|(id, _)| *id).collect();
    let names: HashMap<i64, String> = Product::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect();

    let top_products = totals
        .into_iter()
        .map(|(product_id, total_quantity)| ProductMovementTotal {
            product_id,
            product_name: names.get(&product_id).cloned().unwrap_or_default(),
            total_quantity,
        })
        .collect();

    Ok(MovementStats {
        total_movements,
        by_type,
        last_month_quantity: last_month_quantity.flatten().unwrap_or(0.0),
        top_products,
    })
}

/// Stock lines with units on hand, optionally limited to one warehouse.
///
/// Used to offer only movable products when recording exits and transfers.
///
/// # Errors
/// Returns an error if a database query fails.
pub async fn get_products_for_movement(
    db: &DatabaseConnection,
    warehouse_id: Option<i64>,
) -> Result<Vec<warehouse::StockLine>> {
    let mut query = WarehouseProduct::find().filter(warehouse_product::Column::Quantity.gt(0.0));
    if let Some(id) = warehouse_id {
        query = query.filter(warehouse_product::Column::WarehouseId.eq(id));
    }
    let rows = query.find_also_related(Product).all(db).await?;
    warehouse::stock_lines(db, rows).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn movement(
        movement_type: MovementType,
        product_id: i64,
        from: Option<i64>,
        to: Option<i64>,
        quantity: f64,
    ) -> MovementInput {
        MovementInput {
            product_id,
            from_warehouse_id: from,
            to_warehouse_id: to,
            movement_type,
            quantity,
            reason: None,
            notes: None,
            user_id: Some("staff-1".to_string()),
        }
    }

    #[test]
    fn test_movement_type_parsing() {
        assert_eq!("ENTRADA".parse::<MovementType>().unwrap(), MovementType::Entry);
        assert_eq!("salida".parse::<MovementType>().unwrap(), MovementType::Exit);
        assert_eq!(
            " transfer ".parse::<MovementType>().unwrap(),
            MovementType::Transfer
        );
        assert!("robo".parse::<MovementType>().is_err());

        let parsed: MovementType = serde_json::from_str("\"AJUSTE\"").unwrap();
        assert_eq!(parsed, MovementType::Adjustment);
    }

    #[tokio::test]
    async fn test_create_movement_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let zero = create_movement(&db, movement(MovementType::Entry, 1, None, Some(1), 0.0)).await;
        assert!(matches!(zero.unwrap_err(), Error::InvalidQuantity { .. }));

        let nan = create_movement(&db, movement(MovementType::Entry, 1, None, Some(1), f64::NAN)).await;
        assert!(matches!(nan.unwrap_err(), Error::InvalidQuantity { .. }));

        let no_source = create_movement(&db, movement(MovementType::Exit, 1, None, Some(1), 1.0)).await;
        assert!(matches!(no_source.unwrap_err(), Error::Validation { .. }));

        let no_dest = create_movement(&db, movement(MovementType::Entry, 1, Some(1), None, 1.0)).await;
        assert!(matches!(no_dest.unwrap_err(), Error::Validation { .. }));

        let same = create_movement(&db, movement(MovementType::Transfer, 1, Some(2), Some(2), 1.0)).await;
        assert!(matches!(same.unwrap_err(), Error::Validation { .. }));

        let half = create_movement(&db, movement(MovementType::Transfer, 1, Some(2), None, 1.0)).await;
        assert!(matches!(half.unwrap_err(), Error::Validation { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_entry_exit_and_adjustment() -> Result<()> {
        let (db, warehouse, product) = setup_with_stock(0.0).await?;

        create_movement(&db, movement(MovementType::Entry, product.id, None, Some(warehouse.id), 10.0)).await?;
        assert_eq!(warehouse::get_stock(&db, warehouse.id, product.id).await?, 10.0);

        let exit = create_movement(&db, movement(MovementType::Exit, product.id, Some(warehouse.id), None, 4.0)).await?;
        assert_eq!(exit.movement_type, "exit");
        assert_eq!(exit.from_warehouse_id, Some(warehouse.id));
        assert_eq!(exit.to_warehouse_id, None);
        assert_eq!(warehouse::get_stock(&db, warehouse.id, product.id).await?, 6.0);

        create_movement(&db, movement(MovementType::Adjustment, product.id, None, Some(warehouse.id), 0.0)).await?;
        assert_eq!(warehouse::get_stock(&db, warehouse.id, product.id).await?, 0.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_exit_cannot_drive_stock_negative() -> Result<()> {
        let (db, warehouse, product) = setup_with_stock(3.0).await?;

        let result = create_movement(&db, movement(MovementType::Exit, product.id, Some(warehouse.id), None, 5.0)).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock { available, requested } if available == 3.0 && requested == 5.0
        ));

        // Neither stock nor history changed
        assert_eq!(warehouse::get_stock(&db, warehouse.id, product.id).await?, 3.0);
        let page = list_movements(&db, &MovementFilters::default(), 1, 20).await?;
        assert_eq!(page.total, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_moves_stock() -> Result<()> {
        let (db, central, product) = setup_with_stock(8.0).await?;
        let spa = create_test_warehouse(&db, "Spa").await?;

        let transfer = create_movement(
            &db,
            movement(MovementType::Transfer, product.id, Some(central.id), Some(spa.id), 5.0),
        )
        .await?;

        assert_eq!(warehouse::get_stock(&db, central.id, product.id).await?, 3.0);
        assert_eq!(warehouse::get_stock(&db, spa.id, product.id).await?, 5.0);

        let view = get_movement(&db, transfer.id).await?;
        assert_eq!(view.product_name, product.name);
        assert_eq!(view.from_warehouse_name.as_deref(), Some(central.name.as_str()));
        assert_eq!(view.to_warehouse_name.as_deref(), Some("Spa"));

        Ok(())
    }

    #[tokio::test]
    async fn test_movement_rejects_inactive_warehouse() -> Result<()> {
        let (db, warehouse, product) = setup_with_stock(0.0).await?;
        warehouse::deactivate_warehouse(&db, warehouse.id).await?;

        let result = create_movement(&db, movement(MovementType::Entry, product.id, None, Some(warehouse.id), 1.0)).await;
        assert!(matches!(result.unwrap_err(), Error::WarehouseNotFound { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_get_movement_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let result = get_movement(&db, 42).await;
        assert!(matches!(result.unwrap_err(), Error::MovementNotFound { id: 42 }));
        Ok(())
    }

    #[tokio::test]
    async fn test_multi_transfer_shares_batch() -> Result<()> {
        let (db, central, towels) = setup_with_stock(10.0).await?;
        let robes = create_test_product(&db, "Bata").await?;
        warehouse::adjust_stock_atomic(&db, central.id, robes.id, 4.0).await?;
        let spa = create_test_warehouse(&db, "Spa").await?;

        let movements = create_multi_transfer(
            &db,
            MultiTransferInput {
                from_warehouse_id: central.id,
                to_warehouse_id: spa.id,
                reason: "Reposición semanal".to_string(),
                notes: None,
                user_id: Some("staff-1".to_string()),
                products: vec![
                    TransferLine { product_id: towels.id, quantity: 6.0 },
                    TransferLine { product_id: robes.id, quantity: 4.0 },
                ],
            },
        )
        .await?;

        assert_eq!(movements.len(), 2);
        let batch = movements[0].batch_id.clone().unwrap();
        assert!(movements.iter().all(|m| m.batch_id.as_deref() == Some(batch.as_str())));
        assert_eq!(warehouse::get_stock(&db, central.id, robes.id).await?, 0.0);
        assert_eq!(warehouse::get_stock(&db, spa.id, towels.id).await?, 6.0);

        let grouped = get_grouped_transfers(&db, 1, 10).await?;
        assert_eq!(grouped.total, 1);
        let group = &grouped.items[0];
        assert_eq!(group.batch_id, batch);
        assert_eq!(group.from_warehouse, central.name);
        assert_eq!(group.to_warehouse, "Spa");
        assert_eq!(group.product_count, 2);
        assert_eq!(group.total_quantity, 10.0);
        assert_eq!(group.reason.as_deref(), Some("Reposición semanal"));

        Ok(())
    }

    #[tokio::test]
    async fn test_multi_transfer_checks_all_stock_first() -> Result<()> {
        let (db, central, towels) = setup_with_stock(10.0).await?;
        let robes = create_test_product(&db, "Bata").await?;
        let spa = create_test_warehouse(&db, "Spa").await?;

        let result = create_multi_transfer(
            &db,
            MultiTransferInput {
                from_warehouse_id: central.id,
                to_warehouse_id: spa.id,
                reason: "Reposición".to_string(),
                notes: None,
                user_id: None,
                products: vec![
                    TransferLine { product_id: towels.id, quantity: 2.0 },
                    TransferLine { product_id: robes.id, quantity: 1.0 },
                ],
            },
        )
        .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::InsufficientStock { available, requested } if available == 0.0 && requested == 1.0
        ));

        // The first line was not applied
        assert_eq!(warehouse::get_stock(&db, central.id, towels.id).await?, 10.0);
        assert_eq!(warehouse::get_stock(&db, spa.id, towels.id).await?, 0.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_multi_transfer_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let base = MultiTransferInput {
            from_warehouse_id: 1,
            to_warehouse_id: 2,
            reason: "Reposición".to_string(),
            notes: None,
            user_id: None,
            products: vec![TransferLine { product_id: 1, quantity: 1.0 }],
        };

        let same = create_multi_transfer(&db, MultiTransferInput { to_warehouse_id: 1, ..base.clone() }).await;
        assert!(matches!(same.unwrap_err(), Error::Validation { .. }));

        let blank = create_multi_transfer(&db, MultiTransferInput { reason: "  ".to_string(), ..base.clone() }).await;
        assert!(matches!(blank.unwrap_err(), Error::Validation { .. }));

        let empty = create_multi_transfer(&db, MultiTransferInput { products: vec![], ..base.clone() }).await;
        assert!(matches!(empty.unwrap_err(), Error::Validation { .. }));

        let negative = create_multi_transfer(
            &db,
            MultiTransferInput {
                products: vec![TransferLine { product_id: 1, quantity: -2.0 }],
                ..base
            },
        )
        .await;
        assert!(matches!(negative.unwrap_err(), Error::InvalidQuantity { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_list_movements_filters_and_pages() -> Result<()> {
        let (db, central, product) = setup_with_stock(0.0).await?;
        let spa = create_test_warehouse(&db, "Spa").await?;

        for _ in 0..3 {
            create_movement(&db, movement(MovementType::Entry, product.id, None, Some(central.id), 2.0)).await?;
        }
        create_movement(&db, movement(MovementType::Transfer, product.id, Some(central.id), Some(spa.id), 1.0)).await?;

        let entries = list_movements(
            &db,
            &MovementFilters {
                movement_type: Some(MovementType::Entry),
                ..Default::default()
            },
            1,
            2,
        )
        .await?;
        assert_eq!(entries.total, 3);
        assert_eq!(entries.total_pages, 2);
        assert_eq!(entries.items.len(), 2);

        let touching_spa = list_movements(
            &db,
            &MovementFilters {
                warehouse_id: Some(spa.id),
                ..Default::default()
            },
            1,
            20,
        )
        .await?;
        assert_eq!(touching_spa.total, 1);
        assert_eq!(touching_spa.items[0].movement.movement_type, "transfer");

        let other_user = list_movements(
            &db,
            &MovementFilters {
                user_id: Some("someone-else".to_string()),
                ..Default::default()
            },
            1,
            20,
        )
        .await?;
        assert_eq!(other_user.total, 0);

        let far_page = list_movements(&db, &MovementFilters::default(), u64::MAX, 20).await?;
        assert!(far_page.items.is_empty());
        assert_eq!(far_page.total, 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_movement_stats() -> Result<()> {
        let (db, central, towels) = setup_with_stock(0.0).await?;
        let robes = create_test_product(&db, "Bata").await?;

        create_movement(&db, movement(MovementType::Entry, towels.id, None, Some(central.id), 10.0)).await?;
        create_movement(&db, movement(MovementType::Entry, robes.id, None, Some(central.id), 3.0)).await?;
        create_movement(&db, movement(MovementType::Exit, towels.id, Some(central.id), None, 4.0)).await?;

        let stats = get_movement_stats(&db, Utc::now()).await?;
        assert_eq!(stats.total_movements, 3);
        assert_eq!(stats.by_type.get("entry"), Some(&2));
        assert_eq!(stats.by_type.get("exit"), Some(&1));
        assert_eq!(stats.last_month_quantity, 17.0);
        assert_eq!(stats.top_products[0].product_id, towels.id);
        assert_eq!(stats.top_products[0].total_quantity, 14.0);
        assert_eq!(stats.top_products[1].product_name, "Bata");

        // Window starting after every movement
        let later = get_movement_stats(&db, Utc::now() + Duration::days(60)).await?;
        assert_eq!(later.last_month_quantity, 0.0);
        assert_eq!(later.total_movements, 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_products_for_movement_skip_empty_rows() -> Result<()> {
        let (db, central, towels) = setup_with_stock(5.0).await?;
        let robes = create_test_product(&db, "Bata").await?;
        warehouse::set_stock(&db, central.id, robes.id, 0.0).await?;

        let available = get_products_for_movement(&db, Some(central.id)).await?;
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].product_id, towels.id);

        let everywhere = get_products_for_movement(&db, None).await?;
        assert_eq!(everywhere.len(), 1);

        Ok(())
    }
}
