//! Inventory movement entity - Audit trail of every stock change.
//!
//! `movement_type` is one of `"transfer"`, `"entry"`, `"exit"` or `"adjustment"`.
//! Movements created together by a multi-product transfer share a `batch_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Inventory movement database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "inventory_movements")]
pub struct Model {
    /// Unique identifier for the movement
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Product that moved
    pub product_id: i64,
    /// Source warehouse (exits and transfers)
    pub from_warehouse_id: Option<i64>,
    /// Destination warehouse (entries, transfers and adjustments)
    pub to_warehouse_id: Option<i64>,
    /// Kind of movement
    pub movement_type: String,
    /// Units moved; for adjustments, the counted quantity
    pub quantity: f64,
    /// Why the movement happened
    pub reason: Option<String>,
    /// Free-text notes
    pub notes: Option<String>,
    /// Shared identifier for movements created in one multi-product transfer
    pub batch_id: Option<String>,
    /// Staff member who recorded the movement
    pub user_id: Option<String>,
    /// When the movement was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between movements and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each movement concerns one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
