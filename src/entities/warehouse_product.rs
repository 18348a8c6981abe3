//! Warehouse/product join entity - Stock on hand per warehouse.
//!
//! At most one row exists per (warehouse, product) pair, enforced by the
//! `idx_warehouse_products_pair` unique index, and `quantity` never goes
//! below zero.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Stock row database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "warehouse_products")]
pub struct Model {
    /// Unique identifier for the stock row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Warehouse holding the stock
    pub warehouse_id: i64,
    /// Product being stocked
    pub product_id: i64,
    /// Units on hand
    pub quantity: f64,
    /// When the quantity last changed
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between stock rows and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each stock row belongs to one warehouse
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
    /// Each stock row belongs to one product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
