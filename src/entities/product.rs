//! Product entity - Items sold, consumed, or stocked by the hotel.
//!
//! Every product carries a unique SKU. Stock is not stored here; it lives in
//! `warehouse_products`, one row per warehouse.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "products")]
pub struct Model {
    /// Unique identifier for the product
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Name of the product (e.g., "Toalla blanca", "Aceite de masaje")
    pub name: String,
    /// Stock keeping unit, unique across all products including deleted ones
    #[sea_orm(unique)]
    pub sku: String,
    /// Optional brand, used as a SKU keyword
    pub brand: Option<String>,
    /// Optional category this product belongs to
    pub category_id: Option<i64>,
    /// `"stockable"`, `"consumable"`, `"service"` or `"combo"`
    pub product_type: String,
    /// Unit sale price
    pub price: f64,
    /// Reorder threshold per warehouse
    pub min_stock: f64,
    /// Optional free-text description
    pub description: Option<String>,
    /// Soft delete flag - if true, product is hidden but history is preserved
    pub is_deleted: bool,
    /// When the product was created
    pub created_at: DateTime,
    /// When the product was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Product and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each product optionally belongs to one category
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    /// One product has stock rows in many warehouses
    #[sea_orm(has_many = "super::warehouse_product::Entity")]
    WarehouseProducts,
    /// One product has many movements
    #[sea_orm(has_many = "super::inventory_movement::Entity")]
    InventoryMovements,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::warehouse_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WarehouseProducts.def()
    }
}

impl Related<super::inventory_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryMovements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
