//! Warehouse entity - A physical storage location (bodega).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Warehouse database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "warehouses")]
pub struct Model {
    /// Unique identifier for the warehouse
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique display name (e.g., "Bodega Central", "Spa")
    #[sea_orm(unique)]
    pub name: String,
    /// Optional physical location
    pub location: Option<String>,
    /// Inactive warehouses reject new movements but keep their history
    pub is_active: bool,
}

/// Defines relationships between Warehouse and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One warehouse holds many stock rows
    #[sea_orm(has_many = "super::warehouse_product::Entity")]
    WarehouseProducts,
}

impl Related<super::warehouse_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WarehouseProducts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
