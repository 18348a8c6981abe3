//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod ai_token_usage;
pub mod category;
pub mod inventory_movement;
pub mod product;
pub mod sku_sequence;
pub mod warehouse;
pub mod warehouse_product;

// Re-export specific types to avoid conflicts
pub use ai_token_usage::{
    Column as AiTokenUsageColumn, Entity as AiTokenUsage, Model as AiTokenUsageModel,
};
pub use category::{Column as CategoryColumn, Entity as Category, Model as CategoryModel};
pub use inventory_movement::{
    Column as InventoryMovementColumn, Entity as InventoryMovement,
    Model as InventoryMovementModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use sku_sequence::{Column as SkuSequenceColumn, Entity as SkuSequence, Model as SkuSequenceModel};
pub use warehouse::{Column as WarehouseColumn, Entity as Warehouse, Model as WarehouseModel};
pub use warehouse_product::{
    Column as WarehouseProductColumn, Entity as WarehouseProduct, Model as WarehouseProductModel,
};
