//! Database configuration module.
//!
//! Handles the database connection and table creation using `SeaORM`. Tables are
//! generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs. Production points
//! `DATABASE_URL` at the managed Postgres instance; local runs and tests use `SQLite`.

use crate::entities::{
    AiTokenUsage, Category, InventoryMovement, Product, SkuSequence, Warehouse, WarehouseProduct,
    warehouse_product,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, sea_query::Index};
use std::path::Path;
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/termas_admin.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns the default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection using `DATABASE_URL`, falling back to a local `SQLite` file.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    if let Some(dir) = sqlite_parent_dir(&database_url) {
        std::fs::create_dir_all(dir)?;
    }
    info!("Connecting to database");
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Directory holding a file-backed `SQLite` database, if it has one.
fn sqlite_parent_dir(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://")?;
    let path = path.split('?').next()?;
    Path::new(path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

async fn create_table_for<E, C>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let table = entity.table_name().to_string();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    debug!("Ensured table {table}");
    Ok(())
}

/// One stock row per (warehouse, product); stock upserts conflict on it.
async fn create_stock_pair_index(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let statement = Index::create()
        .if_not_exists()
        .unique()
        .name("idx_warehouse_products_pair")
        .table(WarehouseProduct)
        .col(warehouse_product::Column::WarehouseId)
        .col(warehouse_product::Column::ProductId)
        .to_owned();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables that do not exist yet.
///
/// Safe to call on every start-up: existing tables are left untouched.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table_for(db, &schema, Category).await?;
    create_table_for(db, &schema, Product).await?;
    create_table_for(db, &schema, Warehouse).await?;
    create_table_for(db, &schema, WarehouseProduct).await?;
    create_stock_pair_index(db).await?;
    create_table_for(db, &schema, InventoryMovement).await?;
    create_table_for(db, &schema, SkuSequence).await?;
    create_table_for(db, &schema, AiTokenUsage).await?;

    Ok(())
}
