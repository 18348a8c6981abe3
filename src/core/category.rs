//! Category business logic - Groups products for SKU generation and reporting.

use crate::{
    entities::{Category, category},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// Creates a category after trimming and validating its name.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - The database insert fails (including a duplicate name)
pub async fn create_category(
    db: &DatabaseConnection,
    name: String,
    description: Option<String>,
) -> Result<category::Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::validation("Category name cannot be empty"));
    }

    category::ActiveModel {
        name: Set(name.to_string()),
        description: Set(description.filter(|d| !d.trim().is_empty())),
        is_deleted: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Retrieves a category by ID, deleted or not.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_category_by_id(
    db: &DatabaseConnection,
    category_id: i64,
) -> Result<Option<category::Model>> {
    Category::find_by_id(category_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// All non-deleted categories, alphabetically.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn get_all_active_categories(db: &DatabaseConnection) -> Result<Vec<category::Model>> {
    Category::find()
        .filter(category::Column::IsDeleted.eq(false))
        .order_by_asc(category::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}
