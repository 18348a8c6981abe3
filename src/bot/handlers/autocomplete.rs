//! Autocomplete handlers for Discord slash command parameters.
//!
//! Suggests product, warehouse and agent names as the user types, so commands
//! receive names that resolve to existing records.

use crate::{
    bot::BotData,
    core::{product, warehouse},
    errors::Error,
};

/// Discord's limit on autocomplete choices.
const MAX_CHOICES: usize = 25;

/// Case-insensitive substring match, sorted, capped at [`MAX_CHOICES`].
fn matching_names(names: impl IntoIterator<Item = String>, partial: &str) -> Vec<String> {
    let partial_lower = partial.to_lowercase();
    let mut matching: Vec<String> = names
        .into_iter()
        .filter(|name| name.to_lowercase().contains(&partial_lower))
        .collect();
    matching.sort();
    matching.truncate(MAX_CHOICES);
    matching
}

/// Provides autocomplete suggestions for product names.
///
/// Matches active products by name or SKU and returns the product name, which
/// is what the commands look products up by.
pub async fn autocomplete_product_name(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let db = ctx.data().database.as_ref();

    product::suggest_product_names(db, partial)
        .await
        .unwrap_or_default()
}

/// Provides autocomplete suggestions for active warehouse names.
pub async fn autocomplete_warehouse_name(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let db = ctx.data().database.as_ref();

    let Ok(warehouses) = warehouse::get_all_active_warehouses(db).await else {
        return Vec::new();
    };

    matching_names(warehouses.into_iter().map(|w| w.name), partial)
}

/// Provides autocomplete suggestions for registered agent IDs.
pub async fn autocomplete_agent_id(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    matching_names(
        ctx.data().router.agents().into_iter().map(|agent| agent.id),
        partial,
    )
}
