//! Product Discord commands - `product_manage` and its subcommands.
//!
//! This module contains commands for maintaining the product catalogue. New
//! products get a generated SKU unless one is given.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::autocomplete, reply_or_propagate},
        core::{
            category,
            product::{self, ProductInput, ProductUpdate},
            warehouse,
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;

    /// Embed colour used for catalogue replies.
    const CATALOGUE_COLOR: u32 = 0x0058_65F2;

    /// Parent command for managing the product catalogue.
    #[poise::command(
        slash_command,
        subcommands(
            "product_add",
            "product_list",
            "product_update",
            "product_delete",
            "product_info"
        )
    )]
    pub async fn product_manage(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Product management command. Available subcommands:\n\
            `/product_manage add` - Add a new product\n\
            `/product_manage list` - List all products\n\
            `/product_manage update` - Update price or minimum stock\n\
            `/product_manage delete` - Delete a product\n\
            `/product_manage info` - Show a product and its stock";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Adds a product to the catalogue, generating its SKU if none is given.
    #[poise::command(slash_command, rename = "add")]
    pub async fn product_add(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Product name (e.g., 'Toalla de baño grande')"] name: String,
        #[description = "Unit price in CLP"] price: f64,
        #[description = "Category name"] category: Option<String>,
        #[description = "Brand"] brand: Option<String>,
        #[description = "SKU to use instead of a generated one"] sku: Option<String>,
        #[description = "Reorder threshold. Defaults to 0."] min_stock: Option<f64>,
    ) -> Result<()> {
        let data = ctx.data();
        let db = data.database.as_ref();

        let category_id = match category {
            Some(category_name) => {
                let found = category::get_all_active_categories(db)
                    .await?
                    .into_iter()
                    .find(|c| c.name.eq_ignore_ascii_case(category_name.trim()));
                let Some(found) = found else {
                    ctx.say(format!("❌ Category '{category_name}' not found."))
                        .await?;
                    return Ok(());
                };
                Some(found.id)
            }
            None => None,
        };

        let input = ProductInput {
            name,
            sku,
            brand,
            category_id,
            price,
            min_stock: min_stock.unwrap_or(0.0),
            ..Default::default()
        };

        match product::create_product(db, &data.settings.sku, input).await {
            Ok(created) => {
                ctx.say(format!(
                    "✅ Product '{}' added with SKU **{}** at **${:.0}**.",
                    created.name, created.sku, created.price
                ))
                .await?;
                Ok(())
            }
            Err(e) => reply_or_propagate(ctx, e).await,
        }
    }

    /// Lists all active products with SKU and price.
    #[poise::command(slash_command, rename = "list")]
    pub async fn product_list(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let db = ctx.data().database.as_ref();

        let products = product::get_all_active_products(db).await?;

        if products.is_empty() {
            ctx.say("No products have been defined yet. Use `/product_manage add` to create some!")
                .await?;
            return Ok(());
        }

        // Embeds hold at most 25 fields
        let total = products.len();
        let embed_fields: Vec<(String, String, bool)> = products
            .into_iter()
            .take(25)
            .map(|prod| {
                (
                    format!("{} (${:.0})", prod.name, prod.price),
                    format!("SKU: `{}` · Min: {}", prod.sku, prod.min_stock),
                    false,
                )
            })
            .collect();

        let mut list_embed = serenity::CreateEmbed::default()
            .title("**Product List**")
            .color(CATALOGUE_COLOR)
            .fields(embed_fields);
        if total > 25 {
            list_embed = list_embed.footer(serenity::CreateEmbedFooter::new(format!(
                "Showing 25 of {total} products"
            )));
        }

        ctx.send(poise::CreateReply::default().embed(list_embed))
            .await?;
        Ok(())
    }

    /// Updates a product's price or reorder threshold.
    #[poise::command(slash_command, rename = "update")]
    pub async fn product_update(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Name of the product to update"]
        #[autocomplete = "autocomplete::autocomplete_product_name"]
        name: String,
        #[description = "New unit price"] price: Option<f64>,
        #[description = "New reorder threshold"] min_stock: Option<f64>,
    ) -> Result<()> {
        if price.is_none() && min_stock.is_none() {
            ctx.say("❌ Give a new price, a new minimum stock, or both.")
                .await?;
            return Ok(());
        }

        let db = ctx.data().database.as_ref();

        let Some(existing) = product::get_product_by_name(db, &name).await? else {
            ctx.say(format!("❌ Product '{name}' not found.")).await?;
            return Ok(());
        };

        let update = ProductUpdate {
            price,
            min_stock,
            ..Default::default()
        };
        match product::update_product(db, existing.id, update).await {
            Ok(updated) => {
                ctx.say(format!(
                    "✅ '{}' now costs **${:.0}** with minimum stock **{}**.",
                    updated.name, updated.price, updated.min_stock
                ))
                .await?;
                Ok(())
            }
            Err(e) => reply_or_propagate(ctx, e).await,
        }
    }

    /// Deletes a product from the catalogue. Its movement history is kept.
    #[poise::command(slash_command, rename = "delete")]
    pub async fn product_delete(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Name of the product to delete"]
        #[autocomplete = "autocomplete::autocomplete_product_name"]
        name: String,
    ) -> Result<()> {
        let db = ctx.data().database.as_ref();

        let Some(existing) = product::get_product_by_name(db, &name).await? else {
            ctx.say(format!("❌ Product '{name}' not found.")).await?;
            return Ok(());
        };

        match product::delete_product(db, existing.id).await {
            Ok(_) => {
                ctx.say(format!("✅ Product '{name}' has been deleted."))
                    .await?;
                Ok(())
            }
            Err(e) => reply_or_propagate(ctx, e).await,
        }
    }

    /// Shows a product with its stock in every warehouse.
    #[poise::command(slash_command, rename = "info")]
    pub async fn product_info(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Product name"]
        #[autocomplete = "autocomplete::autocomplete_product_name"]
        name: String,
    ) -> Result<()> {
        let db = ctx.data().database.as_ref();

        let Some(prod) = product::get_product_by_name(db, &name).await? else {
            ctx.say(format!("❌ Product '{name}' not found.")).await?;
            return Ok(());
        };

        let stock = warehouse::get_stock_for_product(db, prod.id).await?;
        let total: f64 = stock.iter().map(|line| line.quantity).sum();
        let stock_text = if stock.is_empty() {
            "No stock recorded".to_string()
        } else {
            stock
                .iter()
                .map(|line| format!("• {}: {}", line.warehouse_name, line.quantity))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let embed = serenity::CreateEmbed::default()
            .title(prod.name.clone())
            .color(CATALOGUE_COLOR)
            .field("SKU", format!("`{}`", prod.sku), true)
            .field("Price", format!("${:.0}", prod.price), true)
            .field("Type", prod.product_type.clone(), true)
            .field(format!("Stock (total {total})"), stock_text, false);

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
