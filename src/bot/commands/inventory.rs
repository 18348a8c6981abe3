//! Inventory Discord commands - stock lookups and movement recording.
//!
//! Movements go through the same transactional core functions as the HTTP
//! API, so an exit that would overdraw a warehouse is refused here too.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::autocomplete, reply_or_propagate},
        core::{
            inventory::{self, MovementInput, MovementType},
            product, warehouse,
        },
        entities,
        errors::{Error, Result},
    };
    use chrono::Utc;
    use poise::serenity_prelude as serenity;
    use sea_orm::DatabaseConnection;

    const INVENTORY_COLOR: u32 = 0x0057_F287;
    const WARNING_COLOR: u32 = 0x00FE_E75C;
    /// Grouped transfers shown by `/transfers`.
    const RECENT_TRANSFERS: u64 = 5;

    /// Movement kinds offered as a slash command choice.
    #[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
    pub enum MovementChoice {
        #[name = "Entry (stock received)"]
        Entry,
        #[name = "Exit (used, sold or lost)"]
        Exit,
        #[name = "Transfer between warehouses"]
        Transfer,
        #[name = "Adjustment (physical count)"]
        Adjustment,
    }

    impl From<MovementChoice> for MovementType {
        fn from(choice: MovementChoice) -> Self {
            match choice {
                MovementChoice::Entry => Self::Entry,
                MovementChoice::Exit => Self::Exit,
                MovementChoice::Transfer => Self::Transfer,
                MovementChoice::Adjustment => Self::Adjustment,
            }
        }
    }

    /// Looks a warehouse up by name, telling the user when it does not exist.
    async fn find_warehouse(
        ctx: poise::Context<'_, BotData, Error>,
        db: &DatabaseConnection,
        name: &str,
    ) -> Result<Option<entities::warehouse::Model>> {
        let found = warehouse::get_warehouse_by_name(db, name)
            .await?
            .filter(|w| w.is_active);
        if found.is_none() {
            ctx.say(format!("❌ Warehouse '{name}' not found.")).await?;
        }
        Ok(found)
    }

    fn stock_field(line: &warehouse::StockLine) -> (String, String, bool) {
        let marker = if line.quantity < line.min_stock {
            "⚠️ "
        } else {
            ""
        };
        (
            format!("{marker}{}", line.product_name),
            format!(
                "{} units · min {} · `{}`",
                line.quantity, line.min_stock, line.sku
            ),
            true,
        )
    }

    /// Shows every product a warehouse holds.
    #[poise::command(slash_command, prefix_command)]
    pub async fn stock(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Warehouse to inspect"]
        #[autocomplete = "autocomplete::autocomplete_warehouse_name"]
        warehouse_name: String,
    ) -> Result<()> {
        let db = ctx.data().database.as_ref();

        let Some(found) = find_warehouse(ctx, db, &warehouse_name).await? else {
            return Ok(());
        };

        let lines = warehouse::get_stock_for_warehouse(db, found.id).await?;
        if lines.is_empty() {
            ctx.say(format!("📦 '{}' holds no stock yet.", found.name))
                .await?;
            return Ok(());
        }

        let embed = serenity::CreateEmbed::default()
            .title(format!("Stock: {}", found.name))
            .color(INVENTORY_COLOR)
            .fields(lines.iter().take(25).map(stock_field));

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Lists products below their minimum stock in a warehouse.
    #[poise::command(slash_command, prefix_command)]
    pub async fn low_stock(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Warehouse to check"]
        #[autocomplete = "autocomplete::autocomplete_warehouse_name"]
        warehouse_name: String,
    ) -> Result<()> {
        let db = ctx.data().database.as_ref();

        let Some(found) = find_warehouse(ctx, db, &warehouse_name).await? else {
            return Ok(());
        };

        let lines = warehouse::get_low_stock_products(db, found.id).await?;
        if lines.is_empty() {
            ctx.say(format!("✅ Nothing in '{}' is below its minimum.", found.name))
                .await?;
            return Ok(());
        }

        let embed = serenity::CreateEmbed::default()
            .title(format!("Low stock: {}", found.name))
            .color(WARNING_COLOR)
            .fields(lines.iter().take(25).map(stock_field));

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Records an inventory movement.
    ///
    /// Entries and adjustments need `to`, exits need `from`, transfers need both.
    /// For adjustments the quantity is the counted amount.
    #[poise::command(slash_command)]
    pub async fn movement(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Kind of movement"] kind: MovementChoice,
        #[description = "Product moved"]
        #[autocomplete = "autocomplete::autocomplete_product_name"]
        product_name: String,
        #[description = "Units (for adjustments: the counted quantity)"] quantity: f64,
        #[description = "Source warehouse"]
        #[autocomplete = "autocomplete::autocomplete_warehouse_name"]
        from: Option<String>,
        #[description = "Destination warehouse"]
        #[autocomplete = "autocomplete::autocomplete_warehouse_name"]
        to: Option<String>,
        #[description = "Reason (e.g., 'Reposición spa')"] reason: Option<String>,
    ) -> Result<()> {
        let db = ctx.data().database.as_ref();

        let Some(prod) = product::get_product_by_name(db, &product_name).await? else {
            ctx.say(format!("❌ Product '{product_name}' not found."))
                .await?;
            return Ok(());
        };

        let mut from_warehouse = None;
        if let Some(name) = from.as_deref() {
            let Some(found) = find_warehouse(ctx, db, name).await? else {
                return Ok(());
            };
            from_warehouse = Some(found);
        }
        let mut to_warehouse = None;
        if let Some(name) = to.as_deref() {
            let Some(found) = find_warehouse(ctx, db, name).await? else {
                return Ok(());
            };
            to_warehouse = Some(found);
        }

        let input = MovementInput {
            product_id: prod.id,
            from_warehouse_id: from_warehouse.as_ref().map(|w| w.id),
            to_warehouse_id: to_warehouse.as_ref().map(|w| w.id),
            movement_type: kind.into(),
            quantity,
            reason,
            notes: None,
            user_id: Some(ctx.author().id.to_string()),
        };

        let recorded = match inventory::create_movement(db, input).await {
            Ok(recorded) => recorded,
            Err(e) => return reply_or_propagate(ctx, e).await,
        };

        let mut embed = serenity::CreateEmbed::default()
            .title(format!("Movement #{} recorded", recorded.id))
            .color(INVENTORY_COLOR)
            .field("Product", prod.name.clone(), true)
            .field("Type", recorded.movement_type.clone(), true)
            .field("Quantity", recorded.quantity.to_string(), true);
        for w in from_warehouse.iter().chain(to_warehouse.iter()) {
            let on_hand = warehouse::get_stock(db, w.id, prod.id).await?;
            embed = embed.field(format!("Now in {}", w.name), on_hand.to_string(), true);
        }

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Shows the latest multi-product transfers.
    #[poise::command(slash_command, prefix_command)]
    pub async fn transfers(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let db = ctx.data().database.as_ref();

        let page = inventory::get_grouped_transfers(db, 1, RECENT_TRANSFERS).await?;
        if page.items.is_empty() {
            ctx.say("No transfers recorded yet.").await?;
            return Ok(());
        }

        let fields = page.items.iter().map(|transfer| {
            let products = transfer
                .products
                .iter()
                .map(|p| format!("{} × {}", p.quantity, p.name))
                .collect::<Vec<_>>()
                .join(", ");
            (
                format!(
                    "{} → {} ({})",
                    transfer.from_warehouse,
                    transfer.to_warehouse,
                    transfer.created_at.format("%d/%m %H:%M")
                ),
                format!(
                    "{products}\n_{}_",
                    transfer.reason.as_deref().unwrap_or("Sin motivo")
                ),
                false,
            )
        });

        let embed = serenity::CreateEmbed::default()
            .title("Recent transfers")
            .color(INVENTORY_COLOR)
            .fields(fields)
            .footer(serenity::CreateEmbedFooter::new(format!(
                "{} transfers in total",
                page.total
            )));

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Stock totals, movement counts by type and the most moved products.
    #[poise::command(slash_command, prefix_command)]
    pub async fn inventory_stats(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let db = ctx.data().database.as_ref();
        let summary = warehouse::get_inventory_summary(db).await?;
        let stats = inventory::get_movement_stats(db, Utc::now()).await?;

        let by_type = if stats.by_type.is_empty() {
            "None".to_string()
        } else {
            stats
                .by_type
                .iter()
                .map(|(kind, count)| format!("{kind}: {count}"))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let top = stats
            .top_products
            .iter()
            .take(5)
            .map(|p| format!("{} ({})", p.product_name, p.total_quantity))
            .collect::<Vec<_>>()
            .join("\n");

        let embed = serenity::CreateEmbed::default()
            .title("Inventory statistics")
            .color(INVENTORY_COLOR)
            .field(
                "Products in stock",
                format!(
                    "{}/{}",
                    summary.products_with_stock, summary.total_products
                ),
                true,
            )
            .field("Low stock lines", summary.low_stock_count.to_string(), true)
            .field("Inventory value", format!("${:.0}", summary.total_value), true)
            .field("Movements", stats.total_movements.to_string(), true)
            .field(
                "Units moved (30 days)",
                stats.last_month_quantity.to_string(),
                true,
            )
            .field("By type", by_type, false)
            .field("Most moved", if top.is_empty() { "None".to_string() } else { top }, false);

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
