//! General Discord commands - ping, help, and other utility commands.
//! This module contains simple commands that don't require database operations
//! and provide basic bot functionality and user assistance.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    ///
    /// This is a simple health check command that doesn't require any database operations.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**Back Office Help**\n\
        Here is a summary of all available commands.\n\n\
        **Inventory**\n\
        • `/stock <warehouse>` - Shows what a warehouse holds.\n\
        • `/low_stock <warehouse>` - Lists products below their minimum.\n\
        • `/movement <type> <product> <quantity> [from] [to] [reason]` - Records an entry, exit, adjustment or transfer.\n\
        • `/transfers` - Shows the latest multi-product transfers.\n\
        • `/inventory_stats` - Movement counts and most moved products.\n\
        • `/product_manage <subcommand>` - Manage products (add, list, update, delete, info).\n\n\
        **WhatsApp**\n\
        • `/agent <subcommand>` - Manage agents (register, remove, status, list).\n\
        • `/queue` - Shows router health and waiting clients.\n\n\
        **AI Assistant**\n\
        • `/ask <question>` - Asks the assistant.\n\
        • `/translate <text> [language]` - Translates a text (English by default).\n\
        • `/ai_usage [period]` - Shows token usage and estimated cost.\n\n\
        **Utility**\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
