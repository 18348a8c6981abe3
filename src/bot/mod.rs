//! Bot layer - Discord-specific interface and command handlers
//!
//! Lets staff check stock, record movements, manage the WhatsApp agent roster
//! and ask the AI assistant from Discord. Commands call the same core
//! functions as the HTTP API.

/// Discord command implementations (general, product, inventory, agents, AI)
pub mod commands;
/// Discord interaction handlers (autocomplete, etc.)
pub mod handlers;

use crate::{
    config::Settings,
    core::{ai::ChatProvider, router::AgentRouter, whatsapp::MessageTransport},
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Shared data available to all bot commands.
/// Holds the same services the HTTP API uses, so both front ends see one
/// router and one database.
pub struct BotData {
    /// Database connection shared with the HTTP API
    pub database: Arc<DatabaseConnection>,
    /// Loaded configuration
    pub settings: Arc<Settings>,
    /// WhatsApp agent router
    pub router: Arc<AgentRouter>,
    /// AI provider
    pub ai: Arc<dyn ChatProvider>,
    /// WhatsApp outbound transport
    pub transport: Arc<dyn MessageTransport>,
}

impl BotData {
    /// Creates a new `BotData` instance from the shared services.
    #[must_use]
    pub const fn new(
        database: Arc<DatabaseConnection>,
        settings: Arc<Settings>,
        router: Arc<AgentRouter>,
        ai: Arc<dyn ChatProvider>,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        Self {
            database,
            settings,
            router,
            ai,
            transport,
        }
    }
}

/// Replies with the error when the user caused it, otherwise hands it to `on_error`.
pub(crate) async fn reply_or_propagate(
    ctx: poise::Context<'_, BotData, Error>,
    err: Error,
) -> Result<()> {
    if err.is_client_error() {
        ctx.say(format!("❌ {err}")).await?;
        Ok(())
    } else {
        Err(err)
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {}", ctx.command().name, error);
            if let Err(e) = ctx
                .say("❌ Something went wrong. Please try again later.")
                .await
            {
                error!("Failed to send error message: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// All registered commands.
fn all_commands() -> Vec<poise::Command<BotData, Error>> {
    vec![
        commands::ping(),
        commands::help(),
        commands::product_manage(),
        commands::stock(),
        commands::low_stock(),
        commands::movement(),
        commands::transfers(),
        commands::inventory_stats(),
        commands::agent(),
        commands::queue(),
        commands::ask(),
        commands::translate(),
        commands::ai_usage(),
    ]
}

/// Connects to Discord and runs until the client stops.
///
/// # Errors
/// Returns an error if the client cannot be built or the gateway connection fails.
#[instrument(skip_all)]
pub async fn run_bot(token: String, data: BotData) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: all_commands(),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Registered {} commands", framework.options().commands.len());
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    info!("Starting Discord client...");
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;
    client.start().await?;
    Ok(())
}

pub use commands::*;
pub use handlers::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names_are_unique() {
        let commands = all_commands();
        let mut names: Vec<&str> = commands.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
        assert!(names.contains(&"movement"));
    }

    #[test]
    fn test_subcommands_registered() {
        let product = commands::product_manage();
        let names: Vec<&str> = product.subcommands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["add", "list", "update", "delete", "info"]);

        let agent = commands::agent();
        assert_eq!(agent.subcommands.len(), 4);
    }
}
