use dotenvy::dotenv;
use std::{sync::Arc, time::Duration};
use termas_admin::{
    api::{self, AppState},
    bot::{self, BotData},
    config::{database, secrets, settings::load_default_config},
    core::{
        ai::{AnthropicClient, ChatProvider, UnconfiguredProvider},
        router::AgentRouter,
        warehouse,
        whatsapp::{DisconnectedTransport, MessageTransport, WhatsAppCloudTransport},
    },
    errors::Result,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How often idle WhatsApp conversations are swept.
const EXPIRE_INTERVAL: Duration = Duration::from_secs(60);
/// Timeout for WhatsApp Cloud API calls.
const WHATSAPP_TIMEOUT: Duration = Duration::from_secs(30);

fn ai_provider(settings: &termas_admin::config::AiSettings) -> Arc<dyn ChatProvider> {
    match AnthropicClient::from_env(settings) {
        Ok(client) => {
            info!("AI provider configured");
            Arc::new(client)
        }
        Err(e) => {
            warn!("AI features disabled: {e}");
            Arc::new(UnconfiguredProvider)
        }
    }
}

fn whatsapp_transport() -> Arc<dyn MessageTransport> {
    let Some(credentials) = secrets::whatsapp_credentials() else {
        warn!("WhatsApp credentials not set, outbound messages are disabled");
        return Arc::new(DisconnectedTransport);
    };
    match WhatsAppCloudTransport::new(credentials, WHATSAPP_TIMEOUT) {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            error!("Could not build WhatsApp client: {e}");
            Arc::new(DisconnectedTransport)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also come from the environment
    dotenv().ok();

    // 3. Load configuration
    let settings = Arc::new(load_default_config()?);

    // 4. Initialize database and seed warehouses
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;
    let created = warehouse::ensure_warehouses(&db, &settings.warehouses).await?;
    info!("Database ready ({created} warehouses created)");
    let db = Arc::new(db);

    // 5. Shared services
    let router = Arc::new(AgentRouter::new(settings.router.clone()));
    let ai = ai_provider(&settings.ai);
    let transport = whatsapp_transport();

    let sweeper = Arc::clone(&router);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(EXPIRE_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.expire_idle(chrono::Utc::now());
        }
    });

    // 6. Discord bot, when a token is configured
    match secrets::get_secret(secrets::DISCORD_BOT_TOKEN) {
        Some(token) => {
            let data = BotData::new(
                Arc::clone(&db),
                Arc::clone(&settings),
                Arc::clone(&router),
                Arc::clone(&ai),
                Arc::clone(&transport),
            );
            tokio::spawn(async move {
                if let Err(e) = bot::run_bot(token, data).await {
                    error!("Discord bot stopped: {e}");
                }
            });
        }
        None => info!("DISCORD_BOT_TOKEN not set, Discord bot disabled"),
    }

    // 7. HTTP API
    let state = AppState {
        db,
        settings: Arc::clone(&settings),
        router,
        ai,
        transport,
        verify_token: secrets::get_secret(secrets::WHATSAPP_VERIFY_TOKEN),
    };
    let listener = tokio::net::TcpListener::bind(&settings.server.bind_address).await?;
    info!("API listening on {}", settings.server.bind_address);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {e}");
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
