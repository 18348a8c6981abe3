//! WhatsApp agent Discord commands - `agent` and `queue`.
//!
//! Staff register themselves as agents from Discord; by default the agent ID
//! is the caller's Discord user ID.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::autocomplete, reply_or_propagate},
        core::router::{AgentRegistration, AgentStatus, ConversationStatus, Health},
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;

    /// Waiting clients listed by `/queue`.
    const QUEUE_PREVIEW: usize = 10;

    /// Agent availability offered as a slash command choice.
    #[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
    pub enum StatusChoice {
        Online,
        Busy,
        Offline,
    }

    impl From<StatusChoice> for AgentStatus {
        fn from(choice: StatusChoice) -> Self {
            match choice {
                StatusChoice::Online => Self::Online,
                StatusChoice::Busy => Self::Busy,
                StatusChoice::Offline => Self::Offline,
            }
        }
    }

    const fn status_emoji(status: AgentStatus) -> &'static str {
        match status {
            AgentStatus::Online => "🟢",
            AgentStatus::Busy => "🟡",
            AgentStatus::Offline => "⚫",
        }
    }

    /// Parent command for the WhatsApp agent roster.
    #[poise::command(
        slash_command,
        subcommands("agent_register", "agent_remove", "agent_status", "agent_list")
    )]
    pub async fn agent(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "Agent command. Available subcommands:\n\
            `/agent register` - Start taking WhatsApp conversations\n\
            `/agent remove` - Leave the roster; open conversations are reassigned\n\
            `/agent status` - Set online, busy or offline\n\
            `/agent list` - Show all agents";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Registers an agent. Waiting clients are handed over immediately.
    #[poise::command(slash_command, rename = "register")]
    pub async fn agent_register(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Display name. Defaults to your Discord name."] name: Option<String>,
        #[description = "Agent ID. Defaults to your Discord user ID."] id: Option<String>,
        #[description = "Agent's own phone"] phone: Option<String>,
    ) -> Result<()> {
        let registration = AgentRegistration {
            id: id.unwrap_or_else(|| ctx.author().id.to_string()),
            name: name.unwrap_or_else(|| ctx.author().name.clone()),
            phone,
        };

        match ctx.data().router.register_agent(registration) {
            Ok(agent) => {
                let assigned = agent.assigned_clients.len();
                let mut message = format!(
                    "✅ {} is now online as agent `{}`.",
                    agent.name, agent.id
                );
                if assigned > 0 {
                    message.push_str(&format!(
                        " {assigned} waiting client(s) were assigned to you."
                    ));
                }
                ctx.say(message).await?;
                Ok(())
            }
            Err(e) => reply_or_propagate(ctx, e).await,
        }
    }

    /// Removes an agent and reassigns their conversations.
    #[poise::command(slash_command, rename = "remove")]
    pub async fn agent_remove(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Agent ID. Defaults to your Discord user ID."]
        #[autocomplete = "autocomplete::autocomplete_agent_id"]
        id: Option<String>,
    ) -> Result<()> {
        let id = id.unwrap_or_else(|| ctx.author().id.to_string());

        match ctx.data().router.unregister_agent(&id) {
            Ok(outcome) => {
                ctx.say(format!(
                    "✅ Agent `{id}` removed. {} conversation(s) reassigned, {} waiting.",
                    outcome.reassigned.len(),
                    outcome.queued.len()
                ))
                .await?;
                Ok(())
            }
            Err(e) => reply_or_propagate(ctx, e).await,
        }
    }

    /// Changes an agent's availability.
    #[poise::command(slash_command, rename = "status")]
    pub async fn agent_status(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "New availability"] status: StatusChoice,
        #[description = "Agent ID. Defaults to your Discord user ID."]
        #[autocomplete = "autocomplete::autocomplete_agent_id"]
        id: Option<String>,
    ) -> Result<()> {
        let id = id.unwrap_or_else(|| ctx.author().id.to_string());

        match ctx.data().router.update_agent_status(&id, status.into()) {
            Ok(agent) => {
                ctx.say(format!(
                    "{} {} is now {:?}.",
                    status_emoji(agent.status),
                    agent.name,
                    agent.status
                ))
                .await?;
                Ok(())
            }
            Err(e) => reply_or_propagate(ctx, e).await,
        }
    }

    /// Lists registered agents with their load.
    #[poise::command(slash_command, rename = "list")]
    pub async fn agent_list(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let agents = ctx.data().router.agents();

        if agents.is_empty() {
            ctx.say("No agents registered. Use `/agent register` to start taking conversations.")
                .await?;
            return Ok(());
        }

        let fields = agents.iter().map(|agent| {
            (
                format!("{} {}", status_emoji(agent.status), agent.name),
                format!(
                    "`{}` · {}/{} clients",
                    agent.id,
                    agent.assigned_clients.len(),
                    agent.max_clients
                ),
                true,
            )
        });

        let embed = serenity::CreateEmbed::default()
            .title("WhatsApp agents")
            .color(0x0025_D366)
            .fields(fields);

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }

    /// Shows router health and the clients still waiting for an agent.
    #[poise::command(slash_command, prefix_command)]
    pub async fn queue(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let data = ctx.data();
        let status = data.router.status(data.transport.is_connected());

        let (health, color): (&str, u32) = match status.health {
            Health::Operational => ("🟢 Operational", 0x0057_F287),
            Health::Degraded => ("🟡 Degraded", 0x00FE_E75C),
            Health::Down => ("🔴 Down", 0x00ED_4245),
        };

        let mut waiting: Vec<_> = data
            .router
            .conversations()
            .into_iter()
            .filter(|c| c.status == ConversationStatus::Waiting)
            .collect();
        waiting.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.started_at.cmp(&b.started_at))
        });
        let waiting_text = if waiting.is_empty() {
            "Nobody is waiting".to_string()
        } else {
            waiting
                .iter()
                .take(QUEUE_PREVIEW)
                .map(|c| {
                    format!(
                        "• {} ({:?}) since {}",
                        c.client_name.as_deref().unwrap_or(&c.client_phone),
                        c.priority,
                        c.started_at.format("%H:%M")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        let embed = serenity::CreateEmbed::default()
            .title("WhatsApp router")
            .color(color)
            .field("Health", health, true)
            .field(
                "Agents online",
                format!("{}/{}", status.online_agents, status.total_agents),
                true,
            )
            .field(
                "Active conversations",
                status.active_conversations.to_string(),
                true,
            )
            .field("Strategy", status.strategy, true)
            .field(format!("Waiting ({})", status.queued), waiting_text, false);

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
