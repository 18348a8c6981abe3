//! AI assistant Discord commands - `ask`, `translate` and `ai_usage`.
//!
//! Every call is logged to the token usage table under the caller's Discord ID.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, reply_or_propagate},
        core::ai::{self, AiTask, ChatRequest, UsageFilters, UsagePeriod},
        errors::{Error, Result},
    };
    use chrono::Utc;
    use poise::serenity_prelude as serenity;

    /// Discord's message length limit.
    const DISCORD_MESSAGE_LIMIT: usize = 2000;

    const ASSISTANT_PROMPT: &str = "Eres el asistente interno de un hotel termal con spa. \
        Respondes a personal de recepción, bodega y administración en español, \
        de forma breve y práctica.";

    /// Cuts `text` to Discord's limit on a character boundary.
    pub(crate) fn fit_message(text: &str) -> String {
        if text.chars().count() <= DISCORD_MESSAGE_LIMIT {
            return text.to_string();
        }
        let mut cut: String = text.chars().take(DISCORD_MESSAGE_LIMIT - 1).collect();
        cut.push('…');
        cut
    }

    /// Usage window offered as a slash command choice.
    #[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
    pub enum PeriodChoice {
        Today,
        Week,
        Month,
        All,
    }

    impl From<PeriodChoice> for UsagePeriod {
        fn from(choice: PeriodChoice) -> Self {
            match choice {
                PeriodChoice::Today => Self::Today,
                PeriodChoice::Week => Self::Week,
                PeriodChoice::Month => Self::Month,
                PeriodChoice::All => Self::All,
            }
        }
    }

    /// Asks the AI assistant a question.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ask(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Your question"]
        #[rest]
        question: String,
    ) -> Result<()> {
        ctx.defer().await?;
        let data = ctx.data();

        let request = ChatRequest::prompt(ASSISTANT_PROMPT, question, AiTask::Chat)
            .for_user(Some(ctx.author().id.to_string()));
        match ai::chat(data.database.as_ref(), data.ai.as_ref(), &data.settings.ai, request).await {
            Ok(reply) => {
                ctx.say(fit_message(&reply.text)).await?;
                Ok(())
            }
            Err(e @ (Error::Ai { .. } | Error::AiNotConfigured { .. })) => {
                ctx.say(format!("❌ {e}")).await?;
                Ok(())
            }
            Err(e) => reply_or_propagate(ctx, e).await,
        }
    }

    /// Translates a text, to English unless another language is given.
    #[poise::command(slash_command)]
    pub async fn translate(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Text to translate"] text: String,
        #[description = "Target language (e.g., 'portugués')"] language: Option<String>,
    ) -> Result<()> {
        ctx.defer().await?;
        let data = ctx.data();

        match ai::translate(
            data.database.as_ref(),
            data.ai.as_ref(),
            &data.settings.ai,
            &text,
            language.as_deref(),
            Some(ctx.author().id.to_string()),
        )
        .await
        {
            Ok(reply) => {
                ctx.say(fit_message(&reply.text)).await?;
                Ok(())
            }
            Err(e @ (Error::Ai { .. } | Error::AiNotConfigured { .. })) => {
                ctx.say(format!("❌ {e}")).await?;
                Ok(())
            }
            Err(e) => reply_or_propagate(ctx, e).await,
        }
    }

    /// Shows AI token usage and estimated cost.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ai_usage(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Reporting window. Defaults to this month."] period: Option<PeriodChoice>,
    ) -> Result<()> {
        let db = ctx.data().database.as_ref();
        let period = period.map_or(UsagePeriod::Month, UsagePeriod::from);
        let filters = UsageFilters {
            period,
            ..Default::default()
        };

        let stats = ai::get_token_usage_stats(db, &filters, Utc::now()).await?;
        if stats.total_requests == 0 {
            ctx.say("No AI calls recorded in this period.").await?;
            return Ok(());
        }

        let by_feature = stats
            .by_feature
            .iter()
            .map(|(feature, usage)| {
                format!(
                    "{feature}: {} calls, {} tokens, ${:.4}",
                    usage.requests, usage.total_tokens, usage.total_cost_usd
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let embed = serenity::CreateEmbed::default()
            .title(format!("AI usage ({period:?})"))
            .color(0x00EB_459E)
            .field(
                "Requests",
                format!(
                    "{} ({} failed)",
                    stats.total_requests, stats.failed_requests
                ),
                true,
            )
            .field("Tokens", stats.total_tokens.to_string(), true)
            .field("Cost", format!("${:.4}", stats.total_cost_usd), true)
            .field(
                "Avg tokens/request",
                stats.average_tokens_per_request.to_string(),
                true,
            )
            .field(
                "Top model",
                stats.most_used_model.unwrap_or_else(|| "-".to_string()),
                true,
            )
            .field("By feature", by_feature, false);

        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
