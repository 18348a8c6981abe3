//! AI assistant - Task presets, logged chat calls and prompt helpers.
//!
//! Every call that reaches the provider goes through [`chat`], which writes
//! exactly one `ai_token_usage` row whether the provider succeeds or fails.

pub mod client;
pub mod usage;

pub use client::{
    AnthropicClient, ChatProvider, CompletionRequest, CompletionResponse, PromptMessage, Role,
    UnconfiguredProvider, Usage,
};
pub use usage::{
    TrendGranularity, UsageFilters, UsagePeriod, UsageRecord, UsageStats, UsageTrendPoint,
    estimate_cost, get_token_usage_history, get_token_usage_stats, get_token_usage_trends,
    log_token_usage,
};

use crate::{
    config::AiSettings,
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::{fmt::Write as _, time::Instant};
use tracing::{info, instrument, warn};

/// Prompt sent by [`check_status`].
pub const STATUS_PROMPT: &str = "Responde solo con \"OK\" para verificar la conexión.";
const STATUS_MAX_TOKENS: u32 = 10;

/// Named parameter preset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiTask {
    /// Free conversation
    #[default]
    Chat,
    /// Summaries and analysis, low temperature
    Analysis,
    /// Customer-facing emails
    EmailGeneration,
    /// Translation, near-deterministic
    Translation,
}

impl AiTask {
    /// Name used for `[ai.tasks.*]` keys and the usage log's `feature_type`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Analysis => "analysis",
            Self::EmailGeneration => "email_generation",
            Self::Translation => "translation",
        }
    }
}

/// Model parameters for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfig {
    /// Model name
    pub model: String,
    /// Output token cap
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl TaskConfig {
    /// Defaults from `[ai]`, overridden by the task's `[ai.tasks.<name>]` entry.
    #[must_use]
    pub fn for_task(settings: &AiSettings, task: AiTask) -> Self {
        let preset = settings.tasks.get(task.as_str());
        Self {
            model: preset
                .and_then(|p| p.model.clone())
                .unwrap_or_else(|| settings.default_model.clone()),
            max_tokens: preset
                .and_then(|p| p.max_tokens)
                .unwrap_or(settings.max_tokens),
            temperature: preset
                .and_then(|p| p.temperature)
                .unwrap_or(settings.temperature),
        }
    }
}

/// A chat call as callers describe it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Conversation, oldest first
    pub messages: Vec<PromptMessage>,
    /// System prompt
    pub system: Option<String>,
    /// Preset; `chat` when absent
    pub task: Option<AiTask>,
    /// Staff member making the call
    pub user_id: Option<String>,
    /// Session to log under; generated when absent
    pub session_id: Option<String>,
    /// Overrides the preset's model
    pub model: Option<String>,
    /// Overrides the preset's token cap
    pub max_tokens: Option<u32>,
    /// Overrides the preset's temperature
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Single-turn request with a system prompt.
    #[must_use]
    pub fn prompt(system: impl Into<String>, user: impl Into<String>, task: AiTask) -> Self {
        Self {
            messages: vec![PromptMessage::user(user)],
            system: Some(system.into()),
            task: Some(task),
            ..Default::default()
        }
    }

    /// Sets the user the call is logged against.
    #[must_use]
    pub fn for_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

/// Result of a successful chat call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    /// Generated text
    pub text: String,
    /// Model that answered
    pub model: String,
    /// Session the call was logged under
    pub session_id: String,
    /// Prompt tokens
    pub prompt_tokens: i64,
    /// Completion tokens
    pub completion_tokens: i64,
    /// Estimated dollars
    pub estimated_cost_usd: f64,
    /// Wall-clock duration
    pub processing_time_ms: i64,
}

/// Runs one chat completion and records its token usage.
///
/// A failure to write the usage row is logged and does not fail the call.
///
/// # Errors
/// Returns [`Error::Validation`] for a request without messages, and the
/// provider's error when the completion fails (after logging it).
#[instrument(skip_all, fields(task = request.task.unwrap_or_default().as_str()))]
pub async fn chat(
    db: &DatabaseConnection,
    provider: &dyn ChatProvider,
    settings: &AiSettings,
    request: ChatRequest,
) -> Result<ChatReply> {
    if request.messages.is_empty() {
        return Err(Error::validation("At least one message is required"));
    }

    let task = request.task.unwrap_or_default();
    let preset = TaskConfig::for_task(settings, task);
    let completion = CompletionRequest {
        model: request.model.unwrap_or(preset.model),
        max_tokens: request.max_tokens.unwrap_or(preset.max_tokens),
        temperature: request.temperature.unwrap_or(preset.temperature),
        system: request.system.filter(|s| !s.trim().is_empty()),
        messages: request.messages,
    };
    let session_id = request
        .session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("session-{}", Utc::now().timestamp_millis()));

    let started = Instant::now();
    let outcome = provider.complete(&completion).await;
    let elapsed = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

    let mut record = UsageRecord {
        user_id: request.user_id,
        session_id: session_id.clone(),
        feature_type: task.as_str().to_string(),
        model_used: completion.model.clone(),
        endpoint_used: Some(client::MESSAGES_ENDPOINT.to_string()),
        processing_time_ms: Some(elapsed),
        ..Default::default()
    };
    match &outcome {
        Ok(response) => {
            let usage = response.usage.unwrap_or_default();
            record.model_used.clone_from(&response.model);
            record.prompt_tokens = usage.input_tokens;
            record.completion_tokens = usage.output_tokens;
            record.success = true;
        }
        Err(e) => {
            record.error_message = Some(e.to_string());
        }
    }
    if let Err(e) = log_token_usage(db, settings, record).await {
        warn!("Failed to log token usage for {session_id}: {e}");
    }

    let response = outcome?;
    let usage = response.usage.unwrap_or_default();
    info!(
        "AI {} call answered by {} ({} + {} tokens, {elapsed} ms)",
        task.as_str(),
        response.model,
        usage.input_tokens,
        usage.output_tokens
    );

    Ok(ChatReply {
        estimated_cost_usd: estimate_cost(
            settings,
            &response.model,
            usage.input_tokens,
            usage.output_tokens,
        ),
        text: response.text,
        model: response.model,
        session_id,
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        processing_time_ms: elapsed,
    })
}

/// Sends the status prompt with the fast model.
///
/// The check is a normal [`chat`] call, so it shows up in the usage log.
///
/// # Errors
/// Returns the provider's error when the API is unreachable or misconfigured.
pub async fn check_status(
    db: &DatabaseConnection,
    provider: &dyn ChatProvider,
    settings: &AiSettings,
) -> Result<ChatReply> {
    chat(
        db,
        provider,
        settings,
        ChatRequest {
            messages: vec![PromptMessage::user(STATUS_PROMPT)],
            model: Some(settings.fast_model.clone()),
            max_tokens: Some(STATUS_MAX_TOKENS),
            ..Default::default()
        },
    )
    .await
}

/// Summarises `content` in at most `max_words` words (default 100).
///
/// # Errors
/// Returns the provider's error.
pub async fn generate_summary(
    db: &DatabaseConnection,
    provider: &dyn ChatProvider,
    settings: &AiSettings,
    content: &str,
    max_words: Option<u32>,
    user_id: Option<String>,
) -> Result<ChatReply> {
    let max_words = max_words.unwrap_or(100);
    let request = ChatRequest::prompt(
        format!(
            "Eres un asistente que genera resúmenes concisos. Genera un resumen de máximo {max_words} palabras del contenido proporcionado."
        ),
        format!("Resume el siguiente contenido en máximo {max_words} palabras:\n\n{content}"),
        AiTask::Analysis,
    )
    .for_user(user_id);
    chat(db, provider, settings, request).await
}

/// Register of a generated email.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailTone {
    /// Formal
    Formal,
    /// Warm
    Friendly,
    /// Neutral business register
    #[default]
    Professional,
}

impl EmailTone {
    /// Spanish adjective, singular.
    #[must_use]
    pub const fn adjective(self) -> &'static str {
        match self {
            Self::Formal => "formal",
            Self::Friendly => "cordial",
            Self::Professional => "profesional",
        }
    }

    /// Spanish adjective, plural.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Formal => "formales",
            Self::Friendly => "cordiales",
            Self::Professional => "profesionales",
        }
    }
}

/// Drafts a reply to a customer email.
///
/// # Errors
/// Returns the provider's error.
pub async fn generate_email_response(
    db: &DatabaseConnection,
    provider: &dyn ChatProvider,
    settings: &AiSettings,
    email: &str,
    tone: EmailTone,
    user_id: Option<String>,
) -> Result<ChatReply> {
    let request = ChatRequest::prompt(
        format!(
            "Eres un asistente que genera respuestas de email {} para un hotel/spa. Mantén un tono {} y profesional.",
            tone.plural(),
            tone.adjective()
        ),
        format!("Genera una respuesta adecuada para el siguiente email:\n\n{email}"),
        AiTask::EmailGeneration,
    )
    .for_user(user_id);
    chat(db, provider, settings, request).await
}

/// One line of a budget.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BudgetItem {
    /// Service or product name
    pub name: String,
    /// Units
    pub quantity: f64,
    /// Line price in CLP
    pub price: f64,
}

/// Data for [`generate_budget_email`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetEmail {
    /// Client or organisation
    pub client_name: String,
    /// Budget reference
    pub budget_number: String,
    /// Total in CLP
    pub total: f64,
    /// Lines
    pub items: Vec<BudgetItem>,
    /// Validity, "30 días" when absent
    pub valid_until: Option<String>,
    /// Register
    #[serde(default)]
    pub tone: EmailTone,
    /// Extra instructions from staff
    pub custom_instructions: Option<String>,
}

/// Formats a CLP amount with `.` as the thousands separator.
#[must_use]
pub fn format_clp(amount: f64) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    if rounded < 0 {
        out.insert(0, '-');
    }
    out
}

fn budget_prompts(budget: &BudgetEmail) -> (String, String) {
    let tone = budget.tone.adjective();
    let system = format!(
        "Eres un asistente de redacción comercial para un hotel & spa termal de lujo en Chile, \
con aguas termales naturales, spa, masajes, gastronomía y alojamiento.\n\n\
Genera un email {tone}, cálido y persuasivo que motive al cliente a reservar: destaca los \
beneficios de las termas y la experiencia premium, crea una urgencia sutil y elegante, \
y termina con una llamada a la acción clara."
    );

    let mut items = String::new();
    for item in &budget.items {
        let unit = if item.quantity > 1.0 { "unidades" } else { "unidad" };
        let _ = writeln!(
            items,
            "• {} ({} {unit}) - ${}",
            item.name,
            item.quantity,
            format_clp(item.price)
        );
    }

    let mut user = format!(
        "Genera un email comercial con estos datos:\n\n\
DATOS DEL PRESUPUESTO:\n\
• Cliente: {}\n\
• Número: {}\n\
• Total: ${} CLP\n\
• Validez: {}\n\n\
SERVICIOS INCLUIDOS:\n{items}",
        budget.client_name,
        budget.budget_number,
        format_clp(budget.total),
        budget.valid_until.as_deref().unwrap_or("30 días"),
    );
    if let Some(instructions) = budget
        .custom_instructions
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        let _ = write!(user, "\nINSTRUCCIONES ESPECIALES:\n{instructions}\n");
    }
    let _ = write!(
        user,
        "\nREQUERIMIENTOS:\n\
- Email en español chileno\n\
- Máximo 400 palabras\n\
- Tono {tone} pero vendedor\n\
- Incluir datos de contacto\n\
- NO incluir asunto (solo cuerpo del email)"
    );

    (system, user)
}

/// Drafts the email that accompanies a budget.
///
/// # Errors
/// Returns [`Error::Validation`] for a budget without client or items, and the
/// provider's error otherwise.
pub async fn generate_budget_email(
    db: &DatabaseConnection,
    provider: &dyn ChatProvider,
    settings: &AiSettings,
    budget: &BudgetEmail,
    user_id: Option<String>,
) -> Result<ChatReply> {
    if budget.client_name.trim().is_empty() {
        return Err(Error::validation("Client name is required"));
    }
    if budget.items.is_empty() {
        return Err(Error::validation("A budget needs at least one item"));
    }
    let (system, user) = budget_prompts(budget);
    let request = ChatRequest::prompt(system, user, AiTask::EmailGeneration).for_user(user_id);
    chat(db, provider, settings, request).await
}

/// Translates `content`, into English ("inglés") by default.
///
/// # Errors
/// Returns the provider's error.
pub async fn translate(
    db: &DatabaseConnection,
    provider: &dyn ChatProvider,
    settings: &AiSettings,
    content: &str,
    target_language: Option<&str>,
    user_id: Option<String>,
) -> Result<ChatReply> {
    let language = target_language.unwrap_or("inglés");
    let request = ChatRequest::prompt(
        format!(
            "Eres un traductor profesional. Traduce el contenido de manera precisa y natural al {language}."
        ),
        format!("Traduce el siguiente contenido al {language}:\n\n{content}"),
        AiTask::Translation,
    )
    .for_user(user_id);
    chat(db, provider, settings, request).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{entities::AiTokenUsage, test_utils::*};
    use sea_orm::{EntityTrait, PaginatorTrait};

    #[test]
    fn test_task_presets() {
        let settings = AiSettings::default();

        let chat = TaskConfig::for_task(&settings, AiTask::Chat);
        assert_eq!(chat.model, settings.default_model);
        assert_eq!(chat.max_tokens, 1000);

        let translation = TaskConfig::for_task(&settings, AiTask::Translation);
        assert_eq!(translation.temperature, 0.2);
        assert_eq!(translation.max_tokens, 2000);
    }

    #[test]
    fn test_format_clp() {
        assert_eq!(format_clp(0.0), "0");
        assert_eq!(format_clp(950.0), "950");
        assert_eq!(format_clp(1500.0), "1.500");
        assert_eq!(format_clp(1_234_567.4), "1.234.567");
    }

    #[test]
    fn test_budget_prompt_lists_items() {
        let budget = BudgetEmail {
            client_name: "Empresa Sur".to_string(),
            budget_number: "P-0042".to_string(),
            total: 185_000.0,
            items: vec![
                BudgetItem {
                    name: "Masaje descontracturante".to_string(),
                    quantity: 2.0,
                    price: 90_000.0,
                },
                BudgetItem {
                    name: "Pase termas".to_string(),
                    quantity: 1.0,
                    price: 5_000.0,
                },
            ],
            valid_until: None,
            tone: EmailTone::Friendly,
            custom_instructions: Some("Mencionar el almuerzo incluido".to_string()),
        };

        let (system, user) = budget_prompts(&budget);
        assert!(system.contains("cordial"));
        assert!(user.contains("• Masaje descontracturante (2 unidades) - $90.000"));
        assert!(user.contains("• Pase termas (1 unidad) - $5.000"));
        assert!(user.contains("Total: $185.000 CLP"));
        assert!(user.contains("Validez: 30 días"));
        assert!(user.contains("Mencionar el almuerzo incluido"));
    }

    #[tokio::test]
    async fn test_chat_logs_one_row_with_session() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = AiSettings::default();
        let provider = MockProvider::replying("Hola", 120, 30);

        let reply = chat(
            &db,
            &provider,
            &settings,
            ChatRequest {
                messages: vec![PromptMessage::user("Hola")],
                session_id: Some("recepcion-1".to_string()),
                user_id: Some("ana".to_string()),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(reply.text, "Hola");
        assert_eq!(reply.session_id, "recepcion-1");
        assert_eq!(reply.prompt_tokens, 120);

        let rows = AiTokenUsage::find().all(&db).await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].session_id, "recepcion-1");
        assert_eq!(rows[0].feature_type, "chat");
        assert_eq!(rows[0].total_tokens, 150);
        assert_eq!(rows[0].user_id.as_deref(), Some("ana"));
        assert!(rows[0].success);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_chat_logs_zero_tokens() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = AiSettings::default();
        let provider = MockProvider::failing("529: Overloaded");

        let result = chat(
            &db,
            &provider,
            &settings,
            ChatRequest {
                messages: vec![PromptMessage::user("Hola")],
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Ai { .. })));

        let rows = AiTokenUsage::find().all(&db).await?;
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].success);
        assert_eq!(rows[0].total_tokens, 0);
        assert!(rows[0].session_id.starts_with("session-"));
        assert!(rows[0].error_message.as_deref().unwrap().contains("Overloaded"));

        Ok(())
    }

    #[tokio::test]
    async fn test_empty_request_is_rejected_without_logging() -> Result<()> {
        let db = setup_test_db().await?;
        let provider = MockProvider::replying("x", 1, 1);

        let result = chat(&db, &provider, &AiSettings::default(), ChatRequest::default()).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        assert_eq!(AiTokenUsage::find().count(&db).await?, 0);
        assert!(provider.requests().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_check_status_uses_fast_model() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = AiSettings::default();
        let provider = MockProvider::replying("OK", 20, 1);

        let reply = check_status(&db, &provider, &settings).await?;
        assert_eq!(reply.text, "OK");

        let sent = provider.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].model, settings.fast_model);
        assert_eq!(sent[0].max_tokens, 10);
        assert_eq!(sent[0].messages[0].content, STATUS_PROMPT);
        assert_eq!(AiTokenUsage::find().count(&db).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_translate_uses_translation_preset() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = AiSettings::default();
        let provider = MockProvider::replying("Thermal baths", 15, 4);

        translate(&db, &provider, &settings, "Termas", None, None).await?;

        let sent = provider.requests();
        assert_eq!(sent[0].temperature, 0.2);
        assert!(sent[0].system.as_deref().unwrap().contains("al inglés"));
        assert!(sent[0].messages[0].content.ends_with("Termas"));

        let rows = AiTokenUsage::find().all(&db).await?;
        assert_eq!(rows[0].feature_type, "translation");

        Ok(())
    }

    #[tokio::test]
    async fn test_summary_and_email_prompts() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = AiSettings::default();
        let provider = MockProvider::replying("texto", 10, 10);

        generate_summary(&db, &provider, &settings, "Largo texto", Some(50), None).await?;
        generate_email_response(
            &db,
            &provider,
            &settings,
            "¿Tienen piscina temperada?",
            EmailTone::Formal,
            None,
        )
        .await?;

        let sent = provider.requests();
        assert!(sent[0].messages[0].content.starts_with("Resume el siguiente contenido en máximo 50 palabras"));
        assert!(sent[1].system.as_deref().unwrap().contains("respuestas de email formales"));
        assert_eq!(sent[1].max_tokens, 1500);

        let features: Vec<String> = AiTokenUsage::find()
            .all(&db)
            .await?
            .into_iter()
            .map(|r| r.feature_type)
            .collect();
        assert_eq!(features, vec!["analysis", "email_generation"]);

        Ok(())
    }
}
