//! AI assistant and token usage endpoints.

use super::{ApiResult, AppState, Paging, ok_json};
use crate::{
    core::{
        Page,
        ai::{
            self, BudgetEmail, ChatReply, ChatRequest, EmailTone, TrendGranularity, UsageFilters,
            UsageStats, UsageTrendPoint,
        },
    },
    entities,
};
use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

/// Trend window when `days` is not given.
const DEFAULT_TREND_DAYS: i64 = 30;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ai/status", get(status))
        .route("/ai/chat", post(chat))
        .route("/ai/summary", post(summary))
        .route("/ai/email-response", post(email_response))
        .route("/ai/budget-email", post(budget_email))
        .route("/ai/translate", post(translate))
        .route("/ai/usage", get(history))
        .route("/ai/usage/stats", get(usage_stats))
        .route("/ai/usage/trends", get(trends))
}

async fn status(State(state): State<AppState>) -> ApiResult<ChatReply> {
    ok_json(ai::check_status(&state.db, state.ai.as_ref(), &state.settings.ai).await)
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> ApiResult<ChatReply> {
    ok_json(ai::chat(&state.db, state.ai.as_ref(), &state.settings.ai, request).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryBody {
    content: String,
    max_words: Option<u32>,
    user_id: Option<String>,
}

async fn summary(State(state): State<AppState>, Json(body): Json<SummaryBody>) -> ApiResult<ChatReply> {
    ok_json(
        ai::generate_summary(
            &state.db,
            state.ai.as_ref(),
            &state.settings.ai,
            &body.content,
            body.max_words,
            body.user_id,
        )
        .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailBody {
    email: String,
    #[serde(default)]
    tone: EmailTone,
    user_id: Option<String>,
}

async fn email_response(State(state): State<AppState>, Json(body): Json<EmailBody>) -> ApiResult<ChatReply> {
    ok_json(
        ai::generate_email_response(
            &state.db,
            state.ai.as_ref(),
            &state.settings.ai,
            &body.email,
            body.tone,
            body.user_id,
        )
        .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BudgetBody {
    #[serde(flatten)]
    budget: BudgetEmail,
    user_id: Option<String>,
}

async fn budget_email(State(state): State<AppState>, Json(body): Json<BudgetBody>) -> ApiResult<ChatReply> {
    ok_json(
        ai::generate_budget_email(
            &state.db,
            state.ai.as_ref(),
            &state.settings.ai,
            &body.budget,
            body.user_id,
        )
        .await,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateBody {
    content: String,
    target_language: Option<String>,
    user_id: Option<String>,
}

async fn translate(State(state): State<AppState>, Json(body): Json<TranslateBody>) -> ApiResult<ChatReply> {
    ok_json(
        ai::translate(
            &state.db,
            state.ai.as_ref(),
            &state.settings.ai,
            &body.content,
            body.target_language.as_deref(),
            body.user_id,
        )
        .await,
    )
}

async fn history(
    State(state): State<AppState>,
    Query(paging): Query<Paging>,
) -> ApiResult<Page<entities::ai_token_usage::Model>> {
    ok_json(ai::get_token_usage_history(&state.db, paging.page, paging.limit).await)
}

async fn usage_stats(
    State(state): State<AppState>,
    Query(filters): Query<UsageFilters>,
) -> ApiResult<UsageStats> {
    ok_json(ai::get_token_usage_stats(&state.db, &filters, Utc::now()).await)
}

#[derive(Debug, Deserialize)]
struct TrendQuery {
    #[serde(default)]
    granularity: TrendGranularity,
    days: Option<i64>,
}

async fn trends(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> ApiResult<Vec<UsageTrendPoint>> {
    ok_json(
        ai::get_token_usage_trends(
            &state.db,
            query.granularity,
            query.days.unwrap_or(DEFAULT_TREND_DAYS),
            Utc::now(),
        )
        .await,
    )
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_chat_is_logged_and_reported() {
        let (state, _) = test_state().await;

        let (status, reply) = call(
            &state,
            "POST",
            "/api/ai/chat",
            Some(json!({
                "messages": [{"role": "user", "content": "¿A qué hora abre el spa?"}],
                "sessionId": "front-desk",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["data"]["sessionId"], "front-desk");
        assert_eq!(reply["data"]["promptTokens"], 10);

        let (_, stats) = call(&state, "GET", "/api/ai/usage/stats?period=today", None).await;
        assert_eq!(stats["data"]["totalRequests"], 1);
        assert_eq!(stats["data"]["totalTokens"], 12);
        assert_eq!(stats["data"]["mostUsedFeature"], "chat");

        let (_, history) = call(&state, "GET", "/api/ai/usage?page=1&limit=5", None).await;
        assert_eq!(history["data"]["items"][0]["sessionId"], "front-desk");

        let (_, trends) = call(&state, "GET", "/api/ai/usage/trends?granularity=monthly", None).await;
        assert_eq!(trends["data"][0]["requests"], 1);
    }

    #[tokio::test]
    async fn test_status_check_goes_through_chat() {
        let (state, _) = test_state().await;
        let (status, reply) = call(&state, "GET", "/api/ai/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["data"]["text"], "OK");
        assert_eq!(reply["data"]["model"], state.settings.ai.fast_model.as_str());

        let (_, stats) = call(&state, "GET", "/api/ai/usage/stats", None).await;
        assert_eq!(stats["data"]["totalRequests"], 1);
    }

    #[tokio::test]
    async fn test_budget_email_requires_items() {
        let (state, _) = test_state().await;
        let (status, body) = call(
            &state,
            "POST",
            "/api/ai/budget-email",
            Some(json!({
                "clientName": "Empresa Sur",
                "budgetNumber": "P-1",
                "total": 100000.0,
                "items": [],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
