//! WhatsApp router endpoints and the Cloud API webhook.

use super::{ApiResult, AppState, ok_json};
use crate::core::{
    router::{
        Agent, AgentRegistration, AgentStatus, Conversation, Reassignment, RouterStatus,
        RoutingOutcome,
    },
    whatsapp::{WebhookPayload, auto_reply, parse_webhook, verify_webhook},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::{Local, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/whatsapp/status", get(status))
        .route("/whatsapp/agents", get(list_agents).post(register_agent))
        .route("/whatsapp/agents/:id", delete(unregister_agent))
        .route("/whatsapp/agents/:id/status", put(update_status))
        .route("/whatsapp/conversations", get(list_conversations))
        .route(
            "/whatsapp/conversations/:phone/resolve",
            post(resolve_conversation),
        )
        .route("/whatsapp/send", post(send))
        .route("/whatsapp/webhook", get(verify).post(receive))
}

async fn status(State(state): State<AppState>) -> ApiResult<RouterStatus> {
    ok_json(Ok(state.router.status(state.transport.is_connected())))
}

async fn list_agents(State(state): State<AppState>) -> ApiResult<Vec<Agent>> {
    ok_json(Ok(state.router.agents()))
}

async fn register_agent(
    State(state): State<AppState>,
    Json(registration): Json<AgentRegistration>,
) -> ApiResult<Agent> {
    ok_json(state.router.register_agent(registration))
}

async fn unregister_agent(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Reassignment> {
    ok_json(state.router.unregister_agent(&id))
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: AgentStatus,
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> ApiResult<Agent> {
    ok_json(state.router.update_agent_status(&id, body.status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationQuery {
    agent_id: Option<String>,
}

async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ConversationQuery>,
) -> ApiResult<Vec<Conversation>> {
    let conversations = match query.agent_id {
        Some(agent_id) => state.router.agent_conversations(&agent_id),
        None => state.router.conversations(),
    };
    ok_json(Ok(conversations))
}

async fn resolve_conversation(
    State(state): State<AppState>,
    Path(phone): Path<String>,
) -> ApiResult<Conversation> {
    ok_json(state.router.resolve_conversation(&phone))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBody {
    agent_id: String,
    to: String,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Sent {
    message_id: String,
}

async fn send(State(state): State<AppState>, Json(body): Json<SendBody>) -> ApiResult<Sent> {
    let message_id = state
        .router
        .send_as_agent(state.transport.as_ref(), &body.agent_id, &body.to, &body.message)
        .await?;
    ok_json(Ok(Sent { message_id }))
}

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Subscription handshake: echoes the challenge as plain text.
async fn verify(State(state): State<AppState>, Query(query): Query<VerifyQuery>) -> Response {
    match verify_webhook(
        query.mode.as_deref(),
        query.token.as_deref(),
        query.challenge.as_deref(),
        state.verify_token.as_deref(),
    ) {
        Some(challenge) => (StatusCode::OK, challenge).into_response(),
        None => {
            warn!("Rejected WhatsApp webhook verification");
            let body = Json(serde_json::json!({
                "success": false,
                "error": "Webhook verification failed",
            }));
            (StatusCode::FORBIDDEN, body).into_response()
        }
    }
}

/// Inbound messages: each one is routed, then answered automatically when it
/// is a client command or has just been queued.
async fn receive(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> ApiResult<Vec<RoutingOutcome>> {
    let messages = parse_webhook(payload);
    let mut outcomes = Vec::with_capacity(messages.len());

    for message in messages {
        let from = message.from.clone();
        let body = message.body.clone();
        let outcome = state.router.handle_incoming(message);

        if outcome != RoutingOutcome::Ignored && state.transport.is_connected() {
            let status = state.router.status(true);
            let queued = outcome == RoutingOutcome::Queued;
            if let Some(reply) = auto_reply(&body, queued, &status, Local::now().hour()) {
                let phone = state.router.format_phone(&from);
                if let Err(e) = state.transport.send_text(&phone, &reply).await {
                    warn!("Could not send automatic reply to {phone}: {e}");
                }
            }
        }
        outcomes.push(outcome);
    }

    if !outcomes.is_empty() {
        info!("Webhook delivered {} message(s)", outcomes.len());
    }
    ok_json(Ok(outcomes))
}
