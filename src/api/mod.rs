//! HTTP API - JSON endpoints over the core operations.
//!
//! Every response uses the same envelope: `{"success": true, "data": ...}` or
//! `{"success": false, "error": "..."}` with a matching status code.

pub mod ai;
pub mod catalog;
pub mod inventory;
pub mod whatsapp;

use crate::{
    config::Settings,
    core::{ai::ChatProvider, router::AgentRouter, whatsapp::MessageTransport},
    errors::Error,
};
use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database pool
    pub db: Arc<DatabaseConnection>,
    /// Loaded configuration
    pub settings: Arc<Settings>,
    /// WhatsApp agent router
    pub router: Arc<AgentRouter>,
    /// AI provider
    pub ai: Arc<dyn ChatProvider>,
    /// WhatsApp outbound transport
    pub transport: Arc<dyn MessageTransport>,
    /// Token expected by the webhook verification handshake
    pub verify_token: Option<String>,
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// Always `true`
    pub success: bool,
    /// Payload
    pub data: T,
}

/// Error envelope, rendered from an [`Error`].
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

/// Status code for an error.
#[must_use]
pub const fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation { .. } | Error::InvalidQuantity { .. } | Error::InvalidAmount { .. } => {
            StatusCode::BAD_REQUEST
        }
        Error::ProductNotFound { .. }
        | Error::CategoryNotFound { .. }
        | Error::WarehouseNotFound { .. }
        | Error::MovementNotFound { .. }
        | Error::AgentNotFound { .. }
        | Error::ConversationNotFound { .. } => StatusCode::NOT_FOUND,
        Error::InsufficientStock { .. }
        | Error::DuplicateSku { .. }
        | Error::AgentLimitReached { .. }
        | Error::AgentUnavailable { .. } => StatusCode::CONFLICT,
        Error::TransportUnavailable { .. } | Error::AiNotConfigured { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        Error::Ai { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
        Error::Config { .. }
        | Error::Database(_)
        | Error::Io(_)
        | Error::EnvVar(_)
        | Error::Framework(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self.0);
            "Internal server error".to_string()
        } else {
            self.0.to_string()
        };
        let body = Json(serde_json::json!({
            "success": false,
            "error": message,
        }));
        (status, body).into_response()
    }
}

/// Handler result carrying the success envelope.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Wraps a core result into an API response.
pub(crate) fn ok_json<T: Serialize>(result: crate::errors::Result<T>) -> ApiResult<T> {
    result
        .map(|data| Json(ApiResponse {
            success: true,
            data,
        }))
        .map_err(ApiError::from)
}

/// `?page=&limit=` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Paging {
    /// 1-based page
    #[serde(default)]
    pub page: u64,
    /// Page size
    #[serde(default)]
    pub limit: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> ApiResult<Health> {
    ok_json(Ok(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(catalog::routes())
        .merge(inventory::routes())
        .merge(ai::routes())
        .merge(whatsapp::routes())
}
