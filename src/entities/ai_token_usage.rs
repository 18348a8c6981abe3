//! AI token usage entity - One row per AI provider call, successful or not.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Token usage database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "ai_token_usage")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Staff member who triggered the call, if known
    pub user_id: Option<String>,
    /// Caller-supplied conversation/session identifier
    pub session_id: String,
    /// Feature that made the call (`"chat"`, `"analysis"`, `"email_generation"`, ...)
    pub feature_type: String,
    /// Model name sent to the provider
    pub model_used: String,
    /// Input tokens reported by the provider
    pub prompt_tokens: i64,
    /// Output tokens reported by the provider
    pub completion_tokens: i64,
    /// `prompt_tokens + completion_tokens`
    pub total_tokens: i64,
    /// Cost estimate from the configured pricing table
    pub estimated_cost_usd: f64,
    /// Request kind, currently always `"completion"`
    pub request_type: String,
    /// Provider endpoint path
    pub endpoint_used: Option<String>,
    /// Whether the provider call succeeded
    pub success: bool,
    /// Provider or transport error text for failed calls
    pub error_message: Option<String>,
    /// Wall-clock duration of the call
    pub processing_time_ms: Option<i64>,
    /// When the row was written
    pub created_at: DateTimeUtc,
}

/// `AiTokenUsage` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
