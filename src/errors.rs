//! Unified error type for the back office.
//!
//! Every core operation returns [`Result`]; the HTTP layer maps each variant to
//! a status code and the bot layer turns it into a user-facing reply.

use thiserror::Error;

/// Application error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration or input problem that is not tied to a specific field.
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// Input failed validation.
    #[error("{message}")]
    Validation {
        /// Human-readable description
        message: String,
    },

    /// A stock quantity was zero, negative, or not a finite number.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: f64,
    },

    /// A money amount was negative or not a finite number.
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Source warehouse does not hold enough units.
    #[error("Insufficient stock: available {available}, requested {requested}")]
    InsufficientStock {
        /// Units on hand at the source warehouse
        available: f64,
        /// Units the movement asked for
        requested: f64,
    },

    /// Product lookup failed or the product is deleted.
    #[error("Product not found: {name}")]
    ProductNotFound {
        /// Name, SKU or ID used for the lookup
        name: String,
    },

    /// Category lookup failed.
    #[error("Category not found: {name}")]
    CategoryNotFound {
        /// Name or ID used for the lookup
        name: String,
    },

    /// Warehouse lookup failed or the warehouse is inactive.
    #[error("Warehouse not found: {name}")]
    WarehouseNotFound {
        /// Name or ID used for the lookup
        name: String,
    },

    /// Inventory movement lookup failed.
    #[error("Inventory movement not found: {id}")]
    MovementNotFound {
        /// Movement ID
        id: i64,
    },

    /// Another product already uses this SKU.
    #[error("SKU already in use: {sku}")]
    DuplicateSku {
        /// The conflicting SKU
        sku: String,
    },

    /// Router has no agent with this ID.
    #[error("Agent not found: {id}")]
    AgentNotFound {
        /// Agent ID
        id: String,
    },

    /// Router refused a registration because it is full or the ID is taken.
    #[error("Agent registration refused: {reason}")]
    AgentLimitReached {
        /// Why the registration was refused
        reason: String,
    },

    /// Router has no open conversation with this client.
    #[error("Conversation not found: {phone}")]
    ConversationNotFound {
        /// Normalised client phone number
        phone: String,
    },

    /// Agent exists but cannot act right now (busy or offline).
    #[error("Agent {id} is not available")]
    AgentUnavailable {
        /// Agent ID
        id: String,
    },

    /// Outbound messaging transport is not connected.
    #[error("Messaging transport unavailable: {message}")]
    TransportUnavailable {
        /// Transport-specific detail
        message: String,
    },

    /// AI provider returned an error or an unusable response.
    #[error("AI provider error: {message}")]
    Ai {
        /// Provider error text
        message: String,
    },

    /// No API key configured for the AI provider.
    #[error("AI provider not configured: {variable} is not set")]
    AiNotConfigured {
        /// Missing environment variable
        variable: &'static str,
    },

    /// Database error from `SeaORM`.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Outbound HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Serenity/Poise framework error.
    #[error("Serenity/Poise framework error: {0}")]
    Framework(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether the error was caused by caller input rather than the system.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::InvalidQuantity { .. }
                | Self::InvalidAmount { .. }
                | Self::InsufficientStock { .. }
                | Self::ProductNotFound { .. }
                | Self::CategoryNotFound { .. }
                | Self::WarehouseNotFound { .. }
                | Self::MovementNotFound { .. }
                | Self::DuplicateSku { .. }
                | Self::AgentNotFound { .. }
                | Self::ConversationNotFound { .. }
                | Self::AgentLimitReached { .. }
                | Self::AgentUnavailable { .. }
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
