//! Secrets module for reading API keys and tokens from environment variables.
//!
//! Values are loaded from the process environment (optionally populated from
//! `.env` by `dotenvy`). Empty values are treated as unset.

/// Anthropic API key variable
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
/// Overrides the Anthropic API base URL
pub const ANTHROPIC_BASE_URL: &str = "ANTHROPIC_BASE_URL";
/// WhatsApp Cloud API bearer token
pub const WHATSAPP_ACCESS_TOKEN: &str = "WHATSAPP_ACCESS_TOKEN";
/// WhatsApp Cloud API sender phone number ID
pub const WHATSAPP_PHONE_NUMBER_ID: &str = "WHATSAPP_PHONE_NUMBER_ID";
/// Token Meta echoes back during webhook verification
pub const WHATSAPP_VERIFY_TOKEN: &str = "WHATSAPP_VERIFY_TOKEN";
/// Discord bot token for the staff bot
pub const DISCORD_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";

/// Reads an environment variable, treating empty strings as unset.
#[must_use]
pub fn get_secret(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Credentials for the WhatsApp Cloud API.
#[derive(Debug, Clone)]
pub struct WhatsAppCredentials {
    /// Bearer token
    pub access_token: String,
    /// Sender phone number ID
    pub phone_number_id: String,
}

/// Gets the WhatsApp credentials when both variables are configured.
#[must_use]
pub fn whatsapp_credentials() -> Option<WhatsAppCredentials> {
    Some(WhatsAppCredentials {
        access_token: get_secret(WHATSAPP_ACCESS_TOKEN)?,
        phone_number_id: get_secret(WHATSAPP_PHONE_NUMBER_ID)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_secret_returns_none_when_not_found() {
        assert!(get_secret("TERMAS_ADMIN_SURELY_UNSET_VARIABLE").is_none());
    }
}
