//! Application settings loaded from config.toml
//!
//! Every section is optional; missing keys fall back to the defaults the hotel
//! runs with. Secrets (API keys, tokens) never live here, see [`super::secrets`].

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP server options
    pub server: ServerSettings,
    /// WhatsApp agent router options
    pub router: RouterSettings,
    /// SKU generator options
    pub sku: SkuSettings,
    /// AI provider options
    pub ai: AiSettings,
    /// Warehouses to create on first start
    pub warehouses: Vec<WarehouseSeed>,
}

/// HTTP server options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the API listens on
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// How the router picks an agent for a new conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancing {
    /// Rotate through available agents
    #[default]
    RoundRobin,
    /// Agent with the fewest open conversations
    LeastBusy,
    /// Uniformly random available agent
    Random,
}

impl std::fmt::Display for LoadBalancing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RoundRobin => "round-robin",
            Self::LeastBusy => "least-busy",
            Self::Random => "random",
        };
        f.write_str(name)
    }
}

/// WhatsApp agent router options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Maximum number of registered agents
    pub max_agents: usize,
    /// Maximum open conversations per agent
    pub max_clients_per_agent: usize,
    /// Agent selection strategy
    pub strategy: LoadBalancing,
    /// Conversations idle longer than this are resolved by `expire_idle`
    pub session_timeout_minutes: i64,
    /// Prefix added to phone numbers that lack it
    pub country_code: String,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            max_agents: 5,
            max_clients_per_agent: 10,
            strategy: LoadBalancing::RoundRobin,
            session_timeout_minutes: 30,
            country_code: "56".to_string(),
        }
    }
}

/// SKU generator options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SkuSettings {
    /// Keywords per SKU
    pub max_keywords: usize,
    /// Characters kept from each keyword
    pub keyword_length: usize,
    /// Whether a number in the name (e.g. "24") may become a keyword
    pub include_numbers: bool,
    /// Whether the brand may become a keyword
    pub include_brand: bool,
    /// Brand is considered before dictionary words when true, last otherwise
    pub brand_priority: bool,
    /// Zero-padded width of the sequence suffix
    pub sequence_digits: usize,
    /// Words never used as keywords
    pub stop_words: Vec<String>,
    /// Words preferred as keywords when they appear in the name
    pub priority_words: Vec<String>,
}

impl Default for SkuSettings {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|w| (*w).to_string()).collect();
        Self {
            max_keywords: 2,
            keyword_length: 4,
            include_numbers: true,
            include_brand: true,
            brand_priority: true,
            sequence_digits: 3,
            stop_words: words(&[
                "de", "del", "la", "el", "para", "con", "sin", "por", "en", "y", "o",
            ]),
            priority_words: words(&[
                "monitor", "teclado", "mouse", "papel", "cable", "usb", "hdmi", "led", "lcd",
            ]),
        }
    }
}

/// Per-task overrides of the default AI parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskOverride {
    /// Model to use for this task
    pub model: Option<String>,
    /// Maximum output tokens
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// Price per thousand tokens for one model
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ModelPricing {
    /// USD per 1k input tokens
    pub input_per_1k: f64,
    /// USD per 1k output tokens
    pub output_per_1k: f64,
}

/// AI provider options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiSettings {
    /// Model used when neither the request nor the task names one
    pub default_model: String,
    /// Cheap model used for status checks
    pub fast_model: String,
    /// Default maximum output tokens
    pub max_tokens: u32,
    /// Default sampling temperature
    pub temperature: f32,
    /// Request timeout
    pub timeout_secs: u64,
    /// Overrides keyed by task name (`chat`, `analysis`, `email_generation`, `translation`)
    pub tasks: HashMap<String, TaskOverride>,
    /// Prices keyed by model name
    pub pricing: HashMap<String, ModelPricing>,
    /// Price used for models missing from `pricing`
    pub default_pricing: ModelPricing,
}

impl Default for AiSettings {
    fn default() -> Self {
        let mut tasks = HashMap::new();
        tasks.insert(
            "analysis".to_string(),
            TaskOverride {
                model: None,
                max_tokens: Some(2000),
                temperature: Some(0.3),
            },
        );
        tasks.insert(
            "email_generation".to_string(),
            TaskOverride {
                model: None,
                max_tokens: Some(1500),
                temperature: Some(0.7),
            },
        );
        tasks.insert(
            "translation".to_string(),
            TaskOverride {
                model: None,
                max_tokens: Some(2000),
                temperature: Some(0.2),
            },
        );

        let mut pricing = HashMap::new();
        pricing.insert(
            "claude-3-5-sonnet-20241022".to_string(),
            ModelPricing {
                input_per_1k: 0.003,
                output_per_1k: 0.015,
            },
        );
        pricing.insert(
            "claude-3-haiku-20240307".to_string(),
            ModelPricing {
                input_per_1k: 0.000_25,
                output_per_1k: 0.001_25,
            },
        );
        pricing.insert(
            "claude-3-opus-20240229".to_string(),
            ModelPricing {
                input_per_1k: 0.015,
                output_per_1k: 0.075,
            },
        );

        Self {
            default_model: "claude-3-5-sonnet-20241022".to_string(),
            fast_model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout_secs: 90,
            tasks,
            pricing,
            default_pricing: ModelPricing {
                input_per_1k: 0.003,
                output_per_1k: 0.015,
            },
        }
    }
}

/// A warehouse created at start-up if missing
#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseSeed {
    /// Unique warehouse name
    pub name: String,
    /// Optional location
    #[serde(default)]
    pub location: Option<String>,
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    debug!("Loading configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses settings from TOML text
pub fn parse_config(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from `APP_CONFIG` (default `./config.toml`).
///
/// A missing file is not an error: the built-in defaults are used instead.
pub fn load_default_config() -> Result<Settings> {
    let path = std::env::var("APP_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        load_config(&path)
    } else {
        info!("No configuration file at {path}, using defaults");
        Ok(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [server]
            bind_address = "127.0.0.1:8080"

            [router]
            max_agents = 3
            strategy = "least_busy"

            [sku]
            max_keywords = 3

            [ai]
            default_model = "claude-3-haiku-20240307"

            [ai.tasks.analysis]
            temperature = 0.1

            [ai.pricing."claude-3-haiku-20240307"]
            input_per_1k = 0.001
            output_per_1k = 0.002

            [[warehouses]]
            name = "Bodega Central"
            location = "Subterráneo"

            [[warehouses]]
            name = "Spa"
        "#;

        let settings = parse_config(toml_str).unwrap();
        assert_eq!(settings.server.bind_address, "127.0.0.1:8080");
        assert_eq!(settings.router.max_agents, 3);
        assert_eq!(settings.router.max_clients_per_agent, 10);
        assert_eq!(settings.router.strategy, LoadBalancing::LeastBusy);
        assert_eq!(settings.sku.max_keywords, 3);
        assert_eq!(settings.sku.keyword_length, 4);
        assert_eq!(settings.ai.default_model, "claude-3-haiku-20240307");
        assert_eq!(
            settings.ai.tasks.get("analysis").unwrap().temperature,
            Some(0.1)
        );
        assert_eq!(
            settings.ai.pricing["claude-3-haiku-20240307"].input_per_1k,
            0.001
        );
        assert_eq!(settings.warehouses.len(), 2);
        assert_eq!(settings.warehouses[1].location, None);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings = parse_config("").unwrap();
        assert_eq!(settings.router.max_agents, 5);
        assert_eq!(settings.router.strategy, LoadBalancing::RoundRobin);
        assert_eq!(settings.sku.sequence_digits, 3);
        assert!(settings.sku.stop_words.contains(&"de".to_string()));
        assert_eq!(settings.ai.max_tokens, 1000);
        assert!(settings.warehouses.is_empty());
    }

    #[test]
    fn test_invalid_strategy_is_rejected() {
        let result = parse_config("[router]\nstrategy = \"fastest\"\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
