use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "parlor.toml",
    "config/parlor.toml",
    "crates/config/parlor.toml",
    "../parlor.toml",
    "../config/parlor.toml",
];

/// Development-only signing secret. `serve` warns when it is still in use.
pub const DEV_JWT_SECRET: &str = "parlor-development-secret-change-me";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://parlor.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "AuthConfig::default_issuer")]
    pub issuer: String,
    #[serde(default = "AuthConfig::default_audience")]
    pub audience: String,
    #[serde(default = "AuthConfig::default_token_ttl")]
    pub token_ttl_seconds: u64,
}

impl AuthConfig {
    fn default_issuer() -> String {
        "parlor".to_string()
    }

    fn default_audience() -> String {
        "parlor-clients".to_string()
    }

    const fn default_token_ttl() -> u64 {
        86_400
    }

    pub fn uses_development_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            issuer: Self::default_issuer(),
            audience: Self::default_audience(),
            token_ttl_seconds: Self::default_token_ttl(),
        }
    }
}

/// Behaviour of the automated room participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "AssistantConfig::default_enabled")]
    pub enabled: bool,
    /// Reserved sender identity stamped on AI replies and typing events.
    #[serde(default = "AssistantConfig::default_sender_id")]
    pub sender_id: String,
}

impl AssistantConfig {
    const fn default_enabled() -> bool {
        true
    }

    fn default_sender_id() -> String {
        "GEMINI".to_string()
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            sender_id: Self::default_sender_id(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub gemini: GeminiProviderConfig,
}

/// Configuration options for the Gemini `generateContent` integration.
///
/// ```
/// use parlor_config::GeminiProviderConfig;
///
/// let provider = GeminiProviderConfig::default();
/// assert_eq!(provider.model, "gemini-2.5-flash");
/// assert_eq!(provider.request_timeout_seconds, 30);
/// assert!(provider.api_key.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "GeminiProviderConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "GeminiProviderConfig::default_model")]
    pub model: String,
    #[serde(default = "GeminiProviderConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub system_instruction: Option<String>,
}

impl GeminiProviderConfig {
    fn default_base_url() -> String {
        "https://generativelanguage.googleapis.com/v1".to_string()
    }

    fn default_model() -> String {
        "gemini-2.5-flash".to_string()
    }

    const fn default_request_timeout() -> u64 {
        30
    }
}

impl Default for GeminiProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            request_timeout_seconds: Self::default_request_timeout(),
            system_instruction: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_limit")]
    pub default_limit: u32,
    #[serde(default = "HistoryConfig::default_max_limit")]
    pub max_limit: u32,
}

impl HistoryConfig {
    const fn default_limit() -> u32 {
        50
    }

    const fn default_max_limit() -> u32 {
        500
    }

    /// Resolve a client-supplied page size against the configured bounds.
    pub fn clamp(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: Self::default_limit(),
            max_limit: Self::default_max_limit(),
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use parlor_config::load;
///
/// std::env::remove_var("PARLOR_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let token_ttl = i64::try_from(defaults.auth.token_ttl_seconds).unwrap_or(i64::MAX);
    let timeout = i64::try_from(defaults.orchestrator.gemini.request_timeout_seconds)
        .unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("auth.jwt_secret", defaults.auth.jwt_secret.clone())?
        .set_default("auth.issuer", defaults.auth.issuer.clone())?
        .set_default("auth.audience", defaults.auth.audience.clone())?
        .set_default("auth.token_ttl_seconds", token_ttl)?
        .set_default("assistant.enabled", defaults.assistant.enabled)?
        .set_default("assistant.sender_id", defaults.assistant.sender_id.clone())?
        .set_default(
            "orchestrator.gemini.base_url",
            defaults.orchestrator.gemini.base_url.clone(),
        )?
        .set_default(
            "orchestrator.gemini.model",
            defaults.orchestrator.gemini.model.clone(),
        )?
        .set_default("orchestrator.gemini.request_timeout_seconds", timeout)?
        .set_default(
            "history.default_limit",
            i64::from(defaults.history.default_limit),
        )?
        .set_default("history.max_limit", i64::from(defaults.history.max_limit))?;

    let environment_overrides = config::Environment::with_prefix("PARLOR").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("PARLOR_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via PARLOR_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.history.default_limit > config.history.max_limit {
        config.history.default_limit = config.history.max_limit;
    }

    debug!(
        http = ?config.http,
        database = %config.database.url,
        assistant = ?config.assistant,
        "loaded relay configuration"
    );
    Ok(config)
}
